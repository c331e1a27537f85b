//! # Render Bench
//!
//! Material normalization and scene export for external physically-based
//! renderers.
//!
//! ## Features
//!
//! - **Material Cards**: named parameter presets loaded from `*.FCMat` files
//! - **Normalization**: loose parameter bags become typed, complete materials
//! - **Backends**: LuxCore, Appleseed, pbrt-v4, POV-Ray, Cycles and OSPRay Studio
//!   scene writers
//! - **Assembly**: deterministic scene files with shared materials and textures
//! - **Launching**: the renderer runs as a child process with a cancellable handle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_bench::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BenchConfig::load_from_file("bench.toml")?;
//!     let workbench = Workbench::new(config);
//!
//!     let scene: Scene = ron::from_str(&std::fs::read_to_string("scene.ron")?)?;
//!     let finished = workbench.render_and_launch(&scene, "luxcore", &CancelToken::new())?;
//!     for diagnostic in finished.output.diagnostics.iter() {
//!         println!("{diagnostic}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;
pub mod foundation;
pub mod config;
pub mod diagnostics;
pub mod material;
pub mod assets;
pub mod backends;
pub mod scene;
pub mod launcher;

mod workbench;

#[cfg(test)]
mod tests;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use workbench::{CancelToken, FinishedRender, Workbench};

/// Common imports for workbench users
pub mod prelude {
    pub use crate::{
        CancelToken, FinishedRender, Workbench,
        Diagnostic, DiagnosticKind, Diagnostics,
        core::{BenchConfig, Config, ConfigError, RenderDefaults, RendererConfig},
        foundation::math::{placement, Placement, Point3, Vec2, Vec3},
        material::{Material, MaterialKind, Normalizer, RawParams, Rgb, TextureRef},
        assets::{CardError, CardStore},
        backends::{Backend, BackendRegistry, Capabilities, EmitError},
        scene::{
            AreaLight, Camera, Entity, ImageLight, MaterialRef, MeshObject, PointLight, Scene,
            SunskyLight, Assembler, AssembledScene, RenderError, RenderOutput, RenderSettings,
        },
        launcher::{JobOutput, LaunchError, RenderJob},
    };
}

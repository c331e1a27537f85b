//! Scene entities and assembly
//!
//! The host hands over a [`Scene`]; the [`Assembler`] resolves its materials,
//! allocates names and runs every entity through one backend.

pub mod entity;
pub mod naming;
pub mod assembler;

pub use entity::{
    AreaLight, Camera, Entity, ImageLight, MaterialRef, MeshObject, PointLight, Scene, SunskyLight,
};
pub use naming::NameAllocator;
pub use assembler::{
    render, render_on, write_scene_files, AssembledScene, Assembler, RenderError, RenderOutput,
    RenderSettings, WrittenScene, SCENE_FILE_PREFIX,
};

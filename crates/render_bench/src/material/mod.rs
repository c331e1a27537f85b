//! Material model and normalization
//!
//! Raw parameter bags come from the host or from cards; the normalizer turns
//! them into [`Material`] values that backends can emit without further checks.

pub mod params;
pub mod material_type;
pub mod coerce;
pub mod normalizer;

pub use params::RawParams;
pub use material_type::{
    Carpaint, ColorValue, Diffuse, Disney, Emission, Glass, Material, MaterialKind, Mixed,
    Passthrough, Rgb, ScalarValue, Substrate, TextureRef, TextureRole, TexturedColor,
    TexturedScalar,
};
pub use normalizer::{normalize, FieldRange, Normalizer};

//! # Renderer Backends
//!
//! A backend turns resolved scene entities into the scene description
//! language (SDL) of one external renderer, and knows how that renderer is
//! invoked.
//!
//! ## Contract
//!
//! - Emitters are pure: the same inputs always produce the same text
//! - Every material kind yields a valid declaration, including kinds outside
//!   the backend's [`Capabilities`] (those get a plain diffuse declaration)
//! - Names are allocated by the caller; emitters never invent identifiers
//!   other than the reserved child suffixes (`_diffuse`, `_glass`, `_sun`,
//!   `_sky`)
//! - Files other than the scene itself are returned as [`Sidecar`]s and
//!   referenced through [`SCENE_STEM_TOKEN`](sdl::SCENE_STEM_TOKEN)

pub mod sdl;
pub mod registry;
pub mod luxcore;
pub mod appleseed;
pub mod pbrt;
pub mod povray;
pub mod cycles;
pub mod ospray;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use thiserror::Error;

use crate::material::{ColorValue, Material, MaterialKind, Rgb, ScalarValue, TextureRef};
use crate::scene::{AreaLight, Camera, ImageLight, MeshObject, PointLight, SunskyLight};

pub use crate::material::TextureRole;
pub use appleseed::Appleseed;
pub use cycles::Cycles;
pub use luxcore::LuxCore;
pub use ospray::Ospray;
pub use pbrt::Pbrt;
pub use povray::PovRay;
pub use registry::BackendRegistry;

/// Entity that cannot be written out
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmitError {
    /// Mesh without vertices or triangles
    #[error("Mesh '{0}' has no geometry")]
    EmptyMesh(String),

    /// Triangle referencing a vertex that does not exist
    #[error("'{entity}': vertex index {index} out of range ({count} vertices)")]
    IndexOutOfRange {
        /// Entity name
        entity: String,
        /// Offending index
        index: u32,
        /// Number of vertices
        count: usize,
    },

    /// UV list not matching the vertex list
    #[error("'{entity}': {uvs} texture coordinates for {vertices} vertices")]
    UvCountMismatch {
        /// Entity name
        entity: String,
        /// Number of texture coordinates
        uvs: usize,
        /// Number of vertices
        vertices: usize,
    },

    /// NaN or infinite value
    #[error("'{entity}': non-finite {what}")]
    NonFinite {
        /// Entity name
        entity: String,
        /// Offending quantity
        what: &'static str,
    },

    /// Value outside its valid range
    #[error("'{entity}': invalid {what} {value}")]
    InvalidValue {
        /// Entity name
        entity: String,
        /// Offending quantity
        what: &'static str,
        /// Offending value
        value: f64,
    },
}

bitflags! {
    /// Material kinds a backend emits natively
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        /// Verbatim SDL tagged for this backend
        const PASSTHROUGH = 1 << 0;
        /// Dielectric
        const GLASS = 1 << 1;
        /// Principled BSDF
        const DISNEY = 1 << 2;
        /// Lambertian
        const DIFFUSE = 1 << 3;
        /// Diffuse/glass blend
        const MIXED = 1 << 4;
        /// Car paint
        const CARPAINT = 1 << 5;
        /// Coated diffuse
        const SUBSTRATE = 1 << 6;
        /// Emitter
        const EMISSION = 1 << 7;
    }
}

impl Capabilities {
    /// Flag of a material kind
    pub const fn of(kind: MaterialKind) -> Self {
        match kind {
            MaterialKind::Passthrough => Self::PASSTHROUGH,
            MaterialKind::Glass => Self::GLASS,
            MaterialKind::Disney => Self::DISNEY,
            MaterialKind::Diffuse => Self::DIFFUSE,
            MaterialKind::Mixed => Self::MIXED,
            MaterialKind::Carpaint => Self::CARPAINT,
            MaterialKind::Substrate => Self::SUBSTRATE,
            MaterialKind::Emission => Self::EMISSION,
        }
    }

    /// Whether `kind` is emitted natively
    pub const fn supports(self, kind: MaterialKind) -> bool {
        self.contains(Self::of(kind))
    }
}

/// Part of a scene file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Camera declaration
    Camera,
    /// Light sources, including the environment
    Lights,
    /// Image textures
    Textures,
    /// Materials
    Materials,
    /// Shapes
    Meshes,
}

/// Order used when a backend does not declare its own
pub const DEFAULT_SECTION_ORDER: [Section; 5] = [
    Section::Camera,
    Section::Lights,
    Section::Textures,
    Section::Materials,
    Section::Meshes,
];

/// Extra file written next to the scene, as `<stem><suffix>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    /// File name suffix, extension included
    pub suffix: String,
    /// File contents
    pub contents: String,
}

impl Sidecar {
    /// Create a sidecar
    pub fn new(suffix: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            contents: contents.into(),
        }
    }
}

/// Emitted text plus the files it refers to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// SDL text
    pub text: String,
    /// Files the text refers to
    pub sidecars: Vec<Sidecar>,
}

impl Fragment {
    /// Fragment without sidecars
    pub fn text(text: String) -> Self {
        Self {
            text,
            sidecars: Vec::new(),
        }
    }
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Complete scene file plus its sidecars
pub type SceneText = Fragment;

/// Names given to distinct textures
#[derive(Debug, Clone, Default)]
pub struct TextureNames {
    names: HashMap<TextureRef, String>,
}

impl TextureNames {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the name of a texture
    pub fn insert(&mut self, texture: TextureRef, name: String) {
        self.names.insert(texture, name);
    }

    /// Name of a texture
    pub fn get(&self, texture: &TextureRef) -> Option<&str> {
        self.names.get(texture).map(String::as_str)
    }

    /// Texture name driving a color field, if the field is textured
    pub fn color(&self, value: &ColorValue) -> Option<&str> {
        value.texture().and_then(|t| self.get(t))
    }

    /// Texture name driving a scalar field, if the field is textured
    pub fn scalar(&self, value: &ScalarValue) -> Option<&str> {
        value.texture().and_then(|t| self.get(t))
    }

    /// Number of named textures
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no texture is named
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Emitted fragments grouped by section, in emission order
#[derive(Debug, Clone, Default)]
pub struct SceneParts {
    sections: BTreeMap<Section, Vec<String>>,
}

impl SceneParts {
    /// Create an empty set of parts
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to a section
    pub fn push(&mut self, section: Section, text: String) {
        if !text.is_empty() {
            self.sections.entry(section).or_default().push(text);
        }
    }

    /// Fragments of one section
    pub fn section(&self, section: Section) -> &[String] {
        self.sections.get(&section).map_or(&[], Vec::as_slice)
    }

    /// Fragments of one section, concatenated
    pub fn section_text(&self, section: Section) -> String {
        self.section(section).concat()
    }

    /// Every fragment, concatenated in `order`
    pub fn joined(&self, order: &[Section]) -> String {
        order.iter().map(|&s| self.section_text(s)).collect()
    }
}

/// Render settings written into the scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneGlobals {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel
    pub spp: u32,
    /// Sampler name, in the backend's vocabulary
    pub sampler: String,
    /// Integrator name, in the backend's vocabulary
    pub integrator: String,
    /// Image file the renderer writes, relative to the scene directory
    pub output: String,
}

impl SceneGlobals {
    /// Globals using the backend's sampler and integrator
    pub fn for_backend(backend: &dyn Backend, width: u32, height: u32, spp: u32) -> Self {
        Self {
            width,
            height,
            spp,
            sampler: backend.default_sampler().to_string(),
            integrator: backend.default_integrator().to_string(),
            output: format!("{}.png", sdl::SCENE_STEM_TOKEN),
        }
    }
}

/// Everything needed to build a command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Renderer executable; the backend default when absent
    pub executable: Option<PathBuf>,
    /// Argument template; the backend default when absent
    pub args: Option<Vec<String>>,
    /// Words placed before the executable
    pub prefix: Vec<String>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel
    pub spp: u32,
    /// Image path; `<scene path without extension>.png` when absent
    pub output: Option<PathBuf>,
}

/// Fill the `{scene}`, `{stem}`, `{width}`, `{height}`, `{spp}` and
/// `{output}` placeholders of one template argument
pub fn fill_template(arg: &str, scene_path: &Path, settings: &LaunchSettings) -> String {
    let stem = scene_path.with_extension("");
    let output = settings
        .output
        .clone()
        .unwrap_or_else(|| stem.with_extension("png"));
    arg.replace("{scene}", &scene_path.to_string_lossy())
        .replace("{stem}", &stem.to_string_lossy())
        .replace("{width}", &settings.width.to_string())
        .replace("{height}", &settings.height.to_string())
        .replace("{spp}", &settings.spp.to_string())
        .replace("{output}", &output.to_string_lossy())
}

/// # Backend Trait
///
/// Implemented once per supported renderer. Backends are stateless and
/// shared process-wide through the [`BackendRegistry`].
///
/// ## Implementation Notes
///
/// Backends should:
/// - Convert host coordinates (Z up, right handed) internally
/// - Emit fragments terminated by exactly one newline
/// - Fall back to a diffuse declaration for unsupported material kinds
pub trait Backend: Send + Sync {
    /// Identifier used for lookup and passthrough tags
    fn id(&self) -> &'static str;

    /// Scene file extension, without the dot
    fn extension(&self) -> &'static str;

    /// Material kinds emitted natively
    fn capabilities(&self) -> Capabilities;

    /// Order of the sections in the scene file
    fn section_order(&self) -> &'static [Section] {
        &DEFAULT_SECTION_ORDER
    }

    /// Executable looked up on `PATH` when none is configured
    fn default_executable(&self) -> &'static str;

    /// Argument template used when none is configured
    fn default_args(&self) -> &'static [&'static str];

    /// Sampler used when none is configured
    fn default_sampler(&self) -> &'static str;

    /// Integrator used when none is configured
    fn default_integrator(&self) -> &'static str;

    /// Declare an image texture
    ///
    /// # Arguments
    /// * `name` - Allocated texture name
    /// * `texture` - Image and mapping
    /// * `role` - Whether the image holds colors or scalars
    fn emit_texture(&self, name: &str, texture: &TextureRef, role: TextureRole) -> String;

    /// Declare a material
    ///
    /// # Arguments
    /// * `name` - Allocated material name
    /// * `material` - Resolved material, of any kind
    /// * `textures` - Names of the textures declared so far
    fn emit_material(&self, name: &str, material: &Material, textures: &TextureNames) -> String;

    /// Declare a shape using the material `material`
    fn emit_mesh(&self, name: &str, mesh: &MeshObject, material: &str) -> Fragment;

    /// Declare the camera
    fn emit_camera(&self, name: &str, camera: &Camera) -> String;

    /// Declare a point light
    fn emit_pointlight(&self, name: &str, light: &PointLight) -> String;

    /// Declare an area light
    fn emit_arealight(&self, name: &str, light: &AreaLight) -> String;

    /// Declare a sun and sky
    fn emit_sunsky(&self, name: &str, light: &SunskyLight) -> String;

    /// Declare an environment map
    fn emit_imagelight(&self, name: &str, light: &ImageLight) -> String;

    /// Build the scene file around the emitted fragments
    fn write_scene(&self, parts: &SceneParts, globals: &SceneGlobals) -> SceneText;

    /// Whether `kind` is emitted natively
    fn supports(&self, kind: MaterialKind) -> bool {
        self.capabilities().supports(kind)
    }

    /// Whether the field `field` of a `kind` material can be driven by a
    /// texture
    ///
    /// Field names are those of [`Material::field_names`]. Rejected fields
    /// reach the emitters holding their constant fallback.
    fn accepts_texture(&self, _kind: MaterialKind, _field: &str) -> bool {
        true
    }

    /// Command line rendering `scene_path`
    ///
    /// # Returns
    /// The prefix, then the executable, then the filled argument template
    fn command_line(&self, scene_path: &Path, settings: &LaunchSettings) -> Vec<String> {
        let mut argv = settings.prefix.clone();
        argv.push(
            settings
                .executable
                .as_ref()
                .map_or_else(|| self.default_executable().to_string(), |p| p.to_string_lossy().into_owned()),
        );
        match &settings.args {
            Some(args) => argv.extend(args.iter().map(|a| fill_template(a, scene_path, settings))),
            None => argv.extend(
                self.default_args()
                    .iter()
                    .map(|a| fill_template(a, scene_path, settings)),
            ),
        }
        argv
    }
}

/// Replacement for a material the backend cannot emit as is: a diffuse of
/// its principal color, or `None` when the material is fine
///
/// Unsupported kinds and passthrough text tagged for another backend are
/// both replaced.
pub fn capability_fallback(backend: &dyn Backend, material: &Material) -> Option<Material> {
    let foreign = matches!(material, Material::Passthrough(p) if !p.backend.eq_ignore_ascii_case(backend.id()));
    if foreign || !backend.supports(material.kind()) {
        Some(Material::diffuse(material.principal_color().unwrap_or(Rgb::GREY)))
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::foundation::math::{Point3, Vec2};
    use crate::material::{
        Carpaint, ColorValue, Diffuse, Disney, Emission, Glass, Material, Mixed, Passthrough, Rgb,
        ScalarValue, Substrate, TextureRef, TexturedColor, TexturedScalar,
    };
    use crate::scene::MeshObject;

    pub fn glass() -> Material {
        Material::Glass(Glass {
            ior: 1.5.into(),
            color: Rgb::WHITE.into(),
        })
    }

    pub fn disney() -> Material {
        Material::Disney(Disney {
            base_color: Rgb::new(0.8, 0.1, 0.1).into(),
            subsurface: 0.0.into(),
            metallic: 0.5.into(),
            specular: 0.5.into(),
            specular_tint: 0.0.into(),
            roughness: 0.1.into(),
            anisotropic: 0.0.into(),
            sheen: 0.0.into(),
            sheen_tint: 0.0.into(),
            clearcoat: 0.0.into(),
            clearcoat_gloss: 0.0.into(),
        })
    }

    pub fn mixed() -> Material {
        Material::Mixed(Mixed {
            diffuse: Diffuse {
                color: Rgb::new(1.0, 0.0, 0.0).into(),
            },
            glass: Glass {
                ior: 1.5.into(),
                color: Rgb::WHITE.into(),
            },
            transparency: 0.5.into(),
        })
    }

    pub fn textured_diffuse(texture: TextureRef) -> Material {
        Material::Diffuse(Diffuse {
            color: ColorValue::Textured(TexturedColor {
                texture,
                fallback: Rgb::GREY,
            }),
        })
    }

    /// One material of every kind, the passthrough tagged for `backend`
    pub fn all_materials(backend: &str) -> Vec<Material> {
        vec![
            Material::Passthrough(Passthrough {
                backend: backend.to_string(),
                text: "# %NAME%\n".into(),
            }),
            glass(),
            disney(),
            Material::diffuse(Rgb::GREY),
            mixed(),
            Material::Carpaint(Carpaint {
                base_color: Rgb::new(0.8, 0.2, 0.2).into(),
            }),
            Material::Substrate(Substrate {
                diffuse: Rgb::GREY.into(),
                specular: Rgb::grey(0.2).into(),
                roughness: 0.1.into(),
            }),
            Material::Emission(Emission {
                color: Rgb::WHITE.into(),
                power: 10.0.into(),
            }),
        ]
    }

    /// One material of every kind with every field textured by `texture`,
    /// the passthrough tagged for `backend`
    pub fn all_textured(backend: &str, texture: &TextureRef) -> Vec<Material> {
        let color = |fallback| {
            ColorValue::Textured(TexturedColor {
                texture: texture.clone(),
                fallback,
            })
        };
        let scalar = |fallback| {
            ScalarValue::Textured(TexturedScalar {
                texture: texture.clone(),
                fallback,
            })
        };
        let glass = || Glass {
            ior: scalar(1.5),
            color: color(Rgb::WHITE),
        };
        vec![
            Material::Passthrough(Passthrough {
                backend: backend.to_string(),
                text: "# %NAME%\n".into(),
            }),
            Material::Glass(glass()),
            Material::Disney(Disney {
                base_color: color(Rgb::new(0.8, 0.1, 0.1)),
                subsurface: scalar(0.0),
                metallic: scalar(0.5),
                specular: scalar(0.5),
                specular_tint: scalar(0.0),
                roughness: scalar(0.1),
                anisotropic: scalar(0.0),
                sheen: scalar(0.0),
                sheen_tint: scalar(0.0),
                clearcoat: scalar(0.0),
                clearcoat_gloss: scalar(0.0),
            }),
            Material::Diffuse(Diffuse { color: color(Rgb::GREY) }),
            Material::Mixed(Mixed {
                diffuse: Diffuse { color: color(Rgb::GREY) },
                glass: glass(),
                transparency: scalar(0.5),
            }),
            Material::Carpaint(Carpaint { base_color: color(Rgb::new(0.8, 0.2, 0.2)) }),
            Material::Substrate(Substrate {
                diffuse: color(Rgb::GREY),
                specular: color(Rgb::grey(0.2)),
                roughness: scalar(0.1),
            }),
            Material::Emission(Emission {
                color: color(Rgb::WHITE),
                power: scalar(10.0),
            }),
        ]
    }

    pub fn triangle() -> MeshObject {
        MeshObject::new(
            "Tri",
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .with_uvs(vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)])
    }
}

//! Internal material definitions
//!
//! The closed set of material kinds a backend can be asked to emit. Values of
//! these types are complete: every field holds a constant or a texture with a
//! constant fallback, never a missing value.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Linear RGB color with components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: f64,
    /// Green
    pub g: f64,
    /// Blue
    pub b: f64,
}

impl Rgb {
    /// White
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);
    /// Neutral light grey used by most defaults
    pub const GREY: Self = Self::new(0.8, 0.8, 0.8);
    /// Black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a color
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Create a grey level
    pub const fn grey(level: f64) -> Self {
        Self::new(level, level, level)
    }

    /// Components as an array
    pub const fn to_array(self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    /// Scale every component
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }
}

/// Image used to drive a field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureRef {
    /// Image file
    pub path: PathBuf,
    /// UV set of the mesh the image is mapped with
    pub uv_channel: u32,
    /// Uniform UV scale
    pub scale: f64,
}

impl TextureRef {
    /// Create a texture reference
    pub fn new(path: impl Into<PathBuf>, uv_channel: u32, scale: f64) -> Self {
        Self {
            path: path.into(),
            uv_channel,
            scale,
        }
    }
}

// Scale is compared bitwise so that equality and hashing agree.
impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.uv_channel == other.uv_channel
            && self.scale.to_bits() == other.scale.to_bits()
    }
}

impl Eq for TextureRef {}

impl Hash for TextureRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.uv_channel.hash(state);
        self.scale.to_bits().hash(state);
    }
}

/// How a texture is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRole {
    /// sRGB color data
    Color,
    /// Linear scalar data
    Scalar,
}

impl TextureRole {
    /// Gamma the image is encoded with
    pub const fn gamma(self) -> f64 {
        match self {
            Self::Color => 2.2,
            Self::Scalar => 1.0,
        }
    }
}

/// Color driven by a texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TexturedColor {
    /// Image
    pub texture: TextureRef,
    /// Constant used when the image cannot be used
    pub fallback: Rgb,
}

/// Scalar driven by a texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TexturedScalar {
    /// Image
    pub texture: TextureRef,
    /// Constant used when the image cannot be used
    pub fallback: f64,
}

/// Color field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColorValue {
    /// Fixed color
    Constant(Rgb),
    /// Texture with constant fallback
    Textured(TexturedColor),
}

impl ColorValue {
    /// The constant, or the fallback of a texture
    pub fn constant(&self) -> Rgb {
        match self {
            Self::Constant(rgb) => *rgb,
            Self::Textured(t) => t.fallback,
        }
    }

    /// Texture driving the field, if any
    pub fn texture(&self) -> Option<&TextureRef> {
        match self {
            Self::Constant(_) => None,
            Self::Textured(t) => Some(&t.texture),
        }
    }
}

impl From<Rgb> for ColorValue {
    fn from(rgb: Rgb) -> Self {
        Self::Constant(rgb)
    }
}

/// Scalar field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Fixed value
    Constant(f64),
    /// Texture with constant fallback
    Textured(TexturedScalar),
}

impl ScalarValue {
    /// The constant, or the fallback of a texture
    pub fn constant(&self) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::Textured(t) => t.fallback,
        }
    }

    /// Texture driving the field, if any
    pub fn texture(&self) -> Option<&TextureRef> {
        match self {
            Self::Constant(_) => None,
            Self::Textured(t) => Some(&t.texture),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Constant(v)
    }
}

/// Raw SDL written by the user for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passthrough {
    /// Backend the text is meant for
    pub backend: String,
    /// SDL text, possibly holding `%NAME%`, `%RED%`, `%GREEN%`, `%BLUE%`
    pub text: String,
}

/// Dielectric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glass {
    /// Index of refraction, at least 1
    pub ior: ScalarValue,
    /// Transmitted color
    pub color: ColorValue,
}

/// Principled BSDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Disney {
    pub base_color: ColorValue,
    pub subsurface: ScalarValue,
    pub metallic: ScalarValue,
    pub specular: ScalarValue,
    pub specular_tint: ScalarValue,
    pub roughness: ScalarValue,
    pub anisotropic: ScalarValue,
    pub sheen: ScalarValue,
    pub sheen_tint: ScalarValue,
    pub clearcoat: ScalarValue,
    pub clearcoat_gloss: ScalarValue,
}

/// Lambertian
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diffuse {
    /// Reflected color
    pub color: ColorValue,
}

/// Blend of a diffuse and a glass material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mixed {
    /// Opaque part
    pub diffuse: Diffuse,
    /// Transparent part
    pub glass: Glass,
    /// Share of the glass part, in [0, 1]
    pub transparency: ScalarValue,
}

/// Car paint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carpaint {
    /// Paint color
    pub base_color: ColorValue,
}

/// Glossy coating over a diffuse base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substrate {
    /// Base color
    pub diffuse: ColorValue,
    /// Coating reflectance
    pub specular: ColorValue,
    /// Coating roughness, in [0, 1]
    pub roughness: ScalarValue,
}

/// Light emitting surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    /// Emitted color
    pub color: ColorValue,
    /// Emitted power, non-negative
    pub power: ScalarValue,
}

/// Fully resolved material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Material {
    /// Verbatim SDL
    Passthrough(Passthrough),
    /// Dielectric
    Glass(Glass),
    /// Principled BSDF
    Disney(Disney),
    /// Lambertian
    Diffuse(Diffuse),
    /// Diffuse/glass blend
    Mixed(Mixed),
    /// Car paint
    Carpaint(Carpaint),
    /// Coated diffuse
    Substrate(Substrate),
    /// Emitter
    Emission(Emission),
}

/// Tag of a [`Material`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialKind {
    /// See [`Material::Passthrough`]
    Passthrough,
    /// See [`Material::Glass`]
    Glass,
    /// See [`Material::Disney`]
    Disney,
    /// See [`Material::Diffuse`]
    Diffuse,
    /// See [`Material::Mixed`]
    Mixed,
    /// See [`Material::Carpaint`]
    Carpaint,
    /// See [`Material::Substrate`]
    Substrate,
    /// See [`Material::Emission`]
    Emission,
}

impl MaterialKind {
    /// Every kind, in declaration order
    pub const ALL: [Self; 8] = [
        Self::Passthrough,
        Self::Glass,
        Self::Disney,
        Self::Diffuse,
        Self::Mixed,
        Self::Carpaint,
        Self::Substrate,
        Self::Emission,
    ];

    /// Name used in `Shader` values and parameter keys
    pub const fn name(self) -> &'static str {
        match self {
            Self::Passthrough => "Passthrough",
            Self::Glass => "Glass",
            Self::Disney => "Disney",
            Self::Diffuse => "Diffuse",
            Self::Mixed => "Mixed",
            Self::Carpaint => "Carpaint",
            Self::Substrate => "Substrate",
            Self::Emission => "Emission",
        }
    }

    /// Parse a `Shader` value, ignoring case and surrounding blanks
    pub fn from_shader(shader: &str) -> Option<Self> {
        let shader = shader.trim();
        Self::ALL.into_iter().find(|kind| kind.name().eq_ignore_ascii_case(shader))
    }
}

impl std::fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Material {
    /// Tag of the variant
    pub const fn kind(&self) -> MaterialKind {
        match self {
            Self::Passthrough(_) => MaterialKind::Passthrough,
            Self::Glass(_) => MaterialKind::Glass,
            Self::Disney(_) => MaterialKind::Disney,
            Self::Diffuse(_) => MaterialKind::Diffuse,
            Self::Mixed(_) => MaterialKind::Mixed,
            Self::Carpaint(_) => MaterialKind::Carpaint,
            Self::Substrate(_) => MaterialKind::Substrate,
            Self::Emission(_) => MaterialKind::Emission,
        }
    }

    /// Constant diffuse material
    pub fn diffuse(color: Rgb) -> Self {
        Self::Diffuse(Diffuse { color: color.into() })
    }

    /// The color that best stands for the material when it has to be
    /// replaced by a plain diffuse one
    ///
    /// Passthrough has no color of its own; `None` is returned and the caller
    /// picks the object color.
    pub fn principal_color(&self) -> Option<Rgb> {
        match self {
            Self::Passthrough(_) => None,
            Self::Glass(m) => Some(m.color.constant()),
            Self::Disney(m) => Some(m.base_color.constant()),
            Self::Diffuse(m) => Some(m.color.constant()),
            Self::Mixed(m) => Some(m.diffuse.color.constant()),
            Self::Carpaint(m) => Some(m.base_color.constant()),
            Self::Substrate(m) => Some(m.diffuse.constant()),
            Self::Emission(m) => Some(m.color.constant()),
        }
    }

    /// Every texture the material references, in field order, repeats included
    pub fn textures(&self) -> Vec<&TextureRef> {
        self.fields()
            .into_iter()
            .filter_map(|(_, field)| field.texture())
            .collect()
    }

    /// Every texture the material references with how it is sampled, in
    /// field order, repeats included
    pub fn texture_uses(&self) -> Vec<(&TextureRef, TextureRole)> {
        self.fields()
            .into_iter()
            .filter_map(|(_, field)| match field {
                Field::Color(c) => c.texture().map(|t| (t, TextureRole::Color)),
                Field::Scalar(s) => s.texture().map(|t| (t, TextureRole::Scalar)),
            })
            .collect()
    }

    /// Names of the fields that can hold a texture, in field order
    ///
    /// Fields of the halves of a mix are prefixed with `diffuse.` or `glass.`.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields().into_iter().map(|(name, _)| name).collect()
    }

    /// Replace textured fields whose image file is missing by their constant
    /// fallback, recording `MissingTexture` for each
    ///
    /// `exists` decides whether a path is usable; the assembler passes a file
    /// system check.
    pub fn degrade_textures(
        &mut self,
        subject: &str,
        exists: &dyn Fn(&Path) -> bool,
        diagnostics: &mut Diagnostics,
    ) {
        for (_, mut field) in self.fields_mut() {
            let missing = field.texture().is_some_and(|t| !exists(&t.path));
            if !missing {
                continue;
            }
            if let Some(texture) = field.drop_texture() {
                diagnostics.push(
                    DiagnosticKind::MissingTexture,
                    subject,
                    format!("texture '{}' not found, using constant fallback", texture.path.display()),
                );
            }
        }
    }

    /// Replace textured fields rejected by `accepts` with their constant
    /// fallback, returning the names of the fields replaced
    pub fn flatten_textures(&mut self, accepts: &dyn Fn(&str) -> bool) -> Vec<&'static str> {
        let mut flattened = Vec::new();
        for (name, mut field) in self.fields_mut() {
            if field.texture().is_some() && !accepts(name) && field.drop_texture().is_some() {
                flattened.push(name);
            }
        }
        flattened
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        use Field::{Color, Scalar};
        match self {
            Self::Passthrough(_) => Vec::new(),
            Self::Glass(m) => vec![("ior", Scalar(&m.ior)), ("color", Color(&m.color))],
            Self::Disney(m) => vec![
                ("base_color", Color(&m.base_color)),
                ("subsurface", Scalar(&m.subsurface)),
                ("metallic", Scalar(&m.metallic)),
                ("specular", Scalar(&m.specular)),
                ("specular_tint", Scalar(&m.specular_tint)),
                ("roughness", Scalar(&m.roughness)),
                ("anisotropic", Scalar(&m.anisotropic)),
                ("sheen", Scalar(&m.sheen)),
                ("sheen_tint", Scalar(&m.sheen_tint)),
                ("clearcoat", Scalar(&m.clearcoat)),
                ("clearcoat_gloss", Scalar(&m.clearcoat_gloss)),
            ],
            Self::Diffuse(m) => vec![("color", Color(&m.color))],
            Self::Mixed(m) => vec![
                ("diffuse.color", Color(&m.diffuse.color)),
                ("glass.ior", Scalar(&m.glass.ior)),
                ("glass.color", Color(&m.glass.color)),
                ("transparency", Scalar(&m.transparency)),
            ],
            Self::Carpaint(m) => vec![("base_color", Color(&m.base_color))],
            Self::Substrate(m) => vec![
                ("diffuse", Color(&m.diffuse)),
                ("specular", Color(&m.specular)),
                ("roughness", Scalar(&m.roughness)),
            ],
            Self::Emission(m) => vec![("color", Color(&m.color)), ("power", Scalar(&m.power))],
        }
    }

    fn fields_mut(&mut self) -> Vec<(&'static str, FieldMut<'_>)> {
        use FieldMut::{Color, Scalar};
        match self {
            Self::Passthrough(_) => Vec::new(),
            Self::Glass(m) => vec![("ior", Scalar(&mut m.ior)), ("color", Color(&mut m.color))],
            Self::Disney(m) => vec![
                ("base_color", Color(&mut m.base_color)),
                ("subsurface", Scalar(&mut m.subsurface)),
                ("metallic", Scalar(&mut m.metallic)),
                ("specular", Scalar(&mut m.specular)),
                ("specular_tint", Scalar(&mut m.specular_tint)),
                ("roughness", Scalar(&mut m.roughness)),
                ("anisotropic", Scalar(&mut m.anisotropic)),
                ("sheen", Scalar(&mut m.sheen)),
                ("sheen_tint", Scalar(&mut m.sheen_tint)),
                ("clearcoat", Scalar(&mut m.clearcoat)),
                ("clearcoat_gloss", Scalar(&mut m.clearcoat_gloss)),
            ],
            Self::Diffuse(m) => vec![("color", Color(&mut m.color))],
            Self::Mixed(m) => vec![
                ("diffuse.color", Color(&mut m.diffuse.color)),
                ("glass.ior", Scalar(&mut m.glass.ior)),
                ("glass.color", Color(&mut m.glass.color)),
                ("transparency", Scalar(&mut m.transparency)),
            ],
            Self::Carpaint(m) => vec![("base_color", Color(&mut m.base_color))],
            Self::Substrate(m) => vec![
                ("diffuse", Color(&mut m.diffuse)),
                ("specular", Color(&mut m.specular)),
                ("roughness", Scalar(&mut m.roughness)),
            ],
            Self::Emission(m) => vec![("color", Color(&mut m.color)), ("power", Scalar(&mut m.power))],
        }
    }
}

enum Field<'a> {
    Color(&'a ColorValue),
    Scalar(&'a ScalarValue),
}

impl<'a> Field<'a> {
    fn texture(&self) -> Option<&'a TextureRef> {
        match self {
            Self::Color(c) => c.texture(),
            Self::Scalar(s) => s.texture(),
        }
    }
}

enum FieldMut<'a> {
    Color(&'a mut ColorValue),
    Scalar(&'a mut ScalarValue),
}

impl FieldMut<'_> {
    fn texture(&self) -> Option<&TextureRef> {
        match self {
            Self::Color(c) => c.texture(),
            Self::Scalar(s) => s.texture(),
        }
    }

    /// Keep only the constant fallback, returning the texture dropped
    fn drop_texture(&mut self) -> Option<TextureRef> {
        match self {
            Self::Color(c) => {
                let constant = ColorValue::Constant(c.constant());
                match std::mem::replace(&mut **c, constant) {
                    ColorValue::Textured(t) => Some(t.texture),
                    ColorValue::Constant(_) => None,
                }
            }
            Self::Scalar(s) => {
                let constant = ScalarValue::Constant(s.constant());
                match std::mem::replace(&mut **s, constant) {
                    ScalarValue::Textured(t) => Some(t.texture),
                    ScalarValue::Constant(_) => None,
                }
            }
        }
    }
}

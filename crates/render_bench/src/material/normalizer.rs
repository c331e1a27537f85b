//! Material normalizer
//!
//! Turns a raw parameter bag into a complete [`Material`]. Normalization never
//! fails: anything that cannot be understood is replaced by a default and
//! reported in the returned diagnostics. The result depends only on the bag,
//! the fallback color and, for inherited cards, the card store contents.
//!
//! Parameter keys are `<Kind>.<Field>` (e.g. `Glass.IOR`) with the bare
//! `<Field>` accepted as an alias. Key lookups ignore ASCII case.

use std::collections::BTreeSet;

use super::coerce::{self, TextureSpec};
use super::material_type::{
    Carpaint, ColorValue, Diffuse, Disney, Emission, Glass, Material, MaterialKind, Mixed,
    Passthrough, Rgb, ScalarValue, Substrate, TexturedColor, TexturedScalar,
};
use super::params::{RawParams, FATHER_KEY, PASSTHROUGH_PREFIX, SHADER_KEY};
use crate::assets::cards::{CardError, CardStore};
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Longest chain of `Father` cards followed before giving up
pub const MAX_FATHER_DEPTH: usize = 8;

/// Inclusive range a scalar field is clamped to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

impl FieldRange {
    /// [0, 1]
    pub const UNIT: Self = Self { min: 0.0, max: 1.0 };
    /// [1, +inf)
    pub const IOR: Self = Self { min: 1.0, max: f64::INFINITY };
    /// [0, +inf)
    pub const NON_NEGATIVE: Self = Self { min: 0.0, max: f64::INFINITY };

    /// Clamp a value into the range
    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Whether a value lies in the range
    pub fn contains(self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Keys that describe a card rather than a material field
const METADATA_KEYS: &[&str] = &[
    "Name",
    "CardName",
    "Description",
    "Author",
    "License",
    "AuthorAndLicense",
    "ReferenceSource",
    "SourceURL",
    "KindOfMaterial",
    "DiffuseColor",
    "AmbientColor",
    "SpecularColor",
    "EmissiveColor",
    "Shininess",
    "Transparency",
];

/// Keyword selecting the object color in a color field
const OBJECT_COLOR: &str = "Object";

/// Normalizer, optionally backed by a card store for `Father` inheritance
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer<'c> {
    cards: Option<&'c CardStore>,
    backend: Option<&'c str>,
}

impl<'c> Normalizer<'c> {
    /// Normalizer without card inheritance
    pub const fn new() -> Self {
        Self { cards: None, backend: None }
    }

    /// Normalizer resolving `Father` through a card store
    pub const fn with_cards(cards: &'c CardStore) -> Self {
        Self { cards: Some(cards), backend: None }
    }

    /// Prefer the passthrough text tagged for backend `id` when a bag, or
    /// any card it inherits from, carries text for several backends
    #[must_use]
    pub const fn with_backend(mut self, id: &'c str) -> Self {
        self.backend = Some(id);
        self
    }

    /// Normalize a parameter bag
    ///
    /// `fallback_color` is the host object color, used whenever no better
    /// color can be derived.
    pub fn normalize(&self, raw: &RawParams, fallback_color: Rgb) -> (Material, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let material = self.resolve(raw, fallback_color, 0, &mut diagnostics);
        (material, diagnostics)
    }

    fn resolve(&self, raw: &RawParams, fallback: Rgb, depth: usize, diagnostics: &mut Diagnostics) -> Material {
        let shader = raw.get_ignore_case(SHADER_KEY).map(str::trim).filter(|s| !s.is_empty());

        let Some(shader) = shader else {
            return self.resolve_without_shader(raw, fallback, depth, diagnostics);
        };

        match MaterialKind::from_shader(shader) {
            Some(MaterialKind::Passthrough) => passthrough(raw, self.backend).unwrap_or_else(|| {
                diagnostics.push(
                    DiagnosticKind::UnknownShader,
                    SHADER_KEY,
                    "Passthrough shader without any Passthrough.<backend> text",
                );
                Material::diffuse(fallback)
            }),
            Some(kind) => build(kind, raw, fallback, self.backend, diagnostics),
            None => {
                diagnostics.push(
                    DiagnosticKind::UnknownShader,
                    SHADER_KEY,
                    format!("'{shader}' is not a material kind, using diffuse object color"),
                );
                Material::diffuse(fallback)
            }
        }
    }

    fn resolve_without_shader(
        &self,
        raw: &RawParams,
        fallback: Rgb,
        depth: usize,
        diagnostics: &mut Diagnostics,
    ) -> Material {
        if let Some(material) = passthrough(raw, self.backend) {
            return material;
        }

        if let Some(father) = raw.get_ignore_case(FATHER_KEY).map(str::trim).filter(|f| !f.is_empty()) {
            if let Some(material) = self.inherit(father, fallback, depth, diagnostics) {
                return material;
            }
        }

        if let Some(diffuse_color) = raw.get_ignore_case("DiffuseColor") {
            match coerce::parse_rgb(diffuse_color) {
                Ok(color) => {
                    log::debug!("No shader, building material from DiffuseColor");
                    let transparency = coin_transparency(raw, diagnostics);
                    return coin_material(color, transparency);
                }
                Err(reason) => diagnostics.push(DiagnosticKind::CoercionFailed, "DiffuseColor", reason),
            }
        }

        diagnostics.push(
            DiagnosticKind::UnknownShader,
            SHADER_KEY,
            "no Shader key, using diffuse object color",
        );
        Material::diffuse(fallback)
    }

    fn inherit(&self, father: &str, fallback: Rgb, depth: usize, diagnostics: &mut Diagnostics) -> Option<Material> {
        let Some(cards) = self.cards else {
            log::debug!("Father card '{father}' ignored, no card store available");
            return None;
        };

        if depth >= MAX_FATHER_DEPTH {
            diagnostics.push(
                DiagnosticKind::CardMalformed,
                father,
                format!("Father chain deeper than {MAX_FATHER_DEPTH} cards, ignoring"),
            );
            return None;
        }

        match cards.load_card(father) {
            Ok(card) => {
                log::debug!("Inheriting material from father card '{father}'");
                Some(self.resolve(&card, fallback, depth + 1, diagnostics))
            }
            Err(CardError::NotFound(_)) => {
                diagnostics.push(DiagnosticKind::CardNotFound, father, "father card not found");
                None
            }
            Err(e) => {
                diagnostics.push(DiagnosticKind::CardMalformed, father, e.to_string());
                None
            }
        }
    }
}

/// Normalize without card inheritance
pub fn normalize(raw: &RawParams, fallback_color: Rgb) -> (Material, Diagnostics) {
    Normalizer::new().normalize(raw, fallback_color)
}

/// Passthrough material from the bag, the text for `target` first
fn passthrough(raw: &RawParams, target: Option<&str>) -> Option<Material> {
    if let Some(target) = target {
        if let Some(text) = raw.passthrough_text(target) {
            return Some(Material::Passthrough(Passthrough {
                backend: target.to_string(),
                text,
            }));
        }
    }

    let backends = raw.passthrough_backends();
    let backend = backends.first()?;
    if backends.len() > 1 {
        log::debug!("Passthrough text for {} backends, keeping '{backend}' as the tag", backends.len());
    }
    let text = raw.passthrough_text(backend)?;
    Some(Material::Passthrough(Passthrough {
        backend: backend.clone(),
        text,
    }))
}

fn coin_transparency(raw: &RawParams, diagnostics: &mut Diagnostics) -> f64 {
    match raw.get_ignore_case("Transparency") {
        None => 0.0,
        Some(value) => match coerce::parse_float(value) {
            Ok(percent) => FieldRange::UNIT.clamp(percent / 100.0),
            Err(reason) => {
                diagnostics.push(DiagnosticKind::CoercionFailed, "Transparency", reason);
                0.0
            }
        },
    }
}

fn coin_material(color: Rgb, transparency: f64) -> Material {
    let glass = || Glass {
        ior: ScalarValue::Constant(1.5),
        color: color.into(),
    };
    if transparency <= 0.0 {
        Material::diffuse(color)
    } else if transparency >= 1.0 {
        Material::Glass(glass())
    } else {
        Material::Mixed(Mixed {
            diffuse: Diffuse { color: color.into() },
            glass: glass(),
            transparency: ScalarValue::Constant(transparency),
        })
    }
}

fn build(
    kind: MaterialKind,
    raw: &RawParams,
    fallback: Rgb,
    backend: Option<&str>,
    diagnostics: &mut Diagnostics,
) -> Material {
    let mut reader = FieldReader::new(kind, raw, fallback, diagnostics);

    let material = match kind {
        MaterialKind::Glass => Material::Glass(read_glass(&mut reader, "")),
        MaterialKind::Disney => Material::Disney(Disney {
            base_color: reader.color("BaseColor", Rgb::GREY),
            subsurface: reader.scalar("Subsurface", 0.0, FieldRange::UNIT),
            metallic: reader.scalar("Metallic", 0.0, FieldRange::UNIT),
            specular: reader.scalar("Specular", 0.0, FieldRange::UNIT),
            specular_tint: reader.scalar("SpecularTint", 0.0, FieldRange::UNIT),
            roughness: reader.scalar("Roughness", 0.1, FieldRange::UNIT),
            anisotropic: reader.scalar("Anisotropic", 0.0, FieldRange::UNIT),
            sheen: reader.scalar("Sheen", 0.0, FieldRange::UNIT),
            sheen_tint: reader.scalar("SheenTint", 0.0, FieldRange::UNIT),
            clearcoat: reader.scalar("ClearCoat", 0.0, FieldRange::UNIT),
            clearcoat_gloss: reader.scalar("ClearCoatGloss", 0.0, FieldRange::UNIT),
        }),
        MaterialKind::Diffuse => Material::Diffuse(read_diffuse(&mut reader, "")),
        MaterialKind::Mixed => Material::Mixed(Mixed {
            diffuse: read_diffuse(&mut reader, "Diffuse."),
            glass: read_glass(&mut reader, "Glass."),
            transparency: reader.scalar("Transparency", 0.5, FieldRange::UNIT),
        }),
        MaterialKind::Carpaint => Material::Carpaint(Carpaint {
            base_color: reader.color("BaseColor", Rgb::new(0.8, 0.2, 0.2)),
        }),
        MaterialKind::Substrate => Material::Substrate(Substrate {
            diffuse: reader.color("Diffuse", Rgb::GREY),
            specular: reader.color("Specular", Rgb::grey(0.2)),
            roughness: reader.scalar("Roughness", 0.1, FieldRange::UNIT),
        }),
        MaterialKind::Emission => Material::Emission(Emission {
            color: reader.color("Color", Rgb::WHITE),
            power: reader.scalar("Power", 10.0, FieldRange::NON_NEGATIVE),
        }),
        MaterialKind::Passthrough => passthrough(raw, backend).unwrap_or_else(|| Material::diffuse(fallback)),
    };

    reader.report_unknown();
    material
}

fn read_glass(reader: &mut FieldReader<'_, '_>, prefix: &str) -> Glass {
    Glass {
        ior: reader.scalar(&format!("{prefix}IOR"), 1.5, FieldRange::IOR),
        color: reader.color(&format!("{prefix}Color"), Rgb::WHITE),
    }
}

fn read_diffuse(reader: &mut FieldReader<'_, '_>, prefix: &str) -> Diffuse {
    Diffuse {
        color: reader.color(&format!("{prefix}Color"), Rgb::GREY),
    }
}

/// Field lookup and coercion for one material kind
struct FieldReader<'r, 'd> {
    kind: MaterialKind,
    raw: &'r RawParams,
    fallback: Rgb,
    consumed: BTreeSet<&'r str>,
    diagnostics: &'d mut Diagnostics,
}

impl<'r, 'd> FieldReader<'r, 'd> {
    fn new(kind: MaterialKind, raw: &'r RawParams, fallback: Rgb, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            kind,
            raw,
            fallback,
            consumed: BTreeSet::new(),
            diagnostics,
        }
    }

    /// Find `<Kind>.<field>`, then `<field>`
    fn lookup(&mut self, field: &str) -> Option<(&'r str, &'r str)> {
        let raw = self.raw;
        let qualified = format!("{}.{field}", self.kind.name());
        let found = [qualified.as_str(), field]
            .into_iter()
            .find_map(|candidate| raw.iter().find(|(key, _)| key.eq_ignore_ascii_case(candidate)))?;
        self.consumed.insert(found.0);
        Some(found)
    }

    fn color(&mut self, field: &str, default: Rgb) -> ColorValue {
        let Some((key, value)) = self.lookup(field) else {
            return ColorValue::Constant(default);
        };

        if coerce::is_texture(value) {
            return match coerce::parse_texture(value) {
                Ok(TextureSpec { texture, fallback }) => {
                    let fallback = fallback.map_or(default, |f| self.coerce_color(key, &f, default));
                    ColorValue::Textured(TexturedColor { texture, fallback })
                }
                Err(reason) => {
                    self.diagnostics.push(DiagnosticKind::CoercionFailed, key, reason);
                    ColorValue::Constant(default)
                }
            };
        }

        ColorValue::Constant(self.coerce_color(key, value, default))
    }

    fn coerce_color(&mut self, key: &str, value: &str, default: Rgb) -> Rgb {
        if value.trim().eq_ignore_ascii_case(OBJECT_COLOR) {
            return self.fallback;
        }
        coerce::parse_rgb(value).unwrap_or_else(|reason| {
            self.diagnostics.push(DiagnosticKind::CoercionFailed, key, reason);
            default
        })
    }

    fn scalar(&mut self, field: &str, default: f64, range: FieldRange) -> ScalarValue {
        let Some((key, value)) = self.lookup(field) else {
            return ScalarValue::Constant(range.clamp(default));
        };

        if coerce::is_texture(value) {
            return match coerce::parse_texture(value) {
                Ok(TextureSpec { texture, fallback }) => {
                    let fallback = fallback.map_or(default, |f| self.coerce_scalar(key, &f, default));
                    ScalarValue::Textured(TexturedScalar {
                        texture,
                        fallback: self.clamped(key, fallback, range),
                    })
                }
                Err(reason) => {
                    self.diagnostics.push(DiagnosticKind::CoercionFailed, key, reason);
                    ScalarValue::Constant(range.clamp(default))
                }
            };
        }

        let value = self.coerce_scalar(key, value, default);
        ScalarValue::Constant(self.clamped(key, value, range))
    }

    fn coerce_scalar(&mut self, key: &str, value: &str, default: f64) -> f64 {
        coerce::parse_float(value).unwrap_or_else(|reason| {
            self.diagnostics.push(DiagnosticKind::CoercionFailed, key, reason);
            default
        })
    }

    fn clamped(&self, key: &str, value: f64, range: FieldRange) -> f64 {
        let clamped = range.clamp(value);
        if clamped.to_bits() != value.to_bits() {
            log::debug!("{key}: {value} clamped to {clamped}");
        }
        clamped
    }

    /// Report keys that look like parameters of this kind but were not used
    fn report_unknown(self) {
        let own_prefix = format!("{}.", self.kind.name());
        for (key, _) in self.raw.iter() {
            if self.consumed.contains(key) || is_metadata(key) {
                continue;
            }
            let foreign = !starts_with_ignore_case(key, &own_prefix)
                && (starts_with_ignore_case(key, PASSTHROUGH_PREFIX)
                    || MaterialKind::ALL
                        .iter()
                        .any(|kind| starts_with_ignore_case(key, &format!("{}.", kind.name()))));
            if foreign {
                continue;
            }
            self.diagnostics.push(
                DiagnosticKind::UnknownParameter,
                key,
                format!("not a parameter of {} materials, ignored", self.kind),
            );
        }
    }
}

fn is_metadata(key: &str) -> bool {
    key.eq_ignore_ascii_case(SHADER_KEY)
        || key.eq_ignore_ascii_case(FATHER_KEY)
        || METADATA_KEYS.iter().any(|m| m.eq_ignore_ascii_case(key))
}

fn starts_with_ignore_case(key: &str, prefix: &str) -> bool {
    key.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREY: Rgb = Rgb::new(0.5, 0.5, 0.5);

    #[test]
    fn test_glass_from_qualified_keys() {
        let raw = RawParams::from([
            ("Shader", "Glass"),
            ("Glass.IOR", "1.52"),
            ("Glass.Color", "(0.9,0.9,1.0)"),
        ]);
        let (material, diagnostics) = normalize(&raw, GREY);
        assert_eq!(
            material,
            Material::Glass(Glass {
                ior: ScalarValue::Constant(1.52),
                color: ColorValue::Constant(Rgb::new(0.9, 0.9, 1.0)),
            })
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_plain_alias_and_case() {
        let raw = RawParams::from([("shader", "glass"), ("ior", "1.33")]);
        let (material, _) = normalize(&raw, GREY);
        let Material::Glass(glass) = material else { panic!("expected glass") };
        assert_eq!(glass.ior, ScalarValue::Constant(1.33));
        assert_eq!(glass.color, ColorValue::Constant(Rgb::WHITE));
    }

    #[test]
    fn test_unknown_shader_falls_back_to_object_color() {
        let raw = RawParams::from([("Shader", "Plastic")]);
        let (material, diagnostics) = normalize(&raw, GREY);
        assert_eq!(material, Material::diffuse(GREY));
        assert!(diagnostics.contains(DiagnosticKind::UnknownShader));
    }

    #[test]
    fn test_disney_defaults() {
        let raw = RawParams::from([("Shader", "Disney")]);
        let (material, diagnostics) = normalize(&raw, GREY);
        let Material::Disney(disney) = material else { panic!("expected disney") };
        assert_eq!(disney.roughness, ScalarValue::Constant(0.1));
        assert_eq!(disney.base_color, ColorValue::Constant(Rgb::GREY));
        assert_eq!(disney.metallic, ScalarValue::Constant(0.0));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_coercion_failure_uses_default() {
        let raw = RawParams::from([
            ("Shader", "Disney"),
            ("Disney.Roughness", "rough"),
            ("Disney.BaseColor", "(2,0,0)"),
        ]);
        let (material, diagnostics) = normalize(&raw, GREY);
        let Material::Disney(disney) = material else { panic!("expected disney") };
        assert_eq!(disney.roughness, ScalarValue::Constant(0.1));
        assert_eq!(disney.base_color, ColorValue::Constant(Rgb::GREY));
        assert_eq!(diagnostics.count(DiagnosticKind::CoercionFailed), 2);
    }

    #[test]
    fn test_clamping() {
        let raw = RawParams::from([
            ("Shader", "Disney"),
            ("Disney.Metallic", "3"),
            ("Disney.Sheen", "-1"),
        ]);
        let (material, _) = normalize(&raw, GREY);
        let Material::Disney(disney) = material else { panic!("expected disney") };
        assert_eq!(disney.metallic, ScalarValue::Constant(1.0));
        assert_eq!(disney.sheen, ScalarValue::Constant(0.0));

        let raw = RawParams::from([("Shader", "Glass"), ("Glass.IOR", "0.5")]);
        let (material, _) = normalize(&raw, GREY);
        let Material::Glass(glass) = material else { panic!("expected glass") };
        assert_eq!(glass.ior, ScalarValue::Constant(1.0));
    }

    #[test]
    fn test_mixed_subtrees() {
        let raw = RawParams::from([
            ("Shader", "Mixed"),
            ("Mixed.Transparency", "1.7"),
            ("Mixed.Glass.IOR", "1.5"),
            ("Mixed.Diffuse.Color", "(1,0,0)"),
        ]);
        let (material, diagnostics) = normalize(&raw, GREY);
        let Material::Mixed(mixed) = material else { panic!("expected mixed") };
        assert_eq!(mixed.transparency, ScalarValue::Constant(1.0));
        assert_eq!(mixed.glass.ior, ScalarValue::Constant(1.5));
        assert_eq!(mixed.diffuse.color, ColorValue::Constant(Rgb::new(1.0, 0.0, 0.0)));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_textured_fields() {
        let raw = RawParams::from([
            ("Shader", "Diffuse"),
            ("Diffuse.Color", "Texture;wood.png;0;2;(0.4,0.3,0.2)"),
        ]);
        let (material, _) = normalize(&raw, GREY);
        let Material::Diffuse(diffuse) = material else { panic!("expected diffuse") };
        let ColorValue::Textured(textured) = diffuse.color else { panic!("expected texture") };
        assert_eq!(textured.fallback, Rgb::new(0.4, 0.3, 0.2));
        assert_eq!(textured.texture.scale, 2.0);
    }

    #[test]
    fn test_textured_scalar_fallback_is_clamped() {
        let raw = RawParams::from([("Shader", "Substrate"), ("Roughness", "Texture;r.png;0;1;4")]);
        let (material, _) = normalize(&raw, GREY);
        let Material::Substrate(substrate) = material else { panic!("expected substrate") };
        let ScalarValue::Textured(textured) = substrate.roughness else { panic!("expected texture") };
        assert_eq!(textured.fallback, 1.0);
    }

    #[test]
    fn test_object_color_keyword() {
        let raw = RawParams::from([("Shader", "Carpaint"), ("Carpaint.BaseColor", "Object")]);
        let (material, _) = normalize(&raw, GREY);
        assert_eq!(material.principal_color(), Some(GREY));
    }

    #[test]
    fn test_unknown_parameters_reported() {
        let raw = RawParams::from([
            ("Shader", "Glass"),
            ("Glass.Dispersion", "0.1"),
            ("Glossiness", "3"),
            ("Disney.Roughness", "0.3"),
            ("Name", "Window"),
            ("Passthrough.Pbrt", "Material \"conductor\""),
        ]);
        let (_, diagnostics) = normalize(&raw, GREY);
        let subjects: Vec<&str> = diagnostics.iter().map(|d| d.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Glass.Dispersion", "Glossiness"]);
        assert_eq!(diagnostics.count(DiagnosticKind::UnknownParameter), 2);
    }

    #[test]
    fn test_passthrough_shader() {
        let raw = RawParams::from([
            ("Shader", "Passthrough"),
            ("Passthrough.Appleseed", "<material name=\"%NAME%\"/>"),
        ]);
        let (material, _) = normalize(&raw, GREY);
        assert_eq!(
            material,
            Material::Passthrough(Passthrough {
                backend: "Appleseed".to_string(),
                text: "<material name=\"%NAME%\"/>".to_string(),
            })
        );
    }

    #[test]
    fn test_coin_like_parameters() {
        let raw = RawParams::from([("DiffuseColor", "(0.2, 0.4, 0.6, 0.0)")]);
        let (material, diagnostics) = normalize(&raw, GREY);
        assert_eq!(material, Material::diffuse(Rgb::new(0.2, 0.4, 0.6)));
        assert!(diagnostics.is_empty());

        let raw = RawParams::from([("DiffuseColor", "(0.2,0.4,0.6)"), ("Transparency", "100")]);
        assert_eq!(normalize(&raw, GREY).0.kind(), MaterialKind::Glass);

        let raw = RawParams::from([("DiffuseColor", "(0.2,0.4,0.6)"), ("Transparency", "30")]);
        let Material::Mixed(mixed) = normalize(&raw, GREY).0 else { panic!("expected mixed") };
        assert_eq!(mixed.transparency, ScalarValue::Constant(0.3));
    }

    #[test]
    fn test_no_shader_at_all() {
        let (material, diagnostics) = normalize(&RawParams::new(), GREY);
        assert_eq!(material, Material::diffuse(GREY));
        assert!(diagnostics.contains(DiagnosticKind::UnknownShader));
    }

    #[test]
    fn test_determinism() {
        let raw = RawParams::from([
            ("Shader", "Disney"),
            ("Disney.BaseColor", "#336699"),
            ("Disney.Sheen", "0.4"),
            ("Disney.ClearCoat", "Texture;coat.png;1;0.5;0.2"),
        ]);
        let first = normalize(&raw, GREY);
        let second = normalize(&raw.clone(), GREY);
        assert_eq!(first, second);
    }

    #[test]
    fn test_passthrough_for_target_backend() {
        let raw = RawParams::from([
            ("Passthrough.Appleseed", "<material name=\"%NAME%\"/>"),
            ("Passthrough.LuxCore", "scene.materials.%NAME%.type = \"matte\""),
        ]);
        let Material::Passthrough(first) = normalize(&raw, GREY).0 else { panic!("expected passthrough") };
        assert_eq!(first.backend, "Appleseed");

        let (material, _) = Normalizer::new().with_backend("luxcore").normalize(&raw, GREY);
        let Material::Passthrough(chosen) = material else { panic!("expected passthrough") };
        assert_eq!(chosen.backend, "luxcore");
        assert_eq!(chosen.text, "scene.materials.%NAME%.type = \"matte\"");
    }

    #[test]
    fn test_inherited_passthrough_for_target_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Base.FCMat"),
            "Passthrough.Appleseed = <material />\nPassthrough.LuxCore = scene.materials.%NAME%.type = \"matte\"\n",
        )
        .unwrap();
        let store = CardStore::new([dir.path()]);
        let raw = RawParams::from([("Father", "Base")]);
        let (material, diagnostics) = Normalizer::with_cards(&store).with_backend("LuxCore").normalize(&raw, GREY);
        assert!(diagnostics.is_empty());
        let Material::Passthrough(chosen) = material else { panic!("expected passthrough") };
        assert_eq!(chosen.backend, "LuxCore");
        assert!(chosen.text.contains("\"matte\""));
    }
}

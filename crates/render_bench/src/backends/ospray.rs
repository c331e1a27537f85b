//! OSPRay Studio backend
//!
//! The scene is an `.sg` JSON scene graph. Meshes are OBJ sidecars pulled in
//! by `IMPORTER` nodes and share one MTL sidecar holding every material.
//! Lights are `LIGHT` nodes handed to the lights manager. OSPRay is Y up, so
//! positions and directions go through [`to_y_up`].

use serde_json::{json, Value};

use super::sdl::{self, join, terminated, SCENE_STEM_TOKEN};
use super::{
    capability_fallback, Backend, Capabilities, Fragment, SceneGlobals, SceneParts, SceneText,
    Section, Sidecar, TextureNames, TextureRole,
};
use crate::foundation::math::{to_y_up, Vec3};
use crate::material::{ColorValue, Material, MaterialKind, Rgb, ScalarValue, TextureRef};
use crate::scene::{AreaLight, Camera, ImageLight, MeshObject, PointLight, SunskyLight};

/// Scale from area light radiance in W/m² to quad light intensity
const AREA_INTENSITY: f64 = 0.001;
const SUN_INTENSITY: f64 = 0.05;

/// OSPRay Studio
#[derive(Debug, Default, Clone, Copy)]
pub struct Ospray;

/// `PARAMETER` child of a scene graph node
fn parameter(name: &str, sub_type: &str, value: Value) -> Value {
    json!({
        "name": name,
        "type": "PARAMETER",
        "subType": sub_type,
        "sgOnly": false,
        "value": value,
    })
}

fn light(name: &str, sub_type: &str, parameters: Vec<Value>) -> String {
    pretty(&json!({
        "name": name,
        "type": "LIGHT",
        "subType": sub_type,
        "children": parameters,
    }))
}

fn vec3f(v: &Vec3) -> Value {
    let v = to_y_up(v);
    json!([v.x, v.y, v.z])
}

fn rgb(color: Rgb) -> Value {
    json!(color.to_array())
}

fn pretty(value: &Value) -> String {
    format!("{value:#}\n")
}

/// MTL lines of one material, in OSPRay's principled vocabulary
struct Mtl {
    text: String,
}

impl Mtl {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            text: format!("newmtl {name}\ntype {kind}\n"),
        }
    }

    fn line(&mut self, key: &str, value: impl std::fmt::Display) -> &mut Self {
        self.text.push_str(&format!("{key} {value}\n"));
        self
    }

    /// `key r g b`, plus `map_key` when the color is textured
    fn color(&mut self, key: &str, value: &ColorValue) -> &mut Self {
        self.line(key, sdl::rgb(value.constant()));
        if let Some(texture) = value.texture() {
            self.map(key, texture);
        }
        self
    }

    /// `key v`, plus `map_key` when the value is textured
    fn scalar(&mut self, key: &str, value: &ScalarValue) -> &mut Self {
        self.line(key, sdl::Num(value.constant()));
        if let Some(texture) = value.texture() {
            self.map(key, texture);
        }
        self
    }

    fn map(&mut self, key: &str, texture: &TextureRef) {
        let scale = sdl::Num(texture.scale);
        self.line(&format!("map_{key}"), texture.path.to_string_lossy().replace('\\', "/"));
        self.line(&format!("map_{key}.scale"), format!("{scale} {scale}"));
    }

    fn finish(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

impl Ospray {
    fn material(name: &str, material: &Material) -> String {
        match material {
            Material::Passthrough(pass) => format!("newmtl {name}\n{}", sdl::passthrough(name, pass)),
            Material::Glass(g) => Mtl::new(name, "principled")
                .scalar("ior", &g.ior)
                .color("transmissionColor", &g.color)
                .line("transmission", 1)
                .line("specular", 1)
                .line("metallic", 0)
                .line("diffuse", 0)
                .line("opacity", 1)
                .finish(),
            Material::Disney(d) => Mtl::new(name, "principled")
                .color("baseColor", &d.base_color)
                .scalar("metallic", &d.metallic)
                .scalar("specular", &d.specular)
                .scalar("roughness", &d.roughness)
                .scalar("anisotropy", &d.anisotropic)
                .scalar("sheen", &d.sheen)
                .scalar("sheenTint", &d.sheen_tint)
                .scalar("coat", &d.clearcoat)
                .line("coatRoughness", sdl::Num(1.0 - d.clearcoat_gloss.constant()))
                .finish(),
            Material::Diffuse(d) => Mtl::new(name, "principled")
                .color("baseColor", &d.color)
                .line("metallic", 0)
                .line("specular", 0)
                .line("diffuse", 1)
                .finish(),
            Material::Mixed(m) => {
                let transparency = m.transparency.constant();
                Mtl::new(name, "principled")
                    .color("baseColor", &m.diffuse.color)
                    .scalar("ior", &m.glass.ior)
                    .line("transmission", sdl::Num(transparency))
                    .color("transmissionColor", &m.glass.color)
                    .line("opacity", sdl::Num(1.0 - transparency))
                    .line("specular", 0.5)
                    .finish()
            }
            Material::Carpaint(c) => Mtl::new(name, "carPaint").color("baseColor", &c.base_color).finish(),
            Material::Emission(e) => Mtl::new(name, "luminous")
                .color("color", &e.color)
                .line("intensity", sdl::Num(e.power.constant()))
                .line("transparency", 0)
                .finish(),
            Material::Substrate(_) => Mtl::new(name, "obj")
                .line("kd", sdl::rgb(material.principal_color().unwrap_or(Rgb::GREY)))
                .line("ns", 2)
                .finish(),
        }
    }
}

impl Backend for Ospray {
    fn id(&self) -> &'static str {
        "Ospray"
    }

    fn extension(&self) -> &'static str {
        "sg"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PASSTHROUGH
            | Capabilities::GLASS
            | Capabilities::DISNEY
            | Capabilities::DIFFUSE
            | Capabilities::MIXED
            | Capabilities::CARPAINT
            | Capabilities::EMISSION
    }

    fn accepts_texture(&self, kind: MaterialKind, field: &str) -> bool {
        !matches!(
            (kind, field),
            (MaterialKind::Emission | MaterialKind::Substrate, _)
                | (MaterialKind::Glass, "ior")
                | (MaterialKind::Mixed, "glass.ior" | "transparency")
                | (MaterialKind::Disney, "subsurface" | "specular_tint" | "clearcoat_gloss")
        )
    }

    fn default_executable(&self) -> &'static str {
        "ospStudio"
    }

    fn default_args(&self) -> &'static [&'static str] {
        &[
            "batch",
            "--resolution",
            "{width}x{height}",
            "--spp",
            "{spp}",
            "--image",
            "{stem}",
            "{scene}",
        ]
    }

    fn default_sampler(&self) -> &'static str {
        "random"
    }

    fn default_integrator(&self) -> &'static str {
        "pathtracer"
    }

    // Maps are written inline by each material
    fn emit_texture(&self, _name: &str, _texture: &TextureRef, _role: TextureRole) -> String {
        String::new()
    }

    fn emit_material(&self, name: &str, material: &Material, _textures: &TextureNames) -> String {
        match capability_fallback(self, material) {
            Some(fallback) => Self::material(name, &fallback),
            None => Self::material(name, material),
        }
    }

    fn emit_mesh(&self, name: &str, mesh: &MeshObject, material: &str) -> Fragment {
        let mut obj = format!("# Generated by render_bench\nmtllib {SCENE_STEM_TOKEN}.mtl\n");
        for v in &mesh.vertices {
            obj.push_str(&format!("v {}\n", sdl::vec3(&to_y_up(&v.coords))));
        }
        if let Some(uvs) = &mesh.uvs {
            for uv in uvs {
                obj.push_str(&format!("vt {}\n", join([uv.x, uv.y])));
            }
        }
        obj.push_str(&format!("o {name}\nusemtl {material}\n"));
        for t in &mesh.triangles {
            let [a, b, c] = t.map(|i| i + 1);
            if mesh.uvs.is_some() {
                obj.push_str(&format!("f {a}/{a} {b}/{b} {c}/{c}\n"));
            } else {
                obj.push_str(&format!("f {a} {b} {c}\n"));
            }
        }

        let importer = json!({
            "name": name,
            "type": "IMPORTER",
            "filename": format!("{SCENE_STEM_TOKEN}_{name}.obj"),
        });
        Fragment {
            text: pretty(&importer),
            sidecars: vec![Sidecar::new(format!("_{name}.obj"), obj)],
        }
    }

    fn emit_camera(&self, name: &str, camera: &Camera) -> String {
        let rotation = camera.placement.rotation;
        pretty(&json!({
            "name": name,
            "children": [parameter("fovy", "float", json!(camera.fov))],
            "cameraToWorld": {
                "affine": vec3f(&camera.placement.translation.vector),
                "linear": {
                    "x": vec3f(&(rotation * Vec3::x())),
                    "y": vec3f(&(rotation * Vec3::y())),
                    "z": vec3f(&(rotation * Vec3::z())),
                },
            },
        }))
    }

    fn emit_pointlight(&self, name: &str, light_source: &PointLight) -> String {
        light(
            name,
            "sphere",
            vec![
                parameter("visible", "bool", json!(true)),
                parameter("intensity", "float", json!(light_source.power)),
                parameter("color", "rgb", rgb(light_source.color)),
                parameter("position", "vec3f", vec3f(&light_source.position().coords)),
            ],
        )
    }

    fn emit_arealight(&self, name: &str, light_source: &AreaLight) -> String {
        let [width, height] = light_source.size;
        let rotation = light_source.placement.rotation;
        let corner = light_source.corners()[0];
        let radiance = light_source.power / (width * height) * AREA_INTENSITY;
        light(
            name,
            "quad",
            vec![
                parameter("visible", "bool", json!(!light_source.transparent)),
                parameter("intensity", "float", json!(radiance)),
                parameter("color", "rgb", rgb(light_source.color)),
                parameter("position", "vec3f", vec3f(&corner.coords)),
                parameter("edge1", "vec3f", vec3f(&(rotation * Vec3::new(width, 0.0, 0.0)))),
                parameter("edge2", "vec3f", vec3f(&(rotation * Vec3::new(0.0, height, 0.0)))),
            ],
        )
    }

    fn emit_sunsky(&self, name: &str, light_source: &SunskyLight) -> String {
        let dir = to_y_up(&light_source.direction.normalize());
        let elevation = dir.y.clamp(-1.0, 1.0).asin().to_degrees();
        let azimuth = dir.x.atan2(dir.z).to_degrees();
        light(
            name,
            "sunSky",
            vec![
                parameter("visible", "bool", json!(true)),
                parameter("intensity", "float", json!(SUN_INTENSITY)),
                parameter("color", "rgb", rgb(Rgb::WHITE)),
                parameter("up", "vec3f", json!([0.0, 1.0, 0.0])),
                parameter("elevation", "float", json!(elevation)),
                parameter("azimuth", "float", json!(azimuth)),
                parameter("turbidity", "float", json!(light_source.turbidity)),
                parameter("albedo", "float", json!(light_source.albedo)),
            ],
        )
    }

    fn emit_imagelight(&self, name: &str, light_source: &ImageLight) -> String {
        let (sin, cos) = light_source.rotation.to_radians().sin_cos();
        light(
            name,
            "hdri",
            vec![
                parameter("visible", "bool", json!(true)),
                parameter("intensity", "float", json!(1.0)),
                parameter(
                    "filename",
                    "filename",
                    json!(light_source.hdri_path.to_string_lossy().replace('\\', "/")),
                ),
                parameter("up", "vec3f", json!([0.0, 1.0, 0.0])),
                parameter("direction", "vec3f", json!([sin, 0.0, cos])),
            ],
        )
    }

    fn write_scene(&self, parts: &SceneParts, globals: &SceneGlobals) -> SceneText {
        let nodes = |section| -> Vec<Value> {
            parts
                .section(section)
                .iter()
                .filter_map(|fragment| match serde_json::from_str(fragment) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        log::warn!("Skipping malformed OSPRay {section:?} node: {err}");
                        None
                    }
                })
                .collect()
        };

        let mut scene = json!({
            "world": {
                "name": "world",
                "type": "WORLD",
                "children": nodes(Section::Meshes),
            },
            "lightsManager": {
                "name": "lights",
                "type": "LIGHTS",
                "children": nodes(Section::Lights),
            },
        });
        if let Some(camera) = nodes(Section::Camera).pop() {
            scene["camera"] = camera;
        }
        log::debug!(
            "OSPRay scene {}x{} at {} spp is set on the command line",
            globals.width,
            globals.height,
            globals.spp
        );

        let mut materials = String::from("# Generated by render_bench\n");
        materials.push_str(&parts.section_text(Section::Textures));
        materials.push_str(&parts.section_text(Section::Materials));

        SceneText {
            text: terminated(pretty(&scene)),
            sidecars: vec![Sidecar::new(".mtl", materials)],
        }
    }
}

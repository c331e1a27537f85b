//! LuxCore backend
//!
//! Scenes are written as flat `scene.<kind>.<name>.<property> = value`
//! properties. Render settings go to a `.cfg` sidecar that points back at the
//! scene file.

use std::fmt::Display;

use super::sdl::{self, join, point3, quote, quote_path, rgb, terminated, vec3, Num, SCENE_STEM_TOKEN};
use super::{
    capability_fallback, Backend, Capabilities, Fragment, SceneGlobals, SceneParts, SceneText,
    Sidecar, TextureNames, TextureRole,
};
use crate::foundation::math::{column_major, LookAt};
use crate::material::{ColorValue, Material, MaterialKind, Rgb, ScalarValue, TextureRef};
use crate::scene::{AreaLight, Camera, ImageLight, MeshObject, PointLight, SunskyLight};

/// Luminous efficacy of an incandescent bulb, in lumens per watt
const EFFICACY: f64 = 15.0;
const LIGHT_GAIN: f64 = 10.0;
const AREA_GAIN: f64 = 0.001;

/// LuxCore 2.x
#[derive(Debug, Default, Clone, Copy)]
pub struct LuxCore;

/// Properties sharing one prefix
struct Props {
    prefix: String,
    text: String,
}

impl Props {
    fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            text: String::new(),
        }
    }

    fn set(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.text.push_str(&format!("{}.{key} = {value}\n", self.prefix));
        self
    }

    fn finish(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

fn color(value: &ColorValue, textures: &TextureNames) -> String {
    textures
        .color(value)
        .map_or_else(|| rgb(value.constant()), str::to_string)
}

fn scalar(value: &ScalarValue, textures: &TextureNames) -> String {
    textures
        .scalar(value)
        .map_or_else(|| Num(value.constant()).to_string(), str::to_string)
}

impl LuxCore {
    fn material(name: &str, material: &Material, textures: &TextureNames) -> String {
        let mut p = Props::new(format!("scene.materials.{name}"));
        match material {
            Material::Passthrough(pass) => return sdl::passthrough(name, pass),
            Material::Glass(glass) => {
                p.set("type", quote("glass"))
                    .set("kt", color(&glass.color, textures))
                    .set("interiorior", scalar(&glass.ior, textures));
            }
            Material::Disney(d) => {
                p.set("type", quote("disney"))
                    .set("basecolor", color(&d.base_color, textures))
                    .set("subsurface", scalar(&d.subsurface, textures))
                    .set("metallic", scalar(&d.metallic, textures))
                    .set("specular", scalar(&d.specular, textures))
                    .set("speculartint", scalar(&d.specular_tint, textures))
                    .set("roughness", scalar(&d.roughness, textures))
                    .set("anisotropic", scalar(&d.anisotropic, textures))
                    .set("sheen", scalar(&d.sheen, textures))
                    .set("sheentint", scalar(&d.sheen_tint, textures))
                    .set("clearcoat", scalar(&d.clearcoat, textures))
                    .set("clearcoatgloss", scalar(&d.clearcoat_gloss, textures));
            }
            Material::Diffuse(d) => {
                p.set("type", quote("matte")).set("kd", color(&d.color, textures));
            }
            Material::Mixed(m) => {
                let diffuse = format!("{name}_diffuse");
                let glass = format!("{name}_glass");
                let mut text = Self::material(&diffuse, &Material::Diffuse(m.diffuse.clone()), textures);
                text.push_str(&Self::material(&glass, &Material::Glass(m.glass.clone()), textures));
                p.set("type", quote("mix"))
                    .set("material1", diffuse)
                    .set("material2", glass)
                    .set("amount", scalar(&m.transparency, textures));
                text.push_str(&p.finish());
                return text;
            }
            Material::Carpaint(c) => {
                p.set("type", quote("carpaint"))
                    .set("kd", color(&c.base_color, textures));
            }
            Material::Substrate(s) => {
                let roughness = scalar(&s.roughness, textures);
                p.set("type", quote("glossy2"))
                    .set("kd", color(&s.diffuse, textures))
                    .set("ks", color(&s.specular, textures))
                    .set("uroughness", &roughness)
                    .set("vroughness", &roughness);
            }
            Material::Emission(e) => {
                // gain is a plain RGB triple, never a texture
                let power = Num(e.power.constant());
                p.set("type", quote("matte"))
                    .set("kd", rgb(Rgb::BLACK))
                    .set("emission", color(&e.color, textures))
                    .set("emission.gain", format!("{power} {power} {power}"));
            }
        }
        p.finish()
    }
}

impl Backend for LuxCore {
    fn id(&self) -> &'static str {
        "LuxCore"
    }

    fn extension(&self) -> &'static str {
        "scn"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn accepts_texture(&self, kind: MaterialKind, field: &str) -> bool {
        !(kind == MaterialKind::Emission && field == "power")
    }

    fn default_executable(&self) -> &'static str {
        "luxcoreconsole"
    }

    fn default_args(&self) -> &'static [&'static str] {
        &["-o", "{stem}.cfg", "-f", "{scene}"]
    }

    fn default_sampler(&self) -> &'static str {
        "SOBOL"
    }

    fn default_integrator(&self) -> &'static str {
        "PATHCPU"
    }

    fn emit_texture(&self, name: &str, texture: &TextureRef, role: TextureRole) -> String {
        let scale = Num(texture.scale);
        Props::new(format!("scene.textures.{name}"))
            .set("type", quote("imagemap"))
            .set("file", quote_path(&texture.path))
            .set("gamma", Num(role.gamma()))
            .set("mapping.type", quote("uvmapping2d"))
            .set("mapping.uvindex", texture.uv_channel)
            .set("mapping.uvscale", format!("{scale} {scale}"))
            .finish()
    }

    fn emit_material(&self, name: &str, material: &Material, textures: &TextureNames) -> String {
        match capability_fallback(self, material) {
            Some(fallback) => Self::material(name, &fallback, textures),
            None => Self::material(name, material, textures),
        }
    }

    fn emit_mesh(&self, name: &str, mesh: &MeshObject, material: &str) -> Fragment {
        let mut p = Props::new(format!("scene.objects.{name}"));
        p.set("type", quote("inlinedmesh"))
            .set("vertices", join(mesh.vertices.iter().flat_map(|v| [v.x, v.y, v.z])))
            .set(
                "faces",
                mesh.triangles
                    .iter()
                    .flatten()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" "),
            );
        if let Some(uvs) = &mesh.uvs {
            p.set("uvs", join(uvs.iter().flat_map(|uv| [uv.x, uv.y])));
        }
        p.set("material", material)
            .set("transformation", "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1");
        Fragment::text(p.finish())
    }

    fn emit_camera(&self, name: &str, camera: &Camera) -> String {
        let look = LookAt::from_placement(&camera.placement);
        let mut text = format!("# Camera '{name}'\n");
        text.push_str(
            &Props::new("scene.camera")
                .set("type", quote("perspective"))
                .set("lookat.orig", point3(&look.origin))
                .set("lookat.target", point3(&look.target))
                .set("up", vec3(&look.up))
                .set("fieldofview", Num(camera.fov))
                .finish(),
        );
        text
    }

    fn emit_pointlight(&self, name: &str, light: &PointLight) -> String {
        let gain = Num(LIGHT_GAIN);
        Props::new(format!("scene.lights.{name}"))
            .set("type", quote("point"))
            .set("position", point3(&light.position()))
            .set("color", rgb(light.color))
            .set("power", Num(light.power))
            .set("gain", format!("{gain} {gain} {gain}"))
            .set("efficency", Num(EFFICACY))
            .finish()
    }

    fn emit_arealight(&self, name: &str, light: &AreaLight) -> String {
        let (u, v) = (light.size[0] / 2.0, light.size[1] / 2.0);
        let gain = Num(AREA_GAIN);
        let mut text = Props::new(format!("scene.materials.{name}"))
            .set("type", quote("matte"))
            .set("kd", rgb(Rgb::BLACK))
            .set("emission", rgb(light.color))
            .set("emission.gain", format!("{gain} {gain} {gain}"))
            .set("emission.power", Num(light.power))
            .set("emission.efficency", Num(EFFICACY))
            .finish();
        let mut object = Props::new(format!("scene.objects.{name}"));
        object
            .set("type", quote("inlinedmesh"))
            .set("vertices", join([-u, -v, 0.0, u, -v, 0.0, u, v, 0.0, -u, v, 0.0]))
            .set("faces", "0 1 2 0 2 3 0 2 1 0 3 2")
            .set("material", name)
            .set("transformation", join(column_major(&light.placement)));
        if light.transparent {
            object.set("camerainvisible", 1);
        }
        text.push_str(&object.finish());
        text
    }

    fn emit_sunsky(&self, name: &str, light: &SunskyLight) -> String {
        let dir = vec3(&light.direction.normalize());
        let albedo = Num(light.albedo);
        let mut text = Props::new(format!("scene.lights.{name}_sun"))
            .set("type", quote("sun"))
            .set("turbidity", Num(light.turbidity))
            .set("dir", &dir)
            .finish();
        text.push_str(
            &Props::new(format!("scene.lights.{name}_sky"))
                .set("type", quote("sky2"))
                .set("turbidity", Num(light.turbidity))
                .set("dir", &dir)
                .set("groundalbedo", format!("{albedo} {albedo} {albedo}"))
                .finish(),
        );
        text
    }

    fn emit_imagelight(&self, name: &str, light: &ImageLight) -> String {
        // Z rotation applied after the X mirror LuxCore expects for
        // equirectangular maps
        let (sin, cos) = light.rotation.to_radians().sin_cos();
        let transformation = [
            -cos, -sin, 0.0, 0.0, -sin, cos, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        Props::new(format!("scene.lights.{name}"))
            .set("type", quote("infinite"))
            .set("file", quote_path(&light.hdri_path))
            .set("gamma", Num(1.0))
            .set("transformation", join(transformation))
            .finish()
    }

    fn write_scene(&self, parts: &SceneParts, globals: &SceneGlobals) -> SceneText {
        let mut text = String::from("# Generated by render_bench\n");
        text.push_str(&parts.joined(self.section_order()));

        let config = Props::new("film")
            .set("width", globals.width)
            .set("height", globals.height)
            .set("outputs.0.type", quote("RGB_IMAGEPIPELINE"))
            .set("outputs.0.filename", quote(&globals.output))
            .set("imagepipelines.0.0.type", quote("TONEMAP_AUTOLINEAR"))
            .set("imagepipelines.0.1.type", quote("GAMMA_CORRECTION"))
            .set("imagepipelines.0.1.value", Num(2.2))
            .finish()
            + &format!(
                "renderengine.type = {}\nsampler.type = {}\nbatch.haltspp = {}\nscene.file = {}\n",
                quote(&globals.integrator),
                quote(&globals.sampler),
                globals.spp,
                quote(&format!("{SCENE_STEM_TOKEN}.{}", self.extension())),
            );

        SceneText {
            text: terminated(text),
            sidecars: vec![Sidecar::new(".cfg", config)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fixtures;
    use crate::foundation::math::{placement, Point3, Vec3};
    use crate::material::{Emission, Glass, Passthrough, ScalarValue, TexturedScalar};

    #[test]
    fn test_glass_declaration() {
        let glass = Material::Glass(Glass {
            ior: 1.52.into(),
            color: Rgb::new(0.9, 0.9, 1.0).into(),
        });
        let text = LuxCore.emit_material("Cube_glass", &glass, &TextureNames::new());
        assert!(text.contains("scene.materials.Cube_glass.type = \"glass\"\n"));
        assert!(text.contains("scene.materials.Cube_glass.interiorior = 1.52\n"));
        assert!(text.contains("scene.materials.Cube_glass.kt = 0.9 0.9 1.0\n"));
    }

    #[test]
    fn test_every_kind_declares_its_name() {
        for material in fixtures::all_materials("LuxCore") {
            let text = LuxCore.emit_material("M_x", &material, &TextureNames::new());
            assert!(text.contains("M_x"), "{material:?}");
            if material.kind() != MaterialKind::Passthrough {
                assert!(text.contains("scene.materials.M_x.type = "), "{material:?}");
            }
            assert!(text.ends_with('\n'));
        }
    }

    #[test]
    fn test_mixed_declares_children() {
        let text = LuxCore.emit_material("Vase_mixed", &fixtures::mixed(), &TextureNames::new());
        assert!(text.contains("scene.materials.Vase_mixed_diffuse.type = \"matte\""));
        assert!(text.contains("scene.materials.Vase_mixed_glass.type = \"glass\""));
        assert!(text.contains("scene.materials.Vase_mixed.material1 = Vase_mixed_diffuse"));
        assert!(text.contains("scene.materials.Vase_mixed.material2 = Vase_mixed_glass"));
    }

    #[test]
    fn test_foreign_passthrough_is_not_inlined() {
        let material = Material::Passthrough(Passthrough {
            backend: "Appleseed".into(),
            text: "material foo { }".into(),
        });
        let text = LuxCore.emit_material("Cube_passthrough", &material, &TextureNames::new());
        assert!(!text.contains("material foo"));
        assert!(text.contains("\"matte\""));
    }

    #[test]
    fn test_textured_field_uses_texture_name() {
        let texture = TextureRef::new("wood.png", 0, 2.0);
        let mut names = TextureNames::new();
        names.insert(texture.clone(), "wood_texture".into());
        let material = fixtures::textured_diffuse(texture.clone());
        let text = LuxCore.emit_material("Table_diffuse", &material, &names);
        assert!(text.contains("scene.materials.Table_diffuse.kd = wood_texture\n"));

        let tex = LuxCore.emit_texture("wood_texture", &texture, TextureRole::Color);
        assert!(tex.contains("scene.textures.wood_texture.file = \"wood.png\"\n"));
        assert!(tex.contains("scene.textures.wood_texture.gamma = 2.2\n"));
        assert!(tex.contains("scene.textures.wood_texture.mapping.uvscale = 2.0 2.0\n"));
    }

    #[test]
    fn test_emission_gain_is_numeric() {
        let texture = TextureRef::new("t.png", 0, 1.0);
        let mut names = TextureNames::new();
        names.insert(texture.clone(), "t_texture".into());
        let material = Material::Emission(Emission {
            color: Rgb::WHITE.into(),
            power: ScalarValue::Textured(TexturedScalar { texture, fallback: 4.0 }),
        });
        let text = LuxCore.emit_material("Lamp_emission", &material, &names);
        assert!(text.contains("scene.materials.Lamp_emission.emission.gain = 4.0 4.0 4.0\n"));
        assert!(!text.contains("t_texture"));
        assert!(!LuxCore.accepts_texture(MaterialKind::Emission, "power"));
        assert!(LuxCore.accepts_texture(MaterialKind::Emission, "color"));
    }

    #[test]
    fn test_mesh_fragment() {
        let fragment = LuxCore.emit_mesh("Tri_mesh", &fixtures::triangle(), "Tri_diffuse");
        assert!(fragment.sidecars.is_empty());
        assert!(fragment
            .text
            .contains("scene.objects.Tri_mesh.vertices = 0.0 0.0 0.0 1.0 0.0 0.0 0.0 1.0 0.0\n"));
        assert!(fragment.text.contains("scene.objects.Tri_mesh.faces = 0 1 2\n"));
        assert!(fragment.text.contains("scene.objects.Tri_mesh.material = Tri_diffuse\n"));
    }

    #[test]
    fn test_camera_and_lights() {
        let camera = Camera {
            name: "Cam".into(),
            placement: placement(Vec3::new(0.0, 0.0, 5.0), Vec3::z(), 0.0),
            fov: 45.0,
            aspect: 1.0,
        };
        let text = LuxCore.emit_camera("Cam_camera", &camera);
        assert!(text.contains("scene.camera.lookat.orig = 0.0 0.0 5.0\n"));
        assert!(text.contains("scene.camera.lookat.target = 0.0 0.0 4.0\n"));
        assert!(text.contains("scene.camera.fieldofview = 45.0\n"));

        let light = PointLight {
            name: "Bulb".into(),
            placement: placement(Vec3::new(1.0, 2.0, 3.0), Vec3::z(), 0.0),
            color: Rgb::WHITE,
            power: 60.0,
        };
        let text = LuxCore.emit_pointlight("Bulb_pointlight", &light);
        assert!(text.contains("scene.lights.Bulb_pointlight.position = 1.0 2.0 3.0\n"));
        assert!(text.contains("scene.lights.Bulb_pointlight.efficency = 15.0\n"));

        let sun = SunskyLight {
            name: "Sun".into(),
            direction: Vec3::new(0.0, 0.0, 2.0),
            turbidity: 2.2,
            albedo: 0.2,
        };
        let text = LuxCore.emit_sunsky("Sun_sunsky", &sun);
        assert!(text.contains("scene.lights.Sun_sunsky_sun.dir = 0.0 0.0 1.0\n"));
        assert!(text.contains("scene.lights.Sun_sunsky_sky.type = \"sky2\"\n"));
        assert!(text.contains("scene.lights.Sun_sunsky_sky.groundalbedo = 0.2 0.2 0.2\n"));
    }

    #[test]
    fn test_area_light_is_double_sided() {
        let light = AreaLight {
            name: "Panel".into(),
            placement: placement(Vec3::new(0.0, 0.0, 2.0), Vec3::z(), 0.0),
            size: [2.0, 1.0],
            color: Rgb::WHITE,
            power: 100.0,
            transparent: true,
        };
        let text = LuxCore.emit_arealight("Panel_arealight", &light);
        assert!(text.contains("scene.objects.Panel_arealight.faces = 0 1 2 0 2 3 0 2 1 0 3 2\n"));
        assert!(text.contains(
            "scene.objects.Panel_arealight.transformation = 1.0 0.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 0.0 1.0 0.0 0.0 0.0 2.0 1.0\n"
        ));
        assert!(text.contains("scene.objects.Panel_arealight.camerainvisible = 1\n"));
        assert_eq!(light.corners()[0], Point3::new(-1.0, -0.5, 2.0));
    }

    #[test]
    fn test_config_sidecar() {
        let globals = SceneGlobals::for_backend(&LuxCore, 800, 600, 32);
        let scene = LuxCore.write_scene(&SceneParts::new(), &globals);
        assert_eq!(scene.sidecars.len(), 1);
        let config = &scene.sidecars[0];
        assert_eq!(config.suffix, ".cfg");
        assert!(config.contents.contains("film.width = 800\n"));
        assert!(config.contents.contains("film.height = 600\n"));
        assert!(config.contents.contains("batch.haltspp = 32\n"));
        assert!(config.contents.contains("renderengine.type = \"PATHCPU\"\n"));
        assert!(config.contents.contains("scene.file = \"@@SCENE_STEM@@.scn\"\n"));
        assert!(config.contents.contains("film.outputs.0.filename = \"@@SCENE_STEM@@.png\"\n"));
    }
}

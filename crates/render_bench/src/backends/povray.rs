//! POV-Ray backend
//!
//! POV-Ray is left handed with Y up; positions and directions go through
//! [`to_left_handed`]. Materials are `#declare`d and referenced by name from
//! `mesh2` objects.

use std::path::Path;

use super::sdl::{self, terminated, Num};
use super::{
    capability_fallback, Backend, Capabilities, Fragment, SceneGlobals, SceneParts, SceneText,
    TextureNames, TextureRole,
};
use crate::foundation::math::{to_left_handed, LookAt, Vec3};
use crate::material::{ColorValue, Material, MaterialKind, Rgb, TextureRef};
use crate::scene::{AreaLight, Camera, ImageLight, MeshObject, PointLight, SunskyLight};

/// Power of a light shining with unit intensity, in watts
const UNIT_POWER: f64 = 100.0;
const SKY_COLOR: Rgb = Rgb::new(0.53, 0.81, 0.92);
const SUN_DISTANCE: f64 = 10_000.0;

/// POV-Ray 3.7
#[derive(Debug, Default, Clone, Copy)]
pub struct PovRay;

/// `<x, y, z>` in POV-Ray space
fn pov_vec(v: &Vec3) -> String {
    let v = to_left_handed(v);
    format!("<{}, {}, {}>", Num(v.x), Num(v.y), Num(v.z))
}

fn pov_rgb(color: Rgb) -> String {
    format!("<{}, {}, {}>", Num(color.r), Num(color.g), Num(color.b))
}

/// Image type keyword for `image_map`, from the file extension
fn image_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "jpeg",
        "tif" | "tiff" => "tiff",
        "hdr" => "hdr",
        "exr" => "exr",
        "tga" => "tga",
        "bmp" => "sys",
        _ => "png",
    }
}

fn pigment(value: &ColorValue, textures: &TextureNames) -> String {
    textures.color(value).map_or_else(
        || format!("pigment {{ color rgb {} }}", pov_rgb(value.constant())),
        |t| format!("pigment {{ {t} }}"),
    )
}

fn declare(name: &str, pigment: &str, finish: &str, ior: Option<f64>) -> String {
    let interior = ior.map_or_else(String::new, |ior| format!("  interior {{ ior {} }}\n", Num(ior)));
    format!(
        "#declare {name} = material {{\n  texture {{\n    {pigment}\n    finish {{ {finish} }}\n  }}\n{interior}}}\n"
    )
}

impl PovRay {
    fn material(name: &str, material: &Material, textures: &TextureNames) -> String {
        match material {
            Material::Passthrough(pass) => sdl::passthrough(name, pass),
            Material::Glass(g) => {
                let c = g.color.constant();
                declare(
                    name,
                    &format!("pigment {{ color rgbf <{}, {}, {}, 1.0> }}", Num(c.r), Num(c.g), Num(c.b)),
                    "specular 0.6 roughness 0.005 reflection { 0.05 }",
                    Some(g.ior.constant()),
                )
            }
            Material::Substrate(s) => {
                let specular = s.specular.constant().to_array().iter().sum::<f64>() / 3.0;
                declare(
                    name,
                    &pigment(&s.diffuse, textures),
                    &format!(
                        "diffuse 0.8 specular {} roughness {}",
                        Num(specular),
                        Num(s.roughness.constant().max(0.001))
                    ),
                    None,
                )
            }
            Material::Emission(e) => declare(
                name,
                &pigment(&e.color, textures),
                &format!("emission {} diffuse 0.0", Num(e.power.constant() / 10.0)),
                None,
            ),
            Material::Diffuse(d) => declare(name, &pigment(&d.color, textures), "diffuse 0.9", None),
            other => Self::material(
                name,
                &Material::diffuse(other.principal_color().unwrap_or(Rgb::GREY)),
                textures,
            ),
        }
    }
}

impl Backend for PovRay {
    fn id(&self) -> &'static str {
        "PovRay"
    }

    fn extension(&self) -> &'static str {
        "pov"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PASSTHROUGH
            | Capabilities::GLASS
            | Capabilities::DIFFUSE
            | Capabilities::SUBSTRATE
            | Capabilities::EMISSION
    }

    fn accepts_texture(&self, kind: MaterialKind, field: &str) -> bool {
        matches!(
            (kind, field),
            (MaterialKind::Diffuse | MaterialKind::Emission, "color") | (MaterialKind::Substrate, "diffuse")
        )
    }

    fn default_executable(&self) -> &'static str {
        "povray"
    }

    fn default_args(&self) -> &'static [&'static str] {
        &["+A", "-D", "+W{width}", "+H{height}", "+O{output}", "{scene}"]
    }

    fn default_sampler(&self) -> &'static str {
        "adaptive"
    }

    fn default_integrator(&self) -> &'static str {
        "raytrace"
    }

    fn emit_texture(&self, name: &str, texture: &TextureRef, role: TextureRole) -> String {
        format!(
            "#declare {name} = pigment {{\n  uv_mapping\n  image_map {{ {} {} gamma {} }}\n  scale {}\n}}\n",
            image_type(&texture.path),
            sdl::quote_path(&texture.path),
            Num(role.gamma()),
            Num(1.0 / texture.scale),
        )
    }

    fn emit_material(&self, name: &str, material: &Material, textures: &TextureNames) -> String {
        match capability_fallback(self, material) {
            Some(fallback) => Self::material(name, &fallback, textures),
            None => Self::material(name, material, textures),
        }
    }

    fn emit_mesh(&self, name: &str, mesh: &MeshObject, material: &str) -> Fragment {
        let mut text = format!("// Object '{name}'\nmesh2 {{\n  vertex_vectors {{\n    {},\n", mesh.vertices.len());
        text.push_str(
            &mesh
                .vertices
                .iter()
                .map(|v| format!("    {}", pov_vec(&v.coords)))
                .collect::<Vec<_>>()
                .join(",\n"),
        );
        text.push_str("\n  }\n");
        if let Some(uvs) = &mesh.uvs {
            text.push_str(&format!("  uv_vectors {{\n    {},\n", uvs.len()));
            text.push_str(
                &uvs.iter()
                    .map(|uv| format!("    <{}, {}>", Num(uv.x), Num(uv.y)))
                    .collect::<Vec<_>>()
                    .join(",\n"),
            );
            text.push_str("\n  }\n");
        }
        text.push_str(&format!("  face_indices {{\n    {},\n", mesh.triangles.len()));
        text.push_str(
            &mesh
                .triangles
                .iter()
                .map(|t| format!("    <{}, {}, {}>", t[0], t[1], t[2]))
                .collect::<Vec<_>>()
                .join(",\n"),
        );
        text.push_str(&format!("\n  }}\n  material {{ {material} }}\n}}\n"));
        Fragment::text(text)
    }

    fn emit_camera(&self, name: &str, camera: &Camera) -> String {
        let look = LookAt::from_placement(&camera.placement);
        format!(
            "// Camera '{name}'\ncamera {{\n  perspective\n  location {}\n  look_at {}\n  sky {}\n  angle {}\n  right x*{}\n}}\n",
            pov_vec(&look.origin.coords),
            pov_vec(&look.target.coords),
            pov_vec(&look.up),
            Num(camera.fov),
            Num(camera.aspect),
        )
    }

    fn emit_pointlight(&self, name: &str, light: &PointLight) -> String {
        format!(
            "// Pointlight '{name}'\nlight_source {{\n  {}\n  color rgb {} * {}\n}}\n",
            pov_vec(&light.position().coords),
            pov_rgb(light.color),
            Num(light.power / UNIT_POWER),
        )
    }

    fn emit_arealight(&self, name: &str, light: &AreaLight) -> String {
        let rotation = light.placement.rotation;
        let u = rotation * Vec3::new(light.size[0], 0.0, 0.0);
        let v = rotation * Vec3::new(0.0, light.size[1], 0.0);
        // looks_like shapes are placed relative to the light
        let shape = if light.transparent {
            String::new()
        } else {
            let (hu, hv) = (light.size[0] / 2.0, light.size[1] / 2.0);
            let corners = [(-hu, -hv), (hu, -hv), (hu, hv), (-hu, hv), (-hu, -hv)]
                .map(|(x, y)| pov_vec(&(rotation * Vec3::new(x, y, 0.0))));
            format!(
                "  looks_like {{\n    polygon {{ 5, {} pigment {{ color rgb {} }} finish {{ emission 1.0 }} }}\n  }}\n",
                corners.join(", "),
                pov_rgb(light.color),
            )
        };
        format!(
            "// Arealight '{name}'\nlight_source {{\n  {}\n  color rgb {} * {}\n  area_light {}, {}, 5, 5\n  adaptive 1\n  jitter\n{shape}}}\n",
            pov_vec(&light.placement.translation.vector),
            pov_rgb(light.color),
            Num(light.power / UNIT_POWER),
            pov_vec(&u),
            pov_vec(&v),
        )
    }

    fn emit_sunsky(&self, name: &str, light: &SunskyLight) -> String {
        format!(
            "// Sunsky '{name}', turbidity {}\nlight_source {{\n  {}\n  color rgb <1.0, 1.0, 1.0>\n  parallel\n  point_at <0.0, 0.0, 0.0>\n}}\nsky_sphere {{\n  pigment {{\n    gradient y\n    color_map {{ [0.0 color rgb <1.0, 1.0, 1.0>] [0.3 color rgb {}] }}\n  }}\n}}\n",
            Num(light.turbidity),
            pov_vec(&(light.direction.normalize() * SUN_DISTANCE)),
            pov_rgb(SKY_COLOR),
        )
    }

    fn emit_imagelight(&self, name: &str, light: &ImageLight) -> String {
        format!(
            "// Imagelight '{name}'\nsky_sphere {{\n  pigment {{\n    image_map {{ {} {} gamma 1.0 map_type 1 interpolate 2 }}\n  }}\n  rotate <0.0, {}, 0.0>\n}}\n",
            image_type(&light.hdri_path),
            sdl::quote_path(&light.hdri_path),
            Num(light.rotation),
        )
    }

    fn write_scene(&self, parts: &SceneParts, globals: &SceneGlobals) -> SceneText {
        let radiosity = if globals.integrator.eq_ignore_ascii_case("radiosity") {
            format!(" radiosity {{ count {} }}", globals.spp)
        } else {
            String::new()
        };
        let mut text = format!(
            "// Generated by render_bench\n#version 3.7;\nglobal_settings {{ assumed_gamma 1.0{radiosity} }}\n"
        );
        text.push_str(&parts.joined(self.section_order()));
        SceneText::text(terminated(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{fixtures, Section};
    use crate::foundation::math::placement;

    #[test]
    fn test_every_kind_declares_a_material() {
        for material in fixtures::all_materials("PovRay") {
            let text = PovRay.emit_material("M_x", &material, &TextureNames::new());
            assert!(text.contains("M_x"), "{material:?}");
            if material.kind() != MaterialKind::Passthrough {
                assert!(text.starts_with("#declare M_x = material {"), "{material:?}");
            }
        }
    }

    #[test]
    fn test_glass_carries_ior() {
        let text = PovRay.emit_material("Lens_glass", &fixtures::glass(), &TextureNames::new());
        assert!(text.contains("interior { ior 1.5 }"));
        assert!(text.contains("rgbf <1.0, 1.0, 1.0, 1.0>"));
    }

    #[test]
    fn test_mesh_is_left_handed() {
        let text = PovRay.emit_mesh("Tri_mesh", &fixtures::triangle(), "Tri_diffuse").text;
        // (0, 1, 0) becomes <0, 0, 1>
        assert!(text.contains("    <0.0, 0.0, 1.0>\n"));
        assert!(text.contains("  face_indices {\n    1,\n    <0, 1, 2>\n  }"));
        assert!(text.contains("  uv_vectors {\n    3,\n"));
        assert!(text.contains("material { Tri_diffuse }"));
    }

    #[test]
    fn test_textured_pigment() {
        let texture = TextureRef::new("maps/brick.JPG", 0, 0.5);
        let mut names = TextureNames::new();
        names.insert(texture.clone(), "brick_texture".into());
        let declared = PovRay.emit_texture("brick_texture", &texture, TextureRole::Color);
        assert!(declared.contains("image_map { jpeg \"maps/brick.JPG\" gamma 2.2 }"));
        assert!(declared.contains("scale 2.0"));
        let text = PovRay.emit_material("Wall_diffuse", &fixtures::textured_diffuse(texture), &names);
        assert!(text.contains("pigment { brick_texture }"));
    }

    #[test]
    fn test_scene_header_and_camera() {
        let camera = Camera {
            name: "Cam".into(),
            placement: placement(Vec3::new(0.0, 0.0, 5.0), Vec3::z(), 0.0),
            fov: 45.0,
            aspect: 1.5,
        };
        let mut parts = SceneParts::new();
        parts.push(Section::Camera, PovRay.emit_camera("Cam_camera", &camera));
        let globals = SceneGlobals::for_backend(&PovRay, 300, 200, 4);
        let text = PovRay.write_scene(&parts, &globals).text;
        assert!(text.starts_with("// Generated by render_bench\n#version 3.7;\n"));
        assert!(text.contains("location <0.0, 5.0, 0.0>"));
        assert!(text.contains("right x*1.5"));
        assert!(!text.contains("radiosity"));
    }

    #[test]
    fn test_only_pigments_take_textures() {
        assert!(PovRay.accepts_texture(MaterialKind::Diffuse, "color"));
        assert!(PovRay.accepts_texture(MaterialKind::Substrate, "diffuse"));
        assert!(PovRay.accepts_texture(MaterialKind::Emission, "color"));
        assert!(!PovRay.accepts_texture(MaterialKind::Substrate, "roughness"));
        assert!(!PovRay.accepts_texture(MaterialKind::Substrate, "specular"));
        assert!(!PovRay.accepts_texture(MaterialKind::Glass, "color"));
        assert!(!PovRay.accepts_texture(MaterialKind::Emission, "power"));
    }
}

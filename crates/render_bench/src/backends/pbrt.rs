//! pbrt-v4 backend
//!
//! Render options and the camera precede `WorldBegin`; everything else is
//! declared in world space. pbrt is left handed, so the camera block
//! mirrors X.

use super::sdl::{self, join, point3, quote, quote_path, rgb, terminated, Num};
use super::{
    capability_fallback, Backend, Capabilities, Fragment, SceneGlobals, SceneParts, SceneText,
    Section, TextureNames, TextureRole,
};
use crate::foundation::math::LookAt;
use crate::material::{ColorValue, Material, MaterialKind, Rgb, ScalarValue, TextureRef};
use crate::scene::{AreaLight, Camera, ImageLight, MeshObject, PointLight, SunskyLight};

const WORLD_SECTIONS: [Section; 4] = [
    Section::Lights,
    Section::Textures,
    Section::Materials,
    Section::Meshes,
];

/// pbrt version 4
#[derive(Debug, Default, Clone, Copy)]
pub struct Pbrt;

/// `"rgb <key>" [..]` or `"texture <key>" "<name>"`
fn color(key: &str, value: &ColorValue, textures: &TextureNames) -> String {
    textures.color(value).map_or_else(
        || format!("\"rgb {key}\" [{}]", rgb(value.constant())),
        |t| format!("\"texture {key}\" {}", quote(t)),
    )
}

/// `"float <key>" [..]` or `"texture <key>" "<name>"`
fn scalar(key: &str, value: &ScalarValue, textures: &TextureNames) -> String {
    textures.scalar(value).map_or_else(
        || format!("\"float {key}\" [{}]", Num(value.constant())),
        |t| format!("\"texture {key}\" {}", quote(t)),
    )
}

fn named_material(name: &str, kind: &str, params: &[String]) -> String {
    let mut text = format!("MakeNamedMaterial {}\n  \"string type\" {}\n", quote(name), quote(kind));
    for param in params {
        text.push_str(&format!("  {param}\n"));
    }
    text
}

impl Pbrt {
    fn material(name: &str, material: &Material, textures: &TextureNames) -> String {
        match material {
            Material::Passthrough(pass) => sdl::passthrough(name, pass),
            // Dielectric transmission is not tinted in pbrt-v4
            Material::Glass(glass) => named_material(
                name,
                "dielectric",
                &[format!("\"float eta\" [{}]", Num(glass.ior.constant()))],
            ),
            Material::Diffuse(d) => {
                named_material(name, "diffuse", &[color("reflectance", &d.color, textures)])
            }
            Material::Mixed(m) => {
                let diffuse = format!("{name}_diffuse");
                let glass = format!("{name}_glass");
                let mut text = Self::material(&diffuse, &Material::Diffuse(m.diffuse.clone()), textures);
                text.push_str(&Self::material(&glass, &Material::Glass(m.glass.clone()), textures));
                text.push_str(&named_material(
                    name,
                    "mix",
                    &[
                        format!("\"string materials\" [{} {}]", quote(&diffuse), quote(&glass)),
                        scalar("amount", &m.transparency, textures),
                    ],
                ));
                text
            }
            Material::Carpaint(c) => named_material(
                name,
                "coateddiffuse",
                &[
                    color("reflectance", &c.base_color, textures),
                    "\"float roughness\" [0.0]".to_string(),
                    format!("\"float eta\" [{}]", Num(1.54)),
                ],
            ),
            Material::Substrate(s) => named_material(
                name,
                "coateddiffuse",
                &[
                    color("reflectance", &s.diffuse, textures),
                    scalar("roughness", &s.roughness, textures),
                ],
            ),
            Material::Disney(_) | Material::Emission(_) => Self::material(
                name,
                &Material::diffuse(material.principal_color().unwrap_or(Rgb::GREY)),
                textures,
            ),
        }
    }
}

impl Backend for Pbrt {
    fn id(&self) -> &'static str {
        "Pbrt"
    }

    fn extension(&self) -> &'static str {
        "pbrt"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PASSTHROUGH
            | Capabilities::GLASS
            | Capabilities::DIFFUSE
            | Capabilities::MIXED
            | Capabilities::CARPAINT
            | Capabilities::SUBSTRATE
    }

    fn accepts_texture(&self, kind: MaterialKind, field: &str) -> bool {
        !matches!(
            (kind, field),
            (MaterialKind::Glass, _)
                | (MaterialKind::Mixed, "glass.ior" | "glass.color")
                | (MaterialKind::Substrate, "specular")
        )
    }

    fn default_executable(&self) -> &'static str {
        "pbrt"
    }

    fn default_args(&self) -> &'static [&'static str] {
        &["--outfile", "{output}", "--spp", "{spp}", "{scene}"]
    }

    fn default_sampler(&self) -> &'static str {
        "zsobol"
    }

    fn default_integrator(&self) -> &'static str {
        "volpath"
    }

    fn emit_texture(&self, name: &str, texture: &TextureRef, role: TextureRole) -> String {
        let (kind, encoding) = match role {
            TextureRole::Color => ("spectrum", "sRGB"),
            TextureRole::Scalar => ("float", "linear"),
        };
        let scale = Num(1.0 / texture.scale);
        format!(
            "Texture {} {} \"imagemap\"\n  \"string filename\" {}\n  \"string mapping\" \"uv\"\n  \"string encoding\" {}\n  \"float uscale\" [{scale}]\n  \"float vscale\" [{scale}]\n",
            quote(name),
            quote(kind),
            quote_path(&texture.path),
            quote(encoding),
        )
    }

    fn emit_material(&self, name: &str, material: &Material, textures: &TextureNames) -> String {
        match capability_fallback(self, material) {
            Some(fallback) => Self::material(name, &fallback, textures),
            None => Self::material(name, material, textures),
        }
    }

    fn emit_mesh(&self, name: &str, mesh: &MeshObject, material: &str) -> Fragment {
        let points = mesh
            .vertices
            .iter()
            .map(point3)
            .collect::<Vec<_>>()
            .join("  ");
        let indices = mesh
            .triangles
            .iter()
            .map(|t| format!("{} {} {}", t[0], t[1], t[2]))
            .collect::<Vec<_>>()
            .join("  ");
        let mut text = format!(
            "# Object '{name}'\nAttributeBegin\n  NamedMaterial {}\n  Shape \"trianglemesh\"\n    \"point3 P\" [ {points} ]\n    \"integer indices\" [ {indices} ]\n",
            quote(material)
        );
        if let Some(uvs) = &mesh.uvs {
            let uv = join(uvs.iter().flat_map(|uv| [uv.x, uv.y]));
            text.push_str(&format!("    \"point2 uv\" [ {uv} ]\n"));
        }
        text.push_str(&format!("AttributeEnd\n# ~Object '{name}'\n"));
        Fragment::text(text)
    }

    fn emit_camera(&self, name: &str, camera: &Camera) -> String {
        let look = LookAt::from_placement(&camera.placement);
        format!(
            "# Camera '{name}'\nScale -1 1 1\nLookAt {}\n       {}\n       {}\nCamera \"perspective\" \"float fov\" [{}]\n# ~Camera '{name}'\n",
            point3(&look.origin),
            point3(&look.target),
            sdl::vec3(&look.up),
            Num(camera.fov),
        )
    }

    fn emit_pointlight(&self, name: &str, light: &PointLight) -> String {
        format!(
            "# Pointlight '{name}'\nAttributeBegin\n  LightSource \"point\"\n    \"rgb I\" [{}]\n    \"point3 from\" [{}]\n    \"float scale\" [{}]\nAttributeEnd\n# ~Pointlight '{name}'\n",
            rgb(light.color),
            point3(&light.position()),
            Num(light.power),
        )
    }

    fn emit_arealight(&self, name: &str, light: &AreaLight) -> String {
        let corners = light.corners();
        let points = corners.iter().map(point3).collect::<Vec<_>>().join("  ");
        let visibility = if light.transparent {
            "  Attribute \"shape\" \"float alpha\" [0.0]\n"
        } else {
            ""
        };
        format!(
            "# Arealight '{name}'\nAttributeBegin\n{visibility}  AreaLightSource \"diffuse\"\n    \"rgb L\" [{}]\n    \"float scale\" [{}]\n    \"bool twosided\" true\n  Shape \"trianglemesh\"\n    \"point3 P\" [ {points} ]\n    \"integer indices\" [ 0 1 2  0 2 3 ]\nAttributeEnd\n# ~Arealight '{name}'\n",
            rgb(light.color),
            Num(light.power * 100.0),
        )
    }

    fn emit_sunsky(&self, name: &str, light: &SunskyLight) -> String {
        let to = -light.direction.normalize();
        format!(
            "# Sunsky '{name}'\nAttributeBegin\n  LightSource \"infinite\"\n    \"rgb L\" [0.53 0.81 0.92]\n    \"float scale\" [0.5]\n  LightSource \"distant\"\n    \"blackbody L\" [6500]\n    \"point3 from\" [0.0 0.0 0.0]\n    \"point3 to\" [{}]\n    \"float scale\" [4.0]\nAttributeEnd\n# ~Sunsky '{name}'\n",
            sdl::vec3(&to),
        )
    }

    fn emit_imagelight(&self, name: &str, light: &ImageLight) -> String {
        format!(
            "# Imagelight '{name}'\nAttributeBegin\n  Rotate {} 0 0 1\n  LightSource \"infinite\"\n    \"string filename\" {}\nAttributeEnd\n# ~Imagelight '{name}'\n",
            Num(light.rotation),
            quote_path(&light.hdri_path),
        )
    }

    fn write_scene(&self, parts: &SceneParts, globals: &SceneGlobals) -> SceneText {
        let mut text = String::from("# Generated by render_bench\n");
        text.push_str(&format!(
            "Film \"rgb\"\n  \"integer xresolution\" [{}]\n  \"integer yresolution\" [{}]\n  \"string filename\" {}\n",
            globals.width,
            globals.height,
            quote(&globals.output),
        ));
        text.push_str(&format!(
            "Sampler {}\n  \"integer pixelsamples\" [{}]\n",
            quote(&globals.sampler),
            globals.spp
        ));
        text.push_str(&format!("Integrator {}\n", quote(&globals.integrator)));
        text.push_str(&parts.section_text(Section::Camera));
        text.push_str("WorldBegin\n");
        text.push_str(&parts.joined(&WORLD_SECTIONS));
        SceneText::text(terminated(text))
    }
}

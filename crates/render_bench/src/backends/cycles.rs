//! Cycles standalone backend
//!
//! Produces the XML read by the `cycles` executable. Every material is a
//! `<shader>` graph whose closure is connected to `output surface`; meshes and
//! lights are bound to a shader with `<state>`. Cycles is Z up like the host,
//! so positions are written unchanged.

use log::warn;

use super::sdl::{self, join, point3, terminated, vec3, xml_escape, Num};
use super::{
    capability_fallback, Backend, Capabilities, Fragment, SceneGlobals, SceneParts, SceneText,
    Section, TextureNames, TextureRole,
};
use crate::foundation::math::{axis_angle_degrees, Vec3};
use crate::material::{Diffuse, Glass, Material, MaterialKind, Rgb, TextureRef};
use crate::scene::{AreaLight, Camera, ImageLight, MeshObject, PointLight, SunskyLight};

/// Strength of the distant light standing for the sun
const SUN_STRENGTH: f64 = 3.0;

const BACKGROUND_END: &str = "</background>\n";

/// Cycles standalone
#[derive(Debug, Default, Clone, Copy)]
pub struct Cycles;

/// `<tag name="name" key="value" ... />`
fn node(tag: &str, name: &str, attrs: &[(&str, String)]) -> String {
    let mut text = format!("    <{tag} name=\"{}\"", xml_escape(name));
    for (key, value) in attrs {
        text.push_str(&format!(" {key}=\"{}\"", xml_escape(value)));
    }
    text.push_str(" />\n");
    text
}

fn connect(from: &str, to: &str) -> String {
    format!(
        "    <connect from=\"{}\" to=\"{}\" />\n",
        xml_escape(from),
        xml_escape(to)
    )
}

fn shader(name: &str, body: &str) -> String {
    format!("<shader name=\"{}\">\n{body}</shader>\n", xml_escape(name))
}

fn diffuse_node(name: &str, diffuse: &Diffuse) -> String {
    node("diffuse_bsdf", name, &[("color", sdl::rgb(diffuse.color.constant()))])
}

fn glass_node(name: &str, glass: &Glass) -> String {
    node(
        "glass_bsdf",
        name,
        &[
            ("IOR", Num(glass.ior.constant()).to_string()),
            ("color", sdl::rgb(glass.color.constant())),
        ],
    )
}

/// Emission shader driving a light
fn emission_shader(name: &str, color: Rgb, strength: f64) -> String {
    let emission = format!("{name}_emission");
    shader(
        name,
        &(node(
            "emission",
            &emission,
            &[("color", sdl::rgb(color)), ("strength", Num(strength).to_string())],
        ) + &connect(&format!("{emission} emission"), "output surface")),
    )
}

/// Light bound to its own emission shader
fn bound_light(name: &str, color: Rgb, strength: f64, attrs: &[(&str, String)]) -> String {
    let shader_name = format!("{name}_shader");
    let mut text = emission_shader(&shader_name, color, strength);
    text.push_str(&format!("<state shader=\"{}\">\n", xml_escape(&shader_name)));
    text.push_str(&node("light", name, attrs));
    text.push_str("</state>\n");
    text
}

/// World background fed by `color_node`'s color output
fn background(name: &str, color_node: &str) -> String {
    let bg = format!("{name}_background");
    format!(
        "<background>\n{color_node}{}{}{}</background>\n",
        node("background", &bg, &[("strength", Num(1.0).to_string())]),
        connect(&format!("{name} color"), &format!("{bg} color")),
        connect(&format!("{bg} background"), "output surface"),
    )
}

impl Cycles {
    fn material(name: &str, material: &Material) -> String {
        let closure = format!("{name}_bsdf");
        let body = match material {
            Material::Passthrough(pass) => return sdl::passthrough(name, pass),
            Material::Glass(g) => glass_node(&closure, g) + &connect(&format!("{closure} bsdf"), "output surface"),
            Material::Disney(d) => {
                node(
                    "principled_bsdf",
                    &closure,
                    &[
                        ("base_color", sdl::rgb(d.base_color.constant())),
                        ("subsurface", Num(d.subsurface.constant()).to_string()),
                        ("metallic", Num(d.metallic.constant()).to_string()),
                        ("specular", Num(d.specular.constant()).to_string()),
                        ("specular_tint", Num(d.specular_tint.constant()).to_string()),
                        ("roughness", Num(d.roughness.constant()).to_string()),
                        ("anisotropic", Num(d.anisotropic.constant()).to_string()),
                        ("sheen", Num(d.sheen.constant()).to_string()),
                        ("sheen_tint", Num(d.sheen_tint.constant()).to_string()),
                        ("clearcoat", Num(d.clearcoat.constant()).to_string()),
                        ("clearcoat_roughness", Num(1.0 - d.clearcoat_gloss.constant()).to_string()),
                    ],
                ) + &connect(&format!("{closure} bsdf"), "output surface")
            }
            Material::Mixed(m) => {
                let diffuse = format!("{name}_diffuse");
                let glass = format!("{name}_glass");
                let mix = format!("{name}_mix");
                diffuse_node(&diffuse, &m.diffuse)
                    + &glass_node(&glass, &m.glass)
                    + &node("mix_closure", &mix, &[("fac", Num(m.transparency.constant()).to_string())])
                    + &connect(&format!("{diffuse} bsdf"), &format!("{mix} closure1"))
                    + &connect(&format!("{glass} bsdf"), &format!("{mix} closure2"))
                    + &connect(&format!("{mix} closure"), "output surface")
            }
            Material::Emission(e) => {
                return emission_shader(name, e.color.constant(), e.power.constant());
            }
            other => {
                let color = other.principal_color().unwrap_or(Rgb::GREY);
                diffuse_node(&closure, &Diffuse { color: color.into() })
                    + &connect(&format!("{closure} bsdf"), "output surface")
            }
        };
        shader(name, &body)
    }
}

impl Backend for Cycles {
    fn id(&self) -> &'static str {
        "Cycles"
    }

    fn extension(&self) -> &'static str {
        "xml"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PASSTHROUGH
            | Capabilities::GLASS
            | Capabilities::DISNEY
            | Capabilities::DIFFUSE
            | Capabilities::MIXED
            | Capabilities::EMISSION
    }

    // Image textures would be nodes inside each shader graph; none are wired
    fn accepts_texture(&self, _kind: MaterialKind, _field: &str) -> bool {
        false
    }

    fn default_executable(&self) -> &'static str {
        "cycles"
    }

    fn default_args(&self) -> &'static [&'static str] {
        &[
            "--samples",
            "{spp}",
            "--width",
            "{width}",
            "--height",
            "{height}",
            "--output",
            "{output}",
            "--background",
            "{scene}",
        ]
    }

    fn default_sampler(&self) -> &'static str {
        "sobol_burley"
    }

    fn default_integrator(&self) -> &'static str {
        "path"
    }

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
        let points = mesh.vertices.iter().map(point3).collect::<Vec<_>>().join("  ");
        let nverts = vec!["3"; mesh.triangles.len()].join(" ");
        let verts = mesh
            .triangles
            .iter()
            .map(|t| format!("{} {} {}", t[0], t[1], t[2]))
            .collect::<Vec<_>>()
            .join("  ");
        let mut attrs = format!(" P=\"{points}\" nverts=\"{nverts}\" verts=\"{verts}\"");
        if let Some(uvs) = &mesh.uvs {
            // one coordinate per face corner
            let corners = mesh
                .triangles
                .iter()
                .flatten()
                .filter_map(|&i| uvs.get(i as usize))
                .flat_map(|uv| [uv.x, uv.y]);
            attrs.push_str(&format!(" UV=\"{}\"", join(corners)));
        }
        Fragment::text(format!(
            "<!-- Object '{name}' -->\n<state shader=\"{}\">\n    <mesh{attrs} />\n</state>\n",
            xml_escape(material)
        ))
    }

    fn emit_camera(&self, name: &str, camera: &Camera) -> String {
        let (axis, angle) = axis_angle_degrees(&camera.placement);
        // Cycles cameras look down +Z; the mirrored scale turns the host's -Z
        format!(
            "<!-- Camera '{name}' -->\n<transform rotate=\"{} {}\" translate=\"{}\" scale=\"1 1 -1\">\n    <camera type=\"perspective\" fov=\"{}\" />\n</transform>\n",
            Num(angle),
            vec3(&axis),
            vec3(&camera.placement.translation.vector),
            Num(camera.fov.to_radians()),
        )
    }

    fn emit_pointlight(&self, name: &str, light: &PointLight) -> String {
        bound_light(
            name,
            light.color,
            light.power,
            &[
                ("light_type", "point".into()),
                ("co", point3(&light.position())),
                ("strength", sdl::rgb(Rgb::WHITE)),
                ("size", Num(0.0).to_string()),
            ],
        )
    }

    fn emit_arealight(&self, name: &str, light: &AreaLight) -> String {
        let rotation = light.placement.rotation;
        let [width, height] = light.size;
        bound_light(
            name,
            light.color,
            light.power / (width * height),
            &[
                ("light_type", "area".into()),
                ("co", vec3(&light.placement.translation.vector)),
                ("axisu", vec3(&(rotation * Vec3::x()))),
                ("sizeu", Num(width).to_string()),
                ("axisv", vec3(&(rotation * Vec3::y()))),
                ("sizev", Num(height).to_string()),
                ("dir", vec3(&(rotation * -Vec3::z()))),
                ("strength", sdl::rgb(Rgb::WHITE)),
                ("use_camera", (!light.transparent).to_string()),
            ],
        )
    }

    fn emit_sunsky(&self, name: &str, light: &SunskyLight) -> String {
        let direction = light.direction.normalize();
        let sky = format!("{name}_sky");
        let sky_node = node(
            "sky_texture",
            &sky,
            &[
                ("sky_type", "hosek_wilkie".into()),
                ("sun_direction", vec3(&direction)),
                ("turbidity", Num(light.turbidity).to_string()),
                ("ground_albedo", Num(light.albedo).to_string()),
            ],
        );
        let mut text = background(&sky, &sky_node);
        text.push_str(&bound_light(
            &format!("{name}_sun"),
            Rgb::WHITE,
            SUN_STRENGTH,
            &[
                ("light_type", "distant".into()),
                ("dir", vec3(&-direction)),
                ("strength", sdl::rgb(Rgb::WHITE)),
            ],
        ));
        text
    }

    fn emit_imagelight(&self, name: &str, light: &ImageLight) -> String {
        let map = format!("{name}_map");
        let map_node = node(
            "environment_texture",
            &map,
            &[
                ("filename", light.hdri_path.to_string_lossy().replace('\\', "/")),
                ("tex_mapping.rotation", join([0.0, 0.0, light.rotation.to_radians()])),
            ],
        );
        background(&map, &map_node)
    }

    fn write_scene(&self, parts: &SceneParts, globals: &SceneGlobals) -> SceneText {
        let mut backgrounds = Vec::new();
        let mut lights = String::new();
        for fragment in parts.section(Section::Lights) {
            // a sun and sky carries its background first, then the sun
            if fragment.starts_with("<background>") {
                let end = fragment
                    .find(BACKGROUND_END)
                    .map_or(fragment.len(), |i| i + BACKGROUND_END.len());
                backgrounds.push(&fragment[..end]);
                lights.push_str(&fragment[end..]);
            } else {
                lights.push_str(fragment);
            }
        }
        if backgrounds.len() > 1 {
            warn!("Cycles supports one background, keeping the last of {}", backgrounds.len());
        }

        let mut text = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- Generated by render_bench -->\n<cycles>\n<camera width=\"{}\" height=\"{}\" />\n<integrator method=\"{}\" sampling_pattern=\"{}\" />\n",
            globals.width,
            globals.height,
            xml_escape(&globals.integrator),
            xml_escape(&globals.sampler),
        );
        text.push_str(&parts.section_text(Section::Camera));
        if let Some(background) = backgrounds.last() {
            text.push_str(background);
        }
        text.push_str(&parts.section_text(Section::Materials));
        text.push_str(&lights);
        text.push_str(&parts.section_text(Section::Meshes));
        text.push_str("</cycles>\n");
        SceneText::text(terminated(text))
    }
}

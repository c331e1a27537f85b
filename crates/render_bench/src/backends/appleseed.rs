//! appleseed backend
//!
//! Produces an XML project. Appleseed is Y up, so every position and
//! direction goes through [`to_y_up`]. Mesh geometry is written to OBJ
//! sidecars loaded by `mesh_object` entities.

use log::warn;

use super::sdl::{self, join, terminated, xml_escape, Num, SCENE_STEM_TOKEN};
use super::{
    capability_fallback, Backend, Capabilities, Fragment, SceneGlobals, SceneParts, SceneText,
    Section, Sidecar, TextureNames, TextureRole,
};
use crate::foundation::math::{axis_angle_degrees, to_y_up, LookAt, Vec3};
use crate::material::{ColorValue, Diffuse, Material, MaterialKind, Rgb, ScalarValue, TextureRef};
use crate::scene::{AreaLight, Camera, ImageLight, MeshObject, PointLight, SunskyLight};

/// Width of the simulated film, in meters
const FILM_WIDTH: f64 = 0.032;

/// appleseed 2.x
#[derive(Debug, Default, Clone, Copy)]
pub struct Appleseed;

fn param(name: &str, value: impl std::fmt::Display) -> String {
    format!("    <parameter name=\"{name}\" value=\"{}\" />\n", xml_escape(&value.to_string()))
}

fn color_entity(name: &str, color: Rgb) -> String {
    format!(
        "<color name=\"{}\">\n{}    <values>{}</values>\n</color>\n",
        xml_escape(name),
        param("color_space", "linear_rgb"),
        sdl::rgb(color)
    )
}

/// Entity or texture instance feeding a color input, plus the declarations it
/// needs
fn color_input(name: &str, value: &ColorValue, textures: &TextureNames) -> (String, String) {
    textures.color(value).map_or_else(
        || (name.to_string(), color_entity(name, value.constant())),
        |t| (format!("{t}_inst"), String::new()),
    )
}

fn scalar_input(value: &ScalarValue, textures: &TextureNames) -> String {
    textures
        .scalar(value)
        .map_or_else(|| Num(value.constant()).to_string(), |t| format!("{t}_inst"))
}

fn element(tag: &str, name: &str, model: &str, params: &[String]) -> String {
    format!(
        "<{tag} name=\"{}\" model=\"{model}\">\n{}</{tag}>\n",
        xml_escape(name),
        params.concat()
    )
}

fn generic_material(name: &str, input: &str, bsdf: &str) -> String {
    element("material", name, "generic_material", &[param(input, bsdf)])
}

fn indent(text: &str, depth: usize) -> String {
    let pad = " ".repeat(depth * 4);
    text.lines()
        .map(|line| if line.is_empty() { "\n".to_string() } else { format!("{pad}{line}\n") })
        .collect()
}

impl Appleseed {
    /// Declarations of the BSDF `<name>_bsdf`
    fn bsdf(name: &str, material: &Material, textures: &TextureNames) -> String {
        let bsdf = format!("{name}_bsdf");
        match material {
            Material::Glass(g) => {
                let (color, decl) = color_input(&format!("{name}_transmittance"), &g.color, textures);
                decl + &element(
                    "bsdf",
                    &bsdf,
                    "glass_bsdf",
                    &[
                        param("surface_transmittance", color),
                        param("ior", Num(g.ior.constant())),
                        param("volume_parameterization", "transmittance"),
                    ],
                )
            }
            Material::Disney(d) => {
                let (color, decl) = color_input(&format!("{name}_basecolor"), &d.base_color, textures);
                decl + &element(
                    "bsdf",
                    &bsdf,
                    "disney_brdf",
                    &[
                        param("base_color", color),
                        param("subsurface", scalar_input(&d.subsurface, textures)),
                        param("metallic", scalar_input(&d.metallic, textures)),
                        param("specular", scalar_input(&d.specular, textures)),
                        param("specular_tint", scalar_input(&d.specular_tint, textures)),
                        param("roughness", scalar_input(&d.roughness, textures)),
                        param("anisotropic", scalar_input(&d.anisotropic, textures)),
                        param("sheen", scalar_input(&d.sheen, textures)),
                        param("sheen_tint", scalar_input(&d.sheen_tint, textures)),
                        param("clearcoat", scalar_input(&d.clearcoat, textures)),
                        param("clearcoat_gloss", scalar_input(&d.clearcoat_gloss, textures)),
                    ],
                )
            }
            Material::Mixed(m) => {
                let diffuse = format!("{name}_diffuse");
                let glass = format!("{name}_glass");
                Self::bsdf(&diffuse, &Material::Diffuse(m.diffuse.clone()), textures)
                    + &Self::bsdf(&glass, &Material::Glass(m.glass.clone()), textures)
                    + &element(
                        "bsdf",
                        &bsdf,
                        "bsdf_blend",
                        &[
                            param("bsdf0", format!("{glass}_bsdf")),
                            param("bsdf1", format!("{diffuse}_bsdf")),
                            param("weight", scalar_input(&m.transparency, textures)),
                        ],
                    )
            }
            other => {
                let color = match other {
                    Material::Diffuse(Diffuse { color }) => color.clone(),
                    _ => ColorValue::Constant(other.principal_color().unwrap_or(Rgb::GREY)),
                };
                let (color, decl) = color_input(&format!("{name}_reflectance"), &color, textures);
                decl + &element("bsdf", &bsdf, "lambertian_brdf", &[param("reflectance", color)])
            }
        }
    }

    fn material(name: &str, material: &Material, textures: &TextureNames) -> String {
        match material {
            Material::Passthrough(pass) => sdl::passthrough(name, pass),
            Material::Emission(e) => {
                let (color, decl) = color_input(&format!("{name}_radiance"), &e.color, textures);
                decl + &element(
                    "edf",
                    &format!("{name}_edf"),
                    "diffuse_edf",
                    &[
                        param("radiance", color),
                        param("radiance_multiplier", scalar_input(&e.power, textures)),
                    ],
                ) + &generic_material(name, "edf", &format!("{name}_edf"))
            }
            other => Self::bsdf(name, other, textures) + &generic_material(name, "bsdf", &format!("{name}_bsdf")),
        }
    }
}

impl Backend for Appleseed {
    fn id(&self) -> &'static str {
        "Appleseed"
    }

    fn extension(&self) -> &'static str {
        "appleseed"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PASSTHROUGH
            | Capabilities::GLASS
            | Capabilities::DISNEY
            | Capabilities::DIFFUSE
            | Capabilities::MIXED
            | Capabilities::EMISSION
    }

    fn accepts_texture(&self, kind: MaterialKind, field: &str) -> bool {
        !matches!((kind, field), (MaterialKind::Glass, "ior") | (MaterialKind::Mixed, "glass.ior"))
    }

    fn default_executable(&self) -> &'static str {
        "appleseed.cli"
    }

    fn default_args(&self) -> &'static [&'static str] {
        &["--resolution", "{width}", "{height}", "--output", "{output}", "{scene}"]
    }

    fn default_sampler(&self) -> &'static str {
        "uniform"
    }

    fn default_integrator(&self) -> &'static str {
        "pt"
    }

    fn emit_texture(&self, name: &str, texture: &TextureRef, role: TextureRole) -> String {
        let color_space = match role {
            TextureRole::Color => "srgb",
            TextureRole::Scalar => "linear_rgb",
        };
        element(
            "texture",
            name,
            "disk_texture_2d",
            &[
                param("filename", texture.path.to_string_lossy().replace('\\', "/")),
                param("color_space", color_space),
            ],
        ) + &format!(
            "<texture_instance name=\"{0}_inst\" texture=\"{0}\">\n</texture_instance>\n",
            xml_escape(name)
        )
    }

    fn emit_material(&self, name: &str, material: &Material, textures: &TextureNames) -> String {
        match capability_fallback(self, material) {
            Some(fallback) => Self::material(name, &fallback, textures),
            None => Self::material(name, material, textures),
        }
    }

    fn emit_mesh(&self, name: &str, mesh: &MeshObject, material: &str) -> Fragment {
        let mut obj = String::from("# Generated by render_bench\n");
        for v in &mesh.vertices {
            obj.push_str(&format!("v {}\n", sdl::vec3(&to_y_up(&v.coords))));
        }
        if let Some(uvs) = &mesh.uvs {
            for uv in uvs {
                obj.push_str(&format!("vt {}\n", join([uv.x, uv.y])));
            }
        }
        obj.push_str(&format!("o {name}\n"));
        for t in &mesh.triangles {
            let [a, b, c] = t.map(|i| i + 1);
            if mesh.uvs.is_some() {
                obj.push_str(&format!("f {a}/{a} {b}/{b} {c}/{c}\n"));
            } else {
                obj.push_str(&format!("f {a} {b} {c}\n"));
            }
        }

        let name = xml_escape(name);
        let material = xml_escape(material);
        let text = format!(
            "<object name=\"{name}\" model=\"mesh_object\">\n{}</object>\n\
             <object_instance name=\"{name}.{name}.instance\" object=\"{name}.{name}\">\n\
             \x20   <assign_material slot=\"default\" side=\"front\" material=\"{material}\" />\n\
             \x20   <assign_material slot=\"default\" side=\"back\" material=\"{material}\" />\n\
             </object_instance>\n",
            param("filename", format!("{SCENE_STEM_TOKEN}_{name}.obj")),
        );
        Fragment {
            text,
            sidecars: vec![Sidecar::new(format!("_{name}.obj"), obj)],
        }
    }

    fn emit_camera(&self, name: &str, camera: &Camera) -> String {
        let look = LookAt::from_placement(&camera.placement);
        format!(
            "<camera name=\"{}\" model=\"pinhole_camera\">\n{}{}{}    <transform>\n        <look_at origin=\"{}\" target=\"{}\" up=\"{}\" />\n    </transform>\n</camera>\n",
            xml_escape(name),
            param("film_width", Num(FILM_WIDTH)),
            param("aspect_ratio", Num(camera.aspect)),
            param("horizontal_fov", Num(camera.fov)),
            sdl::vec3(&to_y_up(&look.origin.coords)),
            sdl::vec3(&to_y_up(&look.target.coords)),
            sdl::vec3(&to_y_up(&look.up)),
        )
    }

    fn emit_pointlight(&self, name: &str, light: &PointLight) -> String {
        let color = format!("{name}_intensity");
        color_entity(&color, light.color)
            + &format!(
                "<light name=\"{}\" model=\"point_light\">\n{}{}    <transform>\n        <translation value=\"{}\" />\n    </transform>\n</light>\n",
                xml_escape(name),
                param("intensity", &color),
                param("intensity_multiplier", Num(light.power * 3.0)),
                sdl::vec3(&to_y_up(&light.position().coords)),
            )
    }

    fn emit_arealight(&self, name: &str, light: &AreaLight) -> String {
        let [width, height] = light.size;
        let radiance = light.power / (width * height) / 100.0;
        let (axis, angle) = axis_angle_degrees(&light.placement);
        let color = format!("{name}_radiance");
        let edf = format!("{name}_edf");
        let material = format!("{name}_material");
        let object = xml_escape(&format!("{name}_object"));
        let visibility = if light.transparent {
            "    <parameters name=\"visibility\">\n        <parameter name=\"camera\" value=\"false\" />\n    </parameters>\n"
        } else {
            ""
        };
        color_entity(&color, light.color)
            + &element(
                "edf",
                &edf,
                "diffuse_edf",
                &[param("radiance", &color), param("radiance_multiplier", Num(radiance))],
            )
            + &generic_material(&material, "edf", &edf)
            + &element(
                "object",
                &format!("{name}_object"),
                "rectangle_object",
                &[param("width", Num(width)), param("height", Num(height))],
            )
            + &format!(
                "<object_instance name=\"{object}.instance\" object=\"{object}\">\n    <transform>\n        <rotation axis=\"{}\" angle=\"{}\" />\n        <translation value=\"{}\" />\n    </transform>\n{visibility}    <assign_material slot=\"default\" side=\"front\" material=\"{material}\" />\n    <assign_material slot=\"default\" side=\"back\" material=\"{material}\" />\n</object_instance>\n",
                sdl::vec3(&to_y_up(&axis)),
                Num(angle),
                sdl::vec3(&to_y_up(&light.placement.translation.vector)),
                material = xml_escape(&material),
            )
    }

    fn emit_sunsky(&self, name: &str, light: &SunskyLight) -> String {
        let dir: Vec3 = to_y_up(&light.direction.normalize());
        let phi = dir.z.atan2(dir.x).to_degrees();
        let theta = dir.y.clamp(-1.0, 1.0).acos().to_degrees();
        environment(
            name,
            &element(
                "environment_edf",
                name,
                "hosek_environment_edf",
                &[
                    param("sun_phi", Num(phi)),
                    param("sun_theta", Num(theta)),
                    param("turbidity", Num(light.turbidity)),
                    param("ground_albedo", Num(light.albedo)),
                ],
            ),
        )
    }

    fn emit_imagelight(&self, name: &str, light: &ImageLight) -> String {
        let texture = format!("{name}_map");
        let map = self.emit_texture(&texture, &TextureRef::new(&light.hdri_path, 0, 1.0), TextureRole::Scalar);
        map + &environment(
            name,
            &element(
                "environment_edf",
                name,
                "latlong_map_environment_edf",
                &[
                    param("radiance", format!("{texture}_inst")),
                    param("horizontal_shift", Num(light.rotation)),
                ],
            ),
        )
    }

    fn write_scene(&self, parts: &SceneParts, globals: &SceneGlobals) -> SceneText {
        let (environments, lights): (Vec<&String>, Vec<&String>) = parts
            .section(Section::Lights)
            .iter()
            .partition(|f| f.contains("<environment "));
        if environments.len() > 1 {
            warn!("Appleseed supports one environment, keeping the last of {}", environments.len());
        }
        let camera = parts.section_text(Section::Camera);
        let camera_name = attribute(&camera, "camera", "name");

        let mut scene = camera.clone();
        if let Some(environment) = environments.last() {
            scene.push_str(environment);
        }
        let mut assembly = parts.section_text(Section::Textures);
        assembly.push_str(&parts.section_text(Section::Materials));
        assembly.extend(lights.into_iter().map(String::as_str));
        assembly.push_str(&parts.section_text(Section::Meshes));
        scene.push_str(&format!(
            "<assembly name=\"assembly\">\n{}</assembly>\n<assembly_instance name=\"assembly_inst\" assembly=\"assembly\">\n</assembly_instance>\n",
            indent(&assembly, 1)
        ));

        let mut frame = String::new();
        if let Some(camera_name) = camera_name {
            frame.push_str(&param("camera", camera_name));
        }
        frame.push_str(&param("resolution", format!("{} {}", globals.width, globals.height)));
        frame.push_str(&param("tile_size", "32 32"));

        let configuration = format!(
            "<configuration name=\"final\" base=\"base_final\">\n{}{}    <parameters name=\"{}_pixel_renderer\">\n    {}    </parameters>\n</configuration>\n<configuration name=\"interactive\" base=\"base_interactive\" />\n",
            param("lighting_engine", &globals.integrator),
            param("pixel_renderer", &globals.sampler),
            xml_escape(&globals.sampler),
            param("samples", globals.spp),
        );

        let text = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- Generated by render_bench -->\n<project format_revision=\"28\">\n    <scene>\n{}    </scene>\n    <output>\n        <frame name=\"beauty\">\n{}        </frame>\n    </output>\n    <configurations>\n{}    </configurations>\n</project>\n",
            indent(&scene, 2),
            indent(&frame, 2),
            indent(&configuration, 2),
        );
        SceneText::text(terminated(text))
    }
}

/// Environment EDF wrapped with its shader and environment entities
fn environment(name: &str, edf: &str) -> String {
    let shader = format!("{name}_shader");
    edf.to_string()
        + &element(
            "environment_shader",
            &shader,
            "edf_environment_shader",
            &[param("environment_edf", name)],
        )
        + &element(
            "environment",
            &format!("{name}_environment"),
            "generic_environment",
            &[param("environment_edf", name), param("environment_shader", &shader)],
        )
}

/// Value of `attr` on the first `tag` element of `xml`
fn attribute<'a>(xml: &'a str, tag: &str, attr: &str) -> Option<&'a str> {
    let start = xml.find(&format!("<{tag} "))?;
    let rest = &xml[start..];
    let rest = &rest[rest.find(&format!("{attr}=\""))? + attr.len() + 2..];
    rest.find('"').map(|end| &rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fixtures;
    use crate::foundation::math::{placement, Vec3};

    #[test]
    fn test_every_kind_yields_a_generic_material() {
        for material in fixtures::all_materials("Appleseed") {
            let text = Appleseed.emit_material("M_x", &material, &TextureNames::new());
            assert!(text.contains("M_x"), "{material:?}");
            if material.kind() != MaterialKind::Passthrough {
                assert!(
                    text.contains("<material name=\"M_x\" model=\"generic_material\">"),
                    "{material:?}"
                );
            }
        }
    }

    #[test]
    fn test_mixed_blends_child_bsdfs() {
        let text = Appleseed.emit_material("Vase_mixed", &fixtures::mixed(), &TextureNames::new());
        assert!(text.contains("<bsdf name=\"Vase_mixed_glass_bsdf\" model=\"glass_bsdf\">"));
        assert!(text.contains("<bsdf name=\"Vase_mixed_diffuse_bsdf\" model=\"lambertian_brdf\">"));
        assert!(text.contains("<bsdf name=\"Vase_mixed_bsdf\" model=\"bsdf_blend\">"));
        assert!(text.contains("<parameter name=\"weight\" value=\"0.5\" />"));
    }

    #[test]
    fn test_mesh_goes_to_obj_sidecar() {
        let fragment = Appleseed.emit_mesh("Tri_mesh", &fixtures::triangle(), "Tri_diffuse");
        assert_eq!(fragment.sidecars.len(), 1);
        let obj = &fragment.sidecars[0];
        assert_eq!(obj.suffix, "_Tri_mesh.obj");
        // (0, 1, 0) in Z up is (0, 0, -1) in Y up
        assert!(obj.contents.contains("v 0.0 0.0 -1.0\n"));
        assert!(obj.contents.contains("o Tri_mesh\nf 1/1 2/2 3/3\n"));
        assert!(fragment
            .text
            .contains("<parameter name=\"filename\" value=\"@@SCENE_STEM@@_Tri_mesh.obj\" />"));
        assert!(fragment.text.contains("object=\"Tri_mesh.Tri_mesh\""));
    }

    #[test]
    fn test_project_layout() {
        let camera = Camera {
            name: "Cam".into(),
            placement: placement(Vec3::new(0.0, -5.0, 1.0), Vec3::x(), 90.0),
            fov: 50.0,
            aspect: 1.5,
        };
        let sun = SunskyLight {
            name: "Sun".into(),
            direction: Vec3::new(0.0, 0.0, 1.0),
            turbidity: 3.0,
            albedo: 0.1,
        };
        let mut parts = SceneParts::new();
        parts.push(Section::Camera, Appleseed.emit_camera("Cam_camera", &camera));
        parts.push(Section::Lights, Appleseed.emit_sunsky("Sun_sunsky", &sun));
        parts.push(Section::Materials, Appleseed.emit_material("Tri_diffuse", &Material::diffuse(Rgb::GREY), &TextureNames::new()));
        let globals = SceneGlobals::for_backend(&Appleseed, 640, 480, 64);
        let text = Appleseed.write_scene(&parts, &globals).text;

        assert!(text.contains("<parameter name=\"camera\" value=\"Cam_camera\" />"));
        assert!(text.contains("<parameter name=\"resolution\" value=\"640 480\" />"));
        assert!(text.contains("<parameter name=\"samples\" value=\"64\" />"));
        assert!(text.contains("<parameter name=\"sun_theta\" value=\"0.0\" />"));
        let environment_at = text.find("<environment name=").unwrap();
        let assembly_at = text.find("<assembly name=").unwrap();
        let material_at = text.find("<material name=\"Tri_diffuse\"").unwrap();
        assert!(environment_at < assembly_at && assembly_at < material_at);
    }

    #[test]
    fn test_attribute_lookup() {
        let xml = "<camera name=\"Cam_camera\" model=\"pinhole_camera\">";
        assert_eq!(attribute(xml, "camera", "name"), Some("Cam_camera"));
        assert_eq!(attribute(xml, "light", "name"), None);
    }

    #[test]
    fn test_glass_ior_takes_no_texture() {
        assert!(!Appleseed.accepts_texture(MaterialKind::Glass, "ior"));
        assert!(!Appleseed.accepts_texture(MaterialKind::Mixed, "glass.ior"));
        assert!(Appleseed.accepts_texture(MaterialKind::Glass, "color"));
        assert!(Appleseed.accepts_texture(MaterialKind::Disney, "clearcoat_gloss"));
    }
}

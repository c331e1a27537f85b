//! Properties every backend must hold for any scene

use super::{any_file, globals, quad, scene_of};
use crate::backends::{fixtures, Backend, BackendRegistry, LuxCore};
use crate::diagnostics::DiagnosticKind;
use crate::foundation::math::{placement, Vec3};
use crate::material::{MaterialKind, RawParams, Rgb};
use crate::scene::{Assembler, AreaLight, Camera, Entity, MeshObject, PointLight, Scene, SunskyLight};

fn params_for(kind: MaterialKind, backend: &str) -> RawParams {
    match kind {
        MaterialKind::Passthrough => RawParams::new().with(format!("Passthrough.{backend}"), "# %NAME% %RED%"),
        _ => RawParams::from([("Shader", kind.name())]),
    }
}

fn one_mesh_per_kind(backend: &str) -> Vec<MeshObject> {
    MaterialKind::ALL
        .iter()
        .map(|&kind| quad(&format!("Obj{}", kind.name()), Some(params_for(kind, backend))))
        .collect()
}

const TEXTURE: &str = "Texture;t.png;0;1";

/// Parameters texturing every field of `kind`
fn textured_params(kind: MaterialKind, fields: &[&str], backend: &str) -> RawParams {
    if kind == MaterialKind::Passthrough {
        return params_for(kind, backend);
    }
    fields.iter().fold(RawParams::from([("Shader", kind.name())]), |params, field| {
        params.with(format!("{}.{}", kind.name(), field.replace('_', "")), TEXTURE)
    })
}

/// Textured fields the backend turns into constants, and whether any field
/// keeps its texture
fn texture_outcome(backend: &dyn Backend) -> (usize, bool) {
    let mut rejected = 0;
    let mut kept = false;
    for material in fixtures::all_materials(backend.id()) {
        let kind = material.kind();
        if kind == MaterialKind::Passthrough || !backend.supports(kind) {
            continue;
        }
        for field in material.field_names() {
            if backend.accepts_texture(kind, field) {
                kept = true;
            } else {
                rejected += 1;
            }
        }
    }
    (rejected, kept)
}

/// Every value after `key` on a line parses as a number
fn numeric_after(text: &str, key: &str) -> bool {
    text.lines().filter_map(|line| line.split_once(key)).all(|(_, rest)| {
        rest.split(|c: char| c.is_whitespace() || c == '[' || c == ']' || c == '=')
            .filter(|token| !token.is_empty())
            .all(|token| token.parse::<f64>().is_ok())
    })
}

fn furnished(meshes: Vec<MeshObject>) -> Scene {
    let mut scene = scene_of(meshes);
    scene.push(Entity::Camera(Camera {
        name: "View".into(),
        placement: placement(Vec3::new(4.0, -4.0, 3.0), Vec3::new(0.3, 0.1, 0.9), 40.0),
        fov: 50.0,
        aspect: 4.0 / 3.0,
    }));
    scene.push(Entity::PointLight(PointLight {
        name: "Bulb".into(),
        placement: placement(Vec3::new(0.0, 0.0, 4.0), Vec3::z(), 0.0),
        color: Rgb::new(1.0, 0.9, 0.8),
        power: 40.0,
    }));
    scene.push(Entity::AreaLight(AreaLight {
        name: "Panel".into(),
        placement: placement(Vec3::new(0.0, 2.0, 3.0), Vec3::x(), 90.0),
        size: [1.0, 0.5],
        color: Rgb::WHITE,
        power: 100.0,
        transparent: false,
    }));
    scene.push(Entity::Sunsky(SunskyLight {
        name: "Sky".into(),
        direction: Vec3::new(0.2, 0.3, 0.9),
        turbidity: 2.5,
        albedo: 0.2,
    }));
    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_is_deterministic() {
        for backend in BackendRegistry::global().iter() {
            let scene = furnished(one_mesh_per_kind(backend.id()));
            let first = Assembler::new(backend).assemble(&scene, &globals(backend));
            let second = Assembler::new(backend).assemble(&scene, &globals(backend));
            assert_eq!(first, second, "{}", backend.id());
        }
    }

    #[test]
    fn test_host_order_of_meshes_does_not_matter() {
        let meshes = one_mesh_per_kind("LuxCore");
        let mut reversed = meshes.clone();
        reversed.reverse();

        let forward = Assembler::new(&LuxCore).assemble(&furnished(meshes), &globals(&LuxCore));
        let backward = Assembler::new(&LuxCore).assemble(&furnished(reversed), &globals(&LuxCore));
        assert_eq!(forward.text.as_bytes(), backward.text.as_bytes());
        assert_eq!(forward.sidecars, backward.sidecars);
    }

    #[test]
    fn test_every_backend_accepts_every_kind() {
        for backend in BackendRegistry::global().iter() {
            let scene = furnished(one_mesh_per_kind(backend.id()));
            let out = Assembler::new(backend).assemble(&scene, &globals(backend));

            assert!(!out.diagnostics.contains(DiagnosticKind::EmitError), "{}", backend.id());
            assert!(!out.diagnostics.contains(DiagnosticKind::ForeignPassthrough), "{}", backend.id());
            let missing: Vec<_> = MaterialKind::ALL
                .iter()
                .filter(|kind| !backend.supports(**kind))
                .collect();
            assert_eq!(
                out.diagnostics.count(DiagnosticKind::BackendMissingCapability),
                missing.len(),
                "{}",
                backend.id()
            );
            for kind in MaterialKind::ALL {
                let mesh = format!("Obj{}_mesh", kind.name());
                let referenced = out.text.contains(&mesh)
                    || out.sidecars.iter().any(|s| s.suffix.contains(&mesh));
                assert!(referenced, "{} lost {mesh}", backend.id());
            }
            assert!(out.text.ends_with('\n'));
        }
    }

    #[test]
    fn test_every_backend_accepts_every_textured_field() {
        for backend in BackendRegistry::global().iter() {
            let meshes = fixtures::all_materials(backend.id())
                .iter()
                .map(|material| {
                    let kind = material.kind();
                    let params = textured_params(kind, &material.field_names(), backend.id());
                    quad(&format!("Obj{}", kind.name()), Some(params))
                })
                .collect();
            let out = Assembler::new(backend)
                .with_texture_check(any_file)
                .assemble(&furnished(meshes), &globals(backend));
            let id = backend.id();

            assert!(!out.diagnostics.contains(DiagnosticKind::EmitError), "{id}");
            assert!(!out.diagnostics.contains(DiagnosticKind::CoercionFailed), "{id}");
            assert!(!out.diagnostics.contains(DiagnosticKind::MissingTexture), "{id}");

            let (rejected, kept) = texture_outcome(backend);
            let unsupported = MaterialKind::ALL.iter().filter(|kind| !backend.supports(**kind)).count();
            assert_eq!(
                out.diagnostics.count(DiagnosticKind::BackendMissingCapability),
                unsupported + rejected,
                "{id}"
            );

            let everything: String = std::iter::once(out.text.as_str())
                .chain(out.sidecars.iter().map(|s| s.contents.as_str()))
                .collect();
            assert_eq!(everything.contains("t.png"), kept, "{id}");
            // a declared texture is always referenced by some material
            assert_ne!(everything.matches("t_texture").count(), 1, "{id}");
            assert!(numeric_after(&everything, "emission.gain ="), "{id}");
            assert!(numeric_after(&everything, "\"float eta\""), "{id}");
        }
    }

    #[test]
    fn test_textures_declared_once_per_image_mapping() {
        let wood = |scale: &str, fallback: &str| format!("Texture;wood.png;0;{scale};{fallback}");
        let meshes = vec![
            quad(
                "Floor",
                Some(RawParams::from([("Shader", "Diffuse")]).with("Diffuse.Color", wood("2", "(0.4,0.3,0.2)"))),
            ),
            quad(
                "Shelf",
                Some(RawParams::from([("Shader", "Substrate")]).with("Substrate.Diffuse", wood("2", "(0.5,0.5,0.5)"))),
            ),
            quad(
                "Trim",
                Some(RawParams::from([("Shader", "Diffuse")]).with("Diffuse.Color", wood("4", "(0.4,0.3,0.2)"))),
            ),
        ];
        let out = Assembler::new(&LuxCore)
            .with_texture_check(any_file)
            .assemble(&scene_of(meshes), &globals(&LuxCore));

        assert_eq!(out.text.matches("type = \"imagemap\"").count(), 2);
        assert!(out.text.contains("scene.textures.wood_texture.mapping.uvscale = 2.0 2.0"));
        assert!(out.text.contains("scene.textures.wood_texture__2.mapping.uvscale = 4.0 4.0"));
        assert!(out.text.contains("scene.materials.Floor_diffuse.kd = wood_texture\n"));
        assert!(out.text.contains("scene.materials.Shelf_substrate.kd = wood_texture\n"));
    }

    #[test]
    fn test_same_kind_different_values_not_shared() {
        let red = RawParams::from([("Shader", "Diffuse"), ("Diffuse.Color", "(1,0,0)")]);
        let blue = RawParams::from([("Shader", "Diffuse"), ("Diffuse.Color", "(0,0,1)")]);
        let out = Assembler::new(&LuxCore).assemble(
            &scene_of(vec![quad("A", Some(red.clone())), quad("B", Some(blue)), quad("C", Some(red))]),
            &globals(&LuxCore),
        );
        assert_eq!(out.text.matches("type = \"matte\"").count(), 2);
        assert!(out.text.contains("scene.objects.C_mesh.material = A_diffuse\n"));
        assert!(out.text.contains("scene.objects.B_mesh.material = B_diffuse\n"));
    }
}

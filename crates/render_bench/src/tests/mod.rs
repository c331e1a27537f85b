//! Pipeline tests spanning normalization, backends and assembly

mod properties;

use std::path::Path;

use crate::backends::{Backend, SceneGlobals};
use crate::foundation::math::{Point3, Vec2};
use crate::material::RawParams;
use crate::scene::{Entity, MaterialRef, MeshObject, Scene};

pub(crate) fn any_file(_: &Path) -> bool {
    true
}

pub(crate) fn no_file(_: &Path) -> bool {
    false
}

/// Unit quad made of two triangles, with UVs
pub(crate) fn quad(name: &str, params: Option<RawParams>) -> MeshObject {
    let mesh = MeshObject::new(
        name,
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .with_uvs(vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ]);
    match params {
        Some(params) => mesh.with_material(MaterialRef::Params(params)),
        None => mesh,
    }
}

pub(crate) fn scene_of(meshes: Vec<MeshObject>) -> Scene {
    Scene {
        entities: meshes.into_iter().map(Entity::Mesh).collect(),
    }
}

pub(crate) fn globals(backend: &dyn Backend) -> SceneGlobals {
    SceneGlobals::for_backend(backend, 320, 240, 16)
}

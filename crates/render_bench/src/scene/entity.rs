//! Scene entities handed over by the host
//!
//! Meshes arrive tessellated; lights and cameras carry their placement in
//! host coordinates (Z up).

use std::path::PathBuf;

use serde::{Serialize, Deserialize};

use crate::backends::EmitError;
use crate::foundation::math::{pose, Placement, Point3, Vec2, Vec3};
use crate::material::{RawParams, Rgb};

/// Where a mesh gets its material from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum MaterialRef {
    /// Plain diffuse material of the object color
    #[default]
    None,
    /// A card from the card store
    Card(String),
    /// An inline parameter bag
    Params(RawParams),
}

/// Tessellated shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshObject {
    /// Host object name
    pub name: String,
    /// Vertex positions
    pub vertices: Vec<Point3>,
    /// Triangles as vertex indices
    pub triangles: Vec<[u32; 3]>,
    /// Per-vertex texture coordinates
    #[serde(default)]
    pub uvs: Option<Vec<Vec2>>,
    /// Material source
    #[serde(default)]
    pub material: MaterialRef,
    /// Object color, used when no better color is known
    #[serde(default = "default_object_color")]
    pub color: Rgb,
}

const fn default_object_color() -> Rgb {
    Rgb::GREY
}

impl MeshObject {
    /// Create a mesh with the default object color and no material
    pub fn new(name: impl Into<String>, vertices: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            name: name.into(),
            vertices,
            triangles,
            uvs: None,
            material: MaterialRef::None,
            color: default_object_color(),
        }
    }

    /// Set texture coordinates
    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Set the material source
    pub fn with_material(mut self, material: MaterialRef) -> Self {
        self.material = material;
        self
    }

    /// Set the object color
    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Check the mesh can be written out
    pub fn validate(&self) -> Result<(), EmitError> {
        if self.vertices.is_empty() || self.triangles.is_empty() {
            return Err(EmitError::EmptyMesh(self.name.clone()));
        }
        if self.vertices.iter().any(|v| !v.coords.iter().all(|c| c.is_finite())) {
            return Err(EmitError::NonFinite {
                entity: self.name.clone(),
                what: "vertex position",
            });
        }
        let count = self.vertices.len();
        if let Some(index) = self
            .triangles
            .iter()
            .flatten()
            .copied()
            .find(|&i| usize::try_from(i).map_or(true, |i| i >= count))
        {
            return Err(EmitError::IndexOutOfRange {
                entity: self.name.clone(),
                index,
                count,
            });
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() != count {
                return Err(EmitError::UvCountMismatch {
                    entity: self.name.clone(),
                    uvs: uvs.len(),
                    vertices: count,
                });
            }
            if uvs.iter().any(|uv| !uv.iter().all(|c| c.is_finite())) {
                return Err(EmitError::NonFinite {
                    entity: self.name.clone(),
                    what: "texture coordinate",
                });
            }
        }
        Ok(())
    }
}

/// Perspective camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Host object name
    pub name: String,
    /// Position and orientation; the camera looks down its local -Z axis
    #[serde(with = "pose")]
    pub placement: Placement,
    /// Field of view in degrees
    pub fov: f64,
    /// Width over height of the image
    pub aspect: f64,
}

impl Camera {
    /// Check the camera can be written out
    pub fn validate(&self) -> Result<(), EmitError> {
        check_placement(&self.name, &self.placement)?;
        if !(self.fov.is_finite() && self.fov > 0.0 && self.fov < 180.0) {
            return Err(EmitError::InvalidValue {
                entity: self.name.clone(),
                what: "field of view",
                value: self.fov,
            });
        }
        check_positive(&self.name, "aspect ratio", self.aspect)
    }
}

/// Omnidirectional light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    /// Host object name
    pub name: String,
    /// Position; rotation is ignored
    #[serde(with = "pose")]
    pub placement: Placement,
    /// Light color
    pub color: Rgb,
    /// Power in watts
    pub power: f64,
}

impl PointLight {
    /// Light position
    pub fn position(&self) -> Point3 {
        Point3::from(self.placement.translation.vector)
    }

    /// Check the light can be written out
    pub fn validate(&self) -> Result<(), EmitError> {
        check_placement(&self.name, &self.placement)?;
        check_color(&self.name, self.color)?;
        check_non_negative(&self.name, "power", self.power)
    }
}

/// Rectangular emitter lying in the local XY plane, centered on its placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaLight {
    /// Host object name
    pub name: String,
    /// Center and orientation
    #[serde(with = "pose")]
    pub placement: Placement,
    /// Extent along local X and Y
    pub size: [f64; 2],
    /// Light color
    pub color: Rgb,
    /// Power in watts
    pub power: f64,
    /// Whether the emitter itself is invisible to the camera
    #[serde(default)]
    pub transparent: bool,
}

impl AreaLight {
    /// Corners in world space, counter-clockwise seen from +Z
    pub fn corners(&self) -> [Point3; 4] {
        let (u, v) = (self.size[0] / 2.0, self.size[1] / 2.0);
        [(-u, -v), (u, -v), (u, v), (-u, v)].map(|(x, y)| self.placement * Point3::new(x, y, 0.0))
    }

    /// Check the light can be written out
    pub fn validate(&self) -> Result<(), EmitError> {
        check_placement(&self.name, &self.placement)?;
        check_color(&self.name, self.color)?;
        check_positive(&self.name, "width", self.size[0])?;
        check_positive(&self.name, "height", self.size[1])?;
        check_non_negative(&self.name, "power", self.power)
    }
}

/// Physical sun and sky
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunskyLight {
    /// Host object name
    pub name: String,
    /// Direction from the scene towards the sun
    pub direction: Vec3,
    /// Atmospheric turbidity
    pub turbidity: f64,
    /// Ground albedo
    pub albedo: f64,
}

impl SunskyLight {
    /// Check the light can be written out
    pub fn validate(&self) -> Result<(), EmitError> {
        if !self.direction.iter().all(|c| c.is_finite()) || self.direction.norm() == 0.0 {
            return Err(EmitError::NonFinite {
                entity: self.name.clone(),
                what: "sun direction",
            });
        }
        check_positive(&self.name, "turbidity", self.turbidity)?;
        if !(0.0..=1.0).contains(&self.albedo) {
            return Err(EmitError::InvalidValue {
                entity: self.name.clone(),
                what: "ground albedo",
                value: self.albedo,
            });
        }
        Ok(())
    }
}

/// Environment map lighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLight {
    /// Host object name
    pub name: String,
    /// Equirectangular HDR image
    pub hdri_path: PathBuf,
    /// Rotation around the vertical axis, in degrees
    #[serde(default)]
    pub rotation: f64,
}

impl ImageLight {
    /// Check the light can be written out
    pub fn validate(&self) -> Result<(), EmitError> {
        if self.rotation.is_finite() {
            Ok(())
        } else {
            Err(EmitError::NonFinite {
                entity: self.name.clone(),
                what: "rotation",
            })
        }
    }
}

/// Any scene entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    /// Shape
    Mesh(MeshObject),
    /// Camera
    Camera(Camera),
    /// Point light
    PointLight(PointLight),
    /// Area light
    AreaLight(AreaLight),
    /// Sun and sky
    Sunsky(SunskyLight),
    /// Environment map
    ImageLight(ImageLight),
}

impl Entity {
    /// Host object name
    pub fn name(&self) -> &str {
        match self {
            Self::Mesh(e) => &e.name,
            Self::Camera(e) => &e.name,
            Self::PointLight(e) => &e.name,
            Self::AreaLight(e) => &e.name,
            Self::Sunsky(e) => &e.name,
            Self::ImageLight(e) => &e.name,
        }
    }
}

/// Everything the host wants rendered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Entities, in host order
    pub entities: Vec<Entity>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity
    pub fn with(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Add an entity
    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }
}

fn check_placement(entity: &str, placement: &Placement) -> Result<(), EmitError> {
    let finite = placement.translation.vector.iter().all(|c| c.is_finite())
        && placement.rotation.coords.iter().all(|c| c.is_finite());
    if finite {
        Ok(())
    } else {
        Err(EmitError::NonFinite {
            entity: entity.to_string(),
            what: "placement",
        })
    }
}

fn check_color(entity: &str, color: Rgb) -> Result<(), EmitError> {
    if color.to_array().iter().all(|c| c.is_finite() && *c >= 0.0) {
        Ok(())
    } else {
        Err(EmitError::NonFinite {
            entity: entity.to_string(),
            what: "color",
        })
    }
}

fn check_positive(entity: &str, what: &'static str, value: f64) -> Result<(), EmitError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EmitError::InvalidValue {
            entity: entity.to_string(),
            what,
            value,
        })
    }
}

fn check_non_negative(entity: &str, what: &'static str, value: f64) -> Result<(), EmitError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EmitError::InvalidValue {
            entity: entity.to_string(),
            what,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::placement;
    use approx::assert_relative_eq;

    fn triangle() -> MeshObject {
        MeshObject::new(
            "Tri",
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_valid_mesh() {
        assert!(triangle().validate().is_ok());
    }

    #[test]
    fn test_mesh_index_out_of_range() {
        let mut mesh = triangle();
        mesh.triangles.push([0, 2, 7]);
        assert!(matches!(mesh.validate(), Err(EmitError::IndexOutOfRange { index: 7, count: 3, .. })));
    }

    #[test]
    fn test_mesh_uv_mismatch_and_empty() {
        let mesh = triangle().with_uvs(vec![Vec2::new(0.0, 0.0)]);
        assert!(matches!(mesh.validate(), Err(EmitError::UvCountMismatch { .. })));
        let empty = MeshObject::new("Empty", Vec::new(), Vec::new());
        assert!(matches!(empty.validate(), Err(EmitError::EmptyMesh(_))));
    }

    #[test]
    fn test_area_light_corners() {
        let light = AreaLight {
            name: "Panel".into(),
            placement: placement(Vec3::new(0.0, 0.0, 2.0), Vec3::z(), 0.0),
            size: [2.0, 1.0],
            color: Rgb::WHITE,
            power: 100.0,
            transparent: false,
        };
        let corners = light.corners();
        assert_relative_eq!(corners[0], Point3::new(-1.0, -0.5, 2.0));
        assert_relative_eq!(corners[2], Point3::new(1.0, 0.5, 2.0));
        assert!(light.validate().is_ok());

        let flat = AreaLight { size: [0.0, 1.0], ..light };
        assert!(flat.validate().is_err());
    }

    #[test]
    fn test_camera_validation() {
        let camera = Camera {
            name: "Cam".into(),
            placement: Placement::identity(),
            fov: 190.0,
            aspect: 1.5,
        };
        assert!(camera.validate().is_err());
        assert!(Camera { fov: 45.0, ..camera }.validate().is_ok());
    }

    #[test]
    fn test_scene_ron_round_trip() {
        let scene = Scene::new()
            .with(Entity::Mesh(triangle().with_material(MaterialRef::Card("Glass".into()))))
            .with(Entity::Sunsky(SunskyLight {
                name: "Sun".into(),
                direction: Vec3::new(0.0, -1.0, 1.0),
                turbidity: 2.2,
                albedo: 0.1,
            }));
        let text = ron::to_string(&scene).unwrap();
        let parsed: Scene = ron::from_str(&text).unwrap();
        assert_eq!(parsed, scene);
    }
}

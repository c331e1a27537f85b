//! Math utilities and types
//!
//! Scene geometry arrives from the host already tessellated and expressed in
//! host coordinates (Z up, right handed). Renderers that use another
//! convention convert with the helpers at the bottom of this module.

pub use nalgebra::{Isometry3, Matrix4, Translation3, Unit, UnitQuaternion, Vector3};

/// 2D vector type (UV coordinates)
pub type Vec2 = nalgebra::Vector2<f64>;

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f64>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f64>;

/// Rotation quaternion type
pub type Quat = UnitQuaternion<f64>;

/// Rigid placement of an entity (rotation then translation)
pub type Placement = Isometry3<f64>;

/// Build a placement from a position and an axis/angle rotation in degrees
pub fn placement(position: Vec3, axis: Vec3, angle_degrees: f64) -> Placement {
    let rotation = Unit::try_new(axis, f64::EPSILON)
        .map_or_else(Quat::identity, |axis| {
            Quat::from_axis_angle(&axis, angle_degrees.to_radians())
        });
    Isometry3::from_parts(Translation3::from(position), rotation)
}

/// View vectors of a camera-like placement
///
/// Cameras look down their local -Z axis with +Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAt {
    /// Eye position
    pub origin: Point3,
    /// A point one unit along the view direction
    pub target: Point3,
    /// Up direction
    pub up: Vec3,
}

impl LookAt {
    /// Derive view vectors from a placement
    pub fn from_placement(placement: &Placement) -> Self {
        let origin = Point3::from(placement.translation.vector);
        let direction = placement.rotation * Vec3::new(0.0, 0.0, -1.0);
        let up = placement.rotation * Vec3::new(0.0, 1.0, 0.0);
        Self {
            origin,
            target: origin + direction,
            up,
        }
    }
}

/// Rotation of a placement as (axis, angle in degrees)
///
/// The identity rotation is reported around +Z with a zero angle.
pub fn axis_angle_degrees(placement: &Placement) -> (Vec3, f64) {
    placement.rotation.axis_angle().map_or_else(
        || (Vec3::z(), 0.0),
        |(axis, angle)| (axis.into_inner(), angle.to_degrees()),
    )
}

/// Column-major homogeneous matrix of a placement, as 16 values
pub fn column_major(placement: &Placement) -> [f64; 16] {
    let matrix = placement.to_homogeneous();
    let mut values = [0.0; 16];
    values.copy_from_slice(matrix.as_slice());
    values
}

/// Serde representation of a [`Placement`]: position plus axis/angle rotation
///
/// Used with `#[serde(with = "crate::foundation::math::pose")]`.
pub mod pose {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{axis_angle_degrees, placement, Placement, Vec3};

    #[derive(Serialize, Deserialize)]
    struct Pose {
        position: [f64; 3],
        #[serde(default = "default_axis")]
        axis: [f64; 3],
        #[serde(default)]
        angle: f64,
    }

    const fn default_axis() -> [f64; 3] {
        [0.0, 0.0, 1.0]
    }

    /// Serialize a placement as a pose
    pub fn serialize<S: Serializer>(value: &Placement, serializer: S) -> Result<S::Ok, S::Error> {
        let (axis, angle) = axis_angle_degrees(value);
        let t = value.translation.vector;
        Pose {
            position: [t.x, t.y, t.z],
            axis: [axis.x, axis.y, axis.z],
            angle,
        }
        .serialize(serializer)
    }

    /// Deserialize a placement from a pose
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Placement, D::Error> {
        let pose = Pose::deserialize(deserializer)?;
        Ok(placement(Vec3::from(pose.position), Vec3::from(pose.axis), pose.angle))
    }
}

/// Convert a host vector into a Y-up right handed system (Y and Z switched, Z inverted)
pub fn to_y_up(v: &Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, -v.y)
}

/// Convert a host vector into a Y-up left handed system (Y and Z switched)
pub fn to_left_handed(v: &Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

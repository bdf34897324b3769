//! Local node transformation.
//!
//! Nodes carry their local placement as translation, rotation (unit
//! quaternion) and scale. The matrix form is always composed as
//! `T * R * S`.

use cgmath::{InnerSpace, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

/// Translation, rotation and scale of a node relative to its parent.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub translation: Vector3<f64>,
    pub rotation: Quaternion<f64>,
    pub scale: Vector3<f64>,
}

impl Instance {
    /// Identity TRS.
    pub fn new() -> Self {
        Self {
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Build from glTF ordered arrays; `rotation` is `[x, y, z, w]`.
    pub fn from_trs(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            translation: vec3(translation),
            rotation: quat(rotation),
            scale: vec3(scale),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_translation(self.translation)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Split an affine matrix into translation, rotation and scale.
    ///
    /// Shear is discarded. A negative determinant is folded into the x scale.
    /// Degenerate axes keep an identity rotation.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let translation = m.w.truncate();
        let mut scale = Vector3::new(
            m.x.truncate().magnitude(),
            m.y.truncate().magnitude(),
            m.z.truncate().magnitude(),
        );
        if m.determinant() < 0.0 {
            scale.x = -scale.x;
        }
        if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
            return Self {
                translation,
                rotation: Quaternion::one(),
                scale,
            };
        }
        let rotation = Matrix3::from_cols(
            m.x.truncate() / scale.x,
            m.y.truncate() / scale.y,
            m.z.truncate() / scale.z,
        );
        Self {
            translation,
            rotation: Quaternion::from(rotation).normalize(),
            scale,
        }
    }
}

impl From<Vector3<f64>> for Instance {
    fn from(translation: Vector3<f64>) -> Self {
        Instance {
            translation,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn vec3(v: [f32; 3]) -> Vector3<f64> {
    Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64)
}

/// glTF stores quaternions as `[x, y, z, w]`.
pub(crate) fn quat(q: [f32; 4]) -> Quaternion<f64> {
    Quaternion::new(q[3] as f64, q[0] as f64, q[1] as f64, q[2] as f64)
}

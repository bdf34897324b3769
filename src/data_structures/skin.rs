//! Skeletal skins and joint-matrix evaluation.

use cgmath::{Matrix4, SquareMatrix};
use log::warn;

use crate::{backend::mat4_to_f32, error::AssetError};

#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub name: Option<String>,
    /// Joint node indices in palette order.
    pub joints: Vec<usize>,
    /// One per joint; identity when the document supplies none.
    pub inverse_bind_matrices: Vec<Matrix4<f64>>,
    /// Column-major joint palette, 16 floats per joint.
    pub joint_matrix_data: Vec<f32>,
}

impl Skin {
    pub fn new(
        name: Option<String>,
        joints: Vec<usize>,
        inverse_bind_matrices: Option<Vec<Matrix4<f64>>>,
    ) -> Self {
        let inverse_bind_matrices =
            inverse_bind_matrices.unwrap_or_else(|| vec![Matrix4::identity(); joints.len()]);
        let joint_matrix_data = vec![0.0; joints.len() * 16];
        Self {
            name,
            joints,
            inverse_bind_matrices,
            joint_matrix_data,
        }
    }

    /// Recompute the joint palette for the current pose.
    ///
    /// Each entry is `mesh_world_inverse * joint_world * inverse_bind`.
    /// `world` is the per-pass world-matrix table indexed by node.
    pub fn update_joint_matrices(&mut self, world: &[Matrix4<f64>], mesh_world_inverse: &Matrix4<f64>) {
        self.joint_matrix_data.resize(self.joints.len() * 16, 0.0);
        for (i, &joint) in self.joints.iter().enumerate() {
            let joint_world = world.get(joint).copied().unwrap_or_else(Matrix4::identity);
            let ibm = self
                .inverse_bind_matrices
                .get(i)
                .copied()
                .unwrap_or_else(Matrix4::identity);
            let m = mesh_world_inverse * joint_world * ibm;
            self.joint_matrix_data[i * 16..(i + 1) * 16].copy_from_slice(&mat4_to_f32(&m));
        }
    }

    pub fn joint_matrix(&self, joint: usize) -> Option<&[f32]> {
        self.joint_matrix_data.get(joint * 16..(joint + 1) * 16)
    }
}

/// Inverse of the skinned node's world matrix, or identity when singular.
pub fn mesh_world_inverse(node: usize, world: &Matrix4<f64>) -> Matrix4<f64> {
    match world.invert() {
        Some(inverse) => inverse,
        None => {
            warn!("{}; skinning with identity", AssetError::NonInvertibleTransform { node });
            Matrix4::identity()
        }
    }
}

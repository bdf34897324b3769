//! Shader programs primitives are drawn with.
//!
//! Two fixed variants ship with the crate: `static_mesh` for rigid geometry
//! and `skinned` for primitives carrying joints and weights. Both share the
//! attribute and uniform names below; the backend compiles them from
//! [`ShaderSource`].

use crate::backend::ShaderVariant;

pub mod skinned;
pub mod static_mesh;

pub const A_POSITION: &str = "a_position";
pub const A_NORMAL: &str = "a_normal";
pub const A_JOINTS_0: &str = "a_joints_0";
pub const A_WEIGHTS_0: &str = "a_weights_0";

pub const U_JOINT_MATRIX: &str = "u_jointMatrix";
pub const U_PROJECTION_MATRIX: &str = "u_projectionMatrix";
pub const U_VIEW_MATRIX: &str = "u_viewMatrix";
pub const U_MODEL_MATRIX: &str = "u_modelMatrix";

/// Vertex and fragment GLSL of one program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: &'static str,
    pub fragment: &'static str,
}

pub fn shader_source(variant: ShaderVariant) -> ShaderSource {
    match variant {
        ShaderVariant::Static => static_mesh::source(),
        ShaderVariant::Skinned => skinned::source(),
    }
}

//! Program for skinned primitives.

use crate::pipelines::ShaderSource;

/// Size of the `u_jointMatrix` array in the vertex shader.
pub const MAX_JOINTS: usize = 64;

pub fn source() -> ShaderSource {
    ShaderSource {
        vertex: include_str!("skinned.vert"),
        fragment: include_str!("mesh.frag"),
    }
}

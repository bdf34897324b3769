//! Program for rigid primitives.

use crate::pipelines::ShaderSource;

pub fn source() -> ShaderSource {
    ShaderSource {
        vertex: include_str!("static_mesh.vert"),
        fragment: include_str!("mesh.frag"),
    }
}

//! Render walker.
//!
//! [`draw`] walks the prepared scene depth first, parents before children,
//! and issues one draw per primitive through the [`RenderBackend`]. World
//! matrices are computed per pass: the walker composes them on the way down
//! and skins read joint poses from a table computed once at the start of the
//! pass, so nothing on the nodes is used as scratch space.
//!
//! # Per primitive
//!
//! 1. use the cached program, rebind attributes and the index buffer
//! 2. set `u_modelMatrix = geo_transform * world`, then view and projection
//! 3. set `u_jointMatrix` when the node has a skin and the program is skinned
//! 4. draw indexed, or over the vertex count when there are no indices
//!

use cgmath::Matrix4;
use log::{trace, warn};

use crate::{
    backend::{Camera, RenderBackend, ShaderVariant, UniformValue},
    data_structures::{
        description::AssetDescription,
        mesh::{Mesh, Primitive},
        scene_graph::{Node, compose},
        skin::{Skin, mesh_world_inverse},
    },
    pipelines::skinned::MAX_JOINTS,
};

/// Per-pass camera and placement matrices.
#[derive(Clone, Copy, Debug)]
struct Frame {
    projection: Matrix4<f64>,
    view: Matrix4<f64>,
    geo_transform: Matrix4<f64>,
}

struct Pass<'a> {
    nodes: &'a [Node],
    meshes: &'a [Mesh],
    skins: &'a mut [Skin],
    /// World matrices of the current pose, indexed by node.
    world: Vec<Matrix4<f64>>,
    frame: Frame,
    draws: usize,
}

/// Draw every root of `description`. Returns the number of draw calls issued.
pub fn draw(
    description: &mut AssetDescription,
    backend: &mut dyn RenderBackend,
    camera: &dyn Camera,
    geo_transform: &Matrix4<f64>,
) -> usize {
    let world = description.world_matrices();
    let mut pass = Pass {
        nodes: &description.nodes,
        meshes: &description.meshes,
        skins: &mut description.skins,
        world,
        frame: Frame {
            projection: camera.projection_matrix(),
            view: camera.view_matrix(),
            geo_transform: *geo_transform,
        },
        draws: 0,
    };
    for &root in &description.roots {
        pass.draw_node(backend, root, None);
    }
    trace!("issued {} draws", pass.draws);
    pass.draws
}

impl Pass<'_> {
    fn draw_node(
        &mut self,
        backend: &mut dyn RenderBackend,
        idx: usize,
        parent_world: Option<&Matrix4<f64>>,
    ) {
        let nodes = self.nodes;
        let meshes = self.meshes;
        let Some(node) = nodes.get(idx) else {
            warn!("skipping missing node {idx}");
            return;
        };
        let world = compose(parent_world, node.model_matrix());

        if let Some(skin_idx) = node.skin {
            if let Some(skin) = self.skins.get_mut(skin_idx) {
                skin.update_joint_matrices(&self.world, &mesh_world_inverse(idx, &world));
            }
        }

        if let Some(mesh) = node.mesh.and_then(|m| meshes.get(m)) {
            let joints = node
                .skin
                .and_then(|s| self.skins.get(s))
                .map(|skin| skin.joint_matrix_data.as_slice());
            for primitive in &mesh.primitives {
                if draw_primitive(backend, primitive, &self.frame, &world, joints) {
                    self.draws += 1;
                }
            }
        }

        for &child in &node.children {
            self.draw_node(backend, child, Some(&world));
        }
    }
}

fn draw_primitive(
    backend: &mut dyn RenderBackend,
    primitive: &Primitive,
    frame: &Frame,
    world: &Matrix4<f64>,
    joints: Option<&[f32]>,
) -> bool {
    let Some(cache) = primitive.render_cache() else {
        trace!("primitive without render cache");
        return false;
    };
    backend.use_program(cache.program);
    for binding in &cache.attributes {
        backend.bind_attribute(binding);
    }
    if let Some(buffer) = cache.index_buffer {
        backend.bind_index_buffer(buffer);
    }

    let uniforms = &cache.uniforms;
    if let Some(location) = uniforms.model {
        backend.set_uniform(location, UniformValue::Mat4(frame.geo_transform * *world));
    }
    if let Some(location) = uniforms.view {
        backend.set_uniform(location, UniformValue::Mat4(frame.view));
    }
    if let Some(location) = uniforms.projection {
        backend.set_uniform(location, UniformValue::Mat4(frame.projection));
    }
    if cache.variant == ShaderVariant::Skinned {
        if let (Some(location), Some(joints)) = (uniforms.joint_matrix, joints) {
            let len = joints.len().min(MAX_JOINTS * 16);
            backend.set_uniform(location, UniformValue::Mat4Array(&joints[..len]));
        }
    }

    match (cache.index_buffer, cache.index_type) {
        (Some(_), Some(index_type)) => {
            backend.draw_indexed(primitive.mode, cache.index_count, index_type)
        }
        _ => backend.draw_arrays(primitive.mode, cache.vertex_count),
    }
    true
}

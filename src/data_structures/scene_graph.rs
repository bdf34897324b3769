//! Scene graph and hierarchical transform propagation.
//!
//! Nodes live in a flat arena owned by the asset description and refer to each
//! other by index: children are owned top-down, the parent index is a lookup
//! back-reference only. Each node caches its local model matrix; world
//! matrices are never stored on nodes but computed per pass and threaded
//! through the traversal.

use cgmath::{Matrix4, Quaternion, SquareMatrix, Vector3};
use log::warn;

use crate::{
    data_structures::instance::Instance,
    error::{AssetError, RefKind, Result},
};

#[derive(Clone, Debug)]
pub struct Node {
    pub name: Option<String>,
    /// Set by [`link_parents`]; lookup only.
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    local: Instance,
    model_matrix: Matrix4<f64>,
}

impl Node {
    pub fn new(local: Instance) -> Self {
        let model_matrix = local.to_matrix();
        Self {
            name: None,
            parent: None,
            children: Vec::new(),
            mesh: None,
            skin: None,
            local,
            model_matrix,
        }
    }

    pub fn local_transform(&self) -> &Instance {
        &self.local
    }

    /// Local-to-parent matrix, `T * R * S` of the current local transform.
    pub fn model_matrix(&self) -> &Matrix4<f64> {
        &self.model_matrix
    }

    pub fn set_local_transform(&mut self, local: Instance) {
        self.local = local;
        self.update_model_matrix();
    }

    pub fn set_translation(&mut self, translation: Vector3<f64>) {
        self.local.translation = translation;
        self.update_model_matrix();
    }

    pub fn set_rotation(&mut self, rotation: Quaternion<f64>) {
        self.local.rotation = rotation;
        self.update_model_matrix();
    }

    pub fn set_scale(&mut self, scale: Vector3<f64>) {
        self.local.scale = scale;
        self.update_model_matrix();
    }

    fn update_model_matrix(&mut self) {
        self.model_matrix = self.local.to_matrix();
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(Instance::default())
    }
}

/// `parent * local`, or `local` for a root.
pub fn compose(parent: Option<&Matrix4<f64>>, local: &Matrix4<f64>) -> Matrix4<f64> {
    match parent {
        Some(parent) => parent * local,
        None => *local,
    }
}

/// Fill in parent back-references from the children lists.
///
/// Rejects out-of-range children, nodes claimed by more than one parent and
/// cycles, so every later traversal terminates.
pub fn link_parents(nodes: &mut [Node]) -> Result<()> {
    for node in nodes.iter_mut() {
        node.parent = None;
    }
    for parent in 0..nodes.len() {
        let children = nodes[parent].children.clone();
        for child in children {
            let Some(node) = nodes.get_mut(child) else {
                return Err(AssetError::missing(RefKind::Node, child));
            };
            if child == parent {
                return Err(AssetError::invalid(format!("node {child} is its own child")));
            }
            if let Some(other) = node.parent {
                return Err(AssetError::invalid(format!(
                    "node {child} has two parents ({other} and {parent})"
                )));
            }
            node.parent = Some(parent);
        }
    }
    for start in 0..nodes.len() {
        let mut current = nodes[start].parent;
        let mut steps = 0;
        while let Some(p) = current {
            steps += 1;
            if steps > nodes.len() {
                return Err(AssetError::invalid(format!(
                    "node hierarchy above node {start} contains a cycle"
                )));
            }
            current = nodes[p].parent;
        }
    }
    Ok(())
}

/// Nodes without a parent, in declaration order.
pub fn parentless(nodes: &[Node]) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.parent.is_none())
        .map(|(idx, _)| idx)
        .collect()
}

/// World matrix of every node for the current pose.
///
/// Indexed like `nodes`. Computed once per render pass; joints may sit
/// anywhere in the hierarchy, not only below the node being drawn.
pub fn world_matrices(nodes: &[Node]) -> Vec<Matrix4<f64>> {
    let mut cache: Vec<Option<Matrix4<f64>>> = vec![None; nodes.len()];
    for idx in 0..nodes.len() {
        world_of(nodes, idx, &mut cache);
    }
    cache
        .into_iter()
        .map(|m| m.unwrap_or_else(Matrix4::identity))
        .collect()
}

fn world_of(nodes: &[Node], idx: usize, cache: &mut Vec<Option<Matrix4<f64>>>) -> Matrix4<f64> {
    if let Some(m) = cache[idx] {
        return m;
    }
    let node = &nodes[idx];
    let world = match node.parent {
        Some(p) if p < nodes.len() => {
            let parent = world_of(nodes, p, cache);
            compose(Some(&parent), node.model_matrix())
        }
        Some(p) => {
            warn!("node {idx} refers to missing parent {p}; treating it as a root");
            *node.model_matrix()
        }
        None => *node.model_matrix(),
    };
    cache[idx] = Some(world);
    world
}

/// World matrix of a single node, walking up its parents.
pub fn node_world_matrix(nodes: &[Node], idx: usize) -> Option<Matrix4<f64>> {
    let mut world = *nodes.get(idx)?.model_matrix();
    let mut current = nodes[idx].parent;
    while let Some(p) = current {
        let parent = nodes.get(p)?;
        world = parent.model_matrix() * world;
        current = parent.parent;
    }
    Some(world)
}

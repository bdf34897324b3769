//! Normalized in-memory form of a decoded asset.

use std::collections::HashMap;

use cgmath::Matrix4;
use log::warn;
use serde_json::Value;

use crate::{
    backend::{ProgramHandle, ShaderVariant},
    data_structures::{
        animation::Animation,
        mesh::Mesh,
        scene_graph::{self, Node},
        skin::Skin,
    },
    error::{AssetError, RefKind, Result},
};

/// Document format generation an asset was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

/// Everything a loaded asset needs to be animated and drawn.
///
/// Produced once per load by the decoders. After preparation only node local
/// transforms (animation) and primitive render caches (builder) change.
#[derive(Clone, Debug)]
pub struct AssetDescription {
    pub version: Version,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
    /// Root nodes of the scene that gets drawn.
    pub roots: Vec<usize>,
    pub extensions: Option<Value>,
    pub extras: Option<Value>,
    /// Programs shared by all primitives, one per variant in use.
    pub(crate) programs: HashMap<ShaderVariant, ProgramHandle>,
}

impl AssetDescription {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            nodes: Vec::new(),
            meshes: Vec::new(),
            skins: Vec::new(),
            animations: Vec::new(),
            roots: Vec::new(),
            extensions: None,
            extras: None,
            programs: HashMap::new(),
        }
    }

    /// Link parents and check every cross-reference.
    ///
    /// Skins on nodes without a mesh are dropped with a warning.
    pub fn validate(&mut self) -> Result<()> {
        scene_graph::link_parents(&mut self.nodes)?;
        let node_count = self.nodes.len();
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if let Some(mesh) = node.mesh.filter(|&m| m >= self.meshes.len()) {
                return Err(AssetError::missing(RefKind::Mesh, mesh));
            }
            if let Some(skin) = node.skin {
                if skin >= self.skins.len() {
                    return Err(AssetError::missing(RefKind::Skin, skin));
                }
                if node.mesh.is_none() {
                    warn!("node {idx} has skin {skin} but no mesh; ignoring the skin");
                    node.skin = None;
                }
            }
        }
        for skin in &self.skins {
            if let Some(&joint) = skin.joints.iter().find(|&&j| j >= node_count) {
                return Err(AssetError::missing(RefKind::Node, joint));
            }
            if skin.inverse_bind_matrices.len() < skin.joints.len() {
                return Err(AssetError::invalid(format!(
                    "skin has {} joints but {} inverse bind matrices",
                    skin.joints.len(),
                    skin.inverse_bind_matrices.len()
                )));
            }
        }
        for animation in &self.animations {
            if let Some(channel) = animation.channels.iter().find(|c| c.target >= node_count) {
                return Err(AssetError::missing(RefKind::Node, channel.target));
            }
        }
        if let Some(&root) = self.roots.iter().find(|&&r| r >= node_count) {
            return Err(AssetError::missing(RefKind::Node, root));
        }
        Ok(())
    }

    /// World matrices of every node for the current pose.
    pub fn world_matrices(&self) -> Vec<Matrix4<f64>> {
        scene_graph::world_matrices(&self.nodes)
    }

    pub fn node_world_matrix(&self, node: usize) -> Option<Matrix4<f64>> {
        scene_graph::node_world_matrix(&self.nodes, node)
    }

    /// Apply animation `index` at `time`. Returns `false` when there is no
    /// such animation.
    pub fn apply_animation(&mut self, index: usize, time: f64) -> bool {
        match self.animations.get(index) {
            Some(animation) => {
                animation.apply(&mut self.nodes, time);
                true
            }
            None => false,
        }
    }

    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(|m| m.primitives.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        animation::{Channel, Interpolation, Keyframes, Sampler},
        instance::Instance,
    };
    use cgmath::Vector3;

    fn two_nodes() -> AssetDescription {
        let mut description = AssetDescription::new(Version::V2);
        let mut root = Node::new(Instance::new());
        root.children = vec![1];
        description.nodes = vec![root, Node::default()];
        description.roots = vec![0];
        description
    }

    #[test]
    fn validate_links_parents() {
        let mut description = two_nodes();
        description.validate().unwrap();
        assert_eq!(description.nodes[1].parent, Some(0));
    }

    #[test]
    fn dangling_references_fail() {
        let mut mesh_ref = two_nodes();
        mesh_ref.nodes[1].mesh = Some(0);
        assert!(matches!(
            mesh_ref.validate(),
            Err(AssetError::MissingReference { kind: RefKind::Mesh, .. })
        ));

        let mut root_ref = two_nodes();
        root_ref.roots.push(9);
        assert!(root_ref.validate().is_err());

        let mut channel_ref = two_nodes();
        channel_ref.animations.push(Animation {
            name: None,
            channels: vec![Channel {
                target: 2,
                sampler: Sampler::new(
                    vec![0.0],
                    Keyframes::Scale(vec![Vector3::new(1.0, 1.0, 1.0)]),
                    Interpolation::Linear,
                )
                .unwrap(),
            }],
        });
        assert!(matches!(
            channel_ref.validate(),
            Err(AssetError::MissingReference { kind: RefKind::Node, .. })
        ));
    }

    #[test]
    fn skin_without_mesh_is_dropped() {
        let mut description = two_nodes();
        description.skins.push(Skin::new(None, vec![0], None));
        description.nodes[1].skin = Some(0);
        description.validate().unwrap();
        assert_eq!(description.nodes[1].skin, None);
    }

    #[test]
    fn missing_animation_index_is_a_no_op() {
        let mut description = two_nodes();
        assert!(!description.apply_animation(0, 1.0));
    }
}

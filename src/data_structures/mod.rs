//! Asset data structures: the decoded scene graph and everything hanging off it.
//!
//! - `accessor` holds typed, tightly packed element data
//! - `animation` contains keyframe samplers and channels
//! - `description` is the normalized asset produced by the decoders
//! - `instance` holds per-node translation, rotation and scale
//! - `mesh` contains primitives and their cached draw state
//! - `scene_graph` is the node arena with world-matrix propagation
//! - `skin` evaluates joint palettes for skeletal skinning

pub mod accessor;
pub mod animation;
pub mod description;
pub mod instance;
pub mod mesh;
pub mod scene_graph;
pub mod skin;

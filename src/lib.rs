//! geo-gltf
//!
//! Loads glTF 1.0 and 2.0 assets (JSON or binary container), builds their
//! scene graph, evaluates animations and skins, and draws them on a reference
//! ellipsoid through a small render backend trait. The crate never talks to a
//! graphics API itself; embedders implement [`backend::RenderBackend`] for
//! whatever context they render with.
//!
//! High-level modules
//! - `asset`: the per-model facade (placement, load task, render)
//! - `backend`: render backend and camera traits, opaque handles
//! - `data_structures`: decoded asset data (nodes, meshes, skins, animations)
//! - `error`: the `AssetError` taxonomy
//! - `geodesy`: ellipsoids and geodetic placement matrices
//! - `globe`: a scene of assets sharing an ellipsoid and a clock
//! - `pipelines`: shader sources for static and skinned primitives
//! - `prepare`: turns a decoded description into backend state
//! - `render`: the depth-first render walker
//! - `resources`: transports, binary containers and the 1.0/2.0 decoders
//!

pub mod asset;
pub mod backend;
pub mod data_structures;
pub mod error;
pub mod geodesy;
pub mod globe;
pub mod pipelines;
pub mod prepare;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use asset::{Delivery, GeoAsset, LoadState, LoadTask, PlacementOptions, Scale};
pub use backend::{Camera, RenderBackend};
pub use cgmath::*;
pub use error::{AssetError, Result};
pub use globe::{GlobeScene, InitStep, SceneConfig};

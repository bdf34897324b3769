//! Error taxonomy for loading and rendering geo-referenced assets.
//!
//! Load-time errors abort the whole load: nothing is installed and the asset
//! stays unloaded. [`AssetError::NonInvertibleTransform`] is the only
//! render-time condition and is never returned to callers of `render`; it is
//! logged and recovered with an identity fallback.

use thiserror::Error;

/// Kind of object an index was expected to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Node,
    Mesh,
    Skin,
    Accessor,
    BufferView,
    Buffer,
    Sampler,
    Scene,
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RefKind::Node => "node",
            RefKind::Mesh => "mesh",
            RefKind::Skin => "skin",
            RefKind::Accessor => "accessor",
            RefKind::BufferView => "buffer view",
            RefKind::Buffer => "buffer",
            RefKind::Sampler => "animation sampler",
            RefKind::Scene => "scene",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("unsupported glTF version: {0}")]
    UnsupportedVersion(String),

    #[error("malformed binary container: {0}")]
    MalformedContainer(String),

    #[error("missing {kind} reference: {id}")]
    MissingReference { kind: RefKind, id: String },

    #[error("world matrix of node {node} is not invertible")]
    NonInvertibleTransform { node: usize },

    #[error(transparent)]
    TransportFailure(#[from] anyhow::Error),

    #[error("invalid glTF document: {0}")]
    InvalidDocument(String),

    #[error("render backend failure: {0:#}")]
    BackendFailure(anyhow::Error),
}

impl AssetError {
    pub fn missing(kind: RefKind, id: impl ToString) -> Self {
        AssetError::MissingReference {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid(description: impl AsRef<str>) -> Self {
        AssetError::InvalidDocument(description.as_ref().to_string())
    }

    pub fn malformed(description: impl AsRef<str>) -> Self {
        AssetError::MalformedContainer(description.as_ref().to_string())
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(e: serde_json::Error) -> Self {
        AssetError::InvalidDocument(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssetError>;

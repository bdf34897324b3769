//! Loading asset descriptions from external files.
//!
//! `load_asset` fetches the model through a [`Transport`], unwraps a binary
//! container when the magic matches and hands the JSON document to
//! [`parse`], which dispatches on `asset.version` to the 1.0 or 2.0 decoder.
//! All external buffers are fetched concurrently and the load resolves only
//! once every fetch has completed. Any failure aborts the whole load.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::{
    data_structures::description::{AssetDescription, Version},
    error::{AssetError, Result},
};

pub mod accessor;
pub mod container;
pub mod transport;
pub mod v1;
pub mod v2;

use transport::Transport;

/// Where the model bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSource {
    /// Fetched as `root_path + file_name`.
    FileName(String),
    /// An in-memory binary container starting at `byte_offset`.
    Binary { buffer: Arc<[u8]>, byte_offset: usize },
}

/// Decide the decoder from `asset.version`.
///
/// A document without an `asset` object is treated as 1.0. The version may
/// be a string or a number; only the major part matters.
pub fn detect_version(document: &Value) -> Result<Version> {
    let Some(asset) = document.get("asset") else {
        return Ok(Version::V1);
    };
    let raw = match asset.get("version") {
        None | Some(Value::Null) => return Ok(Version::V1),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => return Err(AssetError::UnsupportedVersion(other.to_string())),
    };
    let major = raw
        .trim()
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok());
    match major {
        Some(1) => Ok(Version::V1),
        Some(2) => Ok(Version::V2),
        _ => Err(AssetError::UnsupportedVersion(raw)),
    }
}

/// Decode a JSON document, with the binary chunk of its container if any.
pub async fn parse(
    root_path: &str,
    json: &[u8],
    bin: Option<&[u8]>,
    transport: &dyn Transport,
) -> Result<AssetDescription> {
    let document: Value = serde_json::from_slice(json)?;
    let version = detect_version(&document)?;
    debug!("parsing {version:?} document from {root_path:?}");
    match version {
        Version::V1 => v1::decode(root_path, json, bin, transport).await,
        Version::V2 => v2::decode(root_path, json, bin, transport).await,
    }
}

/// Split raw model bytes into JSON and optional binary payload and parse.
pub async fn parse_bytes(
    root_path: &str,
    data: &[u8],
    transport: &dyn Transport,
) -> Result<AssetDescription> {
    if container::is_container(data) {
        let container = container::read(data)?;
        parse(root_path, container.json, container.bin, transport).await
    } else {
        parse(root_path, data, None, transport).await
    }
}

/// Fetch and decode a model.
pub async fn load_asset(
    root_path: &str,
    source: &ModelSource,
    transport: &dyn Transport,
) -> Result<AssetDescription> {
    match source {
        ModelSource::FileName(file_name) => {
            let url = format!("{root_path}{file_name}");
            debug!("loading model {url}");
            let data = transport.fetch(&url).await?;
            parse_bytes(root_path, &data, transport).await
        }
        ModelSource::Binary {
            buffer,
            byte_offset,
        } => {
            let data = buffer.get(*byte_offset..).ok_or_else(|| {
                AssetError::malformed(format!(
                    "byte offset {byte_offset} is past the {} byte buffer",
                    buffer.len()
                ))
            })?;
            if !container::is_container(data) {
                return Err(AssetError::malformed("in-memory model is not a binary container"));
            }
            parse_bytes(root_path, data, transport).await
        }
    }
}

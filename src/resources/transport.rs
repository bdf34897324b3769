//! Fetching asset bytes.
//!
//! Loading never touches the network or the filesystem directly; every byte
//! comes through a [`Transport`]. Natively assets are read with tokio, on the
//! web they are fetched with reqwest. `data:` URIs are decoded in place and
//! never reach the transport.

use anyhow::{Context, anyhow};
use base64::Engine;
use futures::future::LocalBoxFuture;

use crate::error::{AssetError, Result};

/// Source of raw bytes for a URL or path.
pub trait Transport {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>>;
}

impl<T: Transport + ?Sized> Transport for std::rc::Rc<T> {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        (**self).fetch(url)
    }
}

/// Reads files relative to an optional base directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug, Default)]
pub struct FileTransport {
    base: Option<std::path::PathBuf>,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Transport for FileTransport {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        Box::pin(async move {
            let path = match &self.base {
                Some(base) => base.join(url),
                None => std::path::PathBuf::from(url),
            };
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))
        })
    }
}

/// HTTP GET relative to the page origin.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(target_arch = "wasm32")]
impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(target_arch = "wasm32")]
impl Transport for HttpTransport {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("requesting {url}"))?
                .error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        })
    }
}

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Decode a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("data URI without payload"))?;
    if !header.ends_with(";base64") {
        return Err(anyhow!("only base64 data URIs are supported, got {header:?}"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("decoding base64 data URI")
}

/// Load a document-relative URI: data URIs inline, everything else through
/// the transport as `root_path + uri`.
///
/// A data URI that does not decode is an invalid document, not a transport
/// failure.
pub async fn resolve_uri(transport: &dyn Transport, root_path: &str, uri: &str) -> Result<Vec<u8>> {
    if is_data_uri(uri) {
        return decode_data_uri(uri).map_err(|e| AssetError::invalid(format!("{e:#}")));
    }
    let url = format!("{root_path}{uri}");
    log::debug!("fetching {url}");
    Ok(transport.fetch(&url).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    struct Fixed;

    impl Transport for Fixed {
        fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
            Box::pin(async move { Ok(url.as_bytes().to_vec()) })
        }
    }

    #[test]
    fn decodes_base64_payload() {
        let bytes = decode_data_uri("data:application/octet-stream;base64,AAECAw==").unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("file.bin").is_err());
    }

    #[test]
    fn relative_uris_are_prefixed_with_root() {
        let bytes = block_on(resolve_uri(&Fixed, "models/", "tree.bin")).unwrap();
        assert_eq!(bytes, b"models/tree.bin");
        let inline = block_on(resolve_uri(&Fixed, "models/", "data:;base64,AQ==")).unwrap();
        assert_eq!(inline, vec![1]);
    }

    #[test]
    fn corrupt_data_uri_is_an_invalid_document() {
        let err = block_on(resolve_uri(&Fixed, "", "data:;base64,!!not base64!!")).unwrap_err();
        assert!(matches!(err, AssetError::InvalidDocument(_)));
        assert!(err.to_string().contains("base64"));
    }
}

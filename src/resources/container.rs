//! Binary container (`.glb`) reader.
//!
//! Two layouts share the 12-byte `magic, version, length` header:
//!
//! - version 2: a sequence of `{length, type}` chunks, the first one JSON and
//!   an optional `BIN\0` chunk; unknown chunk types are skipped
//! - version 1 (`KHR_binary_glTF`): `{contentLength, contentFormat = 0}`
//!   followed by the JSON content; the rest up to `length` is the binary body

use log::debug;

use crate::error::{AssetError, Result};

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"
const HEADER_LEN: usize = 12;

/// JSON document and optional binary payload of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Container<'a> {
    pub version: u32,
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

pub fn is_container(data: &[u8]) -> bool {
    data.len() >= 4 && read_u32(data, 0) == Some(GLB_MAGIC)
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn header_u32(data: &[u8], offset: usize) -> Result<u32> {
    read_u32(data, offset).ok_or_else(|| AssetError::malformed("truncated header"))
}

pub fn read(data: &[u8]) -> Result<Container<'_>> {
    if data.len() < HEADER_LEN {
        return Err(AssetError::malformed(format!(
            "{} bytes is too short for a header",
            data.len()
        )));
    }
    if header_u32(data, 0)? != GLB_MAGIC {
        return Err(AssetError::malformed("bad magic"));
    }
    let version = header_u32(data, 4)?;
    let length = header_u32(data, 8)? as usize;
    if length > data.len() {
        return Err(AssetError::malformed(format!(
            "header declares {length} bytes but only {} are present",
            data.len()
        )));
    }
    if length < HEADER_LEN {
        return Err(AssetError::malformed(format!("declared length {length} is below the header size")));
    }
    let data = &data[..length];
    debug!("reading binary container version {version}, {length} bytes");
    match version {
        1 => read_v1(data),
        2 => read_v2(data),
        other => Err(AssetError::malformed(format!("unknown container version {other}"))),
    }
}

fn read_v1(data: &[u8]) -> Result<Container<'_>> {
    let content_length = header_u32(data, 12)? as usize;
    let content_format = header_u32(data, 16)?;
    if content_format != 0 {
        return Err(AssetError::malformed(format!(
            "content format {content_format} is not JSON"
        )));
    }
    let start = HEADER_LEN + 8;
    let end = start
        .checked_add(content_length)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| AssetError::malformed("content runs past the end of the container"))?;
    let body = &data[end..];
    Ok(Container {
        version: 1,
        json: &data[start..end],
        bin: (!body.is_empty()).then_some(body),
    })
}

fn read_v2(data: &[u8]) -> Result<Container<'_>> {
    let mut offset = HEADER_LEN;
    let mut json = None;
    let mut bin = None;
    while offset < data.len() {
        let chunk_length = read_u32(data, offset)
            .ok_or_else(|| AssetError::malformed("truncated chunk header"))?
            as usize;
        let chunk_type = read_u32(data, offset + 4)
            .ok_or_else(|| AssetError::malformed("truncated chunk header"))?;
        let start = offset + 8;
        let end = start
            .checked_add(chunk_length)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| AssetError::malformed("chunk runs past the end of the container"))?;
        let chunk = &data[start..end];
        match chunk_type {
            CHUNK_JSON if json.is_none() => json = Some(chunk),
            _ if json.is_none() => {
                return Err(AssetError::malformed("first chunk is not JSON"));
            }
            CHUNK_BIN if bin.is_none() => bin = Some(chunk),
            other => debug!("skipping chunk type {other:#010x}"),
        }
        offset = end;
    }
    let json = json.ok_or_else(|| AssetError::malformed("missing JSON chunk"))?;
    Ok(Container {
        version: 2,
        json,
        bin,
    })
}

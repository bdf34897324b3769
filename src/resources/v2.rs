//! glTF 2.0 decoder built on the `gltf` crate.
//!
//! The document is parsed and index-validated by `gltf`; buffers are resolved
//! here (binary chunk, data URIs or transport) and accessors are copied into
//! the crate's own representation.

use std::{collections::BTreeMap, sync::Arc};

use cgmath::Matrix4;
use futures::future::try_join_all;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    data_structures::{
        accessor::{Accessor, ComponentType, Dimensions},
        animation::{Animation, Channel, Interpolation, Keyframes, Sampler},
        description::{AssetDescription, Version},
        instance::{Instance, quat, vec3},
        mesh::{DrawMode, Mesh, Primitive},
        scene_graph::{self, Node},
        skin::Skin,
    },
    error::{AssetError, RefKind, Result},
    resources::{
        accessor::{AccessorLayout, SparseLayout, ViewLayout, extract},
        transport::{Transport, resolve_uri},
    },
};

/// Root-level blobs `gltf` does not hand out without extra features.
#[derive(Debug, Default, Deserialize)]
struct Opaque {
    extensions: Option<Value>,
    extras: Option<Value>,
}

/// Best guess at what an out-of-range index in `path` referred to.
fn ref_kind(path: &str) -> RefKind {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    if leaf.starts_with("children") || leaf.starts_with("joints") || leaf.starts_with("node") {
        RefKind::Node
    } else if leaf.starts_with("mesh") {
        RefKind::Mesh
    } else if leaf.starts_with("skin") {
        RefKind::Skin
    } else if leaf.starts_with("bufferView") {
        RefKind::BufferView
    } else if leaf.starts_with("buffer") {
        RefKind::Buffer
    } else if leaf.starts_with("sampler") {
        RefKind::Sampler
    } else if leaf.starts_with("scene") {
        RefKind::Scene
    } else {
        RefKind::Accessor
    }
}

fn map_gltf_error(error: gltf::Error) -> AssetError {
    match error {
        gltf::Error::Validation(errors) => {
            let out_of_bounds = errors.iter().find(|(_, e)| {
                matches!(e, gltf::json::validation::Error::IndexOutOfBounds)
            });
            match out_of_bounds {
                Some((path, _)) => {
                    let path = path.to_string();
                    AssetError::missing(ref_kind(&path), path)
                }
                None => AssetError::invalid(
                    errors
                        .iter()
                        .map(|(path, e)| format!("{path}: {e}"))
                        .collect::<Vec<_>>()
                        .join("; "),
                ),
            }
        }
        other => AssetError::invalid(other.to_string()),
    }
}

fn component_type(data_type: gltf::accessor::DataType) -> ComponentType {
    use gltf::accessor::DataType;
    match data_type {
        DataType::I8 => ComponentType::I8,
        DataType::U8 => ComponentType::U8,
        DataType::I16 => ComponentType::I16,
        DataType::U16 => ComponentType::U16,
        DataType::U32 => ComponentType::U32,
        DataType::F32 => ComponentType::F32,
    }
}

fn dimensions(dimensions: gltf::accessor::Dimensions) -> Dimensions {
    use gltf::accessor::Dimensions as D;
    match dimensions {
        D::Scalar => Dimensions::Scalar,
        D::Vec2 => Dimensions::Vec2,
        D::Vec3 => Dimensions::Vec3,
        D::Vec4 => Dimensions::Vec4,
        D::Mat2 => Dimensions::Mat2,
        D::Mat3 => Dimensions::Mat3,
        D::Mat4 => Dimensions::Mat4,
    }
}

fn view_layout(view: &gltf::buffer::View<'_>) -> ViewLayout {
    ViewLayout {
        buffer: view.buffer().index(),
        offset: view.offset(),
        length: view.length(),
        stride: view.stride(),
    }
}

fn layout(accessor: &gltf::Accessor<'_>) -> AccessorLayout {
    let sparse = accessor.sparse().map(|sparse| {
        let indices = sparse.indices();
        let values = sparse.values();
        SparseLayout {
            count: sparse.count(),
            indices_view: view_layout(&indices.view()),
            indices_offset: indices.offset(),
            index_type: match indices.index_type() {
                gltf::accessor::sparse::IndexType::U8 => ComponentType::U8,
                gltf::accessor::sparse::IndexType::U16 => ComponentType::U16,
                gltf::accessor::sparse::IndexType::U32 => ComponentType::U32,
            },
            values_view: view_layout(&values.view()),
            values_offset: values.offset(),
        }
    });
    AccessorLayout {
        view: accessor.view().as_ref().map(view_layout),
        offset: accessor.offset(),
        component_type: component_type(accessor.data_type()),
        dimensions: dimensions(accessor.dimensions()),
        count: accessor.count(),
        normalized: accessor.normalized(),
        sparse,
    }
}

struct Accessors<'a> {
    buffers: &'a [Vec<u8>],
    decoded: Vec<Option<Arc<Accessor>>>,
}

impl Accessors<'_> {
    fn get(&mut self, accessor: &gltf::Accessor<'_>) -> Result<Arc<Accessor>> {
        let idx = accessor.index();
        if let Some(decoded) = self.decoded.get(idx).and_then(Option::as_ref) {
            return Ok(decoded.clone());
        }
        let decoded = Arc::new(extract(&layout(accessor), self.buffers)?);
        if let Some(slot) = self.decoded.get_mut(idx) {
            *slot = Some(decoded.clone());
        }
        Ok(decoded)
    }
}

async fn load_buffers(
    document: &gltf::Document,
    root_path: &str,
    bin: Option<&[u8]>,
    transport: &dyn Transport,
) -> Result<Vec<Vec<u8>>> {
    let fetches = document.buffers().map(|buffer| async move {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => bin
                .map(<[u8]>::to_vec)
                .ok_or_else(|| AssetError::missing(RefKind::Buffer, "binary chunk"))?,
            gltf::buffer::Source::Uri(uri) => resolve_uri(transport, root_path, uri).await?,
        };
        if data.len() < buffer.length() {
            return Err(AssetError::invalid(format!(
                "buffer {} is {} bytes, declared {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        Ok::<_, AssetError>(data)
    });
    try_join_all(fetches).await
}

pub async fn decode(
    root_path: &str,
    json: &[u8],
    bin: Option<&[u8]>,
    transport: &dyn Transport,
) -> Result<AssetDescription> {
    let gltf = gltf::Gltf::from_slice(json).map_err(map_gltf_error)?;
    let document = &gltf.document;
    let buffers = load_buffers(document, root_path, bin, transport).await?;
    debug!(
        "decoding 2.0 document: {} nodes, {} meshes, {} buffers",
        document.nodes().len(),
        document.meshes().len(),
        buffers.len()
    );

    let mut accessors = Accessors {
        buffers: &buffers,
        decoded: vec![None; document.accessors().len()],
    };
    let opaque: Opaque = serde_json::from_slice(json)?;
    let mut description = AssetDescription::new(Version::V2);
    description.extensions = opaque.extensions;
    description.extras = opaque.extras;

    for mesh in document.meshes() {
        let mut primitives = Vec::new();
        for primitive in mesh.primitives() {
            let mut attributes = BTreeMap::new();
            for (semantic, accessor) in primitive.attributes() {
                attributes.insert(semantic.to_string(), accessors.get(&accessor)?);
            }
            let indices = primitive
                .indices()
                .map(|accessor| accessors.get(&accessor))
                .transpose()?;
            primitives.push(Primitive::new(
                attributes,
                indices,
                DrawMode::from_gl(primitive.mode().as_gl_enum())?,
                primitive.material().index(),
            ));
        }
        description.meshes.push(Mesh {
            name: mesh.name().map(str::to_string),
            primitives,
        });
    }

    for node in document.nodes() {
        let (translation, rotation, scale) = node.transform().decomposed();
        let mut decoded = Node::new(Instance::from_trs(translation, rotation, scale));
        decoded.name = node.name().map(str::to_string);
        decoded.children = node.children().map(|c| c.index()).collect();
        decoded.mesh = node.mesh().map(|m| m.index());
        decoded.skin = node.skin().map(|s| s.index());
        description.nodes.push(decoded);
    }

    for skin in document.skins() {
        let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let ibms = reader.read_inverse_bind_matrices().map(|matrices| {
            matrices
                .map(|m| Matrix4::from(m.map(|col| col.map(f64::from))))
                .collect::<Vec<_>>()
        });
        description.skins.push(Skin::new(
            skin.name().map(str::to_string),
            skin.joints().map(|j| j.index()).collect(),
            ibms,
        ));
    }

    for animation in document.animations() {
        description.animations.push(decode_animation(&animation, &buffers)?);
    }

    description.validate()?;
    let scene = document.default_scene().or_else(|| document.scenes().next());
    description.roots = match scene {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => scene_graph::parentless(&description.nodes),
    };
    Ok(description)
}

fn decode_animation(animation: &gltf::Animation<'_>, buffers: &[Vec<u8>]) -> Result<Animation> {
    let mut channels = Vec::new();
    for channel in animation.channels() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let times: Vec<f64> = match reader.read_inputs() {
            Some(inputs) => inputs.map(f64::from).collect(),
            None => {
                return Err(AssetError::missing(
                    RefKind::Accessor,
                    format!("input of channel {}", channel.index()),
                ));
            }
        };
        let keyframes = match reader.read_outputs() {
            Some(gltf::animation::util::ReadOutputs::Translations(translations)) => {
                Keyframes::Translation(translations.map(vec3).collect())
            }
            Some(gltf::animation::util::ReadOutputs::Rotations(rotations)) => {
                Keyframes::Rotation(rotations.into_f32().map(quat).collect())
            }
            Some(gltf::animation::util::ReadOutputs::Scales(scales)) => {
                Keyframes::Scale(scales.map(vec3).collect())
            }
            Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) => {
                warn!(
                    "skipping morph target channel {} of animation {}",
                    channel.index(),
                    animation.index()
                );
                continue;
            }
            None => {
                return Err(AssetError::missing(
                    RefKind::Accessor,
                    format!("output of channel {}", channel.index()),
                ));
            }
        };
        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        };
        channels.push(Channel {
            target: channel.target().node().index(),
            sampler: Sampler::new(times, keyframes, interpolation)?,
        });
    }
    Ok(Animation {
        name: animation.name().map(str::to_string),
        channels,
    })
}

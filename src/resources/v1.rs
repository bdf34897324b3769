//! glTF 1.0 decoder.
//!
//! 1.0 documents key every collection by string id. Arrays with numeric
//! indices are accepted as well; either way entries keep document order and
//! ids are resolved through per-collection lookup tables.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use cgmath::Matrix4;
use futures::future::try_join_all;
use log::{debug, warn};
use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, SeqAccess, Visitor},
};
use serde_json::Value;

use crate::{
    data_structures::{
        accessor::{Accessor, ComponentType, Dimensions},
        animation::{Animation, Channel, Interpolation, Keyframes, Sampler},
        description::{AssetDescription, Version},
        instance::Instance,
        mesh::{DrawMode, JOINTS_0, Mesh, Primitive, WEIGHTS_0},
        scene_graph::{self, Node},
        skin::Skin,
    },
    error::{AssetError, RefKind, Result},
    resources::{
        accessor::{AccessorLayout, ViewLayout, extract},
        transport::{Transport, resolve_uri},
    },
};

/// Buffer id the `KHR_binary_glTF` body is referenced by.
const BINARY_BUFFER: &str = "binary_glTF";

/// A collection given either as `{id: item}` or `[item]`, in document order.
#[derive(Debug)]
struct Collection<T>(Vec<(String, T)>);

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection(Vec::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Collection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CollectionVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for CollectionVisitor<T> {
            type Value = Collection<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by id or an array")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(Collection(entries))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(value) = seq.next_element::<T>()? {
                    entries.push((entries.len().to_string(), value));
                }
                Ok(Collection(entries))
            }
        }

        deserializer.deserialize_any(CollectionVisitor(PhantomData))
    }
}

impl<T> Collection<T> {
    fn lookup(&self) -> HashMap<&str, usize> {
        self.0
            .iter()
            .enumerate()
            .map(|(idx, (id, _))| (id.as_str(), idx))
            .collect()
    }
}

/// A reference by string id or by numeric index.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Id {
    Name(String),
    Index(usize),
}

impl Id {
    fn key(&self) -> String {
        match self {
            Id::Name(name) => name.clone(),
            Id::Index(idx) => idx.to_string(),
        }
    }
}

fn resolve(table: &HashMap<&str, usize>, kind: RefKind, id: &Id) -> Result<usize> {
    let key = id.key();
    table
        .get(key.as_str())
        .copied()
        .ok_or_else(|| AssetError::missing(kind, key))
}

#[derive(Debug, Default, Deserialize)]
struct Root {
    #[serde(default)]
    accessors: Collection<RawAccessor>,
    #[serde(default, rename = "bufferViews")]
    buffer_views: Collection<RawBufferView>,
    #[serde(default)]
    buffers: Collection<RawBuffer>,
    #[serde(default)]
    meshes: Collection<RawMesh>,
    #[serde(default)]
    nodes: Collection<RawNode>,
    #[serde(default)]
    skins: Collection<RawSkin>,
    #[serde(default)]
    animations: Collection<RawAnimation>,
    #[serde(default)]
    scenes: Collection<RawScene>,
    #[serde(default)]
    materials: Collection<Value>,
    scene: Option<Id>,
    extensions: Option<Value>,
    extras: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccessor {
    buffer_view: Option<Id>,
    #[serde(default)]
    byte_offset: usize,
    #[serde(default)]
    byte_stride: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    normalized: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBufferView {
    buffer: Id,
    #[serde(default)]
    byte_offset: usize,
    byte_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuffer {
    uri: Option<String>,
    byte_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawMesh {
    name: Option<String>,
    #[serde(default)]
    primitives: Vec<RawPrimitive>,
}

#[derive(Debug, Deserialize)]
struct RawPrimitive {
    #[serde(default)]
    attributes: BTreeMap<String, Id>,
    indices: Option<Id>,
    mode: Option<u32>,
    material: Option<Id>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    name: Option<String>,
    #[serde(default)]
    children: Vec<Id>,
    matrix: Option<[f64; 16]>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
    #[serde(default)]
    meshes: Vec<Id>,
    mesh: Option<Id>,
    skin: Option<Id>,
    joint_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSkin {
    name: Option<String>,
    bind_shape_matrix: Option<[f64; 16]>,
    inverse_bind_matrices: Option<Id>,
    #[serde(default)]
    joint_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnimation {
    name: Option<String>,
    #[serde(default)]
    channels: Vec<RawChannel>,
    #[serde(default)]
    parameters: BTreeMap<String, Id>,
    #[serde(default)]
    samplers: Collection<RawSampler>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    sampler: Id,
    target: RawTarget,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    id: Id,
    path: String,
}

#[derive(Debug, Deserialize)]
struct RawSampler {
    input: String,
    output: String,
    interpolation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawScene {
    #[serde(default)]
    nodes: Vec<Id>,
}

fn matrix(values: &[f64; 16]) -> Matrix4<f64> {
    let mut cols = [[0.0; 4]; 4];
    for (i, v) in values.iter().enumerate() {
        cols[i / 4][i % 4] = *v;
    }
    Matrix4::from(cols)
}

/// JOINT and WEIGHT are the 1.0 spellings of the first skinning set.
fn normalize_semantic(name: &str) -> &str {
    match name {
        "JOINT" => JOINTS_0,
        "WEIGHT" => WEIGHTS_0,
        other => other,
    }
}

/// Accessors decoded on first use and shared afterwards.
struct Accessors<'a> {
    root: &'a Root,
    lookup: HashMap<&'a str, usize>,
    views: HashMap<&'a str, usize>,
    buffers: HashMap<&'a str, usize>,
    data: &'a [Vec<u8>],
    decoded: Vec<Option<Arc<Accessor>>>,
}

impl<'a> Accessors<'a> {
    fn new(root: &'a Root, data: &'a [Vec<u8>]) -> Self {
        Self {
            root,
            lookup: root.accessors.lookup(),
            views: root.buffer_views.lookup(),
            buffers: root.buffers.lookup(),
            data,
            decoded: vec![None; root.accessors.0.len()],
        }
    }

    fn get(&mut self, id: &Id) -> Result<Arc<Accessor>> {
        let idx = resolve(&self.lookup, RefKind::Accessor, id)?;
        if let Some(accessor) = &self.decoded[idx] {
            return Ok(accessor.clone());
        }
        let raw = &self.root.accessors.0[idx].1;
        let view = match &raw.buffer_view {
            Some(view_id) => {
                let view_idx = resolve(&self.views, RefKind::BufferView, view_id)?;
                let view = &self.root.buffer_views.0[view_idx].1;
                let buffer = resolve(&self.buffers, RefKind::Buffer, &view.buffer)?;
                let available = self.data[buffer].len().saturating_sub(view.byte_offset);
                Some(ViewLayout {
                    buffer,
                    offset: view.byte_offset,
                    length: view.byte_length.unwrap_or(available),
                    stride: (raw.byte_stride != 0).then_some(raw.byte_stride),
                })
            }
            None => None,
        };
        let layout = AccessorLayout {
            view,
            offset: raw.byte_offset,
            component_type: ComponentType::from_gl(raw.component_type)?,
            dimensions: Dimensions::from_type_name(&raw.kind)?,
            count: raw.count,
            normalized: raw.normalized,
            sparse: None,
        };
        let accessor = Arc::new(extract(&layout, self.data)?);
        self.decoded[idx] = Some(accessor.clone());
        Ok(accessor)
    }
}

async fn load_buffers(
    root: &Root,
    root_path: &str,
    bin: Option<&[u8]>,
    transport: &dyn Transport,
) -> Result<Vec<Vec<u8>>> {
    let fetches = root.buffers.0.iter().map(|(id, buffer)| async move {
        let uri = buffer.uri.as_deref().filter(|_| id != BINARY_BUFFER);
        let data = match (uri, bin) {
            (Some(uri), _) => resolve_uri(transport, root_path, uri).await?,
            (None, Some(body)) => body.to_vec(),
            (None, None) => {
                return Err(AssetError::invalid(format!(
                    "buffer {id:?} has no uri and there is no binary body"
                )));
            }
        };
        if let Some(expected) = buffer.byte_length.filter(|&n| data.len() < n) {
            warn!("buffer {id:?} is {} bytes, declared {expected}", data.len());
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
    let root: Root = serde_json::from_slice(json)?;
    let buffers = load_buffers(&root, root_path, bin, transport).await?;
    debug!(
        "decoding 1.0 document: {} nodes, {} meshes, {} buffers",
        root.nodes.0.len(),
        root.meshes.0.len(),
        buffers.len()
    );

    let mut accessors = Accessors::new(&root, &buffers);
    let material_lookup = root.materials.lookup();
    let mut description = AssetDescription::new(Version::V1);
    description.extensions = root.extensions.clone();
    description.extras = root.extras.clone();

    for (_, raw) in &root.meshes.0 {
        let mut primitives = Vec::with_capacity(raw.primitives.len());
        for p in &raw.primitives {
            let mut attributes = BTreeMap::new();
            for (semantic, id) in &p.attributes {
                attributes.insert(normalize_semantic(semantic).to_string(), accessors.get(id)?);
            }
            let indices = p.indices.as_ref().map(|id| accessors.get(id)).transpose()?;
            let mode = p.mode.map(DrawMode::from_gl).transpose()?.unwrap_or_default();
            let material = p
                .material
                .as_ref()
                .and_then(|m| material_lookup.get(m.key().as_str()).copied());
            primitives.push(Primitive::new(attributes, indices, mode, material));
        }
        description.meshes.push(Mesh {
            name: raw.name.clone(),
            primitives,
        });
    }

    let node_lookup = root.nodes.lookup();
    let mesh_lookup = root.meshes.lookup();
    let skin_lookup = root.skins.lookup();
    for (_, raw) in &root.nodes.0 {
        let transform = match &raw.matrix {
            Some(m) => Instance::from_matrix(&matrix(m)),
            None => Instance::from_trs(
                raw.translation.unwrap_or([0.0; 3]),
                raw.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
                raw.scale.unwrap_or([1.0; 3]),
            ),
        };
        let mut node = Node::new(transform);
        node.name = raw.name.clone();
        node.children = raw
            .children
            .iter()
            .map(|c| resolve(&node_lookup, RefKind::Node, c))
            .collect::<Result<_>>()?;
        let mesh_ids: Vec<usize> = raw
            .meshes
            .iter()
            .chain(raw.mesh.iter())
            .map(|m| resolve(&mesh_lookup, RefKind::Mesh, m))
            .collect::<Result<_>>()?;
        node.mesh = match mesh_ids.as_slice() {
            [] => None,
            [single] => Some(*single),
            many => {
                let merged = Mesh {
                    name: node.name.clone(),
                    primitives: many
                        .iter()
                        .flat_map(|&m| description.meshes[m].primitives.iter().cloned())
                        .collect(),
                };
                description.meshes.push(merged);
                Some(description.meshes.len() - 1)
            }
        };
        node.skin = raw
            .skin
            .as_ref()
            .map(|s| resolve(&skin_lookup, RefKind::Skin, s))
            .transpose()?;
        description.nodes.push(node);
    }

    let joint_lookup: HashMap<&str, usize> = root
        .nodes
        .0
        .iter()
        .enumerate()
        .filter_map(|(idx, (_, n))| n.joint_name.as_deref().map(|name| (name, idx)))
        .collect();
    for (_, raw) in &root.skins.0 {
        let joints = raw
            .joint_names
            .iter()
            .map(|name| {
                joint_lookup
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| AssetError::missing(RefKind::Node, name))
            })
            .collect::<Result<Vec<_>>>()?;
        let ibms = match &raw.inverse_bind_matrices {
            Some(id) => Some(accessors.get(id)?.read_mat4()?),
            None => None,
        };
        let mut skin = Skin::new(raw.name.clone(), joints, ibms);
        if let Some(bind_shape) = &raw.bind_shape_matrix {
            let bind_shape = matrix(bind_shape);
            for ibm in &mut skin.inverse_bind_matrices {
                *ibm = *ibm * bind_shape;
            }
        }
        description.skins.push(skin);
    }

    for (_, raw) in &root.animations.0 {
        description
            .animations
            .push(decode_animation(raw, &node_lookup, &mut accessors)?);
    }

    let scene_lookup = root.scenes.lookup();
    let scene = match &root.scene {
        Some(id) => Some(resolve(&scene_lookup, RefKind::Scene, id)?),
        None => (!root.scenes.0.is_empty()).then_some(0),
    };
    description.validate()?;
    description.roots = match scene {
        Some(scene) => root.scenes.0[scene]
            .1
            .nodes
            .iter()
            .map(|n| resolve(&node_lookup, RefKind::Node, n))
            .collect::<Result<_>>()?,
        None => scene_graph::parentless(&description.nodes),
    };
    Ok(description)
}

fn decode_animation(
    raw: &RawAnimation,
    nodes: &HashMap<&str, usize>,
    accessors: &mut Accessors<'_>,
) -> Result<Animation> {
    let samplers = raw.samplers.lookup();
    let parameter = |name: &str| {
        raw.parameters
            .get(name)
            .ok_or_else(|| AssetError::missing(RefKind::Accessor, format!("parameter {name}")))
    };
    let mut channels = Vec::with_capacity(raw.channels.len());
    for channel in &raw.channels {
        let sampler_idx = resolve(&samplers, RefKind::Sampler, &channel.sampler)?;
        let sampler = &raw.samplers.0[sampler_idx].1;
        let target = resolve(nodes, RefKind::Node, &channel.target.id)?;
        let times = accessors.get(parameter(&sampler.input)?)?.read_scalars()?;
        let output = accessors.get(parameter(&sampler.output)?)?;
        let keyframes = match channel.target.path.as_str() {
            "translation" => Keyframes::Translation(output.read_vec3()?),
            "rotation" => Keyframes::Rotation(output.read_quat()?),
            "scale" => Keyframes::Scale(output.read_vec3()?),
            other => {
                warn!("skipping animation channel targeting {other:?}");
                continue;
            }
        };
        let interpolation = match &sampler.interpolation {
            Some(name) => Interpolation::from_name(name)?,
            None => Interpolation::Linear,
        };
        channels.push(Channel {
            target,
            sampler: Sampler::new(
                times.into_iter().map(f64::from).collect(),
                keyframes,
                interpolation,
            )?,
        });
    }
    Ok(Animation {
        name: raw.name.clone(),
        channels,
    })
}

#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap};

use base64::Engine;
use futures::future::LocalBoxFuture;
use geo_gltf::{
    backend::{
        AttributeBinding, AttributeLocation, BufferHandle, BufferTarget, Camera, ProgramHandle,
        RenderBackend, ShaderVariant, StaticCamera, UniformLocation, UniformValue,
    },
    data_structures::{accessor::ComponentType, mesh::DrawMode},
    pipelines::ShaderSource,
    resources::transport::Transport,
};
use serde_json::{Value, json};

/// Everything the backend was asked to do, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateProgram(ShaderVariant),
    Upload(BufferTarget, usize),
    UseProgram(ProgramHandle),
    BindAttribute(AttributeBinding),
    BindIndexBuffer(BufferHandle),
    SetUniform { name: String, value: Vec<f32> },
    DrawIndexed { mode: DrawMode, count: usize, index_type: ComponentType },
    DrawArrays { mode: DrawMode, count: usize },
    ReleaseBuffer(BufferHandle),
    ReleaseProgram(ProgramHandle),
}

/// Backend that records calls instead of touching a GPU.
///
/// Every attribute and uniform name resolves unless listed in `hidden`.
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    pub hidden: Vec<&'static str>,
    next: u32,
    names: HashMap<u32, String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose programs do not expose `names`.
    pub fn hiding(names: &[&'static str]) -> Self {
        Self {
            hidden: names.to_vec(),
            ..Self::default()
        }
    }

    fn handle(&mut self) -> u32 {
        self.next += 1;
        self.next
    }

    pub fn draws(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::DrawIndexed { .. } | Call::DrawArrays { .. }))
            .collect()
    }

    pub fn uniforms(&self, name: &str) -> Vec<&[f32]> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetUniform { name: n, value } if n == name => Some(value.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn programs_created(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateProgram(_)))
    }

    pub fn uploads(&self) -> usize {
        self.count(|c| matches!(c, Call::Upload(..)))
    }

    pub fn releases(&self) -> usize {
        self.count(|c| matches!(c, Call::ReleaseBuffer(_) | Call::ReleaseProgram(_)))
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl RenderBackend for RecordingBackend {
    fn create_program(
        &mut self,
        variant: ShaderVariant,
        _source: &ShaderSource,
    ) -> anyhow::Result<ProgramHandle> {
        self.calls.push(Call::CreateProgram(variant));
        Ok(ProgramHandle(self.handle()))
    }

    fn upload_buffer(&mut self, target: BufferTarget, data: &[u8]) -> anyhow::Result<BufferHandle> {
        self.calls.push(Call::Upload(target, data.len()));
        Ok(BufferHandle(self.handle()))
    }

    fn attribute_location(&mut self, _program: ProgramHandle, name: &str) -> Option<AttributeLocation> {
        if self.hidden.contains(&name) {
            return None;
        }
        Some(AttributeLocation(self.handle()))
    }

    fn uniform_location(&mut self, _program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        if self.hidden.contains(&name) {
            return None;
        }
        let location = self.handle();
        self.names.insert(location, name.to_string());
        Some(UniformLocation(location))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(Call::UseProgram(program));
    }

    fn bind_attribute(&mut self, binding: &AttributeBinding) {
        self.calls.push(Call::BindAttribute(*binding));
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.calls.push(Call::BindIndexBuffer(buffer));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>) {
        let name = self.names.get(&location.0).cloned().unwrap_or_default();
        self.calls.push(Call::SetUniform {
            name,
            value: value.to_f32(),
        });
    }

    fn draw_indexed(&mut self, mode: DrawMode, count: usize, index_type: ComponentType) {
        self.calls.push(Call::DrawIndexed {
            mode,
            count,
            index_type,
        });
    }

    fn draw_arrays(&mut self, mode: DrawMode, count: usize) {
        self.calls.push(Call::DrawArrays { mode, count });
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.calls.push(Call::ReleaseBuffer(buffer));
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.calls.push(Call::ReleaseProgram(program));
    }
}

/// Serves files from memory and remembers what was asked for.
#[derive(Default)]
pub struct MemoryTransport {
    files: HashMap<String, Vec<u8>>,
    pub fetched: RefCell<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), data.into());
        self
    }
}

impl Transport for MemoryTransport {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        Box::pin(async move {
            self.fetched.borrow_mut().push(url.to_string());
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404: {url}"))
        })
    }
}

pub fn identity_camera() -> impl Camera {
    use geo_gltf::SquareMatrix;
    StaticCamera {
        projection: geo_gltf::Matrix4::identity(),
        view: geo_gltf::Matrix4::identity(),
    }
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Binary container around a 2.0 document and an optional BIN chunk.
pub fn glb(json: &Value, bin: Option<&[u8]>) -> Vec<u8> {
    let mut json = serde_json::to_vec(json).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut chunks = Vec::new();
    chunks.extend((json.len() as u32).to_le_bytes());
    chunks.extend(b"JSON");
    chunks.extend(&json);
    if let Some(bin) = bin {
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        chunks.extend((bin.len() as u32).to_le_bytes());
        chunks.extend(b"BIN\0");
        chunks.extend(&bin);
    }
    let mut out = Vec::new();
    out.extend(b"glTF");
    out.extend(2u32.to_le_bytes());
    out.extend(((12 + chunks.len()) as u32).to_le_bytes());
    out.extend(chunks);
    out
}

pub const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

/// Triangle positions followed by three u16 indices, padded to 44 bytes.
pub fn triangle_buffer() -> Vec<u8> {
    let mut buffer = f32_bytes(&TRIANGLE);
    buffer.extend(u16_bytes(&[0, 1, 2]));
    buffer.extend([0, 0]);
    buffer
}

/// Root node translated by (1, 2, 3) with a rotated, scaled child that
/// carries the only mesh: one indexed triangle.
///
/// `buffer` is the buffer object, e.g. `{"uri": ..., "byteLength": 44}`.
pub fn two_node_scene(buffer: Value) -> Value {
    json!({
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [
            {"name": "root", "translation": [1.0, 2.0, 3.0], "children": [1]},
            {
                "name": "child",
                "rotation": [0.0, 0.70710677, 0.0, 0.70710677],
                "scale": [2.0, 2.0, 2.0],
                "mesh": 0
            }
        ],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
        ],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 6}
        ],
        "buffers": [buffer]
    })
}

pub fn two_node_scene_inline() -> Value {
    let buffer = triangle_buffer();
    two_node_scene(json!({"uri": data_uri(&buffer), "byteLength": buffer.len()}))
}

/// The two inverse-bind matrices of [`skinned_scene`], column-major.
pub fn skinned_ibms() -> [[f32; 16]; 2] {
    let mut first = [0.0; 16];
    let mut second = [0.0; 16];
    for i in 0..4 {
        first[i * 5] = 1.0;
        second[i * 5] = 1.0;
    }
    first[13] = -1.0;
    second[13] = -2.0;
    [first, second]
}

/// A skinned triangle on node 0 bound to two joints (nodes 1 and 2) posed
/// at identity. `mesh_scale` is the scale of the skinned node.
pub fn skinned_scene(mesh_scale: [f32; 3]) -> Value {
    let [first, second] = skinned_ibms();
    let mut buffer = f32_bytes(&TRIANGLE); // 0..36
    buffer.extend(u16_bytes(&[0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0])); // 36..60
    buffer.extend(f32_bytes(&[1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0])); // 60..108
    buffer.extend(f32_bytes(&first)); // 108..172
    buffer.extend(f32_bytes(&second)); // 172..236
    buffer.extend(u16_bytes(&[0, 1, 2])); // 236..242
    buffer.extend([0, 0]);
    json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0, 1]}],
        "nodes": [
            {"mesh": 0, "skin": 0, "scale": mesh_scale},
            {"name": "hip", "children": [2]},
            {"name": "knee"}
        ],
        "skins": [{"joints": [1, 2], "inverseBindMatrices": 3}],
        "meshes": [{"primitives": [{
            "attributes": {"POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2},
            "indices": 4
        }]}],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            {"bufferView": 1, "componentType": 5123, "count": 3, "type": "VEC4"},
            {"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4"},
            {"bufferView": 3, "componentType": 5126, "count": 2, "type": "MAT4"},
            {"bufferView": 4, "componentType": 5123, "count": 3, "type": "SCALAR"}
        ],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 24},
            {"buffer": 0, "byteOffset": 60, "byteLength": 48},
            {"buffer": 0, "byteOffset": 108, "byteLength": 128},
            {"buffer": 0, "byteOffset": 236, "byteLength": 6}
        ],
        "buffers": [{"uri": data_uri(&buffer), "byteLength": buffer.len()}]
    })
}

/// The two-node scene written in the keyed 1.0 layout.
pub fn two_node_scene_v1() -> Value {
    let buffer = triangle_buffer();
    json!({
        "asset": {"version": "1.0"},
        "scene": "main",
        "scenes": {"main": {"nodes": ["root"]}},
        "nodes": {
            "root": {"translation": [1.0, 2.0, 3.0], "children": ["child"]},
            "child": {
                "rotation": [0.0, 0.70710677, 0.0, 0.70710677],
                "scale": [2.0, 2.0, 2.0],
                "meshes": ["triangle"]
            }
        },
        "meshes": {"triangle": {"primitives": [{
            "attributes": {"POSITION": "positions"},
            "indices": "indices",
            "mode": 4
        }]}},
        "accessors": {
            "positions": {"bufferView": "vertices", "byteOffset": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
            "indices": {"bufferView": "elements", "byteOffset": 0, "componentType": 5123, "count": 3, "type": "SCALAR"}
        },
        "bufferViews": {
            "vertices": {"buffer": "data", "byteOffset": 0, "byteLength": 36},
            "elements": {"buffer": "data", "byteOffset": 36, "byteLength": 6}
        },
        "buffers": {"data": {"uri": data_uri(&buffer), "byteLength": buffer.len()}}
    })
}

/// `KHR_binary_glTF` container: 20 byte header, JSON content, then the body.
pub fn glb_v1(json: &Value, body: &[u8]) -> Vec<u8> {
    let mut content = serde_json::to_vec(json).unwrap();
    while content.len() % 4 != 0 {
        content.push(b' ');
    }
    let mut out = Vec::new();
    out.extend(b"glTF");
    out.extend(1u32.to_le_bytes());
    out.extend(((20 + content.len() + body.len()) as u32).to_le_bytes());
    out.extend((content.len() as u32).to_le_bytes());
    out.extend(0u32.to_le_bytes());
    out.extend(content);
    out.extend(body);
    out
}

/// Bind shape of [`skinned_scene_v1`]: a translation by (0, 0, 5).
pub const BIND_SHAPE_Z: f32 = 5.0;

/// The skinned rig of [`skinned_scene`] in the 1.0 layout, stored in a
/// `binary_glTF` body: `jointName` joints, a bind shape matrix and a
/// parameter-based animation lifting the hip from y = 0 to y = 2 over one
/// second.
///
/// Returns the document and its body.
pub fn skinned_scene_v1() -> (Value, Vec<u8>) {
    let [first, second] = skinned_ibms();
    let mut body = f32_bytes(&TRIANGLE); // 0..36
    body.extend(u16_bytes(&[0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0])); // 36..60
    body.extend(f32_bytes(&[1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0])); // 60..108
    body.extend(f32_bytes(&first)); // 108..172
    body.extend(f32_bytes(&second)); // 172..236
    body.extend(u16_bytes(&[0, 1, 2, 0])); // 236..244
    body.extend(f32_bytes(&[0.0, 1.0])); // 244..252
    body.extend(f32_bytes(&[0.0, 0.0, 0.0, 0.0, 2.0, 0.0])); // 252..276

    let mut bind_shape = [0.0f32; 16];
    for i in 0..4 {
        bind_shape[i * 5] = 1.0;
    }
    bind_shape[14] = BIND_SHAPE_Z;

    let view = |offset: usize, length: usize| {
        json!({"buffer": "binary_glTF", "byteOffset": offset, "byteLength": length})
    };
    let document = json!({
        "asset": {"version": "1.0"},
        "extensionsUsed": ["KHR_binary_glTF"],
        "scene": "main",
        "scenes": {"main": {"nodes": ["body", "hip"]}},
        "nodes": {
            "body": {"meshes": ["triangle"], "skin": "rig"},
            "hip": {"jointName": "hip", "children": ["knee"]},
            "knee": {"jointName": "knee"}
        },
        "skins": {"rig": {
            "bindShapeMatrix": bind_shape,
            "inverseBindMatrices": "ibms",
            "jointNames": ["hip", "knee"]
        }},
        "meshes": {"triangle": {"primitives": [{
            "attributes": {"POSITION": "positions", "JOINT": "joints", "WEIGHT": "weights"},
            "indices": "indices",
            "mode": 4
        }]}},
        "animations": {"lift": {
            "parameters": {"TIME": "times", "translation": "hip_translation"},
            "samplers": {"lift_sampler": {
                "input": "TIME",
                "output": "translation",
                "interpolation": "LINEAR"
            }},
            "channels": [{
                "sampler": "lift_sampler",
                "target": {"id": "hip", "path": "translation"}
            }]
        }},
        "accessors": {
            "positions": {"bufferView": "positions", "componentType": 5126, "count": 3, "type": "VEC3"},
            "joints": {"bufferView": "joints", "componentType": 5123, "count": 3, "type": "VEC4"},
            "weights": {"bufferView": "weights", "componentType": 5126, "count": 3, "type": "VEC4"},
            "ibms": {"bufferView": "ibms", "componentType": 5126, "count": 2, "type": "MAT4"},
            "indices": {"bufferView": "indices", "componentType": 5123, "count": 3, "type": "SCALAR"},
            "times": {"bufferView": "times", "componentType": 5126, "count": 2, "type": "SCALAR"},
            "hip_translation": {"bufferView": "hip_translation", "componentType": 5126, "count": 2, "type": "VEC3"}
        },
        "bufferViews": {
            "positions": view(0, 36),
            "joints": view(36, 24),
            "weights": view(60, 48),
            "ibms": view(108, 128),
            "indices": view(236, 6),
            "times": view(244, 8),
            "hip_translation": view(252, 24)
        },
        "buffers": {"binary_glTF": {"uri": "data:,", "byteLength": body.len()}}
    });
    (document, body)
}

pub fn to_bytes(document: &Value) -> Vec<u8> {
    serde_json::to_vec(document).unwrap()
}

pub fn assert_close(actual: &[f32], expected: &[f32], eps: f32) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= eps * (1.0 + e.abs()), "element {i}: {a} != {e}");
    }
}

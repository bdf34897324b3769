//! Meshes, primitives and their cached draw state.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    backend::{AttributeBinding, BufferHandle, ProgramHandle, ShaderVariant, UniformLocation},
    data_structures::accessor::{Accessor, ComponentType},
    error::{AssetError, Result},
};

pub const POSITION: &str = "POSITION";
pub const NORMAL: &str = "NORMAL";
pub const JOINTS_0: &str = "JOINTS_0";
pub const WEIGHTS_0: &str = "WEIGHTS_0";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl DrawMode {
    pub fn from_gl(mode: u32) -> Result<Self> {
        Ok(match mode {
            0 => DrawMode::Points,
            1 => DrawMode::Lines,
            2 => DrawMode::LineLoop,
            3 => DrawMode::LineStrip,
            4 => DrawMode::Triangles,
            5 => DrawMode::TriangleStrip,
            6 => DrawMode::TriangleFan,
            other => return Err(AssetError::invalid(format!("unknown primitive mode {other}"))),
        })
    }
}

/// Which program a primitive is drawn with. Decided once when decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    Skinned,
    Static,
}

impl PrimitiveKind {
    pub fn shader_variant(self) -> ShaderVariant {
        match self {
            PrimitiveKind::Skinned => ShaderVariant::Skinned,
            PrimitiveKind::Static => ShaderVariant::Static,
        }
    }
}

/// Uniform handles resolved against the primitive's program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UniformHandles {
    pub joint_matrix: Option<UniformLocation>,
    pub projection: Option<UniformLocation>,
    pub view: Option<UniformLocation>,
    pub model: Option<UniformLocation>,
}

/// Backend state built once per primitive by the scene builder.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderCache {
    pub program: ProgramHandle,
    pub variant: ShaderVariant,
    /// Every vertex buffer uploaded for this primitive, owned by the cache.
    pub vertex_buffers: Vec<BufferHandle>,
    pub attributes: Vec<AttributeBinding>,
    pub index_buffer: Option<BufferHandle>,
    pub index_count: usize,
    pub index_type: Option<ComponentType>,
    pub vertex_count: usize,
    pub uniforms: UniformHandles,
}

#[derive(Clone, Debug)]
pub struct Primitive {
    pub attributes: BTreeMap<String, Arc<Accessor>>,
    pub indices: Option<Arc<Accessor>>,
    pub mode: DrawMode,
    pub material: Option<usize>,
    kind: PrimitiveKind,
    pub(crate) cache: Option<RenderCache>,
}

impl Primitive {
    pub fn new(
        attributes: BTreeMap<String, Arc<Accessor>>,
        indices: Option<Arc<Accessor>>,
        mode: DrawMode,
        material: Option<usize>,
    ) -> Self {
        let kind = if attributes.contains_key(JOINTS_0) && attributes.contains_key(WEIGHTS_0) {
            PrimitiveKind::Skinned
        } else {
            PrimitiveKind::Static
        };
        Self {
            attributes,
            indices,
            mode,
            material,
            kind,
            cache: None,
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn is_prepared(&self) -> bool {
        self.cache.is_some()
    }

    pub fn render_cache(&self) -> Option<&RenderCache> {
        self.cache.as_ref()
    }

    /// Number of vertices, taken from `POSITION`.
    pub fn vertex_count(&self) -> usize {
        self.attributes.get(POSITION).map_or(0, |a| a.count)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

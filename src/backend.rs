//! Render backend boundary.
//!
//! The crate never talks to a graphics API directly. Everything that touches
//! GPU state goes through [`RenderBackend`]: program creation, buffer upload,
//! attribute/uniform lookup, binding, uniform assignment, draw submission and
//! handle release. Handles are opaque newtypes handed out by the backend.
//!
//! # Key types
//!
//! - [`RenderBackend`] is the draw-call submission surface
//! - [`Camera`] supplies projection and view matrices per frame
//! - [`ShaderVariant`] picks one of the two shipped programs
//! - [`UniformValue`] carries matrices or flat joint palettes
//!

use cgmath::Matrix4;

use crate::{
    data_structures::{accessor::ComponentType, mesh::DrawMode},
    pipelines::ShaderSource,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttributeLocation(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// The two programs a primitive can be drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderVariant {
    Static,
    Skinned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// A vertex attribute bound to an uploaded buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeBinding {
    pub location: AttributeLocation,
    pub buffer: BufferHandle,
    pub component_type: ComponentType,
    /// Components per vertex, 1 to 4.
    pub components: usize,
    pub normalized: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue<'a> {
    Mat4(Matrix4<f64>),
    /// Column-major `f32` matrices, 16 floats each.
    Mat4Array(&'a [f32]),
}

impl UniformValue<'_> {
    /// Column-major `f32` representation as uploaded to the GPU.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            UniformValue::Mat4(m) => mat4_to_f32(m).to_vec(),
            UniformValue::Mat4Array(values) => values.to_vec(),
        }
    }
}

/// Flatten a matrix column by column, narrowing to `f32`.
pub fn mat4_to_f32(m: &Matrix4<f64>) -> [f32; 16] {
    let cols: &[[f64; 4]; 4] = m.as_ref();
    let mut out = [0.0f32; 16];
    for (dst, src) in out.iter_mut().zip(cols.iter().flatten()) {
        *dst = *src as f32;
    }
    out
}

/// Draw-call submission surface.
///
/// Fallible operations return `anyhow::Result` since failures originate in
/// whatever graphics API sits behind the implementation.
pub trait RenderBackend {
    fn create_program(
        &mut self,
        variant: ShaderVariant,
        source: &ShaderSource,
    ) -> anyhow::Result<ProgramHandle>;

    fn upload_buffer(&mut self, target: BufferTarget, data: &[u8]) -> anyhow::Result<BufferHandle>;

    /// `None` when the program does not expose the attribute.
    fn attribute_location(&mut self, program: ProgramHandle, name: &str)
    -> Option<AttributeLocation>;

    /// `None` when the program does not expose the uniform.
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn use_program(&mut self, program: ProgramHandle);

    fn bind_attribute(&mut self, binding: &AttributeBinding);

    fn bind_index_buffer(&mut self, buffer: BufferHandle);

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>);

    fn draw_indexed(&mut self, mode: DrawMode, count: usize, index_type: ComponentType);

    fn draw_arrays(&mut self, mode: DrawMode, count: usize);

    fn release_buffer(&mut self, buffer: BufferHandle);

    fn release_program(&mut self, program: ProgramHandle);
}

/// Projection and view for the current frame.
pub trait Camera {
    fn projection_matrix(&self) -> Matrix4<f64>;
    fn view_matrix(&self) -> Matrix4<f64>;
}

/// A camera with fixed matrices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticCamera {
    pub projection: Matrix4<f64>,
    pub view: Matrix4<f64>,
}

impl Camera for StaticCamera {
    fn projection_matrix(&self) -> Matrix4<f64> {
        self.projection
    }

    fn view_matrix(&self) -> Matrix4<f64> {
        self.view
    }
}

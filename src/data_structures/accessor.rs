//! Typed views over decoded buffer data.
//!
//! An [`Accessor`] owns a tightly packed copy of its elements. Strided buffer
//! views are de-interleaved when the accessor is decoded, so every element is
//! exactly `component_type.size() * dimensions.multiplicity()` bytes.

use cgmath::{Matrix4, Quaternion, Vector3};

use crate::error::{AssetError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    /// The GL enum value used in glTF documents.
    pub fn gl_enum(self) -> u32 {
        match self {
            ComponentType::I8 => 5120,
            ComponentType::U8 => 5121,
            ComponentType::I16 => 5122,
            ComponentType::U16 => 5123,
            ComponentType::U32 => 5125,
            ComponentType::F32 => 5126,
        }
    }

    pub fn from_gl(value: u32) -> Result<Self> {
        Ok(match value {
            5120 => ComponentType::I8,
            5121 => ComponentType::U8,
            5122 => ComponentType::I16,
            5123 => ComponentType::U16,
            5125 => ComponentType::U32,
            5126 => ComponentType::F32,
            other => {
                return Err(AssetError::invalid(format!(
                    "unknown accessor component type {other}"
                )));
            }
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimensions {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl Dimensions {
    pub fn multiplicity(self) -> usize {
        match self {
            Dimensions::Scalar => 1,
            Dimensions::Vec2 => 2,
            Dimensions::Vec3 => 3,
            Dimensions::Vec4 | Dimensions::Mat2 => 4,
            Dimensions::Mat3 => 9,
            Dimensions::Mat4 => 16,
        }
    }

    pub fn from_type_name(name: &str) -> Result<Self> {
        Ok(match name {
            "SCALAR" => Dimensions::Scalar,
            "VEC2" => Dimensions::Vec2,
            "VEC3" => Dimensions::Vec3,
            "VEC4" => Dimensions::Vec4,
            "MAT2" => Dimensions::Mat2,
            "MAT3" => Dimensions::Mat3,
            "MAT4" => Dimensions::Mat4,
            other => {
                return Err(AssetError::invalid(format!("unknown accessor type {other:?}")));
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Accessor {
    pub component_type: ComponentType,
    pub dimensions: Dimensions,
    pub count: usize,
    pub normalized: bool,
    /// Packed little-endian element bytes, `count * element_size()` long.
    pub data: Vec<u8>,
}

impl Accessor {
    pub fn new(
        component_type: ComponentType,
        dimensions: Dimensions,
        count: usize,
        normalized: bool,
        data: Vec<u8>,
    ) -> Result<Self> {
        let accessor = Self {
            component_type,
            dimensions,
            count,
            normalized,
            data,
        };
        let expected = accessor.element_size().checked_mul(count).ok_or_else(|| {
            AssetError::invalid(format!("accessor count {count} overflows its byte length"))
        })?;
        if accessor.data.len() != expected {
            return Err(AssetError::invalid(format!(
                "accessor holds {} bytes, expected {expected}",
                accessor.data.len()
            )));
        }
        Ok(accessor)
    }

    /// Packed accessor from `f32` components.
    pub fn from_f32(dimensions: Dimensions, values: &[f32]) -> Result<Self> {
        let count = values.len() / dimensions.multiplicity();
        Self::new(
            ComponentType::F32,
            dimensions,
            count,
            false,
            bytemuck::cast_slice(values).to_vec(),
        )
    }

    pub fn element_size(&self) -> usize {
        self.component_type.size() * self.dimensions.multiplicity()
    }

    fn component(&self, idx: usize) -> f64 {
        let size = self.component_type.size();
        let bytes = &self.data[idx * size..(idx + 1) * size];
        match self.component_type {
            ComponentType::I8 => {
                let v = bytes[0] as i8 as f64;
                if self.normalized { (v / 127.0).max(-1.0) } else { v }
            }
            ComponentType::U8 => {
                let v = bytes[0] as f64;
                if self.normalized { v / 255.0 } else { v }
            }
            ComponentType::I16 => {
                let v = i16::from_le_bytes([bytes[0], bytes[1]]) as f64;
                if self.normalized { (v / 32767.0).max(-1.0) } else { v }
            }
            ComponentType::U16 => {
                let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f64;
                if self.normalized { v / 65535.0 } else { v }
            }
            ComponentType::U32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            ComponentType::F32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
        }
    }

    /// Every component as `f64`, normalization applied.
    pub fn read_f64(&self) -> Vec<f64> {
        let n = self.count * self.dimensions.multiplicity();
        (0..n).map(|i| self.component(i)).collect()
    }

    /// Every component converted to `f32`. Exact for float accessors.
    pub fn read_f32(&self) -> Vec<f32> {
        if self.component_type == ComponentType::F32 && !self.normalized {
            return self
                .data
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
        }
        self.read_f64().into_iter().map(|v| v as f32).collect()
    }

    /// Unsigned integer contents, e.g. indices or joint ids.
    pub fn read_u32(&self) -> Result<Vec<u32>> {
        match self.component_type {
            ComponentType::U8 | ComponentType::U16 | ComponentType::U32 => {
                Ok(self.read_f64().into_iter().map(|v| v as u32).collect())
            }
            other => Err(AssetError::invalid(format!(
                "expected unsigned integer accessor, found {other:?}"
            ))),
        }
    }

    pub fn read_scalars(&self) -> Result<Vec<f32>> {
        self.expect(Dimensions::Scalar)?;
        Ok(self.read_f32())
    }

    pub fn read_vec3(&self) -> Result<Vec<Vector3<f64>>> {
        self.expect(Dimensions::Vec3)?;
        Ok(self
            .read_f32()
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0] as f64, c[1] as f64, c[2] as f64))
            .collect())
    }

    /// Quaternions stored as `[x, y, z, w]`.
    pub fn read_quat(&self) -> Result<Vec<Quaternion<f64>>> {
        self.expect(Dimensions::Vec4)?;
        Ok(self
            .read_f32()
            .chunks_exact(4)
            .map(|c| Quaternion::new(c[3] as f64, c[0] as f64, c[1] as f64, c[2] as f64))
            .collect())
    }

    /// Column-major 4x4 matrices.
    pub fn read_mat4(&self) -> Result<Vec<Matrix4<f64>>> {
        self.expect(Dimensions::Mat4)?;
        Ok(self
            .read_f32()
            .chunks_exact(16)
            .map(|c| {
                let mut cols = [[0.0f64; 4]; 4];
                for (i, v) in c.iter().enumerate() {
                    cols[i / 4][i % 4] = *v as f64;
                }
                Matrix4::from(cols)
            })
            .collect())
    }

    fn expect(&self, dimensions: Dimensions) -> Result<()> {
        if self.dimensions != dimensions {
            return Err(AssetError::invalid(format!(
                "expected {dimensions:?} accessor, found {:?}",
                self.dimensions
            )));
        }
        Ok(())
    }
}

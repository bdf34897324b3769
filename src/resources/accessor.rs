//! Copying accessor elements out of resolved buffers.
//!
//! Both decoders describe accessors as an [`AccessorLayout`] and share the
//! extraction: bounds checks, stride de-interleaving and sparse substitution.

use crate::{
    data_structures::accessor::{Accessor, ComponentType, Dimensions},
    error::{AssetError, RefKind, Result},
};

/// A byte range inside one buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewLayout {
    pub buffer: usize,
    pub offset: usize,
    pub length: usize,
    pub stride: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SparseLayout {
    pub count: usize,
    pub indices_view: ViewLayout,
    pub indices_offset: usize,
    pub index_type: ComponentType,
    pub values_view: ViewLayout,
    pub values_offset: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessorLayout {
    /// `None` means all elements are zero (before sparse substitution).
    pub view: Option<ViewLayout>,
    pub offset: usize,
    pub component_type: ComponentType,
    pub dimensions: Dimensions,
    pub count: usize,
    pub normalized: bool,
    pub sparse: Option<SparseLayout>,
}

impl AccessorLayout {
    fn element_size(&self) -> usize {
        self.component_type.size() * self.dimensions.multiplicity()
    }
}

fn view_bytes<'a>(view: &ViewLayout, buffers: &'a [Vec<u8>]) -> Result<&'a [u8]> {
    let buffer = buffers
        .get(view.buffer)
        .ok_or_else(|| AssetError::missing(RefKind::Buffer, view.buffer))?;
    view.offset
        .checked_add(view.length)
        .and_then(|end| buffer.get(view.offset..end))
        .ok_or_else(|| {
            AssetError::invalid(format!(
                "buffer view [{}..+{}] exceeds buffer {} of {} bytes",
                view.offset,
                view.length,
                view.buffer,
                buffer.len()
            ))
        })
}

fn overflow(what: &str) -> AssetError {
    AssetError::invalid(format!("{what} overflows the address space"))
}

/// Byte length of `count` packed elements.
fn packed_len(count: usize, element_size: usize) -> Result<usize> {
    count
        .checked_mul(element_size)
        .ok_or_else(|| overflow("accessor byte length"))
}

/// Copy `count` elements of `element_size` bytes, `stride` apart.
fn gather(
    bytes: &[u8],
    offset: usize,
    count: usize,
    element_size: usize,
    stride: usize,
) -> Result<Vec<u8>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let needed = stride
        .checked_mul(count - 1)
        .and_then(|span| span.checked_add(offset))
        .and_then(|span| span.checked_add(element_size))
        .ok_or_else(|| overflow("accessor extent"))?;
    if needed > bytes.len() {
        return Err(AssetError::invalid(format!(
            "accessor needs {needed} bytes but its buffer view has {}",
            bytes.len()
        )));
    }
    if stride == element_size {
        return Ok(bytes[offset..offset + count * element_size].to_vec());
    }
    let mut out = Vec::with_capacity(count * element_size);
    for i in 0..count {
        let start = offset + i * stride;
        out.extend_from_slice(&bytes[start..start + element_size]);
    }
    Ok(out)
}

pub fn extract(layout: &AccessorLayout, buffers: &[Vec<u8>]) -> Result<Accessor> {
    let element_size = layout.element_size();
    let mut data = match &layout.view {
        Some(view) => {
            let bytes = view_bytes(view, buffers)?;
            let stride = view.stride.unwrap_or(element_size);
            if stride < element_size {
                return Err(AssetError::invalid(format!(
                    "byte stride {stride} is smaller than the element size {element_size}"
                )));
            }
            gather(bytes, layout.offset, layout.count, element_size, stride)?
        }
        None => {
            let len = packed_len(layout.count, element_size)?;
            let mut zeroes = Vec::new();
            zeroes.try_reserve_exact(len).map_err(|_| {
                AssetError::invalid(format!(
                    "accessor of {} elements cannot be allocated",
                    layout.count
                ))
            })?;
            zeroes.resize(len, 0);
            zeroes
        }
    };
    if let Some(sparse) = &layout.sparse {
        apply_sparse(sparse, element_size, layout.count, &mut data, buffers)?;
    }
    Accessor::new(
        layout.component_type,
        layout.dimensions,
        layout.count,
        layout.normalized,
        data,
    )
}

fn apply_sparse(
    sparse: &SparseLayout,
    element_size: usize,
    count: usize,
    data: &mut [u8],
    buffers: &[Vec<u8>],
) -> Result<()> {
    let index_size = sparse.index_type.size();
    let indices = gather(
        view_bytes(&sparse.indices_view, buffers)?,
        sparse.indices_offset,
        sparse.count,
        index_size,
        index_size,
    )?;
    let indices = Accessor::new(
        sparse.index_type,
        Dimensions::Scalar,
        sparse.count,
        false,
        indices,
    )?
    .read_u32()?;
    let values = gather(
        view_bytes(&sparse.values_view, buffers)?,
        sparse.values_offset,
        sparse.count,
        element_size,
        element_size,
    )?;
    for (i, &target) in indices.iter().enumerate() {
        let target = target as usize;
        if target >= count {
            return Err(AssetError::invalid(format!(
                "sparse index {target} exceeds accessor count {count}"
            )));
        }
        data[target * element_size..(target + 1) * element_size]
            .copy_from_slice(&values[i * element_size..(i + 1) * element_size]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        bytemuck::cast_slice(values).to_vec()
    }

    #[test]
    fn de_interleaves_strided_views() {
        // position (vec3) + 4 bytes padding per vertex
        let buffer = f32_bytes(&[1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]);
        let layout = AccessorLayout {
            view: Some(ViewLayout {
                buffer: 0,
                offset: 0,
                length: buffer.len(),
                stride: Some(16),
            }),
            offset: 0,
            component_type: ComponentType::F32,
            dimensions: Dimensions::Vec3,
            count: 2,
            normalized: false,
            sparse: None,
        };
        let accessor = extract(&layout, &[buffer]).unwrap();
        assert_eq!(accessor.read_f32(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn out_of_bounds_accessor_fails() {
        let layout = AccessorLayout {
            view: Some(ViewLayout {
                buffer: 0,
                offset: 4,
                length: 8,
                stride: None,
            }),
            offset: 0,
            component_type: ComponentType::F32,
            dimensions: Dimensions::Vec3,
            count: 1,
            normalized: false,
            sparse: None,
        };
        assert!(extract(&layout, &[vec![0; 12]]).is_err());
        assert!(matches!(
            extract(&layout, &[]),
            Err(AssetError::MissingReference { kind: RefKind::Buffer, .. })
        ));
    }

    #[test]
    fn sparse_values_replace_zeroes() {
        let mut buffer = vec![2u8, 0];
        buffer.extend(f32_bytes(&[7.0]));
        let layout = AccessorLayout {
            view: None,
            offset: 0,
            component_type: ComponentType::F32,
            dimensions: Dimensions::Scalar,
            count: 3,
            normalized: false,
            sparse: Some(SparseLayout {
                count: 1,
                indices_view: ViewLayout {
                    buffer: 0,
                    offset: 0,
                    length: 2,
                    stride: None,
                },
                indices_offset: 0,
                index_type: ComponentType::U16,
                values_view: ViewLayout {
                    buffer: 0,
                    offset: 2,
                    length: 4,
                    stride: None,
                },
                values_offset: 0,
            }),
        };
        let accessor = extract(&layout, &[buffer]).unwrap();
        assert_eq!(accessor.read_f32(), vec![0.0, 0.0, 7.0]);
    }

    #[test]
    fn oversized_counts_fail_without_panicking() {
        let mut layout = AccessorLayout {
            view: Some(ViewLayout {
                buffer: 0,
                offset: 0,
                length: 12,
                stride: None,
            }),
            offset: 0,
            component_type: ComponentType::F32,
            dimensions: Dimensions::Vec3,
            count: 1 << 62,
            normalized: false,
            sparse: None,
        };
        assert!(matches!(
            extract(&layout, &[vec![0; 12]]),
            Err(AssetError::InvalidDocument(_))
        ));

        layout.view = None;
        assert!(matches!(
            extract(&layout, &[]),
            Err(AssetError::InvalidDocument(_))
        ));
    }
}

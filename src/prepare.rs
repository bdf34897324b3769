//! Scene graph builder.
//!
//! [`prepare`] walks the scene from its roots and turns every reachable
//! primitive into backend state: one program per shader variant for the
//! whole asset, vertex and index buffers uploaded once, attribute bindings and
//! uniform handles cached on the primitive. Primitives that already carry a
//! cache are left alone, so preparing twice or sharing a mesh between nodes
//! never duplicates backend resources.
//!
//! Preparation is all or nothing. When a backend call fails, everything
//! created so far is released again before the error is returned.

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    backend::{AttributeBinding, BufferTarget, ProgramHandle, RenderBackend, ShaderVariant},
    data_structures::{
        accessor::ComponentType,
        description::AssetDescription,
        mesh::{JOINTS_0, NORMAL, POSITION, Primitive, RenderCache, UniformHandles, WEIGHTS_0},
    },
    error::{AssetError, RefKind, Result},
    pipelines::{
        A_JOINTS_0, A_NORMAL, A_POSITION, A_WEIGHTS_0, U_JOINT_MATRIX, U_MODEL_MATRIX,
        U_PROJECTION_MATRIX, U_VIEW_MATRIX, shader_source, skinned::MAX_JOINTS,
    },
};

/// Document semantic to shader attribute name.
const ATTRIBUTES: [(&str, &str); 4] = [
    (POSITION, A_POSITION),
    (NORMAL, A_NORMAL),
    (JOINTS_0, A_JOINTS_0),
    (WEIGHTS_0, A_WEIGHTS_0),
];

/// Build backend state for every primitive reachable from the roots.
pub fn prepare(description: &mut AssetDescription, backend: &mut dyn RenderBackend) -> Result<()> {
    for (i, skin) in description.skins.iter().enumerate() {
        if skin.joints.len() > MAX_JOINTS {
            warn!(
                "skin {i} has {} joints, only the first {MAX_JOINTS} reach the shader",
                skin.joints.len()
            );
        }
    }
    let result = prepare_from_roots(description, backend);
    if result.is_err() {
        release(description, backend);
    }
    result
}

fn prepare_from_roots(
    description: &mut AssetDescription,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    let mut prepared = 0;
    let mut stack: Vec<usize> = description.roots.iter().rev().copied().collect();
    while let Some(idx) = stack.pop() {
        let node = description
            .nodes
            .get(idx)
            .ok_or_else(|| AssetError::missing(RefKind::Node, idx))?;
        stack.extend(node.children.iter().rev());
        let Some(mesh_idx) = node.mesh else {
            continue;
        };
        let mesh = description
            .meshes
            .get_mut(mesh_idx)
            .ok_or_else(|| AssetError::missing(RefKind::Mesh, mesh_idx))?;
        for primitive in mesh.primitives.iter_mut().filter(|p| !p.is_prepared()) {
            let variant = primitive.kind().shader_variant();
            let program = program_for(&mut description.programs, variant, backend)?;
            primitive.cache = Some(build_cache(primitive, program, variant, backend)?);
            prepared += 1;
        }
    }
    debug!(
        "prepared {prepared} primitives with {} programs",
        description.programs.len()
    );
    Ok(())
}

fn program_for(
    programs: &mut HashMap<ShaderVariant, ProgramHandle>,
    variant: ShaderVariant,
    backend: &mut dyn RenderBackend,
) -> Result<ProgramHandle> {
    if let Some(program) = programs.get(&variant) {
        return Ok(*program);
    }
    let program = backend
        .create_program(variant, &shader_source(variant))
        .map_err(AssetError::BackendFailure)?;
    debug!("created {variant:?} program {program:?}");
    programs.insert(variant, program);
    Ok(program)
}

fn build_cache(
    primitive: &Primitive,
    program: ProgramHandle,
    variant: ShaderVariant,
    backend: &mut dyn RenderBackend,
) -> Result<RenderCache> {
    let mut cache = RenderCache {
        program,
        variant,
        vertex_buffers: Vec::new(),
        attributes: Vec::new(),
        index_buffer: None,
        index_count: 0,
        index_type: None,
        vertex_count: primitive.vertex_count(),
        uniforms: UniformHandles::default(),
    };
    if let Err(e) = fill_cache(&mut cache, primitive, backend) {
        release_cache(&cache, backend);
        return Err(e);
    }
    Ok(cache)
}

fn fill_cache(
    cache: &mut RenderCache,
    primitive: &Primitive,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    for (semantic, name) in ATTRIBUTES {
        let Some(accessor) = primitive.attributes.get(semantic) else {
            continue;
        };
        let Some(location) = backend.attribute_location(cache.program, name) else {
            debug!("program {:?} has no {name}, {semantic} stays unbound", cache.program);
            continue;
        };
        let buffer = backend
            .upload_buffer(BufferTarget::Vertex, &accessor.data)
            .map_err(AssetError::BackendFailure)?;
        cache.vertex_buffers.push(buffer);
        cache.attributes.push(AttributeBinding {
            location,
            buffer,
            component_type: accessor.component_type,
            components: accessor.dimensions.multiplicity(),
            normalized: accessor.normalized,
        });
    }

    if let Some(indices) = &primitive.indices {
        if !matches!(
            indices.component_type,
            ComponentType::U8 | ComponentType::U16 | ComponentType::U32
        ) {
            return Err(AssetError::invalid(format!(
                "indices must be unsigned integers, got {:?}",
                indices.component_type
            )));
        }
        let buffer = backend
            .upload_buffer(BufferTarget::Index, &indices.data)
            .map_err(AssetError::BackendFailure)?;
        cache.index_buffer = Some(buffer);
        cache.index_count = indices.count;
        cache.index_type = Some(indices.component_type);
    }

    cache.uniforms = UniformHandles {
        joint_matrix: backend.uniform_location(cache.program, U_JOINT_MATRIX),
        projection: backend.uniform_location(cache.program, U_PROJECTION_MATRIX),
        view: backend.uniform_location(cache.program, U_VIEW_MATRIX),
        model: backend.uniform_location(cache.program, U_MODEL_MATRIX),
    };
    Ok(())
}

fn release_cache(cache: &RenderCache, backend: &mut dyn RenderBackend) {
    for buffer in cache.vertex_buffers.iter().chain(&cache.index_buffer) {
        backend.release_buffer(*buffer);
    }
}

/// Free every backend handle owned by the description.
///
/// Caches and programs are taken out while releasing, so a second call is a
/// no-op.
pub fn release(description: &mut AssetDescription, backend: &mut dyn RenderBackend) {
    let mut buffers = 0;
    for primitive in description.meshes.iter_mut().flat_map(|m| m.primitives.iter_mut()) {
        if let Some(cache) = primitive.cache.take() {
            buffers += cache.vertex_buffers.len() + usize::from(cache.index_buffer.is_some());
            release_cache(&cache, backend);
        }
    }
    let programs = description.programs.len();
    for (_, program) in description.programs.drain() {
        backend.release_program(program);
    }
    debug!("released {buffers} buffers and {programs} programs");
}

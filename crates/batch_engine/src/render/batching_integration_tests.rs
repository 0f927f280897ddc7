//! End-to-end tests: load, batch, flush and tear down against the headless device

use approx::assert_relative_eq;

use crate::assets::ObjLoader;
use crate::core::config::{BatcherConfig, RenderConfig};
use crate::foundation::math::Vec3;
use crate::render::api::{HeadlessDevice, ShaderHandle, TextureHandle};
use crate::render::context::RenderContext;
use crate::render::primitives::{Mesh, Vertex};
use crate::render::systems::batching::{BatchError, BatcherState};

const QUAD_OBJ: &str = "\
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 3/3/1 4/4/1 1/1/1
";

fn context() -> RenderContext<HeadlessDevice> {
    let mut config = RenderConfig::default();
    config.batcher = BatcherConfig::new(1024, 4096, 4);
    config.textures.width = 4;
    config.textures.height = 4;
    config.textures.layers = 2;
    RenderContext::new(HeadlessDevice::new(), config).unwrap()
}

fn read_vertices(context: &RenderContext<HeadlessDevice>, buffer: crate::render::BufferHandle, count: usize) -> Vec<Vertex> {
    let bytes = context.device().buffer_data(buffer).unwrap();
    bytes[..count * Vertex::STRIDE]
        .chunks_exact(Vertex::STRIDE)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

fn read_indices(context: &RenderContext<HeadlessDevice>, buffer: crate::render::BufferHandle, count: usize) -> Vec<u32> {
    let bytes = context.device().buffer_data(buffer).unwrap();
    bytes[..count * 4].chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
}

#[test]
fn test_frame_round_trip() {
    let mut context = context();
    let program = context.device_mut().register_program(&["mvp", "textureArray"]);
    let mut textures = context.create_texture_array().unwrap();
    textures.upload_layer_rgba(context.device_mut(), 0, 4, 4, &[200; 64]).unwrap();

    let (quad, report) = ObjLoader::parse(QUAD_OBJ);
    assert!(report.is_clean());
    let mut cube = Mesh::cube(Vec3::new(0.0, 0.0, -5.0), Vec3::new(1.0, 1.0, 1.0), [2.0, 2.0]);
    cube.set_texture_layer(1);
    let sphere = Mesh::sphere(0.5, 8, 4);

    let mut batcher = context.create_batcher().unwrap();
    let meshes = [&quad, &cube, &sphere];
    for mesh in meshes {
        batcher.submit(context.device_mut(), mesh).unwrap();
    }

    // Every mesh's indices point into its own region of the shared buffer
    let index_count = batcher.index_cursor();
    let indices = read_indices(&context, batcher.index_buffer(), index_count);
    for (slot, mesh) in batcher.slots().iter().zip(meshes) {
        let rebased = &indices[slot.index_offset..slot.index_offset + slot.index_count];
        for (&packed, &original) in rebased.iter().zip(&mesh.indices) {
            assert_eq!(packed as usize, original as usize + slot.vertex_offset);
        }
    }
    let vertices = read_vertices(&context, batcher.vertex_buffer(), batcher.vertex_cursor());
    assert_eq!(vertices[quad.vertex_count()].texture_layer, 1);

    let report = batcher.flush(context.device_mut(), program, textures.handle()).unwrap();
    assert_eq!(report.ranges.len(), 3);
    assert_eq!(report.indices, index_count);
    assert_eq!(report.ranges[1].index_byte_offset, quad.index_count() as u64 * 4);
    assert_eq!(report.ranges[2].index_byte_offset, (quad.index_count() + 36) as u64 * 4);

    let calls = context.device().draw_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].texture_unit0, textures.handle());
    assert_eq!(context.device().sampler_unit(program, 1), Some(0));

    let trash = context.create_default_trash_batch();
    {
        let mut trash = trash.borrow_mut();
        trash.add(quad);
        trash.add(cube);
        trash.add(sphere);
        trash.add(batcher);
        trash.add(textures);
    }
    assert_eq!(context.teardown(), 5);
    assert_eq!(context.device().live_buffers(), 0);
    assert_eq!(context.device().live_layouts(), 0);
    assert_eq!(context.device().live_textures(), 0);
}

#[test]
fn test_full_batcher_flush_and_retry() {
    let mut context = context();
    let mut batcher = context.create_batcher().unwrap();
    let mesh = Mesh::cube(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5), [1.0, 1.0]);

    for _ in 0..4 {
        batcher.submit(context.device_mut(), &mesh).unwrap();
    }
    assert_eq!(batcher.state(), BatcherState::Full);
    assert_eq!(
        batcher.submit(context.device_mut(), &mesh),
        Err(BatchError::MeshLimitReached { max: 4 })
    );
    assert_eq!(batcher.vertex_cursor(), 96);

    batcher.flush(context.device_mut(), ShaderHandle::NULL, TextureHandle::NULL).unwrap();
    batcher.submit(context.device_mut(), &mesh).unwrap();

    let report = batcher.flush(context.device_mut(), ShaderHandle::NULL, TextureHandle::NULL).unwrap();
    assert_eq!(report.ranges.len(), 1);
    assert_eq!(report.ranges[0].index_byte_offset, 0);
    assert_eq!(context.device().draw_calls().len(), 2);

    batcher.release(context.device_mut());
}

#[test]
fn test_source_mesh_edits_after_submit_do_not_leak() {
    let mut context = context();
    let mut batcher = context.create_batcher().unwrap();
    let (mut quad, _) = ObjLoader::parse(QUAD_OBJ);

    batcher.submit(context.device_mut(), &quad).unwrap();
    quad.transform(Vec3::new(10.0, 0.0, 0.0));
    quad.rotate(1.0, Vec3::new(0.0, 0.0, 1.0));
    batcher.submit(context.device_mut(), &quad).unwrap();

    let vertices = read_vertices(&context, batcher.vertex_buffer(), 12);
    assert_relative_eq!(vertices[0].position[0], -1.0);
    assert_relative_eq!(vertices[6].position[0], quad.vertices[0].position[0]);

    batcher.release(context.device_mut());
}

#[test]
fn test_appended_mesh_batches_like_its_parts() {
    let mut context = context();
    let (quad, _) = ObjLoader::parse(QUAD_OBJ);
    let sphere = Mesh::sphere(1.0, 6, 3);
    let combined = quad.append(&sphere).unwrap();
    assert!(combined.validate().is_ok());

    let mut separate = context.create_batcher().unwrap();
    separate.submit(context.device_mut(), &quad).unwrap();
    separate.submit(context.device_mut(), &sphere).unwrap();

    let mut joined = context.create_batcher().unwrap();
    joined.submit(context.device_mut(), &combined).unwrap();

    let count = combined.index_count();
    assert_eq!(
        read_indices(&context, separate.index_buffer(), count),
        read_indices(&context, joined.index_buffer(), count)
    );

    let trash = context.create_trash_batch(2, true);
    trash.borrow_mut().add(separate);
    trash.borrow_mut().add(joined);
    drop(context);
    assert!(trash.borrow().is_empty());
}

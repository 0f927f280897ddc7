//! Batching demo application
//!
//! Packs a grid of cubes, a sphere and an optional OBJ model into one batcher
//! for a few frames on the headless device, then tears everything down
//! through the trash registry.
//!
//! ```text
//! batch_demo [config.toml|config.ron] [model.obj] [texture.png]
//! ```

use batch_engine::assets::{ObjError, ObjLoader};
use batch_engine::config::ConfigError;
use batch_engine::core::config::{Config, RenderConfig};
use batch_engine::foundation::{logging, math::Vec3};
use batch_engine::render::{
    BatchError, GeometryBatcher, HeadlessDevice, Mesh, RenderContext, ShaderHandle, TextureArray,
    TextureError,
};

const FRAMES: u32 = 3;
const GRID_SIZE: i32 = 4;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("OBJ error: {0}")]
    Obj(#[from] ObjError),
}

struct DemoArgs {
    config: Option<String>,
    model: Option<String>,
    texture: Option<String>,
}

impl DemoArgs {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        Self {
            config: args.next(),
            model: args.next(),
            texture: args.next(),
        }
    }
}

fn cube_grid() -> Vec<Mesh> {
    let mut cubes = Vec::new();
    for x in 0..GRID_SIZE {
        for z in 0..GRID_SIZE {
            let center = Vec3::new(x as f32 * 3.0, 0.0, z as f32 * -3.0);
            let mut cube = Mesh::cube(center, Vec3::new(1.0, 1.0, 1.0), [1.0, 1.0]);
            cube.set_color([x as f32 / GRID_SIZE as f32, 0.5, z as f32 / GRID_SIZE as f32]);
            cubes.push(cube);
        }
    }
    cubes
}

fn run_frame(
    context: &mut RenderContext<HeadlessDevice>,
    batcher: &mut GeometryBatcher,
    meshes: &[Mesh],
    shader: ShaderHandle,
    textures: &TextureArray,
) -> Result<(), DemoError> {
    for mesh in meshes {
        match batcher.submit(context.device_mut(), mesh) {
            Ok(()) => {}
            Err(BatchError::MeshLimitReached { .. })
            | Err(BatchError::VertexCapacityExceeded { .. })
            | Err(BatchError::IndexCapacityExceeded { .. }) => {
                // Draw what fits so far and start a fresh batch
                batcher.flush(context.device_mut(), shader, textures.handle())?;
                batcher.submit(context.device_mut(), mesh)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let report = batcher.flush(context.device_mut(), shader, textures.handle())?;
    log::info!(
        "Frame flushed {} meshes: {} vertices, {} indices",
        report.ranges.len(),
        report.vertices,
        report.indices
    );
    Ok(())
}

fn run(args: DemoArgs) -> Result<(), DemoError> {
    let config = match &args.config {
        Some(path) => RenderConfig::load_from_file(path)?,
        None => RenderConfig::default(),
    };
    logging::init_with_level(&config.engine.log_level);
    log::info!("Starting batch demo");

    let mut context = RenderContext::new(HeadlessDevice::new(), config)?;
    let shader = context.device_mut().register_program(&["mvp", "textureArray"]);
    let trash = context.create_default_trash_batch();

    let mut textures = context.create_texture_array()?;
    if let Some(path) = &args.texture {
        textures.load_layer(context.device_mut(), path, 0)?;
    }

    let mut meshes = cube_grid();
    let mut sphere = Mesh::sphere(1.5, 24, 12);
    sphere.transform(Vec3::new(4.5, 4.0, -4.5));
    sphere.set_texture_layer(1);
    meshes.push(sphere);

    if let Some(path) = &args.model {
        let mut model = ObjLoader::load_obj(path)?;
        model.resize(Vec3::new(0.5, 0.5, 0.5));
        meshes.push(model);
    }

    let mut batcher = context.create_batcher()?;
    for frame in 0..FRAMES {
        log::debug!("Frame {}", frame);
        for mesh in &mut meshes {
            mesh.rotate(0.1, Vec3::new(0.0, 1.0, 0.0));
        }
        run_frame(&mut context, &mut batcher, &meshes, shader, &textures)?;
    }
    log::info!("Issued {} draw calls over {} frames", context.device().draw_calls().len(), FRAMES);

    {
        let mut trash = trash.borrow_mut();
        for mesh in meshes {
            trash.add(mesh);
        }
        trash.add(batcher);
        trash.add(textures);
    }
    let released = context.teardown();
    log::info!(
        "Released {} resources; {} buffers and {} textures left on the device",
        released,
        context.device().live_buffers(),
        context.device().live_textures()
    );
    Ok(())
}

fn main() {
    if let Err(e) = run(DemoArgs::parse()) {
        log::error!("Batch demo failed: {}", e);
        eprintln!("Batch demo failed: {e}");
        std::process::exit(1);
    }
}

//! Headless godrays frame.
//!
//! Renders a single frame offscreen: a directional light with a
//! comparison-configured shadow map, adaptive stepping and blur, written to
//! the pipeline's intermediate target. Prints the frame report.
//!
//! ```text
//! RUST_LOG=debug cargo run --example headless
//! ```

use anyhow::{Context, Result};
use glam::Vec3;

use myth_godrays::renderer::core::Tracked;
use myth_godrays::resources::noise::NoiseLoader;
use myth_godrays::{
    AdaptiveSteps, BlurParams, DepthPacking, GodraysFrame, GodraysParamsPatch, GodraysPipeline,
    KernelSize, LightSource, ShadowMap, ViewCamera, generate_noise,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn create_view(device: &wgpu::Device, label: &str, format: wgpu::TextureFormat) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: WIDTH,
                height: HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn main() -> Result<()> {
    env_logger::init();

    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .context("no suitable GPU adapter")?;
    let (device, queue) =
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
            .context("failed to create device")?;

    // Scene inputs the host would normally provide
    let mut camera = ViewCamera::new_perspective(50.0, WIDTH as f32 / HEIGHT as f32, 0.1, 500.0);
    camera.look_at(Vec3::new(0.0, 6.0, 25.0), Vec3::ZERO, Vec3::Y);

    let mut light = LightSource::directional(Vec3::new(10.0, 60.0, 10.0), Vec3::ZERO, 30.0, 1.0, 150.0);
    light.set_shadow_map(ShadowMap::allocate(
        &device,
        1024,
        false,
        wgpu::TextureFormat::Depth32Float,
        Some(wgpu::CompareFunction::LessEqual),
    ));

    let scene_color = Tracked::new(create_view(&device, "Scene Color", COLOR_FORMAT));
    let scene_depth = Tracked::new(create_view(
        &device,
        "Scene Depth",
        wgpu::TextureFormat::Depth32Float,
    ));

    let patch = GodraysParamsPatch::from_json(
        r##"{ "density": 0.01, "maxDensity": 0.6, "color": "#ffe6c0" }"##,
    )?
    .with_adaptive_steps(AdaptiveSteps::new(0.5).with_bounds(16, 96))
    .with_blur(BlurParams {
        variance: 0.15,
        kernel_size: KernelSize::Medium,
    });

    let mut pipeline = GodraysPipeline::new(&device, &light, &camera, &patch)?;
    pipeline.set_size(WIDTH, HEIGHT);
    pipeline.set_depth_texture(scene_depth, DepthPacking::Basic)?;

    match std::env::args().nth(1) {
        Some(path) => pipeline.set_noise_loader(NoiseLoader::from_path(path)),
        None => pipeline.set_noise_texture(generate_noise(64, 0x5eed)),
    }

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Headless Godrays"),
    });
    let report = pipeline.render(
        &device,
        &queue,
        &mut encoder,
        &GodraysFrame {
            light: &light,
            camera: &camera,
            input_color: &scene_color,
            input_format: COLOR_FORMAT,
            output: None,
        },
    )?;
    queue.submit([encoder.finish()]);

    println!("plan:            {:?}", report.plan.steps());
    println!("low-res extent:  {}x{}", report.low_res.width, report.low_res.height);
    println!("depth copied:    {}", report.depth_copied);
    println!("output:          {:?}", report.output);
    println!(
        "config:          {}",
        serde_json::to_string(pipeline.params())?
    );

    pipeline.dispose();
    Ok(())
}

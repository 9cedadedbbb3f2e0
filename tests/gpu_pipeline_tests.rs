//! GPU Pipeline Tests
//!
//! End-to-end frames through `GodraysPipeline` on a real device. Ignored by
//! default; run with `cargo test -- --ignored` on a machine with an adapter.
//!
//! Tests for:
//! - Precondition errors (size, scene depth, disposal)
//! - Shadow map warm-up and the one-time latch transition
//! - Comparison shadow maps: compatible copy bound during illumination,
//!   original restored afterward, copy redone only per shadow update
//! - Blur toggling rewires the compositor input
//! - Resize idempotency and resolution scale changes
//! - Output placement (intermediate vs screen)

use glam::Vec3;

use myth_godrays::errors::GodraysError;
use myth_godrays::renderer::core::Tracked;
use myth_godrays::renderer::graph::context::OutputTarget;
use myth_godrays::renderer::graph::frame::{FrameStep, ScatteringSource};
use myth_godrays::renderer::graph::targets::TargetExtent;
use myth_godrays::renderer::{FrameReport, GodraysFrame, GodraysPipeline, OutputDestination};
use myth_godrays::resources::godrays::{BlurParams, DepthPacking, GodraysParamsPatch, KernelSize};
use myth_godrays::resources::noise::generate_noise;
use myth_godrays::scene::camera::ViewCamera;
use myth_godrays::scene::light::{LightSource, ShadowMap};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ============================================================================
// Fixtures
// ============================================================================

fn device() -> (wgpu::Device, wgpu::Queue) {
    let _ = env_logger::builder().is_test(true).try_init();
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
        .expect("no GPU adapter");
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
        .expect("device request failed")
}

struct Scene {
    color: Tracked<wgpu::TextureView>,
    depth: Tracked<wgpu::TextureView>,
    screen: wgpu::TextureView,
    camera: ViewCamera,
    light: LightSource,
}

fn texture_view(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
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

fn scene(device: &wgpu::Device) -> Scene {
    let mut camera = ViewCamera::new_perspective(60.0, WIDTH as f32 / HEIGHT as f32, 0.1, 200.0);
    camera.look_at(Vec3::new(0.0, 5.0, 20.0), Vec3::ZERO, Vec3::Y);

    Scene {
        color: Tracked::new(texture_view(device, "Scene Color", COLOR_FORMAT)),
        depth: Tracked::new(texture_view(
            device,
            "Scene Depth",
            wgpu::TextureFormat::Depth32Float,
        )),
        screen: texture_view(device, "Screen", COLOR_FORMAT),
        camera,
        light: LightSource::directional(Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO, 20.0, 1.0, 100.0),
    }
}

fn pipeline(device: &wgpu::Device, scene: &Scene, patch: &GodraysParamsPatch) -> GodraysPipeline {
    let mut pipeline = GodraysPipeline::new(device, &scene.light, &scene.camera, patch).unwrap();
    pipeline.set_size(WIDTH, HEIGHT);
    pipeline
        .set_depth_texture(scene.depth.clone(), DepthPacking::Basic)
        .unwrap();
    pipeline
}

fn render(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &mut GodraysPipeline,
    scene: &Scene,
) -> FrameReport {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let report = pipeline
        .render(
            device,
            queue,
            &mut encoder,
            &GodraysFrame {
                light: &scene.light,
                camera: &scene.camera,
                input_color: &scene.color,
                input_format: COLOR_FORMAT,
                output: Some(OutputTarget {
                    view: &scene.screen,
                    format: COLOR_FORMAT,
                }),
            },
        )
        .unwrap();
    queue.submit([encoder.finish()]);
    report
}

// ============================================================================
// Preconditions
// ============================================================================

#[test]
#[ignore = "requires a GPU adapter"]
fn render_requires_size_and_scene_depth() {
    let (device, queue) = device();
    let scene = scene(&device);
    let mut pipeline = GodraysPipeline::new(
        &device,
        &scene.light,
        &scene.camera,
        &GodraysParamsPatch::new(),
    )
    .unwrap();

    let frame = GodraysFrame {
        light: &scene.light,
        camera: &scene.camera,
        input_color: &scene.color,
        input_format: COLOR_FORMAT,
        output: None,
    };
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());

    let err = pipeline.render(&device, &queue, &mut encoder, &frame).unwrap_err();
    assert!(matches!(err, GodraysError::SizeNotSet));

    pipeline.set_size(WIDTH, HEIGHT);
    let err = pipeline.render(&device, &queue, &mut encoder, &frame).unwrap_err();
    assert!(matches!(err, GodraysError::MissingSceneDepth));

    let err = pipeline
        .set_depth_texture(scene.depth.clone(), DepthPacking::Rgba)
        .unwrap_err();
    assert!(matches!(err, GodraysError::UnsupportedDepthPacking(DepthPacking::Rgba)));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn light_without_shadow_fails_construction() {
    let (device, _queue) = device();
    let scene = scene(&device);
    let light = scene.light.clone().without_shadow();
    let result = GodraysPipeline::new(&device, &light, &scene.camera, &GodraysParamsPatch::new());
    assert!(matches!(result, Err(GodraysError::LightWithoutShadow)));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn dispose_is_idempotent_and_final() {
    let (device, queue) = device();
    let scene = scene(&device);
    let mut pipeline = pipeline(&device, &scene, &GodraysParamsPatch::new().with_blur(true));
    render(&device, &queue, &mut pipeline, &scene);

    pipeline.dispose();
    pipeline.dispose();
    assert!(pipeline.is_disposed());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let err = pipeline
        .render(
            &device,
            &queue,
            &mut encoder,
            &GodraysFrame {
                light: &scene.light,
                camera: &scene.camera,
                input_color: &scene.color,
                input_format: COLOR_FORMAT,
                output: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, GodraysError::Disposed));
    assert!(pipeline.set_params(&GodraysParamsPatch::new()).is_err());
}

// ============================================================================
// Shadow map
// ============================================================================

#[test]
#[ignore = "requires a GPU adapter"]
fn warm_up_until_shadow_map_arrives() {
    let (device, queue) = device();
    let mut scene = scene(&device);
    let mut pipeline = pipeline(&device, &scene, &GodraysParamsPatch::new());

    let warm_up = render(&device, &queue, &mut pipeline, &scene);
    assert!(!warm_up.shadow_ready);
    assert!(warm_up.plan.contains(FrameStep::ClearScattering));
    assert_eq!(warm_up.illumination_shadow, None);

    let map = ShadowMap::allocate(&device, 256, false, wgpu::TextureFormat::Depth32Float, None);
    let map_id = map.view.id();
    scene.light.set_shadow_map(map);

    let ready = render(&device, &queue, &mut pipeline, &scene);
    assert!(ready.shadow_ready);
    assert!(ready.plan.contains(FrameStep::Illuminate));
    assert!(!ready.depth_copied);
    assert_eq!(ready.illumination_shadow, Some(map_id));
    assert_eq!(ready.restored_shadow, Some(map_id));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn comparison_shadow_map_is_copied_and_restored() {
    let (device, queue) = device();
    let mut scene = scene(&device);
    let map = ShadowMap::allocate(
        &device,
        256,
        false,
        wgpu::TextureFormat::Depth32Float,
        Some(wgpu::CompareFunction::LessEqual),
    );
    let map_id = map.view.id();
    scene.light.set_shadow_map(map);
    let mut pipeline = pipeline(&device, &scene, &GodraysParamsPatch::new());

    let first = render(&device, &queue, &mut pipeline, &scene);
    assert!(first.depth_copied);
    assert!(first.plan.contains(FrameStep::CopyShadowDepth));
    let during = first.illumination_shadow.unwrap();
    assert_ne!(during, map_id);
    assert_eq!(first.restored_shadow, Some(map_id));

    let second = render(&device, &queue, &mut pipeline, &scene);
    assert!(!second.depth_copied);
    assert_eq!(second.illumination_shadow, Some(during));

    if let Some(shadow) = scene.light.shadow.as_mut()
        && let Some(map) = shadow.map.as_mut()
    {
        map.mark_updated();
    }
    let third = render(&device, &queue, &mut pipeline, &scene);
    assert!(third.depth_copied);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn point_light_cube_map_renders() {
    let (device, queue) = device();
    let mut scene = scene(&device);
    scene.light = LightSource::point(Vec3::new(0.0, 8.0, 0.0), 0.1, 40.0);
    scene.light.set_shadow_map(ShadowMap::allocate(
        &device,
        128,
        true,
        wgpu::TextureFormat::Depth32Float,
        Some(wgpu::CompareFunction::LessEqual),
    ));

    let mut pipeline = pipeline(&device, &scene, &GodraysParamsPatch::new());
    let report = render(&device, &queue, &mut pipeline, &scene);
    assert!(report.shadow_ready);
    assert!(report.depth_copied);
}

// ============================================================================
// Wiring & targets
// ============================================================================

#[test]
#[ignore = "requires a GPU adapter"]
fn blur_toggle_switches_compositor_input() {
    let (device, queue) = device();
    let mut scene = scene(&device);
    scene.light.set_shadow_map(ShadowMap::allocate(
        &device,
        256,
        false,
        wgpu::TextureFormat::Depth32Float,
        None,
    ));
    let mut pipeline = pipeline(&device, &scene, &GodraysParamsPatch::new().with_blur(false));

    let raw = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(raw.composite_source(), ScatteringSource::Raw);
    assert_eq!(
        raw.passes.as_slice(),
        ["Godrays Illumination Pass", "Godrays Compositor Pass"]
    );
    let raw_input = raw.composite_inputs.unwrap().scattering;

    pipeline
        .set_params(&GodraysParamsPatch::new().with_blur(BlurParams {
            variance: 0.2,
            kernel_size: KernelSize::Medium,
        }))
        .unwrap();
    let denoised = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(denoised.composite_source(), ScatteringSource::Denoised);
    assert_ne!(denoised.composite_inputs.unwrap().scattering, raw_input);
    assert_eq!(denoised.denoise_generation, 1);
    assert_eq!(
        denoised.passes.as_slice(),
        [
            "Godrays Illumination Pass",
            "Godrays Denoise Pass",
            "Godrays Compositor Pass"
        ]
    );

    pipeline
        .set_params(&GodraysParamsPatch::new().with_blur(BlurParams {
            variance: 0.4,
            kernel_size: KernelSize::Medium,
        }))
        .unwrap();
    let variance_only = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(variance_only.denoise_generation, 1);

    pipeline
        .set_params(&GodraysParamsPatch::new().with_blur(false))
        .unwrap();
    let raw_again = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(raw_again.composite_inputs.unwrap().scattering, raw_input);

    // re-enabling restores the Medium kernel: no pipeline rebuild
    pipeline
        .set_params(&GodraysParamsPatch::new().with_blur(true))
        .unwrap();
    let denoised_again = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(denoised_again.composite_source(), ScatteringSource::Denoised);
    assert_eq!(denoised_again.denoise_generation, 1);
    assert_eq!(
        pipeline.params().blur().map(|blur| blur.kernel_size),
        Some(KernelSize::Medium)
    );
}

#[test]
#[ignore = "requires a GPU adapter"]
fn resize_is_idempotent_and_scale_halves_low_res() {
    let (device, queue) = device();
    let scene = scene(&device);
    let mut pipeline = pipeline(&device, &scene, &GodraysParamsPatch::new());

    let first = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(first.low_res, TargetExtent::new(32, 24));
    assert_eq!(first.scattering_allocations, 1);

    pipeline.set_size(WIDTH, HEIGHT);
    let same = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(same.scattering_allocations, 1);

    pipeline
        .set_params(&GodraysParamsPatch::new().with_resolution_scale(0.25))
        .unwrap();
    let quarter = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(quarter.low_res, TargetExtent::new(16, 12));
    assert_eq!(quarter.full, TargetExtent::new(WIDTH, HEIGHT));
    assert_eq!(quarter.scattering_allocations, 2);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn output_goes_to_screen_only_when_requested() {
    let (device, queue) = device();
    let scene = scene(&device);
    let mut pipeline = pipeline(&device, &scene, &GodraysParamsPatch::new());
    pipeline.set_noise_texture(generate_noise(16, 3));

    let intermediate = render(&device, &queue, &mut pipeline, &scene);
    let OutputDestination::Intermediate(id) = intermediate.output else {
        panic!("expected the intermediate target, got {:?}", intermediate.output);
    };
    assert_eq!(pipeline.output_view().map(Tracked::id), Some(id));
    assert_eq!(
        intermediate.composite_inputs.unwrap().scene_color,
        scene.color.id()
    );

    pipeline.set_render_to_screen(true);
    let screen = render(&device, &queue, &mut pipeline, &scene);
    assert_eq!(screen.output, OutputDestination::Screen);
    assert!(pipeline.output_view().is_none());
}

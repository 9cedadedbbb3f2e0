//! Full-screen triangle pipelines.
//!
//! Every godrays pass draws a single triangle covering the viewport
//! (`draw(0..3, 0..1)`, no vertex buffers) with `vs_main`/`fs_main` entry
//! points, so pipeline creation reduces to choosing targets.

/// Description of one full-screen pipeline variant.
pub struct FullscreenPipelineDesc<'a> {
    pub label: &'a str,
    pub module: &'a wgpu::ShaderModule,
    pub bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
    /// `None` for depth-only pipelines.
    pub color_target: Option<wgpu::ColorTargetState>,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
}

#[must_use]
pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    desc: &FullscreenPipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    let bind_group_layouts: Vec<Option<&wgpu::BindGroupLayout>> =
        desc.bind_group_layouts.iter().copied().map(Some).collect();
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Layout", desc.label)),
        bind_group_layouts: &bind_group_layouts,
        immediate_size: 0,
    });

    let targets = [desc.color_target.clone()];
    let targets: &[Option<wgpu::ColorTargetState>] = if desc.color_target.is_some() {
        &targets
    } else {
        &[]
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: desc.module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.module,
            entry_point: Some("fs_main"),
            targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: desc.depth_stencil.clone(),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

/// Single-texture color target without blending.
#[must_use]
pub fn replace_target(format: wgpu::TextureFormat) -> Option<wgpu::ColorTargetState> {
    Some(wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState::REPLACE),
        write_mask: wgpu::ColorWrites::ALL,
    })
}

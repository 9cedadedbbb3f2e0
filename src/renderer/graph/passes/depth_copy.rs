//! Shadow Depth Compatibility Copy
//!
//! A shadow map that the host configured for comparison sampling cannot be
//! read with the plain depth samples the raymarch performs. Such maps are
//! copied into a pipeline-owned `Depth32Float` texture of identical size and
//! layer count, and the copy is bound instead of the original.
//!
//! | Source | Method |
//! |--------|--------|
//! | `Depth32Float` with `COPY_SRC` | `copy_texture_to_texture` |
//! | anything else | one `frag_depth` blit per layer |
//!
//! The copy is redone only when the source texture or its version changes.

use smallvec::SmallVec;

use crate::renderer::core::Tracked;
use crate::renderer::pipeline::{
    FullscreenPipelineDesc, ShaderCompilationOptions, ShaderManager, create_fullscreen_pipeline,
};
use crate::scene::light::ShadowMap;

const COPY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    TextureCopy,
    Blit,
}

impl CopyMethod {
    #[must_use]
    pub fn for_map(map: &ShadowMap) -> Self {
        if map.supports_texture_copy() {
            Self::TextureCopy
        } else {
            Self::Blit
        }
    }
}

/// Remembers which `(source view, version)` the copy currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySchedule {
    last: Option<(u64, u64)>,
}

impl CopySchedule {
    #[must_use]
    pub fn is_stale(&self, source_id: u64, version: u64) -> bool {
        self.last != Some((source_id, version))
    }

    pub fn record(&mut self, source_id: u64, version: u64) {
        self.last = Some((source_id, version));
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

struct CopyTarget {
    texture: wgpu::Texture,
    view: Tracked<wgpu::TextureView>,
    size: u32,
    layers: u32,
}

/// Per-layer blit resources, rebuilt for every blit.
struct BlitLayer {
    bind_group: wgpu::BindGroup,
    target: wgpu::TextureView,
}

struct PendingCopy {
    method: CopyMethod,
    source_id: u64,
    version: u64,
}

pub struct DepthCopyPass {
    blit_layout: wgpu::BindGroupLayout,
    blit_sampler: wgpu::Sampler,
    blit_pipeline: Option<wgpu::RenderPipeline>,
    blit_layers: SmallVec<[BlitLayer; 6]>,

    target: Option<CopyTarget>,
    schedule: CopySchedule,
    pending: Option<PendingCopy>,
    copies: u64,
}

impl DepthCopyPass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Depth Blit Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        // source and target share their size, so nearest hits texel centers
        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Depth Blit Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            blit_layout,
            blit_sampler,
            blit_pipeline: None,
            blit_layers: SmallVec::new(),
            target: None,
            schedule: CopySchedule::default(),
            pending: None,
            copies: 0,
        }
    }

    fn ensure_target(&mut self, device: &wgpu::Device, map: &ShadowMap) {
        let layers = map.layers();
        if self
            .target
            .as_ref()
            .is_some_and(|t| t.size == map.size && t.layers == layers)
        {
            return;
        }

        log::debug!(
            "Allocating shadow depth copy {}x{} ({layers} layers)",
            map.size,
            map.size
        );

        if let Some(old) = self.target.take() {
            old.texture.destroy();
        }
        self.schedule.reset();

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Depth Copy"),
            size: wgpu::Extent3d {
                width: map.size,
                height: map.size,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COPY_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Depth Copy View"),
            dimension: Some(if layers == 6 {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });

        self.target = Some(CopyTarget {
            texture,
            view: Tracked::new(view),
            size: map.size,
            layers,
        });
    }

    fn prepare_blit(
        &mut self,
        device: &wgpu::Device,
        shader_manager: &mut ShaderManager,
        map: &ShadowMap,
    ) {
        if self.blit_pipeline.is_none() {
            log::debug!("Compiling shadow depth blit pipeline");
            let (module, _) = shader_manager.get_or_compile_template(
                device,
                "passes/depth_blit",
                &ShaderCompilationOptions::new(),
            );
            self.blit_pipeline = Some(create_fullscreen_pipeline(
                device,
                &FullscreenPipelineDesc {
                    label: "Shadow Depth Blit Pipeline",
                    module,
                    bind_group_layouts: &[&self.blit_layout],
                    color_target: None,
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: COPY_FORMAT,
                        depth_write_enabled: Some(true),
                        depth_compare: Some(wgpu::CompareFunction::Always),
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                },
            ));
        }

        let Some(target) = &self.target else {
            return;
        };

        self.blit_layers.clear();
        for layer in 0..target.layers {
            let single_layer = |texture: &wgpu::Texture, label, aspect| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect,
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            };
            let source = single_layer(
                &map.texture,
                "Shadow Depth Blit Source",
                wgpu::TextureAspect::DepthOnly,
            );
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Shadow Depth Blit BindGroup"),
                layout: &self.blit_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.blit_sampler),
                    },
                ],
            });
            self.blit_layers.push(BlitLayer {
                bind_group,
                target: single_layer(
                    &target.texture,
                    "Shadow Depth Blit Target",
                    wgpu::TextureAspect::All,
                ),
            });
        }
    }

    /// Schedules a copy of `map` if the held copy is stale.
    ///
    /// Returns `true` when [`encode`](Self::encode) will record a copy.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        shader_manager: &mut ShaderManager,
        map: &ShadowMap,
    ) -> bool {
        self.ensure_target(device, map);

        let source_id = map.view.id();
        if !self.schedule.is_stale(source_id, map.version) {
            self.pending = None;
            return false;
        }

        let method = CopyMethod::for_map(map);
        if method == CopyMethod::Blit {
            self.prepare_blit(device, shader_manager, map);
        }
        self.pending = Some(PendingCopy {
            method,
            source_id,
            version: map.version,
        });
        true
    }

    /// Records the scheduled copy, if any.
    pub fn encode(&mut self, encoder: &mut wgpu::CommandEncoder, map: &ShadowMap) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(target) = &self.target else {
            return;
        };

        match pending.method {
            CopyMethod::TextureCopy => {
                encoder.copy_texture_to_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &map.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::TexelCopyTextureInfo {
                        texture: &target.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::Extent3d {
                        width: target.size,
                        height: target.size,
                        depth_or_array_layers: target.layers,
                    },
                );
            }
            CopyMethod::Blit => {
                let Some(pipeline) = &self.blit_pipeline else {
                    return;
                };
                for layer in &self.blit_layers {
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Shadow Depth Blit"),
                        color_attachments: &[],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: &layer.target,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }),
                        ..Default::default()
                    });
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &layer.bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
            }
        }

        self.schedule.record(pending.source_id, pending.version);
        self.copies += 1;
        log::trace!(
            "Copied shadow depth ({:?}, version {})",
            pending.method,
            pending.version
        );
    }

    /// The compatible copy, once allocated.
    #[must_use]
    pub fn view(&self) -> Option<&Tracked<wgpu::TextureView>> {
        self.target.as_ref().map(|t| &t.view)
    }

    /// Total copies recorded.
    #[inline]
    #[must_use]
    pub fn copy_count(&self) -> u64 {
        self.copies
    }

    pub fn release(&mut self) {
        if let Some(target) = self.target.take() {
            target.texture.destroy();
        }
        self.blit_layers.clear();
        self.blit_pipeline = None;
        self.pending = None;
        self.schedule.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_tracks_source_and_version() {
        let mut schedule = CopySchedule::default();
        assert!(schedule.is_stale(7, 0));
        schedule.record(7, 0);
        assert!(!schedule.is_stale(7, 0));
        assert!(schedule.is_stale(7, 1));
        assert!(schedule.is_stale(8, 0));
        schedule.reset();
        assert!(schedule.is_stale(7, 0));
    }
}

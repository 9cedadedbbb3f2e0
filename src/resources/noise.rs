//! Raymarch Jitter Noise
//!
//! The illumination pass offsets the first sample of every ray by a value read
//! from a tiled noise texture, trading banding for fine grain that the denoise
//! pass removes. The texture is supplied by the host as an image, either
//! decoded synchronously ([`NoiseImage::decode`]) or on a worker thread
//! ([`NoiseLoader`]). Until one arrives the pass runs without jitter.
//!
//! [`generate_noise`] produces a deterministic substitute for hosts that have
//! no blue-noise asset at hand.

use std::path::PathBuf;
use std::thread;

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::errors::{GodraysError, Result};

/// Decoded RGBA8 noise image. Only the red channel is sampled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl NoiseImage {
    /// Wraps raw RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(GodraysError::NoiseDecode(format!(
                "expected {width}x{height} RGBA8 pixels ({expected} bytes), got {} bytes",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decodes an encoded image (PNG) from memory.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_vec())
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Uploads the image as a non-filterable `Rgba8Unorm` texture.
    pub(crate) fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::Texture {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Godrays Noise"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            size,
        );

        texture
    }
}

/// Generates a `size`×`size` white-noise tile from a fixed seed.
///
/// Every channel carries the same value, so the result reads identically
/// through any single channel.
#[must_use]
pub fn generate_noise(size: u32, seed: u64) -> NoiseImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let texels = size as usize * size as usize;
    let mut data = Vec::with_capacity(texels * 4);
    for _ in 0..texels {
        let v: u8 = rng.random_range(0..=255);
        data.extend_from_slice(&[v, v, v, 255]);
    }
    NoiseImage {
        width: size,
        height: size,
        data,
    }
}

// ============================================================================
// Background loading
// ============================================================================

/// Outcome of a non-blocking [`NoiseLoader::poll`].
#[derive(Debug)]
pub enum NoisePoll {
    Pending,
    Ready(Result<NoiseImage>),
    /// The worker exited without sending anything.
    Disconnected,
}

/// Decodes a noise image on a worker thread.
///
/// The render loop calls [`poll`](Self::poll) once per frame; it never blocks.
#[derive(Debug)]
pub struct NoiseLoader {
    receiver: flume::Receiver<Result<NoiseImage>>,
}

impl NoiseLoader {
    /// Decodes an in-memory encoded image in the background.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::spawn(move || NoiseImage::decode(&bytes))
    }

    /// Reads and decodes an image file in the background.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::spawn(move || {
            let bytes = std::fs::read(&path).map_err(|e| {
                GodraysError::NoiseDecode(format!("failed to read {}: {e}", path.display()))
            })?;
            NoiseImage::decode(&bytes)
        })
    }

    fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> Result<NoiseImage> + Send + 'static,
    {
        let (sender, receiver) = flume::bounded(1);
        let spawned = thread::Builder::new()
            .name("godrays-noise".into())
            .spawn(move || {
                // The receiver may already be gone if the pipeline was disposed.
                let _ = sender.send(job());
            });
        if let Err(e) = spawned {
            log::warn!("Failed to spawn noise loader thread: {e}");
        }
        Self { receiver }
    }

    pub fn poll(&self) -> NoisePoll {
        match self.receiver.try_recv() {
            Ok(result) => NoisePoll::Ready(result),
            Err(flume::TryRecvError::Empty) => NoisePoll::Pending,
            Err(flume::TryRecvError::Disconnected) => NoisePoll::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_noise_is_deterministic() {
        let a = generate_noise(16, 7);
        let b = generate_noise(16, 7);
        assert_eq!(a, b);
        assert_eq!(a.data().len(), 16 * 16 * 4);
        assert_ne!(a, generate_noise(16, 8));
    }

    #[test]
    fn rejects_mismatched_pixel_buffers() {
        assert!(NoiseImage::from_rgba8(4, 4, vec![0; 63]).is_err());
        assert!(NoiseImage::from_rgba8(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn loader_reports_decode_failures() {
        let loader = NoiseLoader::from_bytes(b"not an image".to_vec());
        let result = loop {
            match loader.poll() {
                NoisePoll::Pending => std::thread::yield_now(),
                NoisePoll::Ready(result) => break result,
                NoisePoll::Disconnected => panic!("worker dropped the channel"),
            }
        };
        assert!(matches!(result, Err(GodraysError::NoiseDecode(_))));
    }
}

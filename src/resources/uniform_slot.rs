//! Uniform Slot
//!
//! A small container pairing one uniform block with its GPU buffer. The block
//! is rebuilt from scratch every frame; [`UniformSlot::set`] compares bytes and
//! only bumps the version when something actually changed, so the upload in
//! [`UniformSlot::sync`] happens at most once per real change.

use bytemuck::Pod;

use crate::renderer::core::Tracked;

#[derive(Debug)]
pub struct UniformSlot<T: Pod> {
    data: T,
    version: u64,
    uploaded_version: Option<u64>,
    buffer: Option<Tracked<wgpu::Buffer>>,
    label: &'static str,
}

impl<T: Pod> UniformSlot<T> {
    pub fn new(data: T, label: &'static str) -> Self {
        Self {
            data,
            version: 0,
            uploaded_version: None,
            buffer: None,
            label,
        }
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.data
    }

    /// Replaces the block. Returns `true` when the bytes differ.
    pub fn set(&mut self, data: T) -> bool {
        if bytemuck::bytes_of(&self.data) == bytemuck::bytes_of(&data) {
            return false;
        }
        self.data = data;
        self.version += 1;
        true
    }

    /// Forces the next [`sync`](Self::sync) to upload even if nothing changed.
    pub fn mark_dirty(&mut self) {
        self.version += 1;
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the CPU copy is ahead of the GPU buffer.
    #[inline]
    pub fn needs_upload(&self) -> bool {
        self.uploaded_version != Some(self.version)
    }

    /// Creates the buffer on first use and uploads pending changes.
    ///
    /// Returns `true` if bytes were written to the queue.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let buffer = self.buffer.get_or_insert_with(|| {
            Tracked::new(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: std::mem::size_of::<T>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }))
        });

        if self.uploaded_version == Some(self.version) {
            return false;
        }
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(&self.data));
        self.uploaded_version = Some(self.version);
        true
    }

    #[inline]
    pub fn buffer(&self) -> Option<&Tracked<wgpu::Buffer>> {
        self.buffer.as_ref()
    }

    /// Drops the GPU buffer; the next `sync` recreates and re-uploads it.
    pub fn release(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            buffer.destroy();
        }
        self.uploaded_version = None;
    }
}

impl<T: Pod + Default> Default for UniformSlot<T> {
    fn default() -> Self {
        Self::new(T::default(), "UniformSlot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::uniforms::DenoiseUniforms;

    #[test]
    fn identical_blocks_do_not_bump_version() {
        let mut slot = UniformSlot::new(DenoiseUniforms::default(), "test");
        assert!(!slot.set(DenoiseUniforms::default()));
        assert_eq!(slot.version(), 0);

        let changed = DenoiseUniforms {
            variance: 0.5,
            ..Default::default()
        };
        assert!(slot.set(changed));
        assert_eq!(slot.version(), 1);
        assert!(slot.needs_upload());
    }
}

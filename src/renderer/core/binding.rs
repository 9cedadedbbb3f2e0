use smallvec::SmallVec;

/// Identity of a bind group: its layout plus every bound resource, in order.
///
/// Passes keep the key of the group they built last and only call
/// `create_bind_group` again when the key changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindGroupKey {
    layout_id: u64,
    resources: SmallVec<[u64; 8]>,
}

impl BindGroupKey {
    #[must_use]
    pub fn new(layout_id: u64) -> Self {
        Self {
            layout_id,
            resources: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_resource(mut self, id: u64) -> Self {
        self.resources.push(id);
        self
    }

    #[inline]
    #[must_use]
    pub fn resources(&self) -> &[u64] {
        &self.resources
    }
}

/// A bind group together with the key it was built from.
#[derive(Debug, Default)]
pub struct CachedBindGroup {
    key: Option<BindGroupKey>,
    group: Option<wgpu::BindGroup>,
}

impl CachedBindGroup {
    /// Returns the cached group, rebuilding it with `build` when `key` differs.
    pub fn get_or_build(
        &mut self,
        key: BindGroupKey,
        build: impl FnOnce() -> wgpu::BindGroup,
    ) -> &wgpu::BindGroup {
        if self.key.as_ref() != Some(&key) {
            self.group = None;
        }
        let group = self.group.get_or_insert_with(build);
        self.key = Some(key);
        group
    }

    #[inline]
    pub fn get(&self) -> Option<&wgpu::BindGroup> {
        self.group.as_ref()
    }

    /// Forces the next `get_or_build` to rebuild.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.group = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_by_layout_and_resources() {
        let a = BindGroupKey::new(1).with_resource(10).with_resource(11);
        let b = BindGroupKey::new(1).with_resource(10).with_resource(11);
        let c = BindGroupKey::new(1).with_resource(11).with_resource(10);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, BindGroupKey::new(2).with_resource(10).with_resource(11));
    }
}

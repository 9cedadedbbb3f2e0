use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global unique id generator.
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A GPU resource paired with a process-unique id.
///
/// Ids key the bind group caches and let a frame report exactly which
/// resources each pass consumed.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    inner: T,
    id: u64,
}

impl<T> Tracked<T> {
    /// Wraps a resource and assigns a fresh id.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            id: next_id(),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

// Direct access to inner methods (e.g. `texture_view.texture()`)
impl<T> Deref for Tracked<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_survive_clone() {
        let a = Tracked::new(1u8);
        let b = Tracked::new(1u8);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}

//! Resource readiness and binding substitution.

/// Whether an asynchronously produced resource has shown up yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatchState {
    #[default]
    AwaitingResource,
    Ready,
}

/// One-way latch flipped by the first observation of a resource.
///
/// The shadow map is rendered by the host's shadow system, usually starting a
/// frame or two after the pipeline is created. The transition is reported
/// exactly once so the caller can re-push uniforms and rebuild bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLatch {
    state: LatchState,
}

impl ResourceLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records availability. Returns `true` only on the transition to `Ready`.
    pub fn observe(&mut self, available: bool) -> bool {
        if self.state == LatchState::AwaitingResource && available {
            self.state = LatchState::Ready;
            return true;
        }
        false
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> LatchState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == LatchState::Ready
    }

    pub fn reset(&mut self) {
        self.state = LatchState::AwaitingResource;
    }
}

/// A depth binding that may be temporarily replaced for one frame.
///
/// `substitute` swaps in a compatible copy; `restore` puts the original back
/// so the next frame starts from the host's texture again.
#[derive(Debug, Clone)]
pub struct DepthBinding<T> {
    original: Option<T>,
    substitute: Option<T>,
}

impl<T> Default for DepthBinding<T> {
    fn default() -> Self {
        Self {
            original: None,
            substitute: None,
        }
    }
}

impl<T> DepthBinding<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host-provided binding. Clears any pending substitution.
    pub fn bind(&mut self, original: T) {
        self.original = Some(original);
        self.substitute = None;
    }

    pub fn unbind(&mut self) {
        self.original = None;
        self.substitute = None;
    }

    pub fn substitute(&mut self, replacement: T) {
        self.substitute = Some(replacement);
    }

    /// Drops the substitute and returns it.
    pub fn restore(&mut self) -> Option<T> {
        self.substitute.take()
    }

    /// The binding a pass should read right now.
    #[must_use]
    pub fn active(&self) -> Option<&T> {
        self.substitute.as_ref().or(self.original.as_ref())
    }

    #[inline]
    #[must_use]
    pub fn original(&self) -> Option<&T> {
        self.original.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_substituted(&self) -> bool {
        self.substitute.is_some()
    }
}

//! Godrays Render Graph
//!
//! Provides:
//! - [`FramePlan`]: the pass order of one frame
//! - [`PrepareContext`] / [`ExecuteContext`]: phase-separated pass contexts
//! - [`RenderNode`]: the pass trait
//! - [`LightGeometry`]: clip planes and light matrix per light type
//! - [`ResourceLatch`] / [`DepthBinding`]: shadow readiness and binding substitution
//! - [`ResizeState`] / [`TargetSlot`]: render target sizing
//! - [`passes`]: the pass implementations

pub mod context;
pub mod frame;
pub mod latch;
pub mod light_geometry;
pub mod node;
pub mod passes;
pub mod targets;

pub use context::{ExecuteContext, FrameResources, OutputTarget, PrepareContext};
pub use frame::{FramePlan, FrameStep, PlanInputs, ScatteringSource};
pub use latch::{DepthBinding, LatchState, ResourceLatch};
pub use light_geometry::{ClipPlanes, LightGeometry, Plane, ShadowVolume};
pub use node::RenderNode;
pub use targets::{ResizeState, SCATTERING_FORMAT, TargetExtent, TargetSlot};

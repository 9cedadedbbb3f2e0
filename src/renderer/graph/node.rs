//! Render Node Trait
//!
//! Abstract interface of one pass in the godrays chain.

use super::context::{ExecuteContext, PrepareContext};

/// A render pass.
///
/// # Contract
/// - `prepare` receives the mutable [`PrepareContext`]: compile pipelines,
///   upload uniforms, build bind groups.
/// - `run` receives the read-only [`ExecuteContext`] and a `CommandEncoder`
///   and only records commands.
///
/// All allocation happens in `prepare`; `run` must not mutate pass state.
pub trait RenderNode {
    /// Node name, used for debug groups and logs.
    fn name(&self) -> &'static str;

    /// Prepare phase: allocate, compile and bind.
    fn prepare(&mut self, _ctx: &mut PrepareContext) {}

    /// Execute phase: record GPU commands.
    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder);
}

//! Godrays Passes
//!
//! The four GPU stages of one godrays frame, in execution order:
//! - [`DepthCopyPass`]: comparison-configured shadow map to plain `Depth32Float`
//! - [`IlluminationPass`]: low-resolution raymarch
//! - [`DenoisePass`]: bilateral filter, only while blur is enabled
//! - [`CompositorPass`]: depth-guided upsample over the scene color

pub mod compositor;
pub mod denoise;
pub mod depth_copy;
pub mod illumination;

pub use compositor::{CompositeInputs, CompositorPass};
pub use denoise::{DenoiseChange, DenoisePass, DenoiseState};
pub use depth_copy::{CopyMethod, CopySchedule, DepthCopyPass};
pub use illumination::IlluminationPass;

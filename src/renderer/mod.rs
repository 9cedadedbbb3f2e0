//! Renderer
//!
//! - [`core`]: resource identity and bind group caching
//! - [`pipeline`]: shader templates and full-screen pipeline construction
//! - [`graph`]: frame planning, pass contexts and the passes themselves
//! - [`godrays`]: [`GodraysPipeline`], the entry point hosts drive each frame
//! - [`reference`]: CPU ports of the shaders

pub mod core;
pub mod godrays;
pub mod graph;
pub mod pipeline;
pub mod reference;

pub use godrays::{DirtyFlags, FrameReport, GodraysFrame, GodraysPipeline, OutputDestination};

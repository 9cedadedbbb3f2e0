#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use errors::{GodraysError, Result};
pub use renderer::graph::{FramePlan, FrameStep, OutputTarget, ScatteringSource, TargetExtent};
pub use renderer::{DirtyFlags, FrameReport, GodraysFrame, GodraysPipeline, OutputDestination};
pub use resources::{
    AdaptiveSteps, BlurParams, BlurSetting, ColorValue, DepthPacking, GodraysParams,
    GodraysParamsPatch, KernelSize, NoiseImage, NoiseLoader, StepMode, UpsampleQuality,
    generate_noise,
};
pub use scene::{LightKind, LightSource, ShadowCamera, ShadowMap, ViewCamera};

//! Effect Resources
//!
//! Pure data used by the godrays passes, independent of any GPU state:
//! - [`godrays`]: user-facing parameters and their JSON form
//! - [`noise`]: the raymarch jitter image and its background loader
//! - [`uniforms`]: per-pass GPU uniform blocks
//! - [`uniform_slot`]: change-tracked uniform buffers

pub mod godrays;
pub mod noise;
pub mod uniform_slot;
pub mod uniforms;

pub use godrays::{
    AdaptiveSteps, BlurParams, BlurSetting, ColorValue, DepthPacking, GodraysParams,
    GodraysParamsPatch, KernelSize, StepMode, UpsampleQuality,
};
pub use noise::{NoiseImage, NoiseLoader, NoisePoll, generate_noise};
pub use uniform_slot::UniformSlot;
pub use uniforms::{UniformArray, WgslStruct, WgslType};

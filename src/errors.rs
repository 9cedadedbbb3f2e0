//! Error Types
//!
//! This module defines the error types used throughout the godrays pipeline.
//!
//! # Overview
//!
//! The main error type [`GodraysError`] covers the failure modes that are
//! reported to the caller:
//! - Configuration errors (conflicting or out-of-range parameters)
//! - Precondition errors (a light that cannot provide shadow data)
//! - Asset errors (a noise image that fails to decode)
//!
//! Transient unavailability (a shadow map or noise texture that is not ready
//! yet) and depth sampling incompatibilities are handled internally and never
//! surface as errors.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, GodraysError>`.
//!
//! ```rust,ignore
//! use myth_godrays::errors::Result;
//!
//! fn configure(pipeline: &mut GodraysPipeline) -> Result<()> {
//!     pipeline.set_params(&GodraysParamsPatch::from_json(r#"{ "density": 0.01 }"#)?)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::resources::godrays::DepthPacking;

/// The main error type for the godrays pipeline.
#[derive(Error, Debug)]
pub enum GodraysError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Both a fixed raymarch step count and adaptive stepping were requested.
    #[error("`raymarchSteps` and `adaptiveSteps` are mutually exclusive; set only one")]
    ConflictingStepModes,

    /// A depth texture was supplied with a packing the shaders cannot decode.
    #[error("Unsupported depth packing {0:?}: only basic depth packing is supported")]
    UnsupportedDepthPacking(DepthPacking),

    /// A parameter value is outside of its valid range.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter (as spelled in the JSON config)
        name: &'static str,
        /// Human-readable constraint that was violated
        reason: String,
    },

    /// A JSON parameter document could not be parsed.
    #[error("Invalid godrays config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// The light handed to the pipeline does not cast shadows.
    #[error("Light used for godrays must cast shadows")]
    LightWithoutShadow,

    /// `render` was called before a scene depth texture was supplied.
    #[error("No scene depth texture has been set; call `set_depth_texture` first")]
    MissingSceneDepth,

    /// `render` was called before the output size was known.
    #[error("Output size has not been set; call `set_size` first")]
    SizeNotSet,

    /// The pipeline was used after `dispose`.
    #[error("The godrays pipeline has been disposed")]
    Disposed,

    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// The noise image could not be decoded.
    #[error("Noise texture decode error: {0}")]
    NoiseDecode(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for GodraysError {
    fn from(err: image::ImageError) -> Self {
        GodraysError::NoiseDecode(err.to_string())
    }
}

/// Alias for `Result<T, GodraysError>`.
pub type Result<T> = std::result::Result<T, GodraysError>;

//! Frame Plan
//!
//! The fixed pass order of one godrays frame, resolved from the current
//! state before any GPU work is recorded:
//!
//! ```text
//! [CopyShadowDepth] -> Illuminate | ClearScattering -> [Denoise] -> Composite(source)
//! ```
//!
//! While the shadow map has not arrived the scattering target is only
//! cleared, denoising is skipped and the compositor adds a zero contribution.

use smallvec::SmallVec;

/// Which low-resolution texture the compositor upsamples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScatteringSource {
    /// Illumination output.
    Raw,
    /// Denoise output.
    Denoised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStep {
    CopyShadowDepth,
    ClearScattering,
    Illuminate,
    Denoise,
    Composite(ScatteringSource),
}

/// State the plan depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanInputs {
    /// Shadow latch is ready and a map is bound.
    pub shadow_ready: bool,
    /// The bound map needs a fresh compatibility copy this frame.
    pub copy_shadow_depth: bool,
    pub blur: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    steps: SmallVec<[FrameStep; 4]>,
}

impl FramePlan {
    #[must_use]
    pub fn build(inputs: PlanInputs) -> Self {
        let mut steps = SmallVec::new();

        if !inputs.shadow_ready {
            steps.push(FrameStep::ClearScattering);
            steps.push(FrameStep::Composite(ScatteringSource::Raw));
            return Self { steps };
        }

        if inputs.copy_shadow_depth {
            steps.push(FrameStep::CopyShadowDepth);
        }
        steps.push(FrameStep::Illuminate);
        if inputs.blur {
            steps.push(FrameStep::Denoise);
            steps.push(FrameStep::Composite(ScatteringSource::Denoised));
        } else {
            steps.push(FrameStep::Composite(ScatteringSource::Raw));
        }
        Self { steps }
    }

    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[FrameStep] {
        &self.steps
    }

    #[must_use]
    pub fn contains(&self, step: FrameStep) -> bool {
        self.steps.contains(&step)
    }

    /// The compositor input. Every plan ends with a composite step.
    #[must_use]
    pub fn composite_source(&self) -> ScatteringSource {
        self.steps
            .iter()
            .find_map(|step| match step {
                FrameStep::Composite(source) => Some(*source),
                _ => None,
            })
            .unwrap_or(ScatteringSource::Raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_frame_only_clears() {
        let plan = FramePlan::build(PlanInputs {
            shadow_ready: false,
            copy_shadow_depth: false,
            blur: true,
        });
        assert_eq!(
            plan.steps(),
            &[
                FrameStep::ClearScattering,
                FrameStep::Composite(ScatteringSource::Raw)
            ]
        );
    }

    #[test]
    fn depth_copy_precedes_illumination() {
        let plan = FramePlan::build(PlanInputs {
            shadow_ready: true,
            copy_shadow_depth: true,
            blur: false,
        });
        assert_eq!(plan.steps()[0], FrameStep::CopyShadowDepth);
        assert_eq!(plan.steps()[1], FrameStep::Illuminate);
    }
}

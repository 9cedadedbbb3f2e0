//! Host-side scene inputs: the view camera and the shadow-casting light.

pub mod camera;
pub mod light;

pub use camera::{ViewCamera, linearize_depth};
pub use light::{
    DirectionalLight, LightKind, LightShadow, LightSource, PointLight, ShadowCamera, ShadowMap,
};

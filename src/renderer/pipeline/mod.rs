pub mod fullscreen;
pub mod shader_gen;
pub mod shader_manager;

pub use fullscreen::{FullscreenPipelineDesc, create_fullscreen_pipeline, replace_target};
pub use shader_gen::{ShaderCompilationOptions, ShaderGenerator};
pub use shader_manager::ShaderManager;

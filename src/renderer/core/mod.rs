pub mod binding;
pub mod tracked;

pub use binding::{BindGroupKey, CachedBindGroup};
pub use tracked::Tracked;

//! # Built-in Adapters
//!
//! Port implementations the runtime ships with: line-oriented outputs and a
//! placeholder-substituting renderer.

pub mod output;
pub mod renderer;

pub use output::{BuiltinOutputFactory, LineOutput};
pub use renderer::TemplateRenderer;

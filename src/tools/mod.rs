//! Tool contract, argument handling and registry.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool, ToolContext};
pub use types::{ParameterBuilder, ToolDeclaration, ToolParameters};
pub use validation::validate_arguments;

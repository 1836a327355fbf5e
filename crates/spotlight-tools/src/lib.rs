pub mod builtin;
pub mod dispatcher;
pub mod http;
pub mod preview;
pub mod registry;

pub use dispatcher::{ToolDispatcher, ToolSet};
pub use http::HttpTool;
pub use registry::NativeToolRegistry;

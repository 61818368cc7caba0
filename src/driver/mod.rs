pub mod dispatcher;
pub mod traits;
pub mod web;

pub use dispatcher::{DispatcherConfig, MemoryAdaptiveDispatcher};
pub use traits::{PageRenderer, RenderedPage};

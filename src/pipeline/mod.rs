pub mod orchestrator;
pub mod report;
pub mod source;

pub use orchestrator::PipelineOrchestrator;
pub use source::{InMemorySource, JsonDirectorySource, PipelineSource};

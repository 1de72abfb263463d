//! Stormwatch Context Library
//!
//! Turns retrieved alert chunks into an answer:
//! - Generation backends (cloud chat completions, local Ollama)
//! - Grounding prompt assembly
//! - Lazily initialised answer orchestrator

pub mod backends;
pub mod orchestrator;
pub mod prompt;

pub use backends::{BackendKind, BackendSelection, GenerationBackend};
pub use orchestrator::{ComponentFactory, DefaultFactory, Orchestrator, StageName};

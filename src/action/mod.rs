//! GitHub Actions runtime protocol: inputs, event payload and outputs.

pub mod event;
pub mod inputs;
pub mod outputs;

pub use event::resolve_repository_name;
pub use inputs::ActionInputs;
pub use outputs::ActionOutputs;

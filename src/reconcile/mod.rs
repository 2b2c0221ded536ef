#[cfg(test)]
pub mod memory;
pub mod reconciler;
pub mod state_machine;

pub use reconciler::{Reconciler, ReconcilerConfig};

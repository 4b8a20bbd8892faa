//! Composite model lifecycle: create, initialize, analyze, drop

pub mod manager;

pub use manager::ModelLifecycle;

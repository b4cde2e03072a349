//! Domain models for the terminology server

pub mod code_system;
pub mod parameters;

pub use code_system::{CodeSystemRecord, PropertyDefinition};
pub use parameters::{Parameter, Parameters};

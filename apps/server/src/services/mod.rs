//! Service layer - terminology import engine

pub mod import;

pub use import::ImportService;

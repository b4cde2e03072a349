//! Vesta - FHIR terminology server
//!
//! A small FHIR R4 server focused on terminology ingestion:
//! - `CodeSystem/$import` with atomic concept + property batches
//! - Lazy property-definition creation with implicit `parent` semantics
//! - Extracted relational terminology tables maintained under one transaction

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;

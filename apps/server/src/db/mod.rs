//! Database layer - SQL building and terminology data access

pub mod sql;
pub mod terminology;

pub use sql::InsertBuilder;
pub use terminology::TerminologyRepository;

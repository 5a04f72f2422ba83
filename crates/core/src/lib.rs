//! Domain logic for the academic records service.
//!
//! Everything here is storage-agnostic: persistence goes through the
//! [`store::KeyedStore`] trait, which `registrar-db` implements for
//! PostgreSQL.

pub mod deletion;
pub mod error;
pub mod ingest;
pub mod progress;
pub mod schema;
pub mod store;
pub mod tabular;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

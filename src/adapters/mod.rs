//! Concrete adapter implementations for ports.

pub mod csv_export;
pub mod file_config_adapter;
pub mod memory_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
#[cfg(feature = "web")]
pub mod web;

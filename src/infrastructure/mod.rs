//! Adapters behind the domain ports.

pub mod csv_rows;
pub mod google_auth;
pub mod in_memory;
pub mod mail_api;
pub mod phonepe;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod sheets;

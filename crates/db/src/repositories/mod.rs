//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod warehouse_repo;

pub use warehouse_repo::WarehouseRepo;

//! Store implementations and offline collaborator stand-ins.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod sandbox;

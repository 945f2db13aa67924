//! Byte-addressable memory devices and a pluggable set-associative cache.
//!
//! [`device::MemoryDevice`] is the trait the CPU engine (`pep9-cpu`) executes against;
//! [`device::FlatMemory`] is the bare 64 KiB store, and [`cache::CacheMemory`] wraps any device
//! with hit/miss/eviction telemetry per a configurable `(tag, index, offset)` split and one of
//! the [`policy`] replacement strategies.

pub mod cache;
pub mod device;
pub mod error;
pub mod policy;

pub use cache::{AccessOutcome, CacheConfig, CacheMemory, CacheStats};
pub use device::{FlatMemory, MemoryDevice, MAX_ADDRESS};
pub use error::MemoryError;
pub use policy::{Kind as PolicyKind, ReplacementPolicy};

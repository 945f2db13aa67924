//! Runtime memory errors, one of the five error kinds from the error-handling design. A
//! [`MemoryError`] is latched by [`crate::device::MemoryDevice::had_error`] rather than aborting
//! the access that raised it, so the CPU engine can surface a single descriptive message once
//! execution actually halts.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("read refused at address 0x{address:04X}: {reason}")]
    ReadRefused { address: u16, reason: String },

    #[error("write refused at address 0x{address:04X}: {reason}")]
    WriteRefused { address: u16, reason: String },

    #[error("address 0x{0:04X} is out of range for a 64KiB address space")]
    OutOfRange(u32),

    #[error("cache configuration rejected: {0}")]
    BadCacheConfig(String),
}

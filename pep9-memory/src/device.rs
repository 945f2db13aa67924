//! `MemoryDevice`: the byte-addressable store the CPU engine executes against.
//!
//! Per §3, a device distinguishes two access families: `read`/`write` simulate actual CPU bus
//! traffic (they go through a cache if one is installed, and they populate the read/write
//! tracking sets a debugger uses to highlight "touched" bytes) while `get`/`set` are introspective
//! — used by the assembler's object-code loader, the listing renderer, and test fixtures that
//! want to poke memory without perturbing cache state or tracking sets.

use crate::error::MemoryError;
use std::collections::BTreeSet;

/// The top of the Pep/9 address space: a flat 64 KiB byte store.
pub const MAX_ADDRESS: u32 = 0xFFFF;

/// A byte-addressable memory device.
///
/// Implementors must treat `read`/`write` and `get`/`set` as genuinely distinct: a cache wrapper
/// intercepts the former to maintain hit/miss telemetry but forwards the latter straight through
/// to the backing store, bypassing the cache entirely.
pub trait MemoryDevice {
    /// Highest legal address, inclusive. Always [`MAX_ADDRESS`] for Pep/9's 64 KiB space, but
    /// kept as a method so test fixtures can build smaller devices.
    fn max_address(&self) -> u32;

    /// Simulated CPU read: updates cache state (if any) and the read-tracking set.
    fn read(&mut self, address: u16) -> Result<u8, MemoryError>;

    /// Simulated CPU write: updates cache state (if any) and the write-tracking set.
    fn write(&mut self, address: u16, value: u8) -> Result<(), MemoryError>;

    /// Introspective read: bypasses cache and tracking. Used by loaders and listings.
    fn get(&self, address: u16) -> u8;

    /// Introspective write: bypasses cache and tracking, but does populate the "set" tracking set
    /// (distinct from "written") so a debugger can distinguish loader-initialized bytes from
    /// bytes the running program actually stored to.
    fn set(&mut self, address: u16, value: u8);

    /// Addresses touched by `read` since the last [`MemoryDevice::clear`].
    fn bytes_read(&self) -> &BTreeSet<u16>;

    /// Addresses touched by `write` since the last [`MemoryDevice::clear`].
    fn bytes_written(&self) -> &BTreeSet<u16>;

    /// Addresses touched by `set` since the last [`MemoryDevice::clear`].
    fn bytes_set(&self) -> &BTreeSet<u16>;

    /// Reset contents to zero and clear all three tracking sets and the latched error.
    fn clear(&mut self);

    /// Has this device latched an error since the last [`MemoryDevice::clear`]?
    fn had_error(&self) -> bool;

    /// The latched error message, if any.
    fn error_message(&self) -> Option<&str>;

    /// Advance the device's notion of "the current bus cycle", used by a cache wrapper to decide
    /// whether same-address double accesses within a cycle double-count toward hit/miss stats.
    /// The flat device ignores this; it exists on the trait so the CPU engine can call it
    /// uniformly on whichever device it was handed.
    fn begin_cycle(&mut self) {}
}

/// A plain flat 64 KiB byte array with no cache. The simplest legal [`MemoryDevice`].
#[derive(Debug, Clone)]
pub struct FlatMemory {
    bytes: Vec<u8>,
    read_set: BTreeSet<u16>,
    written_set: BTreeSet<u16>,
    set_set: BTreeSet<u16>,
    error: Option<String>,
}

impl FlatMemory {
    pub fn new() -> Self {
        FlatMemory {
            bytes: vec![0u8; MAX_ADDRESS as usize + 1],
            read_set: BTreeSet::new(),
            written_set: BTreeSet::new(),
            set_set: BTreeSet::new(),
            error: None,
        }
    }

    /// Load `bytes` starting at `base`, as the loader does with an assembled object image. Uses
    /// `set`, not `write`: loading a program is not CPU bus traffic.
    pub fn load(&mut self, base: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let addr = base.wrapping_add(i as u16);
            self.set(addr, b);
        }
    }
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDevice for FlatMemory {
    fn max_address(&self) -> u32 {
        MAX_ADDRESS
    }

    fn read(&mut self, address: u16) -> Result<u8, MemoryError> {
        self.read_set.insert(address);
        Ok(self.bytes[address as usize])
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), MemoryError> {
        self.written_set.insert(address);
        self.bytes[address as usize] = value;
        Ok(())
    }

    fn get(&self, address: u16) -> u8 {
        self.bytes[address as usize]
    }

    fn set(&mut self, address: u16, value: u8) {
        self.set_set.insert(address);
        self.bytes[address as usize] = value;
    }

    fn bytes_read(&self) -> &BTreeSet<u16> {
        &self.read_set
    }

    fn bytes_written(&self) -> &BTreeSet<u16> {
        &self.written_set
    }

    fn bytes_set(&self) -> &BTreeSet<u16> {
        &self.set_set
    }

    fn clear(&mut self) {
        for b in self.bytes.iter_mut() {
            *b = 0;
        }
        self.read_set.clear();
        self.written_set.clear();
        self.set_set.clear();
        self.error = None;
        log::trace!("memory: cleared");
    }

    fn had_error(&self) -> bool {
        self.error.is_some()
    }

    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_populates_tracking_set() {
        let mut m = FlatMemory::new();
        m.read(0x10).unwrap();
        assert!(m.bytes_read().contains(&0x10));
        assert!(m.bytes_written().is_empty());
    }

    #[test]
    fn set_bypasses_written_tracking() {
        let mut m = FlatMemory::new();
        m.set(0x20, 0xAB);
        assert_eq!(m.get(0x20), 0xAB);
        assert!(m.bytes_set().contains(&0x20));
        assert!(m.bytes_written().is_empty());
    }

    #[test]
    fn clear_zeroes_contents_and_tracking() {
        let mut m = FlatMemory::new();
        m.write(0x30, 0xFF).unwrap();
        m.clear();
        assert_eq!(m.get(0x30), 0);
        assert!(m.bytes_written().is_empty());
    }

    #[test]
    fn load_uses_set_not_write() {
        let mut m = FlatMemory::new();
        m.load(0x100, &[1, 2, 3]);
        assert_eq!(m.get(0x100), 1);
        assert_eq!(m.get(0x102), 3);
        assert!(m.bytes_written().is_empty());
        assert_eq!(m.bytes_set().len(), 3);
    }
}

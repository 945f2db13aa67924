//! `ConsoleMemory`: wraps an inner [`MemoryDevice`] so that a CPU `write` to the OS's `charOut`
//! address is forwarded to an output stream, and a `read` of `charIn` is satisfied from an input
//! stream — the batch-mode equivalent of the interactive terminal pane in §6's non-goals list.
//!
//! This follows the same wrap-a-`MemoryDevice` shape `pep9_memory::CacheMemory` uses: the inner
//! device remains the single source of byte values, and this layer only intercepts the two
//! addresses that matter for console I/O.

use std::collections::BTreeSet;
use std::io::Read as _;

use pep9_memory::{MemoryDevice, MemoryError};

/// Wraps `inner`, redirecting reads/writes of two designated addresses to files (or stdio).
pub struct ConsoleMemory<M: MemoryDevice> {
    inner: M,
    char_in: Option<u16>,
    char_out: Option<u16>,
    input: std::collections::VecDeque<u8>,
    output: Vec<u8>,
}

impl<M: MemoryDevice> ConsoleMemory<M> {
    pub fn new(inner: M, char_in: Option<u16>, char_out: Option<u16>, input_bytes: Vec<u8>) -> Self {
        ConsoleMemory {
            inner,
            char_in,
            char_out,
            input: input_bytes.into_iter().collect(),
            output: Vec::new(),
        }
    }

    /// Read every byte of `path` as the charIn stream; an absent/unreadable file degrades to the
    /// empty stream, matching §6's "read input from a file (or `\n` if absent)".
    pub fn read_input_file(path: Option<&std::path::Path>) -> Vec<u8> {
        match path {
            Some(p) => {
                let mut buf = Vec::new();
                match std::fs::File::open(p) {
                    Ok(mut f) => {
                        let _ = f.read_to_end(&mut buf);
                        buf
                    }
                    Err(_) => vec![b'\n'],
                }
            }
            None => vec![b'\n'],
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.inner
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl<M: MemoryDevice> MemoryDevice for ConsoleMemory<M> {
    fn max_address(&self) -> u32 {
        self.inner.max_address()
    }

    fn read(&mut self, address: u16) -> Result<u8, MemoryError> {
        if Some(address) == self.char_in {
            let byte = self.input.pop_front().unwrap_or(b'\n');
            self.inner.set(address, byte);
            log::trace!("console: charIn yielded 0x{:02X}", byte);
        }
        self.inner.read(address)
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), MemoryError> {
        let result = self.inner.write(address, value);
        if Some(address) == self.char_out {
            self.output.push(value);
            log::trace!("console: charOut emitted 0x{:02X}", value);
        }
        result
    }

    fn get(&self, address: u16) -> u8 {
        self.inner.get(address)
    }

    fn set(&mut self, address: u16, value: u8) {
        self.inner.set(address, value)
    }

    fn bytes_read(&self) -> &BTreeSet<u16> {
        self.inner.bytes_read()
    }

    fn bytes_written(&self) -> &BTreeSet<u16> {
        self.inner.bytes_written()
    }

    fn bytes_set(&self) -> &BTreeSet<u16> {
        self.inner.bytes_set()
    }

    fn clear(&mut self) {
        self.inner.clear()
    }

    fn had_error(&self) -> bool {
        self.inner.had_error()
    }

    fn error_message(&self) -> Option<&str> {
        self.inner.error_message()
    }

    fn begin_cycle(&mut self) {
        self.inner.begin_cycle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pep9_memory::FlatMemory;

    #[test]
    fn write_to_char_out_is_captured() {
        let mut mem = ConsoleMemory::new(FlatMemory::new(), None, Some(0x10), Vec::new());
        mem.write(0x10, b'A').unwrap();
        mem.write(0x11, b'Z').unwrap();
        assert_eq!(mem.output(), &[b'A']);
    }

    #[test]
    fn read_from_char_in_drains_the_input_queue() {
        let mut mem = ConsoleMemory::new(FlatMemory::new(), Some(0x20), None, vec![b'h', b'i']);
        assert_eq!(mem.read(0x20).unwrap(), b'h');
        assert_eq!(mem.read(0x20).unwrap(), b'i');
        assert_eq!(mem.read(0x20).unwrap(), b'\n');
    }

    #[test]
    fn missing_input_file_degrades_to_newline() {
        assert_eq!(ConsoleMemory::<FlatMemory>::read_input_file(None), vec![b'\n']);
    }
}

//! `CacheMemory`: wraps an inner [`MemoryDevice`] with a configurable set-associative cache.
//!
//! The cache never stores data of its own — `inner` remains the single source of byte values —
//! it only tracks, per 16-bit address, whether a simulated access would have hit or missed, and
//! exposes that telemetry plus the evicted-entry stream a cache-visualisation widget would want.
//! This mirrors §4.6: address decomposition into `(tag, index, offset)`, pluggable per-line
//! replacement policy, and no-write-allocate on a write miss.

use crate::device::MemoryDevice;
use crate::error::MemoryError;
use crate::policy::{Kind, ReplacementPolicy};
use std::collections::BTreeSet;

/// One way (slot) of a cache line's tag state. The cache holds no data — only enough to decide
/// hit/miss and to report what was evicted.
#[derive(Debug, Clone, Copy, Default)]
struct Way {
    tag: Option<u32>,
    hits: u32,
}

struct Line {
    ways: Vec<Way>,
    policy: Box<dyn ReplacementPolicy>,
}

impl Line {
    fn new(associativity: usize, policy_kind: Kind) -> Self {
        Line { ways: vec![Way::default(); associativity], policy: policy_kind.build(associativity) }
    }
}

/// The outcome of one cache access, returned to callers that want to render a trace (a hit/miss
/// light, an eviction log entry) without re-deriving it from raw counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit { way: usize },
    /// A miss that filled a way without evicting any prior resident (the way was empty).
    MissFill { way: usize },
    /// A miss that evicted a previously resident tag.
    MissEvict { way: usize, evicted_tag: u32 },
    /// A write miss under no-write-allocate: recorded as a miss, but no tag state changes.
    WriteMissNoAllocate,
}

/// Aggregate hit/miss/eviction telemetry for the whole cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Address-width configuration: `tag_bits + index_bits + offset_bits` must equal 16 (one past
/// `⌈log₂ 0xFFFF⌉`), and `2^index_bits` must be at least `associativity`, per §4.6's resize rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub tag_bits: u8,
    pub index_bits: u8,
    pub offset_bits: u8,
    pub associativity: usize,
    pub policy: Kind,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), MemoryError> {
        let total = u32::from(self.tag_bits) + u32::from(self.index_bits) + u32::from(self.offset_bits);
        if total != 16 {
            return Err(MemoryError::BadCacheConfig(format!(
                "tag+index+offset bits must sum to 16, got {}",
                total
            )));
        }
        let lines = 1usize << self.index_bits;
        if lines < self.associativity {
            return Err(MemoryError::BadCacheConfig(format!(
                "2^index_bits ({}) must be >= associativity ({})",
                lines, self.associativity
            )));
        }
        if self.associativity == 0 {
            return Err(MemoryError::BadCacheConfig("associativity must be at least 1".into()));
        }
        Ok(())
    }

    fn num_lines(&self) -> usize {
        1usize << self.index_bits
    }

    /// Split a 16-bit address into `(tag, index, offset)` by this configuration's bit widths.
    fn decompose(&self, address: u16) -> (u32, usize, u32) {
        let addr = u32::from(address);
        let offset_mask = (1u32 << self.offset_bits) - 1;
        let index_mask = (1u32 << self.index_bits) - 1;
        let offset = addr & offset_mask;
        let index = (addr >> self.offset_bits) & index_mask;
        let tag = addr >> (self.offset_bits + self.index_bits);
        (tag, index as usize, offset)
    }
}

/// A [`MemoryDevice`] wrapping another one with a set-associative cache.
pub struct CacheMemory<D: MemoryDevice> {
    inner: D,
    config: CacheConfig,
    lines: Vec<Line>,
    stats: CacheStats,
    last_outcome: Option<AccessOutcome>,
}

impl<D: MemoryDevice> CacheMemory<D> {
    pub fn new(inner: D, config: CacheConfig) -> Result<Self, MemoryError> {
        config.validate()?;
        let lines = (0..config.num_lines()).map(|_| Line::new(config.associativity, config.policy)).collect();
        Ok(CacheMemory { inner, config, lines, stats: CacheStats::default(), last_outcome: None })
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn last_outcome(&self) -> Option<AccessOutcome> {
        self.last_outcome
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Resize the cache in place, rejecting the change per §4.6's rule if the new configuration
    /// is inconsistent. All cache state (tags, policy bookkeeping, stats) is discarded; the
    /// backing memory is untouched.
    pub fn resize(&mut self, config: CacheConfig) -> Result<(), MemoryError> {
        config.validate()?;
        self.lines = (0..config.num_lines()).map(|_| Line::new(config.associativity, config.policy)).collect();
        self.config = config;
        self.stats = CacheStats::default();
        self.last_outcome = None;
        log::debug!("cache: resized to {:?}", config);
        Ok(())
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    /// Perform a tag lookup/fill against the cache's tag state for `address`, allocating a way on
    /// miss. Shared by `read`; `write` calls the no-allocate variant instead.
    fn access_allocating(&mut self, address: u16) -> AccessOutcome {
        let (tag, index, _offset) = self.config.decompose(address);
        let line = &mut self.lines[index];
        if let Some(way) = line.ways.iter().position(|w| w.tag == Some(tag)) {
            line.ways[way].hits += 1;
            line.policy.reference(way);
            self.stats.hits += 1;
            return AccessOutcome::Hit { way };
        }

        self.stats.misses += 1;
        if let Some(way) = line.ways.iter().position(|w| w.tag.is_none()) {
            line.ways[way] = Way { tag: Some(tag), hits: 1 };
            line.policy.reference(way);
            return AccessOutcome::MissFill { way };
        }

        let victim = line.policy.evict();
        let evicted_tag = line.ways[victim].tag.unwrap_or(0);
        line.ways[victim] = Way { tag: Some(tag), hits: 1 };
        line.policy.reference(victim);
        self.stats.evictions += 1;
        AccessOutcome::MissEvict { way: victim, evicted_tag }
    }

    /// Record a hit/miss for `address` without allocating a way on miss, per the
    /// no-write-allocate default for writes.
    fn access_no_allocate(&mut self, address: u16) -> AccessOutcome {
        let (tag, index, _offset) = self.config.decompose(address);
        let line = &mut self.lines[index];
        if let Some(way) = line.ways.iter().position(|w| w.tag == Some(tag)) {
            line.ways[way].hits += 1;
            line.policy.reference(way);
            self.stats.hits += 1;
            return AccessOutcome::Hit { way };
        }
        self.stats.misses += 1;
        AccessOutcome::WriteMissNoAllocate
    }

    /// Preview what the next `n` accesses to `address` (all misses to distinct tags, worst case)
    /// would evict from its line, without mutating cache state.
    pub fn lookahead(&self, address: u16, n: usize) -> Vec<usize> {
        let (_, index, _) = self.config.decompose(address);
        self.lines[index].policy.lookahead(n)
    }

    pub fn clear_cache_state(&mut self) {
        for line in self.lines.iter_mut() {
            for way in line.ways.iter_mut() {
                *way = Way::default();
            }
            line.policy.clear(self.config.associativity);
        }
        self.stats = CacheStats::default();
        self.last_outcome = None;
    }
}

impl<D: MemoryDevice> MemoryDevice for CacheMemory<D> {
    fn max_address(&self) -> u32 {
        self.inner.max_address()
    }

    fn read(&mut self, address: u16) -> Result<u8, MemoryError> {
        let outcome = self.access_allocating(address);
        self.last_outcome = Some(outcome);
        self.inner.read(address)
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), MemoryError> {
        let outcome = self.access_no_allocate(address);
        self.last_outcome = Some(outcome);
        self.inner.write(address, value)
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
        self.inner.clear();
        self.clear_cache_state();
    }

    fn had_error(&self) -> bool {
        self.inner.had_error()
    }

    fn error_message(&self) -> Option<&str> {
        self.inner.error_message()
    }

    fn begin_cycle(&mut self) {
        self.inner.begin_cycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FlatMemory;

    fn config(policy: Kind) -> CacheConfig {
        // 16 lines, direct-mapped-by-default-but-2-way here: index=4 bits (16 lines), offset=2
        // bits (4-byte blocks), tag = remaining 10 bits.
        CacheConfig { tag_bits: 10, index_bits: 4, offset_bits: 2, associativity: 2, policy }
    }

    #[test]
    fn rejects_bit_widths_not_summing_to_sixteen() {
        let bad = CacheConfig { tag_bits: 10, index_bits: 4, offset_bits: 3, associativity: 2, policy: Kind::Lru };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rejects_associativity_exceeding_line_count() {
        let bad = CacheConfig { tag_bits: 14, index_bits: 1, offset_bits: 1, associativity: 4, policy: Kind::Lru };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn first_access_is_a_miss_fill() {
        let mut cache = CacheMemory::new(FlatMemory::new(), config(Kind::Lru)).unwrap();
        cache.read(0x10).unwrap();
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn repeated_access_is_a_hit() {
        let mut cache = CacheMemory::new(FlatMemory::new(), config(Kind::Lru)).unwrap();
        cache.read(0x10).unwrap();
        cache.read(0x10).unwrap();
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn filling_past_associativity_evicts() {
        let mut cache = CacheMemory::new(FlatMemory::new(), config(Kind::Lru)).unwrap();
        // offset_bits=2, index_bits=4: addresses 64 apart share index bits but differ in tag.
        cache.read(0x0000).unwrap();
        cache.read(0x0040).unwrap(); // same index, different tag: fills second way
        cache.read(0x0080).unwrap(); // same index again: associativity is 2, must evict
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn write_miss_does_not_allocate() {
        let mut cache = CacheMemory::new(FlatMemory::new(), config(Kind::Lru)).unwrap();
        cache.write(0x10, 0xFF).unwrap();
        assert_eq!(cache.stats().misses, 1);
        // Reading the same address afterward is still a miss: the write never allocated a way.
        cache.read(0x10).unwrap();
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn get_and_set_bypass_cache_accounting() {
        let mut cache = CacheMemory::new(FlatMemory::new(), config(Kind::Lru)).unwrap();
        cache.set(0x10, 0x42);
        assert_eq!(cache.get(0x10), 0x42);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn resize_clears_tag_state_and_stats() {
        let mut cache = CacheMemory::new(FlatMemory::new(), config(Kind::Lru)).unwrap();
        cache.read(0x10).unwrap();
        cache.resize(config(Kind::Fifo)).unwrap();
        assert_eq!(cache.stats(), CacheStats::default());
        cache.read(0x10).unwrap();
        assert_eq!(cache.stats().misses, 1); // re-fetched, no stale hit from before resize
    }
}

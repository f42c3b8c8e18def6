//! `MemoryArena`: injectable allocation accounting for containers.
//!
//! A container reserves against an arena handle when it allocates box
//! buffers and releases on drop. The default is a process-wide arena; a
//! per-container override is passed at construction, replacing ambient
//! global allocator state with an explicit handle.

use once_cell::sync::Lazy;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Accounting handle charged for every container buffer.
pub trait MemoryArena: Send + Sync + std::fmt::Debug {
    /// Charge `bytes` to this arena.
    fn reserve(&self, bytes: usize);
    /// Return `bytes` to this arena.
    fn release(&self, bytes: usize);
    /// Bytes currently outstanding.
    fn in_use(&self) -> usize;
}

/// Simple counting arena.
#[derive(Debug, Default)]
pub struct CountingArena {
    bytes: AtomicUsize,
    high_water: AtomicUsize,
}

impl CountingArena {
    pub fn new() -> Arc<Self> {
        Arc::new(CountingArena::default())
    }

    /// Largest number of bytes ever outstanding at once.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }
}

impl MemoryArena for CountingArena {
    fn reserve(&self, bytes: usize) {
        let now = self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.high_water.fetch_max(now, Ordering::Relaxed);
    }

    fn release(&self, bytes: usize) {
        self.bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn in_use(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }
}

static DEFAULT_ARENA: Lazy<Arc<CountingArena>> = Lazy::new(CountingArena::new);

/// The process-wide default arena used when a container does not override.
pub fn default_arena() -> Arc<dyn MemoryArena> {
    Arc::clone(&*DEFAULT_ARENA) as Arc<dyn MemoryArena>
}

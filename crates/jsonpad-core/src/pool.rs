//! Buffer pool: reusable text and byte buffers shared across writes.
//!
//! Buffers are checked out with [`BufferPool::rent`] and come back when the
//! returned [`Pooled`] guard is dropped, whether the write that used them
//! succeeded, failed, or unwound. Returned buffers are cleared; at most
//! `max_retained` idle buffers of each kind are kept, and buffers that grew
//! past `max_buffer_capacity` are dropped instead of retained.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::options::PoolConfig;

static SHARED: LazyLock<Arc<BufferPool>> =
    LazyLock::new(|| Arc::new(BufferPool::new(PoolConfig::default())));

/// A buffer type the pool knows how to store.
pub trait PoolItem: Default + sealed::Sealed {
    fn with_capacity(capacity: usize) -> Self;
    fn capacity(&self) -> usize;
    fn reset(&mut self);
    #[doc(hidden)]
    fn shelf(pool: &BufferPool) -> &Mutex<Vec<Self>>;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for String {}
    impl Sealed for Vec<u8> {}
}

impl PoolItem for String {
    fn with_capacity(capacity: usize) -> Self {
        String::with_capacity(capacity)
    }

    fn capacity(&self) -> usize {
        String::capacity(self)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn shelf(pool: &BufferPool) -> &Mutex<Vec<Self>> {
        &pool.chars
    }
}

impl PoolItem for Vec<u8> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn shelf(pool: &BufferPool) -> &Mutex<Vec<Self>> {
        &pool.bytes
    }
}

/// Counters describing pool activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub rented: u64,
    pub returned: u64,
    /// Rentals that had to allocate because no idle buffer was available.
    pub allocated: u64,
    /// Returns that dropped the buffer (pool full or buffer oversized).
    pub discarded: u64,
    pub idle_chars: usize,
    pub idle_bytes: usize,
}

/// A thread-safe pool of text and byte buffers.
pub struct BufferPool {
    config: PoolConfig,
    chars: Mutex<Vec<String>>,
    bytes: Mutex<Vec<Vec<u8>>>,
    rented: AtomicU64,
    returned: AtomicU64,
    allocated: AtomicU64,
    discarded: AtomicU64,
}

impl BufferPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            chars: Mutex::new(Vec::new()),
            bytes: Mutex::new(Vec::new()),
            rented: AtomicU64::new(0),
            returned: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// The process-wide pool, created with default limits on first use.
    pub fn shared() -> Arc<BufferPool> {
        Arc::clone(&SHARED)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check out a cleared buffer, allocating one if none is idle.
    pub fn rent<T: PoolItem>(&self) -> Pooled<'_, T> {
        self.rented.fetch_add(1, Ordering::Relaxed);
        let idle = T::shelf(self).lock().pop();
        let item = match idle {
            Some(item) => item,
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                T::with_capacity(self.config.char_buffer_size)
            }
        };
        Pooled {
            pool: self,
            item: Some(item),
        }
    }

    pub fn rent_chars(&self) -> Pooled<'_, String> {
        self.rent()
    }

    pub fn rent_bytes(&self) -> Pooled<'_, Vec<u8>> {
        self.rent()
    }

    fn give_back<T: PoolItem>(&self, mut item: T) {
        self.returned.fetch_add(1, Ordering::Relaxed);
        if item.capacity() > self.config.max_buffer_capacity {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(
                capacity = item.capacity(),
                max = self.config.max_buffer_capacity,
                "dropping oversized pooled buffer"
            );
            return;
        }
        item.reset();
        let mut shelf = T::shelf(self).lock();
        if shelf.len() < self.config.max_retained {
            shelf.push(item);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            rented: self.rented.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle_chars: self.chars.lock().len(),
            idle_bytes: self.bytes.lock().len(),
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A buffer on loan from a [`BufferPool`]; returned on drop.
pub struct Pooled<'a, T: PoolItem> {
    pool: &'a BufferPool,
    item: Option<T>,
}

impl<T: PoolItem> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` takes the item.
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: PoolItem> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: PoolItem> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.give_back(item);
        }
    }
}

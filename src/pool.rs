//! Bounded pool of reusable, fixed-size transfer blocks.
//!
//! The pool carves one large backing allocation into disjoint fixed-size
//! blocks at startup and hands them out as owned [`BytesMut`] views. Memory
//! locality comes from the single allocation; ownership discipline comes from
//! the queue: a block is either in flight with exactly one session or sitting
//! in the pool, never both.
//!
//! Only the initial [`acquire`](BlockPool::acquire) of a session may suspend.
//! Everything the hot path touches afterwards, [`exchange`](BlockPool::exchange)
//! and the `try_` variants, returns immediately, so a transfer loop can only
//! ever stall on the socket itself.

use crate::{Error, Result};
use bytes::BytesMut;
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// One fixed-length, disjoint view into the pool's backing allocation.
pub type Block = BytesMut;

/// Why a non-blocking acquire returned no block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryAcquireError {
    /// Every block is currently in flight. The caller should reuse its
    /// current block and count a repeat.
    Empty,
    /// The pool has been closed; the session should end cleanly.
    Closed,
}

impl std::fmt::Display for TryAcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TryAcquireError::Empty => write!(f, "no block available"),
            TryAcquireError::Closed => write!(f, "pool closed"),
        }
    }
}

impl std::error::Error for TryAcquireError {}

/// Outcome of [`BlockPool::exchange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// The used block went back into the queue and a fresh one replaced it.
    Swapped,
    /// The queue was full: the used block was discarded, but a fresh one
    /// still replaced it. The caller counts a drop.
    Dropped,
    /// The block was refused and nothing else was queued; the caller keeps
    /// its current block and counts a repeat.
    Repeated,
    /// The pool has been closed; the session should end cleanly.
    Closed,
}

struct PoolState {
    queue: VecDeque<Block>,
    closed: bool,
}

/// A fixed set of fixed-size memory blocks exposed as a bounded FIFO queue.
///
/// Created once, sized to `total_bytes / chunk_size` blocks, never resized.
/// Shared across sessions behind an `Arc` on the server side.
///
/// # Examples
///
/// ```
/// use netgauge::pool::BlockPool;
///
/// # #[tokio::main]
/// # async fn main() {
/// let pool = BlockPool::new(64 * 1024, 16 * 1024).unwrap();
/// assert_eq!(pool.capacity(), 4);
///
/// let block = pool.acquire().await.unwrap();
/// assert_eq!(block.len(), 16 * 1024);
/// assert_eq!(pool.available(), 3);
///
/// assert!(pool.try_release(block));
/// assert_eq!(pool.available(), 4);
/// # }
/// ```
pub struct BlockPool {
    state: Mutex<PoolState>,
    notify: Notify,
    capacity: usize,
    chunk_size: usize,
}

impl BlockPool {
    /// Creates a pool backed by one allocation of `total_bytes`, carved into
    /// `total_bytes / chunk_size` blocks of `chunk_size` bytes each. A
    /// remainder smaller than one chunk is not allocated.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `chunk_size` is zero or larger
    /// than `total_bytes`.
    pub fn new(total_bytes: usize, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be non-zero".to_string()));
        }
        let count = total_bytes / chunk_size;
        if count == 0 {
            return Err(Error::Config(format!(
                "buffer size {} too small for chunk size {}",
                total_bytes, chunk_size
            )));
        }

        let mut arena = BytesMut::zeroed(count * chunk_size);
        let mut queue = VecDeque::with_capacity(count);
        for _ in 0..count {
            queue.push_back(arena.split_to(chunk_size));
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                queue,
                closed: false,
            }),
            notify: Notify::new(),
            capacity: count,
            chunk_size,
        })
    }

    /// Fills every currently available block with random bytes.
    ///
    /// Called once before a sending role starts so the wire carries
    /// incompressible data. Payload content is otherwise irrelevant.
    pub fn randomize(&self) {
        let mut rng = rand::thread_rng();
        let mut state = self.state.lock();
        for block in state.queue.iter_mut() {
            rng.fill_bytes(block);
        }
    }

    /// Waits until a block is available and returns ownership of it.
    ///
    /// Used once per session to obtain the starting block. Returns `None`
    /// once the pool has been closed, the clean-termination signal.
    pub async fn acquire(&self) -> Option<Block> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(block) = state.queue.pop_front() {
                    return Some(block);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Attempts to obtain a fresh block without blocking.
    pub fn try_acquire(&self) -> std::result::Result<Block, TryAcquireError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TryAcquireError::Closed);
        }
        state.queue.pop_front().ok_or(TryAcquireError::Empty)
    }

    /// Trades the just-used block for the next one, without blocking.
    ///
    /// The used block is returned to the queue first, then the front of the
    /// queue is taken as its replacement, both under one lock so no other
    /// session can slip between the two steps. A single-block pool therefore
    /// cycles its one block through the queue instead of repeating it. When
    /// the queue is at capacity the used block is discarded and the swap
    /// still happens; only a refused block with an empty queue leaves the
    /// caller holding what it already had.
    pub fn exchange(&self, block: &mut Block) -> Exchange {
        let mut state = self.state.lock();
        if state.closed {
            return Exchange::Closed;
        }
        let released = block.len() == self.chunk_size && state.queue.len() < self.capacity;
        if released {
            let used = std::mem::replace(block, BytesMut::new());
            state.queue.push_back(used);
        }
        match state.queue.pop_front() {
            Some(next) => {
                *block = next;
                if released {
                    Exchange::Swapped
                } else {
                    Exchange::Dropped
                }
            }
            // Only reachable when the release was refused.
            None => Exchange::Repeated,
        }
    }

    /// Attempts to return a block to the pool without blocking.
    ///
    /// Returns `false` when the queue is at capacity (or the pool is
    /// closed); the block is discarded and the caller counts a drop.
    /// Only blocks of this pool's chunk size are accepted back.
    pub fn try_release(&self, block: Block) -> bool {
        if block.len() != self.chunk_size {
            return false;
        }
        {
            let mut state = self.state.lock();
            if state.closed || state.queue.len() >= self.capacity {
                return false;
            }
            state.queue.push_back(block);
        }
        self.notify.notify_one();
        true
    }

    /// Closes the pool: pending and future acquires observe the closed
    /// state and terminate their sessions cleanly. Remaining blocks are
    /// discarded.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.queue.clear();
        }
        self.notify.notify_waiters();
    }

    /// Total number of blocks carved at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of every block in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of blocks currently available for acquisition.
    pub fn available(&self) -> usize {
        self.state.lock().queue.len()
    }
}

// ── Frame sequence numbers ──

use std::sync::atomic::{AtomicU32, Ordering};

/// 32-bit counter stamped on every outbound sub-device frame.
///
/// Starts at 1 and wraps. One counter is shared by every device the
/// owning gateway talks to.
#[derive(Debug)]
pub struct SequenceCounter {
    next: AtomicU32,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl SequenceCounter {
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Take the next value.
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

use super::{normalize, slot, ChannelWriter, Frame, Universe};

/// Pending writes to a [Universe], flushed once when the batch ends
///
/// The batch holds the universe mutably, so nothing else can write to it or flush it until the
/// batch is committed, discarded or dropped. Dropping the batch commits it, except while
/// unwinding from a panic where the pending writes are dropped.
#[must_use = "writes are committed when the batch is dropped"]
pub struct Batch<'u> {
    universe: &'u mut Universe,
    pending: Vec<(u16, u8)>,
    done: bool,
}

impl<'u> Batch<'u> {
    pub(super) fn new(universe: &'u mut Universe) -> Self {
        Self {
            universe,
            pending: Vec::new(),
            done: false,
        }
    }

    /// Queue a write, clamped to `0..=255`
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not in `1..=512`.
    pub fn set_channel(&mut self, channel: u16, value: i32) {
        slot(channel);
        self.pending.push((channel, normalize(value)));
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply the queued writes in order and flush once
    pub fn commit(mut self) -> Frame {
        self.done = true;
        self.apply()
    }

    /// Drop the queued writes without flushing
    pub fn discard(mut self) {
        self.done = true;
        self.clear();
    }

    fn apply(&mut self) -> Frame {
        for (channel, value) in self.pending.drain(..) {
            self.universe.write(channel, value);
        }

        self.universe.flush()
    }

    fn clear(&mut self) {
        if !self.pending.is_empty() {
            debug!(writes = %self.pending.len(), "discarding batch");
        }

        self.pending.clear();
    }
}

impl ChannelWriter for Batch<'_> {
    fn set_channel(&mut self, channel: u16, value: i32) {
        Batch::set_channel(self, channel, value)
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        if std::thread::panicking() {
            self.clear();
        } else {
            self.apply();
        }
    }
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("pending", &self.pending.len())
            .finish()
    }
}

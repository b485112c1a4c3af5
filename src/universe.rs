//! In-memory state of a DMX universe
//!
//! The [Universe] owns the 512 channel values. Every flush publishes an immutable [Frame] on a
//! watch channel, which is where the scheduler picks up the latest state: writers and the link
//! never share the mutable buffer.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::{
    dmx::{MAX_CHANNEL, UNIVERSE_SIZE},
    fixture::Fixture,
};

mod batch;
pub use batch::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("fixture {fixture}: channel {channel} is outside of the universe")]
    AddressOutOfRange { fixture: String, channel: u32 },
    #[error("fixture {0} is already patched")]
    AlreadyPatched(String),
}

/// Receiving end of the frames published by a [Universe]
pub type FrameReceiver = watch::Receiver<Frame>;

/// Immutable snapshot of the channel values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    generation: u64,
    data: Arc<[u8; UNIVERSE_SIZE]>,
}

impl Frame {
    /// Number of flushes that led to this frame
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn data(&self) -> &[u8; UNIVERSE_SIZE] {
        &self.data
    }

    pub fn channel(&self, channel: u16) -> u8 {
        self.data[slot(channel)]
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            generation: 0,
            data: Arc::new([0; UNIVERSE_SIZE]),
        }
    }
}

/// Something channel values can be written to
pub trait ChannelWriter {
    /// Write `value`, clamped to `0..=255`, to `channel`
    ///
    /// # Panics
    ///
    /// Implementations panic if `channel` is not in `1..=512`.
    fn set_channel(&mut self, channel: u16, value: i32);
}

/// Clamp a control value to the range of a DMX slot
pub fn normalize(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Buffer index of a 1-based channel
fn slot(channel: u16) -> usize {
    assert!(
        (1..=MAX_CHANNEL).contains(&channel),
        "DMX channel {} is not in 1..={}",
        channel,
        MAX_CHANNEL
    );

    channel as usize - 1
}

pub struct Universe {
    data: [u8; UNIVERSE_SIZE],
    generation: u64,
    fixtures: Vec<Fixture>,
    tx: watch::Sender<Frame>,
}

impl Universe {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Frame::default());

        Self {
            data: [0; UNIVERSE_SIZE],
            generation: 0,
            fixtures: Vec::new(),
            tx,
        }
    }

    /// Receiver for the frames published by [Universe::flush]
    pub fn subscribe(&self) -> FrameReceiver {
        self.tx.subscribe()
    }

    /// Current value of `channel`, including unflushed writes
    pub fn channel(&self, channel: u16) -> u8 {
        self.data[slot(channel)]
    }

    /// Number of frames published so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last published frame
    pub fn snapshot(&self) -> Frame {
        self.tx.borrow().clone()
    }

    /// Write `value`, clamped to `0..=255`, to `channel` and flush
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not in `1..=512`.
    pub fn set_channel(&mut self, channel: u16, value: i32) {
        self.write(channel, normalize(value));
        self.flush();
    }

    /// Publish the current buffer as a new frame. Does not wait for the frame to be sent.
    pub fn flush(&mut self) -> Frame {
        self.generation += 1;

        let frame = Frame {
            generation: self.generation,
            data: Arc::new(self.data),
        };

        trace!(generation = %frame.generation, "flush");
        self.tx.send_replace(frame.clone());
        frame
    }

    /// Start a batch: writes made through the returned guard are applied and flushed once, when
    /// the guard goes out of scope
    pub fn batch(&mut self) -> Batch<'_> {
        Batch::new(self)
    }

    /// Run `f` in a batch, committing it if `f` succeeds and discarding it otherwise
    pub fn batched<T, E>(
        &mut self,
        f: impl FnOnce(&mut Batch<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut batch = self.batch();

        match f(&mut batch) {
            Ok(value) => {
                batch.commit();
                Ok(value)
            }
            Err(error) => {
                batch.discard();
                Err(error)
            }
        }
    }

    /// Set all channels to zero, with a single flush
    pub fn blackout(&mut self) -> Frame {
        self.data = [0; UNIVERSE_SIZE];
        self.flush()
    }

    /// Attach a fixture to this universe, checking that all its channels fit
    pub fn patch(&mut self, fixture: Fixture) -> Result<(), PatchError> {
        let address = fixture.address() as u32;
        if address == 0 || address > MAX_CHANNEL as u32 {
            return Err(PatchError::AddressOutOfRange {
                fixture: fixture.name().to_owned(),
                channel: address,
            });
        }

        // First absolute channel past the end of the universe
        let overflow = fixture
            .spec()
            .functions()
            .iter()
            .map(|f| address + f.channel() as u32)
            .filter(|&channel| channel > MAX_CHANNEL as u32)
            .min();

        if let Some(channel) = overflow {
            return Err(PatchError::AddressOutOfRange {
                fixture: fixture.name().to_owned(),
                channel,
            });
        }

        if self.fixture(fixture.name()).is_some() {
            return Err(PatchError::AlreadyPatched(fixture.name().to_owned()));
        }

        let channels = fixture.channels_in_use();
        for other in &self.fixtures {
            if other
                .channels_in_use()
                .iter()
                .any(|channel| channels.binary_search(channel).is_ok())
            {
                warn!(
                    fixture = %fixture.name(),
                    other = %other.name(),
                    "fixtures share channels"
                );
            }
        }

        debug!(
            fixture = %fixture.name(),
            model = %fixture.spec().model(),
            address = %fixture.address(),
            "patched"
        );

        self.fixtures.push(fixture);
        Ok(())
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    pub fn fixture(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.name() == name)
    }

    fn write(&mut self, channel: u16, value: u8) {
        self.data[slot(channel)] = value;
    }
}

impl ChannelWriter for Universe {
    fn set_channel(&mut self, channel: u16, value: i32) {
        Universe::set_channel(self, channel, value)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Universe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Universe")
            .field("generation", &self.generation)
            .field("fixtures", &self.fixtures.len())
            .finish()
    }
}

//! DMX512 protocol constants

use std::time::Duration;

/// Number of channels in a universe
pub const UNIVERSE_SIZE: usize = 512;

/// Highest valid channel index (channels are 1-based)
pub const MAX_CHANNEL: u16 = UNIVERSE_SIZE as u16;

/// Start code for standard dimmer data
pub const START_CODE: u8 = 0x00;

/// Start code followed by the channel data
pub const PACKET_LEN: usize = 1 + UNIVERSE_SIZE;

/// Line speed of the DMX512 link
pub const BAUD_RATE: u32 = 250_000;

/// Bits on the wire per slot: 1 start bit, 8 data bits, 2 stop bits
pub const BITS_PER_SLOT: u32 = 11;

/// Minimum break before a packet
pub const MIN_BREAK_TIME: Duration = Duration::from_micros(92);

/// Minimum mark-after-break before the start code
pub const MIN_MARK_AFTER_BREAK: Duration = Duration::from_micros(12);

/// Highest refresh rate a full 512-slot packet allows
pub const MAX_REFRESH_RATE: f64 = 44.0;

/// Time needed to shift a full packet out at [BAUD_RATE], break and MAB excluded
pub fn slots_time() -> Duration {
    Duration::from_micros(PACKET_LEN as u64 * BITS_PER_SLOT as u64 * 1_000_000 / BAUD_RATE as u64)
}

/// Nominal time to transmit one frame with the given line timings
pub fn frame_time(break_time: Duration, mark_after_break: Duration) -> Duration {
    break_time + mark_after_break + slots_time()
}

use std::fmt::Write;

use super::Packet;
use crate::models::PacketFormat;

/// Append a text rendering of `packet` to `buf`
pub fn format_packet(buf: &mut String, format: PacketFormat, packet: &Packet) -> std::fmt::Result {
    write!(buf, "#{} ", packet.generation())?;

    match format {
        PacketFormat::Levels => {
            buf.push('[');

            let mut first = true;
            for (i, value) in packet.channels().iter().enumerate() {
                if *value == 0 {
                    continue;
                }

                if !first {
                    buf.push(' ');
                }
                first = false;

                write!(buf, "{}={}", i + 1, value)?;
            }

            buf.push(']');
        }

        PacketFormat::Hex => {
            buf.push_str(&hex::encode(&packet.as_bytes()[..]));
        }
    }

    Ok(())
}

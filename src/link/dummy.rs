use async_trait::async_trait;

use super::{common::format_packet, LinkError, Packet, Transport};
use crate::{dmx::UNIVERSE_SIZE, models};

/// Logs packets instead of sending them
pub struct DummyLink {
    format: models::PacketFormat,
    changes_only: bool,
    last: Option<[u8; UNIVERSE_SIZE]>,
    buf: String,
}

impl DummyLink {
    pub fn new(config: models::Dummy) -> Self {
        Self {
            format: config.format,
            changes_only: config.changes_only,
            last: None,
            buf: String::new(),
        }
    }
}

#[async_trait]
impl Transport for DummyLink {
    async fn send(&mut self, packet: &Packet) -> Result<(), LinkError> {
        if self.changes_only && self.last.as_ref().map(|l| &l[..]) == Some(packet.channels()) {
            return Ok(());
        }

        let mut channels = [0; UNIVERSE_SIZE];
        channels.copy_from_slice(packet.channels());
        self.last = Some(channels);

        self.buf.clear();
        format_packet(&mut self.buf, self.format, packet)?;
        info!("{}", &self.buf);

        Ok(())
    }
}

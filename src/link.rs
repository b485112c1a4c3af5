use async_trait::async_trait;
use thiserror::Error;

use crate::{
    dmx::{PACKET_LEN, START_CODE},
    models::{self, LinkConfig},
    universe::Frame,
};

mod common;

// Transport implementation modules

mod dummy;
mod file;
mod serial;

pub use serial::available_ports;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("format error: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("transmission task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("link is closed")]
    Closed,
}

/// Wire image of a frame: start code followed by the 512 channel values
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    generation: u64,
    bytes: [u8; PACKET_LEN],
}

impl Packet {
    pub fn encode(frame: &Frame) -> Self {
        let mut bytes = [0; PACKET_LEN];
        bytes[0] = START_CODE;
        bytes[1..].copy_from_slice(frame.data());

        Self {
            generation: frame.generation(),
            bytes,
        }
    }

    /// Generation of the encoded frame
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.bytes
    }

    pub fn start_code(&self) -> u8 {
        self.bytes[0]
    }

    pub fn channels(&self) -> &[u8] {
        &self.bytes[1..]
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("generation", &self.generation)
            .field("start_code", &self.start_code())
            .finish()
    }
}

/// Physical side of a link
#[async_trait]
pub trait Transport: Send {
    /// Put one packet on the wire, including any required line signalling
    ///
    /// Errors are reported as-is: retrying is up to the caller.
    async fn send(&mut self, packet: &Packet) -> Result<(), LinkError>;

    /// Release the underlying connection
    async fn close(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

/// Framer over a [Transport]
pub struct Link {
    name: String,
    inner: Box<dyn Transport>,
    frame_time: std::time::Duration,
    closed: bool,
}

impl Link {
    fn build_inner(config: models::Link) -> Result<Box<dyn Transport>, LinkError> {
        let inner: Box<dyn Transport>;
        match config {
            models::Link::Serial(serial) => {
                inner = Box::new(serial::SerialLink::new(serial)?);
            }
            models::Link::File(file) => {
                inner = Box::new(file::FileLink::new(file)?);
            }
            models::Link::Dummy(dummy) => {
                inner = Box::new(dummy::DummyLink::new(dummy));
            }
        }

        Ok(inner)
    }

    #[instrument(skip(config))]
    pub async fn new(config: models::Link) -> Result<Self, LinkError> {
        let name = format!(
            "{}:{}",
            <&'static str>::from(&config).to_lowercase(),
            config.target()
        );
        let frame_time = config.frame_time();
        let inner = Self::build_inner(config)?;

        info!(link = %name, frame_time = ?frame_time, "link open");
        Ok(Self {
            frame_time,
            ..Self::with_transport(name, inner)
        })
    }

    /// Create a link over a custom transport
    pub fn with_transport(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            inner: transport,
            frame_time: std::time::Duration::ZERO,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimum time one packet spends on the wire
    pub fn frame_time(&self) -> std::time::Duration {
        self.frame_time
    }

    /// Frame `frame` and send it
    pub async fn send(&mut self, frame: &Frame) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }

        let packet = Packet::encode(frame);
        self.inner.send(&packet).await
    }

    /// Close the transport. Later calls do nothing.
    #[instrument]
    pub async fn close(&mut self) -> Result<(), LinkError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }

        let result = self.inner.close().await;
        info!(link = %self.name, "link closed");
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").field("name", &self.name).finish()
    }
}

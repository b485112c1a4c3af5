use std::{io::Write, thread, time::Duration};

use async_trait::async_trait;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, StopBits};

use super::{LinkError, Packet, Transport};
use crate::{
    dmx,
    models::{self, LinkConfig},
};

/// Serial ports currently present on the system
pub fn available_ports() -> Result<Vec<SerialPortInfo>, LinkError> {
    Ok(serialport::available_ports()?)
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    break_time: Duration,
    mark_after_break: Duration,
}

/// Line signalling needed around a packet
trait Line: Write {
    fn assert_break(&mut self) -> Result<(), LinkError>;
    fn release_break(&mut self) -> Result<(), LinkError>;
}

impl Line for Box<dyn SerialPort> {
    fn assert_break(&mut self) -> Result<(), LinkError> {
        Ok(self.set_break()?)
    }

    fn release_break(&mut self) -> Result<(), LinkError> {
        Ok(self.clear_break()?)
    }
}

/// Break, mark-after-break, then the slots
fn write_packet<L: Line + ?Sized>(
    line: &mut L,
    timing: Timing,
    packet: &Packet,
) -> Result<(), LinkError> {
    line.assert_break()?;
    thread::sleep(timing.break_time);
    line.release_break()?;
    thread::sleep(timing.mark_after_break);

    line.write_all(&packet.as_bytes()[..])?;
    line.flush()?;

    Ok(())
}

/// USB-to-RS485 adapter driven at 250000 baud, 8N2
pub struct SerialLink {
    config: models::Serial,
    timing: Timing,
    port: Option<Box<dyn SerialPort>>,
    notified_error: bool,
}

impl SerialLink {
    pub fn new(config: models::Serial) -> Result<Self, LinkError> {
        let timing = Timing {
            break_time: config.break_time(),
            mark_after_break: config.mark_after_break(),
        };

        let port = Self::open(&config)?;

        Ok(Self {
            config,
            timing,
            port: Some(port),
            notified_error: false,
        })
    }

    fn open(config: &models::Serial) -> Result<Box<dyn SerialPort>, LinkError> {
        let port = serialport::new(config.path.as_str(), dmx::BAUD_RATE)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::Two)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(config.write_timeout())
            .open()?;

        info!(path = %config.path, "opened serial port");
        Ok(port)
    }

    fn take_port(&mut self) -> Result<Box<dyn SerialPort>, LinkError> {
        match self.port.take() {
            Some(port) => Ok(port),
            None => match Self::open(&self.config) {
                Ok(port) => {
                    self.notified_error = false;
                    Ok(port)
                }
                Err(err) => {
                    if !self.notified_error {
                        self.notified_error = true;
                        error!(error = %err, path = %self.config.path, "failed to reopen serial port");
                    }

                    Err(err)
                }
            },
        }
    }
}

#[async_trait]
impl Transport for SerialLink {
    async fn send(&mut self, packet: &Packet) -> Result<(), LinkError> {
        let mut port = self.take_port()?;
        let timing = self.timing;
        let packet = packet.clone();

        // Break timing needs a blocking thread
        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = write_packet(&mut port, timing, &packet);
            (port, result)
        })
        .await?;

        match result {
            Ok(()) => {
                self.port = Some(port);
                Ok(())
            }
            Err(err) => {
                // Reopened on the next send
                drop(port);
                Err(err)
            }
        }
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        if self.port.take().is_some() {
            info!(path = %self.config.path, "closed serial port");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::universe::Universe;

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Break(bool),
        Write(usize),
        Flush,
    }

    #[derive(Default)]
    struct MockLine {
        events: Vec<Event>,
        fail_writes: bool,
    }

    impl Write for MockLine {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "write timeout"));
            }

            self.events.push(Event::Write(buf.len()));
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.events.push(Event::Flush);
            Ok(())
        }
    }

    impl Line for MockLine {
        fn assert_break(&mut self) -> Result<(), LinkError> {
            self.events.push(Event::Break(true));
            Ok(())
        }

        fn release_break(&mut self) -> Result<(), LinkError> {
            self.events.push(Event::Break(false));
            Ok(())
        }
    }

    fn timing() -> Timing {
        Timing {
            break_time: dmx::MIN_BREAK_TIME,
            mark_after_break: dmx::MIN_MARK_AFTER_BREAK,
        }
    }

    #[test]
    fn break_precedes_packet() {
        let mut universe = Universe::new();
        universe.set_channel(1, 255);

        let mut line = MockLine::default();
        write_packet(&mut line, timing(), &Packet::encode(&universe.snapshot())).unwrap();

        assert_eq!(
            line.events,
            vec![
                Event::Break(true),
                Event::Break(false),
                Event::Write(dmx::PACKET_LEN),
                Event::Flush
            ]
        );
    }

    #[test]
    fn write_errors_are_reported() {
        let mut line = MockLine {
            fail_writes: true,
            ..Default::default()
        };

        let result = write_packet(&mut line, timing(), &Packet::encode(&Default::default()));
        assert!(matches!(result, Err(LinkError::Io(_))));
        assert_eq!(line.events, vec![Event::Break(true), Event::Break(false)]);
    }

    #[test]
    fn missing_port_fails_to_open() {
        let result = SerialLink::new(models::Serial::new("/dev/this-port-does-not-exist"));
        assert!(result.is_err());
    }
}

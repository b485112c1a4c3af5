use std::{fmt::Write, time};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{fs::File, io::AsyncWriteExt};

use super::{common::format_packet, LinkError, Packet, Transport};
use crate::models;

/// Appends one line per packet to a file
pub struct FileLink {
    format: models::PacketFormat,
    print_timestamp: bool,
    file_handle: File,
    last_write_time: time::Instant,
    str_buf: String,
}

impl FileLink {
    pub fn new(config: models::File) -> Result<Self, LinkError> {
        let file_handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            format: config.format,
            print_timestamp: config.print_time_stamp,
            file_handle: File::from_std(file_handle),
            last_write_time: time::Instant::now(),
            str_buf: String::new(),
        })
    }
}

#[async_trait]
impl Transport for FileLink {
    async fn send(&mut self, packet: &Packet) -> Result<(), LinkError> {
        self.str_buf.clear();

        if self.print_timestamp {
            // Prepend timestamp
            let now = Utc::now();
            let elapsed_time_ms = self.last_write_time.elapsed().as_millis();
            self.last_write_time = time::Instant::now();

            write!(self.str_buf, "{} | +{} | ", now, elapsed_time_ms)?;
        }

        format_packet(&mut self.str_buf, self.format, packet)?;
        writeln!(self.str_buf)?;

        self.file_handle.write_all(self.str_buf.as_bytes()).await?;
        self.file_handle.flush().await?;

        Ok(())
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        self.file_handle.flush().await?;
        self.file_handle.sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Universe;

    #[tokio::test]
    async fn writes_one_line_per_packet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dmx.log");

        let mut link = FileLink::new(models::File {
            path: path.to_string_lossy().into_owned(),
            format: models::PacketFormat::Levels,
            print_time_stamp: false,
        })
        .unwrap();

        let mut universe = Universe::new();
        universe.set_channel(2, 20);
        link.send(&Packet::encode(&universe.snapshot())).await.unwrap();
        universe.set_channel(3, 30);
        link.send(&Packet::encode(&universe.snapshot())).await.unwrap();
        link.close().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines, vec!["#1 [2=20]", "#2 [2=20 3=30]"]);
    }

    #[tokio::test]
    async fn missing_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileLink::new(models::File {
            path: dir
                .path()
                .join("missing")
                .join("dmx.log")
                .to_string_lossy()
                .into_owned(),
            format: Default::default(),
            print_time_stamp: true,
        });

        assert!(matches!(result, Err(LinkError::Io(_))));
    }
}

use std::time::Duration;

use ambassador::{delegatable_trait, Delegate};
use derive_more::From;
use serde_derive::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use validator::Validate;

use crate::dmx;

#[delegatable_trait]
pub trait LinkConfig: Sync + Send {
    /// Human-readable target of the link, for logs
    fn target(&self) -> &str;

    fn break_time(&self) -> Duration {
        dmx::MIN_BREAK_TIME
    }

    fn mark_after_break(&self) -> Duration {
        dmx::MIN_MARK_AFTER_BREAK
    }

    /// Time the link needs to put one packet on the wire
    fn frame_time(&self) -> Duration {
        Duration::ZERO
    }
}

fn default_break_time_us() -> u32 {
    120
}

fn default_mark_after_break_us() -> u32 {
    16
}

fn default_write_timeout_ms() -> u32 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Serial {
    #[validate(length(min = 1))]
    pub path: String,
    #[serde(default = "default_break_time_us")]
    #[validate(range(min = 92))]
    pub break_time_us: u32,
    #[serde(default = "default_mark_after_break_us")]
    #[validate(range(min = 12))]
    pub mark_after_break_us: u32,
    #[serde(default = "default_write_timeout_ms")]
    #[validate(range(min = 30))]
    pub write_timeout_ms: u32,
}

impl Serial {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            break_time_us: default_break_time_us(),
            mark_after_break_us: default_mark_after_break_us(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms as _)
    }
}

impl LinkConfig for Serial {
    fn target(&self) -> &str {
        &self.path
    }

    fn break_time(&self) -> Duration {
        Duration::from_micros(self.break_time_us as _)
    }

    fn mark_after_break(&self) -> Duration {
        Duration::from_micros(self.mark_after_break_us as _)
    }

    fn frame_time(&self) -> Duration {
        dmx::frame_time(self.break_time(), self.mark_after_break())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketFormat {
    /// Only the channels holding a non-zero value
    Levels,
    /// Full packet as hexadecimal
    Hex,
}

impl Default for PacketFormat {
    fn default() -> Self {
        Self::Levels
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct File {
    #[validate(length(min = 1))]
    pub path: String,
    #[serde(default)]
    pub format: PacketFormat,
    #[serde(default)]
    pub print_time_stamp: bool,
}

impl LinkConfig for File {
    fn target(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Dummy {
    pub format: PacketFormat,
    /// Log only packets that differ from the previous one
    pub changes_only: bool,
}

impl Default for Dummy {
    fn default() -> Self {
        Self {
            format: Default::default(),
            changes_only: true,
        }
    }
}

impl LinkConfig for Dummy {
    fn target(&self) -> &str {
        "log"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr, Delegate, From)]
#[serde(rename_all = "lowercase", tag = "type", deny_unknown_fields)]
#[delegate(LinkConfig)]
pub enum Link {
    Serial(Serial),
    File(File),
    Dummy(Dummy),
}

impl Default for Link {
    fn default() -> Self {
        Self::Dummy(Dummy::default())
    }
}

impl Validate for Link {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Link::Serial(link) => link.validate(),
            Link::File(link) => link.validate(),
            Link::Dummy(link) => link.validate(),
        }
    }
}

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds since midnight of the service day. GTFS trips running past midnight keep counting
/// upwards (25:10:00 is 10 past 1am the next morning), so this never wraps around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(u32);

impl Time {
    pub const START_OF_DAY: Time = Time(0);

    pub fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub fn inner_seconds(self) -> u32 {
        self.0
    }

    /// Parses HH:MM:SS, where the hour may exceed 23. Single-digit hours (" 8:05:00") are
    /// accepted, since plenty of feeds produce them.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        if parts.len() != 3 {
            bail!("Time {raw:?} isn't HH:MM:SS");
        }
        let hours: u32 = parts[0]
            .parse()
            .map_err(|_| anyhow!("Time {raw:?} has a bad hour"))?;
        let minutes: u32 = parts[1]
            .parse()
            .map_err(|_| anyhow!("Time {raw:?} has bad minutes"))?;
        let seconds: u32 = parts[2]
            .parse()
            .map_err(|_| anyhow!("Time {raw:?} has bad seconds"))?;
        if minutes >= 60 || seconds >= 60 {
            bail!("Time {raw:?} is out of range");
        }
        match hours
            .checked_mul(3600)
            .and_then(|x| x.checked_add(minutes * 60 + seconds))
        {
            Some(total) => Ok(Self(total)),
            None => bail!("Time {raw:?} is too far past midnight"),
        }
    }

    /// Shift by a signed number of seconds, stopping at midnight.
    pub fn offset(self, delta: i64) -> Self {
        Self((self.0 as i64).saturating_add(delta).clamp(0, u32::MAX as i64) as u32)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0 / 3600,
            (self.0 % 3600) / 60,
            self.0 % 60
        )
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String>::deserialize(deserializer)?;
        Time::parse(&raw).map_err(serde::de::Error::custom)
    }
}

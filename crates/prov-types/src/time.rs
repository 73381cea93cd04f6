use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Wall-clock timestamp in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeMs(pub u64);

impl TimeMs {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis().max(0) as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, TypeError> {
        let millis = i64::try_from(self.0).map_err(|_| TypeError::InvalidTime(i64::MAX))?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or(TypeError::InvalidTime(millis))
    }
}

impl fmt::Display for TimeMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Ok(dt) => write!(f, "{}", dt.to_rfc3339()),
            Err(_) => write!(f, "{}ms", self.0),
        }
    }
}

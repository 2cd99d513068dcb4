// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write concern settings attached to every write-class command.

use crate::core::error::ConfigurationError;
use crate::core::util::parse_duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Write concern as written in configuration, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConcernConfig {
    /// Acknowledgment: a node count, `majority` or a tag set name
    pub w: String,
    /// Require journal acknowledgment
    pub j: bool,
    /// Acknowledgment timeout, e.g. `500ms` or `1m30s`
    pub w_timeout: String,
}

impl WriteConcernConfig {
    pub fn resolve(&self) -> Result<WriteConcern, ConfigurationError> {
        WriteConcern::parse(&self.w, self.j, &self.w_timeout)
    }
}

/// Required acknowledgment level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgment {
    Nodes(u32),
    Majority,
    /// Named tag set configured on the replica set
    Tag(String),
}

impl fmt::Display for Acknowledgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acknowledgment::Nodes(n) => write!(f, "{}", n),
            Acknowledgment::Majority => write!(f, "majority"),
            Acknowledgment::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

/// Validated write concern
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteConcern {
    /// `None` leaves the server default in place
    pub acknowledgment: Option<Acknowledgment>,
    pub journal: bool,
    pub timeout: Option<Duration>,
}

impl WriteConcern {
    pub fn parse(w: &str, j: bool, w_timeout: &str) -> Result<Self, ConfigurationError> {
        let w = w.trim();
        let acknowledgment = if w.is_empty() {
            None
        } else if w.eq_ignore_ascii_case("majority") {
            Some(Acknowledgment::Majority)
        } else if let Ok(n) = w.parse::<i64>() {
            if n < 0 {
                return Err(ConfigurationError::write_concern(format!(
                    "w must not be negative, got {}",
                    n
                )));
            }
            let n = u32::try_from(n).map_err(|_| {
                ConfigurationError::write_concern(format!("w is out of range: {}", n))
            })?;
            Some(Acknowledgment::Nodes(n))
        } else {
            Some(Acknowledgment::Tag(w.to_string()))
        };

        let w_timeout = w_timeout.trim();
        let timeout = if w_timeout.is_empty() {
            None
        } else {
            Some(parse_duration(w_timeout).map_err(|e| {
                ConfigurationError::write_concern(format!("invalid w_timeout: {}", e))
            })?)
        };

        Ok(Self {
            acknowledgment,
            journal: j,
            timeout,
        })
    }

    /// True when nothing overrides the server default
    pub fn is_default(&self) -> bool {
        self.acknowledgment.is_none() && !self.journal && self.timeout.is_none()
    }
}

impl fmt::Display for WriteConcern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.acknowledgment {
            Some(ack) => write!(f, "w={}", ack)?,
            None => write!(f, "w=default")?,
        }
        write!(f, " j={}", self.journal)?;
        if let Some(timeout) = self.timeout {
            write!(f, " wtimeout={}ms", timeout.as_millis())?;
        }
        Ok(())
    }
}

//! Network address of a cluster member.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host and port of a cluster member.
///
/// Addresses identify members for routing purposes; equality is textual,
/// no DNS resolution happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Hostname or IP literal.
    pub host: String,
    /// Member port.
    pub port: u16,
}

impl Address {
    /// Create a new address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl std::str::FromStr for Address {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or("Address must be in format 'host:port'")?;
        if host.is_empty() {
            return Err("Host cannot be empty");
        }
        let port = port.parse::<u16>().map_err(|_| "Invalid port number")?;
        Ok(Self::new(host, port))
    }
}

//! Port-to-service-name lookup from an `/etc/services` style database.

use std::collections::HashMap;
use std::path::Path;

use crate::config::Proto;

/// Service names keyed by port and protocol.
#[derive(Debug, Clone, Default)]
pub struct ServiceNames {
    names: HashMap<(u16, Proto), String>,
}

impl ServiceNames {
    /// Parse the database text. Malformed lines are skipped; for a port
    /// listed twice the first name wins.
    pub fn parse(text: &str) -> Self {
        let mut names = HashMap::new();

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Some((port, proto)) = port_proto.split_once('/') else {
                continue;
            };
            let Ok(port) = port.parse::<u16>() else {
                continue;
            };
            let proto = match proto {
                "tcp" => Proto::Tcp,
                "udp" => Proto::Udp,
                _ => continue,
            };
            names.entry((port, proto)).or_insert_with(|| name.to_string());
        }

        Self { names }
    }

    /// Load the database; an unreadable file yields an empty table.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no services database");
                Self::default()
            }
        }
    }

    pub fn lookup(&self, port: u16, proto: Proto) -> Option<&str> {
        self.names.get(&(port, proto)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

use std::{fmt, str::FromStr};

use crate::{errors::Error, Result};

/// Server part of an individual user's address.
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";

/// Server part of a group address.
pub const GROUP_SERVER: &str = "g.us";

/// Chat address (`user@server`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    /// Address of an individual user on the default server.
    pub fn user(user: impl Into<String>) -> Self {
        Self::new(user, DEFAULT_USER_SERVER)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let Some((user, server)) = raw.split_once('@') else {
            return Err(Error::InvalidJid(format!("{raw}: missing '@'")));
        };
        if user.is_empty() || server.is_empty() || server.contains('@') {
            return Err(Error::InvalidJid(raw.to_string()));
        }
        Ok(Self::new(user, server))
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

impl FromStr for Jid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Append the default user server to a bare id (`5511...` -> `5511...@s.whatsapp.net`).
///
/// Ids that already carry a server are returned unchanged.
pub fn normalize_jid(raw: &str) -> String {
    if raw.contains('@') {
        raw.to_string()
    } else {
        format!("{raw}@{DEFAULT_USER_SERVER}")
    }
}

/// One `monitorar` registration, kept for `listar_monitores`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Normalized sender address to watch for.
    pub target_user: String,
    /// Group address, as typed.
    pub group: String,
    pub reply: String,
}

/// Counters for one repeat-send run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendOutcome {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

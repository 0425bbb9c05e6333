use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their transport errors into this type so the dispatcher
/// and the binary can tell startup failures apart from per-command failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot create session directory {path}: {source}")]
    SessionDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session client init failed: {0}")]
    ClientInit(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("invalid address: {0}")]
    InvalidJid(String),

    #[error("not a group address: {0}")]
    NotAGroup(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Process exit code for errors that abort startup.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::SessionDir { .. } => 3,
            Error::ClientInit(_) => 4,
            Error::Connect(_) => 5,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

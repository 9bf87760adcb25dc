//! Tuner backend service sources.
//!
//! A source fetches the raw service list from one backend and normalizes it.
//! Fetching never touches the catalog, so a failed fetch leaves it as is.

mod edcb;
mod mirakurun;

pub use edcb::{EdcbSettingDirectory, EdcbSource};
pub use mirakurun::MirakurunSource;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use channel_catalog::{CanonicalService, EpgService};
use serde::Deserialize;
use thiserror::Error;

/// Default bound on a single backend fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Source error types.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {0}")]
    Status(u16),

    #[error("Backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Which backend a catalog is synchronized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Mirakurun,
    Edcb,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Mirakurun => "mirakurun",
            BackendKind::Edcb => "edcb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mirakurun" => Ok(BackendKind::Mirakurun),
            "edcb" => Ok(BackendKind::Edcb),
            other => Err(format!("unknown backend: {} (expected mirakurun or edcb)", other)),
        }
    }
}

/// One fetch worth of normalized services.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    /// In the order numbering must see them.
    pub services: Vec<CanonicalService>,
    /// Schedule-derived entries for remote control key lookup (EDCB only).
    pub epg_services: Vec<EpgService>,
}

/// A backend that can list its broadcast services.
#[async_trait]
pub trait ServiceSource: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn fetch(&self) -> Result<SourceSnapshot>;
}

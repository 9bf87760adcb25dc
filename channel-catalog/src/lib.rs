//! Channel identity and numbering rules for ISDB tuner backends.
//!
//! This crate turns the service lists reported by Mirakurun or EDCB into
//! catalog records with stable channel IDs, display channel numbers and
//! sub-channel flags. It does no I/O; fetching and persistence live in
//! `channel-catalog-server`.
//!
//! # Pipeline
//!
//! ```text
//! backend record -> normalize -> filter::accept -> NumberingState::number -> ResolvedChannel
//! ```
//!
//! - [`network_type`]: NID-based network family classification
//! - [`normalize`]: Mirakurun / ChSet5 record shapes
//! - [`filter`]: exclusion of non-watchable, defunct and test services
//! - [`numbering`]: channel number, remote control key and sub-channel rules
//!
//! # Example
//!
//! ```rust
//! use channel_catalog::normalize::MirakurunService;
//! use channel_catalog::numbering::{resolve_services, NumberingTables, RemoconFallback};
//!
//! let nhk = MirakurunService {
//!     service_type: Some(1),
//!     network_id: Some(0x7FE0),
//!     service_id: Some(1024),
//!     remote_control_key_id: Some(1),
//!     name: Some("ＮＨＫ総合１・東京".to_string()),
//!     ..Default::default()
//! };
//!
//! let services = vec![nhk.normalize().unwrap()];
//! let resolution = resolve_services(services, &RemoconFallback::Placeholder, &NumberingTables::default());
//!
//! let channel = &resolution.channels[0];
//! assert_eq!(channel.id, "NID32736-SID1024");
//! assert_eq!(channel.display_channel_id, "gr011");
//! assert_eq!(channel.name, "NHK総合1・東京");
//! assert!(!channel.is_subchannel);
//! ```

pub mod error;
pub mod filter;
pub mod network_type;
pub mod normalize;
pub mod numbering;
pub mod text;
pub mod types;

pub use error::NormalizeError;
pub use filter::{Candidate, Rejection};
pub use network_type::classify_network_id;
pub use normalize::{ChSet5Service, MirakurunService};
pub use numbering::{NumberingState, NumberingTables, RemoconFallback, Resolution};
pub use types::{CanonicalService, ChannelType, EpgService, ResolvedChannel};

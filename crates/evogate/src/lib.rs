//! evogate - async dispatch layer for self-hosted Evolution API WhatsApp
//! gateways.
//!
//! The library normalizes recipients, resolves media references, selects a
//! gateway instance, builds the per-kind request body, and interprets the
//! gateway's answer. Connection status and the group directory are cached
//! per instance with coalesced, explicitly triggered refreshes.

pub mod actions;
pub mod background;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod instance;
pub mod media;
pub mod target;
pub mod wire;

pub use actions::{
    Gateway, NumberStatus, SendAudio, SendContact, SendLocation, SendMedia, SendPoll,
    SendReaction, SendSticker, SendText,
};
pub use cache::{ConnectionSnapshot, ConnectionState, GroupDirectory, GroupSummary, StateCache};
pub use config::{Config, ConfigError, InstanceConfig};
pub use error::{DispatchResult, Error, ErrorKind, InstanceError, Refreshed, ResolutionError};
pub use instance::{InstanceHandle, InstanceRegistry};
pub use media::{MediaKind, MediaReference, MediaResolver, MediaSource, ResolvedMedia};
pub use target::Target;

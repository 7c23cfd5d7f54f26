//! Callable action surface.
//!
//! Each action validates caller input before any network call, normalizes
//! the recipient and media reference, selects the gateway instance, and
//! hands the built body to the dispatcher. Validation failures are
//! [`Error::Validation`] with a human-readable detail.

use std::sync::Arc;

use tracing::info;

use crate::cache::{ConnectionSnapshot, GroupDirectory};
use crate::config::Config;
use crate::dispatch;
use crate::error::{DispatchResult, Error, Refreshed};
use crate::instance::{InstanceHandle, InstanceRegistry};
use crate::media::{MediaKind, MediaResolver, MediaSource};
use crate::target::{Target, lookup_number};
use crate::wire::{
    AudioBody, ContactBody, ContactCard, LocationBody, MediaBody, MessageBody, MessageKey,
    MessageKind, PollBody, ReactionBody, StickerBody, TextBody, recipient_value,
};

// ============================================================================
// Action requests
// ============================================================================

#[derive(Debug, Clone)]
pub struct SendText {
    pub target: String,
    pub message: String,
    pub link_preview: bool,
    pub mention_all: bool,
    pub delay_ms: Option<u32>,
    pub instance: Option<String>,
}

impl SendText {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
            link_preview: true,
            mention_all: false,
            delay_ms: None,
            instance: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendMedia {
    pub target: String,
    /// Remote URL, absolute local path, or platform media-source URI.
    pub media: String,
    /// "image", "video", or "document".
    pub media_kind: String,
    pub caption: Option<String>,
    pub filename: Option<String>,
    pub delay_ms: Option<u32>,
    pub instance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendAudio {
    pub target: String,
    pub audio: String,
    pub delay_ms: Option<u32>,
    pub instance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendSticker {
    pub target: String,
    pub sticker: String,
    pub delay_ms: Option<u32>,
    pub instance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendLocation {
    pub target: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
    pub delay_ms: Option<u32>,
    pub instance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendContact {
    pub target: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
    pub contact_organization: Option<String>,
    pub instance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendReaction {
    pub target: String,
    pub message_id: String,
    /// Empty string removes a previously sent reaction.
    pub reaction: String,
    pub instance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendPoll {
    pub target: String,
    pub question: String,
    /// Comma-separated options, at least two after trimming.
    pub options: String,
    pub max_selections: u32,
    pub delay_ms: Option<u32>,
    pub instance: Option<String>,
}

/// One entry of a number-lookup result.
#[derive(Debug, Clone)]
pub struct NumberStatus {
    pub number: String,
    pub exists: bool,
    pub jid: Option<String>,
}

// ============================================================================
// Gateway
// ============================================================================

/// The callable surface over one or more gateway instances.
pub struct Gateway {
    registry: InstanceRegistry,
    media: MediaResolver,
}

impl Gateway {
    /// Build from validated configuration, without a platform media-source
    /// collaborator.
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_media_source(config, None)
    }

    /// Build from validated configuration with an optional platform
    /// media-source collaborator.
    pub fn with_media_source(
        config: &Config,
        source: Option<Arc<dyn MediaSource>>,
    ) -> Result<Self, Error> {
        Ok(Self {
            registry: InstanceRegistry::from_config(config)?,
            media: MediaResolver::new(source, config.max_inline_media_bytes),
        })
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Sends
    // ------------------------------------------------------------------

    pub async fn send_text(&self, req: SendText) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        require(!req.message.is_empty(), "message must not be empty")?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let body = MessageBody::Text(TextBody {
            number: recipient_value(MessageKind::Text, &target),
            text: req.message,
            link_preview: req.link_preview,
            mentions_every_one: req.mention_all.then_some(true),
            delay: req.delay_ms,
        });
        dispatch::send_message(&handle, &body).await
    }

    pub async fn send_media(&self, req: SendMedia) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        let kind = MediaKind::parse_sendable(&req.media_kind).ok_or_else(|| {
            Error::Validation(format!(
                "media kind must be image, video, or document, got {:?}",
                req.media_kind
            ))
        })?;
        require(!req.media.trim().is_empty(), "media reference must not be empty")?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let resolved = self.media.resolve(&req.media, kind).await?;
        let body = MessageBody::Media(MediaBody {
            number: recipient_value(MessageKind::Media, &target),
            mediatype: kind.as_str().to_string(),
            mimetype: resolved.mime_or_default(kind),
            media: resolved.media_value().to_string(),
            caption: req.caption,
            file_name: req.filename,
            delay: req.delay_ms,
        });
        dispatch::send_message(&handle, &body).await
    }

    pub async fn send_audio(&self, req: SendAudio) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        require(!req.audio.trim().is_empty(), "audio reference must not be empty")?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let resolved = self.media.resolve(&req.audio, MediaKind::Audio).await?;
        let body = MessageBody::Audio(AudioBody {
            number: recipient_value(MessageKind::Audio, &target),
            audio: resolved.media_value().to_string(),
            delay: req.delay_ms,
        });
        dispatch::send_message(&handle, &body).await
    }

    pub async fn send_sticker(&self, req: SendSticker) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        require(!req.sticker.trim().is_empty(), "sticker reference must not be empty")?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let resolved = self.media.resolve(&req.sticker, MediaKind::Sticker).await?;
        let body = MessageBody::Sticker(StickerBody {
            number: recipient_value(MessageKind::Sticker, &target),
            sticker: resolved.media_value().to_string(),
            delay: req.delay_ms,
        });
        dispatch::send_message(&handle, &body).await
    }

    pub async fn send_location(&self, req: SendLocation) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        require(
            (-90.0..=90.0).contains(&req.latitude),
            "latitude must be within [-90, 90]",
        )?;
        require(
            (-180.0..=180.0).contains(&req.longitude),
            "longitude must be within [-180, 180]",
        )?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let body = MessageBody::Location(LocationBody {
            number: recipient_value(MessageKind::Location, &target),
            latitude: req.latitude,
            longitude: req.longitude,
            name: req.name,
            address: req.address,
            delay: req.delay_ms,
        });
        dispatch::send_message(&handle, &body).await
    }

    pub async fn send_contact(&self, req: SendContact) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        require(!req.contact_name.trim().is_empty(), "contact name must not be empty")?;
        require(!req.contact_phone.trim().is_empty(), "contact phone must not be empty")?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let body = MessageBody::Contact(ContactBody {
            number: recipient_value(MessageKind::Contact, &target),
            contact: vec![ContactCard {
                full_name: req.contact_name,
                phone_number: req.contact_phone,
                email: req.contact_email,
                organization: req.contact_organization,
            }],
        });
        dispatch::send_message(&handle, &body).await
    }

    pub async fn send_reaction(&self, req: SendReaction) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        require(!req.message_id.trim().is_empty(), "message id must not be empty")?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let body = MessageBody::Reaction(ReactionBody {
            key: MessageKey {
                remote_jid: recipient_value(MessageKind::Reaction, &target),
                id: req.message_id,
            },
            reaction: req.reaction,
        });
        dispatch::send_message(&handle, &body).await
    }

    pub async fn send_poll(&self, req: SendPoll) -> Result<DispatchResult, Error> {
        let target = resolve_target(&req.target)?;
        require(!req.question.trim().is_empty(), "poll question must not be empty")?;
        let options = parse_poll_options(&req.options)?;
        require(req.max_selections >= 1, "max selections must be at least 1")?;
        let handle = self.registry.select(req.instance.as_deref())?;
        let body = MessageBody::Poll(PollBody {
            number: recipient_value(MessageKind::Poll, &target),
            name: req.question,
            selectable_count: req.max_selections,
            values: options,
            delay: req.delay_ms,
        });
        dispatch::send_message(&handle, &body).await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Check whether a phone number is registered on WhatsApp.
    pub async fn check_number(&self, phone_number: &str) -> Result<NumberStatus, Error> {
        let digits = lookup_number(phone_number);
        require(!digits.is_empty(), "phone number must contain digits")?;
        let handle = self.registry.select(None)?;
        let numbers = vec![digits.clone()];
        let results = dispatch::lookup_numbers(&handle, &numbers).await?;
        let entry = results.into_iter().next();
        Ok(NumberStatus {
            exists: entry.as_ref().is_some_and(|e| e.exists),
            jid: entry.as_ref().and_then(|e| e.jid.clone()),
            number: entry.and_then(|e| e.number).unwrap_or(digits),
        })
    }

    /// Last cached connection snapshot, never touching the network.
    pub fn connection_state(&self, instance: Option<&str>) -> Result<ConnectionSnapshot, Error> {
        Ok(self.registry.select(instance)?.cache.connection())
    }

    /// Refresh the connection snapshot (coalesced per instance).
    pub async fn refresh_connection(
        &self,
        instance: Option<&str>,
    ) -> Result<Refreshed<ConnectionSnapshot>, Error> {
        let handle = self.registry.select(instance)?;
        Ok(refresh_connection(&handle).await)
    }

    /// Last cached group directory, never touching the network.
    pub fn groups(&self, instance: Option<&str>) -> Result<GroupDirectory, Error> {
        Ok(self.registry.select(instance)?.cache.groups())
    }

    /// Refresh the group directory (coalesced per instance). Groups are
    /// refreshed only on explicit action, never polled.
    pub async fn refresh_groups(
        &self,
        instance: Option<&str>,
    ) -> Result<Refreshed<GroupDirectory>, Error> {
        let handle = self.registry.select(instance)?;
        let refreshed = refresh_groups(&handle).await;
        if refreshed.is_fresh() {
            info!(
                instance = %handle.id(),
                count = refreshed.value.groups.len(),
                "group directory refreshed"
            );
        }
        Ok(refreshed)
    }
}

/// Refresh one instance's connection snapshot through the dispatcher.
pub async fn refresh_connection(handle: &Arc<InstanceHandle>) -> Refreshed<ConnectionSnapshot> {
    let handle = handle.as_ref();
    handle
        .cache
        .refresh_connection(move || dispatch::fetch_connection_state(handle))
        .await
}

/// Refresh one instance's group directory through the dispatcher.
pub async fn refresh_groups(handle: &Arc<InstanceHandle>) -> Refreshed<GroupDirectory> {
    let handle = handle.as_ref();
    handle
        .cache
        .refresh_groups(move || dispatch::fetch_groups(handle))
        .await
}

// ============================================================================
// Validation helpers
// ============================================================================

fn require(condition: bool, detail: &str) -> Result<(), Error> {
    if condition {
        Ok(())
    } else {
        Err(Error::Validation(detail.to_string()))
    }
}

fn resolve_target(raw: &str) -> Result<Target, Error> {
    require(!raw.trim().is_empty(), "target must not be empty")?;
    Ok(Target::resolve(raw))
}

/// Split a comma-separated option string, dropping empty entries; at least
/// two options must remain.
fn parse_poll_options(raw: &str) -> Result<Vec<String>, Error> {
    let options: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if options.len() < 2 {
        return Err(Error::Validation(
            "a poll needs at least two options".to_string(),
        ));
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;

    fn test_config() -> Config {
        Config {
            instances: vec![InstanceConfig {
                id: "main".to_string(),
                server_url: "https://gateway.local:3000".to_string(),
                api_key: "k".to_string(),
                verify_tls: true,
                default: true,
            }],
            timeout_seconds: 10,
            max_inline_media_bytes: 1024,
            poll_interval_seconds: 60,
        }
    }

    #[test]
    fn poll_options_parse_and_trim() {
        let options = parse_poll_options("Red, Blue").unwrap();
        assert_eq!(options, vec!["Red".to_string(), "Blue".to_string()]);

        let options = parse_poll_options(" a ,, b , c ").unwrap();
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn single_poll_option_rejected() {
        assert!(matches!(
            parse_poll_options("only one"),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn poll_with_zero_selections_rejected_before_dispatch() {
        let gateway = Gateway::new(&test_config()).unwrap();
        let err = gateway
            .send_poll(SendPoll {
                target: "1234567890".to_string(),
                question: "Pick one".to_string(),
                options: "Red, Blue".to_string(),
                max_selections: 0,
                delay_ms: None,
                instance: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn empty_message_rejected_before_dispatch() {
        let gateway = Gateway::new(&test_config()).unwrap();
        let err = gateway
            .send_text(SendText::new("5551234567", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn out_of_range_latitude_rejected() {
        let gateway = Gateway::new(&test_config()).unwrap();
        let err = gateway
            .send_location(SendLocation {
                target: "5551234567".to_string(),
                latitude: 91.0,
                longitude: 0.0,
                name: None,
                address: None,
                delay_ms: None,
                instance: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn bad_media_kind_rejected() {
        let gateway = Gateway::new(&test_config()).unwrap();
        let err = gateway
            .send_media(SendMedia {
                target: "5551234567".to_string(),
                media: "https://example.com/a.gif".to_string(),
                media_kind: "animation".to_string(),
                caption: None,
                filename: None,
                delay_ms: None,
                instance: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_instance_override_surfaces_instance_error() {
        let gateway = Gateway::new(&test_config()).unwrap();
        let mut req = SendText::new("5551234567", "hi");
        req.instance = Some("missing".to_string());
        let err = gateway.send_text(req).await.unwrap_err();
        assert!(matches!(err, Error::Instance(_)));
    }

    #[tokio::test]
    async fn check_number_requires_digits() {
        let gateway = Gateway::new(&test_config()).unwrap();
        let err = gateway.check_number("+-() ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn connection_state_read_never_blocks_on_network() {
        let gateway = Gateway::new(&test_config()).unwrap();
        let snapshot = gateway.connection_state(None).unwrap();
        assert!(!snapshot.is_connected());
        assert!(snapshot.checked_at.is_none());
    }
}

//! Evolution API wire contract: endpoint table, request bodies, responses.
//!
//! Endpoint paths and field names are gateway-version-defined and kept here
//! in one place. Every path is suffixed with the instance id at dispatch
//! time (`{server_url}{endpoint}/{instance_id}`).

use serde::{Deserialize, Serialize};

use crate::target::Target;

// ============================================================================
// Endpoints
// ============================================================================

/// Message kinds the gateway accepts, one endpoint each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Media,
    Audio,
    Sticker,
    Location,
    Contact,
    Reaction,
    Poll,
}

impl MessageKind {
    /// Endpoint path for this message kind.
    pub fn endpoint(self) -> &'static str {
        match self {
            MessageKind::Text => "/message/sendText",
            MessageKind::Media => "/message/sendMedia",
            MessageKind::Audio => "/message/sendWhatsAppAudio",
            MessageKind::Sticker => "/message/sendSticker",
            MessageKind::Location => "/message/sendLocation",
            MessageKind::Contact => "/message/sendContact",
            MessageKind::Reaction => "/message/sendReaction",
            MessageKind::Poll => "/message/sendPoll",
        }
    }
}

/// Read endpoints.
pub const ENDPOINT_CONNECTION_STATE: &str = "/instance/connectionState";
pub const ENDPOINT_FETCH_ALL_GROUPS: &str = "/group/fetchAllGroups";
pub const ENDPOINT_CHECK_NUMBERS: &str = "/chat/whatsappNumbers";

// ============================================================================
// Request bodies
// ============================================================================

/// One closed variant per message kind, each carrying only the optional
/// fields valid for that kind. Serializes as the bare body object.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(TextBody),
    Media(MediaBody),
    Audio(AudioBody),
    Sticker(StickerBody),
    Location(LocationBody),
    Contact(ContactBody),
    Reaction(ReactionBody),
    Poll(PollBody),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Text(_) => MessageKind::Text,
            MessageBody::Media(_) => MessageKind::Media,
            MessageBody::Audio(_) => MessageKind::Audio,
            MessageBody::Sticker(_) => MessageKind::Sticker,
            MessageBody::Location(_) => MessageKind::Location,
            MessageBody::Contact(_) => MessageKind::Contact,
            MessageBody::Reaction(_) => MessageKind::Reaction,
            MessageBody::Poll(_) => MessageKind::Poll,
        }
    }
}

/// Recipient addressing value for a (kind, target) pair.
///
/// The gateway takes a single `number` field for both phone and group
/// addressing on most kinds; reactions address through the message key's
/// full `remoteJid` instead.
pub fn recipient_value(kind: MessageKind, target: &Target) -> String {
    match kind {
        MessageKind::Reaction => target.remote_jid(),
        _ => target.address().to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct TextBody {
    pub number: String,
    pub text: String,
    #[serde(rename = "linkPreview")]
    pub link_preview: bool,
    #[serde(rename = "mentionsEveryOne", skip_serializing_if = "Option::is_none")]
    pub mentions_every_one: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MediaBody {
    pub number: String,
    pub mediatype: String,
    pub mimetype: String,
    /// URL or base64-encoded bytes; the gateway accepts either.
    pub media: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AudioBody {
    pub number: String,
    pub audio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StickerBody {
    pub number: String,
    pub sticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LocationBody {
    pub number: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ContactBody {
    pub number: String,
    pub contact: Vec<ContactCard>,
}

#[derive(Debug, Serialize)]
pub struct ContactCard {
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReactionBody {
    pub key: MessageKey,
    /// Empty string removes a previously sent reaction.
    pub reaction: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageKey {
    #[serde(rename = "remoteJid")]
    pub remote_jid: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct PollBody {
    pub number: String,
    pub name: String,
    #[serde(rename = "selectableCount")]
    pub selectable_count: u32,
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CheckNumbersBody {
    pub numbers: Vec<String>,
}

// ============================================================================
// Response shapes
// ============================================================================

/// Send responses carry the assigned message key; anything else in the body
/// is ignored.
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub key: Option<SendResponseKey>,
}

#[derive(Debug, Deserialize)]
pub struct SendResponseKey {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionStateResponse {
    pub instance: Option<ConnectionStateInner>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionStateInner {
    pub state: Option<String>,
}

/// One entry of the group listing.
#[derive(Debug, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    /// Participant count.
    #[serde(default)]
    pub size: Option<u32>,
}

/// One entry of the number-lookup response.
#[derive(Debug, Clone, Deserialize)]
pub struct NumberInfo {
    pub exists: bool,
    #[serde(default)]
    pub jid: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_body_omits_unset_optionals() {
        let body = MessageBody::Text(TextBody {
            number: "5551234567".to_string(),
            text: "Hello".to_string(),
            link_preview: true,
            mentions_every_one: None,
            delay: None,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "number": "5551234567",
                "text": "Hello",
                "linkPreview": true,
            })
        );
    }

    #[test]
    fn text_body_group_addressing_uses_group_jid() {
        let target = Target::resolve("120363418454200327@g.us");
        let number = recipient_value(MessageKind::Text, &target);
        assert_eq!(number, "120363418454200327@g.us");
    }

    #[test]
    fn reaction_addresses_through_remote_jid() {
        let target = Target::resolve("+5551234567");
        assert_eq!(
            recipient_value(MessageKind::Reaction, &target),
            "5551234567@s.whatsapp.net"
        );
        let group = Target::resolve("123@g.us");
        assert_eq!(recipient_value(MessageKind::Reaction, &group), "123@g.us");
    }

    #[test]
    fn poll_body_field_names() {
        let body = MessageBody::Poll(PollBody {
            number: "1234567890".to_string(),
            name: "Pick one".to_string(),
            selectable_count: 1,
            values: vec!["Red".to_string(), "Blue".to_string()],
            delay: None,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["selectableCount"], 1);
        assert_eq!(json["values"].as_array().unwrap().len(), 2);
        assert!(json.get("delay").is_none());
    }

    #[test]
    fn contact_card_field_names() {
        let body = ContactBody {
            number: "5551234567".to_string(),
            contact: vec![ContactCard {
                full_name: "Ada".to_string(),
                phone_number: "+5551112222".to_string(),
                email: None,
                organization: Some("Acme".to_string()),
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contact"][0]["fullName"], "Ada");
        assert_eq!(json["contact"][0]["organization"], "Acme");
        assert!(json["contact"][0].get("email").is_none());
    }

    #[test]
    fn every_kind_maps_to_an_endpoint() {
        for kind in [
            MessageKind::Text,
            MessageKind::Media,
            MessageKind::Audio,
            MessageKind::Sticker,
            MessageKind::Location,
            MessageKind::Contact,
            MessageKind::Reaction,
            MessageKind::Poll,
        ] {
            assert!(kind.endpoint().starts_with("/message/"));
        }
    }
}

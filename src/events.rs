//! Typed gateway events.
//!
//! Instead of matching on raw `(op, t, serde_json::Value)` tuples everywhere,
//! gateway payloads are parsed into this enum so [`dispatch`](crate::dispatch)
//! can pattern-match on the events that touch the cache. Entity bodies stay
//! plain [`Payload`]s; turning them into cached entities is the registry's
//! job.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::types::{
    field::Payload,
    id::{
        marker::{GuildMarker, RoleMarker},
        Id,
    },
};

// ---------------------------------------------------------------------------
// Raw envelope
// ---------------------------------------------------------------------------

/// Raw gateway payload envelope.
///
/// Every message on the Discord WebSocket is wrapped in this structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

// ---------------------------------------------------------------------------
// Event bodies
// ---------------------------------------------------------------------------

/// The READY event data sent by the gateway after a successful IDENTIFY.
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    /// The connected user.
    pub user: Payload,
    #[serde(default)]
    pub session_id: String,
    /// Guilds the user is in, as unavailable stubs until their
    /// GUILD_CREATE arrives.
    #[serde(default)]
    pub guilds: Vec<Payload>,
    /// Only sent to user accounts.
    #[serde(default)]
    pub private_channels: Vec<Payload>,
}

/// GUILD_DELETE body.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildDelete {
    pub id: Id<GuildMarker>,
    /// Set when the guild went away because of an outage rather than the
    /// user leaving it.
    #[serde(default)]
    pub unavailable: bool,
}

/// GUILD_ROLE_CREATE and GUILD_ROLE_UPDATE body.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleEvent {
    pub guild_id: Id<GuildMarker>,
    pub role: Payload,
}

/// GUILD_ROLE_DELETE body.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleDelete {
    pub guild_id: Id<GuildMarker>,
    pub role_id: Id<RoleMarker>,
}

/// GUILD_STICKERS_UPDATE body, the full sticker list of a guild.
#[derive(Debug, Clone, Deserialize)]
pub struct StickersUpdate {
    pub guild_id: Id<GuildMarker>,
    pub stickers: Vec<Payload>,
}

// ---------------------------------------------------------------------------
// The top-level event enum
// ---------------------------------------------------------------------------

/// A parsed event coming off the Discord gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// We've successfully identified; carries the current user.
    Ready(Ready),

    GuildCreate(Payload),
    GuildUpdate(Payload),
    GuildDelete(GuildDelete),

    ChannelCreate(Payload),
    ChannelUpdate(Payload),
    ChannelDelete(Payload),

    RoleCreate(RoleEvent),
    RoleUpdate(RoleEvent),
    RoleDelete(RoleDelete),

    AutoModerationRuleCreate(Payload),
    AutoModerationRuleUpdate(Payload),
    AutoModerationRuleDelete(Payload),

    ScheduledEventCreate(Payload),
    ScheduledEventUpdate(Payload),
    ScheduledEventDelete(Payload),

    StickersUpdate(StickersUpdate),

    /// Heartbeat ACK from the gateway (op 11).
    HeartbeatAck,

    /// The gateway is asking us to heartbeat immediately (op 1).
    HeartbeatRequest,

    /// Gateway told us to reconnect (op 7).
    Reconnect,

    /// Session has been invalidated (op 9). The inner bool indicates whether
    /// the session is resumable (`true`) or we must re-identify (`false`).
    InvalidSession(bool),

    /// An event we received but don't have a typed variant for, or whose
    /// body didn't parse. Carries the event name and raw JSON so callers can
    /// still inspect it.
    Unknown {
        event_name: Option<String>,
        op: u8,
        data: Option<serde_json::Value>,
    },
}

// ---------------------------------------------------------------------------
// Parsing from a raw GatewayPayload
// ---------------------------------------------------------------------------

impl GatewayEvent {
    /// Convert a raw [`GatewayPayload`] into a typed event.
    ///
    /// This never fails; unrecognised events become [`GatewayEvent::Unknown`].
    pub fn from_payload(payload: GatewayPayload) -> Self {
        match payload.op {
            // ----- Op 0: DISPATCH -----
            0 => Self::parse_dispatch(payload.t, payload.d),

            // ----- Op 1: Heartbeat request -----
            1 => GatewayEvent::HeartbeatRequest,

            // ----- Op 7: Reconnect -----
            7 => GatewayEvent::Reconnect,

            // ----- Op 9: Invalid Session -----
            9 => {
                let resumable = payload
                    .d
                    .as_ref()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                GatewayEvent::InvalidSession(resumable)
            }

            // ----- Op 11: Heartbeat ACK -----
            11 => GatewayEvent::HeartbeatAck,

            // ----- Anything else -----
            _ => GatewayEvent::Unknown {
                event_name: payload.t,
                op: payload.op,
                data: payload.d,
            },
        }
    }

    /// Parse an op-0 DISPATCH event by its `t` name.
    fn parse_dispatch(event_name: Option<String>, data: Option<serde_json::Value>) -> Self {
        let parsed = match (event_name.as_deref(), data.as_ref()) {
            (Some(name), Some(d)) => Self::parse_body_of(name, d),
            _ => None,
        };

        parsed.unwrap_or(GatewayEvent::Unknown {
            event_name,
            op: 0,
            data,
        })
    }

    fn parse_body_of(name: &str, d: &serde_json::Value) -> Option<Self> {
        match name {
            "READY" => parse_body(name, d, GatewayEvent::Ready),

            "GUILD_CREATE" => parse_body(name, d, GatewayEvent::GuildCreate),
            "GUILD_UPDATE" => parse_body(name, d, GatewayEvent::GuildUpdate),
            "GUILD_DELETE" => parse_body(name, d, GatewayEvent::GuildDelete),

            "CHANNEL_CREATE" => parse_body(name, d, GatewayEvent::ChannelCreate),
            "CHANNEL_UPDATE" => parse_body(name, d, GatewayEvent::ChannelUpdate),
            "CHANNEL_DELETE" => parse_body(name, d, GatewayEvent::ChannelDelete),

            "GUILD_ROLE_CREATE" => parse_body(name, d, GatewayEvent::RoleCreate),
            "GUILD_ROLE_UPDATE" => parse_body(name, d, GatewayEvent::RoleUpdate),
            "GUILD_ROLE_DELETE" => parse_body(name, d, GatewayEvent::RoleDelete),

            "AUTO_MODERATION_RULE_CREATE" => {
                parse_body(name, d, GatewayEvent::AutoModerationRuleCreate)
            }
            "AUTO_MODERATION_RULE_UPDATE" => {
                parse_body(name, d, GatewayEvent::AutoModerationRuleUpdate)
            }
            "AUTO_MODERATION_RULE_DELETE" => {
                parse_body(name, d, GatewayEvent::AutoModerationRuleDelete)
            }

            "GUILD_SCHEDULED_EVENT_CREATE" => {
                parse_body(name, d, GatewayEvent::ScheduledEventCreate)
            }
            "GUILD_SCHEDULED_EVENT_UPDATE" => {
                parse_body(name, d, GatewayEvent::ScheduledEventUpdate)
            }
            "GUILD_SCHEDULED_EVENT_DELETE" => {
                parse_body(name, d, GatewayEvent::ScheduledEventDelete)
            }

            "GUILD_STICKERS_UPDATE" => parse_body(name, d, GatewayEvent::StickersUpdate),

            // ---- Events the cache doesn't consume ----
            _ => None,
        }
    }
}

/// Deserialize a dispatch body, logging and returning `None` when it doesn't
/// match the expected shape.
fn parse_body<T, F>(name: &str, d: &serde_json::Value, wrap: F) -> Option<GatewayEvent>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> GatewayEvent,
{
    match serde_json::from_value::<T>(d.clone()) {
        Ok(body) => Some(wrap(body)),
        Err(e) => {
            warn!(event = name, error = %e, "failed to parse dispatch payload");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convenience trait for pulling a typed value out of an Unknown event's data.
pub trait UnknownEventExt {
    /// If this is an `Unknown` event, try to deserialise its `data` field.
    fn try_parse_data<T: DeserializeOwned>(&self) -> Option<T>;
}

impl UnknownEventExt for GatewayEvent {
    fn try_parse_data<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            GatewayEvent::Unknown { data: Some(d), .. } => serde_json::from_value(d.clone()).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayEvent, GatewayPayload, UnknownEventExt};
    use crate::types::id::Id;
    use serde_json::json;

    fn dispatch(name: &str, d: serde_json::Value) -> GatewayEvent {
        GatewayEvent::from_payload(GatewayPayload {
            op: 0,
            d: Some(d),
            s: Some(1),
            t: Some(name.to_owned()),
        })
    }

    #[test]
    fn gateway_payload_deserializes() {
        let json = r#"{"op":0,"d":null,"s":1,"t":"READY"}"#;
        let payload: GatewayPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.op, 0);
        assert_eq!(payload.s, Some(1));
        assert_eq!(payload.t.as_deref(), Some("READY"));

        assert!(matches!(
            GatewayEvent::from_payload(payload),
            GatewayEvent::Unknown { op: 0, data: None, .. }
        ));
    }

    #[test]
    fn opcodes() {
        let event = |op, d| {
            GatewayEvent::from_payload(GatewayPayload {
                op,
                d,
                s: None,
                t: None,
            })
        };

        assert!(matches!(event(1, None), GatewayEvent::HeartbeatRequest));
        assert!(matches!(event(7, None), GatewayEvent::Reconnect));
        assert!(matches!(
            event(9, Some(json!(true))),
            GatewayEvent::InvalidSession(true)
        ));
        assert!(matches!(event(9, None), GatewayEvent::InvalidSession(false)));
        assert!(matches!(event(11, None), GatewayEvent::HeartbeatAck));
        assert!(matches!(event(10, None), GatewayEvent::Unknown { op: 10, .. }));
    }

    #[test]
    fn ready() {
        let event = dispatch(
            "READY",
            json!({"v": 10, "user": {"id": "1", "username": "bot"}, "session_id": "abc"}),
        );

        let GatewayEvent::Ready(ready) = event else {
            panic!("expected READY");
        };
        assert_eq!(ready.session_id, "abc");
        assert!(ready.guilds.is_empty());
        assert_eq!(ready.user.get("username"), Some(&json!("bot")));
    }

    #[test]
    fn typed_bodies() {
        let event = dispatch("GUILD_ROLE_DELETE", json!({"guild_id": "1", "role_id": "2"}));
        let GatewayEvent::RoleDelete(delete) = event else {
            panic!("expected GUILD_ROLE_DELETE");
        };
        assert_eq!(delete.guild_id, Id::new(1));
        assert_eq!(delete.role_id, Id::new(2));

        let event = dispatch("GUILD_DELETE", json!({"id": "1", "unavailable": true}));
        assert!(matches!(
            event,
            GatewayEvent::GuildDelete(ref delete) if delete.unavailable
        ));

        assert!(matches!(
            dispatch("CHANNEL_CREATE", json!({"id": "5", "type": 0})),
            GatewayEvent::ChannelCreate(_)
        ));
    }

    #[test]
    fn malformed_body_becomes_unknown() {
        let event = dispatch("CHANNEL_UPDATE", json!([1, 2, 3]));
        assert!(matches!(
            event,
            GatewayEvent::Unknown { ref event_name, .. } if event_name.as_deref() == Some("CHANNEL_UPDATE")
        ));
        assert_eq!(event.try_parse_data::<Vec<u8>>(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn unconsumed_events_are_unknown() {
        let event = dispatch("MESSAGE_CREATE", json!({"id": "1"}));
        assert!(matches!(event, GatewayEvent::Unknown { .. }));
        assert_eq!(
            event.try_parse_data::<serde_json::Value>(),
            Some(json!({"id": "1"}))
        );
    }
}

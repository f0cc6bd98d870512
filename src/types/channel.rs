//! Guild channels, threads and private channels.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::{
    cache::{self, replace, Changes, Emit, Entity, Field, GuildChild, Handle, Registry},
    types::{
        field::{self, FieldError, Payload},
        guild::Guild,
        id::{
            marker::{ChannelMarker, GuildMarker, UserMarker},
            Id,
        },
        user::User,
    },
};

/// Maximum length of a channel name.
const NAME_LENGTH_MAX: usize = 100;

/// Maximum length of a channel topic.
const TOPIC_LENGTH_MAX: usize = 1024;

/// Bitrate of a voice channel created without one.
pub const BITRATE_DEFAULT: u32 = 64_000;

/// Maximum slowmode, in seconds.
pub const SLOWMODE_MAX: u32 = 21_600;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    GuildText,
    Private,
    GuildVoice,
    Group,
    GuildCategory,
    GuildAnnouncement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    GuildStageVoice,
    GuildDirectory,
    GuildForum,
    GuildMedia,
    Unknown(u8),
}

impl ChannelType {
    /// Whether the channel lives outside any guild.
    pub const fn is_private(self) -> bool {
        matches!(self, Self::Private | Self::Group)
    }

    /// Whether the channel is a thread.
    pub const fn is_thread(self) -> bool {
        matches!(
            self,
            Self::AnnouncementThread | Self::PublicThread | Self::PrivateThread
        )
    }
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Private,
            2 => Self::GuildVoice,
            3 => Self::Group,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::GuildStageVoice,
            14 => Self::GuildDirectory,
            15 => Self::GuildForum,
            16 => Self::GuildMedia,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(value: ChannelType) -> Self {
        match value {
            ChannelType::GuildText => 0,
            ChannelType::Private => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::Group => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildAnnouncement => 5,
            ChannelType::AnnouncementThread => 10,
            ChannelType::PublicThread => 11,
            ChannelType::PrivateThread => 12,
            ChannelType::GuildStageVoice => 13,
            ChannelType::GuildDirectory => 14,
            ChannelType::GuildForum => 15,
            ChannelType::GuildMedia => 16,
            ChannelType::Unknown(unknown) => unknown,
        }
    }
}

/// Type of a channel reserved before its payload arrived.
const UNKNOWN_TYPE: ChannelType = ChannelType::Unknown(u8::MAX);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Channel {
    pub id: Id<ChannelMarker>,
    pub kind: ChannelType,
    pub guild_id: Option<Id<GuildMarker>>,
    pub name: String,
    pub topic: Option<String>,
    /// Sorting position within the guild's channel list.
    pub position: i32,
    /// Category, or parent channel of a thread.
    pub parent_id: Option<Id<ChannelMarker>>,
    pub nsfw: bool,
    /// Seconds a member has to wait between two messages.
    pub slowmode: u32,
    pub bitrate: u32,
    /// Maximum number of members in a voice channel, `0` for unlimited.
    pub user_limit: u32,
    /// Participants of a private channel, sorted.
    ///
    /// Includes the current user once the registry knows who that is.
    pub users: Vec<Id<UserMarker>>,
}

impl Channel {
    /// Mention of the channel.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }

    /// For a direct message channel, the participant that isn't
    /// `current_user`.
    pub fn other_user(&self, current_user: Id<UserMarker>) -> Option<Id<UserMarker>> {
        if self.kind != ChannelType::Private {
            return None;
        }

        self.users.iter().copied().find(|id| *id != current_user)
    }
}

const FIELDS: &[Field<Channel>] = &[
    Field {
        name: "bitrate",
        keys: &["bitrate"],
        emit: Emit::Always,
        update: |channel, data| {
            let value = field::parse_bounded(data, "bitrate", BITRATE_DEFAULT, 8_000, 384_000)?;
            replace(&mut channel.bitrate, value, "bitrate")
        },
        put: |channel, data, defaults| {
            field::put_with_default(data, "bitrate", channel.bitrate, BITRATE_DEFAULT, defaults)
        },
    },
    Field {
        name: "guild_id",
        keys: &["guild_id"],
        emit: Emit::Internal,
        update: |channel, data| {
            replace(&mut channel.guild_id, field::parse_id(data, "guild_id")?, "guild_id")
        },
        put: |channel, data, defaults| field::put_id(data, "guild_id", channel.guild_id, defaults),
    },
    Field {
        name: "kind",
        keys: &["type"],
        emit: Emit::Always,
        update: |channel, data| {
            let value = field::parse_preinstanced(data, "type", UNKNOWN_TYPE)?;
            replace(&mut channel.kind, value, "kind")
        },
        put: |channel, data, _| {
            data.insert("type".to_owned(), Value::from(u8::from(channel.kind)));
        },
    },
    Field {
        name: "name",
        keys: &["name"],
        emit: Emit::Always,
        update: |channel, data| {
            replace(&mut channel.name, field::parse_str(data, "name", NAME_LENGTH_MAX)?, "name")
        },
        put: |channel, data, _| {
            data.insert("name".to_owned(), Value::String(channel.name.clone()));
        },
    },
    Field {
        name: "nsfw",
        keys: &["nsfw"],
        emit: Emit::Always,
        update: |channel, data| {
            replace(&mut channel.nsfw, field::parse_bool(data, "nsfw", false)?, "nsfw")
        },
        put: |channel, data, defaults| field::put_with_default(data, "nsfw", channel.nsfw, false, defaults),
    },
    Field {
        name: "parent_id",
        keys: &["parent_id"],
        emit: Emit::Always,
        update: |channel, data| {
            replace(&mut channel.parent_id, field::parse_id(data, "parent_id")?, "parent_id")
        },
        put: |channel, data, defaults| field::put_id(data, "parent_id", channel.parent_id, defaults),
    },
    Field {
        name: "position",
        keys: &["position"],
        emit: Emit::Always,
        update: |channel, data| {
            replace(&mut channel.position, field::parse_integer(data, "position", 0)?, "position")
        },
        put: |channel, data, defaults| {
            field::put_with_default(data, "position", channel.position, 0, defaults)
        },
    },
    Field {
        name: "slowmode",
        keys: &["rate_limit_per_user"],
        emit: Emit::Always,
        update: |channel, data| {
            let value = field::parse_bounded(data, "rate_limit_per_user", 0, 0, SLOWMODE_MAX)?;
            replace(&mut channel.slowmode, value, "slowmode")
        },
        put: |channel, data, defaults| {
            field::put_with_default(data, "rate_limit_per_user", channel.slowmode, 0, defaults)
        },
    },
    Field {
        name: "topic",
        keys: &["topic"],
        emit: Emit::Always,
        update: |channel, data| {
            let value = field::parse_optional_str(data, "topic", TOPIC_LENGTH_MAX)?;
            replace(&mut channel.topic, value, "topic")
        },
        put: |channel, data, defaults| {
            field::put_optional_str(data, "topic", channel.topic.as_deref(), defaults)
        },
    },
    Field {
        name: "user_limit",
        keys: &["user_limit"],
        emit: Emit::Always,
        update: |channel, data| {
            let value = field::parse_bounded(data, "user_limit", 0, 0, 99)?;
            replace(&mut channel.user_limit, value, "user_limit")
        },
        put: |channel, data, defaults| {
            field::put_with_default(data, "user_limit", channel.user_limit, 0, defaults)
        },
    },
    Field {
        name: "users",
        keys: &["recipients"],
        emit: Emit::Internal,
        update: |channel, data| {
            let value = field::parse_nested_ids(data, "recipients")?;
            replace(&mut channel.users, value, "users")
        },
        put: |channel, data, _| field::put_nested_ids(data, "recipients", &channel.users),
    },
];

/// Decode the recipient users and rewrite `recipients` into its canonical
/// form: sorted, deduplicated, and including the current user for private
/// channels.
fn prepare_recipients(
    id: Id<ChannelMarker>,
    data: &mut Payload,
    registry: &mut Registry,
) -> Result<(), FieldError> {
    let mut users = Vec::new();

    for value in field::parse_array(data, "recipients")? {
        let object = value
            .as_object()
            .ok_or(FieldError::type_mismatch("recipients", "an array of objects"))?;

        let user = if object.len() > 1 {
            registry.decode::<User>(object)?
        } else {
            let user_id = field::parse_id(object, "id")?.ok_or(FieldError::missing("id"))?;
            registry.get_or_create::<User>(user_id)
        };

        users.push(user.id());
    }

    let kind = if data.contains_key("type") {
        field::parse_preinstanced(data, "type", UNKNOWN_TYPE)?
    } else {
        registry
            .get::<Channel>(id)
            .map_or(UNKNOWN_TYPE, |handle| handle.borrow().kind)
    };

    if kind.is_private() {
        if let Some(current_user) = registry.current_user() {
            users.push(current_user);
        }
    }

    users.sort_unstable();
    users.dedup();
    field::put_nested_ids(data, "recipients", &users);

    Ok(())
}

impl Entity for Channel {
    type Marker = ChannelMarker;

    const KIND: &'static str = "channel";

    fn placeholder(id: Id<ChannelMarker>) -> Self {
        Self {
            id,
            kind: UNKNOWN_TYPE,
            guild_id: None,
            name: String::new(),
            topic: None,
            position: 0,
            parent_id: None,
            nsfw: false,
            slowmode: 0,
            bitrate: BITRATE_DEFAULT,
            user_limit: 0,
            users: Vec::new(),
        }
    }

    fn id(&self) -> Id<ChannelMarker> {
        self.id
    }

    fn fields() -> &'static [Field<Self>] {
        FIELDS
    }

    fn prepare(
        id: Id<ChannelMarker>,
        data: &mut Payload,
        registry: &mut Registry,
    ) -> Result<(), FieldError> {
        if data.contains_key("recipients") {
            prepare_recipients(id, data, registry)?;
        }

        Ok(())
    }

    fn created(handle: &Handle<Self>, registry: &mut Registry) {
        cache::index::sync_private_channel(handle, registry);
        cache::index::link_guild(handle, registry);
    }

    fn updated(handle: &Handle<Self>, changes: &Changes, registry: &mut Registry) {
        if changes.contains("users") || changes.contains("kind") {
            cache::index::sync_private_channel(handle, registry);
        }

        cache::index::relink_guild(handle, changes, registry);
    }

    fn deleted(handle: &Handle<Self>, registry: &mut Registry) {
        cache::index::unlink_private_channel(handle, registry);
        cache::index::unlink_guild(handle, registry);
    }
}

impl GuildChild for Channel {
    fn guild_id(&self) -> Option<Id<GuildMarker>> {
        self.guild_id
    }

    fn guild_index(guild: &mut Guild) -> &mut BTreeSet<Id<ChannelMarker>> {
        &mut guild.channel_ids
    }
}

#[cfg(test)]
mod tests {
    use super::{Channel, ChannelType, BITRATE_DEFAULT};
    use crate::{
        cache::{Encode, Registry},
        types::{
            field::FieldErrorType,
            id::{marker::UserMarker, Id},
            user::User,
            util::test_payload,
        },
    };
    use serde_json::json;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, hash::Hash};

    assert_impl_all!(ChannelType: Clone, Copy, Debug, Eq, Hash, PartialEq, Send, Sync);

    #[test]
    fn channel_type_values() {
        assert_eq!(ChannelType::from(1), ChannelType::Private);
        assert_eq!(u8::from(ChannelType::GuildForum), 15);
        assert_eq!(ChannelType::from(200), ChannelType::Unknown(200));
        assert!(ChannelType::Group.is_private());
        assert!(ChannelType::PublicThread.is_thread());
        assert!(!ChannelType::GuildText.is_private());
    }

    #[test]
    fn decode_guild_text_channel() {
        let mut registry = Registry::new();
        let channel = registry
            .decode::<Channel>(&test_payload(json!({
                "id": "100",
                "type": 0,
                "guild_id": "10",
                "name": "general",
                "topic": "",
                "position": 3,
                "nsfw": true,
                "rate_limit_per_user": 30,
            })))
            .unwrap();

        let channel = channel.borrow();
        assert_eq!(channel.kind, ChannelType::GuildText);
        assert_eq!(channel.guild_id, Some(Id::new(10)));
        assert_eq!(channel.name, "general");
        assert_eq!(channel.topic, None);
        assert_eq!(channel.position, 3);
        assert!(channel.nsfw);
        assert_eq!(channel.slowmode, 30);
        assert_eq!(channel.bitrate, BITRATE_DEFAULT);
        assert_eq!(channel.mention(), "<#100>");
    }

    #[test]
    fn slowmode_is_bounded() {
        let mut registry = Registry::new();
        let error = registry
            .decode::<Channel>(&test_payload(json!({"id": "1", "rate_limit_per_user": 21601})))
            .unwrap_err();

        assert_eq!(error.key(), "rate_limit_per_user");
        assert_eq!(*error.kind(), FieldErrorType::Range);
        assert!(registry.get::<Channel>(Id::new(1)).is_none());
    }

    #[test]
    fn recipients_are_decoded_and_sorted() {
        let mut registry = Registry::with_current_user(Id::new(5));
        let channel = registry
            .decode::<Channel>(&test_payload(json!({
                "id": "7",
                "type": 1,
                "recipients": [{"id": "9", "username": "nine"}],
            })))
            .unwrap();

        let users: Vec<Id<UserMarker>> = vec![Id::new(5), Id::new(9)];
        assert_eq!(channel.borrow().users, users);
        assert_eq!(channel.borrow().other_user(Id::new(5)), Some(Id::new(9)));

        let user = registry.get::<User>(Id::new(9)).unwrap();
        assert!(!user.is_partial());
        assert_eq!(user.borrow().name, "nine");

        // The current user is only referenced, never decoded.
        assert!(registry.get::<User>(Id::new(5)).is_none());
    }

    #[test]
    fn group_recipients_keep_type_from_cache() {
        let mut registry = Registry::with_current_user(Id::new(5));
        let channel = registry
            .decode::<Channel>(&test_payload(json!({
                "id": "8",
                "type": 3,
                "recipients": [{"id": "6"}, {"id": "7"}],
            })))
            .unwrap();

        let changes = registry
            .apply_update(&channel, &test_payload(json!({"recipients": [{"id": "7"}]})))
            .unwrap();

        assert_eq!(changes.get("users"), Some(&json!(["5", "6", "7"])));
        assert_eq!(channel.borrow().users, vec![Id::new(5), Id::new(7)]);
    }

    #[test]
    fn encode_request_and_full() {
        let mut registry = Registry::new();
        let channel = registry
            .decode::<Channel>(&test_payload(json!({"id": "2", "type": 2, "guild_id": "1", "name": "voice"})))
            .unwrap();

        assert_eq!(
            serde_json::Value::Object(channel.encode(Encode::REQUEST)),
            json!({"type": 2, "name": "voice"})
        );
        assert_eq!(
            serde_json::Value::Object(channel.encode(Encode::FULL)),
            json!({
                "id": "2",
                "bitrate": 64000,
                "guild_id": "1",
                "type": 2,
                "name": "voice",
                "nsfw": false,
                "parent_id": null,
                "position": 0,
                "rate_limit_per_user": 0,
                "topic": null,
                "user_limit": 0,
                "recipients": [],
            })
        );
    }
}

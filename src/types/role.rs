//! Guild roles and their permissions.

use bitflags::bitflags;
use serde::{
    de::{Deserializer, Error as DeError, Visitor},
    Deserialize, Serialize, Serializer,
};
use serde_json::Value;
use std::{
    collections::BTreeSet,
    fmt::{Formatter, Result as FmtResult},
};

use crate::{
    cache::{self, replace, Changes, Emit, Entity, Field, GuildChild, Handle, Registry},
    types::{
        field::{self, FieldError, Payload},
        guild::Guild,
        id::{
            marker::{GuildMarker, RoleMarker},
            Id,
        },
    },
};

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct Permissions: u64 {
        const CREATE_INVITE = 1;
        const KICK_MEMBERS = 1 << 1;
        const BAN_MEMBERS = 1 << 2;
        const ADMINISTRATOR = 1 << 3;
        const MANAGE_CHANNELS = 1 << 4;
        const MANAGE_GUILD = 1 << 5;
        const ADD_REACTIONS = 1 << 6;
        const VIEW_AUDIT_LOG = 1 << 7;
        const PRIORITY_SPEAKER = 1 << 8;
        const STREAM = 1 << 9;
        const VIEW_CHANNEL = 1 << 10;
        const SEND_MESSAGES = 1 << 11;
        const SEND_TTS_MESSAGES = 1 << 12;
        const MANAGE_MESSAGES = 1 << 13;
        const EMBED_LINKS = 1 << 14;
        const ATTACH_FILES = 1 << 15;
        const READ_MESSAGE_HISTORY = 1 << 16;
        const MENTION_EVERYONE = 1 << 17;
        const USE_EXTERNAL_EMOJIS = 1 << 18;
        const VIEW_GUILD_INSIGHTS = 1 << 19;
        const CONNECT = 1 << 20;
        const SPEAK = 1 << 21;
        const MUTE_MEMBERS = 1 << 22;
        const DEAFEN_MEMBERS = 1 << 23;
        const MOVE_MEMBERS = 1 << 24;
        const USE_VAD = 1 << 25;
        const CHANGE_NICKNAME = 1 << 26;
        const MANAGE_NICKNAMES = 1 << 27;
        const MANAGE_ROLES = 1 << 28;
        const MANAGE_WEBHOOKS = 1 << 29;
        const MANAGE_GUILD_EXPRESSIONS = 1 << 30;
        const USE_APPLICATION_COMMANDS = 1 << 31;
        const REQUEST_TO_SPEAK = 1 << 32;
        const MANAGE_EVENTS = 1 << 33;
        const MANAGE_THREADS = 1 << 34;
        const CREATE_PUBLIC_THREADS = 1 << 35;
        const CREATE_PRIVATE_THREADS = 1 << 36;
        const USE_EXTERNAL_STICKERS = 1 << 37;
        const SEND_MESSAGES_IN_THREADS = 1 << 38;
        const USE_EMBEDDED_ACTIVITIES = 1 << 39;
        const MODERATE_MEMBERS = 1 << 40;
    }
}

// Discord sends permissions as a decimal string, since they don't fit a
// JavaScript number.
impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.bits())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PermissionsVisitor;

        impl<'de> Visitor<'de> for PermissionsVisitor {
            type Value = Permissions;

            fn expecting(&self, f: &mut Formatter<'_>) -> FmtResult {
                f.write_str("a permission integer or string")
            }

            fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
                Ok(Permissions::from_bits_retain(value))
            }

            fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
                value
                    .parse()
                    .map(Permissions::from_bits_retain)
                    .map_err(DeError::custom)
            }
        }

        deserializer.deserialize_any(PermissionsVisitor)
    }
}

fn parse_permissions(data: &Payload) -> Result<Permissions, FieldError> {
    const KEY: &str = "permissions";

    match data.get(KEY) {
        None | Some(Value::Null) => Ok(Permissions::empty()),
        Some(Value::String(raw)) => raw
            .parse()
            .map(Permissions::from_bits_retain)
            .map_err(|source| FieldError::format(KEY, source)),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(Permissions::from_bits_retain)
            .ok_or(FieldError::range(KEY)),
        Some(_) => Err(FieldError::type_mismatch(KEY, "a permission string")),
    }
}

const NAME_LENGTH_MAX: usize = 100;

/// Largest RGB color.
pub const COLOR_MAX: u32 = 0xFF_FF_FF;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Role {
    pub id: Id<RoleMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    pub name: String,
    /// RGB color, `0` for none.
    pub color: u32,
    /// Whether members are listed separately in the member list.
    pub separated: bool,
    pub position: i32,
    pub permissions: Permissions,
    pub mentionable: bool,
    /// Whether an integration or bot manages the role.
    pub managed: bool,
    pub unicode_emoji: Option<String>,
}

impl Role {
    /// Mention of the role.
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }

    /// Whether this is the guild's `@everyone` role.
    pub fn is_default(&self) -> bool {
        self.guild_id
            .is_some_and(|guild_id| guild_id.get() == self.id.get())
    }
}

const FIELDS: &[Field<Role>] = &[
    Field {
        name: "color",
        keys: &["color"],
        emit: Emit::Always,
        update: |role, data| {
            let value = field::parse_bounded(data, "color", 0, 0, COLOR_MAX)?;
            replace(&mut role.color, value, "color")
        },
        put: |role, data, defaults| field::put_with_default(data, "color", role.color, 0, defaults),
    },
    Field {
        name: "guild_id",
        keys: &["guild_id"],
        emit: Emit::Internal,
        update: |role, data| replace(&mut role.guild_id, field::parse_id(data, "guild_id")?, "guild_id"),
        put: |role, data, defaults| field::put_id(data, "guild_id", role.guild_id, defaults),
    },
    Field {
        name: "managed",
        keys: &["managed"],
        emit: Emit::Internal,
        update: |role, data| {
            replace(&mut role.managed, field::parse_bool(data, "managed", false)?, "managed")
        },
        put: |role, data, defaults| field::put_with_default(data, "managed", role.managed, false, defaults),
    },
    Field {
        name: "mentionable",
        keys: &["mentionable"],
        emit: Emit::Always,
        update: |role, data| {
            let value = field::parse_bool(data, "mentionable", false)?;
            replace(&mut role.mentionable, value, "mentionable")
        },
        put: |role, data, defaults| {
            field::put_with_default(data, "mentionable", role.mentionable, false, defaults)
        },
    },
    Field {
        name: "name",
        keys: &["name"],
        emit: Emit::Always,
        update: |role, data| replace(&mut role.name, field::parse_str(data, "name", NAME_LENGTH_MAX)?, "name"),
        put: |role, data, _| {
            data.insert("name".to_owned(), Value::String(role.name.clone()));
        },
    },
    Field {
        name: "permissions",
        keys: &["permissions"],
        emit: Emit::Always,
        update: |role, data| replace(&mut role.permissions, parse_permissions(data)?, "permissions"),
        put: |role, data, defaults| {
            field::put_with_default(
                data,
                "permissions",
                role.permissions.bits().to_string(),
                "0".to_owned(),
                defaults,
            )
        },
    },
    Field {
        name: "position",
        keys: &["position"],
        emit: Emit::Internal,
        update: |role, data| {
            replace(&mut role.position, field::parse_integer(data, "position", 0)?, "position")
        },
        put: |role, data, defaults| field::put_with_default(data, "position", role.position, 0, defaults),
    },
    Field {
        name: "separated",
        keys: &["hoist"],
        emit: Emit::Always,
        update: |role, data| {
            replace(&mut role.separated, field::parse_bool(data, "hoist", false)?, "separated")
        },
        put: |role, data, defaults| field::put_with_default(data, "hoist", role.separated, false, defaults),
    },
    Field {
        name: "unicode_emoji",
        keys: &["unicode_emoji"],
        emit: Emit::Always,
        update: |role, data| {
            let value = field::parse_optional_str(data, "unicode_emoji", 32)?;
            replace(&mut role.unicode_emoji, value, "unicode_emoji")
        },
        put: |role, data, defaults| {
            field::put_optional_str(data, "unicode_emoji", role.unicode_emoji.as_deref(), defaults)
        },
    },
];

impl Entity for Role {
    type Marker = RoleMarker;

    const KIND: &'static str = "role";

    fn placeholder(id: Id<RoleMarker>) -> Self {
        Self {
            id,
            guild_id: None,
            name: String::new(),
            color: 0,
            separated: false,
            position: 0,
            permissions: Permissions::empty(),
            mentionable: false,
            managed: false,
            unicode_emoji: None,
        }
    }

    fn id(&self) -> Id<RoleMarker> {
        self.id
    }

    fn fields() -> &'static [Field<Self>] {
        FIELDS
    }

    fn created(handle: &Handle<Self>, registry: &mut Registry) {
        cache::index::link_guild(handle, registry);
    }

    fn updated(handle: &Handle<Self>, changes: &Changes, registry: &mut Registry) {
        cache::index::relink_guild(handle, changes, registry);
    }

    fn deleted(handle: &Handle<Self>, registry: &mut Registry) {
        cache::index::unlink_guild(handle, registry);
    }
}

impl GuildChild for Role {
    fn guild_id(&self) -> Option<Id<GuildMarker>> {
        self.guild_id
    }

    fn guild_index(guild: &mut Guild) -> &mut BTreeSet<Id<RoleMarker>> {
        &mut guild.role_ids
    }
}

#[cfg(test)]
mod tests {
    use super::{Permissions, Role};
    use crate::{
        cache::{Encode, Registry},
        types::{field::FieldErrorType, util::test_payload},
    };
    use serde_json::json;
    use serde_test::Token;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, hash::Hash};

    assert_impl_all!(Permissions: Copy, Debug, Eq, Hash, Send, Sync);

    #[test]
    fn permissions_serde() {
        let value = Permissions::ADMINISTRATOR | Permissions::SEND_MESSAGES;
        serde_test::assert_ser_tokens(&value, &[Token::Str("2056")]);
        serde_test::assert_de_tokens(&value, &[Token::Str("2056")]);
        serde_test::assert_de_tokens(&value, &[Token::U64(2056)]);
    }

    #[test]
    fn decode_role() {
        let mut registry = Registry::new();
        let role = registry
            .decode::<Role>(&test_payload(json!({
                "id": "5",
                "guild_id": "5",
                "name": "@everyone",
                "color": 0x00ff00,
                "hoist": true,
                "permissions": "2199023255551",
            })))
            .unwrap();

        let role = role.borrow();
        assert!(role.is_default());
        assert!(role.separated);
        assert_eq!(role.color, 0x00ff00);
        assert!(role.permissions.contains(Permissions::MODERATE_MEMBERS));
        assert_eq!(role.mention(), "<@&5>");
    }

    #[test]
    fn color_out_of_range() {
        let mut registry = Registry::new();
        let error = registry
            .decode::<Role>(&test_payload(json!({"id": "5", "color": 0x1000000})))
            .unwrap_err();

        assert_eq!(*error.kind(), FieldErrorType::Range);
    }

    #[test]
    fn permissions_change_snapshot() {
        let mut registry = Registry::new();
        let role = registry
            .decode::<Role>(&test_payload(json!({"id": "5", "permissions": "8"})))
            .unwrap();

        let changes = registry
            .apply_update(&role, &test_payload(json!({"permissions": "2048"})))
            .unwrap();

        assert_eq!(changes.get("permissions"), Some(&json!("8")));
        assert_eq!(
            changes.get_as::<Permissions>("permissions"),
            Some(Permissions::ADMINISTRATOR)
        );
        assert_eq!(
            serde_json::Value::Object(role.encode(Encode::REQUEST)),
            json!({"name": "", "permissions": "2048"})
        );
        assert!(role.borrow().guild_id.is_none());
    }
}

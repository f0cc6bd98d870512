//! Guilds and the indices of the entities they own.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use crate::{
    cache::{replace, Emit, Entity, Field, GuildChild, Handle, Registry},
    types::{
        auto_moderation::AutoModerationRule,
        channel::Channel,
        field::{self, FieldError, Payload},
        id::{
            marker::{
                AutoModerationRuleMarker, ChannelMarker, GuildMarker, RoleMarker,
                ScheduledEventMarker, StickerMarker, UserMarker,
            },
            Id,
        },
        role::Role,
        scheduled_event::ScheduledEvent,
        sticker::Sticker,
    },
};

const NAME_LENGTH_MAX: usize = 100;

const DESCRIPTION_LENGTH_MAX: usize = 120;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum VerificationLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
    Unknown(u8),
}

impl From<u8> for VerificationLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            4 => Self::VeryHigh,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<VerificationLevel> for u8 {
    fn from(value: VerificationLevel) -> Self {
        match value {
            VerificationLevel::None => 0,
            VerificationLevel::Low => 1,
            VerificationLevel::Medium => 2,
            VerificationLevel::High => 3,
            VerificationLevel::VeryHigh => 4,
            VerificationLevel::Unknown(unknown) => unknown,
        }
    }
}

/// A guild and the IDs of the cached entities it owns.
///
/// The ID sets are maintained by the children themselves: a role, channel,
/// sticker, scheduled event or auto moderation rule adds itself when it is
/// created with this guild's ID and removes itself when deleted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Guild {
    pub id: Id<GuildMarker>,
    pub name: String,
    pub description: Option<String>,
    /// Icon hash.
    pub icon: Option<String>,
    pub owner_id: Option<Id<UserMarker>>,
    pub verification_level: VerificationLevel,
    /// Channel receiving join and boost notices.
    pub system_channel_id: Option<Id<ChannelMarker>>,
    /// Whether the guild is hidden by an outage.
    pub unavailable: bool,
    pub role_ids: BTreeSet<Id<RoleMarker>>,
    pub channel_ids: BTreeSet<Id<ChannelMarker>>,
    pub scheduled_event_ids: BTreeSet<Id<ScheduledEventMarker>>,
    pub sticker_ids: BTreeSet<Id<StickerMarker>>,
    pub auto_moderation_rule_ids: BTreeSet<Id<AutoModerationRuleMarker>>,
}

impl Guild {
    /// Returns the CDN URL for the guild's icon, or `None` if no icon is set.
    pub fn icon_url(&self) -> Option<String> {
        let hash = self.icon.as_ref()?;
        Some(format!(
            "https://cdn.discordapp.com/icons/{}/{}.png",
            self.id, hash
        ))
    }

    /// The `@everyone` role, which shares the guild's ID.
    pub const fn default_role_id(&self) -> Id<RoleMarker> {
        self.id.cast()
    }
}

const FIELDS: &[Field<Guild>] = &[
    Field {
        name: "description",
        keys: &["description"],
        emit: Emit::Always,
        update: |guild, data| {
            let value = field::parse_optional_str(data, "description", DESCRIPTION_LENGTH_MAX)?;
            replace(&mut guild.description, value, "description")
        },
        put: |guild, data, defaults| {
            field::put_optional_str(data, "description", guild.description.as_deref(), defaults)
        },
    },
    Field {
        name: "icon",
        keys: &["icon"],
        emit: Emit::Always,
        update: |guild, data| {
            replace(&mut guild.icon, field::parse_optional_str(data, "icon", 64)?, "icon")
        },
        put: |guild, data, defaults| field::put_optional_str(data, "icon", guild.icon.as_deref(), defaults),
    },
    Field {
        name: "name",
        keys: &["name"],
        emit: Emit::Always,
        update: |guild, data| {
            replace(&mut guild.name, field::parse_str(data, "name", NAME_LENGTH_MAX)?, "name")
        },
        put: |guild, data, _| {
            data.insert("name".to_owned(), Value::String(guild.name.clone()));
        },
    },
    Field {
        name: "owner_id",
        keys: &["owner_id"],
        emit: Emit::Internal,
        update: |guild, data| replace(&mut guild.owner_id, field::parse_id(data, "owner_id")?, "owner_id"),
        put: |guild, data, defaults| field::put_id(data, "owner_id", guild.owner_id, defaults),
    },
    Field {
        name: "system_channel_id",
        keys: &["system_channel_id"],
        emit: Emit::Always,
        update: |guild, data| {
            let value = field::parse_id(data, "system_channel_id")?;
            replace(&mut guild.system_channel_id, value, "system_channel_id")
        },
        put: |guild, data, defaults| {
            field::put_id(data, "system_channel_id", guild.system_channel_id, defaults)
        },
    },
    Field {
        name: "unavailable",
        keys: &["unavailable"],
        emit: Emit::Internal,
        update: |guild, data| {
            let value = field::parse_bool(data, "unavailable", false)?;
            replace(&mut guild.unavailable, value, "unavailable")
        },
        put: |guild, data, defaults| {
            field::put_with_default(data, "unavailable", guild.unavailable, false, defaults)
        },
    },
    Field {
        name: "verification_level",
        keys: &["verification_level"],
        emit: Emit::Always,
        update: |guild, data| {
            let value =
                field::parse_preinstanced(data, "verification_level", VerificationLevel::None)?;
            replace(&mut guild.verification_level, value, "verification_level")
        },
        put: |guild, data, defaults| {
            field::put_with_default(
                data,
                "verification_level",
                u8::from(guild.verification_level),
                0,
                defaults,
            )
        },
    },
];

/// Decode the children listed under `key`, stamping each with the guild's
/// ID since Discord leaves it out of nested objects.
///
/// A present list replaces the guild's index: cached children it covers
/// that are no longer listed are deleted. `covers` picks which indexed
/// children the list is authoritative for, since channels and threads share
/// one index.
fn decode_children<E: GuildChild>(
    guild_id: Id<GuildMarker>,
    data: &Payload,
    key: &'static str,
    covers: fn(&E) -> bool,
    registry: &mut Registry,
) -> Result<(), FieldError> {
    if data.get(key).map_or(true, Value::is_null) {
        return Ok(());
    }

    let mut listed = BTreeSet::new();
    for value in field::parse_array(data, key)? {
        let mut object = value
            .as_object()
            .ok_or(FieldError::type_mismatch(key, "an array of objects"))?
            .clone();
        object.insert("guild_id".to_owned(), Value::String(guild_id.to_string()));

        listed.insert(registry.decode::<E>(&object)?.id());
    }

    let Some(guild) = registry.get::<Guild>(guild_id) else {
        return Ok(());
    };
    let indexed: Vec<Id<E::Marker>> = {
        let mut guild = guild.borrow_mut();
        E::guild_index(&mut guild)
            .iter()
            .copied()
            .filter(|id| !listed.contains(id))
            .collect()
    };

    for id in indexed {
        let stale = registry
            .get::<E>(id)
            .map_or(true, |child| covers(&child.borrow()));

        if stale {
            debug!(kind = E::KIND, %id, guild = %guild_id, "child no longer listed");
            registry.delete_by_id::<E>(id);
            E::guild_index(&mut guild.borrow_mut()).remove(&id);
        }
    }

    Ok(())
}

impl Entity for Guild {
    type Marker = GuildMarker;

    const KIND: &'static str = "guild";

    fn placeholder(id: Id<GuildMarker>) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            icon: None,
            owner_id: None,
            verification_level: VerificationLevel::None,
            system_channel_id: None,
            unavailable: false,
            role_ids: BTreeSet::new(),
            channel_ids: BTreeSet::new(),
            scheduled_event_ids: BTreeSet::new(),
            sticker_ids: BTreeSet::new(),
            auto_moderation_rule_ids: BTreeSet::new(),
        }
    }

    fn id(&self) -> Id<GuildMarker> {
        self.id
    }

    fn fields() -> &'static [Field<Self>] {
        FIELDS
    }

    fn prepare(
        id: Id<GuildMarker>,
        data: &mut Payload,
        registry: &mut Registry,
    ) -> Result<(), FieldError> {
        decode_children::<Role>(id, data, "roles", |_| true, registry)?;
        decode_children::<Channel>(
            id,
            data,
            "channels",
            |channel| !channel.kind.is_thread(),
            registry,
        )?;
        decode_children::<Channel>(
            id,
            data,
            "threads",
            |channel| channel.kind.is_thread(),
            registry,
        )?;
        decode_children::<Sticker>(id, data, "stickers", |_| true, registry)?;
        decode_children::<ScheduledEvent>(
            id,
            data,
            "guild_scheduled_events",
            |_| true,
            registry,
        )?;

        Ok(())
    }

    fn deleted(handle: &Handle<Self>, registry: &mut Registry) {
        let guild = handle.snapshot();
        debug!(guild = %guild.id, "deleting guild children");

        for id in guild.role_ids {
            registry.delete_by_id::<Role>(id);
        }

        for id in guild.channel_ids {
            registry.delete_by_id::<Channel>(id);
        }

        for id in guild.scheduled_event_ids {
            registry.delete_by_id::<ScheduledEvent>(id);
        }

        for id in guild.sticker_ids {
            registry.delete_by_id::<Sticker>(id);
        }

        for id in guild.auto_moderation_rule_ids {
            registry.delete_by_id::<AutoModerationRule>(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Guild, VerificationLevel};
    use crate::{
        cache::{Encode, Registry},
        types::{channel::Channel, id::Id, role::Role, util::test_payload},
    };
    use serde_json::json;

    #[test]
    fn decode_nested_children() {
        let mut registry = Registry::new();
        let guild = registry
            .decode::<Guild>(&test_payload(json!({
                "id": "10",
                "name": "guild",
                "verification_level": 2,
                "roles": [{"id": "10", "name": "@everyone"}, {"id": "11", "name": "mod"}],
                "channels": [{"id": "20", "type": 0, "name": "general"}],
                "threads": [{"id": "21", "type": 11, "name": "thread", "parent_id": "20"}],
            })))
            .unwrap();

        let snapshot = guild.snapshot();
        assert_eq!(snapshot.verification_level, VerificationLevel::Medium);
        assert_eq!(
            snapshot.role_ids.into_iter().collect::<Vec<_>>(),
            vec![Id::new(10), Id::new(11)]
        );
        assert_eq!(
            snapshot.channel_ids.into_iter().collect::<Vec<_>>(),
            vec![Id::new(20), Id::new(21)]
        );

        let role = registry.get::<Role>(Id::new(11)).unwrap();
        assert_eq!(role.borrow().guild_id, Some(Id::new(10)));
        assert_eq!(guild.borrow().default_role_id(), Id::new(10));
    }

    #[test]
    fn nested_list_replaces_index() {
        let mut registry = Registry::new();
        let guild = registry
            .decode::<Guild>(&test_payload(json!({
                "id": "10",
                "name": "guild",
                "roles": [{"id": "10"}, {"id": "11"}],
                "channels": [{"id": "20", "type": 0}, {"id": "22", "type": 0}],
                "threads": [{"id": "21", "type": 11, "parent_id": "20"}],
            })))
            .unwrap();

        let changes = registry
            .apply_update(
                &guild,
                &test_payload(json!({
                    "roles": [{"id": "10"}],
                    "channels": [{"id": "20", "type": 0}],
                })),
            )
            .unwrap();
        assert!(changes.is_empty());

        let snapshot = guild.snapshot();
        assert_eq!(
            snapshot.role_ids.into_iter().collect::<Vec<_>>(),
            vec![Id::new(10)]
        );
        // Threads aren't covered by the channel list.
        assert_eq!(
            snapshot.channel_ids.into_iter().collect::<Vec<_>>(),
            vec![Id::new(20), Id::new(21)]
        );

        // Absent or null lists leave the index alone.
        registry
            .apply_update(&guild, &test_payload(json!({"name": "renamed", "roles": null})))
            .unwrap();
        assert_eq!(guild.borrow().role_ids.len(), 1);
        assert_eq!(guild.borrow().channel_ids.len(), 2);

        // Dropped children stay readable through the identity map.
        assert!(registry.get::<Role>(Id::new(11)).is_some());
    }

    #[test]
    fn nested_child_error_leaves_guild_untouched() {
        let mut registry = Registry::new();
        let result = registry.decode::<Guild>(&test_payload(json!({
            "id": "10",
            "name": "guild",
            "channels": [{"id": "20", "rate_limit_per_user": -1}],
        })));

        assert!(result.is_err());
        assert!(registry.get::<Guild>(Id::new(10)).is_none());
        assert!(registry.get::<Channel>(Id::new(20)).is_none());
    }

    #[test]
    fn encode_request() {
        let mut registry = Registry::new();
        let guild = registry
            .decode::<Guild>(&test_payload(json!({
                "id": "10",
                "name": "guild",
                "icon": "abc",
                "owner_id": "3",
            })))
            .unwrap();

        assert_eq!(
            serde_json::Value::Object(guild.encode(Encode::REQUEST)),
            json!({"icon": "abc", "name": "guild"})
        );
        assert_eq!(
            guild.borrow().icon_url().as_deref(),
            Some("https://cdn.discordapp.com/icons/10/abc.png")
        );
    }
}

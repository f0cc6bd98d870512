//! Guild scheduled events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::{
    cache::{self, replace, Changes, Emit, Entity, Field, GuildChild, Handle, Registry},
    types::{
        field::{self, FieldError, Payload},
        guild::Guild,
        id::{
            marker::{ChannelMarker, GenericMarker, GuildMarker, ScheduledEventMarker, UserMarker},
            Id,
        },
        user::User,
    },
};

const NAME_LENGTH_MAX: usize = 100;

const DESCRIPTION_LENGTH_MAX: usize = 1000;

const LOCATION_LENGTH_MAX: usize = 100;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum PrivacyLevel {
    Public,
    GuildOnly,
    Unknown(u8),
}

impl From<u8> for PrivacyLevel {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Public,
            2 => Self::GuildOnly,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<PrivacyLevel> for u8 {
    fn from(value: PrivacyLevel) -> Self {
        match value {
            PrivacyLevel::Public => 1,
            PrivacyLevel::GuildOnly => 2,
            PrivacyLevel::Unknown(unknown) => unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum ScheduledEventStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
    Unknown(u8),
}

impl From<u8> for ScheduledEventStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Scheduled,
            2 => Self::Active,
            3 => Self::Completed,
            4 => Self::Cancelled,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<ScheduledEventStatus> for u8 {
    fn from(value: ScheduledEventStatus) -> Self {
        match value {
            ScheduledEventStatus::Scheduled => 1,
            ScheduledEventStatus::Active => 2,
            ScheduledEventStatus::Completed => 3,
            ScheduledEventStatus::Cancelled => 4,
            ScheduledEventStatus::Unknown(unknown) => unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum ScheduledEventEntityType {
    StageInstance,
    Voice,
    External,
    Unknown(u8),
}

impl From<u8> for ScheduledEventEntityType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::StageInstance,
            2 => Self::Voice,
            3 => Self::External,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<ScheduledEventEntityType> for u8 {
    fn from(value: ScheduledEventEntityType) -> Self {
        match value {
            ScheduledEventEntityType::StageInstance => 1,
            ScheduledEventEntityType::Voice => 2,
            ScheduledEventEntityType::External => 3,
            ScheduledEventEntityType::Unknown(unknown) => unknown,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScheduledEvent {
    pub id: Id<ScheduledEventMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    /// Stage or voice channel the event takes place in.
    pub channel_id: Option<Id<ChannelMarker>>,
    /// Read-only.
    pub creator_id: Option<Id<UserMarker>>,
    pub name: String,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub privacy_level: PrivacyLevel,
    pub status: ScheduledEventStatus,
    pub entity_type: ScheduledEventEntityType,
    /// ID of the stage instance hosting the event.
    pub entity_id: Option<Id<GenericMarker>>,
    /// Where an external event takes place.
    pub location: Option<String>,
    /// Number of users subscribed to the event.
    pub user_count: u32,
}

impl ScheduledEvent {
    /// Whether the event is over, either completed or cancelled.
    pub const fn is_finished(&self) -> bool {
        matches!(
            self.status,
            ScheduledEventStatus::Completed | ScheduledEventStatus::Cancelled
        )
    }
}

fn parse_location(data: &Payload) -> Result<Option<String>, FieldError> {
    match field::parse_object(data, "entity_metadata")? {
        Some(metadata) => field::parse_optional_str(metadata, "location", LOCATION_LENGTH_MAX),
        None => Ok(None),
    }
}

fn put_location(event: &ScheduledEvent, data: &mut Payload, defaults: bool) {
    match &event.location {
        Some(location) => {
            let mut metadata = Payload::new();
            metadata.insert("location".to_owned(), Value::String(location.clone()));
            data.insert("entity_metadata".to_owned(), Value::Object(metadata));
        }
        None if defaults => {
            data.insert("entity_metadata".to_owned(), Value::Null);
        }
        None => {}
    }
}

const FIELDS: &[Field<ScheduledEvent>] = &[
    Field {
        name: "channel_id",
        keys: &["channel_id"],
        emit: Emit::Always,
        update: |event, data| {
            replace(&mut event.channel_id, field::parse_id(data, "channel_id")?, "channel_id")
        },
        put: |event, data, defaults| field::put_id(data, "channel_id", event.channel_id, defaults),
    },
    Field {
        name: "creator_id",
        keys: &["creator_id"],
        emit: Emit::Never,
        update: |event, data| {
            replace(&mut event.creator_id, field::parse_id(data, "creator_id")?, "creator_id")
        },
        put: |_, _, _| {},
    },
    Field {
        name: "description",
        keys: &["description"],
        emit: Emit::Always,
        update: |event, data| {
            let value = field::parse_optional_str(data, "description", DESCRIPTION_LENGTH_MAX)?;
            replace(&mut event.description, value, "description")
        },
        put: |event, data, defaults| {
            field::put_optional_str(data, "description", event.description.as_deref(), defaults)
        },
    },
    Field {
        name: "end",
        keys: &["scheduled_end_time"],
        emit: Emit::Always,
        update: |event, data| {
            replace(&mut event.end, field::parse_timestamp(data, "scheduled_end_time")?, "end")
        },
        put: |event, data, defaults| {
            field::put_timestamp(data, "scheduled_end_time", event.end.as_ref(), defaults)
        },
    },
    Field {
        name: "entity_id",
        keys: &["entity_id"],
        emit: Emit::Internal,
        update: |event, data| {
            replace(&mut event.entity_id, field::parse_id(data, "entity_id")?, "entity_id")
        },
        put: |event, data, defaults| field::put_id(data, "entity_id", event.entity_id, defaults),
    },
    Field {
        name: "entity_type",
        keys: &["entity_type"],
        emit: Emit::Always,
        update: |event, data| {
            let value = field::parse_preinstanced(
                data,
                "entity_type",
                ScheduledEventEntityType::Unknown(0),
            )?;
            replace(&mut event.entity_type, value, "entity_type")
        },
        put: |event, data, _| {
            data.insert("entity_type".to_owned(), Value::from(u8::from(event.entity_type)));
        },
    },
    Field {
        name: "guild_id",
        keys: &["guild_id"],
        emit: Emit::Internal,
        update: |event, data| replace(&mut event.guild_id, field::parse_id(data, "guild_id")?, "guild_id"),
        put: |event, data, defaults| field::put_id(data, "guild_id", event.guild_id, defaults),
    },
    Field {
        name: "location",
        keys: &["entity_metadata"],
        emit: Emit::Always,
        update: |event, data| replace(&mut event.location, parse_location(data)?, "location"),
        put: put_location,
    },
    Field {
        name: "name",
        keys: &["name"],
        emit: Emit::Always,
        update: |event, data| {
            replace(&mut event.name, field::parse_str(data, "name", NAME_LENGTH_MAX)?, "name")
        },
        put: |event, data, _| {
            data.insert("name".to_owned(), Value::String(event.name.clone()));
        },
    },
    Field {
        name: "privacy_level",
        keys: &["privacy_level"],
        emit: Emit::Always,
        update: |event, data| {
            let value =
                field::parse_preinstanced(data, "privacy_level", PrivacyLevel::GuildOnly)?;
            replace(&mut event.privacy_level, value, "privacy_level")
        },
        // Discord rejects requests without it, default or not.
        put: |event, data, _| {
            data.insert("privacy_level".to_owned(), Value::from(u8::from(event.privacy_level)));
        },
    },
    Field {
        name: "start",
        keys: &["scheduled_start_time"],
        emit: Emit::Always,
        update: |event, data| {
            replace(&mut event.start, field::parse_timestamp(data, "scheduled_start_time")?, "start")
        },
        put: |event, data, defaults| {
            field::put_timestamp(data, "scheduled_start_time", event.start.as_ref(), defaults)
        },
    },
    Field {
        name: "status",
        keys: &["status"],
        emit: Emit::Always,
        update: |event, data| {
            let value =
                field::parse_preinstanced(data, "status", ScheduledEventStatus::Scheduled)?;
            replace(&mut event.status, value, "status")
        },
        put: |event, data, defaults| {
            field::put_with_default(data, "status", u8::from(event.status), 1, defaults)
        },
    },
    Field {
        name: "user_count",
        keys: &["user_count"],
        emit: Emit::Internal,
        update: |event, data| {
            replace(&mut event.user_count, field::parse_integer(data, "user_count", 0)?, "user_count")
        },
        put: |event, data, defaults| {
            field::put_with_default(data, "user_count", event.user_count, 0, defaults)
        },
    },
];

impl Entity for ScheduledEvent {
    type Marker = ScheduledEventMarker;

    const KIND: &'static str = "scheduled_event";

    fn placeholder(id: Id<ScheduledEventMarker>) -> Self {
        Self {
            id,
            guild_id: None,
            channel_id: None,
            creator_id: None,
            name: String::new(),
            description: None,
            start: None,
            end: None,
            privacy_level: PrivacyLevel::GuildOnly,
            status: ScheduledEventStatus::Scheduled,
            entity_type: ScheduledEventEntityType::Unknown(0),
            entity_id: None,
            location: None,
            user_count: 0,
        }
    }

    fn id(&self) -> Id<ScheduledEventMarker> {
        self.id
    }

    fn fields() -> &'static [Field<Self>] {
        FIELDS
    }

    /// The creator comes as a nested user object.
    fn prepare(
        _id: Id<ScheduledEventMarker>,
        data: &mut Payload,
        registry: &mut Registry,
    ) -> Result<(), FieldError> {
        if let Some(creator) = field::parse_object(data, "creator")? {
            if creator.len() > 1 {
                registry.decode::<User>(creator)?;
            } else if let Some(user_id) = field::parse_id(creator, "id")? {
                registry.get_or_create::<User>(user_id);
            }
        }

        Ok(())
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

impl GuildChild for ScheduledEvent {
    fn guild_id(&self) -> Option<Id<GuildMarker>> {
        self.guild_id
    }

    fn guild_index(guild: &mut Guild) -> &mut BTreeSet<Id<ScheduledEventMarker>> {
        &mut guild.scheduled_event_ids
    }
}

#[cfg(test)]
mod tests {
    use super::{PrivacyLevel, ScheduledEvent, ScheduledEventEntityType, ScheduledEventStatus};
    use crate::{
        cache::{Encode, Registry},
        types::{id::Id, user::User, util::test_payload},
    };
    use serde_json::{json, Value};

    fn event_data() -> serde_json::Value {
        json!({
            "id": "40",
            "guild_id": "10",
            "creator_id": "3",
            "creator": {"id": "3", "username": "host"},
            "name": "movie night",
            "scheduled_start_time": "2024-03-01T20:00:00.000000+00:00",
            "privacy_level": 2,
            "status": 1,
            "entity_type": 3,
            "entity_metadata": {"location": "the moon"},
            "user_count": 12,
        })
    }

    #[test]
    fn decode_event() {
        let mut registry = Registry::new();
        let event = registry
            .decode::<ScheduledEvent>(&test_payload(event_data()))
            .unwrap();

        let event = event.borrow();
        assert_eq!(event.entity_type, ScheduledEventEntityType::External);
        assert_eq!(event.location.as_deref(), Some("the moon"));
        assert_eq!(event.user_count, 12);
        assert_eq!(event.start.map(|start| start.timestamp()), Some(1_709_323_200));
        assert!(!event.is_finished());

        let creator = registry.get::<User>(Id::new(3)).unwrap();
        assert_eq!(creator.borrow().name, "host");
    }

    #[test]
    fn privacy_level_is_always_encoded() {
        let mut registry = Registry::new();
        let event = registry
            .decode::<ScheduledEvent>(&test_payload(event_data()))
            .unwrap();

        let request = event.encode(Encode::REQUEST);
        assert_eq!(request.get("privacy_level"), Some(&json!(2)));
        assert!(!request.contains_key("status"));
        assert!(!request.contains_key("creator_id"));
        assert_eq!(
            request.get("entity_metadata"),
            Some(&json!({"location": "the moon"}))
        );
        assert_eq!(
            request.get("scheduled_start_time"),
            Some(&json!("2024-03-01T20:00:00.000000+00:00"))
        );
    }

    #[test]
    fn status_update() {
        let mut registry = Registry::new();
        let event = registry
            .decode::<ScheduledEvent>(&test_payload(event_data()))
            .unwrap();

        let changes = registry
            .apply_update(
                &event,
                &test_payload(json!({"status": 3, "entity_metadata": null})),
            )
            .unwrap();

        assert_eq!(
            changes.get_as::<ScheduledEventStatus>("status"),
            Some(ScheduledEventStatus::Scheduled)
        );
        assert_eq!(changes.get("location"), Some(&json!("the moon")));
        assert!(event.borrow().is_finished());
        assert_eq!(event.borrow().privacy_level, PrivacyLevel::GuildOnly);
        assert_eq!(
            event.encode(Encode::FULL).get("entity_metadata"),
            Some(&Value::Null)
        );
    }
}

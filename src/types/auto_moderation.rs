//! Auto moderation rules.
//!
//! A rule pairs a trigger (keywords, a keyword preset, mention spam, ...)
//! with the actions Discord takes when it fires. Trigger metadata and
//! actions are plain values compared by content; only the rule itself is
//! cached.

use serde::{
    de::{Deserializer, Error as DeError},
    Deserialize, Serialize, Serializer,
};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::{
    cache::{self, replace, Changes, Emit, Entity, Field, GuildChild, Handle, Registry},
    types::{
        field::{self, FieldError, Payload},
        guild::Guild,
        id::{
            marker::{AutoModerationRuleMarker, ChannelMarker, GuildMarker, RoleMarker, UserMarker},
            Id,
        },
    },
};

const NAME_LENGTH_MAX: usize = 100;

const CUSTOM_MESSAGE_LENGTH_MAX: usize = 150;

/// Longest timeout an action may apply, 28 days.
pub const TIMEOUT_DURATION_MAX: u32 = 2_419_200;

/// Most mentions a mention spam trigger may allow.
pub const MENTION_LIMIT_MAX: u8 = 50;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum AutoModerationEventType {
    /// Not bound to any event.
    None,
    /// When a member sends or edits a message.
    MessageSend,
    /// When a member edits their profile.
    MemberUpdate,
    Unknown(u8),
}

impl From<u8> for AutoModerationEventType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::MessageSend,
            2 => Self::MemberUpdate,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<AutoModerationEventType> for u8 {
    fn from(value: AutoModerationEventType) -> Self {
        match value {
            AutoModerationEventType::None => 0,
            AutoModerationEventType::MessageSend => 1,
            AutoModerationEventType::MemberUpdate => 2,
            AutoModerationEventType::Unknown(unknown) => unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum AutoModerationTriggerType {
    Keyword,
    HarmfulLink,
    Spam,
    KeywordPreset,
    MentionSpam,
    MemberProfile,
    Unknown(u8),
}

impl From<u8> for AutoModerationTriggerType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Keyword,
            2 => Self::HarmfulLink,
            3 => Self::Spam,
            4 => Self::KeywordPreset,
            5 => Self::MentionSpam,
            6 => Self::MemberProfile,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<AutoModerationTriggerType> for u8 {
    fn from(value: AutoModerationTriggerType) -> Self {
        match value {
            AutoModerationTriggerType::Keyword => 1,
            AutoModerationTriggerType::HarmfulLink => 2,
            AutoModerationTriggerType::Spam => 3,
            AutoModerationTriggerType::KeywordPreset => 4,
            AutoModerationTriggerType::MentionSpam => 5,
            AutoModerationTriggerType::MemberProfile => 6,
            AutoModerationTriggerType::Unknown(unknown) => unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum AutoModerationKeywordPresetType {
    Profanity,
    SexualContent,
    Slurs,
    Unknown(u8),
}

impl From<u8> for AutoModerationKeywordPresetType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Profanity,
            2 => Self::SexualContent,
            3 => Self::Slurs,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<AutoModerationKeywordPresetType> for u8 {
    fn from(value: AutoModerationKeywordPresetType) -> Self {
        match value {
            AutoModerationKeywordPresetType::Profanity => 1,
            AutoModerationKeywordPresetType::SexualContent => 2,
            AutoModerationKeywordPresetType::Slurs => 3,
            AutoModerationKeywordPresetType::Unknown(unknown) => unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger metadata
// ---------------------------------------------------------------------------

/// Extra data a trigger needs, detected from the keys Discord sends.
///
/// List members are kept sorted and deduplicated so two metadata values
/// holding the same entries compare equal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TriggerMetadata {
    Keyword {
        keywords: Vec<String>,
        regex_patterns: Vec<String>,
        allowed_keywords: Vec<String>,
    },
    KeywordPreset {
        presets: Vec<AutoModerationKeywordPresetType>,
        allowed_keywords: Vec<String>,
    },
    MentionSpam {
        mention_limit: u8,
        raid_protection: bool,
    },
}

fn parse_string_set(data: &Payload, key: &'static str) -> Result<Vec<String>, FieldError> {
    let mut values = field::parse_array(data, key)?
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(str::to_owned)
                .ok_or(FieldError::type_mismatch(key, "an array of strings"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    values.sort_unstable();
    values.dedup();

    Ok(values)
}

fn string_array(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

impl TriggerMetadata {
    /// Detect and parse trigger metadata. An object with no known key is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if a known key holds a malformed value.
    pub fn from_data(data: &Payload) -> Result<Option<Self>, FieldError> {
        if field::contains_any(data, &["keyword_filter", "regex_patterns"]) {
            return Ok(Some(Self::Keyword {
                keywords: parse_string_set(data, "keyword_filter")?,
                regex_patterns: parse_string_set(data, "regex_patterns")?,
                allowed_keywords: parse_string_set(data, "allow_list")?,
            }));
        }

        if data.contains_key("presets") {
            let mut presets = field::parse_array(data, "presets")?
                .iter()
                .map(|value| match value.as_u64().map(u8::try_from) {
                    Some(Ok(raw)) => Ok(AutoModerationKeywordPresetType::from(raw)),
                    Some(Err(_)) => Err(FieldError::range("presets")),
                    None => Err(FieldError::type_mismatch("presets", "an array of integers")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            presets.sort_unstable();
            presets.dedup();

            return Ok(Some(Self::KeywordPreset {
                presets,
                allowed_keywords: parse_string_set(data, "allow_list")?,
            }));
        }

        if data.contains_key("mention_total_limit") {
            return Ok(Some(Self::MentionSpam {
                mention_limit: field::parse_bounded(
                    data,
                    "mention_total_limit",
                    0,
                    0,
                    MENTION_LIMIT_MAX,
                )?,
                raid_protection: field::parse_bool(data, "mention_raid_protection_enabled", false)?,
            }));
        }

        Ok(None)
    }

    /// Convert into the payload Discord expects. Every key of the variant is
    /// written, empty lists included.
    pub fn to_data(&self) -> Payload {
        let mut data = Payload::new();

        match self {
            Self::Keyword {
                keywords,
                regex_patterns,
                allowed_keywords,
            } => {
                data.insert("keyword_filter".to_owned(), string_array(keywords));
                data.insert("regex_patterns".to_owned(), string_array(regex_patterns));
                data.insert("allow_list".to_owned(), string_array(allowed_keywords));
            }
            Self::KeywordPreset {
                presets,
                allowed_keywords,
            } => {
                let presets = presets
                    .iter()
                    .map(|preset| Value::from(u8::from(*preset)))
                    .collect();
                data.insert("presets".to_owned(), Value::Array(presets));
                data.insert("allow_list".to_owned(), string_array(allowed_keywords));
            }
            Self::MentionSpam {
                mention_limit,
                raid_protection,
            } => {
                data.insert("mention_total_limit".to_owned(), Value::from(*mention_limit));
                data.insert(
                    "mention_raid_protection_enabled".to_owned(),
                    Value::Bool(*raid_protection),
                );
            }
        }

        data
    }
}

impl Serialize for TriggerMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_data().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TriggerMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = Payload::deserialize(deserializer)?;

        TriggerMetadata::from_data(&data)
            .map_err(DeError::custom)?
            .ok_or_else(|| DeError::custom("trigger metadata has no known key"))
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What Discord does when a rule fires.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AutoModerationAction {
    BlockMessage {
        /// Shown to the member whose message was blocked.
        custom_message: Option<String>,
    },
    SendAlertMessage {
        channel_id: Id<ChannelMarker>,
    },
    Timeout {
        duration_seconds: u32,
    },
    BlockMemberInteraction,
    Unknown(u8),
}

impl AutoModerationAction {
    /// Wire value of the action's type.
    pub const fn kind(&self) -> u8 {
        match self {
            Self::BlockMessage { .. } => 1,
            Self::SendAlertMessage { .. } => 2,
            Self::Timeout { .. } => 3,
            Self::BlockMemberInteraction => 4,
            Self::Unknown(unknown) => *unknown,
        }
    }

    /// Parse an action object.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if the type or its metadata is malformed.
    pub fn from_data(data: &Payload) -> Result<Self, FieldError> {
        let kind = field::parse_integer::<u8>(data, "type", 0)?;
        let empty = Payload::new();
        let metadata = field::parse_object(data, "metadata")?.unwrap_or(&empty);

        Ok(match kind {
            1 => Self::BlockMessage {
                custom_message: field::parse_optional_str(
                    metadata,
                    "custom_message",
                    CUSTOM_MESSAGE_LENGTH_MAX,
                )?,
            },
            2 => Self::SendAlertMessage {
                channel_id: field::parse_id(metadata, "channel_id")?
                    .ok_or(FieldError::missing("channel_id"))?,
            },
            3 => Self::Timeout {
                duration_seconds: field::parse_bounded(
                    metadata,
                    "duration_seconds",
                    0,
                    0,
                    TIMEOUT_DURATION_MAX,
                )?,
            },
            4 => Self::BlockMemberInteraction,
            unknown => Self::Unknown(unknown),
        })
    }

    /// Convert into the payload Discord expects.
    pub fn to_data(&self) -> Payload {
        let mut metadata = Payload::new();

        match self {
            Self::BlockMessage { custom_message } => {
                if let Some(message) = custom_message {
                    metadata.insert("custom_message".to_owned(), Value::String(message.clone()));
                }
            }
            Self::SendAlertMessage { channel_id } => {
                field::put_id(&mut metadata, "channel_id", Some(*channel_id), false);
            }
            Self::Timeout { duration_seconds } => {
                metadata.insert("duration_seconds".to_owned(), Value::from(*duration_seconds));
            }
            Self::BlockMemberInteraction | Self::Unknown(_) => {}
        }

        let mut data = Payload::new();
        data.insert("type".to_owned(), Value::from(self.kind()));
        data.insert("metadata".to_owned(), Value::Object(metadata));

        data
    }
}

impl Serialize for AutoModerationAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_data().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AutoModerationAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = Payload::deserialize(deserializer)?;

        AutoModerationAction::from_data(&data).map_err(DeError::custom)
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AutoModerationRule {
    pub id: Id<AutoModerationRuleMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    /// User who created the rule. Read-only.
    pub creator_id: Option<Id<UserMarker>>,
    pub name: String,
    pub enabled: bool,
    pub event_type: AutoModerationEventType,
    pub trigger_type: AutoModerationTriggerType,
    pub trigger_metadata: Option<TriggerMetadata>,
    pub actions: Vec<AutoModerationAction>,
    /// Channels the rule doesn't apply in, sorted.
    pub excluded_channel_ids: Vec<Id<ChannelMarker>>,
    /// Roles the rule doesn't apply to, sorted.
    pub excluded_role_ids: Vec<Id<RoleMarker>>,
}

impl AutoModerationRule {
    /// Whether messages in a channel are exempt from the rule.
    pub fn is_channel_excluded(&self, channel_id: Id<ChannelMarker>) -> bool {
        self.excluded_channel_ids.binary_search(&channel_id).is_ok()
    }

    /// Whether members with a role are exempt from the rule.
    pub fn is_role_excluded(&self, role_id: Id<RoleMarker>) -> bool {
        self.excluded_role_ids.binary_search(&role_id).is_ok()
    }
}

fn parse_actions(data: &Payload) -> Result<Vec<AutoModerationAction>, FieldError> {
    field::parse_array(data, "actions")?
        .iter()
        .map(|value| {
            value
                .as_object()
                .ok_or(FieldError::type_mismatch("actions", "an array of objects"))
                .and_then(AutoModerationAction::from_data)
        })
        .collect()
}

fn parse_trigger_metadata(data: &Payload) -> Result<Option<TriggerMetadata>, FieldError> {
    match field::parse_object(data, "trigger_metadata")? {
        Some(metadata) => TriggerMetadata::from_data(metadata),
        None => Ok(None),
    }
}

const FIELDS: &[Field<AutoModerationRule>] = &[
    Field {
        name: "actions",
        keys: &["actions"],
        emit: Emit::Always,
        update: |rule, data| replace(&mut rule.actions, parse_actions(data)?, "actions"),
        put: |rule, data, _| {
            let actions = rule
                .actions
                .iter()
                .map(|action| Value::Object(action.to_data()))
                .collect();
            data.insert("actions".to_owned(), Value::Array(actions));
        },
    },
    Field {
        name: "creator_id",
        keys: &["creator_id"],
        emit: Emit::Never,
        update: |rule, data| {
            replace(&mut rule.creator_id, field::parse_id(data, "creator_id")?, "creator_id")
        },
        put: |_, _, _| {},
    },
    Field {
        name: "enabled",
        keys: &["enabled"],
        emit: Emit::Always,
        update: |rule, data| replace(&mut rule.enabled, field::parse_bool(data, "enabled", false)?, "enabled"),
        put: |rule, data, _| {
            data.insert("enabled".to_owned(), Value::Bool(rule.enabled));
        },
    },
    Field {
        name: "event_type",
        keys: &["event_type"],
        emit: Emit::Always,
        update: |rule, data| {
            let value = field::parse_preinstanced(
                data,
                "event_type",
                AutoModerationEventType::MessageSend,
            )?;
            replace(&mut rule.event_type, value, "event_type")
        },
        put: |rule, data, _| {
            data.insert("event_type".to_owned(), Value::from(u8::from(rule.event_type)));
        },
    },
    Field {
        name: "excluded_channel_ids",
        keys: &["exempt_channels"],
        emit: Emit::Always,
        update: |rule, data| {
            let value = field::parse_id_array(data, "exempt_channels")?;
            replace(&mut rule.excluded_channel_ids, value, "excluded_channel_ids")
        },
        put: |rule, data, _| field::put_id_array(data, "exempt_channels", &rule.excluded_channel_ids),
    },
    Field {
        name: "excluded_role_ids",
        keys: &["exempt_roles"],
        emit: Emit::Always,
        update: |rule, data| {
            let value = field::parse_id_array(data, "exempt_roles")?;
            replace(&mut rule.excluded_role_ids, value, "excluded_role_ids")
        },
        put: |rule, data, _| field::put_id_array(data, "exempt_roles", &rule.excluded_role_ids),
    },
    Field {
        name: "guild_id",
        keys: &["guild_id"],
        emit: Emit::Internal,
        update: |rule, data| replace(&mut rule.guild_id, field::parse_id(data, "guild_id")?, "guild_id"),
        put: |rule, data, defaults| field::put_id(data, "guild_id", rule.guild_id, defaults),
    },
    Field {
        name: "name",
        keys: &["name"],
        emit: Emit::Always,
        update: |rule, data| replace(&mut rule.name, field::parse_str(data, "name", NAME_LENGTH_MAX)?, "name"),
        put: |rule, data, _| {
            data.insert("name".to_owned(), Value::String(rule.name.clone()));
        },
    },
    Field {
        name: "trigger_metadata",
        keys: &["trigger_metadata"],
        emit: Emit::Always,
        update: |rule, data| {
            replace(&mut rule.trigger_metadata, parse_trigger_metadata(data)?, "trigger_metadata")
        },
        put: |rule, data, _| {
            let metadata = rule
                .trigger_metadata
                .as_ref()
                .map(TriggerMetadata::to_data)
                .unwrap_or_default();
            data.insert("trigger_metadata".to_owned(), Value::Object(metadata));
        },
    },
    Field {
        name: "trigger_type",
        keys: &["trigger_type"],
        emit: Emit::Always,
        update: |rule, data| {
            let value =
                field::parse_preinstanced(data, "trigger_type", AutoModerationTriggerType::Unknown(0))?;
            replace(&mut rule.trigger_type, value, "trigger_type")
        },
        put: |rule, data, _| {
            data.insert("trigger_type".to_owned(), Value::from(u8::from(rule.trigger_type)));
        },
    },
];

impl Entity for AutoModerationRule {
    type Marker = AutoModerationRuleMarker;

    const KIND: &'static str = "auto_moderation_rule";

    fn placeholder(id: Id<AutoModerationRuleMarker>) -> Self {
        Self {
            id,
            guild_id: None,
            creator_id: None,
            name: String::new(),
            enabled: false,
            event_type: AutoModerationEventType::MessageSend,
            trigger_type: AutoModerationTriggerType::Unknown(0),
            trigger_metadata: None,
            actions: Vec::new(),
            excluded_channel_ids: Vec::new(),
            excluded_role_ids: Vec::new(),
        }
    }

    fn id(&self) -> Id<AutoModerationRuleMarker> {
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

impl GuildChild for AutoModerationRule {
    fn guild_id(&self) -> Option<Id<GuildMarker>> {
        self.guild_id
    }

    fn guild_index(guild: &mut Guild) -> &mut BTreeSet<Id<AutoModerationRuleMarker>> {
        &mut guild.auto_moderation_rule_ids
    }
}

//! Stickers, both guild stickers and standard pack stickers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::{
    cache::{self, replace, Changes, Emit, Entity, Field, GuildChild, Handle, Registry},
    types::{
        field::{self, FieldError, Payload},
        guild::Guild,
        id::{
            marker::{GuildMarker, StickerMarker, StickerPackMarker, UserMarker},
            Id,
        },
        user::User,
    },
};

const NAME_LENGTH_MAX: usize = 30;

const DESCRIPTION_LENGTH_MAX: usize = 100;

const TAGS_LENGTH_MAX: usize = 200;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum StickerType {
    /// Official sticker in a pack.
    Standard,
    /// Sticker uploaded to a guild.
    Guild,
    Unknown(u8),
}

impl From<u8> for StickerType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Standard,
            2 => Self::Guild,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<StickerType> for u8 {
    fn from(value: StickerType) -> Self {
        match value {
            StickerType::Standard => 1,
            StickerType::Guild => 2,
            StickerType::Unknown(unknown) => unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum StickerFormatType {
    Png,
    Apng,
    Lottie,
    Gif,
    Unknown(u8),
}

impl StickerFormatType {
    /// File extension of the sticker's image on the CDN.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Lottie => "json",
            Self::Gif => "gif",
            Self::Png | Self::Apng | Self::Unknown(_) => "png",
        }
    }
}

impl From<u8> for StickerFormatType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Png,
            2 => Self::Apng,
            3 => Self::Lottie,
            4 => Self::Gif,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl From<StickerFormatType> for u8 {
    fn from(value: StickerFormatType) -> Self {
        match value {
            StickerFormatType::Png => 1,
            StickerFormatType::Apng => 2,
            StickerFormatType::Lottie => 3,
            StickerFormatType::Gif => 4,
            StickerFormatType::Unknown(unknown) => unknown,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sticker {
    pub id: Id<StickerMarker>,
    pub name: String,
    pub description: Option<String>,
    /// Autocomplete keywords, sorted and deduplicated.
    pub tags: Vec<String>,
    pub kind: StickerType,
    pub format: StickerFormatType,
    /// Whether the sticker can be used; guild stickers can go unavailable
    /// when the guild loses boosts.
    pub available: bool,
    pub guild_id: Option<Id<GuildMarker>>,
    pub pack_id: Option<Id<StickerPackMarker>>,
    /// Sorting position within the pack.
    pub sort_value: u32,
    /// Uploader. Read-only.
    pub user_id: Option<Id<UserMarker>>,
}

impl Sticker {
    /// Returns the CDN URL of the sticker's image.
    pub fn url(&self) -> String {
        format!(
            "https://media.discordapp.net/stickers/{}.{}",
            self.id,
            self.format.extension()
        )
    }
}

/// Parse the comma separated tag string.
fn parse_tags(data: &Payload) -> Result<Vec<String>, FieldError> {
    let raw = field::parse_str(data, "tags", TAGS_LENGTH_MAX)?;

    let mut tags: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect();
    tags.sort_unstable();
    tags.dedup();

    Ok(tags)
}

fn parse_user_id(data: &Payload) -> Result<Option<Id<UserMarker>>, FieldError> {
    match field::parse_object(data, "user")? {
        Some(user) => field::parse_id(user, "id"),
        None => Ok(None),
    }
}

const FIELDS: &[Field<Sticker>] = &[
    Field {
        name: "available",
        keys: &["available"],
        emit: Emit::Internal,
        update: |sticker, data| {
            replace(&mut sticker.available, field::parse_bool(data, "available", true)?, "available")
        },
        put: |sticker, data, defaults| {
            field::put_with_default(data, "available", sticker.available, true, defaults)
        },
    },
    Field {
        name: "description",
        keys: &["description"],
        emit: Emit::Always,
        update: |sticker, data| {
            let value = field::parse_optional_str(data, "description", DESCRIPTION_LENGTH_MAX)?;
            replace(&mut sticker.description, value, "description")
        },
        put: |sticker, data, defaults| {
            field::put_optional_str(data, "description", sticker.description.as_deref(), defaults)
        },
    },
    Field {
        name: "format",
        keys: &["format_type"],
        emit: Emit::Internal,
        update: |sticker, data| {
            let value = field::parse_preinstanced(data, "format_type", StickerFormatType::Png)?;
            replace(&mut sticker.format, value, "format")
        },
        put: |sticker, data, defaults| {
            field::put_with_default(data, "format_type", u8::from(sticker.format), 1, defaults)
        },
    },
    Field {
        name: "guild_id",
        keys: &["guild_id"],
        emit: Emit::Internal,
        update: |sticker, data| {
            replace(&mut sticker.guild_id, field::parse_id(data, "guild_id")?, "guild_id")
        },
        put: |sticker, data, defaults| field::put_id(data, "guild_id", sticker.guild_id, defaults),
    },
    Field {
        name: "kind",
        keys: &["type"],
        emit: Emit::Internal,
        update: |sticker, data| {
            let value = field::parse_preinstanced(data, "type", StickerType::Guild)?;
            replace(&mut sticker.kind, value, "kind")
        },
        put: |sticker, data, _| {
            data.insert("type".to_owned(), Value::from(u8::from(sticker.kind)));
        },
    },
    Field {
        name: "name",
        keys: &["name"],
        emit: Emit::Always,
        update: |sticker, data| {
            replace(&mut sticker.name, field::parse_str(data, "name", NAME_LENGTH_MAX)?, "name")
        },
        put: |sticker, data, _| {
            data.insert("name".to_owned(), Value::String(sticker.name.clone()));
        },
    },
    Field {
        name: "pack_id",
        keys: &["pack_id"],
        emit: Emit::Internal,
        update: |sticker, data| {
            replace(&mut sticker.pack_id, field::parse_id(data, "pack_id")?, "pack_id")
        },
        put: |sticker, data, defaults| field::put_id(data, "pack_id", sticker.pack_id, defaults),
    },
    Field {
        name: "sort_value",
        keys: &["sort_value"],
        emit: Emit::Internal,
        update: |sticker, data| {
            let value = field::parse_integer(data, "sort_value", 0)?;
            replace(&mut sticker.sort_value, value, "sort_value")
        },
        put: |sticker, data, defaults| {
            field::put_with_default(data, "sort_value", sticker.sort_value, 0, defaults)
        },
    },
    Field {
        name: "tags",
        keys: &["tags"],
        emit: Emit::Always,
        update: |sticker, data| replace(&mut sticker.tags, parse_tags(data)?, "tags"),
        put: |sticker, data, _| {
            data.insert("tags".to_owned(), Value::String(sticker.tags.join(", ")));
        },
    },
    Field {
        name: "user_id",
        keys: &["user"],
        emit: Emit::Never,
        update: |sticker, data| replace(&mut sticker.user_id, parse_user_id(data)?, "user_id"),
        put: |_, _, _| {},
    },
];

impl Entity for Sticker {
    type Marker = StickerMarker;

    const KIND: &'static str = "sticker";

    fn placeholder(id: Id<StickerMarker>) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            tags: Vec::new(),
            kind: StickerType::Guild,
            format: StickerFormatType::Png,
            available: true,
            guild_id: None,
            pack_id: None,
            sort_value: 0,
            user_id: None,
        }
    }

    fn id(&self) -> Id<StickerMarker> {
        self.id
    }

    fn fields() -> &'static [Field<Self>] {
        FIELDS
    }

    fn prepare(
        _id: Id<StickerMarker>,
        data: &mut Payload,
        registry: &mut Registry,
    ) -> Result<(), FieldError> {
        if let Some(user) = field::parse_object(data, "user")? {
            if user.len() > 1 {
                registry.decode::<User>(user)?;
            } else if let Some(user_id) = field::parse_id(user, "id")? {
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

impl GuildChild for Sticker {
    fn guild_id(&self) -> Option<Id<GuildMarker>> {
        self.guild_id
    }

    fn guild_index(guild: &mut Guild) -> &mut BTreeSet<Id<StickerMarker>> {
        &mut guild.sticker_ids
    }
}

#[cfg(test)]
mod tests {
    use super::{Sticker, StickerFormatType, StickerType};
    use crate::{
        cache::{Encode, Registry},
        types::{guild::Guild, id::Id, user::User, util::test_payload},
    };
    use serde_json::json;

    #[test]
    fn decode_sticker() {
        let mut registry = Registry::new();
        let sticker = registry
            .decode::<Sticker>(&test_payload(json!({
                "id": "50",
                "name": "wave",
                "tags": "wave, hello,hello , ",
                "type": 2,
                "format_type": 3,
                "guild_id": "10",
                "user": {"id": "3", "username": "uploader"},
            })))
            .unwrap();

        {
            let sticker = sticker.borrow();
            assert_eq!(sticker.tags, vec!["hello".to_owned(), "wave".to_owned()]);
            assert_eq!(sticker.kind, StickerType::Guild);
            assert_eq!(sticker.format, StickerFormatType::Lottie);
            assert!(sticker.available);
            assert_eq!(sticker.user_id, Some(Id::new(3)));
            assert_eq!(sticker.url(), "https://media.discordapp.net/stickers/50.json");
        }

        assert!(!registry.get::<User>(Id::new(3)).unwrap().is_partial());
        let guild = registry.get::<Guild>(Id::new(10)).unwrap();
        assert!(guild.is_partial());
        assert!(guild.borrow().sticker_ids.contains(&Id::new(50)));
    }

    #[test]
    fn encode_request_skips_read_only_fields() {
        let mut registry = Registry::new();
        let sticker = registry
            .decode::<Sticker>(&test_payload(json!({
                "id": "50",
                "name": "wave",
                "tags": "wave",
                "available": false,
                "user": {"id": "3"},
            })))
            .unwrap();

        assert_eq!(
            serde_json::Value::Object(sticker.encode(Encode::REQUEST)),
            json!({"name": "wave", "tags": "wave"})
        );

        let full = sticker.encode(Encode::FULL);
        assert_eq!(full.get("available"), Some(&json!(false)));
        assert!(!full.contains_key("user"));
    }

    #[test]
    fn uploader_with_only_id_is_reserved() {
        let mut registry = Registry::new();
        registry
            .decode::<User>(&test_payload(json!({"id": "3", "username": "uploader"})))
            .unwrap();
        registry
            .decode::<Sticker>(&test_payload(json!({
                "id": "50",
                "name": "wave",
                "user": {"id": "3"},
            })))
            .unwrap();

        // The cached uploader isn't overwritten by the bare reference.
        assert_eq!(registry.get::<User>(Id::new(3)).unwrap().borrow().name, "uploader");

        registry
            .decode::<Sticker>(&test_payload(json!({
                "id": "51",
                "name": "hi",
                "user": {"id": "4"},
            })))
            .unwrap();
        let user = registry.get::<User>(Id::new(4)).unwrap();
        assert!(user.is_partial());
    }
}

//! Users.

use serde_json::Value;

use crate::{
    cache::{replace, Emit, Entity, Field},
    types::{
        field::{self, FieldError, Payload},
        id::{marker::UserMarker, Id},
    },
};

/// Maximum length of a username or global display name.
pub const NAME_LENGTH_MAX: usize = 32;

/// Maximum length of an avatar hash.
const AVATAR_LENGTH_MAX: usize = 64;

/// A Discord user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct User {
    pub id: Id<UserMarker>,
    /// Unique username.
    pub name: String,
    /// Legacy four digit discriminator; `0` for migrated accounts.
    pub discriminator: u16,
    /// Avatar hash.
    pub avatar: Option<String>,
    /// Display name shown instead of the username, if set.
    pub global_name: Option<String>,
    pub bot: bool,
}

impl User {
    /// Returns the CDN URL for the user's avatar, or `None` if no avatar is set.
    pub fn avatar_url(&self) -> Option<String> {
        let hash = self.avatar.as_ref()?;
        Some(format!(
            "https://cdn.discordapp.com/avatars/{}/{}.png",
            self.id, hash
        ))
    }

    /// `Username#Discriminator` or just `Username` for the new username system.
    pub fn full_name(&self) -> String {
        if self.discriminator == 0 {
            self.name.clone()
        } else {
            format!("{}#{:04}", self.name, self.discriminator)
        }
    }

    /// Name to display: the global name if set, the username otherwise.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.name)
    }

    /// Mention of the user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

fn parse_discriminator(data: &Payload) -> Result<u16, FieldError> {
    const KEY: &str = "discriminator";

    match data.get(KEY) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::String(raw)) => match raw.parse::<u16>() {
            Ok(value) if value <= 9999 => Ok(value),
            Ok(_) => Err(FieldError::range(KEY)),
            Err(source) => Err(FieldError::format(KEY, source)),
        },
        Some(_) => Err(FieldError::type_mismatch(KEY, "a string of digits")),
    }
}

fn put_discriminator(user: &User, data: &mut Payload, defaults: bool) {
    let value = if user.discriminator == 0 {
        "0".to_owned()
    } else {
        format!("{:04}", user.discriminator)
    };

    field::put_with_default(data, "discriminator", value, "0".to_owned(), defaults);
}

const FIELDS: &[Field<User>] = &[
    Field {
        name: "avatar",
        keys: &["avatar"],
        emit: Emit::Always,
        update: |user, data| {
            let value = field::parse_optional_str(data, "avatar", AVATAR_LENGTH_MAX)?;
            replace(&mut user.avatar, value, "avatar")
        },
        put: |user, data, defaults| {
            field::put_optional_str(data, "avatar", user.avatar.as_deref(), defaults)
        },
    },
    Field {
        name: "bot",
        keys: &["bot"],
        emit: Emit::Internal,
        update: |user, data| replace(&mut user.bot, field::parse_bool(data, "bot", false)?, "bot"),
        put: |user, data, defaults| field::put_with_default(data, "bot", user.bot, false, defaults),
    },
    Field {
        name: "discriminator",
        keys: &["discriminator"],
        emit: Emit::Always,
        update: |user, data| {
            replace(&mut user.discriminator, parse_discriminator(data)?, "discriminator")
        },
        put: put_discriminator,
    },
    Field {
        name: "global_name",
        keys: &["global_name"],
        emit: Emit::Always,
        update: |user, data| {
            let value = field::parse_optional_str(data, "global_name", NAME_LENGTH_MAX)?;
            replace(&mut user.global_name, value, "global_name")
        },
        put: |user, data, defaults| {
            field::put_optional_str(data, "global_name", user.global_name.as_deref(), defaults)
        },
    },
    Field {
        name: "name",
        keys: &["username"],
        emit: Emit::Always,
        update: |user, data| {
            let value = field::parse_str(data, "username", NAME_LENGTH_MAX)?;
            replace(&mut user.name, value, "name")
        },
        put: |user, data, _| {
            data.insert("username".to_owned(), Value::String(user.name.clone()));
        },
    },
];

impl Entity for User {
    type Marker = UserMarker;

    const KIND: &'static str = "user";

    fn placeholder(id: Id<UserMarker>) -> Self {
        Self {
            id,
            name: String::new(),
            discriminator: 0,
            avatar: None,
            global_name: None,
            bot: false,
        }
    }

    fn id(&self) -> Id<UserMarker> {
        self.id
    }

    fn fields() -> &'static [Field<Self>] {
        FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::User;
    use crate::{
        cache::{Encode, Registry},
        types::{id::Id, util::test_payload},
    };
    use serde_json::json;

    #[test]
    fn decode_reads_every_field() {
        let mut registry = Registry::new();
        let user = registry
            .decode::<User>(&test_payload(json!({
                "id": "202209140022",
                "username": "orin",
                "discriminator": "0042",
                "avatar": "a_1234",
                "global_name": "Orin",
                "bot": true,
            })))
            .unwrap();

        let user = user.borrow();
        assert_eq!(user.id, Id::new(202_209_140_022));
        assert_eq!(user.name, "orin");
        assert_eq!(user.discriminator, 42);
        assert_eq!(user.avatar.as_deref(), Some("a_1234"));
        assert_eq!(user.display_name(), "Orin");
        assert!(user.bot);
        assert_eq!(user.full_name(), "orin#0042");
        assert_eq!(user.mention(), "<@202209140022>");
        assert_eq!(
            user.avatar_url().as_deref(),
            Some("https://cdn.discordapp.com/avatars/202209140022/a_1234.png")
        );
    }

    #[test]
    fn discriminator_validation() {
        let mut registry = Registry::new();
        assert!(registry
            .decode::<User>(&test_payload(json!({"id": "1", "discriminator": "10000"})))
            .is_err());
        assert!(registry
            .decode::<User>(&test_payload(json!({"id": "1", "discriminator": 12})))
            .is_err());
        assert!(registry
            .decode::<User>(&test_payload(json!({"id": "1", "discriminator": "ab"})))
            .is_err());
    }

    #[test]
    fn encode_skips_defaults_and_bot_flag() {
        let mut registry = Registry::new();
        let user = registry
            .decode::<User>(&test_payload(json!({"id": "3", "username": "new", "discriminator": "0"})))
            .unwrap();

        assert_eq!(
            serde_json::Value::Object(user.encode(Encode::REQUEST)),
            json!({"username": "new"})
        );
        assert_eq!(
            serde_json::Value::Object(user.encode(Encode::FULL)),
            json!({
                "id": "3",
                "avatar": null,
                "bot": false,
                "discriminator": "0",
                "global_name": null,
                "username": "new",
            })
        );
    }
}

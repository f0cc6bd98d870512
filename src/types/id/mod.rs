//! IDs with type-safe markers for each resource.
//!
//! When IDs are simple 64-bit integers then it may be easy to accidentally use
//! the ID of a role in place of where one means to use the ID of a user. By
//! putting a marker on each ID it is impossible to mix them up: an
//! `Id<RoleMarker>` is a different type from an `Id<UserMarker>`.
//!
//! The identity map in [`crate::cache`] is keyed by these IDs, so a lookup for
//! a channel can never hit a guild entry that happens to share the integer.

pub mod marker;

use serde::{
    de::{Deserialize, Deserializer, Error as DeError, Unexpected, Visitor},
    ser::{Serialize, Serializer},
};
use std::{
    any,
    cmp::Ordering,
    error::Error,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    marker::PhantomData,
    num::NonZeroU64,
    str::FromStr,
};

/// ID of a resource, such as the ID of a [channel] or [user].
///
/// Markers themselves perform no logical action, and are only used to ensure
/// that IDs of incorrect types aren't used.
///
/// [channel]: marker::ChannelMarker
/// [user]: marker::UserMarker
#[repr(transparent)]
pub struct Id<T> {
    phantom: PhantomData<fn(T) -> T>,
    value: NonZeroU64,
}

impl<T> Id<T> {
    const fn from_nonzero(value: NonZeroU64) -> Self {
        Self {
            phantom: PhantomData,
            value,
        }
    }

    /// Create a new ID, panicking if the value is zero.
    ///
    /// Primarily useful in const contexts where a literal is known to be
    /// valid.
    ///
    /// # Panics
    ///
    /// Panics if the value is 0.
    #[track_caller]
    pub const fn new(n: u64) -> Self {
        if let Some(id) = Self::new_checked(n) {
            id
        } else {
            panic!("value is zero")
        }
    }

    /// Create an ID if the provided value is not zero.
    pub const fn new_checked(n: u64) -> Option<Self> {
        if let Some(value) = NonZeroU64::new(n) {
            Some(Self::from_nonzero(value))
        } else {
            None
        }
    }

    /// Return the inner primitive value.
    pub const fn get(self) -> u64 {
        self.value.get()
    }

    /// Return the [`NonZeroU64`] representation of the ID.
    pub const fn into_nonzero(self) -> NonZeroU64 {
        self.value
    }

    /// Cast an ID from one type to another.
    pub const fn cast<New>(self) -> Id<New> {
        Id::from_nonzero(self.value)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Id")?;
        let type_name = any::type_name::<T>();

        if let Some(position) = type_name.rfind("::") {
            if let Some(slice) = type_name.get(position + 2..) {
                f.write_str("<")?;
                f.write_str(slice)?;
                f.write_str(">")?;
            }
        }

        f.write_str("(")?;
        Debug::fmt(&self.value, f)?;

        f.write_str(")")
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.value.get(), f)
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> PartialEq<u64> for Id<T> {
    fn eq(&self, other: &u64) -> bool {
        self.value.get() == *other
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.value.get());
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> From<NonZeroU64> for Id<T> {
    fn from(value: NonZeroU64) -> Self {
        Self::from_nonzero(value)
    }
}

impl<T> From<Id<T>> for u64 {
    fn from(id: Id<T>) -> Self {
        id.get()
    }
}

impl<T> TryFrom<u64> for Id<T> {
    type Error = IdParseError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new_checked(value).ok_or(IdParseError {
            kind: IdParseErrorType::Zero,
            source: None,
        })
    }
}

impl<T> TryFrom<i64> for Id<T> {
    type Error = IdParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let value = u64::try_from(value).map_err(|source| IdParseError {
            kind: IdParseErrorType::Negative,
            source: Some(Box::new(source)),
        })?;

        Self::try_from(value)
    }
}

impl<T> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('-') {
            return Err(IdParseError {
                kind: IdParseErrorType::Negative,
                source: None,
            });
        }

        let value = s.parse::<u64>().map_err(|source| IdParseError {
            kind: IdParseErrorType::NotNumeric,
            source: Some(Box::new(source)),
        })?;

        Self::try_from(value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Discord sends IDs as strings; mirror that on the way out.
        serializer.serialize_newtype_struct("Id", &self.to_string())
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor<T> {
            phantom: PhantomData<T>,
        }

        impl<'de, T> Visitor<'de> for IdVisitor<T> {
            type Value = Id<T>;

            fn expecting(&self, f: &mut Formatter<'_>) -> FmtResult {
                f.write_str("a discord snowflake")
            }

            fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
                Id::new_checked(value).ok_or_else(|| {
                    DeError::invalid_value(Unexpected::Unsigned(value), &"a non zero u64")
                })
            }

            fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
                let unsigned = u64::try_from(value).map_err(|_| {
                    DeError::invalid_value(Unexpected::Signed(value), &"a non zero u64")
                })?;

                self.visit_u64(unsigned)
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                deserializer.deserialize_any(IdVisitor {
                    phantom: PhantomData,
                })
            }

            fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
                value
                    .parse()
                    .map_err(|_| DeError::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(IdVisitor {
            phantom: PhantomData,
        })
    }
}

/// Reason that a string or integer couldn't be turned into an [`Id`].
#[derive(Debug)]
pub struct IdParseError {
    kind: IdParseErrorType,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl IdParseError {
    /// Immutable reference to the type of error that occurred.
    #[must_use = "retrieving the type has no effect if left unused"]
    pub const fn kind(&self) -> &IdParseErrorType {
        &self.kind
    }

    /// Consume the error, returning the source error if there is any.
    #[must_use = "consuming the error and retrieving the source has no effect if left unused"]
    pub fn into_source(self) -> Option<Box<dyn Error + Send + Sync>> {
        self.source
    }

    /// Consume the error, returning the owned error type and the source error.
    #[must_use = "consuming the error into its parts has no effect if left unused"]
    pub fn into_parts(self) -> (IdParseErrorType, Option<Box<dyn Error + Send + Sync>>) {
        (self.kind, self.source)
    }
}

impl Display for IdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.kind {
            IdParseErrorType::Negative => f.write_str("id is negative"),
            IdParseErrorType::NotNumeric => f.write_str("id is not a base 10 u64"),
            IdParseErrorType::Zero => f.write_str("id is zero"),
        }
    }
}

impl Error for IdParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

/// Type of [`IdParseError`] that occurred.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdParseErrorType {
    /// Value is below zero.
    Negative,
    /// Value is not numeric or overflows a `u64`.
    NotNumeric,
    /// Value is zero, which is never a valid identifier.
    Zero,
}

#[cfg(test)]
mod tests {
    use super::{
        marker::{ChannelMarker, GenericMarker, GuildMarker, RoleMarker, UserMarker},
        Id, IdParseErrorType,
    };
    use serde_test::Token;
    use static_assertions::assert_impl_all;
    use std::{
        collections::HashSet,
        fmt::{Debug, Display},
        hash::Hash,
        num::NonZeroU64,
        str::FromStr,
    };

    assert_impl_all!(
        Id<GenericMarker>: Clone,
        Copy,
        Debug,
        Display,
        Eq,
        Hash,
        Ord,
        PartialEq,
        PartialOrd,
        Send,
        Sync,
        FromStr
    );

    #[test]
    fn initializers() {
        assert_eq!(Id::<GenericMarker>::new(123).get(), 123);
        assert!(Id::<GenericMarker>::new_checked(0).is_none());
        assert_eq!(
            Id::<GenericMarker>::from(NonZeroU64::new(7).unwrap()).into_nonzero(),
            NonZeroU64::new(7).unwrap()
        );
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Id::<ChannelMarker>::from_str("123").unwrap(),
            Id::new(123)
        );
        assert_eq!(
            *Id::<ChannelMarker>::from_str("0").unwrap_err().kind(),
            IdParseErrorType::Zero
        );
        assert_eq!(
            *Id::<ChannelMarker>::from_str("-1").unwrap_err().kind(),
            IdParseErrorType::Negative
        );
        assert_eq!(
            *Id::<ChannelMarker>::from_str("a").unwrap_err().kind(),
            IdParseErrorType::NotNumeric
        );
        assert_eq!(
            *Id::<ChannelMarker>::from_str("18446744073709551616")
                .unwrap_err()
                .kind(),
            IdParseErrorType::NotNumeric
        );
    }

    #[test]
    fn try_from_signed() {
        assert!(Id::<UserMarker>::try_from(5_i64).is_ok());
        assert_eq!(
            *Id::<UserMarker>::try_from(-5_i64).unwrap_err().kind(),
            IdParseErrorType::Negative
        );
    }

    #[test]
    fn cast_keeps_value() {
        let guild = Id::<GuildMarker>::new(123);
        let role: Id<RoleMarker> = guild.cast();
        assert_eq!(role.get(), 123);
    }

    #[test]
    fn debug_shows_marker() {
        assert_eq!(
            format!("{:?}", Id::<RoleMarker>::new(9)),
            "Id<RoleMarker>(9)"
        );
    }

    #[test]
    fn hash_and_ord_follow_value() {
        let mut set = HashSet::new();
        set.insert(Id::<UserMarker>::new(1));
        set.insert(Id::<UserMarker>::new(1));
        assert_eq!(set.len(), 1);
        assert!(Id::<UserMarker>::new(1) < Id::new(2));
    }

    #[test]
    fn serde() {
        let id = Id::<GenericMarker>::new(114_941_315_417_899_012);

        serde_test::assert_ser_tokens(
            &id,
            &[
                Token::NewtypeStruct { name: "Id" },
                Token::Str("114941315417899012"),
            ],
        );
        serde_test::assert_de_tokens(&id, &[Token::Str("114941315417899012")]);
        serde_test::assert_de_tokens(&id, &[Token::U64(114_941_315_417_899_012)]);
        serde_test::assert_de_tokens(
            &id,
            &[
                Token::NewtypeStruct { name: "Id" },
                Token::Str("114941315417899012"),
            ],
        );
        serde_test::assert_de_tokens_error::<Id<GenericMarker>>(
            &[Token::U64(0)],
            "invalid value: integer `0`, expected a non zero u64",
        );
    }
}

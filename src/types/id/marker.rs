//! Markers for various resource types, such as channels or users.
//!
//! Markers themselves perform no logical action, and are only used to
//! ensure that IDs of incorrect types aren't used. If IDs were only 64-bit
//! integers then a role's ID may be erroneously used in the place of where
//! a user's ID is required; by using markers it can be ensured that only an
//! ID with a [`RoleMarker`] can be used where a role's ID is required.
//!
//! Every cached entity type names its marker through
//! [`Entity::Marker`](crate::cache::Entity::Marker).

/// Marker for auto moderation rule IDs.
///
/// Types such as [`AutoModerationRule`] use this ID marker.
///
/// [`AutoModerationRule`]: crate::types::auto_moderation::AutoModerationRule
#[derive(Debug)]
#[non_exhaustive]
pub struct AutoModerationRuleMarker;

/// Marker for channel IDs.
///
/// Types such as [`Channel`] or [`AutoModerationAction`] use this ID marker.
///
/// [`Channel`]: crate::types::channel::Channel
/// [`AutoModerationAction`]: crate::types::auto_moderation::AutoModerationAction
#[derive(Debug)]
#[non_exhaustive]
pub struct ChannelMarker;

/// Marker for generic IDs.
///
/// Used where the resource type of an ID is not known, such as the entity an
/// event is scheduled for.
#[derive(Debug)]
#[non_exhaustive]
pub struct GenericMarker;

/// Marker for guild IDs.
///
/// Types such as [`Guild`] or [`Role`] use this ID marker.
///
/// [`Guild`]: crate::types::guild::Guild
/// [`Role`]: crate::types::role::Role
#[derive(Debug)]
#[non_exhaustive]
pub struct GuildMarker;

/// Marker for role IDs.
///
/// Types such as [`Role`] or [`AutoModerationRule`] use this ID marker.
///
/// [`Role`]: crate::types::role::Role
/// [`AutoModerationRule`]: crate::types::auto_moderation::AutoModerationRule
#[derive(Debug)]
#[non_exhaustive]
pub struct RoleMarker;

/// Marker for scheduled event IDs.
///
/// Types such as [`ScheduledEvent`] use this ID marker.
///
/// [`ScheduledEvent`]: crate::types::scheduled_event::ScheduledEvent
#[derive(Debug)]
#[non_exhaustive]
pub struct ScheduledEventMarker;

/// Marker for sticker IDs.
///
/// Types such as [`Sticker`] use this ID marker.
///
/// [`Sticker`]: crate::types::sticker::Sticker
#[derive(Debug)]
#[non_exhaustive]
pub struct StickerMarker;

/// Marker for sticker pack IDs.
///
/// Types such as [`Sticker`] use this ID marker.
///
/// [`Sticker`]: crate::types::sticker::Sticker
#[derive(Debug)]
#[non_exhaustive]
pub struct StickerPackMarker;

/// Marker for user IDs.
///
/// Types such as [`Channel`] or [`User`] use this ID marker.
///
/// [`Channel`]: crate::types::channel::Channel
/// [`User`]: crate::types::user::User
#[derive(Debug)]
#[non_exhaustive]
pub struct UserMarker;

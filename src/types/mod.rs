//! Discord entity types and the field converters they are built from.
//!
//! Every cached entity lives in its own module with its wire enums, a field
//! table describing how each attribute maps to payload keys, and its
//! [`Entity`](crate::cache::Entity) impl. Entities only hold IDs of related
//! entities; resolve them through the [`Registry`](crate::cache::Registry).
//!
//! | Entity | Owned by | Indexed in |
//! |---|---|---|
//! | [`User`] | - | - |
//! | [`Channel`] | guild, or nobody for private channels | [`Guild::channel_ids`], private channel index |
//! | [`Guild`] | - | - |
//! | [`Role`] | guild | [`Guild::role_ids`] |
//! | [`AutoModerationRule`] | guild | [`Guild::auto_moderation_rule_ids`] |
//! | [`ScheduledEvent`] | guild | [`Guild::scheduled_event_ids`] |
//! | [`Sticker`] | guild, or a standard pack | [`Guild::sticker_ids`] |

// ===========================================================================
// Building blocks
// ===========================================================================

/// Parsers and putters between payload keys and typed attributes.
pub mod field;

/// Type-safe IDs with marker types.
pub mod id;

/// Utility helpers for payloads and snapshots.
pub mod util;

// ===========================================================================
// Entities
// ===========================================================================

/// Auto moderation rules, triggers and actions.
pub mod auto_moderation;

/// Guild channels, threads and private channels.
pub mod channel;

/// Guilds.
pub mod guild;

/// Roles and permissions.
pub mod role;

/// Guild scheduled events.
pub mod scheduled_event;

/// Stickers.
pub mod sticker;

/// Users.
pub mod user;

// ===========================================================================
// Convenience re-exports
// ===========================================================================

pub use self::auto_moderation::{AutoModerationAction, AutoModerationRule, TriggerMetadata};
pub use self::channel::{Channel, ChannelType};
pub use self::field::{FieldError, FieldErrorType, Payload};
pub use self::guild::Guild;
pub use self::id::Id;
pub use self::role::{Permissions, Role};
pub use self::scheduled_event::ScheduledEvent;
pub use self::sticker::Sticker;
pub use self::user::User;

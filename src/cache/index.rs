//! Denormalized indices kept in step with entity lifecycles.
//!
//! Two kinds of index live here: the current user's private channels, keyed
//! by the other participant, and the per-guild sets of child IDs (roles,
//! channels, ...). Both are only ever touched from lifecycle hooks, so an
//! index entry exists exactly as long as the entity it points at.

use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use super::{Changes, Entity, Handle, Registry};
use crate::types::{
    channel::{Channel, ChannelType},
    guild::Guild,
    id::{
        marker::{ChannelMarker, GuildMarker, UserMarker},
        Id,
    },
};

// ---------------------------------------------------------------------------
// Private channels
// ---------------------------------------------------------------------------

/// The current user's direct message channels, keyed by the other
/// participant's ID.
#[derive(Debug, Default)]
pub struct PrivateChannels {
    by_user: BTreeMap<Id<UserMarker>, Handle<Channel>>,
}

impl PrivateChannels {
    /// Direct message channel shared with a user.
    pub fn get(&self, user_id: Id<UserMarker>) -> Option<&Handle<Channel>> {
        self.by_user.get(&user_id)
    }

    /// Number of indexed channels.
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    /// Whether no channel is indexed.
    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// Iterate over `(other participant, channel)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (Id<UserMarker>, &Handle<Channel>)> {
        self.by_user.iter().map(|(user_id, handle)| (*user_id, handle))
    }

    fn insert(&mut self, user_id: Id<UserMarker>, handle: &Handle<Channel>) {
        self.by_user.insert(user_id, handle.clone());
    }

    /// Drop every entry pointing at `channel_id`. Entries for the same user
    /// pointing at another channel are kept.
    fn remove_channel(&mut self, channel_id: Id<ChannelMarker>) {
        self.by_user
            .retain(|_, handle| handle.borrow().id != channel_id);
    }
}

/// Bring the private channel index in line with a channel's participants.
///
/// A direct message channel is indexed under the other participant iff it
/// has exactly two participants and the current user is one of them.
pub(crate) fn sync_private_channel(handle: &Handle<Channel>, registry: &mut Registry) {
    let current_user = registry.current_user();

    let (channel_id, other) = {
        let channel = handle.borrow();

        let other = match current_user {
            Some(current_user)
                if channel.kind == ChannelType::Private
                    && channel.users.len() == 2
                    && channel.users.contains(&current_user) =>
            {
                channel.users.iter().copied().find(|id| *id != current_user)
            }
            _ => None,
        };

        (channel.id, other)
    };

    let index = registry.private_channels_mut();
    index.remove_channel(channel_id);

    if let Some(user_id) = other {
        trace!(channel = %channel_id, user = %user_id, "indexed private channel");
        index.insert(user_id, handle);
    }
}

/// Drop a deleted channel from the private channel index.
pub(crate) fn unlink_private_channel(handle: &Handle<Channel>, registry: &mut Registry) {
    let channel_id = handle.borrow().id;
    registry.private_channels_mut().remove_channel(channel_id);
}

// ---------------------------------------------------------------------------
// Guild children
// ---------------------------------------------------------------------------

/// An entity owned by a guild and listed in one of the guild's indices.
pub trait GuildChild: Entity {
    /// ID of the owning guild, if known.
    fn guild_id(&self) -> Option<Id<GuildMarker>>;

    /// The guild's index of this entity type.
    fn guild_index(guild: &mut Guild) -> &mut BTreeSet<Id<Self::Marker>>;
}

/// Insert a child into its guild's index, reserving the guild if it hasn't
/// been decoded yet.
pub(crate) fn link_guild<E: GuildChild>(handle: &Handle<E>, registry: &mut Registry) {
    let (id, guild_id) = {
        let entity = handle.borrow();
        (entity.id(), entity.guild_id())
    };

    if let Some(guild_id) = guild_id {
        let guild = registry.get_or_create::<Guild>(guild_id);
        E::guild_index(&mut guild.borrow_mut()).insert(id);
    }
}

/// Move a child between guild indices after its `guild_id` changed.
pub(crate) fn relink_guild<E: GuildChild>(
    handle: &Handle<E>,
    changes: &Changes,
    registry: &mut Registry,
) {
    if !changes.contains("guild_id") {
        return;
    }

    let id = handle.id();
    if let Some(old) = changes.get_as::<Option<Id<GuildMarker>>>("guild_id").flatten() {
        if let Some(guild) = registry.get::<Guild>(old) {
            E::guild_index(&mut guild.borrow_mut()).remove(&id);
        }
    }

    link_guild(handle, registry);
}

/// Remove a deleted child from its guild's index.
pub(crate) fn unlink_guild<E: GuildChild>(handle: &Handle<E>, registry: &mut Registry) {
    let (id, guild_id) = {
        let entity = handle.borrow();
        (entity.id(), entity.guild_id())
    };

    if let Some(guild) = guild_id.and_then(|guild_id| registry.get::<Guild>(guild_id)) {
        E::guild_index(&mut guild.borrow_mut()).remove(&id);
    }
}

//! Applying gateway events to the cache.
//!
//! [`apply`] is the single entry point: it takes one parsed gateway event,
//! routes its payload through the [`Registry`] and reports what happened as
//! [`CacheEvent`]s. Events must be applied in the order they were received;
//! each update is diffed against the state left by the previous one.

use serde_json::Value;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{debug, info, trace, warn};

use crate::{
    cache::{Changes, Entity, Handle, Registry},
    events::{GatewayEvent, Ready, StickersUpdate},
    types::{
        field::{self, FieldError, Payload},
        id::{marker::GuildMarker, Id},
        AutoModerationRule, Channel, Guild, Role, ScheduledEvent, Sticker, User,
    },
};

/// A handle to any cached entity type.
#[derive(Clone, Debug)]
pub enum EntityRef {
    AutoModerationRule(Handle<AutoModerationRule>),
    Channel(Handle<Channel>),
    Guild(Handle<Guild>),
    Role(Handle<Role>),
    ScheduledEvent(Handle<ScheduledEvent>),
    Sticker(Handle<Sticker>),
    User(Handle<User>),
}

impl EntityRef {
    /// Short name of the entity type.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AutoModerationRule(_) => AutoModerationRule::KIND,
            Self::Channel(_) => Channel::KIND,
            Self::Guild(_) => Guild::KIND,
            Self::Role(_) => Role::KIND,
            Self::ScheduledEvent(_) => ScheduledEvent::KIND,
            Self::Sticker(_) => Sticker::KIND,
            Self::User(_) => User::KIND,
        }
    }

    /// Raw ID of the entity.
    pub fn id(&self) -> u64 {
        match self {
            Self::AutoModerationRule(handle) => handle.id().get(),
            Self::Channel(handle) => handle.id().get(),
            Self::Guild(handle) => handle.id().get(),
            Self::Role(handle) => handle.id().get(),
            Self::ScheduledEvent(handle) => handle.id().get(),
            Self::Sticker(handle) => handle.id().get(),
            Self::User(handle) => handle.id().get(),
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// What applying a gateway event did to the cache.
#[derive(Clone, Debug)]
pub enum CacheEvent {
    /// The connected user is known.
    Ready { user: Handle<User> },
    /// An entity was decoded for the first time.
    Create(EntityRef),
    /// A cached entity changed; carries the prior values. Never empty.
    Update(EntityRef, Changes),
    /// An entity was deleted and dropped from every index.
    Delete(EntityRef),
}

/// Apply one gateway event to the cache.
///
/// Payloads that fail to convert are logged and skipped; the entity they
/// address keeps its previous state. Events that don't touch the cache
/// produce nothing.
pub fn apply(registry: &mut Registry, event: GatewayEvent) -> Vec<CacheEvent> {
    let mut events = Vec::new();

    match event {
        GatewayEvent::Ready(ready) => on_ready(registry, ready, &mut events),

        GatewayEvent::GuildCreate(data) | GatewayEvent::GuildUpdate(data) => {
            on_guild_upsert(registry, &data, &mut events);
        }
        GatewayEvent::GuildDelete(delete) if delete.unavailable => {
            let mut data = Payload::new();
            field::put_id(&mut data, "id", Some(delete.id), false);
            data.insert("unavailable".to_owned(), Value::Bool(true));

            upsert(registry, &data, EntityRef::Guild, &mut events);
        }
        GatewayEvent::GuildDelete(delete) => {
            remove(registry, delete.id, EntityRef::Guild, &mut events);
        }

        GatewayEvent::ChannelCreate(data) | GatewayEvent::ChannelUpdate(data) => {
            upsert(registry, &data, EntityRef::Channel, &mut events);
        }
        GatewayEvent::ChannelDelete(data) => {
            remove_by_payload(registry, &data, EntityRef::Channel, &mut events);
        }

        GatewayEvent::RoleCreate(role) | GatewayEvent::RoleUpdate(role) => {
            let data = with_guild_id(role.role, role.guild_id);
            upsert(registry, &data, EntityRef::Role, &mut events);
        }
        GatewayEvent::RoleDelete(delete) => {
            remove(registry, delete.role_id, EntityRef::Role, &mut events);
        }

        GatewayEvent::AutoModerationRuleCreate(data)
        | GatewayEvent::AutoModerationRuleUpdate(data) => {
            upsert(registry, &data, EntityRef::AutoModerationRule, &mut events);
        }
        GatewayEvent::AutoModerationRuleDelete(data) => {
            remove_by_payload(registry, &data, EntityRef::AutoModerationRule, &mut events);
        }

        GatewayEvent::ScheduledEventCreate(data) | GatewayEvent::ScheduledEventUpdate(data) => {
            upsert(registry, &data, EntityRef::ScheduledEvent, &mut events);
        }
        GatewayEvent::ScheduledEventDelete(data) => {
            remove_by_payload(registry, &data, EntityRef::ScheduledEvent, &mut events);
        }

        GatewayEvent::StickersUpdate(update) => on_stickers_update(registry, update, &mut events),

        GatewayEvent::Unknown { event_name, op, .. } => {
            trace!(event = ?event_name, op, "ignored gateway event");
        }

        GatewayEvent::HeartbeatAck
        | GatewayEvent::HeartbeatRequest
        | GatewayEvent::Reconnect
        | GatewayEvent::InvalidSession(_) => {}
    }

    events
}

fn on_ready(registry: &mut Registry, ready: Ready, events: &mut Vec<CacheEvent>) {
    let user = match registry.decode::<User>(&ready.user) {
        Ok(user) => user,
        Err(e) => {
            warn!(event = "READY", error = %e, "failed to decode current user");
            return;
        }
    };

    registry.set_current_user(user.id());
    info!(
        user = %user.borrow().full_name(),
        guilds = ready.guilds.len(),
        "cache is ready"
    );
    events.push(CacheEvent::Ready { user });

    for data in &ready.private_channels {
        upsert(registry, data, EntityRef::Channel, events);
    }

    for data in &ready.guilds {
        upsert(registry, data, EntityRef::Guild, events);
    }
}

/// Upsert a guild and report the nested children its lists no longer hold.
fn on_guild_upsert(registry: &mut Registry, data: &Payload, events: &mut Vec<CacheEvent>) {
    let guild_id = field::parse_id::<GuildMarker>(data, "id").ok().flatten();
    let before = guild_id
        .and_then(|id| registry.get::<Guild>(id))
        .map(|guild| guild.snapshot());

    upsert(registry, data, EntityRef::Guild, events);

    let (Some(before), Some(after)) = (
        before,
        guild_id
            .and_then(|id| registry.get::<Guild>(id))
            .map(|guild| guild.snapshot()),
    ) else {
        return;
    };

    report_dropped(registry, &before.role_ids, &after.role_ids, EntityRef::Role, events);
    report_dropped(registry, &before.channel_ids, &after.channel_ids, EntityRef::Channel, events);
    report_dropped(registry, &before.sticker_ids, &after.sticker_ids, EntityRef::Sticker, events);
    report_dropped(
        registry,
        &before.scheduled_event_ids,
        &after.scheduled_event_ids,
        EntityRef::ScheduledEvent,
        events,
    );
}

fn report_dropped<E: Entity>(
    registry: &Registry,
    before: &BTreeSet<Id<E::Marker>>,
    after: &BTreeSet<Id<E::Marker>>,
    wrap: fn(Handle<E>) -> EntityRef,
    events: &mut Vec<CacheEvent>,
) {
    for id in before.difference(after) {
        if let Some(handle) = registry.get::<E>(*id) {
            events.push(CacheEvent::Delete(wrap(handle)));
        }
    }
}

/// Replace a guild's sticker list: decode every listed sticker and delete
/// the cached ones that are no longer listed.
fn on_stickers_update(registry: &mut Registry, update: StickersUpdate, events: &mut Vec<CacheEvent>) {
    let mut listed = Vec::with_capacity(update.stickers.len());

    for data in update.stickers {
        let data = with_guild_id(data, update.guild_id);
        if let Ok(Some(id)) = field::parse_id(&data, "id") {
            listed.push(id);
        }

        upsert(registry, &data, EntityRef::Sticker, events);
    }

    let stale: Vec<_> = registry
        .get::<Guild>(update.guild_id)
        .map(|guild| {
            guild
                .borrow()
                .sticker_ids
                .iter()
                .copied()
                .filter(|id| !listed.contains(id))
                .collect()
        })
        .unwrap_or_default();

    for id in stale {
        remove(registry, id, EntityRef::Sticker, events);
    }
}

fn with_guild_id(mut data: Payload, guild_id: Id<GuildMarker>) -> Payload {
    field::put_id(&mut data, "guild_id", Some(guild_id), false);
    data
}

/// Decode a payload, reporting a create for new (or placeholder) entities
/// and an update with the prior values for cached ones.
fn upsert<E: Entity>(
    registry: &mut Registry,
    data: &Payload,
    wrap: fn(Handle<E>) -> EntityRef,
    events: &mut Vec<CacheEvent>,
) {
    if let Err(e) = try_upsert(registry, data, wrap, events) {
        warn!(kind = E::KIND, error = %e, "failed to apply payload");
    }
}

fn try_upsert<E: Entity>(
    registry: &mut Registry,
    data: &Payload,
    wrap: fn(Handle<E>) -> EntityRef,
    events: &mut Vec<CacheEvent>,
) -> Result<(), FieldError> {
    let id = field::parse_id::<E::Marker>(data, "id")?.ok_or(FieldError::missing("id"))?;

    match registry.get::<E>(id).filter(|handle| !handle.is_partial()) {
        Some(handle) => {
            let changes = registry.apply_update(&handle, data)?;
            if !changes.is_empty() {
                events.push(CacheEvent::Update(wrap(handle), changes));
            }
        }
        None => {
            let handle = registry.decode::<E>(data)?;
            events.push(CacheEvent::Create(wrap(handle)));
        }
    }

    Ok(())
}

fn remove<E: Entity>(
    registry: &mut Registry,
    id: Id<E::Marker>,
    wrap: fn(Handle<E>) -> EntityRef,
    events: &mut Vec<CacheEvent>,
) {
    match registry.delete_by_id::<E>(id) {
        Some(handle) => events.push(CacheEvent::Delete(wrap(handle))),
        None => debug!(kind = E::KIND, %id, "delete for uncached entity"),
    }
}

fn remove_by_payload<E: Entity>(
    registry: &mut Registry,
    data: &Payload,
    wrap: fn(Handle<E>) -> EntityRef,
    events: &mut Vec<CacheEvent>,
) {
    match field::parse_id::<E::Marker>(data, "id") {
        Ok(Some(id)) => remove(registry, id, wrap, events),
        Ok(None) => warn!(kind = E::KIND, "delete payload without id"),
        Err(e) => warn!(kind = E::KIND, error = %e, "failed to parse delete payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply, CacheEvent, EntityRef};
    use crate::{
        cache::Registry,
        events::{GatewayEvent, GatewayPayload},
        types::{id::Id, Channel, Guild, Role, Sticker},
    };
    use serde_json::json;

    fn dispatch(registry: &mut Registry, name: &str, d: serde_json::Value) -> Vec<CacheEvent> {
        let event = GatewayEvent::from_payload(GatewayPayload {
            op: 0,
            d: Some(d),
            s: None,
            t: Some(name.to_owned()),
        });

        apply(registry, event)
    }

    fn summary(events: &[CacheEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                CacheEvent::Ready { user } => format!("ready {}", user.id()),
                CacheEvent::Create(entity) => format!("create {entity}"),
                CacheEvent::Update(entity, changes) => format!(
                    "update {entity} {}",
                    changes.names().collect::<Vec<_>>().join(",")
                ),
                CacheEvent::Delete(entity) => format!("delete {entity}"),
            })
            .collect()
    }

    #[test]
    fn ready_sets_current_user_and_indexes_private_channels() {
        let mut registry = Registry::new();
        let events = dispatch(
            &mut registry,
            "READY",
            json!({
                "user": {"id": "1", "username": "bot"},
                "guilds": [{"id": "10", "unavailable": true}],
                "private_channels": [{"id": "7", "type": 1, "recipients": [{"id": "2"}]}],
            }),
        );

        assert_eq!(
            summary(&events),
            vec!["ready 1", "create channel 7", "create guild 10"]
        );
        assert_eq!(registry.current_user(), Some(Id::new(1)));

        let channel = registry.private_channels().get(Id::new(2)).unwrap();
        assert_eq!(channel.id(), Id::new(7));
        assert!(registry.get::<Guild>(Id::new(10)).unwrap().borrow().unavailable);
    }

    #[test]
    fn create_then_update_reports_changes() {
        let mut registry = Registry::new();
        let events = dispatch(
            &mut registry,
            "CHANNEL_CREATE",
            json!({"id": "5", "type": 0, "guild_id": "10", "name": "general"}),
        );
        assert_eq!(summary(&events), vec!["create channel 5"]);

        let events = dispatch(
            &mut registry,
            "CHANNEL_UPDATE",
            json!({"id": "5", "type": 0, "guild_id": "10", "name": "chat", "nsfw": true}),
        );
        assert_eq!(summary(&events), vec!["update channel 5 name,nsfw"]);
        let CacheEvent::Update(EntityRef::Channel(_), changes) = &events[0] else {
            panic!("expected a channel update");
        };
        assert_eq!(changes.get("name"), Some(&json!("general")));

        // Replaying the same payload changes nothing.
        let events = dispatch(
            &mut registry,
            "CHANNEL_UPDATE",
            json!({"id": "5", "type": 0, "guild_id": "10", "name": "chat", "nsfw": true}),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn guild_create_links_children_and_delete_cascades() {
        let mut registry = Registry::new();
        dispatch(
            &mut registry,
            "GUILD_CREATE",
            json!({
                "id": "10",
                "name": "guild",
                "roles": [{"id": "10", "name": "@everyone"}],
                "channels": [{"id": "20", "type": 0, "name": "general"}],
            }),
        );

        let events = dispatch(
            &mut registry,
            "GUILD_ROLE_CREATE",
            json!({"guild_id": "10", "role": {"id": "11", "name": "mod"}}),
        );
        assert_eq!(summary(&events), vec!["create role 11"]);

        let guild = registry.get::<Guild>(Id::new(10)).unwrap();
        assert_eq!(guild.borrow().role_ids.len(), 2);

        let events = dispatch(&mut registry, "GUILD_DELETE", json!({"id": "10"}));
        assert_eq!(summary(&events), vec!["delete guild 10"]);

        let guild = guild.borrow();
        assert!(guild.role_ids.is_empty());
        assert!(guild.channel_ids.is_empty());

        // The identity map keeps deleted entities readable.
        assert!(registry.get::<Role>(Id::new(11)).is_some());
        assert!(registry.get::<Channel>(Id::new(20)).is_some());
    }

    #[test]
    fn guild_update_reports_dropped_children() {
        let mut registry = Registry::new();
        dispatch(
            &mut registry,
            "GUILD_CREATE",
            json!({
                "id": "10",
                "name": "guild",
                "roles": [{"id": "10"}, {"id": "11", "name": "mod"}],
            }),
        );

        let events = dispatch(
            &mut registry,
            "GUILD_UPDATE",
            json!({"id": "10", "name": "renamed", "roles": [{"id": "10"}]}),
        );
        assert_eq!(
            summary(&events),
            vec!["update guild 10 name", "delete role 11"]
        );

        let guild = registry.get::<Guild>(Id::new(10)).unwrap();
        assert_eq!(
            guild.borrow().role_ids.iter().copied().collect::<Vec<_>>(),
            vec![Id::new(10)]
        );
    }

    #[test]
    fn unavailable_guild_is_not_deleted() {
        let mut registry = Registry::new();
        dispatch(&mut registry, "GUILD_CREATE", json!({"id": "10", "name": "guild"}));

        let events = dispatch(
            &mut registry,
            "GUILD_DELETE",
            json!({"id": "10", "unavailable": true}),
        );
        assert_eq!(summary(&events), vec!["update guild 10 unavailable"]);
    }

    #[test]
    fn role_delete() {
        let mut registry = Registry::new();
        dispatch(
            &mut registry,
            "GUILD_ROLE_CREATE",
            json!({"guild_id": "10", "role": {"id": "11", "name": "mod"}}),
        );

        let events = dispatch(
            &mut registry,
            "GUILD_ROLE_DELETE",
            json!({"guild_id": "10", "role_id": "11"}),
        );
        assert_eq!(summary(&events), vec!["delete role 11"]);

        let guild = registry.get::<Guild>(Id::new(10)).unwrap();
        assert!(guild.is_partial());
        assert!(guild.borrow().role_ids.is_empty());

        let events = dispatch(
            &mut registry,
            "GUILD_ROLE_DELETE",
            json!({"guild_id": "10", "role_id": "99"}),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn stickers_update_replaces_list() {
        let mut registry = Registry::new();
        dispatch(
            &mut registry,
            "GUILD_STICKERS_UPDATE",
            json!({"guild_id": "10", "stickers": [{"id": "1", "name": "a"}, {"id": "2", "name": "b"}]}),
        );

        let events = dispatch(
            &mut registry,
            "GUILD_STICKERS_UPDATE",
            json!({"guild_id": "10", "stickers": [{"id": "2", "name": "c"}]}),
        );
        assert_eq!(
            summary(&events),
            vec!["update sticker 2 name", "delete sticker 1"]
        );

        let guild = registry.get::<Guild>(Id::new(10)).unwrap();
        assert_eq!(
            guild.borrow().sticker_ids.iter().copied().collect::<Vec<_>>(),
            vec![Id::new(2)]
        );
        assert!(registry.get::<Sticker>(Id::new(1)).is_some());
    }

    #[test]
    fn invalid_payload_is_skipped() {
        let mut registry = Registry::new();
        dispatch(&mut registry, "CHANNEL_CREATE", json!({"id": "5", "type": 0, "name": "general"}));

        let events = dispatch(
            &mut registry,
            "CHANNEL_UPDATE",
            json!({"id": "5", "name": "chat", "rate_limit_per_user": "slow"}),
        );
        assert!(events.is_empty());

        let channel = registry.get::<Channel>(Id::new(5)).unwrap();
        assert_eq!(channel.borrow().name, "general");
    }

    #[test]
    fn heartbeat_touches_nothing() {
        let mut registry = Registry::new();
        let events = apply(&mut registry, GatewayEvent::HeartbeatAck);
        assert!(events.is_empty());
    }
}

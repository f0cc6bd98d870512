//! Identity map for cached Discord entities.
//!
//! Every remote object Discord knows about (a channel, a guild, a role, ...)
//! is cached by its ID. The [`Registry`] guarantees that, per entity type,
//! at most one live instance exists for an ID: decoding the same ID twice
//! hands back the same [`Handle`], updated in place, so every holder of that
//! handle observes the update.
//!
//! An entity can be reserved by ID before its data arrives (a *placeholder*,
//! see [`Registry::get_or_create`]). The first full decode upgrades it in
//! place.
//!
//! Mutations are single-threaded: handles are `Rc`-based and the registry is
//! meant to be driven by one event loop processing one gateway payload at a
//! time. Payloads for the same entity must be applied in the order they were
//! received, since diffs are computed against the current state.

mod field;
pub(crate) mod index;


pub use self::{
    field::{replace, Changes, Emit, Field},
    index::{GuildChild, PrivateChannels},
};

use std::{
    any::{Any, TypeId},
    cell::{Cell, Ref, RefCell, RefMut},
    collections::HashMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    rc::Rc,
};
use tracing::{debug, trace};

use crate::types::{
    field::{self as fields, FieldError, Payload},
    id::{marker::UserMarker, Id},
};

// ---------------------------------------------------------------------------
// Entity contract
// ---------------------------------------------------------------------------

/// A cached, identity-stable object representing a remote resource.
///
/// Implementors describe their attributes in a declarative field table; the
/// registry handles decoding, diffing and encoding uniformly. The lifecycle
/// hooks maintain indices on related entities and run after the entity's
/// own state has been committed, with no borrow of it held.
pub trait Entity: Clone + Debug + Sized + 'static {
    /// ID marker of this entity type.
    type Marker: 'static;

    /// Short name used in logs.
    const KIND: &'static str;

    /// Create an empty entity reserving `id`.
    fn placeholder(id: Id<Self::Marker>) -> Self;

    /// The entity's ID.
    fn id(&self) -> Id<Self::Marker>;

    /// The entity's field table.
    fn fields() -> &'static [Field<Self>];

    /// Rewrite an incoming payload and decode the entities nested in it,
    /// before any field of this entity is touched.
    fn prepare(
        _id: Id<Self::Marker>,
        _data: &mut Payload,
        _registry: &mut Registry,
    ) -> Result<(), FieldError> {
        Ok(())
    }

    /// Called once, when the entity is first decoded from a full payload.
    fn created(_handle: &Handle<Self>, _registry: &mut Registry) {}

    /// Called after an update changed at least one attribute.
    fn updated(_handle: &Handle<Self>, _changes: &Changes, _registry: &mut Registry) {}

    /// Called when the remote resource is deleted.
    fn deleted(_handle: &Handle<Self>, _registry: &mut Registry) {}
}

/// Options for [`encode`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Encode {
    /// Include attributes equal to their documented default.
    pub defaults: bool,
    /// Include the ID and other [`Emit::Internal`] attributes.
    pub internals: bool,
}

impl Encode {
    /// Encoding used for create and edit requests.
    pub const REQUEST: Self = Self {
        defaults: false,
        internals: false,
    };

    /// Encoding of a fetched entity, with every attribute present.
    pub const FULL: Self = Self {
        defaults: true,
        internals: true,
    };
}

/// Convert an entity back into a payload.
///
/// Inverse of [`Registry::decode`], except for [`Emit::Never`] attributes.
pub fn encode<E: Entity>(entity: &E, options: Encode) -> Payload {
    let mut data = Payload::new();

    if options.internals {
        fields::put_id(&mut data, "id", Some(entity.id()), true);
    }

    for field in E::fields() {
        let emit = match field.emit {
            Emit::Always => true,
            Emit::Internal => options.internals,
            Emit::Never => false,
        };

        if emit {
            (field.put)(entity, &mut data, options.defaults);
        }
    }

    data
}

/// Apply every field present in `data` to a copy of the live entity.
///
/// Working on a copy keeps the live entity untouched when a later field fails
/// to convert.
fn apply_fields<E: Entity>(mut next: E, data: &Payload) -> Result<(E, Changes), FieldError> {
    let mut changes = Changes::new();

    for field in E::fields() {
        if !fields::contains_any(data, field.keys) {
            continue;
        }

        if let Some(old) = (field.update)(&mut next, data)? {
            changes.record(field.name, old);
        }
    }

    Ok((next, changes))
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

struct Slot<E> {
    partial: Cell<bool>,
    value: RefCell<E>,
}

/// Shared reference to a cached entity.
///
/// Cloning a handle is cheap and every clone observes updates applied through
/// the registry.
pub struct Handle<E> {
    slot: Rc<Slot<E>>,
}

impl<E> Handle<E> {
    fn placeholder(value: E) -> Self {
        Self {
            slot: Rc::new(Slot {
                partial: Cell::new(true),
                value: RefCell::new(value),
            }),
        }
    }

    /// Immutably borrow the entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is being updated, which only happens inside the
    /// registry.
    pub fn borrow(&self) -> Ref<'_, E> {
        self.slot.value.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, E> {
        self.slot.value.borrow_mut()
    }

    /// Whether only the ID is known so far.
    pub fn is_partial(&self) -> bool {
        self.slot.partial.get()
    }

    fn mark_full(&self) {
        self.slot.partial.set(false);
    }

    fn commit(&self, value: E) {
        *self.slot.value.borrow_mut() = value;
    }

    /// Whether both handles point at the same cached instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<E: Entity> Handle<E> {
    /// ID of the entity.
    pub fn id(&self) -> Id<E::Marker> {
        self.borrow().id()
    }

    /// Copy of the entity's current state.
    pub fn snapshot(&self) -> E {
        self.borrow().clone()
    }

    /// Encode the entity's current state.
    pub fn encode(&self, options: Encode) -> Payload {
        encode(&*self.borrow(), options)
    }
}

impl<E> Clone for Handle<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<E: Debug> Debug for Handle<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Handle")
            .field("partial", &self.slot.partial.get())
            .field("value", &self.slot.value)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type EntityMap<E> = HashMap<Id<<E as Entity>::Marker>, Handle<E>>;

/// Identity map from `(entity type, ID)` to the live entity.
///
/// Each client owns its own registry; nothing here is global, so tests can
/// build as many isolated registries as they like.
#[derive(Default)]
pub struct Registry {
    maps: HashMap<TypeId, Box<dyn Any>>,
    current_user: Option<Id<UserMarker>>,
    private_channels: PrivateChannels,
}

impl Registry {
    /// Create an empty registry with no current user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry for the given connected user.
    pub fn with_current_user(user_id: Id<UserMarker>) -> Self {
        Self {
            current_user: Some(user_id),
            ..Self::default()
        }
    }

    /// The connected user, whose private channels are indexed.
    pub const fn current_user(&self) -> Option<Id<UserMarker>> {
        self.current_user
    }

    /// Set the connected user, usually from the READY payload.
    pub fn set_current_user(&mut self, user_id: Id<UserMarker>) {
        self.current_user = Some(user_id);
    }

    /// The current user's private channels, keyed by the other participant.
    pub const fn private_channels(&self) -> &PrivateChannels {
        &self.private_channels
    }

    pub(crate) fn private_channels_mut(&mut self) -> &mut PrivateChannels {
        &mut self.private_channels
    }

    fn map<E: Entity>(&self) -> Option<&EntityMap<E>> {
        self.maps.get(&TypeId::of::<E>())?.downcast_ref()
    }

    fn map_mut<E: Entity>(&mut self) -> &mut EntityMap<E> {
        let map = self
            .maps
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(EntityMap::<E>::new()));

        match map.downcast_mut() {
            Some(map) => map,
            None => unreachable!("entity maps are keyed by their own type id"),
        }
    }

    /// Look up a cached entity. A miss is not an error.
    pub fn get<E: Entity>(&self, id: Id<E::Marker>) -> Option<Handle<E>> {
        self.map::<E>()?.get(&id).cloned()
    }

    /// Number of cached entities of a type, placeholders included.
    pub fn len<E: Entity>(&self) -> usize {
        self.map::<E>().map_or(0, |map| map.len())
    }

    /// Whether no entity of a type is cached.
    pub fn is_empty<E: Entity>(&self) -> bool {
        self.len::<E>() == 0
    }

    /// Iterate over every cached entity of a type, in no particular order.
    pub fn iter<E: Entity>(&self) -> impl Iterator<Item = Handle<E>> + '_ {
        self.map::<E>()
            .into_iter()
            .flat_map(|map| map.values().cloned())
    }

    /// Return the cached entity for `id`, reserving a placeholder on a miss.
    ///
    /// No remote data is fetched; the placeholder only holds the ID until a
    /// payload for it is decoded.
    pub fn get_or_create<E: Entity>(&mut self, id: Id<E::Marker>) -> Handle<E> {
        self.map_mut::<E>()
            .entry(id)
            .or_insert_with(|| {
                trace!(kind = E::KIND, %id, "reserved placeholder");
                Handle::placeholder(E::placeholder(id))
            })
            .clone()
    }

    /// Like [`get_or_create`](Self::get_or_create), and run `init` on the
    /// entity while it is still a placeholder. A fully decoded entity is
    /// returned unchanged.
    pub fn precreate<E, F>(&mut self, id: Id<E::Marker>, init: F) -> Handle<E>
    where
        E: Entity,
        F: FnOnce(&mut E),
    {
        let handle = self.get_or_create::<E>(id);
        if handle.is_partial() {
            init(&mut *handle.borrow_mut());
        }

        handle
    }

    /// Decode a payload into its cached entity.
    ///
    /// If an entity with the payload's ID is cached, it is updated in place
    /// and the same handle is returned; otherwise a new one is registered.
    /// Attributes whose keys are absent from the payload are left as they
    /// were.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if the payload has no usable `id` or any
    /// present field fails to convert. The cached entity is untouched then.
    pub fn decode<E: Entity>(&mut self, data: &Payload) -> Result<Handle<E>, FieldError> {
        let id = fields::parse_id::<E::Marker>(data, "id")?.ok_or(FieldError::missing("id"))?;

        let mut data = data.clone();
        E::prepare(id, &mut data, self)?;

        let current = match self.get::<E>(id) {
            Some(handle) => handle.snapshot(),
            None => E::placeholder(id),
        };
        let (next, changes) = apply_fields(current, &data)?;

        let handle = self.get_or_create::<E>(id);
        let created = handle.is_partial();
        handle.commit(next);

        if created {
            handle.mark_full();
            debug!(kind = E::KIND, %id, "cached entity");
            E::created(&handle, self);
        } else if !changes.is_empty() {
            trace!(kind = E::KIND, %id, changed = changes.len(), "updated entity");
            E::updated(&handle, &changes, self);
        }

        Ok(handle)
    }

    /// Apply a partial update and return the prior values of the changed
    /// attributes.
    ///
    /// Keys absent from the payload mean "unchanged"; there is no way to tell
    /// an omitted field from one the server left out on purpose.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if a present field fails to convert. The
    /// cached entity is untouched then.
    pub fn apply_update<E: Entity>(
        &mut self,
        handle: &Handle<E>,
        data: &Payload,
    ) -> Result<Changes, FieldError> {
        let id = handle.id();

        let mut data = data.clone();
        E::prepare(id, &mut data, self)?;

        let (next, changes) = apply_fields(handle.snapshot(), &data)?;
        handle.commit(next);

        if !changes.is_empty() {
            trace!(kind = E::KIND, %id, changed = changes.len(), "updated entity");
            E::updated(handle, &changes, self);
        }

        Ok(changes)
    }

    /// Run the deletion hooks of an entity, dropping it from every index.
    ///
    /// The identity map itself keeps the instance; holders of the handle can
    /// still read its last state.
    pub fn delete<E: Entity>(&mut self, handle: &Handle<E>) {
        debug!(kind = E::KIND, id = %handle.id(), "deleted entity");
        E::deleted(handle, self);
    }

    /// [`delete`](Self::delete) by ID, returning the handle if it was cached.
    pub fn delete_by_id<E: Entity>(&mut self, id: Id<E::Marker>) -> Option<Handle<E>> {
        let handle = self.get::<E>(id)?;
        self.delete(&handle);

        Some(handle)
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Registry")
            .field("entity_types", &self.maps.len())
            .field("current_user", &self.current_user)
            .field("private_channels", &self.private_channels.len())
            .finish()
    }
}

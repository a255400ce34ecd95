//! Packed struct-of-arrays component storage
//!
//! Every component type lives in its own [`Column`], indexed by [`EntityId`].
//! The store is an owned value threaded through every system call; there is
//! no global registry, so independent simulations never share state.
//!
//! Iteration order contract: iterating a column yields entities in the order
//! the component was attached. Re-attaching to an entity that already holds
//! the component overwrites in place and keeps its position; removing and
//! attaching again moves the entity to the end.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::components::*;
use super::facing::Facing;

/// Stable integer handle for an entity. `0` is reserved as "no entity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Sentinel for "no entity" (e.g. an unloaded canon)
    pub const NONE: EntityId = EntityId(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sparse-index sentinel: the entity has no value in this column
const EMPTY: u32 = u32::MAX;

/// Freed ids are only handed out again once this many are waiting
const REUSE_QUARANTINE: usize = 32;

/// Dense storage for one component type
///
/// `slots[id]` points into `dense`; removed entries leave a tombstone that is
/// compacted away once tombstones outnumber live values, which keeps removal
/// O(1) amortized without disturbing attachment order.
#[derive(Debug, Clone)]
pub struct Column<C> {
    slots: Vec<u32>,
    dense: Vec<Option<(EntityId, C)>>,
    live: usize,
}

impl<C> Default for Column<C> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            dense: Vec::new(),
            live: 0,
        }
    }
}

impl<C> Column<C> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    fn dense_index(&self, id: EntityId) -> Option<usize> {
        match self.slots.get(id.index()) {
            Some(&slot) if slot != EMPTY => Some(slot as usize),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.dense_index(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&C> {
        let idx = self.dense_index(id)?;
        self.dense.get(idx)?.as_ref().map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut C> {
        let idx = self.dense_index(id)?;
        self.dense.get_mut(idx)?.as_mut().map(|(_, value)| value)
    }

    /// Attach or overwrite; returns the previous value if there was one
    pub fn insert(&mut self, id: EntityId, value: C) -> Option<C> {
        if let Some(idx) = self.dense_index(id) {
            if let Some((_, slot)) = self.dense.get_mut(idx).and_then(Option::as_mut) {
                return Some(std::mem::replace(slot, value));
            }
        }

        if self.slots.len() <= id.index() {
            self.slots.resize(id.index() + 1, EMPTY);
        }
        self.slots[id.index()] = self.dense.len() as u32;
        self.dense.push(Some((id, value)));
        self.live += 1;
        None
    }

    pub fn remove(&mut self, id: EntityId) -> Option<C> {
        let idx = self.dense_index(id)?;
        self.slots[id.index()] = EMPTY;
        let (_, value) = self.dense.get_mut(idx)?.take()?;
        self.live -= 1;

        let tombstones = self.dense.len() - self.live;
        if tombstones > self.live.max(8) {
            self.compact();
        }
        Some(value)
    }

    /// Drop tombstones, preserving attachment order
    fn compact(&mut self) {
        self.dense.retain(Option::is_some);
        for (idx, entry) in self.dense.iter().enumerate() {
            if let Some((id, _)) = entry {
                self.slots[id.index()] = idx as u32;
            }
        }
    }

    /// Entities holding this component, in attachment order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.dense
            .iter()
            .filter_map(|entry| entry.as_ref().map(|(id, value)| (*id, value)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> {
        self.dense
            .iter_mut()
            .filter_map(|entry| entry.as_mut().map(|(id, value)| (*id, value)))
    }

    /// Snapshot of the ids holding this component, in attachment order
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

/// A component type with a column in [`Columns`]
pub trait Component: Sized + Clone + 'static {
    const KIND: ComponentKind;
    fn column(columns: &Columns) -> &Column<Self>;
    fn column_mut(columns: &mut Columns) -> &mut Column<Self>;
}

macro_rules! components {
    ($($ty:ident => $field:ident),* $(,)?) => {
        /// One column per component type
        #[derive(Debug, Clone, Default)]
        pub struct Columns {
            $(pub $field: Column<$ty>,)*
        }

        impl Columns {
            fn remove_entity(&mut self, id: EntityId) {
                $(self.$field.remove(id);)*
            }
        }

        /// Names a component type without carrying a value
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ComponentKind {
            $($ty,)*
        }

        impl ComponentKind {
            fn remove_from(self, columns: &mut Columns, id: EntityId) {
                match self {
                    $(ComponentKind::$ty => {
                        columns.$field.remove(id);
                    })*
                }
            }
        }

        /// A component value of any type, used by deferred commands
        #[derive(Debug, Clone, PartialEq)]
        pub enum AnyComponent {
            $($ty($ty),)*
        }

        impl AnyComponent {
            fn attach_to(self, columns: &mut Columns, id: EntityId) {
                match self {
                    $(AnyComponent::$ty(value) => {
                        columns.$field.insert(id, value);
                    })*
                }
            }
        }

        $(
            impl Component for $ty {
                const KIND: ComponentKind = ComponentKind::$ty;

                #[inline]
                fn column(columns: &Columns) -> &Column<Self> {
                    &columns.$field
                }

                #[inline]
                fn column_mut(columns: &mut Columns) -> &mut Column<Self> {
                    &mut columns.$field
                }
            }

            impl From<$ty> for AnyComponent {
                fn from(value: $ty) -> Self {
                    AnyComponent::$ty(value)
                }
            }
        )*
    };
}

components! {
    Bot => bot,
    Position => position,
    PreviousPosition => previous_position,
    TargetDirection => target_direction,
    Collided => collided,
    Collider => collider,
    WanderPersistence => wander,
    MotionMemory => motion,
    Facing => facing,
    Destination => destination,
    DestinationDeadline => deadline,
    Faction => faction,
    HostileToFactions => hostile,
    FoodCanon => canon,
    ShotCount => shots,
    Projectile => projectile,
    MinimapPixel => minimap,
    PointerTile => pointer,
}

/// Owner of every entity and component array
#[derive(Debug, Clone)]
pub struct ComponentStore {
    /// Liveness by raw id; index 0 is the reserved sentinel
    alive: Vec<bool>,
    /// Recycled ids, reused oldest-first once the quarantine is full
    free: VecDeque<u32>,
    live_count: usize,
    /// Component columns; systems borrow disjoint columns directly
    pub columns: Columns,
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentStore {
    pub fn new() -> Self {
        Self {
            alive: vec![false],
            free: VecDeque::new(),
            live_count: 0,
            columns: Columns::default(),
        }
    }

    /// Allocate an entity id (never `EntityId::NONE`)
    pub fn spawn(&mut self) -> EntityId {
        let recycled = if self.free.len() > REUSE_QUARANTINE {
            self.free.pop_front()
        } else {
            None
        };
        let raw = match recycled {
            Some(raw) => {
                self.alive[raw as usize] = true;
                raw
            }
            None => {
                let raw = self.alive.len() as u32;
                self.alive.push(true);
                raw
            }
        };
        self.live_count += 1;
        EntityId(raw)
    }

    /// Spawn and attach a bundle of components in one step
    pub fn spawn_with(&mut self, bundle: impl IntoIterator<Item = AnyComponent>) -> EntityId {
        let id = self.spawn();
        for component in bundle {
            component.attach_to(&mut self.columns, id);
        }
        id
    }

    /// Remove the entity from every column and free its id for reuse.
    /// Returns false for dead or unknown ids.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.columns.remove_entity(id);
        self.alive[id.index()] = false;
        self.free.push_back(id.raw());
        self.live_count -= 1;
        true
    }

    #[inline]
    pub fn is_alive(&self, id: EntityId) -> bool {
        !id.is_none() && self.alive.get(id.index()).copied().unwrap_or(false)
    }

    /// Number of live entities
    #[inline]
    pub fn len(&self) -> usize {
        self.live_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Attach (or overwrite) a component. Attaching to a dead entity is a no-op.
    pub fn attach<C: Component>(&mut self, id: EntityId, value: C) -> bool {
        if !self.is_alive(id) {
            log::debug!("Ignoring {:?} attach to dead entity {}", C::KIND, id);
            return false;
        }
        C::column_mut(&mut self.columns).insert(id, value);
        true
    }

    #[inline]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        C::column(&self.columns).get(id)
    }

    #[inline]
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        C::column_mut(&mut self.columns).get_mut(id)
    }

    #[inline]
    pub fn has<C: Component>(&self, id: EntityId) -> bool {
        C::column(&self.columns).contains(id)
    }

    pub fn remove<C: Component>(&mut self, id: EntityId) -> Option<C> {
        C::column_mut(&mut self.columns).remove(id)
    }

    /// Entities holding `C`, in attachment order
    pub fn iter<C: Component>(&self) -> impl Iterator<Item = (EntityId, &C)> {
        C::column(&self.columns).iter()
    }

    /// Ids holding `C` in attachment order, detached from the store borrow
    pub fn ids_with<C: Component>(&self) -> Vec<EntityId> {
        C::column(&self.columns).ids()
    }

    /// Apply deferred structural changes in queue order; returns spawned ids
    pub fn apply(&mut self, buffer: &mut CommandBuffer) -> Vec<EntityId> {
        let mut spawned = Vec::new();
        for command in buffer.commands.drain(..) {
            match command {
                Command::Spawn(bundle) => spawned.push(self.spawn_with(bundle)),
                Command::Destroy(id) => {
                    self.destroy(id);
                }
                Command::Attach(id, component) => {
                    if self.is_alive(id) {
                        component.attach_to(&mut self.columns, id);
                    }
                }
                Command::Remove(id, kind) => kind.remove_from(&mut self.columns, id),
            }
        }
        spawned
    }
}

/// A structural change queued during a system pass
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Spawn(Vec<AnyComponent>),
    Destroy(EntityId),
    Attach(EntityId, AnyComponent),
    Remove(EntityId, ComponentKind),
}

/// Structural changes deferred to the end of a system pass
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, bundle: Vec<AnyComponent>) {
        self.commands.push(Command::Spawn(bundle));
    }

    pub fn destroy(&mut self, id: EntityId) {
        self.commands.push(Command::Destroy(id));
    }

    pub fn attach(&mut self, id: EntityId, component: impl Into<AnyComponent>) {
        self.commands.push(Command::Attach(id, component.into()));
    }

    pub fn remove<C: Component>(&mut self, id: EntityId) {
        self.commands.push(Command::Remove(id, C::KIND));
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

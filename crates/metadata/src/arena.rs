//! Typed ids and the slot arena that owns every metadata element
//!
//! Ids are indices into a slot vector. Removing an element empties its slot;
//! the slot is never reused, so a stale id resolves to `None` forever. Only
//! a rolled-back step gives back the slots it allocated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

// ============================================================================
// Ids
// ============================================================================

/// Typed index into an [`Arena`]
pub trait ArenaId: Copy + Eq + Ord + Hash + fmt::Debug {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            #[inline]
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Handle of an entity type
    EntityTypeId,
    "entity"
);
define_id!(
    /// Handle of a property
    PropertyId,
    "property"
);
define_id!(
    /// Handle of a key
    KeyId,
    "key"
);
define_id!(
    /// Handle of a foreign key (a relationship)
    ForeignKeyId,
    "fk"
);
define_id!(
    /// Handle of a navigation
    NavigationId,
    "navigation"
);
define_id!(
    /// Handle of an index
    IndexId,
    "index"
);

// ============================================================================
// Arena
// ============================================================================

/// Append-only slot storage addressed by typed ids
///
/// While a mark is open, every slot handed out mutably or emptied is saved
/// first, so [`Arena::rollback`] costs what the step touched rather than
/// the size of the arena.
#[derive(Clone)]
pub struct Arena<I, T> {
    slots: Vec<Option<T>>,
    live: usize,
    undo: Vec<(usize, Option<T>)>,
    open_marks: usize,
    _id: PhantomData<fn() -> I>,
}

/// Arena state at the start of an undoable step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMark {
    slots: usize,
    live: usize,
    undo: usize,
}

impl<I: ArenaId, T> Arena<I, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            undo: Vec::new(),
            open_marks: 0,
            _id: PhantomData,
        }
    }

    /// Insert an element built from its freshly allocated id
    pub fn insert_with(&mut self, build: impl FnOnce(I) -> T) -> I {
        let id = I::from_index(self.slots.len());
        self.slots.push(Some(build(id)));
        self.live += 1;
        id
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live elements in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (I::from_index(index), value)))
    }
}

impl<I: ArenaId, T: Clone> Arena<I, T> {
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        let index = id.index();
        self.save(index);
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Remove an element; its id is retired
    pub fn remove(&mut self, id: I) -> Option<T> {
        let index = id.index();
        self.save(index);
        let removed = self.slots.get_mut(index).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    fn save(&mut self, index: usize) {
        if self.open_marks == 0 {
            return;
        }
        if let Some(Some(value)) = self.slots.get(index) {
            self.undo.push((index, Some(value.clone())));
        }
    }

    /// Open an undoable step; marks nest
    pub fn mark(&mut self) -> ArenaMark {
        self.open_marks += 1;
        ArenaMark {
            slots: self.slots.len(),
            live: self.live,
            undo: self.undo.len(),
        }
    }

    /// Undo everything since `mark` and close it
    pub fn rollback(&mut self, mark: ArenaMark) {
        while self.undo.len() > mark.undo {
            let Some((index, saved)) = self.undo.pop() else {
                break;
            };
            if let Some(slot) = self.slots.get_mut(index).filter(|_| index < mark.slots) {
                *slot = saved;
            }
        }
        self.slots.truncate(mark.slots);
        self.live = mark.live;
        self.close();
    }

    /// Keep everything since `mark` and close it
    ///
    /// The saved slots stay while an enclosing mark is open.
    pub fn release(&mut self, _mark: ArenaMark) {
        self.close();
    }

    fn close(&mut self) {
        self.open_marks = self.open_marks.saturating_sub(1);
        if self.open_marks == 0 {
            self.undo.clear();
        }
    }
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T: fmt::Debug> fmt::Debug for Arena<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

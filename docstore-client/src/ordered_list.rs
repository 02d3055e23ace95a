//! Small ordered list with boundary-aware neighbor queries.
//!
//! The list owns its entries. Callers look at them through borrowed [`Item`]
//! handles whose position is recomputed from the entry's identity on every
//! query, so a handle never reports a stale index. Each query is O(n), which is
//! fine for cluster node lists and short queues and nothing larger.
//!
//! Handles cannot outlive a mutation of the list. When a position has to be
//! remembered across mutations, keep the detached [`ItemId`] instead and
//! resolve it again with [`OrderedList::get`]; it resolves to `None` once the
//! entry is gone (for example after [`OrderedList::clear`]).

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// Ids are unique across every list in the process, so an id taken from one
// list never resolves to an entry of another.
static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Detached identity of an entry in an [`OrderedList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct Entry<T> {
    id: ItemId,
    value: T,
}

/// Ordered sequence with cheap insertion at either end.
pub struct OrderedList<T> {
    entries: VecDeque<Entry<T>>,
}

impl<T> OrderedList<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends `value` after the current last item.
    pub fn add_last(&mut self, value: T) -> &mut Self {
        self.entries.push_back(Entry {
            id: ItemId::next(),
            value,
        });
        self
    }

    /// Inserts `value` before the current first item.
    pub fn add_first(&mut self, value: T) -> &mut Self {
        self.entries.push_front(Entry {
            id: ItemId::next(),
            value,
        });
        self
    }

    /// Drops every entry. Ids handed out earlier no longer resolve.
    pub fn clear(&mut self) -> &mut Self {
        self.entries.clear();
        self
    }

    pub fn first(&self) -> Option<Item<'_, T>> {
        self.item_at(0)
    }

    pub fn last(&self) -> Option<Item<'_, T>> {
        self.len().checked_sub(1).and_then(|index| self.item_at(index))
    }

    pub fn item_at(&self, index: usize) -> Option<Item<'_, T>> {
        self.entries.get(index).map(|entry| Item {
            list: self,
            id: entry.id,
        })
    }

    /// Resolves a detached id back into a handle, if the entry still exists.
    pub fn get(&self, id: ItemId) -> Option<Item<'_, T>> {
        self.position(id).map(|_| Item { list: self, id })
    }

    pub fn value_mut(&mut self, id: ItemId) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .map(|entry| &mut entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = Item<'_, T>> + '_ {
        self.entries.iter().map(move |entry| Item {
            list: self,
            id: entry.id,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().map(|entry| &entry.value)
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for OrderedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut list = Self::new();
        for value in values {
            list.add_last(value);
        }
        list
    }
}

// Clones get fresh ids: an id always names an entry of exactly one list.
impl<T: Clone> Clone for OrderedList<T> {
    fn clone(&self) -> Self {
        self.values().cloned().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}

/// Borrowed handle to one entry of an [`OrderedList`].
pub struct Item<'a, T> {
    list: &'a OrderedList<T>,
    id: ItemId,
}

impl<'a, T> Item<'a, T> {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn value(&self) -> &'a T {
        &self.list.entries[self.index()].value
    }

    /// Current ordinal position, looked up from the entry's identity.
    pub fn index(&self) -> usize {
        match self.list.position(self.id) {
            Some(index) => index,
            // The handle borrows the list immutably, so its entry cannot be removed.
            None => unreachable!("item handle outlived its entry"),
        }
    }

    pub fn is_first(&self) -> bool {
        self.index() == 0
    }

    pub fn is_last(&self) -> bool {
        self.index() + 1 >= self.list.len()
    }

    pub fn previous(&self) -> Option<Item<'a, T>> {
        self.index()
            .checked_sub(1)
            .and_then(|index| self.list.item_at(index))
    }

    pub fn next(&self) -> Option<Item<'a, T>> {
        self.list.item_at(self.index() + 1)
    }
}

impl<T> Clone for Item<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Item<'_, T> {}

impl<T> PartialEq for Item<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.list, other.list) && self.id == other.id
    }
}

impl<T: fmt::Debug> fmt::Debug for Item<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("index", &self.index())
            .field("value", self.value())
            .finish()
    }
}

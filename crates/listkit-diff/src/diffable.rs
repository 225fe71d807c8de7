//! The identity and equality contract every diffed item satisfies.
//!
//! Two items describe the same entity when their [`Diffable::diff_identifier`]s
//! match. The same entity is unchanged when [`Diffable::is_equal_to`] also
//! holds; otherwise the diff reports an update.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// An item that can take part in a diff.
pub trait Diffable {
    /// Stable identifier, unchanged across value updates.
    type Id: Eq + Hash + Clone + Debug;

    /// The identifier of this item.
    fn diff_identifier(&self) -> Self::Id;

    /// Value equality against another version of the same entity.
    fn is_equal_to(&self, other: &Self) -> bool;
}

macro_rules! self_identified {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Diffable for $ty {
                type Id = $ty;

                fn diff_identifier(&self) -> Self::Id {
                    self.clone()
                }

                fn is_equal_to(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

self_identified!(String, char, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Diffable for &str {
    type Id = String;

    fn diff_identifier(&self) -> Self::Id {
        (*self).to_string()
    }

    fn is_equal_to(&self, other: &Self) -> bool {
        self == other
    }
}

// ---------------------------------------------------------------------------
// Keyed
// ---------------------------------------------------------------------------

/// An identifier paired with a value compared by `PartialEq`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyed<K, V> {
    pub id: K,
    pub value: V,
}

impl<K, V> Keyed<K, V> {
    pub fn new(id: K, value: V) -> Self {
        Self { id, value }
    }
}

impl<K, V> Diffable for Keyed<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: PartialEq,
{
    type Id = K;

    fn diff_identifier(&self) -> K {
        self.id.clone()
    }

    fn is_equal_to(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// One section of a two-level sequence.
///
/// The header carries the section's identity and value; the rows are diffed
/// separately, so a section is equal to another version of itself when the
/// headers are equal, whatever its rows did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section<S, T> {
    pub header: S,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<S, T> Section<S, T> {
    pub fn new(header: S, items: Vec<T>) -> Self {
        Self { header, items }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<S: Diffable, T> Diffable for Section<S, T> {
    type Id = S::Id;

    fn diff_identifier(&self) -> Self::Id {
        self.header.diff_identifier()
    }

    fn is_equal_to(&self, other: &Self) -> bool {
        self.header.is_equal_to(&other.header)
    }
}

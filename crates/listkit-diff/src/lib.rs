//! Diff engine for listkit.
//!
//! Computes minimal edit scripts between two ordered sequences of
//! identity-bearing items, flat or grouped into sections.
//!
//! # Key Types
//!
//! - [`Diffable`] -- identity + value equality contract for diffed items
//! - [`EditScript`] / [`Move`] / [`Update`] -- flat diff result
//! - [`SectionedScript`] / [`IndexPath`] -- two-level diff result
//!
//! # Quick Start
//!
//! ```rust
//! use listkit_diff::{diff, Keyed};
//!
//! let before = [Keyed::new(1, "a"), Keyed::new(2, "b"), Keyed::new(3, "c")];
//! let after = [Keyed::new(3, "c"), Keyed::new(1, "a"), Keyed::new(4, "d")];
//! let script = diff(&before, &after).unwrap();
//! assert_eq!(script.deletes.len(), 1);
//! assert_eq!(script.inserts.len(), 1);
//! assert_eq!(script.moves.len(), 2);
//! assert_eq!(script.apply(&before, &after).unwrap(), after.to_vec());
//! ```

pub mod diffable;
pub mod error;
pub mod flat;
pub mod script;
pub mod sectioned;

pub use diffable::{Diffable, Keyed, Section};
pub use error::{DiffError, DiffResult, Side};
pub use flat::{
    check_unique, deleted_identities, diff, diff_with, inserted_identities, DiffOptions,
    DuplicatePolicy,
};
pub use script::{EditScript, Move, Record, Update};
pub use sectioned::{
    check_sections_unique, diff_sections, diff_sections_with, IndexPath, IndexPathMove,
    IndexPathUpdate, RowDiff, SectionedScript,
};

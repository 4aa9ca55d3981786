//! Byte-level storage and editing of text
//!
//! This module exports a few key types: [`ChunkTree`] stores the content of a buffer,
//! [`Edit`]s and their [`Modification`]s describe changes to it, [`History`] keeps track of
//! which edits can be undone, and the [`PositionPatcher`] carries positions across an edit.
//!
//! Please note that there's absolutely no guarantee that the text is UTF-8 encoded; everything
//! here operates on bytes.

mod chunks;
mod edit;
mod history;
mod patch;

pub use chunks::{ChunkLimits, ChunkTree, Iter, DEFAULT_MAX_CHUNK_SIZE};
pub use edit::{Edit, EditKind, EditSource, Modification};
pub use history::History;
pub use patch::{PatchRange, PositionPatcher, Strategy};

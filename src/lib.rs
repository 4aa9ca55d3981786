//! Chunked text storage with exact undo and position tracking
//!
//! The content of each [`Buffer`] is stored in a [`ChunkTree`](text::ChunkTree): a piece table
//! made of bounded byte chunks, held in a red-black [`Tree`](tree::Tree) that tracks the number
//! of bytes and line breaks in every subtree. On top of that sit the edit engine (see
//! [`Modifier`]), the linear undo [`History`](text::History), and the events that let observers
//! follow along, with the [`PositionPatcher`](text::PositionPatcher) for updating any positions
//! they've stored.
//!
//! Buffers are created through a [`BufferManager`], which is passed around explicitly rather than
//! living in a global.

// Other flags:
#![warn(clippy::style, clippy::perf)]
#![deny(
    clippy::perf,
    clippy::len_zero,
    clippy::redundant_closure,
    unused_must_use
)]

pub mod buffer;
pub mod config;
pub mod events;
pub mod lock;
pub mod logger;
pub mod manager;
pub mod text;
pub mod tree;

pub use buffer::{Buffer, BufferId, Content, Modifier};
pub use config::Config;
pub use events::{EditObserver, ListenerId};
pub use manager::{BufferManager, TagSlot};

//! Grace-period reclamation for read-mostly snapshot state.
//!
//! Writers publish immutable snapshots by atomically exchanging a shared
//! reference and hand the superseded instance to a [`GraceDomain`], which
//! holds it until every read-side critical section that was active at the
//! exchange has ended. Readers never block behind writers; writers wait out
//! readers instead of invalidating them.
//!
//! The mechanism is an explicit epoch counter plus one slot per registered
//! reader. Entering a critical section stamps the slot with the epoch at
//! entry; leaving it marks the slot quiescent. A writer advances the epoch
//! and waits until no slot is still stamped from before the advance.
//!
//! ```text
//! Reader:  register() ── enter() ── read snapshots ── drop guard ──┐
//!                             ▲                                    │
//!                             └──────────── next iteration ◄───────┘
//! Writer:  exchange reference ── retire(old) ── synchronize().await
//! ```

/// Grace domain: the epoch counter, slot table, and deferred-drop bin.
mod domain;
/// Per-reader registration and critical-section guards.
mod reader;

pub use domain::GraceDomain;
pub use reader::{ReadGuard, ReaderHandle};

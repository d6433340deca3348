//! Immutable snapshot entities and the exchangeable cell that publishes them.

use std::sync::Arc;

use arc_swap::ArcSwap;
use quiesce_epoch::ReadGuard;

/// Operational state of the server.
///
/// Exchanged whole on every recovery start and end; the flag is never
/// flipped on a published instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationalState {
	/// True while a recovery pass owns the payload.
	pub recovering: bool,
}

/// The servable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
	pub message: u64,
}

/// Update timestamp counter, folded with the payload during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockStamp {
	pub time: u64,
}

/// Response header configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Headers {
	pub cors: bool,
	pub content_type: u16,
	pub timeout_secs: u64,
}

impl Default for Headers {
	fn default() -> Self {
		Self {
			cors: true,
			content_type: 3,
			timeout_secs: 5,
		}
	}
}

/// A single exchangeable reference to the current published instance of one
/// snapshot entity.
///
/// Published instances are immutable; the only mutation is replacing the
/// reference itself. [`exchange`](Self::exchange) callers must hold the
/// entity's write-serialization lock and hand the returned instance to the
/// grace domain rather than dropping it in place.
#[derive(Debug)]
pub struct SnapshotCell<T> {
	current: ArcSwap<T>,
}

impl<T> SnapshotCell<T> {
	/// Publishes the initial instance.
	pub fn new(initial: T) -> Self {
		Self {
			current: ArcSwap::from_pointee(initial),
		}
	}

	/// Returns the currently-published reference for use inside the given
	/// read-side critical section.
	///
	/// The reference stays valid for the life of the guard even if a writer
	/// exchanges the cell concurrently; sections entered after an exchange
	/// observe the new instance.
	pub fn read(&self, _section: &ReadGuard<'_>) -> Arc<T> {
		self.current.load_full()
	}

	/// Writer-side read of the current instance.
	///
	/// Call under the entity's write-serialization lock when the value feeds
	/// a replacement snapshot; lock-free callers only get a consistent
	/// point-in-time observation.
	pub fn latest(&self) -> Arc<T> {
		self.current.load_full()
	}

	/// Atomically publishes `next` and returns the superseded instance for
	/// retirement.
	///
	/// Callers must hold the entity's write-serialization lock.
	pub fn exchange(&self, next: Arc<T>) -> Arc<T> {
		self.current.swap(next)
	}
}

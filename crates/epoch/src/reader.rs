use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::domain::{DomainState, QUIESCENT, SlotState};

/// One reader's registration with a [`GraceDomain`](crate::GraceDomain).
///
/// Owned by a single reader task. [`enter`](Self::enter) opens a read-side
/// critical section; the handle is unusable for a second section until the
/// returned guard is dropped. Dropping the handle unregisters the reader.
pub struct ReaderHandle {
	domain: Arc<DomainState>,
	slot: Arc<SlotState>,
	key: usize,
}

impl ReaderHandle {
	pub(crate) fn new(domain: Arc<DomainState>, slot: Arc<SlotState>, key: usize) -> Self {
		Self { domain, slot, key }
	}

	/// Opens a read-side critical section.
	///
	/// Every snapshot reference obtained while the guard lives stays valid
	/// until the guard is dropped, regardless of concurrent exchanges. Keep
	/// the section bounded: writers waiting out a grace period cannot make
	/// progress past an open guard.
	pub fn enter(&mut self) -> ReadGuard<'_> {
		let epoch = self.domain.epoch.load(Ordering::SeqCst);
		self.slot.active_since.store(epoch, Ordering::SeqCst);
		ReadGuard { handle: self }
	}
}

impl Drop for ReaderHandle {
	fn drop(&mut self) {
		self.domain.slots.write().remove(self.key);
		// A writer may have been waiting on this slot.
		self.domain.quiesced.notify_waiters();
		tracing::trace!(slot = self.key, "epoch.unregister");
	}
}

impl std::fmt::Debug for ReaderHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReaderHandle").field("slot", &self.key).finish()
	}
}

/// An open read-side critical section.
///
/// Dropping the guard ends the section and wakes writers waiting for the
/// grace period to elapse.
#[must_use]
pub struct ReadGuard<'a> {
	handle: &'a ReaderHandle,
}

impl Drop for ReadGuard<'_> {
	fn drop(&mut self) {
		self.handle.slot.active_since.store(QUIESCENT, Ordering::SeqCst);
		self.handle.domain.quiesced.notify_waiters();
	}
}

impl std::fmt::Debug for ReadGuard<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReadGuard").field("slot", &self.handle.key).finish()
	}
}

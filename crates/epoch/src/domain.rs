use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use slab::Slab;
use tokio::sync::Notify;

use crate::reader::ReaderHandle;

/// Slot stamp meaning "no critical section in progress".
pub(crate) const QUIESCENT: u64 = u64::MAX;

/// One registered reader's entry stamp.
///
/// Holds the epoch observed when the reader entered its current critical
/// section, or [`QUIESCENT`] when none is in progress.
#[derive(Debug)]
pub(crate) struct SlotState {
	pub(crate) active_since: AtomicU64,
}

/// A snapshot whose destruction is deferred until its grace period elapses.
struct Deferred {
	retired_at: u64,
	garbage: Box<dyn Any + Send>,
}

pub(crate) struct DomainState {
	/// Global epoch. Monotone; advanced by writers in `synchronize`.
	pub(crate) epoch: AtomicU64,
	/// Slot arena for registered readers.
	pub(crate) slots: RwLock<Slab<Arc<SlotState>>>,
	/// Superseded snapshots awaiting the end of their grace period.
	bin: Mutex<Vec<Deferred>>,
	/// Signalled whenever a reader leaves a critical section or unregisters.
	pub(crate) quiesced: Notify,
}

/// Deferred-reclamation domain shared by one set of readers and writers.
///
/// Cloning is cheap and yields another handle to the same domain.
#[derive(Clone)]
pub struct GraceDomain {
	inner: Arc<DomainState>,
}

impl Default for GraceDomain {
	fn default() -> Self {
		Self::new()
	}
}

impl GraceDomain {
	/// Creates an empty domain at epoch zero.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(DomainState {
				epoch: AtomicU64::new(0),
				slots: RwLock::new(Slab::new()),
				bin: Mutex::new(Vec::new()),
				quiesced: Notify::new(),
			}),
		}
	}

	/// Registers a reader with this domain.
	///
	/// The returned handle owns one slot; dropping it unregisters the
	/// reader and unblocks any writer waiting on it.
	pub fn register(&self) -> ReaderHandle {
		let slot = Arc::new(SlotState {
			active_since: AtomicU64::new(QUIESCENT),
		});
		let key = self.inner.slots.write().insert(Arc::clone(&slot));
		tracing::trace!(slot = key, "epoch.register");
		ReaderHandle::new(Arc::clone(&self.inner), slot, key)
	}

	/// Defers destruction of a superseded snapshot.
	///
	/// The snapshot is dropped once every critical section that was active
	/// when `retire` was called has ended. The call itself never blocks;
	/// reclamation happens opportunistically here and in [`synchronize`].
	///
	/// The caller must not be inside a read-side critical section of this
	/// domain, or reclamation of the retired snapshot can never progress.
	///
	/// [`synchronize`]: Self::synchronize
	pub fn retire<T: Send + Sync + 'static>(&self, snapshot: Arc<T>) {
		let retired_at = self.inner.epoch.load(Ordering::SeqCst);
		{
			let mut bin = self.inner.bin.lock();
			bin.push(Deferred {
				retired_at,
				garbage: Box::new(snapshot),
			});
		}
		tracing::trace!(epoch = retired_at, "epoch.retire");
		self.try_reclaim();
	}

	/// Waits until every read-side critical section active at the time of
	/// the call has ended, then reclaims everything that became safe.
	///
	/// Critical sections entered after the call starts are irrelevant and do
	/// not extend the wait. The future is cancel-safe: dropping it leaves
	/// the epoch advanced and the bin intact.
	///
	/// The caller must not hold a [`ReadGuard`](crate::ReadGuard) of this
	/// domain across this call.
	pub async fn synchronize(&self) {
		let target = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
		tracing::trace!(epoch = target, "epoch.sync.begin");
		loop {
			// Enabled before the scan so a reader exiting between the scan
			// and the await still wakes us.
			let notified = self.inner.quiesced.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();
			if self.all_quiescent_at(target) {
				break;
			}
			notified.await;
		}
		self.try_reclaim();
		tracing::trace!(epoch = target, "epoch.sync.end");
	}

	/// Number of snapshots still waiting out their grace period.
	pub fn pending(&self) -> usize {
		self.inner.bin.lock().len()
	}

	/// Number of currently registered readers.
	pub fn readers(&self) -> usize {
		self.inner.slots.read().len()
	}

	/// True when no slot is still stamped from before `target`.
	fn all_quiescent_at(&self, target: u64) -> bool {
		let slots = self.inner.slots.read();
		slots.iter().all(|(_, slot)| {
			let stamp = slot.active_since.load(Ordering::SeqCst);
			stamp == QUIESCENT || stamp >= target
		})
	}

	/// Earliest entry stamp across all active critical sections.
	fn min_active(&self) -> u64 {
		let slots = self.inner.slots.read();
		slots
			.iter()
			.map(|(_, slot)| slot.active_since.load(Ordering::SeqCst))
			.min()
			.unwrap_or(QUIESCENT)
	}

	/// Drops every retired snapshot whose grace period has elapsed.
	///
	/// An entry retired at epoch `E` is safe once every active critical
	/// section entered strictly after `E`.
	fn try_reclaim(&self) {
		let min = self.min_active();
		let mut ready = Vec::new();
		{
			let mut bin = self.inner.bin.lock();
			let mut index = 0;
			while index < bin.len() {
				if bin[index].retired_at < min {
					ready.push(bin.swap_remove(index));
				} else {
					index += 1;
				}
			}
		}
		if ready.is_empty() {
			return;
		}
		tracing::trace!(reclaimed = ready.len(), "epoch.reclaim");
		// Destructors run outside the bin lock.
		for deferred in ready {
			drop(deferred.garbage);
		}
	}
}

impl std::fmt::Debug for GraceDomain {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GraceDomain")
			.field("epoch", &self.inner.epoch.load(Ordering::SeqCst))
			.field("readers", &self.readers())
			.field("pending", &self.pending())
			.finish()
	}
}

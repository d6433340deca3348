//! The shared server context: current snapshot references, write locks, and
//! the grace domain.

use std::sync::Arc;

use quiesce_epoch::{GraceDomain, ReadGuard, ReaderHandle};
use tokio::sync::Mutex;

use crate::snapshot::{ClockStamp, Headers, OperationalState, Payload, SnapshotCell};

/// Owns the current snapshot references and the machinery that guards them.
///
/// One instance exists per engine lifetime, explicitly constructed and
/// shared as `Arc<Server>` with every reader, the publisher, and the
/// recovery controller.
///
/// Write serialization is split in two: state and headers exchanges are
/// frequent and cheap, payload and clock exchanges are slow (the recovery
/// transform holds its lock across the simulated repair latency). Coupling
/// them under one lock would stall recovery-flag flips behind a transform.
pub struct Server {
	pub(crate) state: SnapshotCell<OperationalState>,
	pub(crate) headers: SnapshotCell<Headers>,
	pub(crate) payload: SnapshotCell<Payload>,
	pub(crate) clock: SnapshotCell<ClockStamp>,
	/// Serializes OperationalState and Headers exchanges.
	pub(crate) state_lock: Mutex<()>,
	/// Serializes Payload and Clock exchanges.
	pub(crate) content_lock: Mutex<()>,
	domain: GraceDomain,
}

impl Default for Server {
	fn default() -> Self {
		Self::new()
	}
}

impl Server {
	/// Publishes the initial snapshots: empty payload, zero clock, not
	/// recovering, default headers.
	pub fn new() -> Self {
		Self {
			state: SnapshotCell::new(OperationalState { recovering: false }),
			headers: SnapshotCell::new(Headers::default()),
			payload: SnapshotCell::new(Payload { message: 0 }),
			clock: SnapshotCell::new(ClockStamp { time: 0 }),
			state_lock: Mutex::new(()),
			content_lock: Mutex::new(()),
			domain: GraceDomain::new(),
		}
	}

	/// The grace domain retiring this server's superseded snapshots.
	pub fn domain(&self) -> &GraceDomain {
		&self.domain
	}

	/// Registers a reader task with the grace domain.
	pub fn register_reader(&self) -> ReaderHandle {
		self.domain.register()
	}

	/// Current operational state for this critical section.
	pub fn state(&self, section: &ReadGuard<'_>) -> Arc<OperationalState> {
		self.state.read(section)
	}

	/// Current payload for this critical section.
	///
	/// Callers must check [`OperationalState::recovering`] first: while a
	/// recovery pass is visible the payload's semantic validity is
	/// suspended, and only the reference itself is guaranteed.
	pub fn payload(&self, section: &ReadGuard<'_>) -> Arc<Payload> {
		self.payload.read(section)
	}

	/// Current headers for this critical section.
	pub fn headers(&self, section: &ReadGuard<'_>) -> Arc<Headers> {
		self.headers.read(section)
	}

	/// Current clock for this critical section.
	pub fn clock(&self, section: &ReadGuard<'_>) -> Arc<ClockStamp> {
		self.clock.read(section)
	}

	/// Point-in-time observation of the current operational state, outside
	/// any critical section.
	pub fn latest_state(&self) -> Arc<OperationalState> {
		self.state.latest()
	}

	/// Point-in-time observation of the current payload.
	pub fn latest_payload(&self) -> Arc<Payload> {
		self.payload.latest()
	}

	/// Point-in-time observation of the current clock.
	pub fn latest_clock(&self) -> Arc<ClockStamp> {
		self.clock.latest()
	}

	/// Point-in-time observation of the current headers.
	pub fn latest_headers(&self) -> Arc<Headers> {
		self.headers.latest()
	}

	/// Publishes a new operational state with the given recovery flag.
	///
	/// Idempotent: when the published flag already holds `recovering` no
	/// exchange happens and nothing is retired. Returns whether an exchange
	/// was performed.
	pub async fn set_recovering(&self, recovering: bool) -> bool {
		let _serial = self.state_lock.lock().await;
		if self.state.latest().recovering == recovering {
			return false;
		}
		let old = self.state.exchange(Arc::new(OperationalState { recovering }));
		self.domain.retire(old);
		tracing::debug!(recovering, "server.state.exchange");
		true
	}

	/// Publishes replacement headers, retiring the superseded instance.
	pub async fn replace_headers(&self, headers: Headers) {
		let _serial = self.state_lock.lock().await;
		let old = self.headers.exchange(Arc::new(headers));
		self.domain.retire(old);
		tracing::debug!(content_type = headers.content_type, "server.headers.exchange");
	}
}

impl std::fmt::Debug for Server {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Server")
			.field("recovering", &self.state.latest().recovering)
			.field("message", &self.payload.latest().message)
			.field("time", &self.clock.latest().time)
			.field("domain", &self.domain)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn startup_publishes_all_snapshots() {
		let server = Server::new();
		assert!(!server.state.latest().recovering);
		assert_eq!(server.payload.latest().message, 0);
		assert_eq!(server.clock.latest().time, 0);
		assert_eq!(server.headers.latest(), Arc::new(Headers::default()));
	}

	#[tokio::test]
	async fn set_recovering_is_idempotent() {
		let server = Server::new();

		// Same value: no exchange, no retirement, same instance.
		let before = server.state.latest();
		assert!(!server.set_recovering(false).await);
		assert!(Arc::ptr_eq(&before, &server.state.latest()));
		assert_eq!(server.domain().pending(), 0);

		assert!(server.set_recovering(true).await);
		assert!(server.state.latest().recovering);
		assert!(!server.set_recovering(true).await);

		assert!(server.set_recovering(false).await);
		assert!(!server.state.latest().recovering);
	}

	#[tokio::test]
	async fn replace_headers_retires_the_old_instance() {
		let server = Server::new();
		let mut handle = server.register_reader();

		let section = handle.enter();
		let captured = server.headers(&section);
		server
			.replace_headers(Headers {
				cors: false,
				content_type: 7,
				timeout_secs: 30,
			})
			.await;

		// Open section still sees its capture; the old instance is parked
		// in the grace domain rather than dropped.
		assert_eq!(captured.content_type, 3);
		assert_eq!(server.domain().pending(), 1);
		drop(section);

		server.domain().synchronize().await;
		assert_eq!(server.domain().pending(), 0);
		let section = handle.enter();
		assert_eq!(server.headers(&section).content_type, 7);
	}
}

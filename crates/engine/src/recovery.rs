//! Recovery controller: a cyclic state machine over the operational-state
//! and payload snapshots.
//!
//! One cycle walks Idle → Entering-Recovery → Transforming →
//! Exiting-Recovery and back to Idle. The grace-period wait after raising
//! the recovery flag is the linchpin: it guarantees that every reader which
//! might still act on the previous "not recovering" state has left its
//! critical section before the transform may touch the payload.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::server::Server;
use crate::snapshot::ClockStamp;
use crate::transform::PayloadTransform;

/// How one recovery cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
	Completed,
	Cancelled,
}

/// Controller loop: parks until the wake timer or an explicit resume, then
/// runs one recovery cycle. A failed cycle is retried on the next wake; a
/// cancelled one exits the loop.
pub(crate) async fn run_controller(
	server: Arc<Server>,
	transform: Arc<dyn PayloadTransform>,
	config: EngineConfig,
	resume: Arc<Notify>,
	token: CancellationToken,
) {
	loop {
		tokio::select! {
			biased;
			_ = token.cancelled() => break,
			_ = resume.notified() => {}
			_ = tokio::time::sleep(config.controller_wake) => {}
		}

		match run_cycle(&server, transform.as_ref(), config.recovery_latency, &token).await {
			Ok(CycleOutcome::Completed) => {}
			Ok(CycleOutcome::Cancelled) => break,
			Err(err) => {
				// Previous snapshots stay authoritative; retry next wake.
				tracing::warn!(error = %err, "engine.recovery.abort");
			}
		}
	}
	tracing::debug!("engine.recovery.exit");
}

/// Runs one full recovery cycle against the server.
pub(crate) async fn run_cycle(
	server: &Server,
	transform: &dyn PayloadTransform,
	latency: Duration,
	token: &CancellationToken,
) -> Result<CycleOutcome> {
	// Entering recovery. The exchange is idempotent: a cycle retried after
	// a failed transform finds the flag already raised.
	server.set_recovering(true).await;
	tracing::debug!("engine.recovery.enter");
	tokio::select! {
		biased;
		_ = token.cancelled() => return Ok(CycleOutcome::Cancelled),
		_ = server.domain().synchronize() => {}
	}

	// Transforming.
	{
		let _serial = server.content_lock.lock().await;
		let old_payload = server.payload.latest();
		let old_clock = server.clock.latest();
		// The clock fold must use the message as read under this lock
		// acquisition, not a value re-read after the exchange.
		let pre_message = old_payload.message;

		let next_payload = transform.recover(&old_payload)?;
		let message = next_payload.message;

		tokio::select! {
			biased;
			_ = token.cancelled() => return Ok(CycleOutcome::Cancelled),
			_ = tokio::time::sleep(latency) => {}
		}

		let next_clock = ClockStamp {
			time: pre_message ^ old_clock.time,
		};
		let time = next_clock.time;
		let retired_payload = server.payload.exchange(Arc::new(next_payload));
		let retired_clock = server.clock.exchange(Arc::new(next_clock));
		server.domain().retire(retired_payload);
		server.domain().retire(retired_clock);
		tracing::debug!(message, time, "engine.recovery.transform");
	}

	// Exiting recovery. Re-enabling normal reads needs no grace wait: a
	// stale section renders at most one extra degraded response.
	server.set_recovering(false).await;
	tracing::debug!("engine.recovery.leave");
	Ok(CycleOutcome::Completed)
}

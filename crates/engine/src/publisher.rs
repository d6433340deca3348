//! One-shot background payload updater.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::server::Server;
use crate::transform::PayloadTransform;

/// Runs one background publication pass, then parks until cancelled.
///
/// If a recovery pass is already visible on entry the payload is left
/// untouched entirely. Otherwise the pass follows the same discipline as
/// recovery: build under the content lock, exchange, retire through the
/// barrier. A failed build parks with the previous snapshot authoritative.
pub(crate) async fn run_publisher(
	server: Arc<Server>,
	transform: Arc<dyn PayloadTransform>,
	token: CancellationToken,
) {
	if server.state.latest().recovering {
		tracing::debug!("engine.publisher.parked");
		token.cancelled().await;
		return;
	}

	{
		let _serial = server.content_lock.lock().await;
		let current = server.payload.latest();
		match transform.publish(&current) {
			Ok(next) => {
				let message = next.message;
				let old = server.payload.exchange(Arc::new(next));
				server.domain().retire(old);
				tracing::debug!(message, "engine.publisher.exchange");
			}
			Err(err) => {
				tracing::warn!(error = %err, "engine.publisher.abort");
			}
		}
	}

	token.cancelled().await;
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::error::{EngineError, Result, SnapshotKind};
	use crate::snapshot::Payload;
	use crate::transform::DefaultTransform;

	struct FailingTransform;

	impl PayloadTransform for FailingTransform {
		fn publish(&self, _current: &Payload) -> Result<Payload> {
			Err(EngineError::SnapshotBuild {
				kind: SnapshotKind::Payload,
				reason: "out of memory".into(),
			})
		}

		fn recover(&self, _current: &Payload) -> Result<Payload> {
			unreachable!("publisher never runs the recovery step");
		}
	}

	#[tokio::test]
	async fn one_pass_steps_the_message_then_parks() {
		let server = Arc::new(Server::new());
		let token = CancellationToken::new();
		let publisher = tokio::spawn(run_publisher(
			Arc::clone(&server),
			Arc::new(DefaultTransform),
			token.clone(),
		));

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(server.payload.latest().message, 3);
		assert!(!publisher.is_finished(), "publisher should park, not exit");

		token.cancel();
		tokio::time::timeout(Duration::from_millis(500), publisher)
			.await
			.expect("parked publisher must honor cancellation")
			.unwrap();
		// One pass only.
		assert_eq!(server.payload.latest().message, 3);
	}

	#[tokio::test]
	async fn parks_untouched_while_recovery_is_visible() {
		let server = Arc::new(Server::new());
		server.set_recovering(true).await;
		let token = CancellationToken::new();
		let publisher = tokio::spawn(run_publisher(
			Arc::clone(&server),
			Arc::new(DefaultTransform),
			token.clone(),
		));

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(server.payload.latest().message, 0);

		token.cancel();
		publisher.await.unwrap();
		assert_eq!(server.payload.latest().message, 0);
	}

	#[tokio::test]
	async fn failed_build_leaves_the_previous_snapshot_authoritative() {
		let server = Arc::new(Server::new());
		let token = CancellationToken::new();
		let publisher = tokio::spawn(run_publisher(
			Arc::clone(&server),
			Arc::new(FailingTransform),
			token.clone(),
		));

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(server.payload.latest().message, 0);
		assert_eq!(server.domain().pending(), 0);

		token.cancel();
		publisher.await.unwrap();
	}
}

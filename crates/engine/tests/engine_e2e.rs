//! End-to-end engine scenario: one publisher pass, one recovery cycle, one
//! reader polling throughout.

use std::sync::Arc;
use std::time::Duration;

use quiesce_engine::{
	DefaultTransform, Engine, EngineConfig, MemorySink, RenderSink, STATUS_OK, STATUS_UNAVAILABLE,
	WorkerSpec,
};

async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while !cond() {
			tokio::time::sleep(Duration::from_millis(2)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn publish_then_recover_renders_the_expected_sequence() {
	let _ = tracing_subscriber::fmt::try_init();

	let sink = Arc::new(MemorySink::new());
	let engine = Engine::start(
		EngineConfig {
			// The timer never fires in this test; the cycle is triggered
			// explicitly so exactly one runs.
			controller_wake: Duration::from_secs(60),
			recovery_latency: Duration::from_millis(100),
		},
		Arc::new(DefaultTransform),
		Arc::clone(&sink) as Arc<dyn RenderSink>,
	)
	.expect("engine should start");

	assert_eq!(engine.server().latest_payload().message, 0);
	assert_eq!(engine.server().latest_clock().time, 0);
	assert!(!engine.server().latest_state().recovering);

	// One publisher pass: 0 → 3.
	engine.spawn_publisher().await;
	wait_for("the publisher pass", || engine.server().latest_payload().message == 3).await;

	// A reader polling from here on sees the full recovery arc.
	engine
		.spawn_reader(WorkerSpec {
			id: 0,
			read_interval: Duration::from_millis(2),
		})
		.await;
	wait_for("some normal renders", || sink.len() >= 5).await;

	engine.spawn_controller().await;
	engine.trigger_recovery();
	wait_for("the recovery cycle", || {
		engine.server().latest_payload().message == 8 && !engine.server().latest_state().recovering
	})
	.await;
	let seen = sink.len();
	wait_for("post-recovery renders", || sink.len() >= seen + 3).await;

	tokio::time::timeout(Duration::from_secs(2), engine.shutdown())
		.await
		.expect("shutdown should complete promptly");

	// 2^3 = 8; clock folds the pre-transform message: 3 XOR 0 = 3.
	assert_eq!(engine.server().latest_payload().message, 8);
	assert_eq!(engine.server().latest_clock().time, 3);

	// The rendered sequence collapses to exactly three phases:
	// [normal(3)]* [degraded]* [normal(8)]*, nothing else anywhere.
	let rendered = sink.snapshot();
	assert!(!rendered.is_empty());
	let mut phases: Vec<(u16, Option<u64>)> = Vec::new();
	for response in &rendered {
		let phase = (response.status, response.message);
		if phases.last() != Some(&phase) {
			phases.push(phase);
		}
	}
	assert_eq!(
		phases,
		[
			(STATUS_OK, Some(3)),
			(STATUS_UNAVAILABLE, None),
			(STATUS_OK, Some(8)),
		],
		"unexpected response sequence: {rendered:?}"
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn degraded_renders_never_carry_payload_data() {
	let _ = tracing_subscriber::fmt::try_init();

	let sink = Arc::new(MemorySink::new());
	let engine = Engine::start(
		EngineConfig {
			controller_wake: Duration::from_secs(60),
			recovery_latency: Duration::from_millis(80),
		},
		Arc::new(DefaultTransform),
		Arc::clone(&sink) as Arc<dyn RenderSink>,
	)
	.expect("engine should start");

	for id in 0..4 {
		engine
			.spawn_reader(WorkerSpec {
				id,
				read_interval: Duration::from_millis(2),
			})
			.await;
	}
	engine.spawn_controller().await;
	engine.trigger_recovery();
	wait_for("the recovery cycle", || engine.server().latest_payload().message == 1).await;
	engine.shutdown().await;

	let rendered = sink.snapshot();
	assert!(rendered.iter().any(|r| r.is_degraded()), "no reader saw the recovery window");
	for response in rendered {
		if response.is_degraded() {
			assert_eq!(response.message, None);
			assert_eq!(response.content_type, None);
		} else {
			assert!(response.message.is_some());
			assert_eq!(response.content_type, Some(3));
		}
	}
}

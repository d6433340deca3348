//! Engine lifecycle: owns the server context and every task operating on it.

use std::future::Future;
use std::sync::Arc;

use quiesce_worker::{TaskKind, TaskRecord, TaskRegistry, TaskSet};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::config::{EngineConfig, WorkerSpec};
use crate::error::Result;
use crate::publisher::run_publisher;
use crate::reader::{RenderSink, run_reader};
use crate::recovery::run_controller;
use crate::server::Server;
use crate::transform::PayloadTransform;

/// The assembled engine: one server context plus the lifecycle of its
/// reader, publisher, and recovery tasks.
///
/// Tasks share a single cancellation token; [`shutdown`](Self::shutdown)
/// cancels it, joins every task, and drains the grace domain. Every task
/// observes the token at each of its suspension points, so shutdown is
/// never blocked by a sleep, a grace wait, or the recovery latency.
pub struct Engine {
	server: Arc<Server>,
	transform: Arc<dyn PayloadTransform>,
	sink: Arc<dyn RenderSink>,
	config: EngineConfig,
	cancel: CancellationToken,
	resume: Arc<Notify>,
	tasks: Mutex<TaskSet<()>>,
	registry: TaskRegistry,
}

impl Engine {
	/// Validates the configuration and publishes the initial snapshots.
	///
	/// All-or-nothing: on error nothing is running and nothing was
	/// published.
	pub fn start(
		config: EngineConfig,
		transform: Arc<dyn PayloadTransform>,
		sink: Arc<dyn RenderSink>,
	) -> Result<Self> {
		config.validate()?;
		let server = Arc::new(Server::new());
		tracing::info!("engine.start");
		Ok(Self {
			server,
			transform,
			sink,
			config,
			cancel: CancellationToken::new(),
			resume: Arc::new(Notify::new()),
			tasks: Mutex::new(TaskSet::new()),
			registry: TaskRegistry::new(),
		})
	}

	/// The shared server context.
	pub fn server(&self) -> &Arc<Server> {
		&self.server
	}

	/// Registry of currently-live tasks.
	pub fn registry(&self) -> &TaskRegistry {
		&self.registry
	}

	/// Spawns one reader worker. Returns its task name.
	pub async fn spawn_reader(&self, spec: WorkerSpec) -> String {
		let name = format!("reader-{}", spec.id);
		let fut = run_reader(
			Arc::clone(&self.server),
			spec,
			Arc::clone(&self.sink),
			self.cancel.child_token(),
		);
		self.spawn_task(TaskKind::Reader, name.clone(), fut).await;
		name
	}

	/// Spawns the one-shot background publisher. Returns its task name.
	pub async fn spawn_publisher(&self) -> String {
		let name = "publisher".to_owned();
		let fut = run_publisher(
			Arc::clone(&self.server),
			Arc::clone(&self.transform),
			self.cancel.child_token(),
		);
		self.spawn_task(TaskKind::Publisher, name.clone(), fut).await;
		name
	}

	/// Spawns the recovery controller. Returns its task name.
	pub async fn spawn_controller(&self) -> String {
		let name = "recovery".to_owned();
		let fut = run_controller(
			Arc::clone(&self.server),
			Arc::clone(&self.transform),
			self.config.clone(),
			Arc::clone(&self.resume),
			self.cancel.child_token(),
		);
		self.spawn_task(TaskKind::Recovery, name.clone(), fut).await;
		name
	}

	/// Wakes the recovery controller ahead of its timer.
	pub fn trigger_recovery(&self) {
		self.resume.notify_one();
	}

	async fn spawn_task<F>(&self, kind: TaskKind, name: String, fut: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.registry.upsert(TaskRecord {
			name: name.clone(),
			kind,
		});
		let registry = self.registry.clone();
		self.tasks.lock().await.spawn(kind, async move {
			fut.await;
			registry.remove(&name);
		});
	}

	/// Stops the engine: signals every task, joins them all, then drains
	/// whatever is still parked in the grace domain.
	pub async fn shutdown(&self) {
		self.cancel.cancel();
		let mut tasks = self.tasks.lock().await;
		while tasks.join_next().await.is_some() {}
		self.server.domain().synchronize().await;
		tracing::info!("engine.stop");
	}
}

impl std::fmt::Debug for Engine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Engine")
			.field("server", &self.server)
			.field("tasks", &self.registry.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::reader::MemorySink;
	use crate::transform::DefaultTransform;

	fn engine_with(config: EngineConfig) -> Engine {
		Engine::start(config, Arc::new(DefaultTransform), Arc::new(MemorySink::new()))
			.expect("engine should start")
	}

	#[test]
	fn start_rejects_invalid_config() {
		let config = EngineConfig {
			controller_wake: Duration::ZERO,
			..EngineConfig::default()
		};
		let result = Engine::start(config, Arc::new(DefaultTransform), Arc::new(MemorySink::new()));
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn registry_tracks_spawned_tasks_until_shutdown() {
		let engine = engine_with(EngineConfig::default());
		engine
			.spawn_reader(WorkerSpec {
				id: 0,
				read_interval: Duration::from_millis(1),
			})
			.await;
		engine
			.spawn_reader(WorkerSpec {
				id: 1,
				read_interval: Duration::from_millis(1),
			})
			.await;
		engine.spawn_publisher().await;
		engine.spawn_controller().await;

		let names: Vec<_> = engine.registry().snapshots().into_iter().map(|r| r.name).collect();
		assert_eq!(names, ["publisher", "reader-0", "reader-1", "recovery"]);

		tokio::time::timeout(Duration::from_secs(2), engine.shutdown())
			.await
			.expect("shutdown should complete promptly");
		assert!(engine.registry().is_empty());
		assert_eq!(engine.server().domain().pending(), 0);
	}

	#[tokio::test]
	async fn shutdown_interrupts_a_recovery_in_flight() {
		let engine = engine_with(EngineConfig {
			controller_wake: Duration::from_millis(10),
			recovery_latency: Duration::from_secs(60),
		});
		engine.spawn_controller().await;

		// Let the controller wake and park in its latency window.
		tokio::time::sleep(Duration::from_millis(50)).await;
		tokio::time::timeout(Duration::from_secs(1), engine.shutdown())
			.await
			.expect("shutdown must preempt the simulated latency");
	}

	#[tokio::test]
	async fn explicit_trigger_runs_a_cycle_ahead_of_the_timer() {
		let engine = engine_with(EngineConfig {
			controller_wake: Duration::from_secs(60),
			recovery_latency: Duration::ZERO,
		});
		engine.spawn_controller().await;
		engine.trigger_recovery();

		tokio::time::timeout(Duration::from_secs(2), async {
			while engine.server().payload.latest().message != 1 {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("triggered cycle should publish 2^0 = 1");

		engine.shutdown().await;
	}
}

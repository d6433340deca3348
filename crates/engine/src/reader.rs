//! Reader workers and the render sink they report through.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::WorkerSpec;
use crate::server::Server;

/// Status reported with a normal response.
pub const STATUS_OK: u16 = 200;
/// Status reported while a recovery pass is visible.
pub const STATUS_UNAVAILABLE: u16 = 503;

/// One rendered response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendered {
	/// Worker that produced the response.
	pub worker: u32,
	pub status: u16,
	/// Payload message; absent in degraded mode.
	pub message: Option<u64>,
	/// Content type from the headers snapshot; absent in degraded mode.
	pub content_type: Option<u16>,
}

impl Rendered {
	pub(crate) fn normal(worker: u32, message: u64, content_type: u16) -> Self {
		Self {
			worker,
			status: STATUS_OK,
			message: Some(message),
			content_type: Some(content_type),
		}
	}

	pub(crate) fn degraded(worker: u32) -> Self {
		Self {
			worker,
			status: STATUS_UNAVAILABLE,
			message: None,
			content_type: None,
		}
	}

	/// True for the fixed fallback response rendered during recovery.
	pub fn is_degraded(&self) -> bool {
		self.status == STATUS_UNAVAILABLE
	}
}

/// Receives rendered responses from reader workers.
pub trait RenderSink: Send + Sync {
	fn render(&self, rendered: Rendered);
}

/// Sink that emits one structured trace event per render.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl RenderSink for TracingSink {
	fn render(&self, rendered: Rendered) {
		tracing::debug!(
			worker = rendered.worker,
			status = rendered.status,
			message = rendered.message,
			"engine.reader.render"
		);
	}
}

/// Sink that buffers renders in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
	buffer: parking_lot::Mutex<Vec<Rendered>>,
}

impl MemorySink {
	/// Creates an empty sink.
	pub fn new() -> Self {
		Self::default()
	}

	/// Copies out everything rendered so far.
	pub fn snapshot(&self) -> Vec<Rendered> {
		self.buffer.lock().clone()
	}

	/// Number of renders received.
	pub fn len(&self) -> usize {
		self.buffer.lock().len()
	}

	/// Returns `true` when nothing was rendered yet.
	pub fn is_empty(&self) -> bool {
		self.buffer.lock().is_empty()
	}
}

impl RenderSink for MemorySink {
	fn render(&self, rendered: Rendered) {
		self.buffer.lock().push(rendered);
	}
}

/// Reader worker loop.
///
/// Each iteration opens one bounded read-side critical section, renders
/// from the snapshots captured inside it, and sleeps the configured
/// interval. While `recovering` is visible the payload cell is not touched
/// at all: the reference would be safe to follow, its content would not be.
/// The stop token is honored at the top of the loop and during the sleep;
/// the loop never exits mid-critical-section.
pub(crate) async fn run_reader(
	server: Arc<Server>,
	spec: WorkerSpec,
	sink: Arc<dyn RenderSink>,
	token: CancellationToken,
) {
	let mut handle = server.register_reader();
	loop {
		if token.is_cancelled() {
			break;
		}

		let rendered = {
			let section = handle.enter();
			let state = server.state(&section);
			if state.recovering {
				Rendered::degraded(spec.id)
			} else {
				let payload = server.payload(&section);
				let headers = server.headers(&section);
				Rendered::normal(spec.id, payload.message, headers.content_type)
			}
		};
		sink.render(rendered);

		tokio::select! {
			biased;
			_ = token.cancelled() => break,
			_ = tokio::time::sleep(spec.read_interval) => {}
		}
	}
	tracing::debug!(worker = spec.id, "engine.reader.exit");
}

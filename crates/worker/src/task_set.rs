use std::future::Future;

use tokio::task::{JoinError, JoinSet};

use crate::TaskKind;

/// Wrapper for a Tokio [`JoinSet`] bound to the shared runtime handle.
///
/// Spawning goes through the crate's runtime resolution so sets built
/// outside a tokio context still attach to the global worker runtime.
#[derive(Debug)]
pub struct TaskSet<T> {
	inner: JoinSet<T>,
}

impl<T> Default for TaskSet<T> {
	fn default() -> Self {
		Self { inner: JoinSet::new() }
	}
}

impl<T> TaskSet<T>
where
	T: Send + 'static,
{
	/// Creates an empty set.
	pub fn new() -> Self {
		Self { inner: JoinSet::new() }
	}

	/// Returns the number of tasks currently in the set.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Returns `true` if the set is empty.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Spawns a future into the set on the shared runtime handle.
	#[allow(clippy::disallowed_methods)]
	pub fn spawn<F>(&mut self, kind: TaskKind, fut: F)
	where
		F: Future<Output = T> + Send + 'static,
	{
		tracing::trace!(task_kind = kind.as_str(), pending = self.inner.len(), "worker.task_set.spawn");
		let handle = crate::spawn::runtime_handle();
		let _guard = handle.enter();
		self.inner.spawn(fut);
	}

	/// Waits for the next completed task.
	pub async fn join_next(&mut self) -> Option<Result<T, JoinError>> {
		self.inner.join_next().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn spawn_and_drain() {
		let mut set = TaskSet::new();
		for i in 0..4u64 {
			set.spawn(TaskKind::Reader, async move { i });
		}
		assert_eq!(set.len(), 4);

		let mut seen = Vec::new();
		while let Some(out) = set.join_next().await {
			seen.push(out.unwrap());
		}
		seen.sort_unstable();
		assert_eq!(seen, [0, 1, 2, 3]);
	}
}

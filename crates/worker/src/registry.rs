use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::TaskKind;

/// Record for one live engine task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
	pub name: String,
	pub kind: TaskKind,
}

/// In-memory registry of live task records.
///
/// Tasks register themselves at spawn and deregister when their loop exits,
/// so a snapshot of the registry reflects what is actually running.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
	inner: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl TaskRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Upserts one record.
	pub fn upsert(&self, record: TaskRecord) {
		if let Ok(mut guard) = self.inner.write() {
			guard.insert(record.name.clone(), record);
		}
	}

	/// Removes one record.
	pub fn remove(&self, name: &str) {
		if let Ok(mut guard) = self.inner.write() {
			guard.remove(name);
		}
	}

	/// Returns records sorted by name.
	pub fn snapshots(&self) -> Vec<TaskRecord> {
		let Ok(guard) = self.inner.read() else {
			return Vec::new();
		};
		let mut records: Vec<_> = guard.values().cloned().collect();
		records.sort_by(|a, b| a.name.cmp(&b.name));
		records
	}

	/// Number of live records.
	pub fn len(&self) -> usize {
		self.inner.read().map(|guard| guard.len()).unwrap_or(0)
	}

	/// Returns `true` when no task is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Execution classes for engine tasks, used in spawn metadata and the
/// live-task registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
	/// A reader worker serving responses from the current snapshots.
	Reader,
	/// The one-shot background payload updater.
	Publisher,
	/// The recovery controller.
	Recovery,
}

impl TaskKind {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Reader => "reader",
			Self::Publisher => "publisher",
			Self::Recovery => "recovery",
		}
	}
}

impl std::fmt::Display for TaskKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

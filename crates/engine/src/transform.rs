//! The payload-transform seam used by the publisher and the recovery
//! controller.

use crate::error::Result;
use crate::snapshot::Payload;

/// Builds replacement payload snapshots for the two write paths.
///
/// Both methods are fallible: a failed build aborts the caller's transition
/// and leaves the previously-published snapshot authoritative, so a
/// transform never observes or produces partially-applied state.
pub trait PayloadTransform: Send + Sync {
	/// One background publication step.
	fn publish(&self, current: &Payload) -> Result<Payload>;

	/// One recovery repair step.
	fn recover(&self, current: &Payload) -> Result<Payload>;
}

/// Reference arithmetic: `message + 3` on publication, `2^message` on
/// recovery. Placeholder transforms with no business meaning beyond serving
/// as the oracle values in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTransform;

impl PayloadTransform for DefaultTransform {
	fn publish(&self, current: &Payload) -> Result<Payload> {
		Ok(Payload {
			message: current.message.wrapping_add(3),
		})
	}

	fn recover(&self, current: &Payload) -> Result<Payload> {
		let message = u32::try_from(current.message)
			.map(|exponent| 2u64.saturating_pow(exponent))
			.unwrap_or(u64::MAX);
		Ok(Payload { message })
	}
}

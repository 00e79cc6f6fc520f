//! Ordering of the activities entering the Jupiter engines, and compaction
//! of the ones leaving the local site.

mod coalesce;
mod inbound;

pub use coalesce::coalesce;
pub use inbound::{InboundSequencer, Released};

//! Stream combinators for relay frame pipelines

mod dedup;

pub use dedup::{DedupByPacket, DedupExt};

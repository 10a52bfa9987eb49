//! The distribution hub.
//!
//! A single control loop consumes three kinds of events, strictly one at a
//! time: subscriber register, subscriber unregister, and payload ingested. Each
//! payload is fanned out to every live subscriber, then folded into a
//! session-scoped buffer whose flushes are handed to a bounded persistence
//! queue.
//!
//! ```text
//!  ingest ──┐                    ┌──▶ Broadcaster ──▶ subscribers
//!  ws conn ─┼──▶ control loop ───┤
//!  ws drop ─┘   (owns buffer)    └──▶ SessionBuffer ──flush──▶ PersistenceQueue ──▶ store worker
//! ```
//!
//! Loss is explicit and bounded at two points: failed subscriber deliveries
//! (the subscriber is pruned) and batches offered to a full queue (dropped and
//! logged under [`OverflowPolicy::Drop`](crate::config::OverflowPolicy)).

mod broadcast;
mod buffer;
mod control;
mod queue;
mod registry;

pub use broadcast::{Broadcaster, DeliveryError, FanOut, Subscriber};
pub use buffer::{BufferState, SessionBuffer};
pub use control::{Hub, HubChannels, HubHandle, HubStats};
pub use queue::{Offer, PersistenceQueue, QueueReceiver};
pub use registry::ClientRegistry;

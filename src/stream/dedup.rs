//! Packet-id de-duplication

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::types::TelemetryFrame;

/// Extension trait to add de-duplication to a stream of frames
pub trait DedupExt: Stream<Item = TelemetryFrame> {
    /// Drop frames whose packet id equals the previously emitted frame's.
    ///
    /// Sampling faster than the simulator steps yields the same packet
    /// repeatedly; only the first copy is forwarded.
    fn dedup_by_packet(self) -> DedupByPacket<Self>
    where
        Self: Sized,
    {
        DedupByPacket::new(self)
    }
}

impl<T: Stream<Item = TelemetryFrame>> DedupExt for T {}

pin_project! {
    /// A stream combinator that skips repeated packet ids
    pub struct DedupByPacket<S> {
        #[pin]
        stream: S,
        last: Option<i32>,
        skipped: u64,
    }
}

impl<S> DedupByPacket<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, last: None, skipped: 0 }
    }

    /// Frames dropped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<S: Stream<Item = TelemetryFrame>> Stream for DedupByPacket<S> {
    type Item = TelemetryFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(frame) if *this.last == Some(frame.packet_id) => {
                    *this.skipped += 1;
                }
                Some(frame) => {
                    *this.last = Some(frame.packet_id);
                    return Poll::Ready(Some(frame));
                }
                None => return Poll::Ready(None),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.stream.size_hint();
        (lower.min(1), upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    fn with_ids(ids: &[i32]) -> Vec<TelemetryFrame> {
        ids.iter().map(|&packet_id| TelemetryFrame { packet_id, ..Default::default() }).collect()
    }

    #[tokio::test]
    async fn drops_consecutive_repeats_only() {
        let input = with_ids(&[1, 1, 1, 2, 3, 3, 2, 2, 4]);
        let ids: Vec<_> =
            stream::iter(input).dedup_by_packet().map(|f| f.packet_id).collect().await;

        assert_eq!(ids, vec![1, 2, 3, 2, 4]);
    }

    #[tokio::test]
    async fn first_frame_is_always_emitted() {
        // Including the -1 sentinel some producers start from
        let ids: Vec<_> =
            stream::iter(with_ids(&[-1, -1, 0])).dedup_by_packet().map(|f| f.packet_id).collect().await;
        assert_eq!(ids, vec![-1, 0]);
    }

    #[tokio::test]
    async fn counts_skipped_frames() {
        let mut dedup = DedupByPacket::new(stream::iter(with_ids(&[5, 5, 5, 6])));
        while dedup.next().await.is_some() {}
        assert_eq!(dedup.skipped(), 2);
    }
}

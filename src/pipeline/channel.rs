//! Bounded FIFO hand-off between two pipeline stages
//!
//! A channel is a fixed-size `VecDeque` guarded by a mutex, plus a pair of
//! counting semaphores:
//! - `empty` counts free slots and starts at the capacity
//! - `full` counts queued items and starts at zero
//!
//! `put` takes an `empty` permit before touching the queue and hands a `full`
//! permit to the consumer afterwards; `get` does the reverse. The mutex is only
//! held for the push or pop itself, never across a semaphore wait.
//!
//! Every wait also watches the pipeline's cancellation token and the channel's
//! own disconnect token, so a stage never stays parked on a peer that is gone.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::ChannelError;
use crate::pipeline::types::StreamItem;

struct Slots<T> {
    items: VecDeque<StreamItem<T>>,
    /// Set once end of stream has been queued
    sealed: bool,
    /// Highest occupancy ever observed
    peak: usize,
}

/// Fixed-capacity FIFO shared by exactly one producer and one consumer
pub struct BoundedChannel<T> {
    slots: Mutex<Slots<T>>,
    empty: Semaphore,
    full: Semaphore,
    capacity: usize,
    disconnected: CancellationToken,
}

impl<T> BoundedChannel<T> {
    /// Create a channel holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or above `Semaphore::MAX_PERMITS`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be at least 1");
        assert!(
            capacity <= Semaphore::MAX_PERMITS,
            "channel capacity must be at most {}",
            Semaphore::MAX_PERMITS
        );
        Self {
            slots: Mutex::new(Slots {
                items: VecDeque::new(),
                sealed: false,
                peak: 0,
            }),
            empty: Semaphore::new(capacity),
            full: Semaphore::new(0),
            capacity,
            disconnected: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a free slot, then append `item` at the tail.
    ///
    /// # Panics
    ///
    /// Queuing anything after end of stream is a contract violation and panics.
    pub async fn put(
        &self,
        item: StreamItem<T>,
        cancel: &CancellationToken,
    ) -> Result<(), ChannelError> {
        assert!(!self.is_sealed(), "item enqueued after end of stream");

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
            _ = self.disconnected.cancelled() => return Err(ChannelError::Disconnected),
            permit = self.empty.acquire() => permit.map_err(|_| ChannelError::Disconnected)?,
        };
        // the slot now belongs to the queued item until `get` hands it back
        permit.forget();

        {
            let mut slots = self.lock();
            assert!(!slots.sealed, "item enqueued after end of stream");
            slots.sealed = item.is_end_of_stream();
            slots.items.push_back(item);
            slots.peak = slots.peak.max(slots.items.len());
        }
        self.full.add_permits(1);
        Ok(())
    }

    /// Wait for an item, then remove and return the head of the queue.
    ///
    /// Items already queued are still delivered after the producer
    /// disconnected; only an empty, disconnected channel reports
    /// `ChannelError::Disconnected`.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<StreamItem<T>, ChannelError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
            permit = self.full.acquire() => permit.map_err(|_| ChannelError::Disconnected)?,
            _ = self.disconnected.cancelled() => return Err(ChannelError::Disconnected),
        };
        permit.forget();

        let item = self
            .lock()
            .items
            .pop_front()
            .expect("full permit acquired with an empty queue");
        self.empty.add_permits(1);
        Ok(item)
    }

    /// Wake the peer: pending and future waits report `Disconnected`
    pub fn disconnect(&self) {
        self.disconnected.cancel();
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.is_cancelled()
    }

    /// Whether end of stream has been queued
    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently queued
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest number of items that were ever queued at once
    pub fn peak(&self) -> usize {
        self.lock().peak
    }
}

/// Create a bounded channel and split it into its producer and consumer ends.
///
/// Both ends observe `cancel` while waiting.
pub fn channel<T>(capacity: usize, cancel: CancellationToken) -> (FrameSender<T>, FrameReceiver<T>) {
    let shared = Arc::new(BoundedChannel::new(capacity));
    let sender = FrameSender {
        channel: Arc::clone(&shared),
        cancel: cancel.clone(),
        finished: false,
    };
    let receiver = FrameReceiver {
        channel: shared,
        cancel,
        drained: false,
    };
    (sender, receiver)
}

/// Producer end of a bounded channel
///
/// End of stream is queued by [`FrameSender::finish`], which consumes the
/// sender: nothing can be sent after it. Dropping an unfinished sender
/// disconnects the channel.
pub struct FrameSender<T> {
    channel: Arc<BoundedChannel<T>>,
    cancel: CancellationToken,
    finished: bool,
}

impl<T> FrameSender<T> {
    pub async fn send(&self, frame: T) -> Result<(), ChannelError> {
        self.channel.put(StreamItem::Frame(frame), &self.cancel).await
    }

    /// Queue end of stream and give up the sender
    pub async fn finish(mut self) -> Result<(), ChannelError> {
        self.channel.put(StreamItem::EndOfStream, &self.cancel).await?;
        self.finished = true;
        Ok(())
    }

    pub fn channel(&self) -> Arc<BoundedChannel<T>> {
        Arc::clone(&self.channel)
    }
}

impl<T> Drop for FrameSender<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.channel.disconnect();
        }
    }
}

/// Consumer end of a bounded channel
///
/// Dropping the receiver before it saw end of stream disconnects the channel,
/// which releases a producer blocked on a full queue.
pub struct FrameReceiver<T> {
    channel: Arc<BoundedChannel<T>>,
    cancel: CancellationToken,
    drained: bool,
}

impl<T> FrameReceiver<T> {
    pub async fn recv(&mut self) -> Result<StreamItem<T>, ChannelError> {
        let item = self.channel.get(&self.cancel).await?;
        if item.is_end_of_stream() {
            self.drained = true;
        }
        Ok(item)
    }

    pub fn channel(&self) -> Arc<BoundedChannel<T>> {
        Arc::clone(&self.channel)
    }
}

impl<T> Drop for FrameReceiver<T> {
    fn drop(&mut self) {
        if !self.drained {
            self.channel.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_fifo_order_and_end_of_stream_last() {
        let (tx, mut rx) = channel::<u32>(3, CancellationToken::new());
        let shared = tx.channel();

        let producer = tokio::spawn(async move {
            for i in 0..50 {
                tx.send(i).await.unwrap();
            }
            tx.finish().await.unwrap();
        });

        let mut received = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                StreamItem::Frame(i) => received.push(i),
                StreamItem::EndOfStream => break,
            }
        }
        producer.await.unwrap();

        assert_eq!(received, (0..50).collect::<Vec<_>>());
        assert_eq!(shared.capacity(), 3);
        assert!(shared.peak() <= shared.capacity());
        assert!(shared.is_empty());
        assert!(shared.is_sealed());
        assert!(!shared.is_disconnected());
    }

    #[tokio::test]
    async fn test_put_blocks_when_full() {
        let (tx, mut rx) = channel::<u32>(1, CancellationToken::new());

        tx.send(1).await.unwrap();
        assert_eq!(tx.channel().len(), 1);

        // second frame has nowhere to go
        assert!(timeout(Duration::from_millis(50), tx.send(2)).await.is_err());
        assert_eq!(tx.channel().len(), 1);

        assert_eq!(rx.recv().await.unwrap(), StreamItem::Frame(1));
        timeout(Duration::from_millis(50), tx.send(2))
            .await
            .expect("slot freed by get")
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), StreamItem::Frame(2));
        assert_eq!(tx.channel().peak(), 1);
    }

    #[tokio::test]
    async fn test_get_blocks_until_put() {
        let (tx, mut rx) = channel::<u32>(1, CancellationToken::new());

        let started = Instant::now();
        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            tx.send(7).await.unwrap();
            tx.send(8).await.unwrap();
            tx.finish().await.unwrap();
        });

        assert_eq!(rx.recv().await.unwrap(), StreamItem::Frame(7));
        assert!(started.elapsed() >= Duration::from_millis(35));
        assert_eq!(rx.recv().await.unwrap(), StreamItem::Frame(8));
        assert_eq!(rx.recv().await.unwrap(), StreamItem::EndOfStream);
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_unblocks_put() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = channel::<u32>(1, cancel.clone());
        tx.send(1).await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = timeout(Duration::from_secs(2), tx.send(2)).await.unwrap();
        assert_eq!(result, Err(ChannelError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_unblocks_get() {
        let cancel = CancellationToken::new();
        let (_tx, mut rx) = channel::<u32>(2, cancel.clone());

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(result, Err(ChannelError::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_receiver_releases_blocked_sender() {
        let (tx, rx) = channel::<u32>(1, CancellationToken::new());
        tx.send(1).await.unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(rx);
        });

        let result = timeout(Duration::from_secs(2), tx.send(2)).await.unwrap();
        assert_eq!(result, Err(ChannelError::Disconnected));
    }

    #[tokio::test]
    async fn test_dropped_sender_drains_then_disconnects() {
        let (tx, mut rx) = channel::<u32>(4, CancellationToken::new());
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await.unwrap(), StreamItem::Frame(1));
        assert_eq!(rx.recv().await.unwrap(), StreamItem::Frame(2));
        assert_eq!(rx.recv().await, Err(ChannelError::Disconnected));
    }

    #[tokio::test]
    async fn test_finished_channel_is_not_disconnected() {
        let (tx, mut rx) = channel::<u32>(2, CancellationToken::new());
        let shared = rx.channel();
        tx.send(1).await.unwrap();
        tx.finish().await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), StreamItem::Frame(1));
        assert_eq!(rx.recv().await.unwrap(), StreamItem::EndOfStream);
        drop(rx);
        assert!(!shared.is_disconnected());
    }

    #[tokio::test]
    #[should_panic(expected = "after end of stream")]
    async fn test_put_after_end_of_stream_panics() {
        let cancel = CancellationToken::new();
        let channel = BoundedChannel::<u32>::new(4);
        channel.put(StreamItem::EndOfStream, &cancel).await.unwrap();
        let _ = channel.put(StreamItem::Frame(1), &cancel).await;
    }

    #[test]
    fn test_large_capacity_is_not_preallocated() {
        let shared = BoundedChannel::<u64>::new(Semaphore::MAX_PERMITS);
        assert_eq!(shared.capacity(), Semaphore::MAX_PERMITS);
        assert!(shared.is_empty());
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn test_zero_capacity_rejected() {
        let _ = BoundedChannel::<u32>::new(0);
    }
}

//! Bounded hand-off between a frame producer and a consumer

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use super::frame::AudioFrame;
use crate::config::{AudioConfig, DeliveryPolicy};
use crate::error::{Result, SdrError};

/// Producer side of a frame queue
pub struct FrameFeed {
    sender: Sender<AudioFrame>,
    /// Held only under `Latest`, to evict the oldest frame
    evict: Option<Receiver<AudioFrame>>,
    policy: DeliveryPolicy,
    dropped: AtomicU64,
}

impl FrameFeed {
    /// Create a feed and the receiver its consumer reads from
    pub fn new(capacity: usize, policy: DeliveryPolicy) -> (Self, Receiver<AudioFrame>) {
        let (sender, receiver) = bounded(capacity);
        let evict = (policy == DeliveryPolicy::Latest).then(|| receiver.clone());
        let feed = Self {
            sender,
            evict,
            policy,
            dropped: AtomicU64::new(0),
        };
        (feed, receiver)
    }

    pub fn from_config(config: &AudioConfig) -> (Self, Receiver<AudioFrame>) {
        Self::new(config.feed_capacity, config.delivery_policy)
    }

    /// Queue a frame according to the delivery policy
    ///
    /// Returns `false` when the policy discarded the incoming frame.
    pub fn push(&self, frame: AudioFrame) -> Result<bool> {
        match self.policy {
            DeliveryPolicy::All => {
                self.sender.send(frame).map_err(|_| disconnected())?;
                Ok(true)
            }
            DeliveryPolicy::New => match self.sender.try_send(frame) {
                Ok(()) => Ok(true),
                Err(TrySendError::Full(_)) => {
                    self.record_drop();
                    Ok(false)
                }
                Err(TrySendError::Disconnected(_)) => Err(disconnected()),
            },
            DeliveryPolicy::Latest => {
                let mut frame = frame;
                loop {
                    match self.sender.try_send(frame) {
                        Ok(()) => return Ok(true),
                        Err(TrySendError::Full(rejected)) => {
                            // make room by discarding the oldest queued frame
                            let evicted = self.evict.as_ref().map(|rx| rx.try_recv().is_ok());
                            if evicted == Some(true) {
                                self.record_drop();
                            }
                            frame = rejected;
                        }
                        Err(TrySendError::Disconnected(_)) => return Err(disconnected()),
                    }
                }
            }
        }
    }

    fn record_drop(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if dropped.is_power_of_two() {
            warn!("Consumer lagging - {} frames dropped so far", dropped);
        }
    }

    /// Frames discarded because the consumer lagged
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }
}

fn disconnected() -> SdrError {
    SdrError::Channel("frame consumer disconnected".to_string())
}

//! The trait boundary where a real process-to-process socket would sit
//! (§4.3, §1 "the external transport itself is out of scope"). The
//! coordinator drives exactly one implementation per process.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::Frame;

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("peer unreachable")]
pub struct SendError;

#[async_trait]
pub trait IpcTransport: Send + Sync {
    /// One external delivery attempt of a four-frame packet (§4.2, §6).
    async fn try_send(&self, frame: Frame) -> Result<(), SendError>;
}

/// In-process stand-in transport: every delivered frame lands on an
/// unbounded channel a test can drain, with scripted failures to exercise
/// the retry-with-sleep path of [`super::IpcService`] without a live peer.
pub struct LoopbackTransport {
    delivered: mpsc::UnboundedSender<Frame>,
    fail_next: std::sync::atomic::AtomicU32,
}

impl LoopbackTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LoopbackTransport { delivered: tx, fail_next: std::sync::atomic::AtomicU32::new(0) }, rx)
    }

    /// The next `n` send attempts report the peer unreachable before
    /// succeeding.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl IpcTransport for LoopbackTransport {
    async fn try_send(&self, frame: Frame) -> Result<(), SendError> {
        use std::sync::atomic::Ordering;
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(SendError);
        }
        self.delivered.send(frame).map_err(|_| SendError)
    }
}

//! The service half of the fabric: a mailbox worker that drains queued
//! sends against the external [`IpcTransport`] with retry, and an internal
//! broadcast bus every subscriber gets its own receiver from
//! (`ZeroMQIPC.py`'s PAIR mailbox and internal PUB socket).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use super::transport::IpcTransport;
use crate::error::CoordinatorError;
use crate::message::Frame;

const RETRY_SLEEP: Duration = Duration::from_millis(500);
const SUBSCRIBER_CAPACITY: usize = 1024;

/// `send()` attempts against a `bind`-role socket never retry; a connecting
/// peer gets up to 30 tries 500ms apart (`ZeroMQIPC.py`: `1 if bind else
/// 30`). rfserver.py always constructs `IPCService.for_server(...)`, so the
/// coordinator's own instance is always the 1-attempt case in practice —
/// the retry loop itself stays general so the fabric's contract holds for
/// any role.
fn send_attempts(bind: bool) -> u32 {
    if bind { 1 } else { 30 }
}

async fn send_with_retry(
    transport: &dyn IpcTransport,
    frame: Frame,
    bind: bool,
) -> Result<(), CoordinatorError> {
    let attempts = send_attempts(bind);
    for attempt in 1..=attempts {
        match transport.try_send(frame.clone()).await {
            Ok(()) => return Ok(()),
            Err(_) if attempt < attempts => tokio::time::sleep(RETRY_SLEEP).await,
            Err(_) => {}
        }
    }
    Err(CoordinatorError::IpcUnreachable { peer: frame.recipient.to_string(), attempts })
}

/// A queued outbound send and the channel its eventual failure, if any,
/// should be reported on.
struct Pending {
    frame: Frame,
    result: tokio::sync::oneshot::Sender<Result<(), CoordinatorError>>,
}

/// C3: one instance per process, shared by every task that needs to address
/// a peer or subscribe to the internal bus.
pub struct IpcService {
    bind: bool,
    mailbox: mpsc::UnboundedSender<Pending>,
    publish: broadcast::Sender<Frame>,
}

impl IpcService {
    /// Spawns the mailbox worker and returns the handle plus a future that
    /// must be polled (typically via `tokio::spawn`) to drive sends.
    pub fn new(transport: Arc<dyn IpcTransport>, bind: bool) -> (Self, impl std::future::Future<Output = ()>) {
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (publish_tx, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        let worker = run_mailbox_worker(transport, bind, mailbox_rx);
        (IpcService { bind, mailbox: mailbox_tx, publish: publish_tx }, worker)
    }

    /// Queues `frame` for external delivery and awaits the outcome of the
    /// retry policy (§4.3 "send").
    pub async fn send(&self, frame: Frame) -> Result<(), CoordinatorError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.mailbox
            .send(Pending { frame, result: tx })
            .map_err(|_| CoordinatorError::IpcUnreachable { peer: "mailbox".into(), attempts: 0 })?;
        rx.await.map_err(|_| CoordinatorError::IpcUnreachable { peer: "mailbox".into(), attempts: 0 })?
    }

    /// A fresh receiver onto the internal pub/sub bus (§4.3 "subscribe") —
    /// every subscriber sees every frame the router republishes inbound,
    /// filtering by channel/recipient is the subscriber's job.
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.publish.subscribe()
    }

    /// Simulates the router receiving `frame` off the wire and fanning it
    /// out to internal subscribers (the PUB side of `ZeroMQIPC.py`'s
    /// `_run` loop).
    pub fn deliver_inbound(&self, frame: Frame) {
        let _ = self.publish.send(frame);
    }

    pub fn is_bound(&self) -> bool {
        self.bind
    }
}

async fn run_mailbox_worker(
    transport: Arc<dyn IpcTransport>,
    bind: bool,
    mut mailbox_rx: mpsc::UnboundedReceiver<Pending>,
) {
    while let Some(Pending { frame, result }) = mailbox_rx.recv().await {
        let outcome = send_with_retry(transport.as_ref(), frame, bind).await;
        let _ = result.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::transport::LoopbackTransport;
    use crate::message::{Channel, Message, PeerId};

    fn frame() -> Frame {
        Frame::new(PeerId(7), Channel::Proxy, Message::DatapathDown { ct_id: 0, dp_id: 0xaa })
    }

    #[tokio::test]
    async fn bound_service_sends_immediately_and_never_retries() {
        let (transport, mut rx) = LoopbackTransport::new();
        let transport = Arc::new(transport);
        let (service, worker) = IpcService::new(transport.clone(), true);
        tokio::spawn(worker);

        service.send(frame()).await.unwrap();
        assert_eq!(rx.recv().await, Some(frame()));
    }

    #[tokio::test]
    async fn bound_service_fails_fast_on_a_single_unreachable_peer() {
        let (transport, _rx) = LoopbackTransport::new();
        transport.fail_next(1);
        let transport = Arc::new(transport);
        let (service, worker) = IpcService::new(transport, true);
        tokio::spawn(worker);

        let err = service.send(frame()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::IpcUnreachable { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn connecting_service_retries_past_transient_failures() {
        let (transport, mut rx) = LoopbackTransport::new();
        transport.fail_next(2);
        let transport = Arc::new(transport);
        let (service, worker) = IpcService::new(transport, false);
        tokio::spawn(worker);

        service.send(frame()).await.unwrap();
        assert_eq!(rx.recv().await, Some(frame()));
    }

    #[tokio::test]
    async fn subscribers_see_inbound_frames_fanned_out() {
        let (transport, _rx) = LoopbackTransport::new();
        let (service, worker) = IpcService::new(Arc::new(transport), true);
        tokio::spawn(worker);

        let mut sub = service.subscribe();
        service.deliver_inbound(frame());
        assert_eq!(sub.recv().await.unwrap(), frame());
    }
}

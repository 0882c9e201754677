//! IPC fabric (C3, §4.3): many-to-many named-channel pub/sub with
//! per-peer addressable send, realized in-process.
//!
//! The original transport is three ZeroMQ sockets in one OS thread: a
//! ROUTER for external traffic, an internal PUB the subscriber workers
//! connect to, and a PAIR mailbox fed by `send()` calls (`ZeroMQIPC.py`).
//! Here the external socket is abstracted behind [`IpcTransport`] — the
//! point where a real socket would sit — and the internal PUB/SUB bus is a
//! `tokio::sync::broadcast` channel every subscriber task gets its own
//! receiver from.

mod service;
mod transport;

pub use service::IpcService;
pub use transport::{IpcTransport, LoopbackTransport, SendError};

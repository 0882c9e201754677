//! Error types for the coordinator.
//!
//! Split along the fatal/recoverable line: [`ConfigError`] variants (other
//! than a bad vendor spec) abort startup; every [`CoordinatorError`] is
//! handled locally by the dispatch loop and never propagates past the
//! message handler that raised it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: malformed row, expected columns: {expected}")]
    MalformedLine {
        file: String,
        line: usize,
        expected: &'static str,
    },

    #[error("unknown vendor name {name:?} in -m spec entry {raw:?}")]
    UnknownVendor { raw: String, name: String },

    #[error("malformed -m spec entry {raw:?}, expected dpid/vendor")]
    MalformedVendorSpec { raw: String },

    #[error("malformed -s spec entry {raw:?}, expected hex dpid")]
    MalformedSatelliteSpec { raw: String },
}

impl ConfigError {
    /// True for the one variant §7 says must not be startup-fatal: a bad
    /// `-m` entry degrades to "treat as default" instead of aborting.
    pub fn is_vendor_parse_recoverable(&self) -> bool {
        matches!(self, ConfigError::UnknownVendor { .. })
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("route mod for unregistered association (vm_id={vm_id:#x}, vm_port={vm_port})")]
    UnknownAssociation { vm_id: u64, vm_port: u32 },

    #[error("unknown route mod operation tag {0}")]
    UnknownRouteModOperation(u8),

    #[error("fastpath label space exhausted (>= 2048 labels required)")]
    LabelExhausted,

    #[error("ipc peer {peer} unreachable after {attempts} attempts")]
    IpcUnreachable { peer: String, attempts: u32 },
}

impl CoordinatorError {
    /// Only label exhaustion is fatal, and only during the one-time
    /// fastpath precomputation that runs at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoordinatorError::LabelExhausted)
    }
}

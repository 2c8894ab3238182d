//! Error taxonomy for request construction and session control.
//!
//! Probe-level failures (connect refused, timeout, abrupt close) are not
//! errors: they fold into an unreachable outcome and the sweep carries on.
//! Everything here is raised before any work is dispatched, with one
//! exception: [`ScanError::AlreadyRunning`] rejects a second concurrent
//! session start.

use std::net::Ipv4Addr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The input could not be parsed as a dotted-decimal IPv4 address.
    #[error("malformed address: {0:?}")]
    MalformedAddress(String),

    /// The requested range expands past the per-request cap. Carries the
    /// true size and the capped prefix so the caller can decide to proceed
    /// with the truncation or abort.
    #[error("range expands to {requested} addresses, more than the {} allowed", crate::address::MAX_EXPANSION)]
    RangeTooLarge {
        requested: u64,
        truncated: Vec<Ipv4Addr>,
    },

    /// Port resolution produced no usable port.
    #[error("no valid ports selected")]
    EmptyPortSet,

    /// A session is already active on this controller.
    #[error("a scan session is already running")]
    AlreadyRunning,
}

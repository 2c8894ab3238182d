//! Concurrent LAN reachability probing for IPv4 networks.
//!
//! lansweep answers one question under a bounded time and concurrency
//! budget: which (host, port) pairs in a range accept a TCP connection?
//! A completed handshake within the timeout is "reachable"; everything
//! else — refused, timed out, dropped — is not. There is deliberately no
//! closed-versus-filtered distinction, no fingerprinting, and no retry
//! logic: one probe, one verdict.
//!
//! ## Architecture Overview
//!
//! A scan is a session owned by a
//! [`SessionController`](crate::session::SessionController), sequenced in
//! stages:
//!
//! 1. **Input resolution**: [`address`] expands a start/end pair, subnet
//!    mask or CIDR block into a bounded list of candidates; [`ports`]
//!    resolves the port selection into a deduplicated set.
//! 2. **Host discovery** (optional): [`scanner::discovery`] classifies
//!    hosts as up by probing a handful of commonly-open ports, in
//!    sequential batches that double as cancellation checkpoints.
//! 3. **Sweep**: [`scanner::ScanStage`] drives a fixed pool of workers
//!    over the host × port cross product, one atomic cursor deciding who
//!    probes what.
//!
//! Throughout, the session reports over an event channel
//! ([`event::ScanEvent`]): open pairs as they are found, progress at a
//! fixed cadence, and exactly one terminal event — `scan-complete` or
//! `scan-stopped`, never both. Cancellation is cooperative: stopping a
//! session halts dispatch but lets in-flight probes run out their
//! timeout.
//!
//! ## Example
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//!
//! use lansweep::event::ScanEvent;
//! use lansweep::ports::PortSelection;
//! use lansweep::session::{ScanOptions, ScanRequest, SessionConfig, SessionController};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ports: Vec<u16> = PortSelection::WellKnown.resolve()?.into_iter().collect();
//!
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let controller = SessionController::new(tx, SessionConfig::default());
//!     let handle = controller.start(ScanRequest {
//!         hosts: vec![Ipv4Addr::new(192, 168, 1, 10)],
//!         ports,
//!         options: ScanOptions {
//!             host_discovery: false,
//!         },
//!     })?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             ScanEvent::ScanResult { host, port, .. } => println!("open: {host}:{port}"),
//!             ScanEvent::ScanComplete | ScanEvent::ScanStopped => break,
//!             _ => {}
//!         }
//!     }
//!
//!     handle.await?;
//!     Ok(())
//! }
//! ```

pub mod address;

pub mod error;

pub mod event;

pub mod input;

pub mod interfaces;

pub mod ports;

pub mod scanner;

pub mod session;

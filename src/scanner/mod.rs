//! Core sweep behaviour: single probes, host discovery, and the bounded
//! worker pool that exhausts the host × port cross product.

pub mod discovery;
pub mod probe;

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future;
use itertools::Itertools;
use log::debug;

use crate::event::{EventSink, Phase, PortStatus, ScanEvent};
use probe::{ProbeTarget, Prober};

/// Size of the sweep worker pool.
pub const SCAN_CONCURRENCY: usize = 200;

/// Per-probe timeout during the sweep.
pub const SCAN_TIMEOUT: Duration = Duration::from_millis(800);

/// A progress event is emitted after this many completed probes, and
/// unconditionally on the final one.
const PROGRESS_EVERY: usize = 50;

/// Probes every (host, port) pair under a fixed-size worker pool.
///
/// Workers claim targets off a shared queue through an atomic cursor, so
/// no two workers ever probe the same target. The cancellation flag is
/// checked once per claim, never mid-probe: in-flight probes run to their
/// own timeout after a stop.
#[derive(Debug)]
pub struct ScanStage {
    prober: Prober,
    concurrency: usize,
}

impl ScanStage {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            prober: Prober::new(timeout),
            concurrency: concurrency.max(1),
        }
    }

    /// Sweeps `hosts` × `ports`, emitting a `scan-result` for every
    /// reachable pair the moment it is known. `scanned` counts completed
    /// probes and never exceeds the cross-product total.
    ///
    /// Workers race independently, so events for a later target may
    /// arrive before an earlier one.
    pub async fn run(
        &self,
        hosts: &[Ipv4Addr],
        ports: &[u16],
        cancelled: &AtomicBool,
        scanned: &AtomicUsize,
        events: &EventSink,
    ) {
        let targets: Vec<ProbeTarget> = hosts
            .iter()
            .cartesian_product(ports.iter())
            .map(|(&host, &port)| ProbeTarget::new(host, port))
            .collect();

        let total = targets.len();
        let cursor = AtomicUsize::new(0);
        let workers = self.concurrency.min(total);

        debug!("sweeping {total} targets ({} hosts, {} ports) with {workers} workers",
            hosts.len(),
            ports.len(),
        );

        future::join_all(
            (0..workers).map(|_| self.worker(&targets, &cursor, cancelled, scanned, events, total)),
        )
        .await;
    }

    async fn worker(
        &self,
        targets: &[ProbeTarget],
        cursor: &AtomicUsize,
        cancelled: &AtomicBool,
        scanned: &AtomicUsize,
        events: &EventSink,
        total: usize,
    ) {
        loop {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let target = match targets.get(index) {
                Some(&target) => target,
                None => break,
            };

            let outcome = self.prober.probe(target).await;
            if outcome.reachable {
                events.emit(ScanEvent::ScanResult {
                    host: target.host,
                    port: target.port,
                    status: PortStatus::Open,
                });
            }

            let completed = scanned.fetch_add(1, Ordering::SeqCst) + 1;
            if completed % PROGRESS_EVERY == 0 || completed == total {
                events.emit(ScanEvent::Progress {
                    phase: Phase::Scanning,
                    current: completed,
                    total,
                });
            }
        }
    }
}

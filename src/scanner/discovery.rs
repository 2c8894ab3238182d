//! Host discovery: cheap liveness classification ahead of a full sweep.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future;
use log::debug;

use super::probe::{ProbeTarget, Prober};
use crate::event::{EventSink, Phase, ScanEvent};

/// Ports that are commonly open on live hosts; answering on any one of
/// them classifies the host as up.
pub const DISCOVERY_PROBE_PORTS: [u16; 7] = [80, 443, 22, 135, 445, 3389, 8080];

/// Per-probe timeout during discovery. Shorter than the sweep timeout:
/// a missed slow host costs one skipped scan, not a wrong result.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Hosts classified per batch.
pub const DISCOVERY_BATCH_SIZE: usize = 50;

/// Classifies candidate hosts as up or down in fixed-size batches.
///
/// All probes within a batch run concurrently; the stage waits for the
/// whole batch before advancing. That barrier is the cancellation
/// checkpoint — the flag is observed between batches only — and the
/// progress granularity: one progress event per batch.
#[derive(Debug)]
pub struct DiscoveryStage {
    prober: Prober,
    batch_size: usize,
    probe_ports: Vec<u16>,
}

impl DiscoveryStage {
    pub fn new(batch_size: usize, timeout: Duration) -> Self {
        Self {
            prober: Prober::new(timeout),
            batch_size: batch_size.max(1),
            probe_ports: DISCOVERY_PROBE_PORTS.to_vec(),
        }
    }

    /// Replaces the canonical probe ports, mainly to aim the stage at a
    /// loopback listener in tests.
    pub fn with_probe_ports(mut self, ports: Vec<u16>) -> Self {
        self.probe_ports = ports;
        self
    }

    /// Returns the live subsequence of `hosts`, preserving input order.
    ///
    /// Emits `host-found` for each live host as it resolves and one
    /// discovery progress event per completed batch.
    pub async fn run(
        &self,
        hosts: &[Ipv4Addr],
        cancelled: &AtomicBool,
        events: &EventSink,
    ) -> Vec<Ipv4Addr> {
        let total = hosts.len();
        let mut active = Vec::new();
        let mut processed = 0;

        for batch in hosts.chunks(self.batch_size) {
            if cancelled.load(Ordering::SeqCst) {
                debug!("discovery cancelled after {processed}/{total} hosts");
                break;
            }

            let classified =
                future::join_all(batch.iter().map(|&host| self.classify(host, events))).await;

            active.extend(classified.into_iter().filter_map(|(host, up)| {
                if up {
                    Some(host)
                } else {
                    None
                }
            }));

            processed += batch.len();
            events.emit(ScanEvent::Progress {
                phase: Phase::Discovery,
                current: processed,
                total,
            });
        }

        active
    }

    /// A host is up when any of the concurrent per-port probes completes
    /// a handshake.
    async fn classify(&self, host: Ipv4Addr, events: &EventSink) -> (Ipv4Addr, bool) {
        let probes = self
            .probe_ports
            .iter()
            .map(|&port| self.prober.probe(ProbeTarget::new(host, port)));

        let up = future::join_all(probes)
            .await
            .iter()
            .any(|outcome| outcome.reachable);

        if up {
            events.emit(ScanEvent::HostFound { host });
        }

        (host, up)
    }
}

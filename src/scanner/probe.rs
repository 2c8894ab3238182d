//! Single-shot TCP reachability probes.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;

/// Slack added on top of the probe timeout before a probe is forcibly
/// resolved, covering transports whose own timeout or error signalling
/// is unreliable.
pub const RESOLUTION_GRACE: Duration = Duration::from_millis(500);

/// One (host, port) pair to probe. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl ProbeTarget {
    pub fn new(host: Ipv4Addr, port: u16) -> Self {
        Self { host, port }
    }

    fn socket_addr(self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.host, self.port))
    }
}

/// Result of exactly one connection attempt. There is no partial state:
/// anything that is not a completed handshake within the timeout is
/// unreachable, and a transient failure is indistinguishable from a
/// closed or filtered port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub target: ProbeTarget,
    pub reachable: bool,
    pub observed_at: DateTime<Utc>,
}

/// Attempts one TCP connection per call, bounded by a caller-supplied
/// timeout. No retries.
#[derive(Debug, Clone, Copy)]
pub struct Prober {
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probes `target`, resolving within `timeout + RESOLUTION_GRACE` on
    /// every path. The connection is shut down and released before the
    /// outcome is returned; connect errors, timeouts and abrupt closes all
    /// collapse into `reachable = false`.
    pub async fn probe(&self, target: ProbeTarget) -> ProbeOutcome {
        // The outer deadline is defensive: the inner timeout fires first
        // unless the transport misbehaves.
        let hard_deadline = self.timeout + RESOLUTION_GRACE;
        let reachable = match time::timeout(hard_deadline, self.connect(target)).await {
            Ok(Ok(mut stream)) => {
                if let Err(e) = stream.shutdown().await {
                    debug!("shutdown after probe of {}:{} failed: {e}", target.host, target.port);
                }
                true
            }
            Ok(Err(_)) | Err(_) => false,
        };

        ProbeOutcome {
            target,
            reachable,
            observed_at: Utc::now(),
        }
    }

    async fn connect(&self, target: ProbeTarget) -> tokio::io::Result<TcpStream> {
        time::timeout(self.timeout, TcpStream::connect(target.socket_addr())).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::TcpListener;

    async fn loopback_listener() -> (TcpListener, ProbeTarget) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, ProbeTarget::new(Ipv4Addr::LOCALHOST, port))
    }

    #[tokio::test]
    async fn listening_port_is_reachable() {
        let (_listener, target) = loopback_listener().await;

        let outcome = Prober::new(Duration::from_millis(500)).probe(target).await;

        assert!(outcome.reachable);
        assert_eq!(outcome.target, target);
    }

    #[tokio::test]
    async fn refused_port_is_unreachable() {
        // Bind then drop, so the port is known to be closed.
        let (listener, target) = loopback_listener().await;
        drop(listener);

        let outcome = Prober::new(Duration::from_millis(500)).probe(target).await;

        assert!(!outcome.reachable);
    }

    #[tokio::test]
    async fn resolution_is_bounded_by_timeout_plus_grace() {
        // 203.0.113.0/24 is TEST-NET-3; connects black-hole rather than
        // refuse, so the timeout is what resolves the probe.
        let target = ProbeTarget::new(Ipv4Addr::new(203, 0, 113, 1), 65010);
        let timeout = Duration::from_millis(200);

        let started = Instant::now();
        let outcome = Prober::new(timeout).probe(target).await;
        let elapsed = started.elapsed();

        assert!(!outcome.reachable);
        assert!(
            elapsed < timeout + RESOLUTION_GRACE + Duration::from_millis(300),
            "probe took {elapsed:?}"
        );
    }
}

//! One scan's lifecycle: staged sequencing, cancellation, progress
//! accounting, and the exactly-once terminal signal.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde_derive::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::error::ScanError;
use crate::event::{EventSink, ScanEvent};
use crate::scanner::discovery::{
    DiscoveryStage, DISCOVERY_BATCH_SIZE, DISCOVERY_PROBE_PORTS, DISCOVERY_TIMEOUT,
};
use crate::scanner::{ScanStage, SCAN_CONCURRENCY, SCAN_TIMEOUT};

/// Inbound request to begin a session; the wire shape of a `start-scan`
/// message.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub hosts: Vec<Ipv4Addr>,
    pub ports: Vec<u16>,
    #[serde(default)]
    pub options: ScanOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    /// Pre-filter live hosts before the sweep. Skipped regardless when
    /// there is only one candidate.
    #[serde(default)]
    pub host_discovery: bool,
}

/// Lifecycle of a session. Transitions are strictly ordered
/// Idle → Discovering → Scanning → Completed | Stopped, each taken at
/// most once; Discovering and Scanning may be skipped, the terminal
/// states never.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Idle,
    Discovering,
    Scanning,
    Completed,
    Stopped,
}

/// State owned by one running scan. Created on start, handed back (final
/// state) when the session future resolves.
#[derive(Debug)]
pub struct ScanSession {
    id: u64,
    targets: Vec<Ipv4Addr>,
    ports: Vec<u16>,
    host_discovery: bool,
    cancelled: Arc<AtomicBool>,
    scanned: AtomicUsize,
    total: usize,
    stage: SessionStage,
}

impl ScanSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    /// Completed probes so far. Never exceeds [`ScanSession::total`].
    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::SeqCst)
    }

    /// Probe count of the sweep. Fixed once the scanning stage begins;
    /// zero until then.
    pub fn total(&self) -> usize {
        self.total
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Tunables for one session's stages; defaults mirror the module
/// constants they override.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub scan_timeout: Duration,
    pub discovery_timeout: Duration,
    pub concurrency: usize,
    pub discovery_batch_size: usize,
    pub discovery_ports: Vec<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_timeout: SCAN_TIMEOUT,
            discovery_timeout: DISCOVERY_TIMEOUT,
            concurrency: SCAN_CONCURRENCY,
            discovery_batch_size: DISCOVERY_BATCH_SIZE,
            discovery_ports: DISCOVERY_PROBE_PORTS.to_vec(),
        }
    }
}

/// Starts and stops scan sessions, one active at a time.
///
/// Cloning is cheap and clones share the same active-session slot, so a
/// consumer can hand a clone to a signal handler and keep one for event
/// plumbing.
#[derive(Debug, Clone)]
pub struct SessionController {
    events: UnboundedSender<ScanEvent>,
    config: SessionConfig,
    running: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl SessionController {
    pub fn new(events: UnboundedSender<ScanEvent>, config: SessionConfig) -> Self {
        Self {
            events,
            config,
            running: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Begins a session, rejecting with [`ScanError::AlreadyRunning`]
    /// while another is active. The returned handle resolves to the
    /// session's final state after its terminal event has been emitted.
    pub fn start(&self, request: ScanRequest) -> Result<JoinHandle<ScanSession>, ScanError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ScanError::AlreadyRunning);
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let session = ScanSession {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            targets: request.hosts,
            ports: request.ports,
            host_discovery: request.options.host_discovery,
            cancelled: Arc::clone(&self.cancelled),
            scanned: AtomicUsize::new(0),
            total: 0,
            stage: SessionStage::Idle,
        };
        let sink = EventSink::new(self.events.clone(), Arc::clone(&self.cancelled));
        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        Ok(tokio::spawn(async move {
            let session = run_session(session, &config, &sink).await;
            running.store(false, Ordering::SeqCst);
            session
        }))
    }

    /// Requests cooperative cancellation of the active session.
    /// Idempotent; a no-op when nothing is running.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// The staged pipeline. Emits exactly one terminal event on every path.
async fn run_session(
    mut session: ScanSession,
    config: &SessionConfig,
    events: &EventSink,
) -> ScanSession {
    info!(
        "session {}: {} candidate hosts, {} ports, discovery {}",
        session.id,
        session.targets.len(),
        session.ports.len(),
        if session.host_discovery { "on" } else { "off" },
    );

    let mut active = session.targets.clone();
    if session.host_discovery && session.targets.len() > 1 {
        session.stage = SessionStage::Discovering;
        events.log(format!(
            "Running host discovery across {} addresses...",
            session.targets.len()
        ));

        let discovery = DiscoveryStage::new(config.discovery_batch_size, config.discovery_timeout)
            .with_probe_ports(config.discovery_ports.clone());
        active = discovery
            .run(&session.targets, &session.cancelled, events)
            .await;

        events.log(format!(
            "Host discovery finished. {} hosts up.",
            active.len()
        ));
    }

    if session.is_cancelled() {
        session.stage = SessionStage::Stopped;
        events.emit(ScanEvent::ScanStopped);
        return session;
    }

    if active.is_empty() {
        session.stage = SessionStage::Completed;
        events.emit(ScanEvent::ScanComplete);
        return session;
    }

    session.stage = SessionStage::Scanning;
    session.total = active.len() * session.ports.len();
    events.log(format!(
        "Probing {} ports on {} hosts ({} probes)...",
        session.ports.len(),
        active.len(),
        session.total
    ));

    let sweep = ScanStage::new(config.concurrency, config.scan_timeout);
    sweep
        .run(
            &active,
            &session.ports,
            &session.cancelled,
            &session.scanned,
            events,
        )
        .await;

    if session.is_cancelled() {
        session.stage = SessionStage::Stopped;
        events.emit(ScanEvent::ScanStopped);
    } else {
        session.stage = SessionStage::Completed;
        events.emit(ScanEvent::ScanComplete);
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn request(hosts: Vec<Ipv4Addr>, ports: Vec<u16>) -> ScanRequest {
        ScanRequest {
            hosts,
            ports,
            options: ScanOptions::default(),
        }
    }

    fn terminal_count(events: &[ScanEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ScanEvent::ScanComplete | ScanEvent::ScanStopped))
            .count()
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, ScanEvent::ScanComplete | ScanEvent::ScanStopped);
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn session_completes_and_counts_every_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();

        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(tx, SessionConfig::default());
        let handle = controller
            .start(request(vec![Ipv4Addr::LOCALHOST], vec![open_port]))
            .unwrap();

        let events = collect(rx).await;
        let session = handle.await.unwrap();

        assert_eq!(session.stage(), SessionStage::Completed);
        assert_eq!(session.scanned(), session.total());
        assert_eq!(terminal_count(&events), 1);
        assert_eq!(events.last(), Some(&ScanEvent::ScanComplete));
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(tx, SessionConfig::default());

        let first = controller
            .start(request(vec![Ipv4Addr::LOCALHOST], vec![65100, 65101]))
            .unwrap();
        let second = controller.start(request(vec![Ipv4Addr::LOCALHOST], vec![65102]));

        assert!(matches!(second, Err(ScanError::AlreadyRunning)));

        collect(rx).await;
        first.await.unwrap();
        assert!(!controller.is_running());

        // The slot frees up once the first session is done.
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(tx, SessionConfig::default());
        let third = controller
            .start(request(vec![Ipv4Addr::LOCALHOST], vec![65103]))
            .unwrap();
        collect(rx).await;
        third.await.unwrap();
    }

    #[tokio::test]
    async fn stop_before_dispatch_yields_stopped_with_zero_scanned() {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(tx, SessionConfig::default());

        // Current-thread runtime: the session task cannot have polled yet,
        // so the flag lands before any target is claimed.
        let handle = controller
            .start(request(vec![Ipv4Addr::LOCALHOST], vec![65104, 65105]))
            .unwrap();
        controller.stop();

        let events = collect(rx).await;
        let session = handle.await.unwrap();

        assert_eq!(session.stage(), SessionStage::Stopped);
        assert_eq!(session.scanned(), 0);
        assert_eq!(terminal_count(&events), 1);
        assert_eq!(events.last(), Some(&ScanEvent::ScanStopped));
    }

    #[tokio::test]
    async fn double_stop_is_safe_and_emits_one_terminal() {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(tx, SessionConfig::default());

        let handle = controller
            .start(request(vec![Ipv4Addr::LOCALHOST], vec![65106]))
            .unwrap();
        controller.stop();
        controller.stop();

        let events = collect(rx).await;
        handle.await.unwrap();

        assert_eq!(terminal_count(&events), 1);

        // Stopping after completion is a no-op too.
        controller.stop();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn discovery_with_no_live_hosts_completes_empty() {
        // A bound-then-dropped port is known to be closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, rx) = mpsc::unbounded_channel();
        let config = SessionConfig {
            discovery_timeout: Duration::from_millis(300),
            discovery_ports: vec![closed_port],
            ..SessionConfig::default()
        };
        let controller = SessionController::new(tx, config);

        // Two candidates so discovery is not bypassed; neither answers on
        // the probe port.
        let handle = controller
            .start(ScanRequest {
                hosts: vec![Ipv4Addr::new(127, 0, 0, 101), Ipv4Addr::new(127, 0, 0, 102)],
                ports: vec![65107],
                options: ScanOptions {
                    host_discovery: true,
                },
            })
            .unwrap();

        let events = collect(rx).await;
        let session = handle.await.unwrap();

        assert_eq!(session.stage(), SessionStage::Completed);
        assert_eq!(session.scanned(), 0);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ScanEvent::HostFound { .. })));
        assert_eq!(events.last(), Some(&ScanEvent::ScanComplete));
    }

    #[test]
    fn start_scan_wire_shape_deserializes() {
        let request: ScanRequest = serde_json::from_str(
            r#"{"hosts":["192.168.1.1","192.168.1.2"],"ports":[22,80],"options":{"hostDiscovery":true}}"#,
        )
        .unwrap();

        assert_eq!(request.hosts.len(), 2);
        assert_eq!(request.ports, vec![22, 80]);
        assert!(request.options.host_discovery);
    }
}

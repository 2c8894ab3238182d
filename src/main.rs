//! CLI consumer of the sweep: resolves inputs, drives one session, and
//! renders the event stream.

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use lansweep::address::{cidr_interior, subnet_interior, AddressRange, MAX_EXPANSION};
use lansweep::error::ScanError;
use lansweep::event::{Phase, ScanEvent};
use lansweep::input::{Config, Opts};
use lansweep::interfaces;
use lansweep::session::{ScanOptions, ScanRequest, SessionConfig, SessionController};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut opts = Opts::parse();
    let config = Config::read(opts.config_path.clone());
    opts.merge(&config);
    debug!("running with options: {opts:?}");

    if opts.interfaces {
        for interface in interfaces::local_interfaces() {
            println!("{}\t{}\t{}", interface.name, interface.ip, interface.netmask);
        }
        return Ok(());
    }

    let range = resolve_range(&opts)?;
    let hosts = expand_hosts(&range, opts.truncate)?;
    if hosts.is_empty() {
        println!("Range {}-{} is empty, nothing to sweep.", range.start, range.end);
        return Ok(());
    }
    let ports: Vec<u16> = opts.port_selection().resolve()?.into_iter().collect();

    raise_fd_limit(opts.concurrency);

    let request = ScanRequest {
        hosts,
        ports,
        options: ScanOptions {
            host_discovery: !opts.no_discovery,
        },
    };
    let session_config = SessionConfig {
        scan_timeout: Duration::from_millis(opts.timeout),
        concurrency: opts.concurrency,
        discovery_batch_size: opts.batch_size,
        ..SessionConfig::default()
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(tx, session_config);
    let handle = controller.start(request)?;

    let stopper = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    let bar = if opts.greppable {
        None
    } else {
        Some(progress_bar())
    };
    let mut open_pairs: usize = 0;

    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::Log { message } => {
                if let Some(bar) = &bar {
                    bar.println(message);
                }
            }
            ScanEvent::HostFound { host } => {
                if let Some(bar) = &bar {
                    bar.println(format!("Host up: {host}"));
                }
            }
            ScanEvent::Progress {
                phase,
                current,
                total,
            } => {
                if let Some(bar) = &bar {
                    bar.set_length(total as u64);
                    bar.set_position(current as u64);
                    bar.set_message(match phase {
                        Phase::Discovery => "discovery",
                        Phase::Scanning => "scanning",
                    });
                }
            }
            ScanEvent::ScanResult { host, port, .. } => {
                open_pairs += 1;
                if opts.greppable {
                    println!("{host}:{port}");
                } else if let Some(bar) = &bar {
                    bar.println(format!("Open {}", format!("{host}:{port}").purple()));
                }
            }
            ScanEvent::ScanComplete => {
                if let Some(bar) = &bar {
                    bar.finish_and_clear();
                    println!("Sweep complete. {open_pairs} open pairs.");
                }
                break;
            }
            ScanEvent::ScanStopped => {
                if let Some(bar) = &bar {
                    bar.finish_and_clear();
                    println!("Sweep stopped. {open_pairs} open pairs found before stopping.");
                }
                break;
            }
        }
    }

    handle.await?;
    Ok(())
}

/// Works out the address range to sweep: an explicit pair, a CIDR block,
/// or the subnet of the first private local interface as a default.
fn resolve_range(opts: &Opts) -> Result<AddressRange> {
    if let Some(block) = &opts.cidr {
        return Ok(cidr_interior(block)?);
    }

    if let (Some(start), Some(end)) = (&opts.start, &opts.end) {
        return Ok(AddressRange::parse(start, end)?);
    }
    if opts.start.is_some() || opts.end.is_some() {
        bail!("--start and --end must be given together");
    }

    let Some(interface) = interfaces::preferred_interface() else {
        bail!("no usable local interface found; give a range with --start/--end or --cidr");
    };
    let range = subnet_interior(&interface.ip.to_string(), &interface.netmask.to_string())?;
    info!(
        "no range given, defaulting to {}-{} from interface {}",
        range.start, range.end, interface.name
    );
    Ok(range)
}

/// Expands the range, honouring `--truncate` when it is over the cap.
fn expand_hosts(range: &AddressRange, truncate: bool) -> Result<Vec<Ipv4Addr>> {
    match range.expand() {
        Ok(hosts) => Ok(hosts),
        Err(ScanError::RangeTooLarge {
            requested,
            truncated,
        }) => {
            if truncate {
                warn!("range holds {requested} addresses, sweeping the first {MAX_EXPANSION}");
                Ok(truncated)
            } else {
                bail!(
                    "range holds {requested} addresses (limit {MAX_EXPANSION}); \
                     narrow it or pass --truncate to sweep the first {MAX_EXPANSION}"
                );
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// A pool of workers needs one socket each; nudge the fd limit up front
/// rather than failing probes halfway through.
fn raise_fd_limit(concurrency: usize) {
    let wanted = concurrency as u64 + 100;
    match rlimit::increase_nofile_limit(wanted) {
        Ok(limit) if limit < wanted => {
            warn!("file descriptor limit is {limit}, below the {wanted} the worker pool may use");
        }
        Ok(_) => {}
        Err(e) => debug!("could not raise file descriptor limit: {e}"),
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg:>10} [{bar:40}] {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );
    bar
}

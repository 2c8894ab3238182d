//! Command-line options and the user configuration file, merged into the
//! final settings a sweep runs with.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde_derive::Deserialize;

use crate::ports::PortSelection;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lansweep",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Concurrent LAN reachability prober. Expands an IPv4 range, optionally
/// pre-filters live hosts, and reports every (host, port) pair that
/// accepts a TCP connection.
pub struct Opts {
    /// First address of the range to sweep, dotted decimal.
    #[arg(short, long)]
    pub start: Option<String>,

    /// Last address of the range, inclusive.
    #[arg(short, long)]
    pub end: Option<String>,

    /// Sweep a CIDR block instead of an explicit range. The network and
    /// broadcast addresses are excluded.
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub cidr: Option<String>,

    /// Ports to probe: comma-separated ports and inclusive ranges.
    /// Example: 22,80-90,8443. Defaults to a curated well-known set.
    #[arg(short, long, conflicts_with = "full_range")]
    pub ports: Option<String>,

    /// Probe every port from 1 to 65535. Expect this to take a while on
    /// more than a handful of hosts.
    #[arg(long)]
    pub full_range: bool,

    /// Sweep every candidate address without the host discovery
    /// pre-filter.
    #[arg(long)]
    pub no_discovery: bool,

    /// Per-probe timeout in milliseconds during the sweep.
    #[arg(short, long, default_value = "800")]
    pub timeout: u64,

    /// Number of concurrent sweep workers.
    #[arg(short = 'b', long, default_value = "200")]
    pub concurrency: usize,

    /// Hosts classified per host-discovery batch.
    #[arg(long, default_value = "50")]
    pub batch_size: usize,

    /// When the range holds more than 2048 addresses, sweep the first
    /// 2048 instead of aborting.
    #[arg(long)]
    pub truncate: bool,

    /// Greppable mode. Print open pairs as host:port lines, nothing else.
    #[arg(short, long)]
    pub greppable: bool,

    /// List the local IPv4 interfaces and exit.
    #[arg(long)]
    pub interfaces: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(long)]
    pub no_config: bool,

    /// Custom path to the configuration file.
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,
}

impl Opts {
    /// Merges values from the configuration file, unless `--no-config`.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(timeout, concurrency, batch_size, greppable, truncate);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(ports);
    }

    /// How the flags map onto a port selection.
    pub fn port_selection(&self) -> PortSelection {
        if self.full_range {
            PortSelection::FullRange
        } else if let Some(spec) = &self.ports {
            PortSelection::Custom(spec.clone())
        } else {
            PortSelection::WellKnown
        }
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            cidr: None,
            ports: None,
            full_range: false,
            no_discovery: false,
            timeout: 800,
            concurrency: 200,
            batch_size: 50,
            truncate: false,
            greppable: false,
            interfaces: false,
            no_config: true,
            config_path: None,
        }
    }
}

/// Options read from the configuration file, merged over the command
/// line.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    ports: Option<String>,
    timeout: Option<u64>,
    concurrency: Option<usize>,
    batch_size: Option<usize>,
    greppable: Option<bool>,
    truncate: Option<bool>,
}

impl Config {
    /// Reads the TOML configuration file, if there is one.
    ///
    /// # Format
    ///
    /// ports = "22,80-90"
    /// timeout = 500
    /// concurrency = 100
    /// greppable = true
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Self {
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if !config_path.exists() {
            return Self::default();
        }

        let content = fs::read_to_string(config_path).unwrap_or_default();
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                println!("Found {e} in configuration file.\nAborting scan.\n");
                std::process::exit(1);
            }
        }
    }
}

/// Constructs the default path to the config toml.
pub fn default_config_path() -> PathBuf {
    let Some(mut config_path) = dirs::home_dir() else {
        panic!("Could not infer config file path.");
    };
    config_path.push(".lansweep.toml");
    config_path
}

//! Resolves a port selection mode into a concrete set of port numbers.

use std::collections::BTreeSet;

use crate::error::ScanError;

const LOWEST_PORT_NUMBER: u16 = 1;
const TOP_PORT_NUMBER: u16 = 65535;

/// Ports worth probing on almost any network: remote access, mail, name
/// service, web, file sharing, and the usual database defaults.
pub const WELL_KNOWN_PORTS: [u16; 28] = [
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1433, 1723, 3306, 3389,
    5432, 5900, 6379, 8000, 8080, 8443, 8888, 9200, 27017,
];

/// How the caller picked the ports to sweep.
///
/// `FullRange` is every port from 1 to 65535 — callers are expected to gate
/// it behind an explicit acknowledgment of the cost before building a
/// request with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    WellKnown,
    FullRange,
    /// A comma-separated spec where each token is a single port or an
    /// inclusive `min-max` range, e.g. `"22,80-90,8443"`.
    Custom(String),
}

impl PortSelection {
    /// Resolves to a deduplicated, ordered set of ports.
    ///
    /// Custom specs are lenient: non-numeric tokens, inverted ranges and
    /// out-of-range values are dropped, never fatal. Only an end result of
    /// zero ports is an error.
    pub fn resolve(&self) -> Result<BTreeSet<u16>, ScanError> {
        let ports: BTreeSet<u16> = match self {
            PortSelection::WellKnown => WELL_KNOWN_PORTS.iter().copied().collect(),
            PortSelection::FullRange => (LOWEST_PORT_NUMBER..=TOP_PORT_NUMBER).collect(),
            PortSelection::Custom(spec) => parse_custom_spec(spec),
        };

        if ports.is_empty() {
            return Err(ScanError::EmptyPortSet);
        }

        Ok(ports)
    }
}

fn parse_custom_spec(spec: &str) -> BTreeSet<u16> {
    let mut ports = BTreeSet::new();

    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Some((min, max)) = token.split_once('-') {
            let (min, max) = match (parse_port(min), parse_port(max)) {
                (Some(min), Some(max)) if min <= max => (min, max),
                _ => continue,
            };
            ports.extend(min..=max);
        } else if let Some(port) = parse_port(token) {
            ports.insert(port);
        }
    }

    ports
}

fn parse_port(token: &str) -> Option<u16> {
    token
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|&port| port >= LOWEST_PORT_NUMBER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parameterized::parameterized;

    #[test]
    fn well_known_resolves_to_the_curated_list() {
        let ports = PortSelection::WellKnown.resolve().unwrap();

        assert_eq!(ports.len(), WELL_KNOWN_PORTS.len());
        assert!(ports.contains(&22));
        assert!(ports.contains(&27017));
    }

    #[test]
    fn full_range_covers_every_port() {
        let ports = PortSelection::FullRange.resolve().unwrap();

        assert_eq!(ports.len(), 65535);
        assert_eq!(ports.iter().next(), Some(&1));
        assert_eq!(ports.iter().next_back(), Some(&65535));
    }

    #[test]
    fn custom_spec_skips_bad_tokens() {
        let ports = PortSelection::Custom("22,80-82,abc,5000-4000".to_owned())
            .resolve()
            .unwrap();

        let expected: BTreeSet<u16> = [22, 80, 81, 82].iter().copied().collect();
        assert_eq!(ports, expected);
    }

    #[parameterized(spec = {
        "80, 443, 8080",
        "80,443,80,8080,443",
        "443,80,8080",
    })]
    fn custom_spec_trims_dedups_and_orders(spec: &str) {
        let ports = PortSelection::Custom(spec.to_owned()).resolve().unwrap();

        assert_eq!(
            ports.into_iter().collect::<Vec<_>>(),
            vec![80, 443, 8080]
        );
    }

    #[test]
    fn out_of_range_values_are_dropped_silently() {
        let ports = PortSelection::Custom("0,70000,65530-70000,8080".to_owned())
            .resolve()
            .unwrap();

        let expected: BTreeSet<u16> = [8080].iter().copied().collect();
        assert_eq!(ports, expected);
    }

    #[parameterized(spec = {
        "",
        "abc,def",
        "9000-8000",
        "0",
    })]
    fn specs_with_no_valid_port_fail(spec: &str) {
        assert!(matches!(
            PortSelection::Custom(spec.to_owned()).resolve(),
            Err(ScanError::EmptyPortSet)
        ));
    }
}

//! Expands IPv4 address ranges and computes subnet interiors.
//!
//! Addresses are treated as unsigned 32-bit integers, most-significant
//! octet first, which makes range iteration and mask arithmetic plain
//! integer work.

use std::net::Ipv4Addr;
use std::str::FromStr;

use cidr_utils::cidr::Ipv4Cidr;

use crate::error::ScanError;

/// Upper bound on addresses produced by a single expansion request,
/// e.g. eight /24 subnets.
pub const MAX_EXPANSION: usize = 2048;

/// An inclusive IPv4 range. The range is empty when `start > end` compared
/// as unsigned integers; that case is a caller-visible no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl AddressRange {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self { start, end }
    }

    /// Parses a dotted-decimal pair into a range.
    pub fn parse(start: &str, end: &str) -> Result<Self, ScanError> {
        Ok(Self {
            start: parse_octets(start)?,
            end: parse_octets(end)?,
        })
    }

    /// Number of addresses the range covers. The full IPv4 space does not
    /// fit in a `u32` count, hence `u64`.
    pub fn len(&self) -> u64 {
        let (start, end) = (u32::from(self.start), u32::from(self.end));
        if start > end {
            0
        } else {
            u64::from(end - start) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expands to the ordered inclusive sequence of addresses.
    ///
    /// Past [`MAX_EXPANSION`] addresses this fails with
    /// [`ScanError::RangeTooLarge`], carrying the true count and the
    /// capped prefix; whether to proceed with the truncation is the
    /// caller's call.
    pub fn expand(&self) -> Result<Vec<Ipv4Addr>, ScanError> {
        let requested = self.len();
        let start = u32::from(self.start);

        if requested > MAX_EXPANSION as u64 {
            let truncated = (0..MAX_EXPANSION as u32)
                .map(|offset| Ipv4Addr::from(start + offset))
                .collect();
            return Err(ScanError::RangeTooLarge {
                requested,
                truncated,
            });
        }

        Ok((0..requested as u32)
            .map(|offset| Ipv4Addr::from(start + offset))
            .collect())
    }
}

/// Computes the scannable interior of the subnet containing `addr`.
///
/// `network = addr & mask`, `broadcast = network | !mask`; the returned
/// range is the exclusive interior `(network + 1, broadcast - 1)`, the
/// conventional default for populating a range from a local interface.
/// Nothing is validated beyond the dotted-decimal parse.
pub fn subnet_interior(addr: &str, mask: &str) -> Result<AddressRange, ScanError> {
    let addr = u32::from(parse_octets(addr)?);
    let mask = u32::from(parse_octets(mask)?);

    let network = addr & mask;
    let broadcast = network | !mask;

    Ok(AddressRange {
        start: Ipv4Addr::from(network.wrapping_add(1)),
        end: Ipv4Addr::from(broadcast.wrapping_sub(1)),
    })
}

/// Maps a CIDR block (`192.168.1.0/24`) to the same interior range
/// [`subnet_interior`] produces for an address/mask pair.
pub fn cidr_interior(block: &str) -> Result<AddressRange, ScanError> {
    let cidr =
        Ipv4Cidr::from_str(block).map_err(|_| ScanError::MalformedAddress(block.to_owned()))?;

    let network = u32::from(cidr.first_address());
    let broadcast = u32::from(cidr.last_address());

    Ok(AddressRange {
        start: Ipv4Addr::from(network.wrapping_add(1)),
        end: Ipv4Addr::from(broadcast.wrapping_sub(1)),
    })
}

fn parse_octets(input: &str) -> Result<Ipv4Addr, ScanError> {
    Ipv4Addr::from_str(input.trim()).map_err(|_| ScanError::MalformedAddress(input.to_owned()))
}

//! Read-only view of the machine's IPv4 interfaces, used by consumers to
//! prefill a default scan range. Not part of the sweep pipeline.

use std::net::Ipv4Addr;

use pnet::datalink;
use pnet::ipnetwork::IpNetwork;
use serde_derive::Serialize;

/// One usable IPv4 interface address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// Lists the up, non-loopback IPv4 interface addresses.
pub fn local_interfaces() -> Vec<InterfaceInfo> {
    datalink::interfaces()
        .into_iter()
        .filter(|interface| interface.is_up() && !interface.is_loopback())
        .flat_map(|interface| {
            let name = interface.name;
            interface.ips.into_iter().filter_map(move |network| match network {
                IpNetwork::V4(v4) => Some(InterfaceInfo {
                    name: name.clone(),
                    ip: v4.ip(),
                    netmask: v4.mask(),
                }),
                IpNetwork::V6(_) => None,
            })
        })
        .collect()
}

/// Picks the interface to base a default range on: the first one with a
/// private (RFC 1918) address, falling back to the first listed.
pub fn preferred_interface() -> Option<InterfaceInfo> {
    let interfaces = local_interfaces();
    interfaces
        .iter()
        .find(|interface| interface.ip.is_private())
        .cloned()
        .or_else(|| interfaces.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_interfaces_are_never_loopback() {
        for interface in local_interfaces() {
            assert!(!interface.ip.is_loopback(), "{interface:?}");
        }
    }

    #[test]
    fn interface_info_serializes_with_wire_field_names() {
        let info = InterfaceInfo {
            name: "eth0".to_owned(),
            ip: Ipv4Addr::new(192, 168, 1, 10),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
        };

        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"name":"eth0","ip":"192.168.1.10","netmask":"255.255.255.0"}"#
        );
    }
}

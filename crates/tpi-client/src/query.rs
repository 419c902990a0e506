//! Request construction for the BMC wire protocol
//!
//! Every call the client makes is one of two closed unions: [`GetRequest`]
//! for reads and [`SetRequest`] for writes. Each variant knows its own
//! query-string encoding, so the full parameter set of a request is stated
//! where the request is built and a new resource type cannot be added
//! without handling it at every match site.

use bytes::Bytes;

use crate::types::{Node, NodePower, OnOff};

/// Wire `type=` token of each BMC subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    NodeInfo,
    Usb,
    Power,
    Other,
    SdCard,
    Uart,
    Firmware,
    Network,
}

impl Resource {
    /// Token as it appears in the `type=` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::NodeInfo => "nodeinfo",
            Resource::Usb => "usb",
            Resource::Power => "power",
            Resource::Other => "other",
            Resource::SdCard => "sdcard",
            Resource::Uart => "uart",
            Resource::Firmware => "firmware",
            Resource::Network => "network",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "nodeinfo" => Ok(Resource::NodeInfo),
            "usb" => Ok(Resource::Usb),
            "power" => Ok(Resource::Power),
            "other" => Ok(Resource::Other),
            "sdcard" => Ok(Resource::SdCard),
            "uart" => Ok(Resource::Uart),
            "firmware" => Ok(Resource::Firmware),
            "network" => Ok(Resource::Network),
            other => Err(format!("unknown resource type: {}", other)),
        }
    }
}

/// A read against the BMC (`opt=get`).
///
/// Only UART reads carry a parameter (the target slot); every other read is
/// fully identified by its resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetRequest {
    /// Node descriptions (`type=nodeinfo`).
    NodeInfo,
    /// USB routing state (`type=usb`).
    Usb,
    /// Power flags of all four slots (`type=power`).
    Power,
    /// BMC version and network identity (`type=other`).
    Other,
    /// SD card usage counters (`type=sdcard`).
    SdCard,
    /// Captured UART output of one slot (`type=uart&node=N`).
    Uart { node: Node },
}

impl GetRequest {
    pub fn resource(self) -> Resource {
        match self {
            GetRequest::NodeInfo => Resource::NodeInfo,
            GetRequest::Usb => Resource::Usb,
            GetRequest::Power => Resource::Power,
            GetRequest::Other => Resource::Other,
            GetRequest::SdCard => Resource::SdCard,
            GetRequest::Uart { .. } => Resource::Uart,
        }
    }

    /// Query pairs beyond `opt` and `type`, in wire order.
    pub fn query_pairs(self) -> Vec<(&'static str, String)> {
        match self {
            GetRequest::NodeInfo
            | GetRequest::Usb
            | GetRequest::Power
            | GetRequest::Other
            | GetRequest::SdCard => Vec::new(),
            GetRequest::Uart { node } => vec![("node", node.as_index().to_string())],
        }
    }
}

/// A write against the BMC (`opt=set`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetRequest {
    /// Route the shared USB bus (`type=usb&mode=M&node=N`).
    Usb { mode: OnOff, node: Node },
    /// Set the power flags of all four slots
    /// (`type=power&node1=..&node2=..&node3=..&node4=..`).
    Power(NodePower),
    /// Send a command to one slot's UART (`type=uart&node=N&cmd=C`).
    Uart { node: Node, cmd: String },
    /// Upload a firmware image (`type=firmware`); the file travels as the
    /// raw request body, never as a query parameter.
    Firmware { file: Bytes },
    /// Reset the BMC network stack (`type=network&cmd=reset`).
    NetworkReset,
}

impl SetRequest {
    pub fn resource(&self) -> Resource {
        match self {
            SetRequest::Usb { .. } => Resource::Usb,
            SetRequest::Power(_) => Resource::Power,
            SetRequest::Uart { .. } => Resource::Uart,
            SetRequest::Firmware { .. } => Resource::Firmware,
            SetRequest::NetworkReset => Resource::Network,
        }
    }

    /// Split into query pairs (wire order) and the raw request body, if any.
    pub fn into_parts(self) -> (Vec<(&'static str, String)>, Option<Bytes>) {
        match self {
            SetRequest::Usb { mode, node } => (
                vec![
                    ("mode", mode.as_flag().to_string()),
                    ("node", node.as_index().to_string()),
                ],
                None,
            ),
            SetRequest::Power(power) => (
                Node::ALL
                    .iter()
                    .map(|&n| (n.as_key(), power.node(n).as_flag().to_string()))
                    .collect(),
                None,
            ),
            SetRequest::Uart { node, cmd } => (
                vec![("node", node.as_index().to_string()), ("cmd", cmd)],
                None,
            ),
            SetRequest::Firmware { file } => (Vec::new(), Some(file)),
            SetRequest::NetworkReset => (vec![("cmd", "reset".to_string())], None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs_as_strings(pairs: Vec<(&'static str, String)>) -> Vec<String> {
        pairs.into_iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }

    #[test]
    fn test_resource_tokens_round_trip() {
        for token in [
            "nodeinfo", "usb", "power", "other", "sdcard", "uart", "firmware", "network",
        ] {
            let resource: Resource = token.parse().unwrap();
            assert_eq!(resource.as_str(), token);
        }
        assert!("flash".parse::<Resource>().is_err());
    }

    #[test]
    fn test_plain_gets_carry_no_extra_pairs() {
        for request in [
            GetRequest::NodeInfo,
            GetRequest::Usb,
            GetRequest::Power,
            GetRequest::Other,
            GetRequest::SdCard,
        ] {
            assert!(request.query_pairs().is_empty(), "{:?}", request);
        }
    }

    #[test]
    fn test_uart_get_carries_node_index() {
        let pairs = GetRequest::Uart { node: Node::Node2 }.query_pairs();
        assert_eq!(pairs_as_strings(pairs), vec!["node=1"]);
    }

    #[test]
    fn test_usb_set_pairs() {
        let request = SetRequest::Usb {
            mode: OnOff::On,
            node: Node::Node3,
        };
        let (pairs, body) = request.into_parts();
        assert_eq!(pairs_as_strings(pairs), vec!["mode=1", "node=2"]);
        assert!(body.is_none());
    }

    #[test]
    fn test_power_set_states_all_four_slots() {
        let power = NodePower::all_off().with_node(Node::Node1, OnOff::On);
        let (pairs, body) = SetRequest::Power(power).into_parts();
        assert_eq!(
            pairs_as_strings(pairs),
            vec!["node1=1", "node2=0", "node3=0", "node4=0"]
        );
        assert!(body.is_none());
    }

    #[test]
    fn test_uart_set_pairs() {
        let request = SetRequest::Uart {
            node: Node::Node1,
            cmd: "reboot".to_string(),
        };
        let (pairs, body) = request.into_parts();
        assert_eq!(pairs_as_strings(pairs), vec!["node=0", "cmd=reboot"]);
        assert!(body.is_none());
    }

    #[test]
    fn test_firmware_file_becomes_body_not_query() {
        let file = Bytes::from_static(b"\x1f\x8b firmware image");
        let (pairs, body) = SetRequest::Firmware { file: file.clone() }.into_parts();
        assert!(pairs.is_empty());
        assert_eq!(body, Some(file));
    }

    #[test]
    fn test_network_reset_literal() {
        let (pairs, body) = SetRequest::NetworkReset.into_parts();
        assert_eq!(pairs_as_strings(pairs), vec!["cmd=reset"]);
        assert!(body.is_none());
    }
}

//! Response types and scalar domains for the BMC control API
//!
//! The device answers every request with a one-element `response` array;
//! [`Envelope`] is that wrapper and the structs here are its payloads.
//! On/off flags and node slots travel as small integers, so both are
//! closed enums that encode to exactly the values the wire accepts.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TpiClientError};

// =============================================================================
// Scalar Domains
// =============================================================================

/// On/off flag as the wire encodes it: `0` = off, `1` = on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OnOff {
    #[default]
    Off,
    On,
}

impl OnOff {
    /// Wire flag value (`0` or `1`).
    pub fn as_flag(self) -> u8 {
        match self {
            OnOff::Off => 0,
            OnOff::On => 1,
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, OnOff::On)
    }
}

impl From<OnOff> for u8 {
    fn from(value: OnOff) -> Self {
        value.as_flag()
    }
}

impl From<bool> for OnOff {
    fn from(value: bool) -> Self {
        if value {
            OnOff::On
        } else {
            OnOff::Off
        }
    }
}

impl TryFrom<u8> for OnOff {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, String> {
        match value {
            0 => Ok(OnOff::Off),
            1 => Ok(OnOff::On),
            other => Err(format!("invalid on/off flag: {}", other)),
        }
    }
}

impl std::fmt::Display for OnOff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnOff::Off => write!(f, "off"),
            OnOff::On => write!(f, "on"),
        }
    }
}

impl std::str::FromStr for OnOff {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "0" | "off" => Ok(OnOff::Off),
            "1" | "on" => Ok(OnOff::On),
            _ => Err(format!("invalid on/off flag: {}", s)),
        }
    }
}

/// One of the four node slots on the board.
///
/// The wire addresses a slot by zero-based index (`node=0..3` in query
/// strings, USB status), while per-slot maps key it as `node1`..`node4`.
/// Both encodings come from the same variant, so an out-of-range slot
/// cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Node {
    Node1,
    Node2,
    Node3,
    Node4,
}

impl Node {
    /// All four slots in board order.
    pub const ALL: [Node; 4] = [Node::Node1, Node::Node2, Node::Node3, Node::Node4];

    /// Zero-based wire index (`0..=3`).
    pub fn as_index(self) -> u8 {
        self as u8
    }

    /// One-based slot number (`1..=4`) as printed on the board.
    pub fn slot(self) -> u8 {
        self.as_index() + 1
    }

    /// JSON key used by per-slot maps (`node1`..`node4`).
    pub fn as_key(self) -> &'static str {
        match self {
            Node::Node1 => "node1",
            Node::Node2 => "node2",
            Node::Node3 => "node3",
            Node::Node4 => "node4",
        }
    }
}

impl From<Node> for u8 {
    fn from(value: Node) -> Self {
        value.as_index()
    }
}

impl TryFrom<u8> for Node {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, String> {
        match value {
            0 => Ok(Node::Node1),
            1 => Ok(Node::Node2),
            2 => Ok(Node::Node3),
            3 => Ok(Node::Node4),
            other => Err(format!("invalid node index: {}", other)),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

// =============================================================================
// Response Payloads
// =============================================================================

/// Description strings the BMC reports for the four node slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node1: String,
    pub node2: String,
    pub node3: String,
    pub node4: String,
}

impl NodeInfo {
    /// Description of one slot.
    pub fn node(&self, node: Node) -> &str {
        match node {
            Node::Node1 => &self.node1,
            Node::Node2 => &self.node2,
            Node::Node3 => &self.node3,
            Node::Node4 => &self.node4,
        }
    }
}

/// Routing state of the shared USB bus: the raw mode flag and the slot
/// the bus currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbStatus {
    pub mode: OnOff,
    pub node: Node,
}

/// Power flags of the four node slots.
///
/// Doubles as the parameter set of power writes: all four flags travel in
/// every request, so a write always states the full intended power state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePower {
    pub node1: OnOff,
    pub node2: OnOff,
    pub node3: OnOff,
    pub node4: OnOff,
}

impl NodePower {
    /// All four slots powered on.
    pub fn all_on() -> Self {
        Self {
            node1: OnOff::On,
            node2: OnOff::On,
            node3: OnOff::On,
            node4: OnOff::On,
        }
    }

    /// All four slots powered off.
    pub fn all_off() -> Self {
        Self::default()
    }

    /// Flag of one slot.
    pub fn node(&self, node: Node) -> OnOff {
        match node {
            Node::Node1 => self.node1,
            Node::Node2 => self.node2,
            Node::Node3 => self.node3,
            Node::Node4 => self.node4,
        }
    }

    /// Copy with one slot's flag replaced.
    pub fn with_node(mut self, node: Node, state: OnOff) -> Self {
        match node {
            Node::Node1 => self.node1 = state,
            Node::Node2 => self.node2 = state,
            Node::Node3 => self.node3 = state,
            Node::Node4 => self.node4 = state,
        }
        self
    }
}

/// Version, build time and network identity of the BMC itself
/// (resource type `other`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub buildtime: String,
    pub ip: String,
    pub mac: String,
}

/// SD card usage counters as reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdCardUsage {
    pub total: u64,
    pub free: u64,
    /// `use` on the wire, which is a Rust keyword.
    #[serde(rename = "use")]
    pub used: u64,
}

/// Captured UART output of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UartOutput {
    pub uart: String,
}

/// Uniform acknowledgement returned by every `set` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub result: String,
}

impl Ack {
    /// The acknowledgement the firmware sends on success.
    pub fn ok() -> Self {
        Self {
            result: "ok".to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == "ok"
    }
}

// =============================================================================
// Response Envelope
// =============================================================================

/// Response envelope shared by every operation: the device wraps its
/// payload in a `response` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub response: Vec<T>,
}

impl<T> Envelope<T> {
    /// First payload element.
    ///
    /// The firmware answers with exactly one element; an empty array is
    /// reported as a parse error rather than indexed blindly.
    pub fn into_single(self) -> Result<T> {
        self.response
            .into_iter()
            .next()
            .ok_or_else(|| TpiClientError::Parse("empty response array".to_string()))
    }
}

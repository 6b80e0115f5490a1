//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Transport/protocol family of an endpoint.
///
/// The selector never interprets protocol internals; the kind is kept
/// so store adapters and the tunnel evaluator can round-trip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Vmess,
    Vless,
    Shadowsocks,
    Trojan,
    Wireguard,
    Http,
    Socks,
}

impl ConnectionKind {
    /// Parse a connection kind from its wire string.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "vmess" => Self::Vmess,
            "vless" => Self::Vless,
            "shadowsocks" | "ss" => Self::Shadowsocks,
            "trojan" => Self::Trojan,
            "wireguard" | "wg" => Self::Wireguard,
            "http" => Self::Http,
            _ => Self::Socks, // fallback
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Shadowsocks => "shadowsocks",
            Self::Trojan => "trojan",
            Self::Wireguard => "wireguard",
            Self::Http => "http",
            Self::Socks => "socks",
        }
    }
}

impl Default for ConnectionKind {
    fn default() -> Self {
        Self::Socks
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Weights applied by the scorer to the normalized probe dimensions.
///
/// The loss share is reserved for a packet-loss probe that does not
/// exist yet; it contributes zero and is not redistributed.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    pub rtt: f64,
    pub jitter: f64,
    pub throughput: f64,
    pub loss_reserved: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rtt: 0.35,
            jitter: 0.15,
            throughput: 0.25,
            loss_reserved: 0.25,
        }
    }
}

/// Coarse quality classification recorded after a full probe.
///
/// Stored through the affiliation store for external UIs; the scorer
/// never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityFlag {
    Good,
    Degraded,
    Unusable,
}

impl QualityFlag {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "good" => Some(Self::Good),
            "degraded" => Some(Self::Degraded),
            "unusable" => Some(Self::Unusable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Degraded => "degraded",
            Self::Unusable => "unusable",
        }
    }
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

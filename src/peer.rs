//! Per-peer configuration and session attributes (spec.md Section 3).

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::Ipv4Addr;
use std::time::Duration;

/// Immutable configuration for a single BGP peer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerConfig {
    pub local_as: u16,
    pub remote_as: u16,
    pub remote_addr: Ipv4Addr,
    pub local_bgp_id: Ipv4Addr,
    /// Configured hold time in seconds; 0 or >= 3 (spec.md Section 3).
    pub hold_time: u16,
    pub options: PeerOptions,
}

impl PeerConfig {
    /// A peer is internal (IBGP) iff `local_as == remote_as`.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.local_as == self.remote_as
    }

    /// The `MinRouteAdvertisementInterval` to apply to this peer (spec.md
    /// Section 5): 30s EBGP, 5s IBGP by default.
    #[must_use]
    pub fn min_route_advertisement_interval(&self) -> Duration {
        if self.is_internal() {
            Duration::from_secs(crate::DEFAULT_MRAI_IBGP_SECS)
        } else {
            Duration::from_secs(crate::DEFAULT_MRAI_EBGP_SECS)
        }
    }
}

/// Optional session attributes (spec.md Section 3). Each gates specific FSM
/// transitions; a peer that leaves one at its default need not trigger the
/// events it guards.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerOptions {
    pub allow_automatic_start: bool,
    pub allow_automatic_stop: bool,
    pub collision_detect_established_state: bool,
    pub damp_peer_oscillations: bool,
    pub delay_open: bool,
    pub delay_open_time: Duration,
    pub idle_hold_time: Duration,
    pub passive_tcp_establishment: bool,
    pub send_notification_without_open: bool,
    pub track_tcp_state: bool,
    /// Not part of RFC 4271's optional attribute list verbatim, but the
    /// policy hook spec.md 4.1 calls for: accept OPEN messages carrying
    /// optional parameters this speaker does not recognize, rather than
    /// rejecting with Unsupported Optional Parameter.
    pub accept_unknown_optional_parameters: bool,
}

impl Default for PeerOptions {
    fn default() -> Self {
        Self {
            allow_automatic_start: false,
            allow_automatic_stop: false,
            collision_detect_established_state: false,
            damp_peer_oscillations: false,
            delay_open: false,
            delay_open_time: Duration::from_secs(crate::DEFAULT_DELAY_OPEN_SECS),
            idle_hold_time: Duration::from_secs(crate::DEFAULT_IDLE_HOLD_SECS),
            passive_tcp_establishment: false,
            send_notification_without_open: false,
            track_tcp_state: false,
            accept_unknown_optional_parameters: true,
        }
    }
}

/// Mutable per-session counters and negotiated parameters, owned by the
/// session runtime and consulted by the FSM (spec.md Section 3).
#[derive(Clone, Debug, Default)]
pub struct SessionAttributes {
    pub connect_retry_counter: u32,
    /// `HoldTime` negotiated during OPEN exchange; `None` before OPEN.
    pub negotiated_hold_time: Option<u16>,
    /// BGP Identifier the peer sent in its OPEN, once known. Published to
    /// [`crate::session::PeerSnapshot`] for the speaker's collision
    /// resolution (RFC 4271 Section 6.8).
    pub peer_bgp_id: Option<Ipv4Addr>,
    /// Whether `DelayOpenTimer` is currently running -- FSM transitions key
    /// off this (spec.md Section 4.2), not off the timer itself, since the
    /// FSM's `step` function is synchronous and does not own timer tasks.
    pub delay_open_timer_running: bool,
    /// Whether the in-flight TCP connection attempt was started passively
    /// (listen-only) rather than by actively dialing the peer.
    pub passive: bool,
}

impl SessionAttributes {
    /// Reset counters the way every Start/Stop transition does (spec.md
    /// Testable Properties: "reset to zero on start/stop transitions").
    pub fn reset_on_start_stop(&mut self) {
        self.connect_retry_counter = 0;
    }

    pub fn increment_connect_retry_counter(&mut self) {
        self.connect_retry_counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(local_as: u16, remote_as: u16) -> PeerConfig {
        PeerConfig {
            local_as,
            remote_as,
            remote_addr: "192.0.2.1".parse().unwrap(),
            local_bgp_id: "192.0.2.254".parse().unwrap(),
            hold_time: 90,
            options: PeerOptions::default(),
        }
    }

    #[test]
    fn internal_vs_external() {
        assert!(cfg(65000, 65000).is_internal());
        assert!(!cfg(65000, 65001).is_internal());
    }

    #[test]
    fn mrai_depends_on_internal() {
        assert_eq!(
            cfg(65000, 65000).min_route_advertisement_interval(),
            Duration::from_secs(crate::DEFAULT_MRAI_IBGP_SECS)
        );
        assert_eq!(
            cfg(65000, 65001).min_route_advertisement_interval(),
            Duration::from_secs(crate::DEFAULT_MRAI_EBGP_SECS)
        );
    }

    #[test]
    fn counters_reset_on_start_stop() {
        let mut attrs = SessionAttributes {
            connect_retry_counter: 3,
            ..Default::default()
        };
        attrs.reset_on_start_stop();
        assert_eq!(attrs.connect_retry_counter, 0);
    }
}

//! The boundary to routing information, kept abstract (spec.md Section 6:
//! RIB selection, policy, and kernel FIB programming are out of scope for
//! this crate). `RibSink` is the trait a real speaker would implement
//! against its Adj-RIB-In/Loc-RIB/Decision Process; `LoggingRibSink` stands
//! in for "the thing BGP feeds its state from", the role the teacher's
//! `rirstat::Database` plays in `delegation-feed`.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::bgp::Update;
use std::net::Ipv4Addr;

/// Receives UPDATE messages as they arrive in `Established`, decoupled from
/// route selection and installation. Implementations own whatever RIB
/// structure, policy engine, or kernel FIB sync they need; this crate does
/// not prescribe one.
pub trait RibSink: Send {
    /// Apply the NLRI/withdrawals/attributes of an UPDATE received from
    /// `peer`.
    fn apply(&mut self, peer: Ipv4Addr, update: &Update);

    /// Called when a session leaves `Established`, so a sink can flush
    /// routes learned from `peer` (RFC 4271's implicit withdrawal on
    /// session loss).
    fn flush(&mut self, peer: Ipv4Addr);
}

/// A `RibSink` that only logs, for the demo binary and tests.
#[derive(Clone, Copy, Default)]
pub struct LoggingRibSink;

impl RibSink for LoggingRibSink {
    fn apply(&mut self, peer: Ipv4Addr, update: &Update) {
        log::info!(
            "rib: {peer} withdrew {} routes, announced {} NLRI ({} path attributes)",
            update.withdrawn_routes.len(),
            update.nlri.len(),
            update.path_attributes.len()
        );
    }

    fn flush(&mut self, peer: Ipv4Addr) {
        log::debug!("rib: flushing routes learned from {peer}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::Update;

    #[test]
    fn logging_sink_does_not_panic() {
        let mut sink = LoggingRibSink;
        let peer: Ipv4Addr = "10.0.0.1".parse().unwrap();
        sink.apply(peer, &Update::default());
        sink.flush(peer);
    }
}

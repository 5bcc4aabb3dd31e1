//! Command line arguments for the `bgpd` demo binary.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};

#[derive(Parser, Debug)]
#[command(about = "A speaker-side BGP-4 engine", version)]
pub struct Args {
    /// Our AS number.
    #[arg(long)]
    pub local_as: u16,
    /// Our BGP router ID.
    #[arg(long)]
    pub local_id: Ipv4Addr,
    /// Listen address for inbound sessions.
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen_addr: IpAddr,
    /// Listen port for inbound sessions.
    #[arg(short = 'p', long, default_value_t = crate::BGP_PORT)]
    pub listen_port: u16,
    /// A peer to maintain a session with, as `asn,addr[,hold_time]`.
    /// Repeatable.
    #[arg(long = "peer", value_parser = parse_peer)]
    pub peers: Vec<PeerSpec>,
    /// Verbose (debug-level) logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[derive(Clone, Debug)]
pub struct PeerSpec {
    pub asn: u16,
    pub addr: Ipv4Addr,
    pub hold_time: u16,
}

fn parse_peer(raw: &str) -> Result<PeerSpec, String> {
    let mut parts = raw.split(',');
    let asn: u16 = parts
        .next()
        .ok_or("missing ASN")?
        .parse()
        .map_err(|e| format!("invalid ASN: {e}"))?;
    let addr: Ipv4Addr = parts
        .next()
        .ok_or("missing peer address")?
        .parse()
        .map_err(|e| format!("invalid peer address: {e}"))?;
    let hold_time: u16 = match parts.next() {
        Some(raw) => raw.parse().map_err(|e| format!("invalid hold time: {e}"))?,
        None => 90,
    };
    Ok(PeerSpec {
        asn,
        addr,
        hold_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_peer_without_hold_time() {
        let spec = parse_peer("65001,192.0.2.1").unwrap();
        assert_eq!(spec.asn, 65001);
        assert_eq!(spec.addr, "192.0.2.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(spec.hold_time, 90);
    }

    #[test]
    fn parses_peer_with_hold_time() {
        let spec = parse_peer("65001,192.0.2.1,30").unwrap();
        assert_eq!(spec.hold_time, 30);
    }

    #[test]
    fn rejects_malformed_peer() {
        assert!(parse_peer("not-an-asn,192.0.2.1").is_err());
    }
}

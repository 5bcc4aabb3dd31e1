//! The process-level object: one `TcpListener`, a table of configured
//! peers, and the dispatch of accepted connections to the right session
//! (spec.md Section 5).
//!
//! Grounded on `delegation-feed/main.rs`'s accept loop
//! (`tokio::select! { socket.accept() => ..., recv_updates.recv() => ... }`),
//! generalized here to a speaker managing more than one peer: each accepted
//! connection's remote address is matched against the peer table, and
//! collision detection (RFC 4271 Section 6.8, spec.md Sections 4.2/9) is
//! resolved at this level rather than inside an individual FSM, since only
//! the speaker can see both the active and passive connection attempts for
//! a peer at once.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::fsm::{Event, State};
use crate::peer::PeerConfig;
use crate::rib::RibSink;
use crate::session::{ControlHandle, Session};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("no peer configured for {0}")]
    UnknownPeer(Ipv4Addr),
}

/// RFC 4271 Section 6.8 collision resolution: compare BGP Identifiers as
/// host-order `u32`. The higher identifier's speaker keeps its existing
/// connection; returns `true` when `local` is that speaker.
#[must_use]
fn local_identifier_wins(local: Ipv4Addr, remote: Ipv4Addr) -> bool {
    u32::from(local) > u32::from(remote)
}

struct PeerHandle {
    control: ControlHandle,
    task: JoinHandle<()>,
    local_bgp_id: Ipv4Addr,
}

/// Owns the listening socket and the set of configured peers. `R` is the
/// `RibSink` implementation every peer's session feeds UPDATE messages to.
pub struct Speaker<R: RibSink + Clone + Send + 'static> {
    listener: TcpListener,
    peers: HashMap<Ipv4Addr, PeerHandle>,
    rib: R,
}

impl<R: RibSink + Clone + Send + 'static> Speaker<R> {
    /// Bind a listener on `listen_addr:listen_port` (spec.md Section 5; BGP
    /// conventionally listens on [`crate::BGP_PORT`]).
    pub async fn bind(listen_addr: IpAddr, listen_port: u16, rib: R) -> Result<Self, Error> {
        let listener = TcpListener::bind((listen_addr, listen_port))
            .await
            .map_err(Error::Bind)?;
        Ok(Self {
            listener,
            peers: HashMap::new(),
            rib,
        })
    }

    /// Register a peer and start its session task. The session begins in
    /// `Idle`; call [`Speaker::start_peer`] to send it a Start event.
    pub fn add_peer(&mut self, config: PeerConfig) {
        let remote = config.remote_addr;
        let local_bgp_id = config.local_bgp_id;
        let passive = config.options.passive_tcp_establishment;
        let mut session = Session::new(config, self.rib.clone());
        let control = session.control_handle();
        let task = tokio::spawn(async move {
            let initial = if passive {
                Event::ManualStartWithPassiveTcpEstablishment
            } else {
                Event::ManualStart
            };
            if let Err(err) = session.run(initial).await {
                log::error!("{remote}: session ended: {err}");
            }
        });
        self.peers.insert(
            remote,
            PeerHandle {
                control,
                task,
                local_bgp_id,
            },
        );
    }

    /// Remove a peer, aborting its session task.
    pub fn remove_peer(&mut self, remote: Ipv4Addr) {
        if let Some(handle) = self.peers.remove(&remote) {
            handle.task.abort();
        }
    }

    /// Send `ManualStop` to a configured peer's session.
    pub fn stop_peer(&self, remote: Ipv4Addr) -> Result<(), Error> {
        let handle = self.peers.get(&remote).ok_or(Error::UnknownPeer(remote))?;
        handle.control.send_event(Event::ManualStop);
        Ok(())
    }

    /// Run the accept loop forever, dispatching each inbound connection to
    /// the matching peer's session. A connection from an address with no
    /// configured peer is refused (closed) immediately.
    ///
    /// spec.md Section 4.2/9, RFC 4271 Section 6.8: if a peer's session has
    /// already learned the remote BGP Identifier (it is in `OpenConfirm` or
    /// `Established`) and a second connection arrives, this is a collision.
    /// The two BGP Identifiers, compared as host-order `u32`, decide the
    /// survivor: whichever speaker has the higher identifier keeps its
    /// existing connection and the other connection is refused; the speaker
    /// with the lower identifier tears down its existing connection
    /// (`Event::OpenCollisionDump`) and continues over the new one.
    pub async fn run(&mut self) -> Result<(), Error> {
        loop {
            let (stream, peer_addr) = self.listener.accept().await.map_err(Error::Bind)?;
            let remote = match peer_addr.ip() {
                IpAddr::V4(v4) => v4,
                IpAddr::V6(_) => {
                    log::warn!("rejecting IPv6 peer {peer_addr}: speaker is IPv4-only");
                    continue;
                }
            };
            match self.peers.get(&remote) {
                Some(handle) => {
                    let snapshot = handle.control.snapshot();
                    let collision = matches!(snapshot.state, State::OpenConfirm | State::Established)
                        && snapshot.peer_bgp_id.is_some();
                    if collision {
                        let remote_id = snapshot.peer_bgp_id.expect("checked above");
                        if local_identifier_wins(handle.local_bgp_id, remote_id) {
                            log::info!(
                                "refusing colliding connection from {remote}: local BGP identifier wins"
                            );
                            continue;
                        }
                        log::info!(
                            "accepting colliding connection from {remote}: remote BGP identifier wins"
                        );
                        handle.control.send_event(Event::OpenCollisionDump);
                        handle
                            .control
                            .send_event(Event::ManualStartWithPassiveTcpEstablishment);
                    } else {
                        log::info!("accepted connection from configured peer {remote}");
                    }
                    handle.control.offer_transport(stream);
                }
                None => {
                    log::warn!("refusing connection from unconfigured peer {remote}");
                }
            }
        }
    }

    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

impl<R: RibSink + Clone + Send + 'static> Drop for Speaker<R> {
    fn drop(&mut self) {
        for (_, handle) in self.peers.drain() {
            handle.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerOptions;
    use crate::rib::LoggingRibSink;

    fn cfg(addr: &str) -> PeerConfig {
        PeerConfig {
            local_as: 65000,
            remote_as: 65001,
            remote_addr: addr.parse().unwrap(),
            local_bgp_id: "192.0.2.254".parse().unwrap(),
            hold_time: 90,
            options: PeerOptions::default(),
        }
    }

    #[test]
    fn higher_bgp_identifier_wins_collision() {
        let low: Ipv4Addr = "10.0.0.1".parse().unwrap();
        let high: Ipv4Addr = "10.0.0.2".parse().unwrap();
        assert!(local_identifier_wins(high, low));
        assert!(!local_identifier_wins(low, high));
    }

    #[tokio::test]
    async fn bind_and_add_peer() {
        let mut speaker = Speaker::bind("127.0.0.1".parse().unwrap(), 0, LoggingRibSink)
            .await
            .unwrap();
        assert_eq!(speaker.peer_count(), 0);
        speaker.add_peer(cfg("192.0.2.1"));
        assert_eq!(speaker.peer_count(), 1);
        speaker.remove_peer("192.0.2.1".parse().unwrap());
        assert_eq!(speaker.peer_count(), 0);
    }

    #[tokio::test]
    async fn stop_peer_rejects_unknown_address() {
        let speaker = Speaker::bind("127.0.0.1".parse().unwrap(), 0, LoggingRibSink)
            .await
            .unwrap();
        assert!(matches!(
            speaker.stop_peer("192.0.2.9".parse().unwrap()),
            Err(Error::UnknownPeer(_))
        ));
    }
}

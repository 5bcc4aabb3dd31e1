//! The per-peer session runtime: owns the TCP transport and timers, drives
//! [`crate::fsm::step`], and carries out the actions it returns (spec.md
//! Section 4.3).
//!
//! Grounded on the teacher's `Feeder`: `FramedRead`/`FramedWrite` built from
//! `socket.into_split()` exactly as `Feeder::new` does, and a `tokio::select!`
//! loop descended from `Feeder::established`'s `select! { recv_updates.recv()
//! => ..., rx.next() => ... }`, generalized here to also race the FSM's
//! timers and an administrative control channel. Unlike the teacher's
//! `Feeder`, which drove I/O directly from one async function per state, no
//! FSM transition here touches a socket or a timer -- `step` only decides
//! what to do, and this module does it.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::bgp::{Codec, Message};
use crate::fsm::{self, Action, Event, Peer, State, TimerKind};
use crate::peer::PeerConfig;
use crate::rib::RibSink;
use crate::timer::Timer;
use futures_util::{SinkExt, StreamExt};
use std::net::Ipv4Addr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};

/// What a [`Speaker`](crate::speaker::Speaker) can see of a running session
/// from outside, without reaching into its internals: enough to resolve a
/// connection collision (RFC 4271 Section 6.8) against a second inbound
/// connection for the same peer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct PeerSnapshot {
    pub state: State,
    pub peer_bgp_id: Option<Ipv4Addr>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What arrives on the session's internal event loop: either an FSM input,
/// or a transport handed over by the listener (a passively accepted
/// connection) or by this session's own dial task.
enum Internal {
    Fsm(Event),
    TransportEstablished(TcpStream),
}

/// Raw output of the session's `select!`, before it is turned into FSM
/// events -- kept free of any `&mut self` method calls so it can coexist
/// with the in-progress borrow of `self.rx` across the `select!` arms.
enum RawInput {
    Internal(Option<Internal>),
    Frame(Option<Result<Message, crate::wire::Error>>),
}

/// A sender a peer table or test harness can use to push FSM events (Start,
/// Stop, or an externally observed transport outcome) into a running
/// session without reaching into its internals.
#[derive(Clone)]
pub struct ControlHandle {
    events: mpsc::UnboundedSender<Internal>,
    snapshot: watch::Receiver<PeerSnapshot>,
}

impl ControlHandle {
    pub fn send_event(&self, event: Event) {
        let _ = self.events.send(Internal::Fsm(event));
    }

    /// Hand a passively accepted TCP connection to this session.
    pub fn offer_transport(&self, stream: TcpStream) {
        let _ = self.events.send(Internal::TransportEstablished(stream));
    }

    /// The session's most recently published state and negotiated BGP
    /// Identifier, for collision resolution (RFC 4271 Section 6.8).
    #[must_use]
    pub fn snapshot(&self) -> PeerSnapshot {
        *self.snapshot.borrow()
    }
}

struct Timers {
    connect_retry: Timer,
    hold: Timer,
    keepalive: Timer,
    delay_open: Timer,
    idle_hold: Timer,
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            connect_retry: Timer::new(),
            hold: Timer::new(),
            keepalive: Timer::new(),
            delay_open: Timer::new(),
            idle_hold: Timer::new(),
        }
    }
}

impl Timers {
    fn get_mut(&mut self, kind: TimerKind) -> &mut Timer {
        match kind {
            TimerKind::ConnectRetry => &mut self.connect_retry,
            TimerKind::Hold => &mut self.hold,
            TimerKind::Keepalive => &mut self.keepalive,
            TimerKind::DelayOpen => &mut self.delay_open,
            TimerKind::IdleHold => &mut self.idle_hold,
        }
    }

    fn event_for(kind: TimerKind) -> Event {
        match kind {
            TimerKind::ConnectRetry => Event::ConnectRetryTimerExpires,
            TimerKind::Hold => Event::HoldTimerExpires,
            TimerKind::Keepalive => Event::KeepaliveTimerExpires,
            TimerKind::DelayOpen => Event::DelayOpenTimerExpires,
            TimerKind::IdleHold => Event::IdleHoldTimerExpires,
        }
    }

    fn stop_all(&mut self) {
        self.connect_retry.stop();
        self.hold.stop();
        self.keepalive.stop();
        self.delay_open.stop();
        self.idle_hold.stop();
    }
}

/// Drives one peer's FSM to completion. `R` is the RIB boundary UPDATE
/// messages are handed to once the session reaches `Established`.
pub struct Session<R: RibSink> {
    peer: Peer,
    state: State,
    rx: Option<FramedRead<OwnedReadHalf, Codec>>,
    tx: Option<FramedWrite<OwnedWriteHalf, Codec>>,
    events_tx: mpsc::UnboundedSender<Internal>,
    events_rx: mpsc::UnboundedReceiver<Internal>,
    snapshot_tx: watch::Sender<PeerSnapshot>,
    timers: Timers,
    rib: R,
}

impl<R: RibSink> Session<R> {
    #[must_use]
    pub fn new(config: PeerConfig, rib: R) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(PeerSnapshot::default());
        Self {
            peer: Peer::new(config),
            state: State::Idle,
            rx: None,
            tx: None,
            events_tx,
            events_rx,
            snapshot_tx,
            timers: Timers::default(),
            rib,
        }
    }

    #[must_use]
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            events: self.events_tx.clone(),
            snapshot: self.snapshot_tx.subscribe(),
        }
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    fn dial(&self) {
        let addr = self.peer.config.remote_addr;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            match connect(addr).await {
                Ok(stream) => {
                    let _ = tx.send(Internal::TransportEstablished(stream));
                    let _ = tx.send(Internal::Fsm(Event::TcpCrAcked));
                }
                Err(err) => {
                    log::debug!("connect to {addr} failed: {err}");
                    let _ = tx.send(Internal::Fsm(Event::TcpConnectionFails));
                }
            }
        });
    }

    fn set_transport(&mut self, stream: TcpStream) {
        let (rx, tx) = stream.into_split();
        self.rx = Some(FramedRead::new(rx, Codec));
        self.tx = Some(FramedWrite::new(tx, Codec));
    }

    fn close_transport(&mut self) {
        self.rx = None;
        self.tx = None;
    }

    /// Run one FSM transition and carry out the actions it returns.
    async fn apply(&mut self, event: Event) -> Result<(), Error> {
        let addr = self.peer.config.remote_addr;
        log::debug!(target: "bgpcore::fsm", "{addr}: state={:?} event={event:?}", self.state);
        let (_, actions) = fsm::step(self.state, event, &mut self.peer);
        for action in actions {
            match action {
                Action::SendMessage(msg) => {
                    if let Some(tx) = self.tx.as_mut() {
                        tx.feed(msg).await?;
                        tx.flush().await?;
                    } else {
                        log::warn!("{addr}: dropping outbound message, transport is closed");
                    }
                }
                Action::StartTimer(kind, duration) => {
                    let ev = Timers::event_for(kind);
                    self.timers
                        .get_mut(kind)
                        .reset(duration, self.events_tx.clone(), Internal::Fsm(ev));
                }
                Action::StopTimer(kind) => self.timers.get_mut(kind).stop(),
                Action::OpenTransport { passive } => {
                    if !passive {
                        self.dial();
                    }
                }
                Action::CloseTransport => self.close_transport(),
                // `fsm::step` already mutated `ConnectRetryCounter` directly
                // on the peer it was given -- these two are a record of that
                // for anything watching the action log, not a second place
                // that moves the counter.
                Action::IncrementCounter | Action::ResetCounter => {}
                Action::InstallNegotiated { hold_time } => {
                    log::info!("{addr}: negotiated hold time {hold_time}s");
                }
                Action::Transition(state) => {
                    log::info!(target: "bgpcore::fsm", "{addr}: {:?} -> {state:?}", self.state);
                    self.state = state;
                    if state == State::Idle {
                        self.rib.flush(addr);
                    }
                }
                Action::Log(msg) => log::debug!("{addr}: {msg}"),
            }
        }
        self.snapshot_tx.send_replace(PeerSnapshot {
            state: self.state,
            peer_bgp_id: self.peer.session.peer_bgp_id,
        });
        Ok(())
    }

    /// Classify a decode failure into the FSM event its current state
    /// expects (spec.md Section 4.1: header errors can arise in any state;
    /// OPEN body errors only in `OpenSent`; UPDATE body errors only in
    /// `Established`).
    fn error_event(&self, err: crate::wire::Error) -> Event {
        match self.state {
            State::OpenSent => Event::BgpOpenMsgErr(err),
            State::Established => Event::UpdateMsgErr(err),
            _ => Event::BgpHeaderErr(err),
        }
    }

    /// Drive the session forever, starting it with `initial` (typically
    /// `Event::ManualStart` or one of its passive/automatic variants).
    pub async fn run(&mut self, initial: Event) -> Result<(), Error> {
        self.apply(initial).await?;
        loop {
            // The select's arms only produce owned values -- no method that
            // needs the whole `&mut self` runs while `rx` (a borrow of the
            // `self.rx` field alone) is still live.
            let raw: RawInput = if let Some(rx) = self.rx.as_mut() {
                tokio::select! {
                    internal = self.events_rx.recv() => RawInput::Internal(internal),
                    frame = rx.next() => RawInput::Frame(frame),
                }
            } else {
                RawInput::Internal(self.events_rx.recv().await)
            };

            match raw {
                RawInput::Internal(None) => return Ok(()),
                RawInput::Internal(Some(Internal::Fsm(event))) => self.apply(event).await?,
                RawInput::Internal(Some(Internal::TransportEstablished(stream))) => {
                    self.set_transport(stream);
                    self.apply(Event::TcpConnectionConfirmed).await?;
                }
                RawInput::Frame(Some(Ok(msg))) => {
                    let event = self.message_to_event(msg);
                    self.apply(event).await?;
                }
                RawInput::Frame(Some(Err(err))) => {
                    let event = self.error_event(err);
                    self.apply(event).await?;
                }
                RawInput::Frame(None) => self.apply(Event::TcpConnectionFails).await?,
            }
        }
    }

    fn message_to_event(&mut self, msg: Message) -> Event {
        match msg {
            Message::Open(open) => {
                if self.peer.session.delay_open_timer_running {
                    Event::BgpOpenWithDelayOpenTimerRunning(open)
                } else {
                    Event::BgpOpen(open)
                }
            }
            Message::Keepalive => Event::KeepAliveMsg,
            Message::Update(update) => {
                self.rib.apply(self.peer.config.remote_addr, &update);
                Event::UpdateMsg(update)
            }
            Message::Notification(notif) => {
                if notif.is_unsupported_version() {
                    Event::NotifMsgVerErr
                } else {
                    Event::NotifMsg(notif)
                }
            }
        }
    }
}

impl<R: RibSink> Drop for Session<R> {
    fn drop(&mut self) {
        self.timers.stop_all();
    }
}

async fn connect(addr: std::net::Ipv4Addr) -> std::io::Result<TcpStream> {
    TcpStream::connect((addr, crate::BGP_PORT)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerOptions;
    use crate::rib::LoggingRibSink;

    fn cfg() -> PeerConfig {
        PeerConfig {
            local_as: 65000,
            remote_as: 65001,
            remote_addr: "192.0.2.1".parse().unwrap(),
            local_bgp_id: "192.0.2.254".parse().unwrap(),
            hold_time: 90,
            options: PeerOptions::default(),
        }
    }

    #[tokio::test]
    async fn new_session_starts_idle() {
        let session = Session::new(cfg(), LoggingRibSink);
        assert_eq!(session.state(), State::Idle);
    }

    #[tokio::test]
    async fn manual_start_transitions_out_of_idle() {
        let mut session = Session::new(cfg(), LoggingRibSink);
        session.apply(Event::ManualStart).await.unwrap();
        assert_eq!(session.state(), State::Connect);
    }
}

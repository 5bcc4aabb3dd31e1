//! The per-peer BGP finite state machine (spec.md Section 4.2, RFC 4271
//! Section 8).
//!
//! Grounded on the design note in spec.md Section 9: rather than dynamic
//! dispatch of transitions, `step` is a pure function from `(State, Event,
//! &mut Peer)` to `(State, Vec<Action>)`. `Action` is the closed set of
//! side-effects the session runtime (`crate::session`) knows how to carry
//! out; the FSM itself never touches a socket, a timer task, or a clock --
//! it only decides what the runtime must do next. This is a deliberate
//! restructuring of the teacher's `session.rs`, which drove I/O directly
//! from async state functions: spec.md Section 4.3 requires that "no FSM
//! transition may block on I/O", so the table here stays synchronous and
//! the runtime performs the actions.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::bgp::{CeaseSubcode, Message, Notification, NotificationErrorCode, Open, Update};
use crate::peer::{PeerConfig, SessionAttributes};
use crate::wire;
use std::time::Duration;

/// The six FSM states (spec.md Section 4.2). `Idle` is both the initial and
/// the recovered state; there is no terminal state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum State {
    #[default]
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

/// The 28 FSM input events (RFC 4271 Section 8.1, spec.md Section 4.2),
/// numbered as in the spec. Events that carry protocol data (an OPEN, an
/// UPDATE, a NOTIFICATION, or a decode error) carry it inline -- by the
/// time the session runtime raises one of these, the lower-level codec and
/// semantic OPEN/UPDATE validation have already run (spec.md Section 4.1).
#[derive(Clone, Debug)]
pub enum Event {
    /// 1
    ManualStart,
    /// 2
    ManualStop,
    /// 3
    AutomaticStart,
    /// 4
    ManualStartWithPassiveTcpEstablishment,
    /// 5
    AutomaticStartWithPassiveTcpEstablishment,
    /// 6
    AutomaticStartWithDampPeerOscillations,
    /// 7
    AutomaticStartWithDampPeerOscillationsAndPassiveTcpEstablishment,
    /// 8
    AutomaticStop,
    /// 9
    ConnectRetryTimerExpires,
    /// 10
    HoldTimerExpires,
    /// 11
    KeepaliveTimerExpires,
    /// 12
    DelayOpenTimerExpires,
    /// 13
    IdleHoldTimerExpires,
    /// 14
    TcpConnectionValid,
    /// 15
    TcpCrInvalid,
    /// 16
    TcpCrAcked,
    /// 17
    TcpConnectionConfirmed,
    /// 18
    TcpConnectionFails,
    /// 19
    BgpOpen(Open),
    /// 20
    BgpOpenWithDelayOpenTimerRunning(Open),
    /// 21
    BgpHeaderErr(wire::Error),
    /// 22
    BgpOpenMsgErr(wire::Error),
    /// 23
    OpenCollisionDump,
    /// 24
    NotifMsgVerErr,
    /// 25
    NotifMsg(Notification),
    /// 26
    KeepAliveMsg,
    /// 27
    UpdateMsg(Update),
    /// 28
    UpdateMsgErr(wire::Error),
}

impl Event {
    /// Is this one of the seven Start variants?
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(
            self,
            Event::ManualStart
                | Event::AutomaticStart
                | Event::ManualStartWithPassiveTcpEstablishment
                | Event::AutomaticStartWithPassiveTcpEstablishment
                | Event::AutomaticStartWithDampPeerOscillations
                | Event::AutomaticStartWithDampPeerOscillationsAndPassiveTcpEstablishment
        )
    }

    /// Does this Start variant request passive (listen-only) TCP
    /// establishment?
    #[must_use]
    fn is_passive_start(&self) -> bool {
        matches!(
            self,
            Event::ManualStartWithPassiveTcpEstablishment
                | Event::AutomaticStartWithPassiveTcpEstablishment
                | Event::AutomaticStartWithDampPeerOscillationsAndPassiveTcpEstablishment
        )
    }
}

/// Which restartable timer an action addresses (see [`crate::timer::Timer`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    ConnectRetry,
    Hold,
    Keepalive,
    DelayOpen,
    IdleHold,
}

/// A single FSM side-effect. The closed set spec.md Section 9 names.
#[derive(Clone, Debug)]
pub enum Action {
    SendMessage(Message),
    StartTimer(TimerKind, Duration),
    StopTimer(TimerKind),
    OpenTransport { passive: bool },
    CloseTransport,
    IncrementCounter,
    ResetCounter,
    InstallNegotiated { hold_time: u16 },
    Transition(State),
    Log(String),
}

/// The mutable per-peer aggregate the FSM consults and updates. Combining
/// immutable configuration and mutable runtime attributes into one owned
/// value (rather than a back-reference from the FSM into the peer) is the
/// design note in spec.md Section 9: "model the FSM and the peer as two
/// halves of a single owned aggregate... pass the peer context explicitly
/// into each transition action, eliminating cycles."
pub struct Peer {
    pub config: PeerConfig,
    pub session: SessionAttributes,
}

impl Peer {
    #[must_use]
    pub fn new(config: PeerConfig) -> Self {
        Self {
            config,
            session: SessionAttributes::default(),
        }
    }
}

fn fsm_error(peer: &mut Peer) -> (State, Vec<Action>) {
    peer.session.increment_connect_retry_counter();
    (
        State::Idle,
        vec![
            Action::SendMessage(Message::Notification(Notification::simple(
                NotificationErrorCode::FiniteStateMachineError,
                0,
            ))),
            Action::StopTimer(TimerKind::ConnectRetry),
            Action::StopTimer(TimerKind::Hold),
            Action::StopTimer(TimerKind::Keepalive),
            Action::StopTimer(TimerKind::DelayOpen),
            Action::CloseTransport,
            Action::IncrementCounter,
            Action::Transition(State::Idle),
        ],
    )
}

fn manual_stop(peer: &mut Peer) -> (State, Vec<Action>) {
    peer.session.reset_on_start_stop();
    (
        State::Idle,
        vec![
            Action::SendMessage(Message::Notification(Notification::simple(
                NotificationErrorCode::Cease,
                CeaseSubcode::AdministrativeShutdown as u8,
            ))),
            Action::StopTimer(TimerKind::ConnectRetry),
            Action::StopTimer(TimerKind::Hold),
            Action::StopTimer(TimerKind::Keepalive),
            Action::StopTimer(TimerKind::DelayOpen),
            Action::CloseTransport,
            Action::ResetCounter,
            Action::Transition(State::Idle),
        ],
    )
}

fn start(peer: &mut Peer, event: &Event) -> (State, Vec<Action>) {
    peer.session.reset_on_start_stop();
    let passive = event.is_passive_start() || peer.config.options.passive_tcp_establishment;
    peer.session.passive = passive;
    let next = if passive { State::Active } else { State::Connect };
    let mut actions = vec![
        Action::ResetCounter,
        Action::StartTimer(
            TimerKind::ConnectRetry,
            crate::timer::jittered(Duration::from_secs(crate::DEFAULT_CONNECT_RETRY_SECS)),
        ),
        Action::OpenTransport { passive },
    ];
    if passive {
        actions.push(Action::Log("listening for inbound connection".into()));
    }
    actions.push(Action::Transition(next));
    (next, actions)
}

/// Negotiate HoldTime/KeepaliveTime per spec.md Section 4.2:
/// `negotiated = min(configured, received)`; `KeepaliveTime = HoldTime / 3`.
/// If the negotiated HoldTime is 0, neither timer runs and no KEEPALIVE is
/// ever sent.
fn negotiate_hold_time(configured: u16, received: u16) -> u16 {
    configured.min(received)
}

fn open_sent_on_bgp_open(peer: &mut Peer, open: &Open) -> (State, Vec<Action>) {
    let negotiated = negotiate_hold_time(peer.config.hold_time, open.hold_time);
    peer.session.negotiated_hold_time = Some(negotiated);
    peer.session.peer_bgp_id = Some(open.bgp_id);
    let mut actions = vec![
        Action::StopTimer(TimerKind::DelayOpen),
        Action::SendMessage(Message::Keepalive),
        Action::InstallNegotiated {
            hold_time: negotiated,
        },
    ];
    if negotiated == 0 {
        actions.push(Action::StopTimer(TimerKind::Hold));
        actions.push(Action::StopTimer(TimerKind::Keepalive));
    } else {
        actions.push(Action::StartTimer(
            TimerKind::Keepalive,
            crate::timer::jittered(Duration::from_secs(u64::from(negotiated) / 3)),
        ));
        actions.push(Action::StartTimer(
            TimerKind::Hold,
            Duration::from_secs(u64::from(negotiated)),
        ));
    }
    actions.push(Action::Transition(State::OpenConfirm));
    (State::OpenConfirm, actions)
}

fn notification_for_decode_error(err: &wire::Error) -> Notification {
    crate::bgp::error_to_notification(err)
}

/// Tear down with a NOTIFICATION and increment `ConnectRetryCounter` (spec.md
/// Section 8: "ConnectRetryCounter increases... on transitions caused by
/// errors or failed connections"). The increment happens directly on `peer`,
/// mirroring `fsm_error`; `Action::IncrementCounter` is still emitted so the
/// session runtime can log the event, but it is not the thing that makes the
/// counter move.
fn close_with_notification(peer: &mut Peer, notification: Notification, next: State) -> Vec<Action> {
    peer.session.increment_connect_retry_counter();
    vec![
        Action::SendMessage(Message::Notification(notification)),
        Action::StopTimer(TimerKind::ConnectRetry),
        Action::StopTimer(TimerKind::Hold),
        Action::StopTimer(TimerKind::Keepalive),
        Action::StopTimer(TimerKind::DelayOpen),
        Action::CloseTransport,
        Action::IncrementCounter,
        Action::Transition(next),
    ]
}

/// Run one FSM transition. Returns the next state and the ordered actions
/// the session runtime must perform.
#[must_use]
pub fn step(state: State, event: Event, peer: &mut Peer) -> (State, Vec<Action>) {
    // ManualStop is handled identically in every state (spec.md's "Any" row).
    if matches!(event, Event::ManualStop) && state != State::Idle {
        return manual_stop(peer);
    }

    match state {
        State::Idle => {
            if event.is_start() {
                start(peer, &event)
            } else {
                // "From Idle, without a Start event, no other event may
                // transition away from Idle" (spec.md Testable Properties).
                (State::Idle, vec![Action::Log(format!("ignored {event:?} in Idle"))])
            }
        }

        State::Connect => match event {
            Event::ConnectRetryTimerExpires => (
                State::Connect,
                vec![
                    Action::CloseTransport,
                    Action::StartTimer(
                        TimerKind::ConnectRetry,
                        crate::timer::jittered(Duration::from_secs(
                            crate::DEFAULT_CONNECT_RETRY_SECS,
                        )),
                    ),
                    Action::StopTimer(TimerKind::DelayOpen),
                    Action::OpenTransport { passive: false },
                    Action::Transition(State::Connect),
                ],
            ),
            Event::TcpCrAcked | Event::TcpConnectionConfirmed => {
                if peer.config.options.delay_open {
                    peer.session.delay_open_timer_running = true;
                    (
                        State::Connect,
                        vec![
                            Action::StopTimer(TimerKind::ConnectRetry),
                            Action::StartTimer(
                                TimerKind::DelayOpen,
                                crate::timer::jittered(peer.config.options.delay_open_time),
                            ),
                            Action::Transition(State::Connect),
                        ],
                    )
                } else {
                    let open = Open::new(
                        peer.config.local_as,
                        peer.config.hold_time,
                        peer.config.local_bgp_id,
                    );
                    (
                        State::OpenSent,
                        vec![
                            Action::StopTimer(TimerKind::ConnectRetry),
                            Action::SendMessage(Message::Open(open)),
                            Action::StartTimer(
                                TimerKind::Hold,
                                Duration::from_secs(crate::LARGE_HOLD_TIME_SECS),
                            ),
                            Action::Transition(State::OpenSent),
                        ],
                    )
                }
            }
            Event::DelayOpenTimerExpires => {
                peer.session.delay_open_timer_running = false;
                let open = Open::new(
                    peer.config.local_as,
                    peer.config.hold_time,
                    peer.config.local_bgp_id,
                );
                (
                    State::OpenSent,
                    vec![
                        Action::SendMessage(Message::Open(open)),
                        Action::StartTimer(
                            TimerKind::Hold,
                            Duration::from_secs(crate::LARGE_HOLD_TIME_SECS),
                        ),
                        Action::Transition(State::OpenSent),
                    ],
                )
            }
            Event::TcpConnectionFails => {
                if peer.session.delay_open_timer_running {
                    peer.session.delay_open_timer_running = false;
                    (
                        State::Active,
                        vec![
                            Action::StartTimer(
                                TimerKind::ConnectRetry,
                                crate::timer::jittered(Duration::from_secs(
                                    crate::DEFAULT_CONNECT_RETRY_SECS,
                                )),
                            ),
                            Action::StopTimer(TimerKind::DelayOpen),
                            Action::OpenTransport { passive: true },
                            Action::Transition(State::Active),
                        ],
                    )
                } else {
                    (
                        State::Idle,
                        vec![
                            Action::StopTimer(TimerKind::ConnectRetry),
                            Action::CloseTransport,
                            Action::Transition(State::Idle),
                        ],
                    )
                }
            }
            Event::BgpHeaderErr(err) | Event::BgpOpenMsgErr(err) => {
                let notification = notification_for_decode_error(&err);
                (
                    State::Idle,
                    close_with_notification(peer, notification, State::Idle),
                )
            }
            Event::NotifMsgVerErr => (
                State::Idle,
                vec![
                    Action::StopTimer(TimerKind::ConnectRetry),
                    Action::StopTimer(TimerKind::DelayOpen),
                    Action::CloseTransport,
                    Action::Transition(State::Idle),
                ],
            ),
            _ => fsm_error(peer),
        },

        State::Active => match event {
            Event::ConnectRetryTimerExpires => (
                State::Connect,
                vec![
                    Action::StartTimer(
                        TimerKind::ConnectRetry,
                        crate::timer::jittered(Duration::from_secs(
                            crate::DEFAULT_CONNECT_RETRY_SECS,
                        )),
                    ),
                    Action::OpenTransport { passive: false },
                    Action::Transition(State::Connect),
                ],
            ),
            Event::DelayOpenTimerExpires => {
                peer.session.delay_open_timer_running = false;
                let open = Open::new(
                    peer.config.local_as,
                    peer.config.hold_time,
                    peer.config.local_bgp_id,
                );
                (
                    State::OpenSent,
                    vec![
                        Action::SendMessage(Message::Open(open)),
                        Action::StartTimer(
                            TimerKind::Hold,
                            Duration::from_secs(crate::LARGE_HOLD_TIME_SECS),
                        ),
                        Action::Transition(State::OpenSent),
                    ],
                )
            }
            Event::TcpCrAcked | Event::TcpConnectionConfirmed => {
                if peer.config.options.delay_open {
                    peer.session.delay_open_timer_running = true;
                    (
                        State::Active,
                        vec![
                            Action::StopTimer(TimerKind::ConnectRetry),
                            Action::StartTimer(
                                TimerKind::DelayOpen,
                                crate::timer::jittered(peer.config.options.delay_open_time),
                            ),
                            Action::Transition(State::Active),
                        ],
                    )
                } else {
                    let open = Open::new(
                        peer.config.local_as,
                        peer.config.hold_time,
                        peer.config.local_bgp_id,
                    );
                    (
                        State::OpenSent,
                        vec![
                            Action::StopTimer(TimerKind::ConnectRetry),
                            Action::SendMessage(Message::Open(open)),
                            Action::StartTimer(
                                TimerKind::Hold,
                                Duration::from_secs(crate::LARGE_HOLD_TIME_SECS),
                            ),
                            Action::Transition(State::OpenSent),
                        ],
                    )
                }
            }
            Event::TcpConnectionFails => {
                peer.session.delay_open_timer_running = false;
                peer.session.increment_connect_retry_counter();
                (
                    State::Idle,
                    vec![
                        Action::StartTimer(
                            TimerKind::ConnectRetry,
                            crate::timer::jittered(Duration::from_secs(
                                crate::DEFAULT_CONNECT_RETRY_SECS,
                            )),
                        ),
                        Action::StopTimer(TimerKind::DelayOpen),
                        Action::CloseTransport,
                        Action::IncrementCounter,
                        Action::Transition(State::Idle),
                    ],
                )
            }
            Event::BgpHeaderErr(err) | Event::BgpOpenMsgErr(err) => {
                let notification = notification_for_decode_error(&err);
                (
                    State::Idle,
                    close_with_notification(peer, notification, State::Idle),
                )
            }
            Event::NotifMsgVerErr => (
                State::Idle,
                vec![
                    Action::StopTimer(TimerKind::ConnectRetry),
                    Action::StopTimer(TimerKind::DelayOpen),
                    Action::CloseTransport,
                    Action::Transition(State::Idle),
                ],
            ),
            _ => fsm_error(peer),
        },

        State::OpenSent => match event {
            Event::BgpOpen(open) => open_sent_on_bgp_open(peer, &open),
            Event::HoldTimerExpires => (
                State::Idle,
                close_with_notification(
                    peer,
                    Notification::simple(NotificationErrorCode::HoldTimerExpired, 0),
                    State::Idle,
                ),
            ),
            Event::TcpConnectionFails => (
                State::Active,
                vec![
                    Action::StartTimer(
                        TimerKind::ConnectRetry,
                        crate::timer::jittered(Duration::from_secs(
                            crate::DEFAULT_CONNECT_RETRY_SECS,
                        )),
                    ),
                    Action::OpenTransport { passive: true },
                    Action::Transition(State::Active),
                ],
            ),
            Event::NotifMsgVerErr => (
                State::Idle,
                vec![
                    Action::StopTimer(TimerKind::ConnectRetry),
                    Action::CloseTransport,
                    Action::Transition(State::Idle),
                ],
            ),
            Event::BgpHeaderErr(err) | Event::BgpOpenMsgErr(err) => {
                let notification = notification_for_decode_error(&err);
                (
                    State::Idle,
                    close_with_notification(peer, notification, State::Idle),
                )
            }
            _ => fsm_error(peer),
        },

        State::OpenConfirm => match event {
            Event::KeepAliveMsg => {
                // Spec.md Section 8: ConnectRetryCounter resets to zero on
                // ManualStop and on successful entry to Established.
                peer.session.reset_on_start_stop();
                let mut actions = vec![Action::ResetCounter];
                if let Some(hold) = peer.session.negotiated_hold_time {
                    if hold != 0 {
                        actions.push(Action::StartTimer(
                            TimerKind::Hold,
                            Duration::from_secs(u64::from(hold)),
                        ));
                    }
                }
                actions.push(Action::Transition(State::Established));
                (State::Established, actions)
            }
            Event::KeepaliveTimerExpires => {
                let mut actions = vec![Action::SendMessage(Message::Keepalive)];
                if let Some(hold) = peer.session.negotiated_hold_time {
                    actions.push(Action::StartTimer(
                        TimerKind::Keepalive,
                        crate::timer::jittered(Duration::from_secs(u64::from(hold) / 3)),
                    ));
                }
                actions.push(Action::Transition(State::OpenConfirm));
                (State::OpenConfirm, actions)
            }
            Event::HoldTimerExpires => (
                State::Idle,
                close_with_notification(
                    peer,
                    Notification::simple(NotificationErrorCode::HoldTimerExpired, 0),
                    State::Idle,
                ),
            ),
            Event::NotifMsg(_) | Event::TcpConnectionFails => (
                State::Idle,
                vec![
                    Action::StopTimer(TimerKind::ConnectRetry),
                    Action::StopTimer(TimerKind::Hold),
                    Action::StopTimer(TimerKind::Keepalive),
                    Action::CloseTransport,
                    Action::Transition(State::Idle),
                ],
            ),
            Event::OpenCollisionDump => (
                State::Idle,
                close_with_notification(
                    peer,
                    Notification::simple(
                        NotificationErrorCode::Cease,
                        CeaseSubcode::ConnectionCollisionResolution as u8,
                    ),
                    State::Idle,
                ),
            ),
            _ => fsm_error(peer),
        },

        State::Established => match event {
            Event::KeepAliveMsg => {
                let mut actions = vec![];
                if let Some(hold) = peer.session.negotiated_hold_time {
                    if hold != 0 {
                        actions.push(Action::StartTimer(
                            TimerKind::Hold,
                            Duration::from_secs(u64::from(hold)),
                        ));
                    }
                }
                actions.push(Action::Transition(State::Established));
                (State::Established, actions)
            }
            Event::UpdateMsg(update) => {
                let mut actions = vec![];
                if let Some(hold) = peer.session.negotiated_hold_time {
                    if hold != 0 {
                        actions.push(Action::StartTimer(
                            TimerKind::Hold,
                            Duration::from_secs(u64::from(hold)),
                        ));
                    }
                }
                actions.push(Action::Log(format!(
                    "update: {} withdrawn, {} attributes, {} nlri",
                    update.withdrawn_routes.len(),
                    update.path_attributes.len(),
                    update.nlri.len()
                )));
                actions.push(Action::Transition(State::Established));
                (State::Established, actions)
            }
            Event::UpdateMsgErr(err) => {
                let notification = notification_for_decode_error(&err);
                (
                    State::Idle,
                    close_with_notification(peer, notification, State::Idle),
                )
            }
            Event::KeepaliveTimerExpires => {
                let mut actions = vec![Action::SendMessage(Message::Keepalive)];
                if let Some(hold) = peer.session.negotiated_hold_time {
                    if hold != 0 {
                        actions.push(Action::StartTimer(
                            TimerKind::Keepalive,
                            crate::timer::jittered(Duration::from_secs(u64::from(hold) / 3)),
                        ));
                    }
                }
                actions.push(Action::Transition(State::Established));
                (State::Established, actions)
            }
            Event::HoldTimerExpires => (
                State::Idle,
                close_with_notification(
                    peer,
                    Notification::simple(NotificationErrorCode::HoldTimerExpired, 0),
                    State::Idle,
                ),
            ),
            Event::NotifMsg(_) | Event::TcpConnectionFails => (
                State::Idle,
                vec![
                    Action::StopTimer(TimerKind::Hold),
                    Action::StopTimer(TimerKind::Keepalive),
                    Action::CloseTransport,
                    Action::Transition(State::Idle),
                ],
            ),
            _ => fsm_error(peer),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{PeerConfig, PeerOptions};

    fn peer() -> Peer {
        Peer::new(PeerConfig {
            local_as: 1,
            remote_as: 2,
            remote_addr: "10.0.0.2".parse().unwrap(),
            local_bgp_id: "10.0.0.1".parse().unwrap(),
            hold_time: 90,
            options: PeerOptions::default(),
        })
    }

    #[test]
    fn idle_ignores_non_start_events() {
        let mut p = peer();
        let (next, actions) = step(State::Idle, Event::KeepAliveMsg, &mut p);
        assert_eq!(next, State::Idle);
        assert_eq!(actions.len(), 1); // just a log
    }

    #[test]
    fn manual_start_moves_to_connect_and_dials() {
        let mut p = peer();
        let (next, actions) = step(State::Idle, Event::ManualStart, &mut p);
        assert_eq!(next, State::Connect);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::OpenTransport { passive: false })));
    }

    #[test]
    fn passive_start_moves_to_active() {
        let mut p = peer();
        let (next, _) = step(State::Idle, Event::ManualStartWithPassiveTcpEstablishment, &mut p);
        assert_eq!(next, State::Active);
    }

    #[test]
    fn negotiates_min_hold_time_on_open() {
        let mut p = peer();
        let open = Open::new(2, 30, "10.0.0.2".parse().unwrap());
        let (next, actions) = step(State::OpenSent, Event::BgpOpen(open), &mut p);
        assert_eq!(next, State::OpenConfirm);
        assert_eq!(p.session.negotiated_hold_time, Some(30));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::InstallNegotiated { hold_time: 30 })));
        assert!(actions.iter().any(|a| matches!(a, Action::SendMessage(Message::Keepalive))));
    }

    #[test]
    fn zero_hold_time_disables_timers() {
        let mut p = peer();
        let open = Open::new(2, 0, "10.0.0.2".parse().unwrap());
        let (_, actions) = step(State::OpenSent, Event::BgpOpen(open), &mut p);
        assert_eq!(p.session.negotiated_hold_time, Some(0));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, Action::StartTimer(TimerKind::Keepalive, _))));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::StopTimer(TimerKind::Hold))));
    }

    #[test]
    fn keepalive_in_open_confirm_reaches_established() {
        let mut p = peer();
        p.session.negotiated_hold_time = Some(90);
        let (next, actions) = step(State::OpenConfirm, Event::KeepAliveMsg, &mut p);
        assert_eq!(next, State::Established);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::StartTimer(TimerKind::Hold, d) if *d == Duration::from_secs(90))));
    }

    #[test]
    fn entering_established_resets_connect_retry_counter() {
        let mut p = peer();
        p.session.negotiated_hold_time = Some(90);
        p.session.connect_retry_counter = 4;
        let (next, _) = step(State::OpenConfirm, Event::KeepAliveMsg, &mut p);
        assert_eq!(next, State::Established);
        assert_eq!(p.session.connect_retry_counter, 0);
    }

    #[test]
    fn hold_timer_expiry_in_established_tears_down() {
        let mut p = peer();
        p.session.negotiated_hold_time = Some(90);
        let (next, actions) = step(State::Established, Event::HoldTimerExpires, &mut p);
        assert_eq!(next, State::Idle);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendMessage(Message::Notification(n)) if n.error_code == NotificationErrorCode::HoldTimerExpired
        )));
        assert_eq!(p.session.connect_retry_counter, 1);
    }

    #[test]
    fn unexpected_event_in_established_is_fsm_error() {
        let mut p = peer();
        let (next, actions) = step(State::Established, Event::TcpCrAcked, &mut p);
        assert_eq!(next, State::Idle);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendMessage(Message::Notification(n)) if n.error_code == NotificationErrorCode::FiniteStateMachineError
        )));
        assert_eq!(p.session.connect_retry_counter, 1);
    }

    #[test]
    fn manual_stop_from_any_state_resets_counter() {
        let mut p = peer();
        p.session.connect_retry_counter = 5;
        let (next, actions) = step(State::Established, Event::ManualStop, &mut p);
        assert_eq!(next, State::Idle);
        assert_eq!(p.session.connect_retry_counter, 0);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendMessage(Message::Notification(n)) if n.error_code == NotificationErrorCode::Cease
        )));
    }

    #[test]
    fn open_collision_dump_in_open_confirm_sends_cease() {
        let mut p = peer();
        let (next, actions) = step(State::OpenConfirm, Event::OpenCollisionDump, &mut p);
        assert_eq!(next, State::Idle);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendMessage(Message::Notification(n)) if n.error_code == NotificationErrorCode::Cease
        )));
    }

    #[test]
    fn open_message_error_in_connect_tears_down_and_counts() {
        let mut p = peer();
        let err = wire::Error::BadPeerAs(99);
        let (next, actions) = step(State::Connect, Event::BgpOpenMsgErr(err), &mut p);
        assert_eq!(next, State::Idle);
        assert_eq!(p.session.connect_retry_counter, 1);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendMessage(Message::Notification(n)) if n.error_code == NotificationErrorCode::OpenMessageError
        )));
    }
}

//! `bgpcore` -- the speaker-side engine of BGP-4 (RFC 4271).
//!
//! This crate implements the three parts that make up a BGP speaker's hard
//! engineering: the finite state machine ([`fsm`]), the wire codec
//! ([`bgp`]), and the per-peer session runtime ([`session`]). The process
//! that owns a listener and a collection of peers lives in [`speaker`]; the
//! routing information base is an external collaborator reached only
//! through the [`rib`] trait.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod bgp;
pub mod fsm;
pub mod peer;
pub mod rib;
pub mod session;
pub mod speaker;
pub mod timer;
pub mod wire;

pub use bgp::{Codec, Error as WireError, Message, Notification, Open, Update};
pub use fsm::{Event, State};
pub use peer::{PeerConfig, PeerOptions};
pub use speaker::Speaker;

/// The 16-octet BGP marker. RFC 4271 permits an authentication scheme to
/// give it another value; this speaker implements no such scheme so it is
/// always all-ones.
pub const MARKER: [u8; 16] = [0xff; 16];

/// Supported BGP version.
pub const BGP_VERSION: u8 = 4;

/// Minimum total message length, header included.
pub const MIN_MESSAGE_LENGTH: u16 = 19;

/// Maximum total message length, header included.
pub const MAX_MESSAGE_LENGTH: u16 = 4096;

/// Minimum total length of an OPEN message.
pub const MIN_OPEN_LENGTH: u16 = 29;

/// Minimum total length of an UPDATE message.
pub const MIN_UPDATE_LENGTH: u16 = 23;

/// Minimum total length of a NOTIFICATION message.
pub const MIN_NOTIFICATION_LENGTH: u16 = 21;

/// Exact total length of a KEEPALIVE message.
pub const KEEPALIVE_LENGTH: u16 = 19;

/// TCP port BGP speaks on.
pub const BGP_PORT: u16 = 179;

/// Default hold time, in seconds, used before negotiation (RFC 4271 4.2:
/// "Large" initial hold time).
pub const LARGE_HOLD_TIME_SECS: u64 = 4 * 60;

/// Default `ConnectRetryTimer` duration, in seconds.
pub const DEFAULT_CONNECT_RETRY_SECS: u64 = 120;

/// Default `IdleHoldTime`, in seconds, when `DampPeerOscillations` is set.
pub const DEFAULT_IDLE_HOLD_SECS: u64 = 60;

/// Default `DelayOpenTime`, in seconds.
pub const DEFAULT_DELAY_OPEN_SECS: u64 = 5;

/// Minimum spacing between two KEEPALIVE messages on one connection.
pub const MIN_KEEPALIVE_SPACING_SECS: u64 = 1;

/// Default `MinRouteAdvertisementInterval` for EBGP peers, in seconds.
pub const DEFAULT_MRAI_EBGP_SECS: u64 = 30;

/// Default `MinRouteAdvertisementInterval` for IBGP peers, in seconds.
pub const DEFAULT_MRAI_IBGP_SECS: u64 = 5;

/// Default `MinASOriginationInterval`, in seconds.
pub const DEFAULT_MIN_AS_ORIGINATION_SECS: u64 = 15;

/// Check if `src` has exactly `len` bytes remaining, otherwise describe the
/// mismatch as a length error tagged with `name`.
#[macro_export]
macro_rules! check_remaining_len {
    ($src:expr, $len:expr, $name:expr) => {{
        let cmp = $src.remaining().cmp(&$len);
        match cmp {
            std::cmp::Ordering::Equal => {}
            _ => return Err($crate::wire::Error::InternalLength($name, cmp)),
        }
    }};
}

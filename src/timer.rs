//! A restartable one-shot timer (spec.md Section 9): `new`, `reset`, `stop`,
//! `running`, with no ambient global scheduler -- each timer owns its own
//! sleeping task and reports expiry by sending an event, mirroring the way
//! the teacher's session runtime feeds FSM-relevant happenings through a
//! channel (`tokio::sync::broadcast` in `session.rs`; here `mpsc`, since
//! exactly one consumer -- the per-peer dispatcher -- drains it).

// SPDX-License-Identifier: AGPL-3.0-or-later

use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Multiply `duration` by a factor drawn uniformly from `[0.75, 1.0]`
/// (spec.md Section 4.2: jitter on ConnectRetry, Keepalive, DelayOpen, and
/// MinRouteAdvertisement timers).
#[must_use]
pub fn jittered(duration: Duration) -> Duration {
    let factor: f64 = rand::rng().random_range(0.75..=1.0);
    duration.mul_f64(factor)
}

/// A one-shot timer that, when it fires, sends a fixed event value to an
/// `mpsc` channel. Resetting cancels any pending fire and restarts the
/// countdown; stopping is idempotent.
///
/// Not generic over the event type itself -- only `reset` is, since the
/// running timer owns nothing but a `JoinHandle` and the same `Timer` is
/// reused across resets that may target differently-typed channels (the
/// session runtime's `Timers` struct holds one per `TimerKind`, all firing
/// into the same `Event` channel, but nothing here requires that).
#[derive(Default)]
pub struct Timer {
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// Create a stopped timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a fire currently scheduled?
    #[must_use]
    pub fn running(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancel any pending fire. Safe to call on an already-stopped timer.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Cancel any pending fire and schedule a new one `duration` from now;
    /// when it elapses, `event` is sent on `tx`.
    pub fn reset<E: Send + 'static>(
        &mut self,
        duration: Duration,
        tx: mpsc::UnboundedSender<E>,
        event: E,
    ) {
        self.stop();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(event);
        }));
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_bounds() {
        let base = Duration::from_secs(120);
        for _ in 0..1000 {
            let d = jittered(base);
            assert!(d >= base.mul_f64(0.75));
            assert!(d <= base);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new();
        assert!(!timer.running());
        timer.reset(Duration::from_secs(5), tx, "fired");
        assert!(timer.running());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(rx.recv().await, Some("fired"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new();
        timer.reset(Duration::from_secs(5), tx.clone(), "first");
        tokio::time::advance(Duration::from_secs(2)).await;
        timer.reset(Duration::from_secs(5), tx, "second");
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(rx.recv().await, Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_prevents_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new();
        timer.reset(Duration::from_secs(5), tx, "fired");
        timer.stop();
        timer.stop();
        assert!(!timer.running());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected));
    }
}

//! Idle re-lock timer.
//!
//! The host owns the clock; the timer only hands out tickets. Every
//! (re)schedule bumps the generation, so a firing that carries an older ticket
//! is recognised as cancelled and ignored.

use crate::host::DocumentHost;
use std::time::Duration;
use tracing::trace;

/// Token passed to the host with a deferred task and echoed back on fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTicket(u64);

impl TimerTicket {
    pub fn from_value(value: u64) -> Self {
        Self(value)
    }

    /// Raw generation, for hosts that need to store it.
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Per-document idle timer.
#[derive(Debug)]
pub struct IdleTimer {
    generation: u64,
    armed: bool,
    delay: Duration,
}

impl IdleTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            generation: 0,
            armed: false,
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a schedule is outstanding.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Retire any pending firing and schedule a fresh one.
    pub fn cancel_and_reschedule(&mut self, host: &mut dyn DocumentHost) -> TimerTicket {
        self.generation += 1;
        self.armed = true;
        let ticket = TimerTicket(self.generation);
        trace!(ticket = ticket.0, delay = ?self.delay, "Idle timer rescheduled");
        host.schedule_deferred(self.delay, ticket);
        ticket
    }

    /// Retire any pending firing.
    pub fn cancel(&mut self) {
        if self.armed {
            trace!(ticket = self.generation, "Idle timer cancelled");
        }
        self.generation += 1;
        self.armed = false;
    }

    /// Consume a firing. Returns `true` only for the newest outstanding ticket.
    pub fn fire(&mut self, ticket: TimerTicket) -> bool {
        if self.armed && ticket.0 == self.generation {
            self.armed = false;
            true
        } else {
            trace!(ticket = ticket.0, current = self.generation, "Ignoring stale timer");
            false
        }
    }
}

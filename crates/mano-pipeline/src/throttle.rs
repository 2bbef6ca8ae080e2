//! Request throttling.
//!
//! At most one classification request may be outstanding, and a new one may
//! only start once the cooldown has passed since the previous dispatch.
//! Frames that are not admitted are dropped by the caller, never queued.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Cooldown between dispatches when none is configured.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);

/// Why a frame was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A request is still outstanding
    InFlight,
    /// The last dispatch was too recent
    CoolingDown { remaining: Duration },
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InFlight => "in_flight",
            RejectReason::CoolingDown { .. } => "cooling_down",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InFlight => write!(f, "request in flight"),
            RejectReason::CoolingDown { remaining } => {
                write!(f, "cooling down for {}ms", remaining.as_millis())
            }
        }
    }
}

/// Proof that a dispatch was admitted.
///
/// Carries the admission instant; it does not release anything on drop.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an admitted request must be dispatched"]
pub struct Permit {
    admitted_at: Instant,
}

impl Permit {
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted(Permit),
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// Single-flight, cooldown-gated admission control.
///
/// Owned by one controller and mutated only from its task, so no locking.
#[derive(Debug, Clone)]
pub struct RequestThrottler {
    cooldown: Duration,
    last_dispatch: Option<Instant>,
    in_flight: bool,
}

impl RequestThrottler {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_dispatch: None,
            in_flight: false,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_dispatch(&self) -> Option<Instant> {
        self.last_dispatch
    }

    pub fn try_admit(&mut self) -> Admission {
        self.try_admit_at(Instant::now())
    }

    /// Admit a dispatch at `now` if nothing is in flight and the cooldown
    /// since the last dispatch has elapsed.
    pub fn try_admit_at(&mut self, now: Instant) -> Admission {
        if self.in_flight {
            return Admission::Rejected(RejectReason::InFlight);
        }

        if let Some(last) = self.last_dispatch {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cooldown {
                return Admission::Rejected(RejectReason::CoolingDown {
                    remaining: self.cooldown - elapsed,
                });
            }
        }

        self.in_flight = true;
        self.last_dispatch = Some(now);
        Admission::Admitted(Permit { admitted_at: now })
    }

    /// Mark the outstanding request as finished. The cooldown keeps running
    /// from the dispatch time.
    pub fn release(&mut self) {
        self.in_flight = false;
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.last_dispatch = None;
        self.in_flight = false;
    }
}

impl Default for RequestThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

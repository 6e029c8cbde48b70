//! Two-step logout confirmation.
//!
//! A first click arms the logout. A second click while armed logs out. Left
//! alone, an armed logout fades back through two disarming stages before it
//! is fully disarmed again. Every transition is computed from an explicit
//! instant, so the machine itself never sleeps.

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutState {
    Disarmed,
    Armed,
    DisarmingYellow,
    DisarmingGreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click armed (or re-armed) the logout.
    Armed,
    /// The click confirmed the logout.
    Logout,
}

#[derive(Debug, Clone)]
pub struct LogoutConfirm {
    state: LogoutState,
    since: Instant,
    arm: Duration,
    fade: Duration,
}

impl LogoutConfirm {
    pub fn new(arm: Duration, fade: Duration) -> Self {
        Self {
            state: LogoutState::Disarmed,
            since: Instant::now(),
            arm,
            fade,
        }
    }

    pub fn state(&self) -> LogoutState {
        self.state
    }

    pub fn click(&mut self, now: Instant) -> ClickOutcome {
        self.advance(now);
        if self.state == LogoutState::Armed {
            self.state = LogoutState::Disarmed;
            self.since = now;
            ClickOutcome::Logout
        } else {
            self.state = LogoutState::Armed;
            self.since = now;
            ClickOutcome::Armed
        }
    }

    /// Apply every timed transition due by `now`.
    pub fn advance(&mut self, now: Instant) -> LogoutState {
        while let Some(deadline) = self.next_deadline() {
            if now < deadline {
                break;
            }
            self.state = match self.state {
                LogoutState::Armed => LogoutState::DisarmingYellow,
                LogoutState::DisarmingYellow => LogoutState::DisarmingGreen,
                LogoutState::DisarmingGreen | LogoutState::Disarmed => LogoutState::Disarmed,
            };
            self.since = deadline;
        }
        self.state
    }

    /// When the next timed transition happens, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            LogoutState::Disarmed => None,
            LogoutState::Armed => Some(self.since + self.arm),
            LogoutState::DisarmingYellow | LogoutState::DisarmingGreen => {
                Some(self.since + self.fade)
            }
        }
    }

    pub fn title(&self, username: &str) -> String {
        match self.state {
            LogoutState::Armed => "Click again to logout".into(),
            LogoutState::DisarmingYellow | LogoutState::DisarmingGreen => {
                "Disarming logout...".into()
            }
            LogoutState::Disarmed => username.into(),
        }
    }

    /// Whether the warning marker is visible. It lingers through the first
    /// disarm stage so it can fade out.
    pub fn shows_warning(&self) -> bool {
        matches!(
            self.state,
            LogoutState::Armed | LogoutState::DisarmingYellow
        )
    }
}

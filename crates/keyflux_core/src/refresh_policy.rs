use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RefreshPolicy {
    #[default]
    Manual,
    Interval {
        every_secs: u32,
    },
}

impl RefreshPolicy {
    /// Builds a policy from a seconds value where `0` means manual.
    pub fn from_secs(secs: u32) -> Self {
        if secs == 0 {
            RefreshPolicy::Manual
        } else {
            RefreshPolicy::Interval { every_secs: secs }
        }
    }

    pub fn every_secs(self) -> Option<u32> {
        match self {
            RefreshPolicy::Manual => None,
            RefreshPolicy::Interval { every_secs: 0 } => None,
            RefreshPolicy::Interval { every_secs } => Some(every_secs),
        }
    }

    pub fn duration(self) -> Option<Duration> {
        self.every_secs()
            .map(|secs| Duration::from_secs(secs as u64))
    }

    pub fn is_auto(self) -> bool {
        self.every_secs().is_some()
    }

    pub fn label(self) -> &'static str {
        match self {
            RefreshPolicy::Manual => "Off",
            RefreshPolicy::Interval { every_secs: 5 } => "5s",
            RefreshPolicy::Interval { every_secs: 10 } => "10s",
            RefreshPolicy::Interval { every_secs: 30 } => "30s",
            RefreshPolicy::Interval { every_secs: 60 } => "60s",
            RefreshPolicy::Interval { .. } => "Custom",
        }
    }
}

/// Timer state for auto-refresh, advanced by the control loop's ticks.
///
/// A tick that arrives late fires once and re-arms from that tick; missed
/// intervals are not replayed.
#[derive(Debug, Clone, Default)]
pub struct RefreshSchedule {
    policy: RefreshPolicy,
    next_due: Option<Instant>,
}

impl RefreshSchedule {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            next_due: None,
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: RefreshPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.next_due = None;
        }
    }

    /// Restarts the interval from `now`.
    pub fn reset(&mut self, now: Instant) {
        self.next_due = self.policy.duration().map(|every| now + every);
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns `true` when a refresh is due at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(every) = self.policy.duration() else {
            self.next_due = None;
            return false;
        };

        match self.next_due {
            None => {
                self.next_due = Some(now + every);
                false
            }
            Some(due) if now >= due => {
                self.next_due = Some(now + every);
                true
            }
            Some(_) => false,
        }
    }
}

use std::time::Duration;

use rst_common::with_tokio::tokio::time::Instant;

/// `Remaining` is the time budget left before a conversation dies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Remaining {
    Unbounded,
    Left(Duration),
    Expired,
}

/// `Deadline` keeps the `die_timestamp` of a conversation, computed as
/// `now + time_to_live` when the conversation starts
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    die_at: Option<Instant>,
}

impl Deadline {
    /// A TTL too large to be represented as an instant leaves the deadline unbounded
    pub fn start(&mut self, ttl: Option<Duration>) {
        self.die_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
    }

    pub fn clear(&mut self) {
        self.die_at = None;
    }

    pub fn die_at(&self) -> Option<Instant> {
        self.die_at
    }

    pub fn remaining(&self) -> Remaining {
        match self.die_at {
            None => Remaining::Unbounded,
            Some(die_at) => {
                let now = Instant::now();
                if now >= die_at {
                    Remaining::Expired
                } else {
                    Remaining::Left(die_at - now)
                }
            }
        }
    }

    /// `budget` normalizes the remaining time into a wait timeout, an unbounded
    /// deadline falls back to `fallback`. Returns `None` once expired
    pub fn budget(&self, fallback: Duration) -> Option<Duration> {
        match self.remaining() {
            Remaining::Unbounded => Some(fallback),
            Remaining::Left(left) => Some(left),
            Remaining::Expired => None,
        }
    }

    /// `ttl` is the remaining time as a registration TTL, `None` means no deadline
    pub fn ttl(&self) -> Option<Duration> {
        match self.remaining() {
            Remaining::Left(left) => Some(left),
            Remaining::Expired => Some(Duration::ZERO),
            Remaining::Unbounded => None,
        }
    }
}

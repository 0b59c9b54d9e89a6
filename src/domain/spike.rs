// Spike cooldown state machine
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CooldownState {
    /// No alert write outstanding.
    Ready { last_spike_at: Option<DateTime<Utc>> },
    /// An alert claimed at `claimed_at` is being persisted.
    InFlight {
        claimed_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    },
}

/// Tracks when the last spike alert was persisted.
///
/// A claim holds the cooldown while the write is outstanding. Only a confirmed
/// write moves `last_spike_at`; a released claim restores the previous state so
/// the next qualifying sample may retry.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeCooldown {
    state: CooldownState,
    cooldown: Duration,
}

impl SpikeCooldown {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: CooldownState::Ready {
                last_spike_at: None,
            },
            cooldown,
        }
    }

    /// Claim the right to write a spike alert at `now`.
    pub fn try_claim(&mut self, now: DateTime<Utc>) -> bool {
        let CooldownState::Ready { last_spike_at } = self.state else {
            return false;
        };

        let expired = last_spike_at.is_none_or(|last| now - last > self.cooldown);
        if expired {
            self.state = CooldownState::InFlight {
                claimed_at: now,
                previous: last_spike_at,
            };
        }
        expired
    }

    pub fn confirm(&mut self) {
        if let CooldownState::InFlight { claimed_at, .. } = self.state {
            self.state = CooldownState::Ready {
                last_spike_at: Some(claimed_at),
            };
        }
    }

    pub fn release(&mut self) {
        if let CooldownState::InFlight { previous, .. } = self.state {
            self.state = CooldownState::Ready {
                last_spike_at: previous,
            };
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, CooldownState::InFlight { .. })
    }

    #[cfg(test)]
    pub fn state(&self) -> CooldownState {
        self.state
    }

    pub fn last_spike_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            CooldownState::Ready { last_spike_at } => last_spike_at,
            CooldownState::InFlight { previous, .. } => previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    #[test]
    fn test_first_spike_is_always_claimable() {
        let mut cooldown = SpikeCooldown::new(ms(5000));
        assert!(cooldown.try_claim(t0()));
        assert!(matches!(cooldown.state(), CooldownState::InFlight { .. }));
    }

    #[test]
    fn test_cooldown_suppresses_until_strictly_elapsed() {
        let mut cooldown = SpikeCooldown::new(ms(5000));
        let attempts = [0, 1000, 6000]
            .into_iter()
            .filter(|offset| {
                let claimed = cooldown.try_claim(t0() + ms(*offset));
                if claimed {
                    cooldown.confirm();
                }
                claimed
            })
            .count();
        assert_eq!(attempts, 2);
        assert_eq!(cooldown.last_spike_at(), Some(t0() + ms(6000)));

        // Exactly the cooldown apart is still inside it
        assert!(!cooldown.try_claim(t0() + ms(11_000)));
        assert!(cooldown.try_claim(t0() + ms(11_001)));
    }

    #[test]
    fn test_in_flight_claim_blocks_others() {
        let mut cooldown = SpikeCooldown::new(ms(5000));
        assert!(cooldown.try_claim(t0()));
        assert!(cooldown.is_in_flight());
        assert!(!cooldown.try_claim(t0()));
        assert!(!cooldown.try_claim(t0() + ms(60_000)));
    }

    #[test]
    fn test_release_restores_previous_and_allows_retry() {
        let mut cooldown = SpikeCooldown::new(ms(5000));
        assert!(cooldown.try_claim(t0()));
        cooldown.confirm();

        assert!(cooldown.try_claim(t0() + ms(7000)));
        cooldown.release();
        assert_eq!(cooldown.last_spike_at(), Some(t0()));

        assert!(cooldown.try_claim(t0() + ms(8000)));
        cooldown.confirm();
        assert_eq!(cooldown.last_spike_at(), Some(t0() + ms(8000)));
    }

    #[test]
    fn test_confirm_and_release_without_claim_are_noops() {
        let mut cooldown = SpikeCooldown::new(ms(5000));
        cooldown.confirm();
        cooldown.release();
        assert_eq!(
            cooldown.state(),
            CooldownState::Ready {
                last_spike_at: None
            }
        );
    }
}

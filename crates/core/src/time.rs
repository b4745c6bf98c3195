use chrono::{DateTime, Duration, Utc};

/// Wall-clock source for session timestamps.
///
/// Per-question timing uses the host page's virtual milliseconds instead; this
/// clock only stamps persisted records.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// Moves a fixed clock forward. System clocks ignore this.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(at) = self {
            *at += delta;
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Renders remaining milliseconds as `m:ss`, rounding partial seconds up.
#[must_use]
pub fn format_countdown(remaining_ms: u64) -> String {
    let seconds = remaining_ms.div_ceil(1_000);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_rounds_partial_seconds_up() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(4_001), "0:05");
        assert_eq!(format_countdown(60_000), "1:00");
        assert_eq!(format_countdown(299_500), "5:00");
    }

    #[test]
    fn fixed_clock_advances_and_system_clock_does_not_panic() {
        let mut clock = fixed_clock();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), fixed_now() + Duration::minutes(5));

        let mut system = Clock::System;
        system.advance(Duration::minutes(5));
        assert!(!system.is_fixed());
    }
}

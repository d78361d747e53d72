use chrono::{Local, NaiveDate};

use crate::ports::Clock;

// ============== Emoji ==============

pub const HUH: &str = "🤨";
pub const KISS: &str = "😘";
pub const HII: &str = "🙋";

// ============== Clocks ==============

/// Local wall-clock date.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen on one date (tests, replays).
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Truncate `text` to at most `max` chars, appending `...` when cut.
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(20);
        assert_eq!(truncate_text(&s, 5), "aaaaa...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn fixed_clock_returns_its_date() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(FixedClock(d).today(), d);
    }
}

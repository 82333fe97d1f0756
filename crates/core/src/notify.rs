//! Classification of the trade-notification ticker text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The ticker shows the wall clock (HH:MM:SS) while no order update is
/// pending; such text carries no verdict and should be polled past.
static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(2[0-3]|[01]?[0-9]):([0-5][0-9]):([0-5][0-9])\b")
        .expect("clock time regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Success,
    Fail,
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Success => f.write_str("success"),
            TradeStatus::Fail => f.write_str("fail"),
        }
    }
}

/// What one reading of the ticker means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Still showing the clock; poll again.
    Clock,
    Status(TradeStatus),
    /// Text matches neither the clock nor a known order verdict.
    /// Callers surface this, they do not guess.
    Unrecognized,
}

/// Classify one ticker reading. `rejected_label` wins over `filled_label`
/// when both appear in the text (a rejection notice may quote the order).
pub fn classify(text: &str, rejected_label: &str, filled_label: &str) -> NotificationKind {
    if CLOCK_TIME.is_match(text) {
        return NotificationKind::Clock;
    }
    if text.contains(rejected_label) {
        return NotificationKind::Status(TradeStatus::Fail);
    }
    if text.contains(filled_label) {
        return NotificationKind::Status(TradeStatus::Success);
    }
    NotificationKind::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_text_is_skipped() {
        assert_eq!(classify("14:05:33", "Rejected", "Filled"), NotificationKind::Clock);
        assert_eq!(classify("as of 9:05:03 ET", "Rejected", "Filled"), NotificationKind::Clock);
    }

    #[test]
    fn test_invalid_clock_is_not_skipped() {
        // 25:61:61 is not a wall-clock time; falls through to classification.
        assert_eq!(
            classify("25:61:61", "Rejected", "Filled"),
            NotificationKind::Unrecognized
        );
    }

    #[test]
    fn test_filled_maps_to_success() {
        assert_eq!(
            classify("Buy 1 MNQ SEP25 Filled @ 18350.75", "Rejected", "Filled"),
            NotificationKind::Status(TradeStatus::Success)
        );
    }

    #[test]
    fn test_rejected_maps_to_fail() {
        assert_eq!(
            classify("Order Rejected: insufficient margin", "Rejected", "Filled"),
            NotificationKind::Status(TradeStatus::Fail)
        );
    }

    #[test]
    fn test_rejected_wins_over_filled() {
        assert_eq!(
            classify("Rejected: would have been Filled", "Rejected", "Filled"),
            NotificationKind::Status(TradeStatus::Fail)
        );
    }

    #[test]
    fn test_unknown_text() {
        assert_eq!(
            classify("Connection restored", "Rejected", "Filled"),
            NotificationKind::Unrecognized
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TradeStatus::Success.to_string(), "success");
        assert_eq!(TradeStatus::Fail.to_string(), "fail");
    }
}

use serde::{Deserialize, Serialize};

/// One reading of the quote panel for the active instrument tab.
///
/// Labels are kept verbatim next to their values so a consumer can verify
/// it is looking at the row it thinks it is (the panel order is positional,
/// the labels are the only self-description the page offers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub future_code: String,
    pub future_series_name: String,
    pub last_label: String,
    pub last_price: f64,
    /// Signed change since prior close, verbatim (e.g. "-12.25 (-0.07%)").
    pub price_change: String,
    pub bid_label: String,
    pub bid_price: f64,
    pub bid_volume: i64,
    pub ask_label: String,
    pub ask_price: f64,
    pub ask_volume: i64,
    pub position_label: String,
    /// Open position size. 0 when flat.
    pub contract_volume: i64,
    /// Average entry price of the open position. 0.0 when flat.
    pub cost_price: f64,
}

/// Name and refresh time of the currently active instrument tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTab {
    pub name: String,
    pub refresh_time: String,
}

impl ActiveTab {
    /// Tab captions render as "<name> <refresh time>"; the name itself may
    /// contain spaces, the refresh time never does, so split on the last one.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once(' ') {
            Some((name, refresh_time)) => Self {
                name: name.to_string(),
                refresh_time: refresh_time.to_string(),
            },
            None => Self {
                name: text.to_string(),
                refresh_time: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_tab_splits_on_last_space() {
        let tab = ActiveTab::parse("MNQ SEP25 10:31:05");
        assert_eq!(tab.name, "MNQ SEP25");
        assert_eq!(tab.refresh_time, "10:31:05");
    }

    #[test]
    fn test_active_tab_without_refresh_time() {
        let tab = ActiveTab::parse("MNQ");
        assert_eq!(tab.name, "MNQ");
        assert_eq!(tab.refresh_time, "");
    }
}

//! Portal configuration and its guard rails.

use std::time::Duration;

use log::warn;

/// Due-detection stays correct only while the poll interval is at most one
/// minute; anything longer could skip a minute boundary entirely.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub base_url: String,
    /// Trailing window of numeric sugar readings exposed for charting.
    pub trend_window: usize,
    /// Cadence of the reminder due-check.
    pub poll_interval: Duration,
    /// Remaining-stock level at or below which a non-blocking warning fires.
    pub low_stock_threshold: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            trend_window: 6,
            poll_interval: Duration::from_secs(30),
            low_stock_threshold: 2,
        }
    }
}

impl PortalConfig {
    /// The configured poll interval, clamped to the one-minute ceiling.
    pub fn effective_poll_interval(&self) -> Duration {
        if self.poll_interval > MAX_POLL_INTERVAL {
            warn!(
                "[CONFIG] poll interval {:?} exceeds the {:?} ceiling, clamping",
                self.poll_interval, MAX_POLL_INTERVAL
            );
            MAX_POLL_INTERVAL
        } else {
            self.poll_interval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PortalConfig, MAX_POLL_INTERVAL};
    use std::time::Duration;

    #[test]
    fn should_default_to_thirty_second_polling() {
        let config = PortalConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.trend_window, 6);
        assert_eq!(config.low_stock_threshold, 2);
    }

    #[test]
    fn should_clamp_poll_interval_to_one_minute() {
        let config = PortalConfig { poll_interval: Duration::from_secs(300), ..Default::default() };
        assert_eq!(config.effective_poll_interval(), MAX_POLL_INTERVAL);
    }
}

use std::time::Duration;

use serde::Deserialize;

use crate::utils::error::SettingsError;

/// Top-level configuration settings for the service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub tracker: TrackerSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

/// Defines the host and port the WebSocket server will bind to.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Timing policy for the status-reconciliation engine, in milliseconds.
///
/// The values must satisfy
/// `aggressive_sent_timeout < sweep_forced_sent_threshold < delivery_timeout < stale_record_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub aggressive_sent_timeout_ms: u64,
    pub delivery_timeout_ms: u64,
    pub sweep_period_ms: u64,
    pub sweep_forced_sent_threshold_ms: u64,
    pub stale_record_threshold_ms: u64,
}

/// Where the status history lives and how long entries are kept.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub path: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

impl TrackerSettings {
    pub fn aggressive_sent_timeout(&self) -> Duration {
        Duration::from_millis(self.aggressive_sent_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }

    pub fn sweep_forced_sent_threshold(&self) -> Duration {
        Duration::from_millis(self.sweep_forced_sent_threshold_ms)
    }

    pub fn stale_record_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_record_threshold_ms)
    }

    /// Checks the ordering between the timeouts and that the sweep runs at all.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.sweep_period_ms == 0 {
            return Err(SettingsError::TimeoutOrdering("sweep_period_ms > 0"));
        }
        if self.aggressive_sent_timeout_ms == 0 {
            return Err(SettingsError::TimeoutOrdering("aggressive_sent_timeout_ms > 0"));
        }
        if self.aggressive_sent_timeout_ms >= self.sweep_forced_sent_threshold_ms {
            return Err(SettingsError::TimeoutOrdering(
                "aggressive_sent_timeout_ms < sweep_forced_sent_threshold_ms",
            ));
        }
        if self.sweep_forced_sent_threshold_ms >= self.delivery_timeout_ms {
            return Err(SettingsError::TimeoutOrdering(
                "sweep_forced_sent_threshold_ms < delivery_timeout_ms",
            ));
        }
        if self.delivery_timeout_ms >= self.stale_record_threshold_ms {
            return Err(SettingsError::TimeoutOrdering(
                "delivery_timeout_ms < stale_record_threshold_ms",
            ));
        }
        Ok(())
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            aggressive_sent_timeout_ms: 3_000,
            delivery_timeout_ms: 60_000,
            sweep_period_ms: 5_000,
            sweep_forced_sent_threshold_ms: 4_000,
            stale_record_threshold_ms: 120_000,
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub tracker: Option<PartialTrackerSettings>,
    pub store: Option<PartialStoreSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialTrackerSettings {
    pub aggressive_sent_timeout_ms: Option<u64>,
    pub delivery_timeout_ms: Option<u64>,
    pub sweep_period_ms: Option<u64>,
    pub sweep_forced_sent_threshold_ms: Option<u64>,
    pub stale_record_threshold_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Overlays whatever was provided on top of `defaults`.
    pub fn merge_over(self, defaults: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let tracker = self.tracker.unwrap_or_default();
        let store = self.store.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
            },
            tracker: TrackerSettings {
                aggressive_sent_timeout_ms: tracker
                    .aggressive_sent_timeout_ms
                    .unwrap_or(defaults.tracker.aggressive_sent_timeout_ms),
                delivery_timeout_ms: tracker
                    .delivery_timeout_ms
                    .unwrap_or(defaults.tracker.delivery_timeout_ms),
                sweep_period_ms: tracker
                    .sweep_period_ms
                    .unwrap_or(defaults.tracker.sweep_period_ms),
                sweep_forced_sent_threshold_ms: tracker
                    .sweep_forced_sent_threshold_ms
                    .unwrap_or(defaults.tracker.sweep_forced_sent_threshold_ms),
                stale_record_threshold_ms: tracker
                    .stale_record_threshold_ms
                    .unwrap_or(defaults.tracker.stale_record_threshold_ms),
            },
            store: StoreSettings {
                path: store.path.unwrap_or(defaults.store.path),
                ttl_secs: store.ttl_secs.unwrap_or(defaults.store.ttl_secs),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            tracker: TrackerSettings::default(),
            store: StoreSettings {
                path: "smstrack_db".to_string(),
                ttl_secs: 86_400,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

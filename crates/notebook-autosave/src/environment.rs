//! Host environment probes used to tune save delays.
//!
//! Every probe is best effort. `None` means "unknown" and never triggers a
//! modifier.

use std::fmt;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// Coarse classification of the network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Fast,
    Slow,
    #[default]
    Unknown,
}

impl ConnectionQuality {
    /// Classify a browser-style effective connection type (`slow-2g`, `2g`, `3g`, `4g`).
    #[must_use]
    pub fn from_effective_type(effective_type: &str) -> Self {
        match effective_type.trim().to_ascii_lowercase().as_str() {
            "slow-2g" | "2g" => Self::Slow,
            "3g" | "4g" | "5g" | "wifi" | "ethernet" => Self::Fast,
            _ => Self::Unknown,
        }
    }
}

/// Device and network state consulted by the debounce.
pub trait Environment: Send + Sync + fmt::Debug {
    fn is_online(&self) -> bool;

    fn connection_quality(&self) -> ConnectionQuality;

    /// Number of logical cores, if known.
    fn hardware_concurrency(&self) -> Option<u32>;

    /// Installed memory in gigabytes, if known.
    fn device_memory_gb(&self) -> Option<f64>;

    /// Local hour of day (0-23), if known.
    fn current_hour(&self) -> Option<u32>;

    /// Whether the device should be treated as low performance.
    fn is_low_performance(&self) -> bool {
        self.hardware_concurrency().is_some_and(|cores| cores <= 2)
            || self.device_memory_gb().is_some_and(|gb| gb <= 2.0)
    }
}

/// Probes the machine the process runs on.
///
/// Reports online with unknown link quality; there is no portable way to
/// measure either without a network round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn is_online(&self) -> bool {
        true
    }

    fn connection_quality(&self) -> ConnectionQuality {
        ConnectionQuality::Unknown
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        std::thread::available_parallelism()
            .ok()
            .and_then(|n| u32::try_from(n.get()).ok())
    }

    fn device_memory_gb(&self) -> Option<f64> {
        None
    }

    fn current_hour(&self) -> Option<u32> {
        Some(chrono::Local::now().hour())
    }
}

/// Fixed environment values, for embedding hosts that already know them
/// and for tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticEnvironment {
    pub online: bool,
    pub connection: ConnectionQuality,
    pub hardware_concurrency: Option<u32>,
    pub device_memory_gb: Option<f64>,
    pub hour: Option<u32>,
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self {
            online: true,
            connection: ConnectionQuality::Unknown,
            hardware_concurrency: None,
            device_memory_gb: None,
            hour: None,
        }
    }
}

impl StaticEnvironment {
    #[must_use]
    pub fn offline() -> Self {
        Self {
            online: false,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionQuality) -> Self {
        self.connection = connection;
        self
    }

    #[must_use]
    pub fn with_hardware(mut self, cores: Option<u32>, memory_gb: Option<f64>) -> Self {
        self.hardware_concurrency = cores;
        self.device_memory_gb = memory_gb;
        self
    }

    #[must_use]
    pub fn with_hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour);
        self
    }
}

impl Environment for StaticEnvironment {
    fn is_online(&self) -> bool {
        self.online
    }

    fn connection_quality(&self) -> ConnectionQuality {
        self.connection
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        self.hardware_concurrency
    }

    fn device_memory_gb(&self) -> Option<f64> {
        self.device_memory_gb
    }

    fn current_hour(&self) -> Option<u32> {
        self.hour
    }
}

//! Explicit configuration for the [`crate::WaterTemp`] client.
//!
//! Everything that would otherwise be ambient state (endpoint URLs, the timezone the
//! weather APIs report in, how long cached responses stay valid, the retry policy)
//! lives in [`ClientConfig`] and is handed to the client when it is created.

use bon::Builder;
use std::time::Duration;

pub const DEFAULT_WATER_TEMP_URL: &str = "https://api.sodertalje.se/GETALLwatertemp";
pub const DEFAULT_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/ecmwf";
pub const DEFAULT_GEOCODING_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_TIMEZONE: &str = "Europe/Stockholm";

/// Settings shared by every request the client makes.
///
/// Build one with [`ClientConfig::builder`]; every field has a default, so
/// `ClientConfig::builder().build()` (or [`ClientConfig::default`]) gives the
/// production endpoints.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use watertemp::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .water_temp_url("http://localhost:8080/GETALLwatertemp")
///     .max_retries(2)
///     .forecast_max_age(Duration::from_secs(600))
///     .build();
///
/// assert_eq!(config.timezone, "Europe/Stockholm");
/// assert_eq!(config.max_retries, 2);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Endpoint returning all sensor readings between `start` and `end`.
    #[builder(into, default = DEFAULT_WATER_TEMP_URL.to_string())]
    pub water_temp_url: String,

    /// Open-Meteo historical archive endpoint.
    #[builder(into, default = DEFAULT_ARCHIVE_URL.to_string())]
    pub archive_url: String,

    /// Open-Meteo forecast endpoint.
    #[builder(into, default = DEFAULT_FORECAST_URL.to_string())]
    pub forecast_url: String,

    /// Nominatim search endpoint.
    #[builder(into, default = DEFAULT_GEOCODING_URL.to_string())]
    pub geocoding_url: String,

    /// IANA timezone the weather APIs should report hours in. Sensor timestamps are
    /// local Swedish time, so weather hours must be too for the join to line up.
    #[builder(into, default = DEFAULT_TIMEZONE.to_string())]
    pub timezone: String,

    /// How long a cached archive response stays valid. `None` keeps it forever;
    /// archived weather does not change.
    pub archive_max_age: Option<Duration>,

    /// How long a cached forecast response stays valid.
    #[builder(default = Duration::from_secs(3600))]
    pub forecast_max_age: Duration,

    /// Number of retries after the first attempt for transient HTTP failures.
    #[builder(default = 5)]
    pub max_retries: u32,

    /// Base delay of the exponential backoff between retries.
    #[builder(default = Duration::from_millis(200))]
    pub backoff_factor: Duration,

    /// Sent with every request; Nominatim rejects anonymous clients.
    #[builder(into, default = concat!("watertemp-rs/", env!("CARGO_PKG_VERSION")).to_string())]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

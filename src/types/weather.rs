//! Hourly weather variables requested from Open-Meteo and the coordinate type used to
//! ask for them.

use std::fmt;

/// Column holding the hour a weather row describes.
pub const COL_WEATHER_HOUR: &str = "date";

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use watertemp::LatLon;
///
/// let sodertalje = LatLon(59.20, 17.63);
/// assert_eq!(sodertalje.0, 59.20); // Latitude
/// assert_eq!(sodertalje.1, 17.63); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    /// Rounds both components to two decimals, the precision the geocoder results are
    /// stored with.
    pub fn rounded(self) -> Self {
        LatLon(round2(self.0), round2(self.1))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0, self.1)
    }
}

/// The hourly weather variables used as forecasting features.
///
/// The order of [`WeatherVariable::ALL`] is the order the columns appear in weather
/// and feature tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherVariable {
    /// Air temperature at 2 m, °C.
    Temperature2m,
    /// Precipitation of the preceding hour, mm.
    Precipitation,
    /// Wind speed at 10 m, km/h.
    WindSpeed10m,
    /// Wind direction at 10 m, degrees.
    WindDirection10m,
}

impl WeatherVariable {
    pub const ALL: [WeatherVariable; 4] = [
        WeatherVariable::Temperature2m,
        WeatherVariable::Precipitation,
        WeatherVariable::WindSpeed10m,
        WeatherVariable::WindDirection10m,
    ];

    /// Name used both as the Open-Meteo `hourly` parameter and as the column name.
    pub fn api_name(&self) -> &'static str {
        match self {
            WeatherVariable::Temperature2m => "temperature_2m",
            WeatherVariable::Precipitation => "precipitation",
            WeatherVariable::WindSpeed10m => "wind_speed_10m",
            WeatherVariable::WindDirection10m => "wind_direction_10m",
        }
    }

    /// Comma-separated value for the `hourly` query parameter.
    pub(crate) fn hourly_param() -> String {
        Self::ALL
            .iter()
            .map(WeatherVariable::api_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for WeatherVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_param() {
        assert_eq!(
            WeatherVariable::hourly_param(),
            "temperature_2m,precipitation,wind_speed_10m,wind_direction_10m"
        );
    }

    #[test]
    fn test_latlon_rounded() {
        assert_eq!(LatLon(59.196_41, 17.625_73).rounded(), LatLon(59.2, 17.63));
    }
}

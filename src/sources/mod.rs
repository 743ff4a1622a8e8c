//! Remote data sources: the municipal sensor endpoint, Open-Meteo and Nominatim.

pub mod cache;
pub mod error;
pub mod geocoding;
pub mod http;
pub mod open_meteo;
pub mod water_temp;

#[cfg(test)]
pub(crate) mod test_server;

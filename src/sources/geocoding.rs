use crate::sources::error::SourceError;
use crate::sources::http::HttpFetcher;
use crate::types::weather::LatLon;
use log::info;
use serde::Deserialize;

/// A Nominatim search hit. Coordinates come back as strings.
#[derive(Debug, Deserialize)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Resolves a free-text place name to coordinates rounded to two decimals.
pub async fn locate(http: &HttpFetcher, url: &str, place: &str) -> Result<LatLon, SourceError> {
    let places: Vec<NominatimPlace> = http
        .get_json(
            url,
            &[
                ("q", place.to_string()),
                ("format", "json".to_string()),
                ("limit", "1".to_string()),
            ],
        )
        .await?;

    let best = places
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::NoGeocodeMatch(place.to_string()))?;
    let location = place_to_latlon(place, &best)?;
    info!(
        "Located '{}' at {} ({})",
        place,
        location,
        best.display_name.as_deref().unwrap_or("unnamed")
    );
    Ok(location)
}

fn place_to_latlon(query: &str, place: &NominatimPlace) -> Result<LatLon, SourceError> {
    let parse = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|source| SourceError::CoordinateParse {
                query: query.to_string(),
                value: value.to_string(),
                source,
            })
    };
    Ok(LatLon(parse(&place.lat)?, parse(&place.lon)?).rounded())
}

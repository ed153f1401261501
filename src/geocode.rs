//! Turn a free-text address into coordinates.
//!
//! The [`Geocoder`] trait is what the rest of the crate depends on; [`NominatimGeocoder`] is the
//! implementation used by the programs. Requests are made one at a time, blocking, without
//! retries.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>
use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors from geocoding.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {message}")]
    Parse { message: String },
    #[error("rate limit exceeded")]
    RateLimited,
}

/// Result of a successful geocode.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// The address as matched by the geocoder, if it returned one.
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Something that can geocode a free-text address.
///
/// `Ok(None)` means the request succeeded but nothing matched.
pub trait Geocoder {
    fn geocode(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError>;
}

/// Geocoder using a Nominatim search endpoint.
#[derive(Debug)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    delay: Duration,
    last_request: Cell<Option<Instant>>,
}

impl NominatimGeocoder {
    /// `delay` is the minimum time between requests (1 second for the public instance).
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        delay: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            delay,
            last_request: Cell::new(None),
        })
    }

    fn wait_turn(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                thread::sleep(self.delay - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
        self.wait_turn();
        debug!("Geocoding '{query}'");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("countrycodes", "us"),
                ("format", "jsonv2"),
                ("limit", "1"),
            ])
            .send()?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json()?;
        parse_response(&body)
    }
}

/// Parse the JSON array returned by Nominatim, taking the first result.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = |field: &str| {
        first[field]
            .as_str()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| GeocodeError::Parse {
                message: format!("missing {field}"),
            })
    };

    Ok(Some(GeocodedAddress {
        address: first["display_name"].as_str().map(String::from),
        latitude: coordinate("lat")?,
        longitude: coordinate("lon")?,
    }))
}

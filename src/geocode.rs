//! Address resolution for pickup points.
//!
//! Geocoding is an external, rate-limited collaborator. Lookups are retried
//! with backoff; when every attempt fails the point gets a jittered fallback
//! coordinate and is reported back as flagged instead of being dropped.

use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{RetryPolicy, env_or, env_string};
use crate::error::{ConfigError, GeocodeError};
use crate::geo::{Coordinate, PickupPoint};
use crate::retry::with_retry;
use crate::traits::{GeocodedAddress, Geocoder};

/// Maximum jitter applied to fallback coordinates, in degrees (~1 km).
const FALLBACK_JITTER_DEG: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Restricts results to these ISO country codes when set, e.g. `"us"`.
    pub country_codes: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("ride-planner/", env!("CARGO_PKG_VERSION")).to_string(),
            country_codes: None,
            timeout_secs: 10,
        }
    }
}

impl NominatimConfig {
    /// Reads `NOMINATIM_URL`, `NOMINATIM_COUNTRY_CODES` and `NOMINATIM_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: env_string("NOMINATIM_URL", &defaults.base_url),
            country_codes: std::env::var("NOMINATIM_COUNTRY_CODES").ok(),
            timeout_secs: env_or("NOMINATIM_TIMEOUT_SECS", defaults.timeout_secs)?,
            ..defaults
        })
    }
}

/// Nominatim search API client.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
}

impl Geocoder for NominatimClient {
    fn geocode(&self, address: &str) -> Result<GeocodedAddress, GeocodeError> {
        let mut query = vec![
            ("q", address.to_string()),
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(codes) = &self.config.country_codes {
            query.push(("countrycodes", codes.clone()));
        }

        let results: Vec<NominatimResult> = self
            .client
            .get(format!("{}/search", self.config.base_url))
            .query(&query)
            .send()?
            .error_for_status()?
            .json()?;

        let result = results.into_iter().next().ok_or_else(|| GeocodeError::NotFound {
            address: address.to_string(),
        })?;

        let lat = result
            .lat
            .parse()
            .map_err(|_| GeocodeError::Malformed(format!("latitude '{}'", result.lat)))?;
        let lng = result
            .lon
            .parse()
            .map_err(|_| GeocodeError::Malformed(format!("longitude '{}'", result.lon)))?;

        Ok(GeocodedAddress {
            location: Coordinate::new(lat, lng),
            display_name: result.display_name,
        })
    }
}

/// Result of resolving one address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeOutcome {
    pub address: GeocodedAddress,
    /// True when the coordinate is a jittered fallback, not a real match.
    pub fallback: bool,
}

/// Geocodes with retry, substituting a jittered `fallback` coordinate once
/// the policy's attempts are exhausted.
pub fn geocode_with_retry<G, R>(
    geocoder: &G,
    address: &str,
    policy: &RetryPolicy,
    fallback: Coordinate,
    rng: &mut R,
) -> GeocodeOutcome
where
    G: Geocoder + ?Sized,
    R: Rng,
{
    match with_retry(policy, "geocode", || geocoder.geocode(address)) {
        Ok(resolved) => GeocodeOutcome {
            address: resolved,
            fallback: false,
        },
        Err(err) => {
            let location = Coordinate::new(
                fallback.lat + rng.gen_range(-FALLBACK_JITTER_DEG..=FALLBACK_JITTER_DEG),
                fallback.lng + rng.gen_range(-FALLBACK_JITTER_DEG..=FALLBACK_JITTER_DEG),
            );
            warn!(
                address,
                error = %err,
                ?location,
                "geocoding exhausted, using fallback coordinate"
            );
            GeocodeOutcome {
                address: GeocodedAddress {
                    location,
                    display_name: address.to_string(),
                },
                fallback: true,
            }
        }
    }
}

/// An employee whose home address still needs a coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct PickupAddress {
    pub id: String,
    pub address: String,
}

/// Resolved pickups plus the ids that fell back to a substitute coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPickups {
    pub points: Vec<PickupPoint>,
    pub flagged: Vec<String>,
}

/// Geocodes every address in order. Every input yields a point.
pub fn resolve_pickups<G, R>(
    geocoder: &G,
    addresses: &[PickupAddress],
    policy: &RetryPolicy,
    fallback: Coordinate,
    rng: &mut R,
) -> ResolvedPickups
where
    G: Geocoder + ?Sized,
    R: Rng,
{
    let mut resolved = ResolvedPickups::default();

    for pickup in addresses {
        let outcome = geocode_with_retry(geocoder, &pickup.address, policy, fallback, rng);
        if outcome.fallback {
            resolved.flagged.push(pickup.id.clone());
        }
        resolved.points.push(PickupPoint {
            id: pickup.id.clone(),
            location: outcome.address.location,
            label: outcome.address.display_name,
        });
    }

    info!(
        resolved = resolved.points.len(),
        flagged = resolved.flagged.len(),
        "pickup addresses resolved"
    );
    resolved
}

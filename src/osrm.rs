//! OSRM HTTP adapter for travel matrices and route geometry.

use serde::Deserialize;
use tracing::debug;

use crate::config::{env_or, env_string};
use crate::error::{ConfigError, RoutingError};
use crate::geo::Coordinate;
use crate::polyline::Polyline;
use crate::traits::{DistanceMatrixProvider, RouteGeometryProvider, TravelMatrix};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

impl OsrmConfig {
    /// Reads `OSRM_URL`, `OSRM_PROFILE` and `OSRM_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: env_string("OSRM_URL", &defaults.base_url),
            profile: env_string("OSRM_PROFILE", &defaults.profile),
            timeout_secs: env_or("OSRM_TIMEOUT_SECS", defaults.timeout_secs)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, RoutingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn url(&self, service: &str, locations: &[Coordinate], query: &str) -> String {
        format!(
            "{}/{}/v1/{}/{}?{}",
            self.config.base_url,
            service,
            self.config.profile,
            coordinate_path(locations),
            query
        )
    }
}

/// OSRM expects `lng,lat` pairs joined by `;`.
fn coordinate_path(locations: &[Coordinate]) -> String {
    locations
        .iter()
        .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
        .collect::<Vec<_>>()
        .join(";")
}

fn ensure_ok(code: &str, message: Option<String>) -> Result<(), RoutingError> {
    if code == "Ok" {
        Ok(())
    } else {
        Err(RoutingError::Unavailable(format!(
            "{}: {}",
            code,
            message.unwrap_or_default()
        )))
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[Coordinate]) -> Result<TravelMatrix, RoutingError> {
        if locations.is_empty() {
            return Ok(TravelMatrix::default());
        }

        let url = self.url("table", locations, "annotations=duration,distance");
        debug!(locations = locations.len(), "requesting OSRM table");

        let body = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json::<OsrmTableResponse>()?;
        ensure_ok(&body.code, body.message)?;

        let durations = body
            .durations
            .ok_or_else(|| RoutingError::MalformedResponse("missing durations".to_string()))?;
        let distances = body
            .distances
            .ok_or_else(|| RoutingError::MalformedResponse("missing distances".to_string()))?;

        // Unreachable pairs come back as null.
        let fill = |rows: Vec<Vec<Option<f64>>>| -> Result<Vec<Vec<f64>>, RoutingError> {
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|value| {
                            value.ok_or_else(|| {
                                RoutingError::Unavailable("no route between locations".to_string())
                            })
                        })
                        .collect()
                })
                .collect()
        };

        let matrix = TravelMatrix {
            durations: fill(durations)?,
            distances: fill(distances)?,
        };
        matrix.ensure_size(locations.len())?;
        Ok(matrix)
    }
}

impl RouteGeometryProvider for OsrmClient {
    fn geometry_for(&self, ordered: &[Coordinate]) -> Result<Polyline, RoutingError> {
        if ordered.len() < 2 {
            return Ok(Polyline::new(ordered.to_vec()));
        }

        let url = self.url("route", ordered, "overview=full&geometries=geojson");
        debug!(locations = ordered.len(), "requesting OSRM route geometry");

        let body = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json::<OsrmRouteResponse>()?;
        ensure_ok(&body.code, body.message)?;

        body.routes
            .into_iter()
            .next()
            .map(|route| Polyline::from_lng_lat(&route.geometry.coordinates))
            .ok_or_else(|| RoutingError::MalformedResponse("no routes returned".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

//! Contracts for the external services the pipeline talks to.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{location::Coordinate, route::RouteResponse};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("provider did not answer in time")]
    Timeout,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
/// Result of a reverse geocode, any part may be unknown
pub struct Address {
    pub road: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointOfInterest {
    pub name: String,
    /// Provider category such as `restaurant` or `tourist_attraction`
    pub category: String,
    /// Rating out of 5, if known
    #[serde(default)]
    pub rating: Option<f64>,
}

/// Computes a route between two points
pub trait RoutingProvider: Send + Sync {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<RouteResponse, ProviderError>> + Send;
}

/// Turns a coordinate into an address
pub trait GeocodingProvider: Send + Sync {
    fn reverse_geocode(
        &self,
        at: Coordinate,
    ) -> impl Future<Output = Result<Address, ProviderError>> + Send;
}

/// Finds named places around a coordinate
pub trait PoiProvider: Send + Sync {
    fn nearby(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> impl Future<Output = Result<Vec<PointOfInterest>, ProviderError>> + Send;
}

/// Run a provider call, giving up with [ProviderError::Timeout] after `limit`
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout))
}

//! openrouteservice-compatible routing provider.
//!
//! Speaks the `/v2/directions/driving-car` POST API; geometry comes back
//! polyline-encoded inside a JSON envelope.

use std::future::Future;
use std::pin::Pin;

use geo::Point;
use serde::Deserialize;
use serde_json::json;

use super::provider::RouteProvider;
use super::{Result, Route, RoutingError};
use crate::geometry::polyline;

pub struct OrsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OrsProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrsResponse {
    #[serde(default)]
    routes: Vec<OrsRoute>,
}

#[derive(Debug, Deserialize)]
struct OrsRoute {
    geometry: String,
    summary: OrsSummary,
}

#[derive(Debug, Deserialize)]
struct OrsSummary {
    distance: f64,
    duration: f64,
}

impl RouteProvider for OrsProvider {
    fn name(&self) -> &'static str {
        "openrouteservice"
    }

    fn fetch_route<'a>(
        &'a self,
        origin: Point,
        destination: Point,
    ) -> Pin<Box<dyn Future<Output = Result<Route>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/v2/directions/driving-car", self.base_url);
            let body = json!({
                "coordinates": [
                    [origin.x(), origin.y()],
                    [destination.x(), destination.y()],
                ],
            });

            let response = self
                .client
                .post(&url)
                .header("Authorization", &self.api_key)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RoutingError::Status(status.as_u16()));
            }

            let body: OrsResponse = response.json().await?;
            let route = body.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;

            let coordinates = polyline::decode(&route.geometry);
            if coordinates.len() < 2 {
                return Err(RoutingError::NoRoute);
            }

            Ok(Route {
                coordinates,
                duration_secs: Some(route.summary.duration),
                distance_m: Some(route.summary.distance),
            })
        })
    }
}

//! OSRM-compatible routing provider.
//!
//! Speaks the `/route/v1/driving` GET API with polyline-encoded geometry.

use std::future::Future;
use std::pin::Pin;

use geo::Point;
use serde::Deserialize;

use super::provider::RouteProvider;
use super::{Result, Route, RoutingError};
use crate::geometry::polyline;

pub struct OsrmProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: String,
    duration: f64,
    distance: f64,
}

impl RouteProvider for OsrmProvider {
    fn name(&self) -> &'static str {
        "osrm"
    }

    fn fetch_route<'a>(
        &'a self,
        origin: Point,
        destination: Point,
    ) -> Pin<Box<dyn Future<Output = Result<Route>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!(
                "{}/route/v1/driving/{},{};{},{}?overview=full",
                self.base_url,
                origin.x(),
                origin.y(),
                destination.x(),
                destination.y()
            );

            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RoutingError::Status(status.as_u16()));
            }

            let body: OsrmResponse = response.json().await?;
            if body.code != "Ok" {
                return Err(RoutingError::NoRoute);
            }
            let route = body.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;

            let coordinates = polyline::decode(&route.geometry);
            if coordinates.len() < 2 {
                return Err(RoutingError::NoRoute);
            }

            Ok(Route {
                coordinates,
                duration_secs: Some(route.duration),
                distance_m: Some(route.distance),
            })
        })
    }
}

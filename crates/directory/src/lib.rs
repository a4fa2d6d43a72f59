//! # resq-directory
//!
//! Hospital directory data for the dispatch engine.
//!
//! ## Features
//!
//! - **Snapshot-based**: one discovery result held in memory, replaced wholesale on refresh
//! - **Spatial queries**: fast R-tree based spatial indexing
//! - **Pluggable networking**: implement your own discovery fetching
//!
//! ## Example
//!
//! ```
//! use resq_directory::prelude::*;
//! use geo::Point;
//! use std::sync::Arc;
//!
//! let hospital = Hospital {
//!     id: HospitalId::new("st_marys"),
//!     name: "St. Mary's Medical Center".into(),
//!     location: Point::new(-73.9935, 40.7505),
//!     distance_km: 1.2,
//!     rating: 4.5,
//!     verified: true,
//!     available_beds: 12,
//!     ambulances: 3,
//!     wait_time_minutes: 10,
//!     specialties: ["trauma"].iter().map(|s| Arc::from(*s)).collect(),
//! };
//!
//! let directory = StaticHospitalDirectory::from_data(vec![hospital]);
//!
//! // Query hospitals
//! let point = Point::new(-74.0060, 40.7128); // NYC
//! let nearby = directory.hospitals_near(point, 5000.0); // 5km radius
//! assert_eq!(nearby.len(), 1);
//! ```

pub mod identifiers;
pub mod models;
pub mod network;
pub mod provider;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::models::{traits::*, types::*};
    pub use crate::network::traits::*;
    pub use crate::provider::static_provider::StaticHospitalDirectory;
}

pub use prelude::*;

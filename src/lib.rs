//! Ecoliste Search - geospatial multi-facet search over material producers
//!
//! Finds the production sites of enterprises within a radius of a point, narrowed
//! by what the enterprise offers (material types, origins, biobased materials) and
//! by its size bands (employees, annual sales).

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    compile_filters,
    distance::{calculate_bounding_box, haversine_distance},
    FacetFilters, SearchEngine, SearchError,
};
pub use crate::models::{GeoPoint, RawFilters, RawValue, SearchRequest, SearchResponse, Site, SiteHit};
pub use crate::services::{EntityStore, InMemoryStore, StoreError};

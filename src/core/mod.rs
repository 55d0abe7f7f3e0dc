// Core algorithm exports
pub mod distance;
pub mod engine;
pub mod error;
pub mod filters;

pub use distance::{calculate_bounding_box, haversine_distance, is_within_radius, BoundingBox};
pub use engine::SearchEngine;
pub use error::SearchError;
pub use filters::{compile_filters, FacetFilters, OfferingFacet};

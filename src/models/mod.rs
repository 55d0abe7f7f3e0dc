// Model exports
pub mod bands;
pub mod domain;
pub mod requests;
pub mod responses;

pub use bands::{band_choices, Band, BandChoice, BandKind, BandRange, EmployeeBand, RevenueBand};
pub use domain::{
    BiobasedMaterialId, BiobasedOriginMaterial, CategoryId, CategoryWithTypes, Enterprise,
    EnterpriseDetail, EnterpriseId, GeoPoint, MaterialOffering, MaterialOrigin, MaterialTaxonomy,
    MaterialType, MaterialTypeCategory, MaterialTypeId, OfferingDetail, OfferingId, OriginId, Site,
    SiteHit, SiteId, BIOBASED_ORIGIN_SLUG,
};
pub use requests::{RawFilters, RawValue, SearchRequest};
pub use responses::{ErrorResponse, FeatureCollection, HealthResponse, SearchResponse, TaxonomyResponse};

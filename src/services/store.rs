use crate::core::filters::OfferingFacet;
use crate::models::{
    BandKind, EmployeeBand, EnterpriseDetail, EnterpriseId, GeoPoint, MaterialTaxonomy,
    RevenueBand, Site,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when reading from or writing to an entity store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl StoreError {
    /// Whether the same request may succeed later. Data and schema problems will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::SqlxError(_) | StoreError::Timeout(_))
    }
}

/// Banded attributes of one enterprise; `None` when unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnterpriseBands {
    pub employees: Option<EmployeeBand>,
    pub sales: Option<RevenueBand>,
}

/// Either kind of band, as returned by [`EntityStore::enterprise_band`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandValue {
    Employees(EmployeeBand),
    Sales(RevenueBand),
}

/// Read primitives the search engine runs against.
///
/// Implementations must answer from a consistent view of each record: a search may
/// observe data from before or after a concurrent write, but never a half-written
/// enterprise or offering.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Every site within `radius_km` of `center`, boundary included
    async fn sites_within_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Site>, StoreError>;

    /// The subset of `enterprise_ids` owning at least one offering matching any of
    /// `values` for `facet`. Ids with no matching record simply match nothing.
    async fn enterprises_with_offering(
        &self,
        enterprise_ids: &[EnterpriseId],
        facet: OfferingFacet,
        values: &BTreeSet<i64>,
    ) -> Result<HashSet<EnterpriseId>, StoreError>;

    /// Bands of each requested enterprise that exists
    async fn enterprise_bands(
        &self,
        enterprise_ids: &[EnterpriseId],
    ) -> Result<HashMap<EnterpriseId, EnterpriseBands>, StoreError>;

    async fn enterprise_has_offering_matching(
        &self,
        enterprise_id: EnterpriseId,
        facet: OfferingFacet,
        values: &BTreeSet<i64>,
    ) -> Result<bool, StoreError> {
        let matching = self
            .enterprises_with_offering(&[enterprise_id], facet, values)
            .await?;
        Ok(matching.contains(&enterprise_id))
    }

    async fn enterprise_band(
        &self,
        enterprise_id: EnterpriseId,
        kind: BandKind,
    ) -> Result<Option<BandValue>, StoreError> {
        let bands = self.enterprise_bands(&[enterprise_id]).await?;
        Ok(bands.get(&enterprise_id).and_then(|bands| match kind {
            BandKind::Employees => bands.employees.map(BandValue::Employees),
            BandKind::Sales => bands.sales.map(BandValue::Sales),
        }))
    }

    /// Whether the backing store answers queries
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;
}

/// Read access for enterprise pages and search forms
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn enterprise_detail(
        &self,
        enterprise_id: EnterpriseId,
    ) -> Result<Option<EnterpriseDetail>, StoreError>;

    async fn material_taxonomy(&self) -> Result<MaterialTaxonomy, StoreError>;
}

/// A backend serving both the search engine and the catalog endpoints
pub trait Store: EntityStore + CatalogStore {}

impl<T: EntityStore + CatalogStore> Store for T {}

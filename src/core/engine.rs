use crate::core::distance::{haversine_distance, is_within_radius};
use crate::core::error::SearchError;
use crate::core::filters::{compile_filters, FacetFilters, OfferingFacet};
use crate::models::{EnterpriseId, GeoPoint, RawFilters, SiteHit, SiteId};
use crate::services::{EntityStore, StoreError};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Geospatial multi-facet search over an entity store
///
/// # Pipeline Stages
/// 1. Radius candidate generation (store pre-filter + exact haversine check)
/// 2. Offering facets (`materials`, `origin`, `biobased`), each an OR over its values
/// 3. Band facets (`nemployees`, `sales`) on the owning enterprise
/// 4. Intersection of every present facet (AND across facets)
///
/// Facets are answered independently, so `materials` and `origin` may be satisfied
/// by two different offerings of the same enterprise.
#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn EntityStore>,
    max_radius_km: Option<f64>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            max_radius_km: None,
        }
    }

    /// Reject radii above `max_radius_km` as invalid input
    pub fn with_max_radius_km(mut self, max_radius_km: f64) -> Self {
        self.max_radius_km = Some(max_radius_km);
        self
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Caller-facing entry point: raw coordinates and raw facet values
    pub async fn search_raw(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        raw_filters: &RawFilters,
    ) -> Result<Vec<SiteHit>, SearchError> {
        let center = GeoPoint::new(latitude, longitude);
        self.validate(center, radius_km)?;
        let filters = compile_filters(raw_filters)?;
        self.search(center, radius_km, &filters).await
    }

    /// Find every site within `radius_km` of `center` whose enterprise satisfies
    /// all present facets
    ///
    /// Hits are unique per site and ordered by distance, then site id.
    pub async fn search(
        &self,
        center: GeoPoint,
        radius_km: f64,
        filters: &FacetFilters,
    ) -> Result<Vec<SiteHit>, SearchError> {
        self.validate(center, radius_km)?;

        // Stage 1: radius candidates, deduplicated by site id
        let candidates: BTreeMap<SiteId, SiteHit> = self
            .store
            .sites_within_radius(center, radius_km)
            .await?
            .into_iter()
            .filter(|site| is_within_radius(center, radius_km, site.location))
            .map(|site| {
                let distance_km = haversine_distance(center, site.location);
                (site.id, SiteHit { site, distance_km })
            })
            .collect();
        let total_candidates = candidates.len();

        let hits = if filters.is_empty() || candidates.is_empty() {
            candidates.into_values().collect()
        } else {
            self.apply_facets(candidates, filters).await?
        };

        let hits = sort_hits(hits);

        tracing::info!(
            "Search at ({:.5}, {:.5}) within {} km: {} results from {} candidates",
            center.latitude,
            center.longitude,
            radius_km,
            hits.len(),
            total_candidates
        );

        Ok(hits)
    }

    fn validate(&self, center: GeoPoint, radius_km: f64) -> Result<(), SearchError> {
        if !center.is_valid() {
            return Err(SearchError::invalid(format!(
                "center ({}, {}) is not a valid latitude/longitude",
                center.latitude, center.longitude
            )));
        }
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(SearchError::invalid(format!(
                "radius must be a non-negative number of kilometers, got {}",
                radius_km
            )));
        }
        if let Some(max) = self.max_radius_km {
            if radius_km > max {
                return Err(SearchError::invalid(format!(
                    "radius {} km exceeds the maximum of {} km",
                    radius_km, max
                )));
            }
        }
        Ok(())
    }

    /// Stages 2-4: narrow candidates to enterprises satisfying every facet
    async fn apply_facets(
        &self,
        candidates: BTreeMap<SiteId, SiteHit>,
        filters: &FacetFilters,
    ) -> Result<Vec<SiteHit>, SearchError> {
        let enterprise_ids: Vec<EnterpriseId> = candidates
            .values()
            .map(|hit| hit.site.enterprise_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // Independent pure reads, evaluated concurrently
        let (materials, origin, biobased, bands) = tokio::try_join!(
            self.offering_constraint(&enterprise_ids, OfferingFacet::Materials, filters),
            self.offering_constraint(&enterprise_ids, OfferingFacet::Origin, filters),
            self.offering_constraint(&enterprise_ids, OfferingFacet::Biobased, filters),
            self.band_constraint(&enterprise_ids, filters),
        )?;

        let mut allowed: HashSet<EnterpriseId> = enterprise_ids.iter().copied().collect();
        for constraint in [materials, origin, biobased, bands].into_iter().flatten() {
            allowed.retain(|id| constraint.contains(id));
        }

        tracing::debug!(
            "Facets kept {} of {} enterprises",
            allowed.len(),
            enterprise_ids.len()
        );

        Ok(candidates
            .into_values()
            .filter(|hit| allowed.contains(&hit.site.enterprise_id))
            .collect())
    }

    /// Enterprises owning some offering matching `facet`, or `None` when the facet
    /// is absent
    async fn offering_constraint(
        &self,
        enterprise_ids: &[EnterpriseId],
        facet: OfferingFacet,
        filters: &FacetFilters,
    ) -> Result<Option<HashSet<EnterpriseId>>, StoreError> {
        let Some(values) = filters.offering_set(facet) else {
            return Ok(None);
        };

        let matching = self
            .store
            .enterprises_with_offering(enterprise_ids, facet, values)
            .await?;

        tracing::debug!("Facet {} matched {} enterprises", facet, matching.len());
        Ok(Some(matching))
    }

    /// Enterprises whose bands fall within every requested band range
    async fn band_constraint(
        &self,
        enterprise_ids: &[EnterpriseId],
        filters: &FacetFilters,
    ) -> Result<Option<HashSet<EnterpriseId>>, StoreError> {
        if !filters.has_band_constraint() {
            return Ok(None);
        }

        let bands = self.store.enterprise_bands(enterprise_ids).await?;

        let matching: HashSet<EnterpriseId> = bands
            .into_iter()
            .filter(|(_, bands)| {
                filters
                    .nemployees
                    .map_or(true, |range| range.contains(bands.employees))
                    && filters.sales.map_or(true, |range| range.contains(bands.sales))
            })
            .map(|(id, _)| id)
            .collect();

        tracing::debug!("Band facets matched {} enterprises", matching.len());
        Ok(Some(matching))
    }
}

fn sort_hits(mut hits: Vec<SiteHit>) -> Vec<SiteHit> {
    hits.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.site.id.cmp(&b.site.id))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BandRange, EmployeeBand, Enterprise, MaterialOffering, MaterialOrigin, MaterialType, Site,
    };
    use crate::services::memory::{Catalog, InMemoryStore};

    const BEAMS: i64 = 1;
    const PANELS: i64 = 2;
    const RECYCLED: i64 = 10;
    const BIOBASED: i64 = 11;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        for (id, name) in [(BEAMS, "Beams"), (PANELS, "Panels")] {
            catalog
                .insert_material_type(MaterialType { id, category_id: None, name: name.into(), order: 1 })
                .unwrap();
        }
        for (id, slug) in [(RECYCLED, "recycled"), (BIOBASED, "biobased")] {
            catalog
                .insert_origin(MaterialOrigin { id, slug: slug.into(), name: slug.into() })
                .unwrap();
        }
        catalog
    }

    fn add_enterprise(catalog: &mut Catalog, id: i64, employees: Option<EmployeeBand>, lat: f64, lon: f64) {
        catalog
            .insert_enterprise(Enterprise {
                id,
                name: format!("Enterprise {}", id),
                website: String::new(),
                description: String::new(),
                n_employees: employees,
                annual_sales: None,
                added: None,
                updated: None,
            })
            .unwrap();
        catalog
            .insert_site(Site {
                id: id * 100,
                enterprise_id: id,
                text_version: format!("site of {}", id),
                location: GeoPoint::new(lat, lon),
                is_production: false,
            })
            .unwrap();
    }

    fn add_offering(catalog: &mut Catalog, id: i64, enterprise_id: i64, type_id: i64, origin_id: i64) {
        catalog
            .insert_offering(MaterialOffering {
                id,
                enterprise_id,
                material_type_id: type_id,
                origin_id,
                site_ids: BTreeSet::from([enterprise_id * 100]),
                biobased_ids: BTreeSet::new(),
            })
            .unwrap();
    }

    fn engine(catalog: Catalog) -> SearchEngine {
        SearchEngine::new(Arc::new(InMemoryStore::new(catalog)))
    }

    #[tokio::test]
    async fn test_rejects_invalid_center_and_radius() {
        let engine = engine(catalog());
        let none = FacetFilters::default();

        for (center, radius) in [
            (GeoPoint::new(91.0, 0.0), 10.0),
            (GeoPoint::new(f64::NAN, 0.0), 10.0),
            (GeoPoint::new(0.0, 0.0), -1.0),
            (GeoPoint::new(0.0, 0.0), f64::INFINITY),
        ] {
            let err = engine.search(center, radius, &none).await.unwrap_err();
            assert!(matches!(err, SearchError::InvalidInput(_)));
            assert!(!err.is_retryable());
        }
    }

    #[tokio::test]
    async fn test_max_radius_enforced() {
        let engine = engine(catalog()).with_max_radius_km(100.0);
        let none = FacetFilters::default();

        assert!(engine.search(GeoPoint::new(0.0, 0.0), 100.0, &none).await.is_ok());
        assert!(engine.search(GeoPoint::new(0.0, 0.0), 100.5, &none).await.is_err());
    }

    #[tokio::test]
    async fn test_same_offering_not_required_across_facets() {
        let mut catalog = catalog();
        add_enterprise(&mut catalog, 1, None, 0.0, 0.0);
        // Beams from a biobased origin and recycled panels: no single offering is
        // recycled beams, but the enterprise has some beams and something recycled.
        add_offering(&mut catalog, 1, 1, BEAMS, BIOBASED);
        add_offering(&mut catalog, 2, 1, PANELS, RECYCLED);
        let engine = engine(catalog);

        let filters = FacetFilters {
            materials: Some(BTreeSet::from([BEAMS])),
            origin: Some(BTreeSet::from([RECYCLED])),
            ..Default::default()
        };
        let hits = engine.search(GeoPoint::new(0.0, 0.0), 1.0, &filters).await.unwrap();

        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_band_filter_skips_unknown_band() {
        let mut catalog = catalog();
        add_enterprise(&mut catalog, 1, Some(EmployeeBand::Small), 0.0, 0.0);
        add_enterprise(&mut catalog, 2, None, 0.0, 0.01);
        let engine = engine(catalog);

        let filters = FacetFilters {
            nemployees: BandRange::new(EmployeeBand::None, EmployeeBand::VeryLarge),
            ..Default::default()
        };
        let hits = engine.search(GeoPoint::new(0.0, 0.0), 5.0, &filters).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].site.enterprise_id, 1);
    }

    #[tokio::test]
    async fn test_hits_sorted_by_distance() {
        let mut catalog = catalog();
        add_enterprise(&mut catalog, 1, None, 0.0, 0.3);
        add_enterprise(&mut catalog, 2, None, 0.0, 0.1);
        add_enterprise(&mut catalog, 3, None, 0.0, 0.2);
        let engine = engine(catalog);

        let hits = engine
            .search(GeoPoint::new(0.0, 0.0), 100.0, &FacetFilters::default())
            .await
            .unwrap();

        let order: Vec<_> = hits.iter().map(|hit| hit.site.enterprise_id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(hits.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    /// Answers the radius query, then fails every facet lookup
    struct FlakyStore {
        sites: Vec<Site>,
    }

    #[async_trait::async_trait]
    impl EntityStore for FlakyStore {
        async fn sites_within_radius(
            &self,
            _center: GeoPoint,
            _radius_km: f64,
        ) -> Result<Vec<Site>, StoreError> {
            Ok(self.sites.clone())
        }

        async fn enterprises_with_offering(
            &self,
            _enterprise_ids: &[EnterpriseId],
            _facet: OfferingFacet,
            _values: &BTreeSet<i64>,
        ) -> Result<HashSet<EnterpriseId>, StoreError> {
            Err(StoreError::Timeout(std::time::Duration::from_millis(1)))
        }

        async fn enterprise_bands(
            &self,
            _enterprise_ids: &[EnterpriseId],
        ) -> Result<std::collections::HashMap<EnterpriseId, crate::services::EnterpriseBands>, StoreError>
        {
            Ok(Default::default())
        }

        fn backend(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_store_failure_returns_no_partial_results() {
        let site = Site {
            id: 1,
            enterprise_id: 1,
            text_version: "Lyon".into(),
            location: GeoPoint::new(45.76, 4.84),
            is_production: true,
        };
        let engine = SearchEngine::new(Arc::new(FlakyStore { sites: vec![site] }));
        let center = GeoPoint::new(45.76, 4.84);

        // Radius-only searches never reach the failing lookups
        let hits = engine.search(center, 1.0, &FacetFilters::default()).await.unwrap();
        assert_eq!(hits.len(), 1);

        let filters = FacetFilters {
            materials: Some(BTreeSet::from([BEAMS])),
            nemployees: Some(BandRange::exactly(EmployeeBand::Small)),
            ..Default::default()
        };
        let err = engine.search(center, 1.0, &filters).await.unwrap_err();

        assert!(matches!(err, SearchError::StoreUnavailable(StoreError::Timeout(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_search_raw_compiles_filters() {
        let mut catalog = catalog();
        add_enterprise(&mut catalog, 1, None, 0.0, 0.0);
        add_offering(&mut catalog, 1, 1, BEAMS, RECYCLED);
        let engine = engine(catalog);

        let mut raw = RawFilters::new();
        raw.insert("materials".into(), vec![crate::models::RawValue::from(" 1 ")]);
        raw.insert("origin".into(), vec![crate::models::RawValue::from("")]);
        let hits = engine.search_raw(0.0, 0.0, 1.0, &raw).await.unwrap();
        assert_eq!(hits.len(), 1);

        raw.insert("materials".into(), vec![crate::models::RawValue::from("x")]);
        assert!(engine.search_raw(0.0, 0.0, 1.0, &raw).await.is_err());
    }
}

use crate::core::distance::{calculate_bounding_box, is_within_radius};
use crate::core::filters::OfferingFacet;
use crate::models::{
    BiobasedMaterialId, BiobasedOriginMaterial, CategoryId, Enterprise, EnterpriseDetail,
    EnterpriseId, GeoPoint, MaterialOffering, MaterialOrigin, MaterialTaxonomy, MaterialType,
    MaterialTypeCategory, MaterialTypeId, OfferingDetail, OfferingId, OriginId, Site, SiteId,
};
use crate::services::store::{CatalogStore, EnterpriseBands, EntityStore, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Flat listing of every record, as loaded from a JSON fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub categories: Vec<MaterialTypeCategory>,
    #[serde(default)]
    pub material_types: Vec<MaterialType>,
    #[serde(default)]
    pub origins: Vec<MaterialOrigin>,
    #[serde(default)]
    pub biobased_materials: Vec<BiobasedOriginMaterial>,
    #[serde(default)]
    pub enterprises: Vec<Enterprise>,
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub offerings: Vec<MaterialOffering>,
}

/// All records plus the relation indexes used to answer facet queries.
///
/// Mutations validate references and keep the ownership cascades: an enterprise
/// owns its sites and offerings, a material type or origin owns the offerings
/// referencing it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: BTreeMap<CategoryId, MaterialTypeCategory>,
    material_types: BTreeMap<MaterialTypeId, MaterialType>,
    origins: BTreeMap<OriginId, MaterialOrigin>,
    biobased_materials: BTreeMap<BiobasedMaterialId, BiobasedOriginMaterial>,
    enterprises: BTreeMap<EnterpriseId, Enterprise>,
    sites: BTreeMap<SiteId, Site>,
    offerings: BTreeMap<OfferingId, MaterialOffering>,
    sites_by_enterprise: HashMap<EnterpriseId, BTreeSet<SiteId>>,
    offerings_by_enterprise: HashMap<EnterpriseId, BTreeSet<OfferingId>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a fixture, reference data first
    pub fn from_fixture(fixture: CatalogFixture) -> Result<Self, StoreError> {
        let mut catalog = Self::new();
        for category in fixture.categories {
            catalog.insert_category(category)?;
        }
        for material_type in fixture.material_types {
            catalog.insert_material_type(material_type)?;
        }
        for origin in fixture.origins {
            catalog.insert_origin(origin)?;
        }
        for material in fixture.biobased_materials {
            catalog.insert_biobased_material(material)?;
        }
        for enterprise in fixture.enterprises {
            catalog.insert_enterprise(enterprise)?;
        }
        for site in fixture.sites {
            catalog.insert_site(site)?;
        }
        for offering in fixture.offerings {
            catalog.insert_offering(offering)?;
        }
        Ok(catalog)
    }

    pub fn insert_category(&mut self, category: MaterialTypeCategory) -> Result<(), StoreError> {
        insert_unique(&mut self.categories, category.id, category, "category")
    }

    pub fn insert_material_type(&mut self, material_type: MaterialType) -> Result<(), StoreError> {
        if let Some(category_id) = material_type.category_id {
            require(&self.categories, category_id, "category")?;
        }
        insert_unique(&mut self.material_types, material_type.id, material_type, "material type")
    }

    pub fn insert_origin(&mut self, origin: MaterialOrigin) -> Result<(), StoreError> {
        insert_unique(&mut self.origins, origin.id, origin, "origin")
    }

    pub fn insert_biobased_material(
        &mut self,
        material: BiobasedOriginMaterial,
    ) -> Result<(), StoreError> {
        insert_unique(&mut self.biobased_materials, material.id, material, "biobased material")
    }

    pub fn insert_enterprise(&mut self, enterprise: Enterprise) -> Result<(), StoreError> {
        insert_unique(&mut self.enterprises, enterprise.id, enterprise, "enterprise")
    }

    pub fn insert_site(&mut self, site: Site) -> Result<(), StoreError> {
        require(&self.enterprises, site.enterprise_id, "enterprise")?;
        if !site.location.is_valid() {
            return Err(StoreError::Integrity(format!(
                "site {} has invalid coordinates {:?}",
                site.id, site.location
            )));
        }
        let (id, enterprise_id) = (site.id, site.enterprise_id);
        insert_unique(&mut self.sites, id, site, "site")?;
        self.sites_by_enterprise.entry(enterprise_id).or_default().insert(id);
        Ok(())
    }

    pub fn insert_offering(&mut self, offering: MaterialOffering) -> Result<(), StoreError> {
        require(&self.enterprises, offering.enterprise_id, "enterprise")?;
        require(&self.material_types, offering.material_type_id, "material type")?;
        let origin = require(&self.origins, offering.origin_id, "origin")?;

        for site_id in &offering.site_ids {
            let site = require(&self.sites, *site_id, "site")?;
            if site.enterprise_id != offering.enterprise_id {
                return Err(StoreError::Integrity(format!(
                    "site {} does not belong to enterprise {}",
                    site_id, offering.enterprise_id
                )));
            }
        }
        for biobased_id in &offering.biobased_ids {
            require(&self.biobased_materials, *biobased_id, "biobased material")?;
        }

        let duplicate = self.offerings_of(offering.enterprise_id).any(|existing| {
            existing.material_type_id == offering.material_type_id
                && existing.origin_id == offering.origin_id
        });
        if duplicate {
            return Err(StoreError::Integrity(format!(
                "enterprise {} already offers type {} with origin {}",
                offering.enterprise_id, offering.material_type_id, offering.origin_id
            )));
        }

        if !offering.biobased_ids.is_empty() && !origin.is_biobased() {
            tracing::warn!(
                "Offering {} links biobased materials but its origin is {:?}",
                offering.id,
                origin.slug
            );
        }

        let (id, enterprise_id) = (offering.id, offering.enterprise_id);
        insert_unique(&mut self.offerings, id, offering, "offering")?;
        self.offerings_by_enterprise.entry(enterprise_id).or_default().insert(id);
        Ok(())
    }

    /// Delete an enterprise with its sites and offerings
    pub fn delete_enterprise(&mut self, enterprise_id: EnterpriseId) -> Result<(), StoreError> {
        self.enterprises
            .remove(&enterprise_id)
            .ok_or_else(|| StoreError::NotFound(format!("enterprise {}", enterprise_id)))?;
        for site_id in self.sites_by_enterprise.remove(&enterprise_id).unwrap_or_default() {
            self.sites.remove(&site_id);
        }
        for offering_id in self.offerings_by_enterprise.remove(&enterprise_id).unwrap_or_default() {
            self.offerings.remove(&offering_id);
        }
        Ok(())
    }

    /// Delete a site and its production links
    pub fn delete_site(&mut self, site_id: SiteId) -> Result<(), StoreError> {
        let site = self
            .sites
            .remove(&site_id)
            .ok_or_else(|| StoreError::NotFound(format!("site {}", site_id)))?;
        if let Some(ids) = self.sites_by_enterprise.get_mut(&site.enterprise_id) {
            ids.remove(&site_id);
        }
        for offering in self.offerings.values_mut() {
            offering.site_ids.remove(&site_id);
        }
        Ok(())
    }

    /// Types of a deleted category become uncategorized
    pub fn delete_category(&mut self, category_id: CategoryId) -> Result<(), StoreError> {
        self.categories
            .remove(&category_id)
            .ok_or_else(|| StoreError::NotFound(format!("category {}", category_id)))?;
        for material_type in self.material_types.values_mut() {
            if material_type.category_id == Some(category_id) {
                material_type.category_id = None;
            }
        }
        Ok(())
    }

    pub fn delete_material_type(&mut self, type_id: MaterialTypeId) -> Result<(), StoreError> {
        self.material_types
            .remove(&type_id)
            .ok_or_else(|| StoreError::NotFound(format!("material type {}", type_id)))?;
        self.remove_offerings_where(|offering| offering.material_type_id == type_id);
        Ok(())
    }

    pub fn delete_origin(&mut self, origin_id: OriginId) -> Result<(), StoreError> {
        self.origins
            .remove(&origin_id)
            .ok_or_else(|| StoreError::NotFound(format!("origin {}", origin_id)))?;
        self.remove_offerings_where(|offering| offering.origin_id == origin_id);
        Ok(())
    }

    pub fn delete_biobased_material(
        &mut self,
        material_id: BiobasedMaterialId,
    ) -> Result<(), StoreError> {
        self.biobased_materials
            .remove(&material_id)
            .ok_or_else(|| StoreError::NotFound(format!("biobased material {}", material_id)))?;
        for offering in self.offerings.values_mut() {
            offering.biobased_ids.remove(&material_id);
        }
        Ok(())
    }

    pub fn enterprise(&self, enterprise_id: EnterpriseId) -> Option<&Enterprise> {
        self.enterprises.get(&enterprise_id)
    }

    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    fn offerings_of(&self, enterprise_id: EnterpriseId) -> impl Iterator<Item = &MaterialOffering> {
        self.offerings_by_enterprise
            .get(&enterprise_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.offerings.get(id))
    }

    fn remove_offerings_where(&mut self, predicate: impl Fn(&MaterialOffering) -> bool) {
        let doomed: Vec<(OfferingId, EnterpriseId)> = self
            .offerings
            .values()
            .filter(|offering| predicate(offering))
            .map(|offering| (offering.id, offering.enterprise_id))
            .collect();
        for (offering_id, enterprise_id) in doomed {
            self.offerings.remove(&offering_id);
            if let Some(ids) = self.offerings_by_enterprise.get_mut(&enterprise_id) {
                ids.remove(&offering_id);
            }
        }
    }

    fn sites_within_radius(&self, center: GeoPoint, radius_km: f64) -> Vec<Site> {
        let bbox = calculate_bounding_box(center, radius_km);
        self.sites
            .values()
            .filter(|site| bbox.contains(site.location))
            .filter(|site| is_within_radius(center, radius_km, site.location))
            .cloned()
            .collect()
    }

    fn offering_matches(offering: &MaterialOffering, facet: OfferingFacet, values: &BTreeSet<i64>) -> bool {
        match facet {
            OfferingFacet::Materials => values.contains(&offering.material_type_id),
            OfferingFacet::Origin => values.contains(&offering.origin_id),
            OfferingFacet::Biobased => !offering.biobased_ids.is_disjoint(values),
        }
    }

    fn enterprise_detail(&self, enterprise_id: EnterpriseId) -> Option<EnterpriseDetail> {
        let enterprise = self.enterprises.get(&enterprise_id)?.clone();

        let sites = self
            .sites_by_enterprise
            .get(&enterprise_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.sites.get(id).cloned())
            .collect();

        let offerings = self
            .offerings_of(enterprise_id)
            .filter_map(|offering| {
                let material_type = self.material_types.get(&offering.material_type_id)?.clone();
                let category = material_type
                    .category_id
                    .and_then(|id| self.categories.get(&id).cloned());
                Some(OfferingDetail {
                    id: offering.id,
                    category,
                    material_type,
                    origin: self.origins.get(&offering.origin_id)?.clone(),
                    biobased: offering
                        .biobased_ids
                        .iter()
                        .filter_map(|id| self.biobased_materials.get(id).cloned())
                        .collect(),
                    site_ids: offering.site_ids.iter().copied().collect(),
                })
            })
            .collect();

        Some(EnterpriseDetail {
            enterprise,
            sites,
            offerings,
        })
    }

    fn taxonomy(&self) -> MaterialTaxonomy {
        MaterialTaxonomy::assemble(
            self.categories.values().cloned().collect(),
            self.material_types.values().cloned().collect(),
            self.origins.values().cloned().collect(),
            self.biobased_materials.values().cloned().collect(),
        )
    }
}

fn insert_unique<T>(
    map: &mut BTreeMap<i64, T>,
    id: i64,
    value: T,
    kind: &str,
) -> Result<(), StoreError> {
    if map.contains_key(&id) {
        return Err(StoreError::Integrity(format!("duplicate {} id {}", kind, id)));
    }
    map.insert(id, value);
    Ok(())
}

fn require<'a, T>(map: &'a BTreeMap<i64, T>, id: i64, kind: &str) -> Result<&'a T, StoreError> {
    map.get(&id)
        .ok_or_else(|| StoreError::Integrity(format!("unknown {} {}", kind, id)))
}

/// In-memory entity store.
///
/// Readers take a cheap clone of the current `Arc<Catalog>` and work on that
/// snapshot; writers build a modified copy and swap it in, so a search never sees
/// a half-applied write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    catalog: RwLock<Arc<Catalog>>,
}

impl InMemoryStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Load a JSON fixture file
    pub fn from_fixture_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("{}: {}", path.display(), e)))?;
        let fixture: CatalogFixture = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Fixture(format!("{}: {}", path.display(), e)))?;
        let catalog = Catalog::from_fixture(fixture)?;

        tracing::info!(
            "Loaded fixture {} ({} enterprises, {} sites)",
            path.display(),
            catalog.enterprises.len(),
            catalog.sites.len()
        );

        Ok(Self::new(catalog))
    }

    pub async fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().await.clone()
    }

    /// Apply a write atomically: either every change lands or none does
    pub async fn write<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Catalog) -> Result<(), StoreError>,
    {
        let mut guard = self.catalog.write().await;
        let mut next = Catalog::clone(&guard);
        mutate(&mut next)?;
        *guard = Arc::new(next);
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn sites_within_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Site>, StoreError> {
        Ok(self.snapshot().await.sites_within_radius(center, radius_km))
    }

    async fn enterprises_with_offering(
        &self,
        enterprise_ids: &[EnterpriseId],
        facet: OfferingFacet,
        values: &BTreeSet<i64>,
    ) -> Result<HashSet<EnterpriseId>, StoreError> {
        let catalog = self.snapshot().await;
        Ok(enterprise_ids
            .iter()
            .copied()
            .filter(|id| {
                catalog
                    .offerings_of(*id)
                    .any(|offering| Catalog::offering_matches(offering, facet, values))
            })
            .collect())
    }

    async fn enterprise_bands(
        &self,
        enterprise_ids: &[EnterpriseId],
    ) -> Result<HashMap<EnterpriseId, EnterpriseBands>, StoreError> {
        let catalog = self.snapshot().await;
        Ok(enterprise_ids
            .iter()
            .filter_map(|id| catalog.enterprises.get(id))
            .map(|enterprise| {
                (
                    enterprise.id,
                    EnterpriseBands {
                        employees: enterprise.n_employees,
                        sales: enterprise.annual_sales,
                    },
                )
            })
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn enterprise_detail(
        &self,
        enterprise_id: EnterpriseId,
    ) -> Result<Option<EnterpriseDetail>, StoreError> {
        Ok(self.snapshot().await.enterprise_detail(enterprise_id))
    }

    async fn material_taxonomy(&self) -> Result<MaterialTaxonomy, StoreError> {
        Ok(self.snapshot().await.taxonomy())
    }
}

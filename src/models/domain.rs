use crate::models::bands::{EmployeeBand, RevenueBand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type EnterpriseId = i64;
pub type SiteId = i64;
pub type OfferingId = i64;
pub type MaterialTypeId = i64;
pub type CategoryId = i64;
pub type OriginId = i64;
pub type BiobasedMaterialId = i64;

/// Slug of the origin whose offerings may carry biobased base materials
pub const BIOBASED_ORIGIN_SLUG: &str = "biobased";

/// Geographic point on the spherical (WGS84) model, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and inside the latitude/longitude domain
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(point: GeoPoint) -> Self {
        geo::Point::new(point.longitude, point.latitude)
    }
}

/// An enterprise and its identity. Aggregate root of sites and offerings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enterprise {
    pub id: EnterpriseId,
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub n_employees: Option<EmployeeBand>,
    #[serde(default)]
    pub annual_sales: Option<RevenueBand>,
    #[serde(default)]
    pub added: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub updated: Option<chrono::NaiveDate>,
}

/// An address where an enterprise has a site, possibly a production site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub enterprise_id: EnterpriseId,
    pub text_version: String,
    pub location: GeoPoint,
    pub is_production: bool,
}

/// Groups material types for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialTypeCategory {
    pub id: CategoryId,
    pub name: String,
    #[serde(default = "default_order")]
    pub order: u16,
}

/// Usage of a material (insulation, beam...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialType {
    pub id: MaterialTypeId,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub name: String,
    #[serde(default = "default_order")]
    pub order: u16,
}

fn default_order() -> u16 {
    99
}

/// Why a material is ecological (reuse, biobased, recycled...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialOrigin {
    pub id: OriginId,
    pub slug: String,
    pub name: String,
}

impl MaterialOrigin {
    pub fn is_biobased(&self) -> bool {
        self.slug == BIOBASED_ORIGIN_SLUG
    }
}

/// Base substance of a biobased material (wood, straw...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiobasedOriginMaterial {
    pub id: BiobasedMaterialId,
    pub name: String,
}

/// A material produced by an enterprise.
///
/// `(enterprise_id, material_type_id, origin_id)` is unique across offerings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialOffering {
    pub id: OfferingId,
    pub enterprise_id: EnterpriseId,
    pub material_type_id: MaterialTypeId,
    pub origin_id: OriginId,
    #[serde(default)]
    pub site_ids: BTreeSet<SiteId>,
    #[serde(default)]
    pub biobased_ids: BTreeSet<BiobasedMaterialId>,
}

/// A site matched by a search, with its distance to the query center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteHit {
    #[serde(flatten)]
    pub site: Site,
    pub distance_km: f64,
}

/// Offering with its references resolved, as shown on an enterprise page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferingDetail {
    pub id: OfferingId,
    pub material_type: MaterialType,
    pub category: Option<MaterialTypeCategory>,
    pub origin: MaterialOrigin,
    pub biobased: Vec<BiobasedOriginMaterial>,
    pub site_ids: Vec<SiteId>,
}

/// An enterprise with everything it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterpriseDetail {
    pub enterprise: Enterprise,
    pub sites: Vec<Site>,
    pub offerings: Vec<OfferingDetail>,
}

/// A category and its types, both in display order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithTypes {
    pub category: MaterialTypeCategory,
    pub types: Vec<MaterialType>,
}

/// Reference data used to build search forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialTaxonomy {
    pub categories: Vec<CategoryWithTypes>,
    pub uncategorized: Vec<MaterialType>,
    pub origins: Vec<MaterialOrigin>,
    pub biobased_materials: Vec<BiobasedOriginMaterial>,
}

impl MaterialTaxonomy {
    /// Assemble the taxonomy, ordering categories and types by display order then name
    pub fn assemble(
        mut categories: Vec<MaterialTypeCategory>,
        mut types: Vec<MaterialType>,
        mut origins: Vec<MaterialOrigin>,
        mut biobased_materials: Vec<BiobasedOriginMaterial>,
    ) -> Self {
        categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        types.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        origins.sort_by_key(|origin| origin.id);
        biobased_materials.sort_by(|a, b| a.name.cmp(&b.name));

        let grouped = categories
            .into_iter()
            .map(|category| {
                let members = types
                    .iter()
                    .filter(|t| t.category_id == Some(category.id))
                    .cloned()
                    .collect();
                CategoryWithTypes {
                    category,
                    types: members,
                }
            })
            .collect::<Vec<_>>();

        let uncategorized = types
            .into_iter()
            .filter(|t| {
                t.category_id
                    .map_or(true, |id| !grouped.iter().any(|g| g.category.id == id))
            })
            .collect();

        Self {
            categories: grouped,
            uncategorized,
            origins,
            biobased_materials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_validation() {
        assert!(GeoPoint::new(45.0, 3.0).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(90.5, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.1).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_taxonomy_ordering() {
        let categories = vec![
            MaterialTypeCategory { id: 2, name: "Isolation".into(), order: 2 },
            MaterialTypeCategory { id: 1, name: "Structure".into(), order: 1 },
        ];
        let types = vec![
            MaterialType { id: 10, category_id: Some(1), name: "Beams".into(), order: 2 },
            MaterialType { id: 11, category_id: Some(1), name: "Slabs".into(), order: 1 },
            MaterialType { id: 12, category_id: Some(2), name: "Panels".into(), order: 1 },
            MaterialType { id: 13, category_id: None, name: "Paint".into(), order: 99 },
            MaterialType { id: 14, category_id: Some(42), name: "Orphan".into(), order: 1 },
        ];

        let taxonomy = MaterialTaxonomy::assemble(categories, types, vec![], vec![]);

        assert_eq!(taxonomy.categories[0].category.name, "Structure");
        let names: Vec<_> = taxonomy.categories[0].types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Slabs", "Beams"]);
        assert_eq!(taxonomy.categories[1].types.len(), 1);
        let loose: Vec<_> = taxonomy.uncategorized.iter().map(|t| t.id).collect();
        assert_eq!(loose, vec![14, 13]);
    }
}

use crate::models::bands::BandChoice;
use crate::models::domain::{MaterialTaxonomy, SiteHit};
use serde::{Deserialize, Serialize};

/// Response for the search endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub sites: Vec<SiteHit>,
    pub total_results: usize,
}

impl From<Vec<SiteHit>> for SearchResponse {
    fn from(sites: Vec<SiteHit>) -> Self {
        Self {
            total_results: sites.len(),
            sites,
        }
    }
}

/// GeoJSON FeatureCollection of matched sites, consumed by the map view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: PointGeometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub site_id: i64,
    pub enterprise_id: i64,
    pub text_version: String,
    pub is_production: bool,
    pub distance_km: f64,
}

impl From<&[SiteHit]> for FeatureCollection {
    fn from(hits: &[SiteHit]) -> Self {
        let features = hits
            .iter()
            .map(|hit| Feature {
                kind: "Feature".to_string(),
                geometry: PointGeometry {
                    kind: "Point".to_string(),
                    coordinates: [hit.site.location.longitude, hit.site.location.latitude],
                },
                properties: FeatureProperties {
                    site_id: hit.site.id,
                    enterprise_id: hit.site.enterprise_id,
                    text_version: hit.site.text_version.clone(),
                    is_production: hit.site.is_production,
                    distance_km: hit.distance_km,
                },
            })
            .collect();

        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

/// Everything a search form needs to render its facet choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyResponse {
    #[serde(flatten)]
    pub taxonomy: MaterialTaxonomy,
    pub employee_bands: Vec<BandChoice>,
    pub sales_bands: Vec<BandChoice>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub cached_searches: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::{GeoPoint, Site};

    #[test]
    fn test_geojson_coordinates_are_lon_lat() {
        let hits = vec![SiteHit {
            site: Site {
                id: 7,
                enterprise_id: 3,
                text_version: "1 rue des Lilas, Lyon".to_string(),
                location: GeoPoint::new(45.75, 4.85),
                is_production: true,
            },
            distance_km: 1.5,
        }];

        let collection = FeatureCollection::from(hits.as_slice());
        let json = serde_json::to_value(&collection).unwrap();

        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["geometry"]["coordinates"][0], 4.85);
        assert_eq!(json["features"][0]["geometry"]["coordinates"][1], 45.75);
        assert_eq!(json["features"][0]["properties"]["is_production"], true);
        assert_eq!(json["features"][0]["properties"]["text_version"], "1 rue des Lilas, Lyon");
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// A single raw facet value as submitted by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Text(String),
}

impl RawValue {
    /// Blank form fields arrive as empty (or whitespace-only) strings
    pub fn is_blank(&self) -> bool {
        matches!(self, RawValue::Text(text) if text.trim().is_empty())
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

/// Facet name to raw value list, before compilation
pub type RawFilters = HashMap<String, Vec<RawValue>>;

/// Request to search sites around a point
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[validate(range(min = 0.0))]
    #[serde(alias = "radius", alias = "radiusKm")]
    pub radius_km: f64,
    #[serde(default)]
    pub filters: RawFilters,
}

impl SearchRequest {
    /// Parse a web-form style query string.
    ///
    /// `lat`, `lon` and `radius` (or their long names) locate the search; every other
    /// key is a facet, and repeated keys accumulate (`materials=1&materials=2`).
    pub fn from_query_string(query: &str) -> Result<Self, String> {
        let mut latitude = None;
        let mut longitude = None;
        let mut radius_km = None;
        let mut filters = RawFilters::new();

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key)?;
            let value = decode_component(raw_value)?;

            match key.as_str() {
                "lat" | "latitude" => latitude = Some(parse_coordinate(&key, &value)?),
                "lon" | "lng" | "longitude" => longitude = Some(parse_coordinate(&key, &value)?),
                "radius" | "radius_km" => radius_km = Some(parse_coordinate(&key, &value)?),
                // Output selection, not a facet
                "format" => {}
                _ => filters
                    .entry(key.trim_end_matches("[]").to_string())
                    .or_default()
                    .push(RawValue::Text(value)),
            }
        }

        Ok(Self {
            latitude: latitude.ok_or("missing lat parameter")?,
            longitude: longitude.ok_or("missing lon parameter")?,
            radius_km: radius_km.ok_or("missing radius parameter")?,
            filters,
        })
    }
}

fn decode_component(raw: &str) -> Result<String, String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| format!("invalid percent-encoding in {:?}: {}", raw, e))
}

fn parse_coordinate(key: &str, value: &str) -> Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("{} must be a number, got {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form_query() {
        let request = SearchRequest::from_query_string(
            "lat=45.75&lon=4.85&radius=50&materials=1&materials=3&origin=&sales%5B%5D=2",
        )
        .unwrap();

        assert_eq!(request.latitude, 45.75);
        assert_eq!(request.longitude, 4.85);
        assert_eq!(request.radius_km, 50.0);
        assert_eq!(
            request.filters["materials"],
            vec![RawValue::from("1"), RawValue::from("3")]
        );
        assert_eq!(request.filters["origin"], vec![RawValue::from("")]);
        assert_eq!(request.filters["sales"], vec![RawValue::from("2")]);
    }

    #[test]
    fn test_parse_form_query_missing_center() {
        assert!(SearchRequest::from_query_string("lon=4.85&radius=50").is_err());
        assert!(SearchRequest::from_query_string("lat=abc&lon=4.85&radius=50").is_err());
    }

    #[test]
    fn test_json_request_accepts_mixed_values() {
        let json = r#"{
            "lat": 0.0,
            "lon": 0.0,
            "radiusKm": 10,
            "filters": {"materials": [1, "2"], "nemployees": ["", "250"]}
        }"#;
        let request: SearchRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.filters["materials"], vec![RawValue::Int(1), RawValue::from("2")]);
        assert!(request.filters["nemployees"][0].is_blank());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let request = SearchRequest {
            latitude: 95.0,
            longitude: 0.0,
            radius_km: -1.0,
            filters: RawFilters::new(),
        };
        assert!(request.validate().is_err());
    }
}

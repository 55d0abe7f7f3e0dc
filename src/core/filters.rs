use crate::core::error::SearchError;
use crate::models::{Band, BandRange, EmployeeBand, RawFilters, RawValue, RevenueBand};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const FACET_MATERIALS: &str = "materials";
pub const FACET_ORIGIN: &str = "origin";
pub const FACET_BIOBASED: &str = "biobased";
pub const FACET_EMPLOYEES: &str = "nemployees";
pub const FACET_SALES: &str = "sales";

/// Facets answered through an enterprise's material offerings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingFacet {
    /// Offering material type id
    Materials,
    /// Offering origin id
    Origin,
    /// Biobased base material linked to the offering
    Biobased,
}

impl fmt::Display for OfferingFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OfferingFacet::Materials => FACET_MATERIALS,
            OfferingFacet::Origin => FACET_ORIGIN,
            OfferingFacet::Biobased => FACET_BIOBASED,
        };
        f.write_str(name)
    }
}

/// Normalized predicate set. A `None` facet imposes no constraint.
///
/// Id sets are ordered so the serialized form is stable and usable as a cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetFilters {
    pub materials: Option<BTreeSet<i64>>,
    pub origin: Option<BTreeSet<i64>>,
    pub biobased: Option<BTreeSet<i64>>,
    pub nemployees: Option<BandRange<EmployeeBand>>,
    pub sales: Option<BandRange<RevenueBand>>,
}

impl FacetFilters {
    pub fn is_empty(&self) -> bool {
        self.materials.is_none()
            && self.origin.is_none()
            && self.biobased.is_none()
            && self.nemployees.is_none()
            && self.sales.is_none()
    }

    pub fn offering_set(&self, facet: OfferingFacet) -> Option<&BTreeSet<i64>> {
        match facet {
            OfferingFacet::Materials => self.materials.as_ref(),
            OfferingFacet::Origin => self.origin.as_ref(),
            OfferingFacet::Biobased => self.biobased.as_ref(),
        }
    }

    pub fn has_band_constraint(&self) -> bool {
        self.nemployees.is_some() || self.sales.is_some()
    }
}

/// Compile raw facet values into a normalized predicate set
///
/// Blank facets are dropped, unknown facet keys ignored. Malformed ids, unknown
/// band codes or inverted band ranges are rejected.
pub fn compile_filters(raw: &RawFilters) -> Result<FacetFilters, SearchError> {
    let mut filters = FacetFilters::default();

    for (key, values) in raw {
        if values.iter().all(RawValue::is_blank) {
            continue;
        }

        match key.as_str() {
            FACET_MATERIALS => filters.materials = Some(parse_id_set(key, values)?),
            FACET_ORIGIN => filters.origin = Some(parse_id_set(key, values)?),
            FACET_BIOBASED => filters.biobased = Some(parse_id_set(key, values)?),
            FACET_EMPLOYEES => filters.nemployees = Some(parse_band_range::<EmployeeBand>(values)?),
            FACET_SALES => filters.sales = Some(parse_band_range::<RevenueBand>(values)?),
            other => {
                tracing::debug!("Ignoring unknown facet {:?}", other);
            }
        }
    }

    Ok(filters)
}

fn parse_id_set(facet: &str, values: &[RawValue]) -> Result<BTreeSet<i64>, SearchError> {
    values
        .iter()
        .filter(|value| !value.is_blank())
        .map(|value| match value {
            RawValue::Int(id) => Ok(*id),
            RawValue::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| SearchError::invalid(format!("{} expects integer ids, got {:?}", facet, text))),
        })
        .collect()
}

fn parse_band_range<B: Band>(values: &[RawValue]) -> Result<BandRange<B>, SearchError> {
    match values {
        [single] => Ok(BandRange::exactly(parse_band::<B>(single)?.unwrap_or_else(B::lowest))),
        [min, max] => {
            let min = parse_band::<B>(min)?.unwrap_or_else(B::lowest);
            let max = parse_band::<B>(max)?.unwrap_or_else(B::highest);
            BandRange::new(min, max).ok_or_else(|| {
                SearchError::invalid(format!(
                    "{} range is inverted: {} is above {}",
                    B::KIND,
                    min.code(),
                    max.code()
                ))
            })
        }
        _ => Err(SearchError::invalid(format!(
            "{} expects one band or a (min, max) pair, got {} values",
            B::KIND,
            values.len()
        ))),
    }
}

/// A blank side of a range is open; anything else must be a known band code.
fn parse_band<B: Band>(value: &RawValue) -> Result<Option<B>, SearchError> {
    let code = match value {
        _ if value.is_blank() => return Ok(None),
        RawValue::Int(code) => u32::try_from(*code).ok(),
        RawValue::Text(text) => text.trim().parse::<u32>().ok(),
    };

    code.and_then(B::from_code)
        .map(Some)
        .ok_or_else(|| SearchError::invalid(format!("unknown {} band {:?}", B::KIND, value)))
}

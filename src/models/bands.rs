use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered enumeration bucket standing in for a numeric range.
///
/// Bands are ordered by their declaration rank. The numeric `code` is what gets
/// stored and submitted by forms, but codes are not evenly spaced, so every
/// comparison must go through [`Band::rank`] (or `Ord`), never through the code.
pub trait Band: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// All bands, lowest rank first.
    const ALL: &'static [Self];

    /// Facet name used when reporting errors.
    const KIND: BandKind;

    fn code(self) -> u32;

    fn label(self) -> &'static str;

    fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|band| band.code() == code)
    }

    fn rank(self) -> usize {
        Self::ALL
            .iter()
            .position(|band| *band == self)
            .unwrap_or(usize::MAX)
    }

    fn lowest() -> Self {
        Self::ALL[0]
    }

    fn highest() -> Self {
        Self::ALL[Self::ALL.len() - 1]
    }
}

/// Which banded attribute of an enterprise a range applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandKind {
    Employees,
    Sales,
}

impl fmt::Display for BandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandKind::Employees => write!(f, "nemployees"),
            BandKind::Sales => write!(f, "sales"),
        }
    }
}

/// Employee head-count band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum EmployeeBand {
    None,
    Micro,
    Small,
    Medium,
    Intermediate,
    Large,
    VeryLarge,
}

impl Band for EmployeeBand {
    const ALL: &'static [Self] = &[
        EmployeeBand::None,
        EmployeeBand::Micro,
        EmployeeBand::Small,
        EmployeeBand::Medium,
        EmployeeBand::Intermediate,
        EmployeeBand::Large,
        EmployeeBand::VeryLarge,
    ];

    const KIND: BandKind = BandKind::Employees;

    fn code(self) -> u32 {
        match self {
            EmployeeBand::None => 0,
            EmployeeBand::Micro => 1,
            EmployeeBand::Small => 10,
            EmployeeBand::Medium => 50,
            EmployeeBand::Intermediate => 250,
            EmployeeBand::Large => 1000,
            EmployeeBand::VeryLarge => 5000,
        }
    }

    fn label(self) -> &'static str {
        match self {
            EmployeeBand::None => "Aucun salarié",
            EmployeeBand::Micro => "1 à 9 salariés",
            EmployeeBand::Small => "10 à 49 salariés",
            EmployeeBand::Medium => "50 à 249 salariés",
            EmployeeBand::Intermediate => "250 à 999 salariés",
            EmployeeBand::Large => "1000 à 4999 salariés",
            EmployeeBand::VeryLarge => "5000 salariés et plus",
        }
    }
}

/// Annual revenue band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RevenueBand {
    UnderHundredThousand,
    UnderOneMillion,
    UnderTenMillions,
    UnderFiftyMillions,
    UnderTwoHundredMillions,
    AboveTwoHundredMillions,
}

impl Band for RevenueBand {
    const ALL: &'static [Self] = &[
        RevenueBand::UnderHundredThousand,
        RevenueBand::UnderOneMillion,
        RevenueBand::UnderTenMillions,
        RevenueBand::UnderFiftyMillions,
        RevenueBand::UnderTwoHundredMillions,
        RevenueBand::AboveTwoHundredMillions,
    ];

    const KIND: BandKind = BandKind::Sales;

    fn code(self) -> u32 {
        match self {
            RevenueBand::UnderHundredThousand => 1,
            RevenueBand::UnderOneMillion => 2,
            RevenueBand::UnderTenMillions => 3,
            RevenueBand::UnderFiftyMillions => 4,
            RevenueBand::UnderTwoHundredMillions => 5,
            RevenueBand::AboveTwoHundredMillions => 6,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RevenueBand::UnderHundredThousand => "Moins de 100 k€",
            RevenueBand::UnderOneMillion => "100 k€ à 1 M€",
            RevenueBand::UnderTenMillions => "1 M€ à 10 M€",
            RevenueBand::UnderFiftyMillions => "10 M€ à 50 M€",
            RevenueBand::UnderTwoHundredMillions => "50 M€ à 200 M€",
            RevenueBand::AboveTwoHundredMillions => "200 M€ et plus",
        }
    }
}

macro_rules! band_code_conversions {
    ($band:ty) => {
        impl TryFrom<u32> for $band {
            type Error = String;

            fn try_from(code: u32) -> Result<Self, Self::Error> {
                <$band as Band>::from_code(code)
                    .ok_or_else(|| format!("unknown {} band code {}", <$band as Band>::KIND, code))
            }
        }

        impl From<$band> for u32 {
            fn from(band: $band) -> u32 {
                band.code()
            }
        }
    };
}

band_code_conversions!(EmployeeBand);
band_code_conversions!(RevenueBand);

/// Inclusive range of bands, ordered by rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BandRange<B> {
    pub min: B,
    pub max: B,
}

impl<B: Band> BandRange<B> {
    /// Build a range, rejecting `min` ranked above `max`
    pub fn new(min: B, max: B) -> Option<Self> {
        (min.rank() <= max.rank()).then_some(Self { min, max })
    }

    pub fn exactly(band: B) -> Self {
        Self { min: band, max: band }
    }

    /// An unknown band never falls within a range.
    pub fn contains(&self, band: Option<B>) -> bool {
        match band {
            Some(band) => self.min.rank() <= band.rank() && band.rank() <= self.max.rank(),
            None => false,
        }
    }
}

/// A band choice as offered to search forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandChoice {
    pub code: u32,
    pub label: String,
}

pub fn band_choices<B: Band>() -> Vec<BandChoice> {
    B::ALL
        .iter()
        .map(|band| BandChoice {
            code: band.code(),
            label: band.label().to_string(),
        })
        .collect()
}

//! Report sections and fixed per-section maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the five fixed narrative slots of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "chloralkaliInDepth")]
    ChloralkaliInDepth,
    #[serde(rename = "chloralkaliSummary")]
    ChloralkaliSummary,
    #[serde(rename = "chloralkaliComparison")]
    ChloralkaliComparison,
    #[serde(rename = "electrodialysisInDepth")]
    ElectrodialysisInDepth,
    #[serde(rename = "electrodialysisSummary")]
    ElectrodialysisSummary,
}

impl Section {
    /// every section, in report order
    pub const ALL: [Section; 5] = [
        Section::ChloralkaliInDepth,
        Section::ChloralkaliSummary,
        Section::ChloralkaliComparison,
        Section::ElectrodialysisInDepth,
        Section::ElectrodialysisSummary,
    ];

    /// wire and storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::ChloralkaliInDepth => "chloralkaliInDepth",
            Section::ChloralkaliSummary => "chloralkaliSummary",
            Section::ChloralkaliComparison => "chloralkaliComparison",
            Section::ElectrodialysisInDepth => "electrodialysisInDepth",
            Section::ElectrodialysisSummary => "electrodialysisSummary",
        }
    }

    /// blob file name for this section
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }

    fn index(&self) -> usize {
        match self {
            Section::ChloralkaliInDepth => 0,
            Section::ChloralkaliSummary => 1,
            Section::ChloralkaliComparison => 2,
            Section::ElectrodialysisInDepth => 3,
            Section::ElectrodialysisSummary => 4,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// error for an unrecognized section name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown section: {0}")]
pub struct UnknownSection(pub String);

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

/// A total map from every [`Section`] to a value.
///
/// Serializes as a JSON object keyed by section name. Deserializing fills
/// absent sections with `T::default()`, which is how a partial content map
/// defaults missing sections to the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sections<T> {
    values: [T; 5],
}

impl<T> Sections<T> {
    /// build a map by computing each section's value
    pub fn from_fn(mut f: impl FnMut(Section) -> T) -> Self {
        Self {
            values: Section::ALL.map(&mut f),
        }
    }

    /// the value for a section
    pub fn get(&self, section: Section) -> &T {
        &self.values[section.index()]
    }

    /// replace the value for a section
    pub fn set(&mut self, section: Section, value: T) {
        self.values[section.index()] = value;
    }

    /// iterate over (section, value) in report order
    pub fn iter(&self) -> impl Iterator<Item = (Section, &T)> {
        Section::ALL.into_iter().zip(self.values.iter())
    }

    /// transform every value
    pub fn map<U>(self, mut f: impl FnMut(Section, T) -> U) -> Sections<U> {
        let mut index = 0;
        Sections {
            values: self.values.map(|value| {
                let section = Section::ALL[index];
                index += 1;
                f(section, value)
            }),
        }
    }
}

impl<T: Default> Sections<T> {
    /// build a total map from a partial one; missing sections get `T::default()`
    pub fn from_partial(partial: impl IntoIterator<Item = (Section, T)>) -> Self {
        let mut sections = Self::from_fn(|_| T::default());
        for (section, value) in partial {
            sections.set(section, value);
        }
        sections
    }
}

impl<T: Serialize> Serialize for Sections<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for Sections<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let partial = BTreeMap::<Section, T>::deserialize(deserializer)?;
        Ok(Self::from_partial(partial))
    }
}

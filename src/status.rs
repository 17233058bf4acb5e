//! Decoding of the upstream `/api/v1/status/tsdb` payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// A single cardinality statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    pub name: String,
    pub value: u64,
}

impl Statistic {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The four statistic groups reported by one status response.
///
/// Groups absent from the payload (or `null`) decode to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(default, deserialize_with = "nullable_list")]
    pub series_count_by_metric_name: Vec<Statistic>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub label_value_count_by_label_name: Vec<Statistic>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub memory_in_bytes_by_label_name: Vec<Statistic>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub series_count_by_label_value_pair: Vec<Statistic>,
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<Statistic>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Statistic>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct Wrapped {
    #[serde(default)]
    data: Option<StatusSnapshot>,
}

/// Expected shape of the status response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Envelope {
    /// Statistics nested under a top-level `data` object
    Wrapped,
    /// Statistics at the top level
    Bare,
    /// `data` when present, top level otherwise
    #[default]
    Auto,
}

impl FromStr for Envelope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wrapped" | "data" => Ok(Envelope::Wrapped),
            "bare" | "unwrapped" => Ok(Envelope::Bare),
            "auto" => Ok(Envelope::Auto),
            other => Err(format!(
                "unknown envelope {other:?}, expected wrapped, bare or auto"
            )),
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Wrapped => write!(f, "wrapped"),
            Envelope::Bare => write!(f, "bare"),
            Envelope::Auto => write!(f, "auto"),
        }
    }
}

/// The statistic groups, in the order they are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SeriesByMetricName,
    LabelValuesByLabelName,
    MemoryByLabelName,
    SeriesByLabelPair,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::SeriesByMetricName,
        Category::LabelValuesByLabelName,
        Category::MemoryByLabelName,
        Category::SeriesByLabelPair,
    ];

    /// Name of the exported metric family
    pub fn metric_name(self) -> &'static str {
        match self {
            Category::SeriesByMetricName => "SeriesCountByMetricName",
            Category::LabelValuesByLabelName => "LabelValueCountByLabelName",
            Category::MemoryByLabelName => "MemoryInBytesByLabelName",
            Category::SeriesByLabelPair => "SeriesCountByLabelValuePair",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Category::SeriesByMetricName => "series count by series name",
            Category::LabelValuesByLabelName => "labels count by label name",
            Category::MemoryByLabelName => "Memory count by label name",
            Category::SeriesByLabelPair => "series count by label value pair",
        }
    }

    /// Label key carrying the statistic name
    pub fn label_key(self) -> &'static str {
        match self {
            Category::SeriesByMetricName => "metric",
            Category::LabelValuesByLabelName | Category::MemoryByLabelName => "label",
            Category::SeriesByLabelPair => "pair",
        }
    }
}

impl StatusSnapshot {
    /// Decode a response body in the given envelope shape.
    pub fn parse(body: &[u8], envelope: Envelope) -> Result<Self, ParseError> {
        let snapshot = match envelope {
            Envelope::Wrapped => serde_json::from_slice::<Wrapped>(body)?
                .data
                .unwrap_or_default(),
            Envelope::Bare => serde_json::from_slice(body)?,
            Envelope::Auto => {
                let value: Value = serde_json::from_slice(body)?;
                let inner = match value {
                    Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
                        map.remove("data").unwrap_or_default()
                    }
                    other => other,
                };
                serde_json::from_value(inner)?
            }
        };

        Ok(snapshot)
    }

    pub fn statistics(&self, category: Category) -> &[Statistic] {
        match category {
            Category::SeriesByMetricName => &self.series_count_by_metric_name,
            Category::LabelValuesByLabelName => &self.label_value_count_by_label_name,
            Category::MemoryByLabelName => &self.memory_in_bytes_by_label_name,
            Category::SeriesByLabelPair => &self.series_count_by_label_value_pair,
        }
    }

    /// Every statistic tagged with its category.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &Statistic)> {
        Category::ALL.into_iter().flat_map(move |category| {
            self.statistics(category)
                .iter()
                .map(move |statistic| (category, statistic))
        })
    }

    pub fn len(&self) -> usize {
        Category::ALL
            .iter()
            .map(|category| self.statistics(*category).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

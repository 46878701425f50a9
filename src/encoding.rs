use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::assemble::FeatureRow;

pub const UNKNOWN: &str = "UNKNOWN";

pub const CATEGORICAL_COLUMNS: [&str; 4] = [
    "player_position",
    "team_coverage_type",
    "offense_formation",
    "play_direction",
];

/// Fixed label <-> index mapping. Classes are sorted and always contain
/// `UNKNOWN`; once fitted the mapping never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    classes: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut set: BTreeSet<String> = BTreeSet::new();
        set.insert(UNKNOWN.to_string());
        for value in values.into_iter().flatten() {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                set.insert(trimmed.to_string());
            }
        }
        Self {
            classes: set.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn unknown_index(&self) -> usize {
        self.index_of(UNKNOWN).unwrap_or(0)
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    /// Missing and unseen labels both resolve to `UNKNOWN`.
    pub fn encode(&self, value: Option<&str>) -> usize {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| self.index_of(v))
            .unwrap_or_else(|| self.unknown_index())
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSet {
    pub encoders: BTreeMap<String, CategoryEncoder>,
}

impl EncoderSet {
    /// Fits one encoder per categorical column over receiver rows.
    pub fn fit(rows: &[FeatureRow]) -> Self {
        let receivers: Vec<&FeatureRow> = rows.iter().filter(|r| r.role.is_receiver()).collect();
        let encoders = CATEGORICAL_COLUMNS
            .iter()
            .map(|col| {
                let encoder = CategoryEncoder::fit(receivers.iter().map(|r| r.category(col)));
                (col.to_string(), encoder)
            })
            .collect();
        Self { encoders }
    }

    pub fn get(&self, column: &str) -> Option<&CategoryEncoder> {
        self.encoders.get(column)
    }

    /// Encoded value of `column` for `row`; a column with no encoder maps
    /// everything to 0.
    pub fn encode(&self, column: &str, row: &FeatureRow) -> f64 {
        self.get(column)
            .map(|enc| enc.encode(row.category(column)) as f64)
            .unwrap_or(0.0)
    }
}

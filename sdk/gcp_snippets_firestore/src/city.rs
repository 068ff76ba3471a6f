//! The `City` entity stored by the samples.

use serde::{Deserialize, Serialize};

/// A city document. Unset fields are not written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct City {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
}

impl City {
    /// A city with only its name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_details(
        name: &str,
        state: &str,
        country: &str,
        capital: bool,
        population: i64,
        regions: &[&str],
    ) -> Self {
        Self {
            name: Some(name.to_string()),
            state: Some(state.to_string()),
            country: Some(country.to_string()),
            capital: Some(capital),
            population: Some(population),
            regions: Some(regions.iter().map(|r| r.to_string()).collect()),
        }
    }
}

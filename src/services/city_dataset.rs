//! Preloaded city dataset for offline lookups
//!
//! The dataset is a JSON array of city records loaded once at startup. Each
//! record is decoded into [`City`] and checked (non-empty name, coordinates in
//! range); a single bad row fails the whole load with a [`DatasetError`] that
//! names the offending index.
//!
//! ```json
//! [
//!   {"name": "Paris", "country": "France", "admin1": "Île-de-France",
//!    "latitude": 48.8566, "longitude": 2.3522, "population": 2148000}
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read city dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("City dataset {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("City record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
}

impl City {
    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} out of range", self.longitude));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CityDataset {
    cities: Vec<City>,
    lowercase_names: Vec<String>,
}

impl CityDataset {
    pub fn from_records(cities: Vec<City>) -> Result<Self, DatasetError> {
        for (index, city) in cities.iter().enumerate() {
            city.check()
                .map_err(|reason| DatasetError::InvalidRecord { index, reason })?;
        }
        let lowercase_names = cities.iter().map(|c| c.name.to_lowercase()).collect();
        Ok(Self {
            cities,
            lowercase_names,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cities: Vec<City> =
            serde_json::from_slice(&raw).map_err(|source| DatasetError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let dataset = Self::from_records(cities)?;
        tracing::info!(path = %path.display(), cities = dataset.len(), "Loaded city dataset");
        Ok(dataset)
    }

    /// Cities whose name equals (`exact`) or contains the query, ignoring case.
    /// Results keep dataset order.
    pub fn search(&self, query: &str, exact: bool) -> Vec<&City> {
        let needle = query.to_lowercase();
        self.cities
            .iter()
            .zip(&self.lowercase_names)
            .filter(|(_, name)| {
                if exact {
                    **name == needle
                } else {
                    name.contains(&needle)
                }
            })
            .map(|(city, _)| city)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::config::ConfigError;

/// A target location for ingestion. The name is the key used in every
/// persisted document.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct City {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidCity {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid("latitude must be within [-90, 90]"));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid("longitude must be within [-180, 180]"));
        }
        Ok(())
    }
}

/// Cities ingested when no cities file is configured.
pub fn default_cities() -> Vec<City> {
    vec![
        City::new("Nairobi", -1.286389, 36.817223),
        City::new("Mombasa", -4.0435, 39.6682),
        City::new("Kampala", 0.3476, 32.5825),
    ]
}

/// Validated, ordered list of cities. Can only be built through `new`, so a
/// registry in hand is always non-empty with unique names and sane
/// coordinates.
#[derive(Clone, Debug)]
pub struct CityRegistry {
    cities: Vec<City>,
}

impl CityRegistry {
    pub fn new(cities: Vec<City>) -> Result<Self, ConfigError> {
        if cities.is_empty() {
            return Err(ConfigError::NoCities);
        }

        let mut seen = HashSet::new();
        for city in &cities {
            city.validate()?;
            if !seen.insert(city.name.as_str()) {
                return Err(ConfigError::DuplicateCity(city.name.clone()));
            }
        }

        Ok(Self { cities })
    }

    /// Load a JSON array of `{name, latitude, longitude}` objects.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::CitiesFile {
            path: path.to_path_buf(),
            source,
        })?;
        let cities: Vec<City> =
            serde_json::from_str(&content).map_err(|source| ConfigError::CitiesParse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(cities)
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

impl Default for CityRegistry {
    fn default() -> Self {
        Self {
            cities: default_cities(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_registry_is_valid() {
        let registry = CityRegistry::new(default_cities()).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.cities()[0].name, "Nairobi");
    }

    #[test]
    fn test_rejects_empty_registry() {
        assert!(matches!(
            CityRegistry::new(vec![]),
            Err(ConfigError::NoCities)
        ));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let cities = vec![
            City::new("Nairobi", -1.28, 36.81),
            City::new("Nairobi", -1.30, 36.80),
        ];
        match CityRegistry::new(cities) {
            Err(ConfigError::DuplicateCity(name)) => assert_eq!(name, "Nairobi"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        for city in [
            City::new("North", 91.0, 0.0),
            City::new("West", 0.0, -180.5),
            City::new("Nowhere", f64::NAN, 0.0),
            City::new("  ", 0.0, 0.0),
        ] {
            assert!(
                matches!(
                    CityRegistry::new(vec![city.clone()]),
                    Err(ConfigError::InvalidCity { .. })
                ),
                "{:?} should be rejected",
                city
            );
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Kisumu", "latitude": -0.0917, "longitude": 34.768}}]"#
        )
        .unwrap();

        let registry = CityRegistry::from_file(file.path()).unwrap();
        assert_eq!(registry.cities(), &[City::new("Kisumu", -0.0917, 34.768)]);
    }

    #[test]
    fn test_from_file_malformed_entry() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name": "Kisumu", "latitude": "north"}}]"#).unwrap();

        assert!(matches!(
            CityRegistry::from_file(file.path()),
            Err(ConfigError::CitiesParse { .. })
        ));
    }
}

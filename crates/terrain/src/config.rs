use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TerrainError;

/// Tile subdivision, altitude bounds and cache size of a [`Ground`](crate::Ground).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    /// Width of a level-0 tile, in metres.
    pub unit_size: f64,
    pub min_altitude: f64,
    pub max_altitude: f64,
    /// Tiles per side a tile splits into at the next level.
    pub factor: i32,
    /// Heightfield samples per side.
    pub terrain_res: usize,
    /// Texels per heightfield cell.
    pub texture_res: usize,
    pub max_lod: i32,
    /// Resident tiles above which the least recently used ones are evicted.
    pub max_cache_size: usize,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            unit_size: 6000.0,
            min_altitude: -2000.0,
            max_altitude: 4000.0,
            factor: 4,
            terrain_res: 33,
            texture_res: 8,
            max_lod: 3,
            max_cache_size: 2000,
        }
    }
}

impl GroundConfig {
    pub fn validate(&self) -> Result<(), TerrainError> {
        let fail = |msg: String| Err(TerrainError::BadConfiguration(msg));
        if !self.unit_size.is_finite() || self.unit_size <= 0.0 {
            return fail(format!("unit size must be positive, got {}", self.unit_size));
        }
        if self.factor < 2 {
            return fail(format!("factor must be at least 2, got {}", self.factor));
        }
        if self.terrain_res < 2 {
            return fail(format!(
                "terrain resolution must be at least 2, got {}",
                self.terrain_res
            ));
        }
        if self.texture_res < 1 {
            return fail("texture resolution must be at least 1".to_string());
        }
        if self.max_altitude.partial_cmp(&self.min_altitude) != Some(Ordering::Greater) {
            return fail(format!(
                "altitude range [{}, {}] is empty",
                self.min_altitude, self.max_altitude
            ));
        }
        if self.max_lod < 0 {
            return fail(format!("max LOD must not be negative, got {}", self.max_lod));
        }
        if self.max_cache_size == 0 {
            return fail("cache size must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn altitude_range(&self) -> f64 {
        self.max_altitude - self.min_altitude
    }

    /// Load and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TerrainError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "loaded ground config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = GroundConfig::default();
        config.validate().unwrap();
        assert_eq!(config.altitude_range(), 6000.0);
    }

    #[test]
    fn rejects_bad_values() {
        let cases: [fn(&mut GroundConfig); 8] = [
            |c| c.unit_size = 0.0,
            |c| c.unit_size = f64::NAN,
            |c| c.factor = 1,
            |c| c.terrain_res = 1,
            |c| c.texture_res = 0,
            |c| c.max_altitude = c.min_altitude,
            |c| c.max_lod = -1,
            |c| c.max_cache_size = 0,
        ];
        for mutate in cases {
            let mut config = GroundConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(TerrainError::BadConfiguration(_))
            ));
        }
    }

    #[test]
    fn loads_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "unit_size": 1000.0, "max_lod": 5 }}"#).unwrap();
        let config = GroundConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.unit_size, 1000.0);
        assert_eq!(config.max_lod, 5);
        assert_eq!(config.terrain_res, 33);
    }

    #[test]
    fn invalid_json_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ground.json");
        std::fs::write(&path, r#"{ "factor": 1 }"#).unwrap();
        assert!(matches!(
            GroundConfig::from_json_file(&path),
            Err(TerrainError::BadConfiguration(_))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            GroundConfig::from_json_file(&path),
            Err(TerrainError::Json(_))
        ));
        assert!(matches!(
            GroundConfig::from_json_file(dir.path().join("missing.json")),
            Err(TerrainError::Io(_))
        ));
    }
}

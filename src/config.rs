use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PwgError, Result};
use crate::header::ContainerVersion;
use crate::random::{CipherKind, RandomPool};

/// Settings for the generator and the command line front end, stored as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptConfig {
    /// Keystream backend for the random generator
    pub cipher: CipherKind,
    /// Seed file read at start and rewritten after use
    pub seed_file: Option<PathBuf>,
    /// Stir system entropy into the pool before first use
    pub randomize_on_start: bool,
    /// Container version produced by `encrypt`
    pub container_version: u8,
}

impl Default for CryptConfig {
    fn default() -> Self {
        Self {
            cipher: CipherKind::default(),
            seed_file: None,
            randomize_on_start: true,
            container_version: ContainerVersion::CURRENT.as_byte(),
        }
    }
}

impl CryptConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&data)?;
        if let Some(name) = value.get("cipher").and_then(|v| v.as_str()) {
            name.parse::<CipherKind>()?;
        }
        let config: CryptConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.version()?;
        Ok(())
    }

    pub fn version(&self) -> Result<ContainerVersion> {
        ContainerVersion::from_byte(self.container_version).ok_or_else(|| {
            PwgError::Config(<serde_json::Error as serde::de::Error>::custom(format!(
                "unknown container version {}",
                self.container_version
            )))
        })
    }

    /// Build a generator as configured: optional seed file, then system entropy
    pub fn open_pool(&self) -> Result<RandomPool> {
        let mut pool = RandomPool::new(self.cipher)?;
        if let Some(seed) = &self.seed_file {
            match pool.read_seed_file(seed) {
                Ok(()) => log::debug!("read seed file {}", seed.display()),
                Err(e) => log::warn!("could not read seed file {}: {}", seed.display(), e),
            }
        }
        if self.randomize_on_start {
            pool.randomize();
        }
        Ok(pool)
    }

    /// Persist fresh generator output to the seed file, if one is configured
    pub fn close_pool(&self, pool: &mut RandomPool) -> Result<()> {
        if let Some(seed) = &self.seed_file {
            pool.write_seed_file(seed)?;
        }
        Ok(())
    }
}

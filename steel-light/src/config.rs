//! Light engine configuration and world vertical bounds.

use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../../package-content/light_config.json5");

/// Most sections a world may have. Edge-check sets store section indices as `i16`.
const MAX_SECTION_COUNT: i32 = 4096;

/// Errors raised while loading a [`LightConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or written.
    #[error("failed to access light config: {0}")]
    Io(#[from] io::Error),
    /// The config file is not valid JSON5 for [`LightConfig`].
    #[error("failed to parse light config: {0}")]
    Parse(#[from] serde_json5::Error),
    /// A value is out of range.
    #[error("invalid light config: {0}")]
    Invalid(&'static str),
}

/// Configuration of a light manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Whether sky light is computed at all.
    pub has_sky_light: bool,
    /// Lowest real section index.
    pub min_section: i32,
    /// Highest real section index (inclusive).
    pub max_section: i32,
    /// Initial capacity of each propagation queue.
    pub queue_capacity: usize,
    /// Flushes slower than this many milliseconds are logged as warnings.
    pub slow_flush_warn_ms: u64,
}

impl LightConfig {
    /// Parses and validates a JSON5 config.
    pub fn from_json5(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json5::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`, writing the bundled default there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let config_str = fs::read_to_string(path)?;
            return Self::from_json5(&config_str);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        log::info!("Wrote default light config to {}", path.display());
        Self::from_json5(DEFAULT_CONFIG)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_section > self.max_section {
            return Err(ConfigError::Invalid(
                "min_section must not be greater than max_section",
            ));
        }
        if self.max_section - self.min_section + 1 > MAX_SECTION_COUNT {
            return Err(ConfigError::Invalid("a world may have at most 4096 sections"));
        }
        if i32::from(i16::MIN) + 1 > self.min_section || self.max_section >= i32::from(i16::MAX) {
            return Err(ConfigError::Invalid("section indices must fit in an i16"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be greater than 0"));
        }
        Ok(())
    }

    /// The vertical bounds described by this config.
    #[must_use]
    pub fn world_bounds(&self) -> WorldBounds {
        WorldBounds::new(self.min_section, self.max_section)
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            has_sky_light: true,
            min_section: -4,
            max_section: 19,
            queue_capacity: 4096,
            slow_flush_warn_ms: 50,
        }
    }
}

/// Vertical extent of a world in sections.
///
/// Light storage covers one extra virtual section below and above the real
/// range: the one above seeds sky light, the one below terminates block light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldBounds {
    /// Lowest real section index.
    pub min_section: i32,
    /// Highest real section index (inclusive).
    pub max_section: i32,
}

impl WorldBounds {
    /// Creates bounds from an inclusive real section range.
    #[must_use]
    pub const fn new(min_section: i32, max_section: i32) -> Self {
        debug_assert!(min_section <= max_section);
        Self {
            min_section,
            max_section,
        }
    }

    /// Lowest light section index.
    #[must_use]
    pub const fn min_light_section(self) -> i32 {
        self.min_section - 1
    }

    /// Highest light section index.
    #[must_use]
    pub const fn max_light_section(self) -> i32 {
        self.max_section + 1
    }

    /// Number of real sections.
    #[must_use]
    pub const fn section_count(self) -> usize {
        (self.max_section - self.min_section + 1) as usize
    }

    /// Number of light sections (real sections plus the two virtual ones).
    #[must_use]
    pub const fn light_section_count(self) -> usize {
        self.section_count() + 2
    }

    /// Lowest real block y.
    #[must_use]
    pub const fn min_block_y(self) -> i32 {
        self.min_section << 4
    }

    /// Highest real block y.
    #[must_use]
    pub const fn max_block_y(self) -> i32 {
        (self.max_section << 4) | 15
    }

    /// Whether `y` lies inside the real world.
    #[must_use]
    pub const fn contains_block_y(self, y: i32) -> bool {
        y >= self.min_block_y() && y <= self.max_block_y()
    }

    /// Index of a real section into per-section arrays such as emptiness maps.
    #[must_use]
    pub const fn section_index(self, section_y: i32) -> Option<usize> {
        if section_y < self.min_section || section_y > self.max_section {
            None
        } else {
            Some((section_y - self.min_section) as usize)
        }
    }

    /// Index of a light section into per-light-section arrays.
    #[must_use]
    pub const fn light_section_index(self, section_y: i32) -> Option<usize> {
        if section_y < self.min_light_section() || section_y > self.max_light_section() {
            None
        } else {
            Some((section_y - self.min_light_section()) as usize)
        }
    }
}

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::MapConfig;
use crate::cluster::ClusterOptions;
use crate::constants::{
    CLUSTER_MAX_ZOOM, CLUSTER_RADIUS, DEFAULT_FEED_PATH, DEFAULT_FEED_URL, DEFAULT_PORT,
    DEFAULT_SCREEN_HEIGHT,
};
use crate::entry::Region;
use crate::panel::{Easing, PanelGeometry};
use crate::selection::SelectionMatch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub feed_url: String,
    pub feed_path: String,
    pub port: u16,
    pub screen_height: f64,
    pub cluster_radius: f64,
    pub max_zoom: u8,
    pub selection_match: SelectionMatch,
    pub panel_easing: Easing,
    pub initial_region: Region,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            feed_path: DEFAULT_FEED_PATH.to_string(),
            port: DEFAULT_PORT,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            cluster_radius: CLUSTER_RADIUS,
            max_zoom: CLUSTER_MAX_ZOOM,
            selection_match: SelectionMatch::default(),
            panel_easing: Easing::default(),
            initial_region: Region::default(),
        }
    }
}

impl Settings {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut settings = Settings::default();
        if !config_path.exists() {
            return Ok(settings);
        }

        let file = File::open(config_path)
            .with_context(|| format!("Failed to open config file {}", config_path.display()))?;
        let reader = BufReader::new(file);
        let mut config_map = HashMap::new();

        for line in reader.lines() {
            let line = line.context("Failed to read line from config")?;
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(
                    key.trim().to_string(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }

        if let Some(feed_url) = config_map.get("feed_url") {
            settings.feed_url = feed_url.clone();
        }
        if let Some(feed_path) = config_map.get("feed_path") {
            settings.feed_path = feed_path.clone();
        }
        read_into(&config_map, "port", &mut settings.port);
        read_into(&config_map, "screen_height", &mut settings.screen_height);
        read_into(&config_map, "cluster_radius", &mut settings.cluster_radius);
        read_into(&config_map, "max_zoom", &mut settings.max_zoom);
        read_into(&config_map, "selection_match", &mut settings.selection_match);
        read_into(&config_map, "panel_easing", &mut settings.panel_easing);

        let region = &mut settings.initial_region;
        read_into(&config_map, "initial_latitude", &mut region.latitude);
        read_into(&config_map, "initial_longitude", &mut region.longitude);
        read_into(&config_map, "initial_latitude_delta", &mut region.latitude_delta);
        read_into(&config_map, "initial_longitude_delta", &mut region.longitude_delta);

        Ok(settings.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if !(self.screen_height.is_finite() && self.screen_height > 0.0) {
            warn!("ignoring screen_height = {}, using {}", self.screen_height, DEFAULT_SCREEN_HEIGHT);
            self.screen_height = DEFAULT_SCREEN_HEIGHT;
        }
        if !self.initial_region.is_usable() {
            warn!(region = ?self.initial_region, "ignoring unusable initial region");
            self.initial_region = Region::default();
        }
        self
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Creating config directory")?;
        }

        let region = &self.initial_region;
        let mut content = String::new();
        content.push_str("# EntryMap Configuration File\n");
        content.push_str(&format!("feed_url = \"{}\"\n", self.feed_url));
        content.push_str(&format!("feed_path = \"{}\"\n", self.feed_path));
        content.push_str(&format!("port = {}\n", self.port));
        content.push_str(&format!("screen_height = {}\n", self.screen_height));
        content.push_str(&format!("cluster_radius = {}\n", self.cluster_radius));
        content.push_str(&format!("max_zoom = {}\n", self.max_zoom));
        content.push_str(&format!("selection_match = {}\n", self.selection_match.as_str()));
        content.push_str(&format!("panel_easing = {}\n", self.panel_easing.as_str()));
        content.push_str(&format!("initial_latitude = {}\n", region.latitude));
        content.push_str(&format!("initial_longitude = {}\n", region.longitude));
        content.push_str(&format!("initial_latitude_delta = {}\n", region.latitude_delta));
        content.push_str(&format!("initial_longitude_delta = {}\n", region.longitude_delta));

        std::fs::write(config_path, content).context("Failed to write to config file")?;
        Ok(())
    }

    pub fn map_config(&self) -> MapConfig {
        MapConfig {
            region: self.initial_region,
            cluster: ClusterOptions {
                radius: self.cluster_radius,
                max_zoom: self.max_zoom,
                ..ClusterOptions::default()
            },
            selection: self.selection_match,
            geometry: PanelGeometry::for_screen(self.screen_height),
            easing: self.panel_easing,
        }
    }

    pub fn config_path() -> PathBuf {
        crate::utils::get_config_path()
    }
}

fn read_into<T>(config_map: &HashMap<String, String>, key: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = config_map.get(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(e) => warn!("ignoring {} = {:?}: {}", key, raw, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.ini")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parses_known_keys_and_skips_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entrymap.ini");
        std::fs::write(
            &path,
            "# comment\n\
             feed_url = \"http://108.4.246.231:3000\"\n\
             feed_path = news\n\
             port = not-a-port\n\
             max_zoom = 14\n\
             selection_match = coordinate\n\
             panel_easing = ease_out\n\
             initial_latitude = 40.0\n\
             mystery = 1\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.feed_url, "http://108.4.246.231:3000");
        assert_eq!(settings.feed_path, "news");
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.max_zoom, 14);
        assert_eq!(settings.selection_match, SelectionMatch::Coordinate);
        assert_eq!(settings.panel_easing, Easing::EaseOut);
        assert_eq!(settings.initial_region.latitude, 40.0);
        assert_eq!(settings.initial_region.longitude, Region::default().longitude);
    }

    #[test]
    fn non_finite_values_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entrymap.ini");
        std::fs::write(
            &path,
            "screen_height = NaN\n\
             initial_latitude = inf\n\
             initial_longitude_delta = -1\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.screen_height, DEFAULT_SCREEN_HEIGHT);
        assert_eq!(settings.initial_region, Region::default());

        std::fs::write(&path, "screen_height = 0\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.screen_height, DEFAULT_SCREEN_HEIGHT);
        assert_eq!(settings.map_config().geometry, PanelGeometry::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("entrymap.ini");
        let settings = Settings {
            port: 4100,
            screen_height: 640.0,
            selection_match: SelectionMatch::Coordinate,
            panel_easing: Easing::Linear,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn map_config_carries_overrides() {
        let settings = Settings {
            cluster_radius: 60.0,
            max_zoom: 12,
            screen_height: 1000.0,
            ..Settings::default()
        };
        let config = settings.map_config();
        assert_eq!(config.cluster.radius, 60.0);
        assert_eq!(config.cluster.max_zoom, 12);
        assert_eq!(config.geometry.panel_height, 500.0);
    }
}

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::viewer::{FitParams, PaneSplit, Zoom};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "docview";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read or write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Quiet period before a changed query is searched
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    #[serde(default = "default_fit_padding")]
    pub fit_padding: f32,

    #[serde(default = "default_fit_margin")]
    pub fit_margin: f32,

    #[serde(default = "default_zoom_step")]
    pub zoom_step: f32,

    /// Width reserved for the results panel while it is visible
    #[serde(default = "default_results_panel_width")]
    pub results_panel_width: f32,

    /// Initial left pane fraction of the split layout
    #[serde(default = "default_pane_fraction")]
    pub pane_fraction: f32,

    /// Pages a search scan covers per tick
    #[serde(default = "default_scan_pages_per_tick")]
    pub scan_pages_per_tick: usize,

    #[serde(default = "default_render_cache_pages")]
    pub render_cache_pages: usize,

    #[serde(default = "default_text_cache_pages")]
    pub text_cache_pages: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_fit_padding() -> f32 {
    64.0
}

fn default_fit_margin() -> f32 {
    0.95
}

fn default_zoom_step() -> f32 {
    Zoom::STEP
}

fn default_results_panel_width() -> f32 {
    320.0
}

fn default_pane_fraction() -> f32 {
    0.5
}

fn default_scan_pages_per_tick() -> usize {
    4
}

fn default_render_cache_pages() -> usize {
    8
}

fn default_text_cache_pages() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            search_debounce_ms: default_search_debounce_ms(),
            fit_padding: default_fit_padding(),
            fit_margin: default_fit_margin(),
            zoom_step: default_zoom_step(),
            results_panel_width: default_results_panel_width(),
            pane_fraction: default_pane_fraction(),
            scan_pages_per_tick: default_scan_pages_per_tick(),
            render_cache_pages: default_render_cache_pages(),
            text_cache_pages: default_text_cache_pages(),
            log_level: default_log_level(),
        }
    }
}

impl ViewerSettings {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn fit_params(&self) -> FitParams {
        FitParams {
            padding: self.fit_padding,
            margin: self.fit_margin,
        }
    }

    pub fn pane_split(&self) -> PaneSplit {
        PaneSplit::new(self.pane_fraction)
    }

    /// Replaces values the viewer cannot work with by their defaults
    fn sanitize(&mut self) {
        if !(self.fit_padding.is_finite() && self.fit_padding >= 0.0) {
            warn!("Invalid fit_padding {}, using default", self.fit_padding);
            self.fit_padding = default_fit_padding();
        }
        if !(self.fit_margin > 0.0 && self.fit_margin <= 1.0) {
            warn!("Invalid fit_margin {}, using default", self.fit_margin);
            self.fit_margin = default_fit_margin();
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0) {
            warn!("Invalid zoom_step {}, using default", self.zoom_step);
            self.zoom_step = default_zoom_step();
        }
        if !(self.results_panel_width.is_finite() && self.results_panel_width >= 0.0) {
            self.results_panel_width = default_results_panel_width();
        }
        self.pane_fraction = PaneSplit::clamp_fraction(self.pane_fraction);
        self.scan_pages_per_tick = self.scan_pages_per_tick.max(1);
        self.render_cache_pages = self.render_cache_pages.max(1);
        self.text_cache_pages = self.text_cache_pages.max(1);
    }
}

static SETTINGS: LazyLock<RwLock<ViewerSettings>> =
    LazyLock::new(|| RwLock::new(ViewerSettings::default()));

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Reads settings from `path`, migrating older versions in memory
pub fn load_from_path(path: &Path) -> Result<ViewerSettings, SettingsError> {
    read_settings(path).map(|(settings, _)| settings)
}

/// Settings plus whether they were migrated from an older version
fn read_settings(path: &Path) -> Result<(ViewerSettings, bool), SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: ViewerSettings =
        serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let migrated = settings.version < CURRENT_VERSION;
    if migrated {
        migrate_settings(&mut settings);
    }
    settings.sanitize();
    debug!("Loaded settings from {path:?}");
    Ok((settings, migrated))
}

pub fn save_to_path(settings: &ViewerSettings, path: &Path) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let content = serde_yaml::to_string(settings)?;
    fs::write(path, content).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

fn migrate_settings(settings: &mut ViewerSettings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

/// Loads the global settings from `path`, or from the default config
/// location. A missing file is created with defaults.
pub fn load_settings(path: Option<&Path>) {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_path) else {
        warn!("Could not determine config directory, using default settings");
        return;
    };

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        save_settings_to(&path);
        return;
    }

    match read_settings(&path) {
        Ok((settings, migrated)) => {
            replace(settings);
            if migrated {
                save_settings_to(&path);
            }
        }
        Err(e) => error!("{e}"),
    }
}

fn save_settings_to(path: &Path) {
    let settings = current();
    if let Err(e) = save_to_path(&settings, path) {
        error!("{e}");
    }
}

// Public API for accessing/modifying settings

pub fn current() -> ViewerSettings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn replace(settings: ViewerSettings) {
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}

pub fn get_log_level() -> String {
    SETTINGS
        .read()
        .map(|s| s.log_level.clone())
        .unwrap_or_else(|_| default_log_level())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nsearch_debounce_ms: 150\n").unwrap();

        let settings = load_from_path(&path).unwrap();
        assert_eq!(settings.search_debounce(), Duration::from_millis(150));
        assert_eq!(settings.fit_params(), FitParams::default());
        assert_eq!(settings.scan_pages_per_tick, 4);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let settings = ViewerSettings {
            results_panel_width: 280.0,
            pane_fraction: 0.4,
            log_level: "debug".to_string(),
            ..ViewerSettings::default()
        };

        save_to_path(&settings, &path).unwrap();
        assert_eq!(load_from_path(&path).unwrap(), settings);
    }

    #[test]
    fn old_versions_are_migrated_and_values_sanitized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "version: 0\npane_fraction: 0.99\nfit_margin: 4.0\nscan_pages_per_tick: 0\n",
        )
        .unwrap();

        let settings = load_from_path(&path).unwrap();
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.pane_fraction, PaneSplit::MAX_FRACTION);
        assert_eq!(settings.fit_margin, 0.95);
        assert_eq!(settings.scan_pages_per_tick, 1);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "fit_padding: [not, a, number]\n").unwrap();
        assert!(matches!(
            load_from_path(&path),
            Err(SettingsError::Parse { .. })
        ));
        assert!(matches!(
            load_from_path(&dir.path().join("absent.yaml")),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    #[serial]
    fn load_settings_creates_missing_file_and_reads_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        replace(ViewerSettings::default());
        load_settings(Some(&path));
        assert!(path.exists());

        fs::write(&path, "version: 1\nzoom_step: 0.5\n").unwrap();
        load_settings(Some(&path));
        assert_eq!(current().zoom_step, 0.5);

        replace(ViewerSettings::default());
        assert_eq!(current().zoom_step, Zoom::STEP);
    }
}

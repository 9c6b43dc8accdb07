use std::fs;
use std::path::Path;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub initial_zoom: f32,
    pub max_password_attempts: u32,
    pub log_level: String,
    pub highlight_color: [u8; 3],
    pub link_color: [u8; 3],
    /// Side length, in points, of the icon rectangle of a text annotation.
    pub text_icon_size: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_zoom: 2.0,
            max_password_attempts: 3,
            log_level: "info".into(),
            highlight_color: [255, 200, 0],
            link_color: [0, 120, 255],
            text_icon_size: 20.0,
        }
    }
}

impl ViewerConfig {
    pub fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("net", "pdfview", "pdfview")
    }

    /// Reads `path`, falling back to defaults when the file is missing or
    /// malformed. Out-of-range values are replaced by their defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(?err, path = %path.display(), "no config file, using defaults");
                return Self::default();
            }
        };
        match toml::from_str::<ViewerConfig>(&raw) {
            Ok(config) => config.sanitized(),
            Err(err) => {
                warn!(%err, path = %path.display(), "ignoring malformed config file");
                Self::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.initial_zoom.is_finite() || self.initial_zoom < crate::session::MIN_ZOOM {
            self.initial_zoom = defaults.initial_zoom;
        }
        if self.max_password_attempts == 0 {
            self.max_password_attempts = defaults.max_password_attempts;
        }
        if !self.text_icon_size.is_finite() || self.text_icon_size <= 0.0 {
            self.text_icon_size = defaults.text_icon_size;
        }
        self
    }
}

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::renderer::light::{LightProjection, DEFAULT_LIGHT_DISTANCE, DEFAULT_TIMESCALE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default)]
    pub window: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default = "RenderSettings::default_light_timescale")]
    pub light_timescale: f32,
    #[serde(default = "RenderSettings::default_light_distance")]
    pub light_distance: f32,
    #[serde(default = "RenderSettings::default_ambient_intensity")]
    pub ambient_intensity: f32,
    #[serde(default = "RenderSettings::default_clear_color")]
    pub clear_color: [f32; 3],
    #[serde(default)]
    pub light_projection: LightProjection,
    #[serde(default = "RenderSettings::default_debug_views")]
    pub debug_views: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: Self::default_shadow_map_size(),
            window: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            light_timescale: Self::default_light_timescale(),
            light_distance: Self::default_light_distance(),
            ambient_intensity: Self::default_ambient_intensity(),
            clear_color: Self::default_clear_color(),
            light_projection: LightProjection::default(),
            debug_views: Self::default_debug_views(),
        }
    }
}

impl RenderSettings {
    /// Reads `path`; a missing or unreadable file yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.window.width == 0 || self.window.height == 0 {
            warn!("Window size must be greater than zero. Using default size.");
            self.window = Resolution::default();
        }

        if !self.light_timescale.is_finite() {
            warn!("Light timescale must be finite. Using default value.");
            self.light_timescale = Self::default_light_timescale();
        }

        if !(self.light_distance.is_finite() && self.light_distance > 0.0) {
            warn!("Light distance must be positive. Using default value.");
            self.light_distance = Self::default_light_distance();
        }

        if !(self.ambient_intensity.is_finite() && self.ambient_intensity >= 0.0) {
            warn!("Ambient intensity must be non-negative. Using default value.");
            self.ambient_intensity = Self::default_ambient_intensity();
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            warn!("Clear color must be finite. Using default color.");
            self.clear_color = Self::default_clear_color();
        }

        if let LightProjection::Fixed {
            half_extent,
            near,
            far,
        } = self.light_projection
        {
            if !(half_extent > 0.0 && far > near) {
                warn!("Fixed light projection needs a positive extent and far > near. Fitting to the scene instead.");
                self.light_projection = LightProjection::Fit;
            }
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const fn default_shadow_map_size() -> u32 {
        4096
    }

    const fn default_light_timescale() -> f32 {
        DEFAULT_TIMESCALE
    }

    const fn default_light_distance() -> f32 {
        DEFAULT_LIGHT_DISTANCE
    }

    const fn default_ambient_intensity() -> f32 {
        1.2
    }

    const fn default_clear_color() -> [f32; 3] {
        [0.8, 0.8, 1.0]
    }

    const fn default_debug_views() -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            shadow_map_size: 0,
            window: Resolution {
                width: 0,
                height: 0,
            },
            present_mode: PresentModeSetting::Immediate,
            light_timescale: f32::NAN,
            light_distance: -1.0,
            ambient_intensity: -0.5,
            clear_color: [f32::INFINITY, 0.0, 0.0],
            light_projection: LightProjection::Fixed {
                half_extent: 32.0,
                near: 10.0,
                far: 1.0,
            },
            debug_views: false,
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RenderSettings::default();

        assert_eq!(validated.shadow_map_size, defaults.shadow_map_size);
        assert_eq!(validated.window.width, Resolution::default().width);
        assert_eq!(validated.window.height, Resolution::default().height);
        assert_eq!(validated.light_timescale, defaults.light_timescale);
        assert_eq!(validated.light_distance, defaults.light_distance);
        assert_eq!(validated.ambient_intensity, defaults.ambient_intensity);
        assert_eq!(validated.clear_color, defaults.clear_color);
        assert_eq!(validated.light_projection, LightProjection::Fit);
        assert!(!validated.debug_views);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };
        let mode = settings.present_mode(&[wgpu::PresentMode::Fifo]);
        assert_eq!(mode, wgpu::PresentMode::Fifo);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "shadow_map_size": 2048, "debug_views": false }"#).unwrap();
        assert_eq!(settings.shadow_map_size, 2048);
        assert!(!settings.debug_views);
        assert_eq!(settings.ambient_intensity, 1.2);
        assert_eq!(settings.window.width, 1024);
        assert_eq!(settings.light_projection, LightProjection::Fit);
    }

    #[test]
    fn window_resolution_is_copied_out_of_settings() {
        let settings = RenderSettings::default();
        let size = settings.window;
        assert_eq!(size, settings.window);
        assert_eq!((size.width, size.height), (1024, 1024));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.shadow_map_size, 4096);
    }
}

//! External configuration loader.
//!
//! Reads `config.toml` from the executable's directory (or CWD).
//! Falls back to sensible defaults if the file is missing or incomplete.

use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

// ── Public Config Struct ──

#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub levels_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    pub tile_speed: f32,     // height units per second
    pub agent_speed: f32,    // world units per second
    pub arrival_radius: f32, // waypoint counts as reached inside this radius
    pub fail_check_delay_ms: u64,
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    /// Time a tile needs to travel one height unit. Non-positive speeds snap;
    /// speeds too small to express as a duration use the default.
    pub fn tile_duration(&self) -> Duration {
        if self.tile_speed.is_nan() || self.tile_speed <= 0.0 {
            return Duration::ZERO;
        }
        match Duration::try_from_secs_f32(1.0 / self.tile_speed) {
            Ok(d) => d,
            Err(e) => {
                warn!("tile_speed {} unusable ({e}); using {}", self.tile_speed, default_tile_speed());
                Duration::from_secs_f32(1.0 / default_tile_speed())
            }
        }
    }

    pub fn fail_check_delay(&self) -> Duration {
        Duration::from_millis(self.fail_check_delay_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TomlTiming::default().into()
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_tile_speed")]
    tile_speed: f32,
    #[serde(default = "default_agent_speed")]
    agent_speed: f32,
    #[serde(default = "default_arrival_radius")]
    arrival_radius: f32,
    #[serde(default = "default_fail_check_delay")]
    fail_check_delay_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }
fn default_tile_speed() -> f32 { 2.0 }      // one step in 0.5s
fn default_agent_speed() -> f32 { 2.0 }
fn default_arrival_radius() -> f32 { 0.1 }
fn default_fail_check_delay() -> u64 { 2000 }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_rate_ms: default_tick_rate(),
            tile_speed: default_tile_speed(),
            agent_speed: default_agent_speed(),
            arrival_radius: default_arrival_radius(),
            fail_check_delay_ms: default_fail_check_delay(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
        }
    }
}

impl From<TomlTiming> for TimingConfig {
    fn from(t: TomlTiming) -> Self {
        TimingConfig {
            tick_rate_ms: t.tick_rate_ms,
            tile_speed: t.tile_speed,
            agent_speed: t.agent_speed,
            arrival_radius: t.arrival_radius,
            fail_check_delay_ms: t.fail_check_delay_ms,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) `~/.local/share/hexlift`.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse config text directly. Relative level directories are kept as-is.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(cfg, &[]))
    }

    fn from_toml(cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let levels_dir_str = &cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            timing: cfg.timing.into(),
            levels_dir,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + XDG data (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so data next to the real binary is found.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/hexlift");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warn!("config.toml parse error: {e}; using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

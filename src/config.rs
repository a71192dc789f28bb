use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calendar::{DEFAULT_HORIZON_MONTHS, MAX_HORIZON_MONTHS};
use crate::domain::parse_date;

pub const DEFAULT_CONTEXT_MONTHS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the active profile; each profile has its own store file.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Months projected when `--months` is not given.
    #[serde(default = "default_horizon_months")]
    pub horizon_months: usize,

    /// Months included in the assistant context.
    #[serde(default = "default_context_months")]
    pub context_months: usize,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_horizon_months() -> usize {
    DEFAULT_HORIZON_MONTHS
}

fn default_context_months() -> usize {
    DEFAULT_CONTEXT_MONTHS
}

fn default_currency_symbol() -> String {
    "€".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            horizon_months: default_horizon_months(),
            context_months: default_context_months(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

impl AppConfig {
    pub const KEYS: [&'static str; 4] =
        ["profile", "horizon_months", "context_months", "currency_symbol"];

    /// Updates one field from its string form.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "profile" => {
                let value = value.trim();
                if value.is_empty() {
                    bail!("profile must not be empty");
                }
                self.profile = value.to_string();
            }
            "horizon_months" => self.horizon_months = parse_months(key, value)?,
            "context_months" => self.context_months = parse_months(key, value)?,
            "currency_symbol" => self.currency_symbol = value.to_string(),
            other => bail!(
                "Unknown config key '{other}'. Expected one of: {}",
                Self::KEYS.join(", ")
            ),
        }
        Ok(())
    }
}

fn parse_months(key: &str, value: &str) -> Result<usize> {
    let months: usize = value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of months"))?;
    if months == 0 {
        bail!("{key} must be at least 1");
    }
    if months > MAX_HORIZON_MONTHS {
        bail!("{key} must be at most {MAX_HORIZON_MONTHS}");
    }
    Ok(months)
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

pub fn app_paths(override_home: Option<PathBuf>) -> Result<AppPaths> {
    if let Some(home) = override_home {
        return Ok(AppPaths {
            config_dir: home.join("config"),
            data_dir: home.join("data"),
        });
    }

    let proj = ProjectDirs::from("com", "outlook", "outlook")
        .context("Failed to resolve platform directories")?;

    Ok(AppPaths {
        config_dir: proj.config_dir().to_path_buf(),
        data_dir: proj.data_dir().to_path_buf(),
    })
}

pub fn load_or_init_config(paths: &AppPaths) -> Result<(AppConfig, PathBuf)> {
    fs::create_dir_all(&paths.config_dir)
        .with_context(|| format!("Failed to create config dir {}", paths.config_dir.display()))?;

    let cfg_path = paths.config_dir.join("config.json");
    if !cfg_path.exists() {
        let cfg = AppConfig::default();
        write_config(&cfg_path, &cfg)?;
        return Ok((cfg, cfg_path));
    }

    let raw = fs::read_to_string(&cfg_path)
        .with_context(|| format!("Failed to read {}", cfg_path.display()))?;
    let cfg: AppConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", cfg_path.display()))?;

    // Rewrite older configs so every field is present on disk.
    let on_disk: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", cfg_path.display()))?;
    let missing = AppConfig::KEYS.iter().any(|k| on_disk.get(k).is_none());
    if missing {
        write_config(&cfg_path, &cfg)?;
    }

    Ok((cfg, cfg_path))
}

pub fn write_config(path: &Path, cfg: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// File-system-safe form of a profile name.
pub fn profile_slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        let mapped = match ch {
            'a'..='z' | '0'..='9' | '-' | '_' => Some(ch),
            'A'..='Z' => Some(ch.to_ascii_lowercase()),
            ' ' | ':' | '/' | '\\' => Some('-'),
            _ => None,
        };
        if let Some(c) = mapped {
            if !(c == '-' && out.ends_with('-')) {
                out.push(c);
            }
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "default".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The anchor date for every command: the override if given, the local date otherwise.
pub fn today(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => Ok(parse_date(raw).context("Invalid --today")?),
        None => Ok(Local::now().date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_collapses_separators() {
        assert_eq!(profile_slug("Family Budget"), "family-budget");
        assert_eq!(profile_slug("a//b"), "a-b");
        assert_eq!(profile_slug("???"), "default");
    }

    #[test]
    fn older_config_gets_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let paths = app_paths(Some(dir.path().to_path_buf())).unwrap();
        fs::create_dir_all(&paths.config_dir).unwrap();
        let cfg_path = paths.config_dir.join("config.json");
        fs::write(&cfg_path, r#"{"profile": "home"}"#).unwrap();

        let (cfg, _) = load_or_init_config(&paths).unwrap();
        assert_eq!(cfg.profile, "home");
        assert_eq!(cfg.horizon_months, DEFAULT_HORIZON_MONTHS);

        let rewritten = fs::read_to_string(&cfg_path).unwrap();
        assert!(rewritten.contains("currency_symbol"));
    }

    #[test]
    fn set_key_validates_values() {
        let mut cfg = AppConfig::default();
        cfg.set_key("horizon_months", "24").unwrap();
        assert_eq!(cfg.horizon_months, 24);
        assert!(cfg.set_key("horizon_months", "0").is_err());
        assert!(cfg.set_key("horizon_months", "5000").is_err());
        cfg.set_key("context_months", "1200").unwrap();
        assert!(cfg.set_key("context_months", "soon").is_err());
        assert!(cfg.set_key("colour", "blue").is_err());
        cfg.set_key("currency_symbol", "$").unwrap();
        assert_eq!(cfg.currency_symbol, "$");
    }

    #[test]
    fn today_override_parses() {
        assert_eq!(
            today(Some("2025-03-04")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
        );
        assert!(today(Some("March")).is_err());
    }
}

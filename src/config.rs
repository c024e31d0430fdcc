//! On-disk policy configuration: one JSON file per component under
//! `<config_dir>/kgd/`.

use std::path::{Path, PathBuf};

use kgd_core::{KeyguardConfig, KeyguardResult};
use kgd_power_menu::PowerMenuConfig;

const CONFIG_DIR_NAME: &str = "kgd";
pub const KEYGUARD_FILE: &str = "keyguard.json";
pub const POWER_MENU_FILE: &str = "power_menu.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    pub keyguard: KeyguardConfig,
    pub power_menu: PowerMenuConfig,
}

impl PolicyConfig {
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME))
    }

    /// Missing files fall back to defaults; malformed ones are errors.
    pub fn load(dir: &Path) -> KeyguardResult<Self> {
        Ok(Self {
            keyguard: KeyguardConfig::load(&dir.join(KEYGUARD_FILE))?,
            power_menu: PowerMenuConfig::load(&dir.join(POWER_MENU_FILE))?,
        })
    }

    pub fn save(&self, dir: &Path) -> KeyguardResult<()> {
        self.keyguard.save(&dir.join(KEYGUARD_FILE))?;
        self.power_menu.save(&dir.join(POWER_MENU_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgd_core::KeyguardError;

    #[test]
    fn empty_dir_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PolicyConfig::load(dir.path()).unwrap(), PolicyConfig::default());
    }

    #[test]
    fn round_trips_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PolicyConfig::default();
        config.keyguard.lock_after_timeout_ms = 0;
        config.power_menu.bug_report_enabled = true;
        config.save(dir.path()).unwrap();
        assert!(dir.path().join(KEYGUARD_FILE).exists());
        assert_eq!(PolicyConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(POWER_MENU_FILE), "{not json").unwrap();
        assert!(matches!(
            PolicyConfig::load(dir.path()),
            Err(KeyguardError::SerializationError(_))
        ));
    }
}

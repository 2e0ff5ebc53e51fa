//! INI file configuration adapter.

use crate::domain::error::LineflowError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LineflowError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| LineflowError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, LineflowError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| LineflowError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Set `section.key`, creating the section when needed. Used for
    /// command-line overrides.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.config.set(section, key, Some(value.to_string()));
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL: &str = r#"
[data]
directory = ./data
symbol = SPY

[run]
mode = next
precision = 4
strict = yes

[indicators]
fast = SMA(close, period=10)
slow = SMA(close, period=30)
cross = CrossOver(fast, slow)
"#;

    #[test]
    fn expressions_keep_embedded_equals_signs() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(
            adapter.get_string("indicators", "fast"),
            Some("SMA(close, period=10)".to_string())
        );
        assert_eq!(
            adapter.get_string("indicators", "cross"),
            Some("CrossOver(fast, slow)".to_string())
        );
    }

    #[test]
    fn keys_are_sorted_and_lowercased() {
        let adapter =
            FileConfigAdapter::from_string("[indicators]\nZeta = close\nalpha = open\n").unwrap();
        assert_eq!(adapter.keys("indicators"), vec!["alpha", "zeta"]);
        assert_eq!(adapter.keys("INDICATORS"), vec!["alpha", "zeta"]);
        assert!(adapter.keys("missing").is_empty());
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[data]\nsymbol = SPY\n").unwrap();
        assert_eq!(adapter.get_string("data", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(adapter.get_int("run", "precision", 6), 4);
        assert_eq!(adapter.get_int("run", "missing", 42), 42);
        assert_eq!(adapter.get_int("run", "mode", 42), 42);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[run]\nscale = 0.5\nbad = not_a_number\n").unwrap();
        assert_eq!(adapter.get_double("run", "scale", 0.0), 0.5);
        assert_eq!(adapter.get_double("run", "bad", 99.9), 99.9);
        assert_eq!(adapter.get_double("run", "missing", 99.9), 99.9);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[run]\na = true\nb = no\nc = 1\nd = maybe\n").unwrap();
        assert!(adapter.get_bool("run", "a", false));
        assert!(!adapter.get_bool("run", "b", true));
        assert!(adapter.get_bool("run", "c", false));
        assert!(adapter.get_bool("run", "d", true));
        assert!(!adapter.get_bool("run", "missing", false));
    }

    #[test]
    fn set_overrides_values() {
        let mut adapter = FileConfigAdapter::from_string(FULL).unwrap();
        adapter.set("data", "symbol", "QQQ");
        adapter.set("run", "mode", "once");
        assert_eq!(adapter.get_string("data", "symbol"), Some("QQQ".to_string()));
        assert_eq!(adapter.get_string("run", "mode"), Some("once".to_string()));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config(FULL);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("data", "symbol"), Some("SPY".to_string()));
        assert_eq!(adapter.keys("indicators"), vec!["cross", "fast", "slow"]);
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(LineflowError::ConfigParse { .. })));
    }
}

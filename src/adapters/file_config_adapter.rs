//! INI configuration files.

use crate::domain::error::DcaError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    ini: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DcaError> {
        let path = path.as_ref();
        let mut ini = Ini::new();
        ini.load(path).map_err(|reason| DcaError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { ini })
    }

    pub fn from_string(content: &str) -> Result<Self, DcaError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|reason| DcaError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { ini })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.ini
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[data]
source = sqlite

[sqlite]
path = /var/lib/dcagrid/prices.db
pool_size = 8

[backtest]
symbol = TSLA
start_date = 2021-01-04
beta_scaling = yes

[strategy]
name = Wide Grid
grid_interval = 15%
lot_size_usd = 2500.5
"#;

    #[test]
    fn reads_strings_across_sections() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path").as_deref(),
            Some("/var/lib/dcagrid/prices.db")
        );
        assert_eq!(
            adapter.get_string("strategy", "name").as_deref(),
            Some("Wide Grid")
        );
        assert_eq!(
            adapter.get_string("strategy", "grid_interval").as_deref(),
            Some("15%")
        );
    }

    #[test]
    fn missing_keys_and_sections() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("backtest", "end_date"), None);
        assert_eq!(adapter.get_string("portfolio", "symbols"), None);
    }

    #[test]
    fn numeric_getters_fall_back_on_garbage() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_int("sqlite", "pool_size", 4), 8);
        assert_eq!(adapter.get_int("sqlite", "timeout", 30), 30);
        assert_eq!(adapter.get_int("backtest", "symbol", 7), 7);
        assert_eq!(adapter.get_double("strategy", "lot_size_usd", 0.0), 2500.5);
        assert_eq!(adapter.get_double("strategy", "grid_interval", 0.1), 0.1);
    }

    #[test]
    fn bool_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[s]\na = true\nb = YES\nc = on\nd = 0\ne = off\nf = maybe\n")
                .unwrap();
        assert!(adapter.get_bool("s", "a", false));
        assert!(adapter.get_bool("s", "b", false));
        assert!(adapter.get_bool("s", "c", false));
        assert!(!adapter.get_bool("s", "d", true));
        assert!(!adapter.get_bool("s", "e", true));
        assert!(adapter.get_bool("s", "f", true));
        assert!(!adapter.get_bool("s", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert!(adapter.get_bool("backtest", "beta_scaling", false));
    }

    #[test]
    fn missing_file_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/dcagrid.ini");
        assert!(matches!(result, Err(DcaError::ConfigParse { file, .. }) if file.contains("dcagrid.ini")));
    }
}

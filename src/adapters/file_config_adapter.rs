//! INI file configuration adapter.

use crate::domain::error::ConfigError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| ConfigError::Parse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ConfigError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ConfigError::Parse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
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

    #[test]
    fn reads_backtest_sections() {
        let content = r#"
[backtest]
name = Monthly VOO
symbol = VOO
initial_capital = 0

[strategy]
type = DCA

[contribution]
amount = 1000
day = 15
interval = MONTHLY
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "name"),
            Some("Monthly VOO".to_string())
        );
        assert_eq!(adapter.get_string("strategy", "type"), Some("DCA".to_string()));
        assert_eq!(adapter.get_double("contribution", "amount", 0.0), 1000.0);
        assert_eq!(adapter.get_int("contribution", "day", 1), 15);
    }

    #[test]
    fn allocation_list_keeps_colons_in_value() {
        let adapter =
            FileConfigAdapter::from_string("[allocations]\nsymbols = VOO:0.6, QQQ:0.4\n").unwrap();
        assert_eq!(
            adapter.get_string("allocations", "symbols"),
            Some("VOO:0.6, QQQ:0.4".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_handles_negative_and_garbage() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nshort_period = -3\nlong_period = abc\n")
                .unwrap();
        assert_eq!(adapter.get_int("strategy", "short_period", 5), -3);
        assert_eq!(adapter.get_int("strategy", "long_period", 20), 20);
        assert_eq!(adapter.get_int("strategy", "missing", 42), 42);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = lots\nsell_ratio = 0.5\n")
                .unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_capital", 99.9), 99.9);
        assert_eq!(adapter.get_double("backtest", "sell_ratio", 1.0), 0.5);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\ndata_dir = /srv/prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "data_dir"),
            Some("/srv/prices".to_string())
        );
    }

    #[test]
    fn from_file_returns_parse_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}

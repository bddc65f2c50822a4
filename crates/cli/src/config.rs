// CLI config file
//
// [sheet]
// max_rows = 1000
// max_cols = 26
// memoize = true

use std::fs;
use std::path::Path;

use serde::Deserialize;

use cellgraph_engine::SheetConfig;

use crate::CliError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub sheet: SheetConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path)
            .map_err(|e| CliError::usage(format!("cannot read config {}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| {
            CliError::usage(format!("invalid config {}: {}", path.display(), e))
                .with_hint("expected a [sheet] table with max_rows, max_cols, memoize")
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
    }

    #[test]
    fn test_sheet_table() {
        let settings = Settings::parse("[sheet]\nmax_rows = 10\nmemoize = false\n").unwrap();
        assert_eq!(settings.sheet.max_rows, 10);
        assert_eq!(settings.sheet.max_cols, SheetConfig::default().max_cols);
        assert!(!settings.sheet.memoize);
    }

    #[test]
    fn test_unknown_table_rejected() {
        assert!(Settings::parse("[grid]\nrows = 1\n").is_err());
    }
}

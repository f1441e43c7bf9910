//! Output configuration
//!
//! Toggles handed in by the command-line layer: full attribute dump,
//! structured (JSON) output, output destination and the attribute subset.

use std::fs::File;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{Result, SearchError};
use crate::logger::{LineSink, WriterSink};
use crate::parallel_executor::ParallelConfig;

/// Attribute rendered when none are requested
pub const DEFAULT_ATTRIBUTE: &str = "cn";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Render every attribute instead of the requested subset
    pub full: bool,
    /// Structured (JSON) output instead of severity-tagged lines
    pub json: bool,
    /// Write to this file instead of stdout
    pub output: Option<PathBuf>,
    /// Requested attributes, used when `full` is off
    pub attributes: Vec<String>,
    pub parallel: ParallelConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            full: false,
            json: false,
            output: None,
            attributes: vec![DEFAULT_ATTRIBUTE.to_string()],
            parallel: ParallelConfig::default(),
        }
    }
}

impl OutputConfig {
    /// Parse a comma-separated attribute list (`cn,mail, memberOf`)
    pub fn parse_attribute_csv(csv: &str) -> Vec<String> {
        let attributes: Vec<String> = csv
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        if attributes.is_empty() {
            vec![DEFAULT_ATTRIBUTE.to_string()]
        } else {
            attributes
        }
    }

    pub fn with_attribute_csv(mut self, csv: &str) -> Self {
        self.attributes = Self::parse_attribute_csv(csv);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.full && self.attributes.is_empty() {
            return Err(SearchError::Config(
                "no attributes requested and full dump disabled".to_string(),
            ));
        }
        if self.parallel.max_concurrency == 0 {
            return Err(SearchError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(path) = &self.output {
            if path.as_os_str().is_empty() {
                return Err(SearchError::Config("empty output path".to_string()));
            }
        }
        Ok(())
    }

    /// Whether an attribute is rendered under this configuration
    pub fn selects(&self, attribute_name: &str) -> bool {
        self.full
            || self
                .attributes
                .iter()
                .any(|a| a.eq_ignore_ascii_case(attribute_name))
    }

    /// Open the configured destination: stdout, or a created/truncated file
    pub fn open_destination(&self) -> Result<Box<dyn LineSink>> {
        match &self.output {
            Some(path) => {
                let file = File::create(path)?;
                info!("Writing results to {}", path.display());
                Ok(Box::new(WriterSink::new(file)))
            }
            None => Ok(Box::new(WriterSink::stdout())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::RenderedLine;
    use crate::logger::Severity;

    #[test]
    fn test_defaults() {
        let config = OutputConfig::default();
        assert!(!config.full);
        assert!(!config.json);
        assert!(config.output.is_none());
        assert_eq!(config.attributes, vec!["cn".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_attribute_csv() {
        assert_eq!(
            OutputConfig::parse_attribute_csv("cn, mail ,,memberOf"),
            vec!["cn", "mail", "memberOf"]
        );
        assert_eq!(OutputConfig::parse_attribute_csv(" , "), vec!["cn"]);
    }

    #[test]
    fn test_selects() {
        let config = OutputConfig::default().with_attribute_csv("cn,memberOf");
        assert!(config.selects("memberof"));
        assert!(!config.selects("mail"));

        let full = OutputConfig {
            full: true,
            ..OutputConfig::default()
        };
        assert!(full.selects("mail"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = OutputConfig {
            attributes: vec![],
            ..OutputConfig::default()
        };
        assert!(matches!(config.validate(), Err(SearchError::Config(_))));

        let mut config = OutputConfig::default();
        config.parallel.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: OutputConfig = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert!(config.json);
        assert_eq!(config.attributes, vec!["cn".to_string()]);
    }

    #[test]
    fn test_open_file_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let config = OutputConfig {
            output: Some(path.clone()),
            ..OutputConfig::default()
        };
        {
            let mut sink = config.open_destination().unwrap();
            sink.emit(RenderedLine::new(Severity::Success, 0, "written")).unwrap();
        }
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[+] written\n");
    }
}

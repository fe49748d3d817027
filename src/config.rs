//! Configuration management and validation.
//!
//! `AnalysisConfig` carries every tunable of a run: window length, package
//! gap threshold, message codes, recirculation rule, rate targets, mapping
//! lookup, and export settings. Values come from defaults, an optional TOML
//! file, and finally CLI overrides through the `with_*` builders.

use crate::constants::*;
use crate::error::{Result, SorterError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Message codes selecting each analysis family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageCodes {
    pub items_inducted: String,
    pub sort_outcome: String,
    pub destination_request: String,
}

impl Default for MessageCodes {
    fn default() -> Self {
        Self {
            items_inducted: ITEMS_INDUCTED_CODE.to_string(),
            sort_outcome: SORT_OUTCOME_CODE.to_string(),
            destination_request: DESTINATION_REQUEST_CODE.to_string(),
        }
    }
}

/// Rule deciding which successful sorts are recirculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RecirculationRule {
    /// Success to one of a fixed set of destination ids
    Destinations { ids: Vec<i64> },
    /// Success to a destination whose mapping flag equals `flag`
    MappingFlag { flag: String },
}

impl Default for RecirculationRule {
    fn default() -> Self {
        RecirculationRule::Destinations {
            ids: DEFAULT_RECIRCULATION_DESTINATIONS.to_vec(),
        }
    }
}

impl RecirculationRule {
    /// Whether a destination (id plus its mapping flag) is a recirculation target
    pub fn is_recirculation_target(
        &self,
        destination: Option<i64>,
        mapping_flag: Option<&str>,
    ) -> bool {
        match self {
            RecirculationRule::Destinations { ids } => {
                destination.is_some_and(|id| ids.contains(&id))
            }
            RecirculationRule::MappingFlag { flag } => mapping_flag
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(flag.trim())),
        }
    }
}

/// Throughput targets and induction classes for rate analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub single_auto_pph: f64,
    pub single_semi_auto_pph: f64,
    pub all_auto_pph: f64,
    pub all_semi_auto_pph: f64,

    /// Target for SPS-only windows; absent or non-positive excludes SPS
    /// inductions from rate analysis
    pub sps_target_pph: Option<f64>,

    pub semi_auto_inductions: Vec<String>,
    pub auto_inductions: Vec<String>,
    pub sps_inductions: Vec<String>,

    /// Raw induction number to induction name
    pub induction_names: BTreeMap<String, String>,

    /// Induction name to measuring point; unlisted names use the default
    pub measuring_points: BTreeMap<String, String>,
    pub default_measuring_point: String,
}

impl Default for RateConfig {
    fn default() -> Self {
        let induction_names = [
            ("0", "IU001"),
            ("1", "IU002"),
            ("2", "IU003"),
            ("3", "IU004"),
            ("4", "IU005"),
            ("5", "IU006"),
            ("6", "IU007"),
            ("100", "SPS001"),
            ("101", "SPS002"),
        ]
        .into_iter()
        .map(|(number, name)| (number.to_string(), name.to_string()))
        .collect();

        Self {
            single_auto_pph: TARGET_SINGLE_AUTO_PPH,
            single_semi_auto_pph: TARGET_SINGLE_SEMI_AUTO_PPH,
            all_auto_pph: TARGET_ALL_AUTO_PPH,
            all_semi_auto_pph: TARGET_ALL_SEMI_AUTO_PPH,
            sps_target_pph: Some(TARGET_SPS_PPH),
            semi_auto_inductions: ["IU001", "IU002", "IU003", "IU004"]
                .map(String::from)
                .to_vec(),
            auto_inductions: ["IU005", "IU006", "IU007"].map(String::from).to_vec(),
            sps_inductions: ["SPS001", "SPS002"].map(String::from).to_vec(),
            induction_names,
            measuring_points: BTreeMap::new(),
            default_measuring_point: DEFAULT_MEASURING_POINT.to_string(),
        }
    }
}

impl RateConfig {
    /// SPS target if SPS inductions take part in rate analysis
    pub fn sps_target(&self) -> Option<f64> {
        self.sps_target_pph.filter(|target| *target > 0.0)
    }

    /// Name for a raw induction number
    pub fn induction_name(&self, induction_no: Option<&str>) -> String {
        induction_no
            .and_then(|number| self.induction_names.get(number.trim()))
            .cloned()
            .unwrap_or_else(|| UNMAPPED_INDUCTION_LABEL.to_string())
    }

    pub fn measuring_point(&self, induction: &str) -> &str {
        self.measuring_points
            .get(induction)
            .map(String::as_str)
            .unwrap_or(&self.default_measuring_point)
    }
}

/// Where site destination mappings live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub directory: PathBuf,
    pub file_suffix: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
            file_suffix: MAPPING_FILE_SUFFIX.to_string(),
        }
    }
}

impl MappingConfig {
    /// Mapping file for a site code, e.g. `data/SAT9_Destination_Mapping.csv`
    pub fn path_for_site(&self, site: &str) -> PathBuf {
        self.directory.join(format!(
            "{}{}",
            site.trim().to_uppercase(),
            self.file_suffix
        ))
    }
}

/// Output table format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
    pub format: ExportFormat,
    pub csv_separator: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_REPORT_DIR),
            format: ExportFormat::Csv,
            csv_separator: ';',
        }
    }
}

/// Global configuration for a processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Default window length when no end time is requested
    pub window_minutes: i64,

    /// Gap that splits repeated item ids into separate packages
    pub package_gap_secs: i64,

    pub message_codes: MessageCodes,

    /// Sort codes eligible for false-positive correction
    pub scan_defect_codes: Vec<i64>,

    pub recirculation: RecirculationRule,
    pub rate: RateConfig,
    pub mapping: MappingConfig,
    pub export: ExportConfig,

    /// Maximum input files read concurrently
    pub loader_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            package_gap_secs: DEFAULT_PACKAGE_GAP_SECS,
            message_codes: MessageCodes::default(),
            scan_defect_codes: DEFAULT_SCAN_DEFECT_CODES.to_vec(),
            recirculation: RecirculationRule::default(),
            rate: RateConfig::default(),
            mapping: MappingConfig::default(),
            export: ExportConfig::default(),
            loader_concurrency: DEFAULT_LOADER_CONCURRENCY,
        }
    }
}

impl AnalysisConfig {
    /// Load from an explicit file, else the user config file if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(SorterError::InputNotFound {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => match Self::default_path().filter(|candidate| candidate.exists()) {
                Some(candidate) => Self::from_file(&candidate)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file; omitted keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// `<config dir>/sorter-log-processor/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_minutes <= 0 {
            return Err(SorterError::Configuration {
                message: format!(
                    "window_minutes must be positive, got {}",
                    self.window_minutes
                ),
            });
        }
        if self.package_gap_secs <= 0 {
            return Err(SorterError::Configuration {
                message: format!(
                    "package_gap_secs must be positive, got {}",
                    self.package_gap_secs
                ),
            });
        }
        let codes = &self.message_codes;
        for (name, code) in [
            ("items_inducted", &codes.items_inducted),
            ("sort_outcome", &codes.sort_outcome),
            ("destination_request", &codes.destination_request),
        ] {
            if code.trim().is_empty() {
                return Err(SorterError::Configuration {
                    message: format!("message code '{}' must not be empty", name),
                });
            }
        }
        if self.loader_concurrency == 0 {
            return Err(SorterError::Configuration {
                message: "loader_concurrency must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_window_minutes(mut self, minutes: i64) -> Self {
        self.window_minutes = minutes;
        self
    }

    pub fn with_package_gap_secs(mut self, secs: i64) -> Self {
        self.package_gap_secs = secs;
        self
    }

    pub fn with_recirculation(mut self, rule: RecirculationRule) -> Self {
        self.recirculation = rule;
        self
    }

    /// Set or clear the SPS target
    pub fn with_sps_target(mut self, target: Option<f64>) -> Self {
        self.rate.sps_target_pph = target;
        self
    }

    pub fn with_scan_defect_codes(mut self, codes: Vec<i64>) -> Self {
        self.scan_defect_codes = codes;
        self
    }

    pub fn with_mapping_dir(mut self, directory: PathBuf) -> Self {
        self.mapping.directory = directory;
        self
    }

    pub fn with_export_dir(mut self, directory: PathBuf) -> Self {
        self.export.directory = directory;
        self
    }

    pub fn with_export_format(mut self, format: ExportFormat) -> Self {
        self.export.format = format;
        self
    }

    pub fn with_loader_concurrency(mut self, concurrency: usize) -> Self {
        self.loader_concurrency = concurrency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.window_minutes, 30);
        assert_eq!(config.package_gap_secs, 1800);
        assert_eq!(config.message_codes.sort_outcome, "54177");
        assert_eq!(config.scan_defect_codes, vec![8, 9, 10]);
        assert_eq!(config.rate.sps_target(), Some(100.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
window_minutes = 15

[recirculation]
rule = "mapping_flag"
flag = "Recirc"

[rate]
sps_target_pph = 0.0
"#,
        )
        .unwrap();

        assert_eq!(config.window_minutes, 15);
        assert_eq!(config.package_gap_secs, 1800);
        assert_eq!(
            config.recirculation,
            RecirculationRule::MappingFlag {
                flag: "Recirc".to_string()
            }
        );
        assert_eq!(config.rate.sps_target(), None);
        assert_eq!(config.rate.single_auto_pph, 2820.0);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = AnalysisConfig::from_toml("window_minutes = \"thirty\"");
        assert!(matches!(result, Err(SorterError::ConfigParse(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = AnalysisConfig::default().with_window_minutes(0);
        assert!(matches!(
            config.validate(),
            Err(SorterError::Configuration { .. })
        ));

        let mut config = AnalysisConfig::default();
        config.message_codes.items_inducted = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "package_gap_secs = 600").unwrap();
        writeln!(file, "[export]").unwrap();
        writeln!(file, "format = \"parquet\"").unwrap();

        let config = AnalysisConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.package_gap_secs, 600);
        assert_eq!(config.export.format, ExportFormat::Parquet);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AnalysisConfig::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(SorterError::InputNotFound { .. })));
    }

    #[test]
    fn test_recirculation_rules() {
        let fixed = RecirculationRule::default();
        assert!(fixed.is_recirculation_target(Some(3001), None));
        assert!(!fixed.is_recirculation_target(Some(1001), Some("recirc")));
        assert!(!fixed.is_recirculation_target(None, None));

        let flagged = RecirculationRule::MappingFlag {
            flag: "recirc".to_string(),
        };
        assert!(flagged.is_recirculation_target(Some(1001), Some(" Recirc ")));
        assert!(!flagged.is_recirculation_target(Some(3001), None));
    }

    #[test]
    fn test_induction_names_and_mapping_path() {
        let config = AnalysisConfig::default();
        assert_eq!(config.rate.induction_name(Some("4")), "IU005");
        assert_eq!(config.rate.induction_name(Some("101")), "SPS002");
        assert_eq!(config.rate.induction_name(Some("42")), "No Map Yet");
        assert_eq!(config.rate.induction_name(None), "No Map Yet");
        assert_eq!(config.rate.measuring_point("IU001"), "MP1000605");

        let path = config.mapping.path_for_site("sat9");
        assert_eq!(path, PathBuf::from("data/SAT9_Destination_Mapping.csv"));
    }
}

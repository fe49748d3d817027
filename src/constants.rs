//! Application constants for the sorter log processor
//!
//! Default values, fixed log-format markers, and the labels written into
//! result tables.

// =============================================================================
// Raw Log Format
// =============================================================================

/// Field delimiter of controller log exports
pub const LOG_DELIMITER: u8 = b';';

/// Positional column names of a raw log line
pub const RAW_COLUMNS: [&str; 12] = [
    "timeStamp",
    "flag",
    "systemName",
    "ipAddress",
    "sender",
    "unknown",
    "unknown_2",
    "timeStampPLC",
    "mainCabinetName",
    "messageCode",
    "sequenceNo",
    "rawMessage",
];

/// Number of positional fields per log line
pub const RAW_FIELD_COUNT: usize = RAW_COLUMNS.len();

/// Marker wrapping the structured payload on the left
pub const PAYLOAD_PREFIX: &str = "->{";

/// Marker wrapping the structured payload on the right
pub const PAYLOAD_SUFFIX: &str = "}<";

/// Column holding the parsed record timestamp
pub const TIMESTAMP_COLUMN: &str = "timeStamp";

/// File extensions accepted as log input
pub const SUPPORTED_LOG_EXTENSIONS: &[&str] = &["csv", "log", "txt"];

// =============================================================================
// Message Codes
// =============================================================================

/// Items inducted (rate analysis)
pub const ITEMS_INDUCTED_CODE: &str = "54123";

/// Destination request
pub const DESTINATION_REQUEST_CODE: &str = "54163";

/// Sort outcome report
pub const SORT_OUTCOME_CODE: &str = "54177";

// =============================================================================
// List Expansion
// =============================================================================

/// Filler for numeric-coded list fields
pub const NUMERIC_SENTINEL: i64 = -1;

/// Filler for status text list fields
pub const STATUS_SENTINEL: &str = "Unused";

// =============================================================================
// Analysis Defaults
// =============================================================================

pub const DEFAULT_WINDOW_MINUTES: i64 = 30;

/// Gap in seconds that splits repeated item ids into separate packages
pub const DEFAULT_PACKAGE_GAP_SECS: i64 = 1800;

/// Sort codes treated as scan defects (No_Read, No_Code, Multi_Label)
pub const DEFAULT_SCAN_DEFECT_CODES: &[i64] = &[8, 9, 10];

/// Destinations whose successful sorts mean the item recirculated
pub const DEFAULT_RECIRCULATION_DESTINATIONS: &[i64] = &[3001, 3002];

pub const DEFAULT_LOADER_CONCURRENCY: usize = 4;

// =============================================================================
// Rate Targets (items per hour)
// =============================================================================

pub const TARGET_SINGLE_AUTO_PPH: f64 = 2820.0;
pub const TARGET_SINGLE_SEMI_AUTO_PPH: f64 = 2640.0;
pub const TARGET_ALL_AUTO_PPH: f64 = 7351.0 / 3.0;
pub const TARGET_ALL_SEMI_AUTO_PPH: f64 = 9119.0 / 4.0;
pub const TARGET_SPS_PPH: f64 = 100.0;

pub const DEFAULT_MEASURING_POINT: &str = "MP1000605";

// =============================================================================
// Result Labels
// =============================================================================

pub const ALL_INDUCTIONS_LABEL: &str = "All Inductions";
pub const UNMAPPED_INDUCTION_LABEL: &str = "No Map Yet";
pub const NO_DEFECT_LABEL: &str = "No Defect";
pub const JACKPOT_FLAG: &str = "jackpot";
pub const CHUTE_JAM_MESSAGE: &str = "Chute: Jam";
pub const EMERGENCY_STOP_GROUP: &str = "ES";

// =============================================================================
// Files and Directories
// =============================================================================

/// Suffix of site destination mapping files, e.g. `SAT9_Destination_Mapping.csv`
pub const MAPPING_FILE_SUFFIX: &str = "_Destination_Mapping.csv";

pub const CONFIG_DIR_NAME: &str = "sorter-log-processor";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_REPORT_DIR: &str = "data/reports";

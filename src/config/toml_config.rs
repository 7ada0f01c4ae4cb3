use crate::core::fanout::DEFAULT_CONCURRENCY_LIMIT;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{LocatorError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STORAGE_API_URL: &str =
    "https://www.googleapis.com/storage/v1/b/gcp-public-data-sentinel-2/o?prefix=";
pub const DEFAULT_GEOCODE_API_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_CATALOG_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_CATALOG_TABLE: &str =
    "bigquery-public-data.cloud_storage_geo_index.sentinel_2_index";
pub const DEFAULT_BOUNDARY_BASE_URL: &str = "https://download.geofabrik.de";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub coverer: CovererConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub storage_api_url: String,
    pub geocode_api_url: String,
    pub geocode_api_key: String,
    pub catalog_api_url: String,
    pub catalog_project: String,
    pub catalog_table: String,
    pub catalog_access_token: Option<String>,
    pub boundary_base_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            storage_api_url: DEFAULT_STORAGE_API_URL.to_string(),
            geocode_api_url: DEFAULT_GEOCODE_API_URL.to_string(),
            geocode_api_key: String::new(),
            catalog_api_url: DEFAULT_CATALOG_API_URL.to_string(),
            catalog_project: String::new(),
            catalog_table: DEFAULT_CATALOG_TABLE.to_string(),
            catalog_access_token: None,
            boundary_base_url: DEFAULT_BOUNDARY_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub concurrency_limit: usize,
    pub request_timeout_seconds: Option<u64>,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            request_timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CovererConfig {
    pub max_level: u8,
    pub max_cells: usize,
}

impl Default for CovererConfig {
    fn default() -> Self {
        Self {
            max_level: 30,
            max_cells: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub strict: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LocatorError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LocatorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEOCODE_API_KEY})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| LocatorError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// HTTP client 的逾時設定
    pub fn request_timeout(&self) -> Option<Duration> {
        self.fanout.request_timeout_seconds.map(Duration::from_secs)
    }
}

impl ConfigProvider for TomlConfig {
    fn storage_api_url(&self) -> &str {
        &self.endpoints.storage_api_url
    }

    fn concurrency_limit(&self) -> usize {
        self.fanout.concurrency_limit
    }

    fn max_cover_level(&self) -> u8 {
        self.coverer.max_level
    }

    fn max_cover_cells(&self) -> usize {
        self.coverer.max_cells
    }

    fn strict_boundary_parsing(&self) -> bool {
        self.parser.strict
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        let endpoints = &self.endpoints;
        validate_url("endpoints.storage_api_url", &endpoints.storage_api_url)?;
        validate_url("endpoints.geocode_api_url", &endpoints.geocode_api_url)?;
        validate_url("endpoints.catalog_api_url", &endpoints.catalog_api_url)?;
        validate_url("endpoints.boundary_base_url", &endpoints.boundary_base_url)?;
        validate_non_empty_string("endpoints.catalog_project", &endpoints.catalog_project)?;
        validate_non_empty_string("endpoints.catalog_table", &endpoints.catalog_table)?;

        // 並行上限為 0 時任何任務都無法開始
        validate_positive_number("fanout.concurrency_limit", self.fanout.concurrency_limit, 1)?;
        if let Some(timeout) = self.fanout.request_timeout_seconds {
            validate_positive_number("fanout.request_timeout_seconds", timeout as usize, 1)?;
        }

        validate_range("coverer.max_level", self.coverer.max_level, 0, 30)?;
        validate_positive_number("coverer.max_cells", self.coverer.max_cells, 1)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[endpoints]
storage_api_url = "https://storage.example.com/o?prefix="
geocode_api_url = "https://geo.example.com/json"
geocode_api_key = "secret"
catalog_api_url = "https://bq.example.com/v2"
catalog_project = "my-project"
catalog_table = "dataset.sentinel_2_index"
boundary_base_url = "https://poly.example.com"

[fanout]
concurrency_limit = 8
request_timeout_seconds = 30

[coverer]
max_level = 12
max_cells = 40

[parser]
strict = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.storage_api_url(), "https://storage.example.com/o?prefix=");
        assert_eq!(config.endpoints.catalog_project, "my-project");
        assert_eq!(config.concurrency_limit(), 8);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_cover_level(), 12);
        assert_eq!(config.max_cover_cells(), 40);
        assert!(config.strict_boundary_parsing());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
[endpoints]
catalog_project = "p"
"#,
        )
        .unwrap();

        assert_eq!(config.storage_api_url(), DEFAULT_STORAGE_API_URL);
        assert_eq!(config.endpoints.catalog_table, DEFAULT_CATALOG_TABLE);
        assert_eq!(config.concurrency_limit(), 100);
        assert_eq!(config.max_cover_level(), 30);
        assert_eq!(config.max_cover_cells(), 100);
        assert!(!config.strict_boundary_parsing());
        assert_eq!(config.request_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SENTINEL_TEST_GEOCODE_KEY", "key-from-env");

        let toml_content = r#"
[endpoints]
catalog_project = "p"
geocode_api_key = "${SENTINEL_TEST_GEOCODE_KEY}"
catalog_access_token = "${SENTINEL_TEST_UNSET_TOKEN}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.endpoints.geocode_api_key, "key-from-env");
        assert_eq!(
            config.endpoints.catalog_access_token.as_deref(),
            Some("${SENTINEL_TEST_UNSET_TOKEN}")
        );

        std::env::remove_var("SENTINEL_TEST_GEOCODE_KEY");
    }

    #[test]
    fn test_zero_concurrency_is_invalid() {
        let config = TomlConfig::from_toml_str(
            r#"
[endpoints]
catalog_project = "p"

[fanout]
concurrency_limit = 0
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LocatorError::InvalidConfigValueError { ref field, .. } if field == "fanout.concurrency_limit"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = TomlConfig::default();
        assert!(config.validate().is_err());

        config.endpoints.catalog_project = "p".to_string();
        assert!(config.validate().is_ok());

        config.endpoints.storage_api_url = "gs://bucket".to_string();
        assert!(config.validate().is_err());

        config.endpoints.storage_api_url = DEFAULT_STORAGE_API_URL.to_string();
        config.coverer.max_level = 31;
        assert!(config.validate().is_err());

        config.coverer.max_level = 30;
        config.coverer.max_cells = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = TomlConfig::from_toml_str("[fanout]\nconcurrency_limit = \"many\"\n").unwrap_err();
        assert!(matches!(err, LocatorError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[endpoints]
catalog_project = "file-project"

[fanout]
concurrency_limit = 3
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.endpoints.catalog_project, "file-project");
        assert_eq!(config.concurrency_limit(), 3);
    }
}

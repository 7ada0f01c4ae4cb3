pub mod toml_config;

pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "sentinel-locator")]
#[command(about = "Locate Sentinel-2 imagery for a point, an area or a boundary polygon")]
pub struct CliConfig {
    #[arg(long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Override the maximum number of concurrent requests")]
    pub concurrency: Option<usize>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Write logs to stderr as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Reject malformed coordinates in boundary files")]
    pub strict_poly: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 依座標列出影像
    Point {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// 依地址列出影像
    Address { address: String },
    /// 列出經緯度矩形內的影像
    Area {
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
    },
    /// 計算 .poly 邊界檔內的影像數
    Polygon { file: PathBuf },
    /// 下載具名區域的邊界檔後計算影像數
    Region { region: String, country: String },
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列參數覆寫檔案設定
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(concurrency) = self.concurrency {
            config.fanout.concurrency_limit = concurrency;
        }
        if self.strict_poly {
            config.parser.strict = true;
        }
    }

    pub fn load_config(&self) -> crate::utils::error::Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_command() {
        let cli = CliConfig::try_parse_from([
            "sentinel-locator",
            "--concurrency",
            "4",
            "point",
            "--lat",
            "37.4224764",
            "--lng",
            "-122.0842499",
        ])
        .unwrap();

        assert_eq!(cli.concurrency, Some(4));
        match cli.command {
            Command::Point { lat, lng } => {
                assert_eq!(lat, 37.4224764);
                assert_eq!(lng, -122.0842499);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_region_command() {
        let cli =
            CliConfig::try_parse_from(["sentinel-locator", "--strict-poly", "--json-logs", "region", "europe", "denmark"])
                .unwrap();
        assert!(cli.strict_poly);
        assert!(cli.json_logs);
        assert!(matches!(
            cli.command,
            Command::Region { ref region, ref country } if region == "europe" && country == "denmark"
        ));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let cli = CliConfig::try_parse_from([
            "sentinel-locator",
            "--concurrency",
            "0",
            "--strict-poly",
            "address",
            "Rued Langgaards Vej 7",
        ])
        .unwrap();

        let mut config = TomlConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.fanout.concurrency_limit, 0);
        assert!(config.parser.strict);
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(CliConfig::try_parse_from(["sentinel-locator", "--verbose"]).is_err());
    }
}

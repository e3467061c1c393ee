// 音乐流媒体服务器 - 配置
//
// 配置来源按优先级从低到高：内置默认值、TOML配置文件、命令行参数。

use crate::streaming::{MimeError, MimeRegistry};
use crate::streaming::engine::DEFAULT_CHUNK_SIZE;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid listen address {0}")]
    InvalidAddress(String),

    #[error("invalid MIME override: {0}")]
    Mime(#[from] MimeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub media_root: PathBuf,
    /// 重新扫描间隔（秒），0表示只在启动时扫描
    pub scan_interval_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("./media"),
            scan_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub binary: String,
    pub probe_timeout_secs: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            probe_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub library: LibraryConfig,
    pub stream: StreamConfig,
    pub transcode: TranscodeConfig,
    /// 文件类型到MIME类型的覆盖，例如 `flac = "audio/x-flac"`
    pub mime: HashMap<String, String>,
}

impl Config {
    /// 从TOML文件加载，未指定文件时使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        // 尽早校验MIME覆盖
        MimeRegistry::with_overrides(&config.mime)?;
        Ok(config)
    }

    /// 命令行参数覆盖配置文件
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.http.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.http.port = port;
        }
        if let Some(media) = &cli.media {
            self.library.media_root = media.clone();
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.http.host, self.http.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }

    pub fn rescan_interval(&self) -> Option<Duration> {
        match self.library.scan_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode.probe_timeout_secs)
    }

    pub fn mime_registry(&self) -> Result<MimeRegistry, ConfigError> {
        Ok(MimeRegistry::with_overrides(&self.mime)?)
    }
}

/// 命令行参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cli {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub media: Option<PathBuf>,
    /// 自检模式：启动后5秒自动停止
    pub test: bool,
}

impl Cli {
    fn command() -> Command {
        Command::new("media-server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Self-hosted audio streaming server")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("TOML configuration file"),
            )
            .arg(
                Arg::new("host")
                    .long("host")
                    .value_name("HOST")
                    .help("HTTP listen host"),
            )
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .value_parser(clap::value_parser!(u16))
                    .help("HTTP listen port"),
            )
            .arg(
                Arg::new("media")
                    .short('m')
                    .long("media")
                    .value_name("DIRECTORY")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Media library root directory"),
            )
            .arg(
                Arg::new("test")
                    .long("test")
                    .action(ArgAction::SetTrue)
                    .help("Start all subsystems, then shut down after 5 seconds"),
            )
    }

    /// 解析进程参数，参数错误时打印用法并退出
    pub fn parse() -> Self {
        Self::try_parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config: matches.get_one::<PathBuf>("config").cloned(),
            host: matches.get_one::<String>("host").cloned(),
            port: matches.get_one::<u16>("port").copied(),
            media: matches.get_one::<PathBuf>("media").cloned(),
            test: matches.get_flag("test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::FileType;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.stream.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.transcode.binary, "ffmpeg");
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.rescan_interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.listen_addr().unwrap(), "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
                [http]
                port = 4040

                [library]
                media_root = "/srv/music"
                scan_interval_secs = 0

                [mime]
                flac = "audio/x-flac"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.http.port, 4040);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.library.media_root, PathBuf::from("/srv/music"));
        assert_eq!(config.rescan_interval(), None);

        let registry = config.mime_registry().unwrap();
        assert_eq!(registry.mime_for(Some(FileType::Flac)), "audio/x-flac");
    }

    #[test]
    fn test_invalid_files() {
        assert!(matches!(
            Config::load(Some(Path::new("/definitely/missing.toml"))),
            Err(ConfigError::Read { .. })
        ));
        assert!(matches!(
            Config::from_toml("[http]\nport = \"not a port\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml("[mime]\nxyz = \"audio/xyz\""),
            Err(ConfigError::Mime(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "media-server",
            "--port",
            "9000",
            "--media",
            "/tmp/music",
            "--test",
        ])
        .unwrap();
        assert!(cli.test);
        assert_eq!(cli.config, None);

        let mut config = Config::default();
        config.apply(&cli);
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.library.media_root, PathBuf::from("/tmp/music"));
    }

    #[test]
    fn test_cli_rejects_bad_port() {
        let err = Cli::try_parse_from(["media-server", "--port", "http"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_invalid_host() {
        let mut config = Config::default();
        config.http.host = "not a host".to_string();
        assert!(matches!(config.listen_addr(), Err(ConfigError::InvalidAddress(_))));
    }
}

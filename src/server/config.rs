use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Process configuration. The `RtmpListen`/`HttpListen`/... fields are the ones a JSON
/// config file populates; the rest are programmatic-only and set via the builder (no
/// equivalent in the original config file format).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "RtmpListen", default = "default_rtmp_listen")]
    pub rtmp_listen: String,

    #[serde(rename = "HttpListen", default = "default_http_listen")]
    pub http_listen: String,

    #[serde(rename = "HttpsListen", default)]
    pub https_listen: String,

    #[serde(rename = "HttpsCrt", default)]
    pub https_crt: String,

    #[serde(rename = "HttpsKey", default)]
    pub https_key: String,

    #[serde(rename = "HttpsUse", default)]
    pub https_use: bool,

    /// Sliding-window playlist length.
    #[serde(rename = "HlsM3u8TsNum", default = "default_hls_m3u8_ts_num")]
    pub hls_m3u8_ts_num: usize,

    /// Minimum segment duration in seconds before a key frame may cut a new one.
    #[serde(rename = "HlsTsMaxTime", default = "default_hls_ts_max_time")]
    pub hls_ts_max_time: u32,

    #[serde(rename = "HlsSavePath", default = "default_hls_save_path")]
    pub hls_save_path: String,

    /// Closed GOPs retained per publisher.
    #[serde(rename = "GopCacheMax", default = "default_gop_cache_max")]
    pub gop_cache_max: usize,

    /// Log rotation is an excluded trivial collaborator; these fields are read but no
    /// rotating appender is wired up.
    #[serde(rename = "LogFile", default)]
    pub log_file: String,
    #[serde(rename = "LogFileSize", default)]
    pub log_file_size: u64,
    #[serde(rename = "LogFileNum", default)]
    pub log_file_num: u32,
    #[serde(rename = "LogSaveDay", default)]
    pub log_save_day: u32,
    #[serde(rename = "LogStreamPath", default)]
    pub log_stream_path: String,

    #[serde(skip, default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(skip, default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,

    #[serde(skip, default = "default_chunk_size")]
    pub chunk_size: u32,

    #[serde(skip, default = "default_window_ack_size")]
    pub window_ack_size: u32,

    #[serde(skip, default = "default_peer_bandwidth")]
    pub peer_bandwidth: u32,

    #[serde(skip, default = "default_ping_interval")]
    pub ping_interval: Duration,

    #[serde(skip, default = "default_idle_timeout")]
    pub idle_timeout: Duration,

    #[serde(skip, default = "default_true")]
    pub allow_publish: bool,

    #[serde(skip, default = "default_true")]
    pub allow_play: bool,
}

fn default_rtmp_listen() -> String {
    "0.0.0.0:1935".to_string()
}

fn default_http_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_hls_m3u8_ts_num() -> usize {
    6
}

fn default_hls_ts_max_time() -> u32 {
    10
}

fn default_hls_save_path() -> String {
    "./hls".to_string()
}

fn default_gop_cache_max() -> usize {
    1
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_connections_per_ip() -> usize {
    10
}

fn default_chunk_size() -> u32 {
    4096
}

fn default_window_ack_size() -> u32 {
    2_500_000
}

fn default_peer_bandwidth() -> u32 {
    2_500_000
}

fn default_ping_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            rtmp_listen: default_rtmp_listen(),
            http_listen: default_http_listen(),
            https_listen: String::new(),
            https_crt: String::new(),
            https_key: String::new(),
            https_use: false,
            hls_m3u8_ts_num: default_hls_m3u8_ts_num(),
            hls_ts_max_time: default_hls_ts_max_time(),
            hls_save_path: default_hls_save_path(),
            gop_cache_max: default_gop_cache_max(),
            log_file: String::new(),
            log_file_size: 0,
            log_file_num: 0,
            log_save_day: 0,
            log_stream_path: String::new(),
            max_connections: default_max_connections(),
            max_connections_per_ip: default_max_connections_per_ip(),
            chunk_size: default_chunk_size(),
            window_ack_size: default_window_ack_size(),
            peer_bandwidth: default_peer_bandwidth(),
            ping_interval: default_ping_interval(),
            idle_timeout: default_idle_timeout(),
            allow_publish: true,
            allow_play: true,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Parse a JSON config document. Locating and watching the file on disk is left to
    /// the caller; this only turns its contents into a validated struct.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: ServerConfig = serde_json::from_str(s)
            .map_err(|e| Error::config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn hls_config(&self) -> crate::hls::HlsConfig {
        crate::hls::HlsConfig {
            save_path: self.hls_save_path.clone(),
            m3u8_ts_num: self.hls_m3u8_ts_num,
            ts_max_time_ms: self.hls_ts_max_time.saturating_mul(1000),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let port = self
            .rtmp_listen
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| Error::config(format!("invalid RtmpListen address: {}", self.rtmp_listen)))?;

        if port == 0 {
            return Err(Error::config("invalid port: 0"));
        }

        if self.max_connections == 0 {
            return Err(Error::config("invalid max_connections: 0"));
        }

        if self.chunk_size < 128 || self.chunk_size > 65536 {
            return Err(Error::config("chunk size must be between 128 and 65536"));
        }

        if self.hls_m3u8_ts_num == 0 {
            return Err(Error::config("HlsM3u8TsNum must be at least 1"));
        }

        Ok(())
    }
}

/// Builder for `ServerConfig`. `host`/`port` are builder-only conveniences that get
/// folded into `rtmp_listen` at `build()`.
pub struct ServerConfigBuilder {
    config: ServerConfig,
    host: String,
    port: u16,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        let config = ServerConfig::default();
        let (host, port) = split_host_port(&config.rtmp_listen);
        ServerConfigBuilder { config, host, port }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn http_listen(mut self, addr: impl Into<String>) -> Self {
        self.config.http_listen = addr.into();
        self
    }

    pub fn hls_save_path(mut self, path: impl Into<String>) -> Self {
        self.config.hls_save_path = path.into();
        self
    }

    pub fn gop_cache_max(mut self, max: usize) -> Self {
        self.config.gop_cache_max = max;
        self
    }

    pub fn build(mut self) -> Result<ServerConfig> {
        self.config.rtmp_listen = format!("{}:{}", self.host, self.port);
        self.config.validate()?;
        Ok(self.config)
    }
}

fn split_host_port(addr: &str) -> (String, u16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(1935)),
        None => (addr.to_string(), 1935),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_assembles_rtmp_listen() {
        let config = ServerConfig::builder().host("127.0.0.1").port(1936).build().unwrap();
        assert_eq!(config.rtmp_listen, "127.0.0.1:1936");
    }

    #[test]
    fn from_json_str_applies_defaults_for_missing_fields() {
        let config = ServerConfig::from_json_str(r#"{"RtmpListen": "0.0.0.0:1935"}"#).unwrap();
        assert_eq!(config.hls_m3u8_ts_num, 6);
        assert_eq!(config.gop_cache_max, 1);
    }

    #[test]
    fn from_json_str_honors_hls_fields() {
        let json = r#"{
            "RtmpListen": "0.0.0.0:1935",
            "HlsM3u8TsNum": 8,
            "HlsTsMaxTime": 4,
            "GopCacheMax": 2
        }"#;
        let config = ServerConfig::from_json_str(json).unwrap();
        assert_eq!(config.hls_m3u8_ts_num, 8);
        assert_eq!(config.hls_ts_max_time, 4);
        assert_eq!(config.gop_cache_max, 2);
        assert_eq!(config.hls_config().ts_max_time_ms, 4000);
    }

    #[test]
    fn rejects_chunk_size_out_of_range() {
        let result = ServerConfig::builder().chunk_size(64).build();
        assert!(result.is_err());
    }
}

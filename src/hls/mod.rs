pub mod playlist;
pub mod segmenter;

/// Per-publisher HLS segmenter configuration.
#[derive(Debug, Clone)]
pub struct HlsConfig {
    /// Directory segments and playlists for all streams are written under.
    pub save_path: String,

    /// Number of segments kept in the sliding-window playlist (`hls_m3u8_ts_num`).
    pub m3u8_ts_num: usize,

    /// Target segment duration in milliseconds (`hls_ts_max_time`, seconds in config).
    pub ts_max_time_ms: u32,
}

impl Default for HlsConfig {
    fn default() -> Self {
        HlsConfig {
            save_path: "./hls".to_string(),
            m3u8_ts_num: 6,
            ts_max_time_ms: 10_000,
        }
    }
}

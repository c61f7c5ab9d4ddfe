//! How the finished reel is written: H.264 + AAC in a streamable MP4.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reels are always written at this rate, whatever the clips were shot at.
pub const REEL_FPS: u32 = 30;
pub const DEFAULT_THREADS: u32 = 8;

/// Output encoder settings. Missing JSON fields take the default profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    /// x264 speed preset
    pub preset: String,
    pub video_bitrate: String,
    pub fps: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub threads: u32,
    /// Appended after the generated arguments
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "ultrafast".into(),
            video_bitrate: "2500k".into(),
            fps: REEL_FPS,
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            threads: DEFAULT_THREADS,
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Cap encoder threads; zero is raised to one.
    pub fn with_threads(self, threads: u32) -> Self {
        Self {
            threads: threads.max(1),
            ..self
        }
    }

    /// Output options placed before the output path.
    pub fn output_args(&self) -> Vec<String> {
        let fps = self.fps.to_string();
        let threads = self.threads.to_string();
        let pairs: [(&str, &str); 9] = [
            ("-c:v", self.codec.as_str()),
            ("-preset", self.preset.as_str()),
            ("-b:v", self.video_bitrate.as_str()),
            ("-r", fps.as_str()),
            // players on phones reject 4:4:4 H.264
            ("-pix_fmt", "yuv420p"),
            ("-threads", threads.as_str()),
            ("-c:a", self.audio_codec.as_str()),
            ("-b:a", self.audio_bitrate.as_str()),
            ("-movflags", "+faststart"),
        ];

        pairs
            .iter()
            .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
            .chain(self.extra_args.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        let at = args.iter().position(|a| a == flag)?;
        args.get(at + 1).cloned()
    }

    #[test]
    fn test_default_profile_args() {
        let args = EncodingConfig::default().output_args();
        assert_eq!(value_after(&args, "-c:v").as_deref(), Some("libx264"));
        assert_eq!(value_after(&args, "-preset").as_deref(), Some("ultrafast"));
        assert_eq!(value_after(&args, "-r").as_deref(), Some("30"));
        assert_eq!(value_after(&args, "-b:a").as_deref(), Some("128k"));
        assert_eq!(value_after(&args, "-threads").as_deref(), Some("8"));
        assert_eq!(args.len(), 18);
    }

    #[test]
    fn test_thread_cap_and_extra_args() {
        let mut config = EncodingConfig::default().with_threads(0);
        config.extra_args = vec!["-shortest".into()];
        let args = config.output_args();
        assert_eq!(value_after(&args, "-threads").as_deref(), Some("1"));
        assert_eq!(args.last().map(String::as_str), Some("-shortest"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"preset": "veryfast"}"#).unwrap();
        assert_eq!(config.preset, "veryfast");
        assert_eq!(config.video_bitrate, "2500k");
        assert_eq!(config.fps, REEL_FPS);
    }
}

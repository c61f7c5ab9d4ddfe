//! Building and running `ffmpeg` invocations.
//!
//! Inputs carry their own options (`-ss`, `-t`, `-stream_loop`)
//! so a command reads in the same order ffmpeg parses it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::progress::EncodeProgress;

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One `-i` input with the options that apply to it.
#[derive(Debug, Clone)]
pub struct FfmpegInput {
    options: Vec<String>,
    locator: String,
}

impl FfmpegInput {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            options: Vec::new(),
            locator: path.as_ref().to_string_lossy().into_owned(),
        }
    }

    fn option(mut self, flag: &str, value: String) -> Self {
        self.options.push(flag.to_string());
        self.options.push(value);
        self
    }

    /// Start reading at `seconds`.
    pub fn seek(self, seconds: f64) -> Self {
        self.option("-ss", format!("{:.3}", seconds))
    }

    /// Read at most `seconds`.
    pub fn duration(self, seconds: f64) -> Self {
        self.option("-t", format!("{:.3}", seconds))
    }

    /// Play the input `extra_plays` more times after the first.
    pub fn stream_loop(self, extra_plays: u32) -> Self {
        if extra_plays == 0 {
            self
        } else {
            self.option("-stream_loop", extra_plays.to_string())
        }
    }
}

/// A single ffmpeg invocation writing one output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    /// `-` writes to stdout
    output: PathBuf,
    output_args: Vec<String>,
    report_progress: bool,
}

impl FfmpegCommand {
    /// Overwrites `output` and reports progress on stderr.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            report_progress: true,
        }
    }

    /// Raw output on stdout, for frame grabs and PCM.
    pub fn to_stdout() -> Self {
        Self {
            report_progress: false,
            ..Self::new("-")
        }
    }

    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    fn output_option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.output_args.push(flag.to_string());
        self.output_args.push(value.into());
        self
    }

    /// Append output options verbatim.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn video_filter(self, graph: impl Into<String>) -> Self {
        self.output_option("-vf", graph)
    }

    pub fn filter_complex(self, graph: impl Into<String>) -> Self {
        self.output_option("-filter_complex", graph)
    }

    /// Send a stream or `[label]` to the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_option("-map", label)
    }

    pub fn output_duration(self, seconds: f64) -> Self {
        self.output_option("-t", format!("{:.3}", seconds))
    }

    pub fn single_frame(self) -> Self {
        self.output_option("-frames:v", "1")
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-v".into(), "error".into()];
        if self.report_progress {
            args.extend(["-progress".into(), "pipe:2".into()]);
        }
        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".into());
            args.push(input.locator.clone());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Spawns ffmpeg for built commands.
#[derive(Debug, Default, Clone)]
pub struct FfmpegRunner;

impl FfmpegRunner {
    pub fn new() -> Self {
        Self
    }

    fn spawn(cmd: &FfmpegCommand, stdout: Stdio) -> MediaResult<Child> {
        check_ffmpeg()?;
        let args = cmd.build_args();
        debug!("ffmpeg {}", args.join(" "));
        Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::ffmpeg_failed(format!("Could not start ffmpeg: {}", e), None, None))
    }

    /// Run to completion, handing each closed progress block to `on_progress`.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, mut on_progress: F) -> MediaResult<()>
    where
        F: FnMut(EncodeProgress) + Send + 'static,
    {
        let mut child = Self::spawn(cmd, Stdio::null())?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;

        // Progress goes to the callback; the rest of stderr is kept for the error report
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut block = EncodeProgress::default();
            let mut tail: Vec<String> = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if EncodeProgress::is_progress_line(&line) {
                    if let Some(snapshot) = block.feed(&line) {
                        on_progress(snapshot);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
            }
            tail
        });

        let status = child.wait().await?;
        let tail = reader.await.unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        Err(MediaError::ffmpeg_failed(
            format!("ffmpeg exited with {}", status),
            (!tail.is_empty()).then(|| tail.join("\n")),
            status.code(),
        ))
    }

    /// Run a [`FfmpegCommand::to_stdout`] command and return what it wrote.
    pub async fn run_capture(&self, cmd: &FfmpegCommand) -> MediaResult<Vec<u8>> {
        let mut child = Self::spawn(cmd, Stdio::piped())?;
        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(MediaError::internal("ffmpeg pipes not captured"));
        };

        let log = tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        });
        let mut bytes = Vec::new();
        stdout.read_to_end(&mut bytes).await?;

        let status = child.wait().await?;
        let log = log.await.unwrap_or_default();
        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("ffmpeg exited with {}", status),
                Some(log),
                status.code(),
            ));
        }
        Ok(bytes)
    }
}

/// Path of the `ffmpeg` binary, if installed.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Path of the `ffprobe` binary, if installed.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_multiple_inputs() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input(FfmpegInput::file("a.mp4").seek(1.5).duration(3.0))
            .input(FfmpegInput::file("song.mp3").stream_loop(2))
            .filter_complex("[0:v]null[v]")
            .map("[v]");

        let args = cmd.build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ss 1.500 -t 3.000 -i a.mp4"));
        assert!(joined.contains("-stream_loop 2 -i song.mp3"));
        assert!(joined.contains("-map [v]"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
        assert_eq!(&args[..3], ["-y", "-v", "error"]);
    }

    #[test]
    fn test_stream_loop_zero_is_noop() {
        let args = FfmpegCommand::new("o.wav")
            .input(FfmpegInput::file("m.mp3").stream_loop(0))
            .build_args();
        assert!(!args.contains(&"-stream_loop".to_string()));
    }

    #[test]
    fn test_stdout_command_has_no_progress() {
        let args = FfmpegCommand::to_stdout()
            .input(FfmpegInput::file("a.mp4"))
            .build_args();
        assert!(!args.contains(&"-progress".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }
}

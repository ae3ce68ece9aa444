//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{RenderError, Result};

/// One ffmpeg invocation: any number of inputs, each with its own leading
/// arguments, then output arguments and the output path.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<(Vec<String>, PathBuf)>,
    output_args: Vec<String>,
    output: PathBuf,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            log_level: "error".to_string(),
        }
    }

    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(path, Vec::<String>::new())
    }

    /// Add an input preceded by arguments that apply to it (e.g. `-f concat`).
    pub fn input_with<I, S>(mut self, path: impl AsRef<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push((
            args.into_iter().map(Into::into).collect(),
            path.as_ref().to_path_buf(),
        ));
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), self.log_level.clone()];
        for (input_args, path) in &self.inputs {
            args.extend(input_args.iter().cloned());
            args.push("-i".to_string());
            args.push(path.to_string_lossy().to_string());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }

    /// Runs the command with `binary`, returning stderr in the error on failure.
    pub async fn run(&self, binary: &Path) -> Result<()> {
        let args = self.build_args();
        debug!("ffmpeg {}", args.join(" "));

        let output = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RenderError::Ffmpeg {
                message: format!("failed to run {}: {}", binary.display(), e),
                stderr: None,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RenderError::Ffmpeg {
                message: format!(
                    "writing {} exited with {}: {}",
                    self.output.display(),
                    output.status,
                    stderr.lines().last().unwrap_or("no output")
                ),
                stderr: Some(stderr),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_inputs_in_order_with_their_args() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input("video.mp4")
            .input_with("list.txt", ["-f", "concat", "-safe", "0"])
            .video_codec("copy")
            .audio_codec("aac");

        assert_eq!(
            cmd.build_args(),
            vec![
                "-y", "-v", "error", "-i", "video.mp4", "-f", "concat", "-safe", "0", "-i",
                "list.txt", "-c:v", "copy", "-c:a", "aac", "out.mp4",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_an_ffmpeg_error() {
        let err = FfmpegCommand::new("out.mp4")
            .input("in.mp4")
            .run(Path::new("/nonexistent/ffmpeg-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Ffmpeg { stderr: None, .. }));
    }
}

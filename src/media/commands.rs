use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, ScribeError};

/// Loudness target shared by normalization and compression (EBU R128)
pub const LOUDNORM_FILTER: &str = "loudnorm=I=-23:TP=-2:LRA=11";

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Disable audio
    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Add audio filter
    pub fn audio_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-af").arg(filter)
    }

    pub fn map<S: Into<String>>(self, spec: S) -> Self {
        self.arg("-map").arg(spec)
    }

    /// Machine-readable progress on stdout
    pub fn progress_to_stdout(self) -> Self {
        self.arg("-progress").arg("pipe:1").arg("-nostats")
    }

    /// Execute the command
    pub fn execute(&self) -> Result<()> {
        self.execute_capture().map(|_| ())
    }

    /// Execute and return stdout
    pub fn execute_capture(&self) -> Result<String> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .map_err(|e| ScribeError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScribeError::Media(format!("{} failed: {}", self.description, stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Execute, feeding every `-progress` timestamp to `on_progress`.
    ///
    /// The command must have been built with [`progress_to_stdout`](Self::progress_to_stdout).
    pub fn execute_with_progress<F>(&self, mut on_progress: F) -> Result<()>
    where
        F: FnMut(Duration),
    {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScribeError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        // Drain stderr on its own thread so a chatty encoder cannot fill the pipe.
        let stderr = child.stderr.take();
        let stderr_reader = std::thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_string(&mut text) {
                    debug!("Failed to read encoder stderr: {}", e);
                }
            }
            text
        });

        let mut read_error = None;
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) => {
                        if let Some(elapsed) = parse_progress_line(&line) {
                            on_progress(elapsed);
                        }
                    }
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                }
            }
        }

        if let Some(e) = read_error {
            // The child still writes into its output path; stop it before reporting.
            if let Err(kill_err) = child.kill() {
                debug!("Failed to kill {}: {}", self.binary_path, kill_err);
            }
            let _ = child.wait();
            let _ = stderr_reader.join();
            return Err(ScribeError::Media(format!(
                "{} failed: cannot read progress: {}",
                self.description, e
            )));
        }

        let status = child.wait()?;
        let stderr_text = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(ScribeError::Media(format!("{} failed: {}", self.description, stderr_text)));
        }
        Ok(())
    }
}

/// Elapsed output time from one line of ffmpeg `-progress` output.
/// Both `out_time_us` and the misnamed `out_time_ms` carry microseconds.
pub fn parse_progress_line(line: &str) -> Option<Duration> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse::<u64>().ok().map(Duration::from_micros),
        _ => None,
    }
}

/// Builder for the operations the pipeline needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
        }
    }

    /// Build audio extraction command (mono PCM WAV)
    pub fn extract_wav<P: AsRef<Path>>(&self, input: P, output: P, sample_rate: u32) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .overwrite()
            .input(input)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(output)
    }

    /// Build loudness normalization command
    pub fn normalize_loudness<P: AsRef<Path>>(&self, input: P, output: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Loudness normalization")
            .overwrite()
            .input(input)
            .audio_filter(LOUDNORM_FILTER)
            .audio_codec("pcm_s16le")
            .output(output)
    }

    /// Build filter chain command writing WAV
    pub fn audio_filter<P: AsRef<Path>>(&self, input: P, output: P, filter: &str) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Speech enhancement")
            .overwrite()
            .input(input)
            .no_video()
            .audio_filter(filter)
            .audio_codec("pcm_s16le")
            .output(output)
    }

    /// Build AAC encoding command
    pub fn encode_aac<P: AsRef<Path>>(&self, input: P, output: P, bitrate: &str) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "AAC encoding")
            .overwrite()
            .input(input)
            .no_video()
            .audio_codec("aac")
            .audio_bitrate(bitrate)
            .arg("-f")
            .arg("mp4")
            .output(output)
    }

    /// Build black video + audio command
    pub fn black_video<P: AsRef<Path>>(
        &self,
        audio: P,
        output: P,
        width: u32,
        height: u32,
        fps: u32,
    ) -> MediaCommand {
        let copy_audio = audio
            .as_ref()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("m4a") || ext.eq_ignore_ascii_case("aac"));

        let cmd = MediaCommand::new(&self.binary_path, "Black video generation")
            .overwrite()
            .arg("-f")
            .arg("lavfi")
            .input(format!("color=c=black:s={}x{}:r={}", width, height, fps))
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("libx264")
            .arg("-preset")
            .arg("ultrafast")
            .arg("-crf")
            .arg("35")
            .arg("-pix_fmt")
            .arg("yuv420p");

        let cmd = if copy_audio {
            cmd.audio_codec("copy")
        } else {
            cmd.audio_codec("aac").audio_bitrate("192k")
        };

        cmd.arg("-movflags")
            .arg("+faststart")
            .arg("-shortest")
            .arg("-f")
            .arg("mp4")
            .output(output)
    }

    /// Build compression command
    pub fn compress(&self, request: &crate::media::CompressRequest, encoder: &str, audio_kbps: u32) -> MediaCommand {
        let kbps = request.video_kbps;
        let mut cmd = MediaCommand::new(&self.binary_path, "Video compression")
            .overwrite()
            .input(&request.input);

        cmd = match &request.audio {
            Some(audio) => cmd.input(audio).map("0:v:0").map("1:a:0"),
            None => cmd.map("0:v:0").map("0:a:0?"),
        };

        cmd = cmd
            .video_codec(encoder)
            .arg("-b:v")
            .arg(format!("{}k", kbps))
            .arg("-maxrate")
            .arg(format!("{}k", kbps * 3 / 2))
            .arg("-bufsize")
            .arg(format!("{}k", kbps * 2))
            .arg("-pix_fmt")
            .arg("yuv420p");

        cmd = if request.has_audio {
            cmd.audio_filter(LOUDNORM_FILTER)
                .audio_codec("aac")
                .audio_bitrate(format!("{}k", audio_kbps))
        } else {
            cmd.no_audio()
        };

        cmd.arg("-movflags")
            .arg("+faststart")
            .arg("-f")
            .arg("mp4")
            .progress_to_stdout()
            .output(&request.output)
    }

    /// Build ffprobe JSON command
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Media probe")
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .output(path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }

    pub fn probe_version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Probe version check").arg("-version")
    }
}

//! External converter process
//!
//! Runs ffmpeg (or avconv) over temporary files. Each call owns its own
//! input and output files; both are removed when the call returns, whether
//! the process succeeded, failed or never started.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{info, warn};
use tempfile::{Builder, NamedTempFile};

use super::{CodecService, DecodeHint, ExportOptions};
use crate::config::Config;
use crate::engine::{from_wav_bytes, write_wav_file, AudioBuffer};
use crate::error::{AudioSegError, Result};

/// Converters tried in order when none is configured
const CONVERTER_NAMES: [&str; 2] = ["avconv", "ffmpeg"];

/// Search PATH for a converter, falling back to a bare `ffmpeg`
pub fn find_converter() -> PathBuf {
    CONVERTER_NAMES
        .iter()
        .find_map(|name| which(name))
        .unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

fn which(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Decode,
    Encode,
}

impl Direction {
    fn failure(self, reason: String, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> AudioSegError {
        match self {
            Direction::Decode => AudioSegError::DecodeFailure { reason, source },
            Direction::Encode => AudioSegError::EncodeFailure { reason, source },
        }
    }
}

/// Codec backed by an external converter binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterCodec {
    program: PathBuf,
}

impl ConverterCodec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use the configured converter, or search PATH
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.converter_path())
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn temp_file(&self, direction: Direction, suffix: &str) -> Result<NamedTempFile> {
        Builder::new()
            .prefix("audioseg-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| direction.failure("failed to create temporary file".to_string(), Some(Box::new(e))))
    }

    fn run(&self, direction: Direction, args: Vec<OsString>) -> Result<()> {
        info!("Running {} {:?}", self.program.display(), args);
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                direction.failure(
                    format!("failed to start {}: {}", self.program.display(), e),
                    Some(Box::new(e)),
                )
            })?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "a signal".to_string(), |c| format!("code {}", c));
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} exited with {}", self.program.display(), code);
            return Err(direction.failure(
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    code,
                    stderr.trim()
                ),
                None,
            ));
        }
        Ok(())
    }
}

impl CodecService for ConverterCodec {
    fn decode(&self, bytes: &[u8], hint: &DecodeHint) -> Result<AudioBuffer> {
        let direction = Direction::Decode;
        let mut input = self.temp_file(direction, "")?;
        input
            .write_all(bytes)
            .and_then(|_| input.flush())
            .map_err(|e| direction.failure("failed to stage input".to_string(), Some(Box::new(e))))?;
        let output = self.temp_file(direction, ".wav")?;

        let mut args = vec![OsString::from("-y")];
        if let Some(format) = &hint.format {
            args.push("-f".into());
            args.push(format.into());
        }
        args.push("-i".into());
        args.push(input.path().into());
        for arg in ["-vn", "-f", "wav"] {
            args.push(arg.into());
        }
        args.push(output.path().into());
        self.run(direction, args)?;

        let decoded = fs::read(output.path())?;
        from_wav_bytes(&decoded)
    }

    fn encode(&self, buffer: &AudioBuffer, format: &str, options: &ExportOptions) -> Result<Vec<u8>> {
        let direction = Direction::Encode;
        let input = self.temp_file(direction, ".wav")?;
        write_wav_file(buffer, input.path())?;
        let output = self.temp_file(direction, "")?;

        let mut args: Vec<OsString> = ["-y", "-f", "wav", "-i"].into_iter().map(OsString::from).collect();
        args.push(input.path().into());
        let codec = options
            .codec
            .clone()
            .or_else(|| (format == "ogg").then(|| "libvorbis".to_string()));
        if let Some(codec) = codec {
            args.push("-acodec".into());
            args.push(codec.into());
        }
        if let Some(bitrate) = &options.bitrate {
            args.push("-b:a".into());
            args.push(bitrate.into());
        }
        args.extend(options.parameters.iter().map(OsString::from));
        args.push("-f".into());
        args.push(format.into());
        args.push(output.path().into());
        self.run(direction, args)?;

        Ok(fs::read(output.path())?)
    }
}

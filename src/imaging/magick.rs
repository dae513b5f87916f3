//! HEIC conversion through the ImageMagick CLI.
//!
//! Streams the HEIC bytes through `convert heic:- -quality Q jpg:-`, so no
//! temporary files are written. ImageMagick must be built with libheif; the
//! converter reports itself unavailable when the program cannot be run.

use super::backend::BackendError;
use super::normalize::HeicConverter;
use super::params::Quality;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

/// [`HeicConverter`] that shells out to ImageMagick.
pub struct MagickConverter {
    program: String,
    available: OnceLock<bool>,
}

impl MagickConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            available: OnceLock::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for MagickConverter {
    fn default() -> Self {
        Self::new("convert")
    }
}

impl HeicConverter for MagickConverter {
    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            Command::new(&self.program)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }

    fn convert_to_jpeg(&self, bytes: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError> {
        let q = quality.value().to_string();
        let mut child = Command::new(&self.program)
            .args(["heic:-", "-quality", &q, "jpg:-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Unavailable(format!("{}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Unavailable("converter stdin closed".to_string()))?;

        // Feed stdin from a separate thread so a full stdout pipe can't deadlock us.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(bytes));
            let output = child.wait_with_output();
            // A broken pipe here means the converter bailed early; its stderr says why.
            let _ = writer.join();
            output
        })?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(BackendError::Decode(format!(
                "{} failed to convert HEIC: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

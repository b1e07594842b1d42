//! Post-run report rendering
//!
//! Rendering turns a finalized sink into human-facing reports (HTML, JUnit).
//! It is optional and never fatal: a failed render leaves the raw sink intact
//! and surfaces as a [`RenderWarning`].

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Why a renderer could not produce its output
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Turns a finalized sink into rendered reports
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    fn name(&self) -> &str;

    async fn render(&self, sink: &Path) -> Result<(), RenderError>;
}

/// Non-fatal notice that rendering failed after the sink was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderWarning {
    pub renderer: String,
    pub sink: PathBuf,
    pub message: String,
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "renderer '{}' failed for {}: {}",
            self.renderer,
            self.sink.display(),
            self.message
        )
    }
}

/// Renderer backed by an external executable
///
/// Invoked as `<program> <sink> --dest <dest> --format <format>`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    dest: PathBuf,
    format: String,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, dest: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            dest: dest.into(),
            format: format.into(),
        }
    }

    pub fn args(&self, sink: &Path) -> Vec<String> {
        vec![
            sink.to_string_lossy().to_string(),
            "--dest".to_string(),
            self.dest.to_string_lossy().to_string(),
            "--format".to_string(),
            self.format.clone(),
        ]
    }
}

#[async_trait]
impl ReportRenderer for CommandRenderer {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("renderer")
    }

    async fn render(&self, sink: &Path) -> Result<(), RenderError> {
        let program = self.program.display().to_string();
        let args = self.args(sink);
        debug!("Running renderer: {} {}", program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Exit {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("Rendered {} report(s) to {}", self.format, self.dest.display());
        Ok(())
    }
}

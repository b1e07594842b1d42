//! Audit run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use a11y_common::{AuditRequestBuilder, Error, Result};

use crate::render::CommandRenderer;
use crate::webdriver::Browser;

/// Run-wide audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Suite name stamped on every recorded audit
    pub suite_name: String,

    /// axe-core script injected into pages; unset means pages load it themselves
    pub axe_script: Option<PathBuf>,

    /// Directory receiving run sinks
    pub output_dir: PathBuf,

    /// Rule set applied to requests that do not name one
    pub ruleset: Option<String>,

    /// Upper bound on a single audit, in milliseconds
    pub audit_timeout_ms: u64,

    pub webdriver: WebDriverConfig,

    pub reporter: ReporterConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            suite_name: "default".to_string(),
            axe_script: None,
            output_dir: PathBuf::from("target/a11y-reports"),
            ruleset: None,
            audit_timeout_ms: 30_000,
            webdriver: WebDriverConfig::default(),
            reporter: ReporterConfig::default(),
        }
    }
}

/// Browser and WebDriver server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// URL of an already running WebDriver server; a driver is spawned when unset
    pub endpoint: Option<String>,

    /// Driver executable spawned when no endpoint is given
    pub driver_binary: PathBuf,

    /// Port for the spawned driver (None = find free port)
    pub port: Option<u16>,

    pub browser: Browser,

    pub headless: bool,

    /// Extra browser command-line arguments
    pub args: Vec<String>,

    pub startup_timeout_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            driver_binary: PathBuf::from("chromedriver"),
            port: None,
            browser: Browser::Chrome,
            headless: true,
            args: vec!["disable-gpu".to_string()],
            startup_timeout_ms: 30_000,
        }
    }
}

impl WebDriverConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

/// Post-run report renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Renderer executable; rendering is skipped when unset
    pub binary: Option<PathBuf>,

    /// Destination for rendered output (defaults under the output dir)
    pub dest: Option<PathBuf>,

    pub format: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            binary: None,
            dest: None,
            format: "html+junit".to_string(),
        }
    }
}

impl AuditConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Configuration(format!("invalid config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("cannot encode config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_millis(self.audit_timeout_ms)
    }

    /// Builder seeded with the configured default rule set
    pub fn request(&self) -> AuditRequestBuilder {
        let builder = AuditRequestBuilder::default();
        match &self.ruleset {
            Some(ruleset) => builder.according_to(ruleset.clone()),
            None => builder,
        }
    }

    /// Get the rendered report destination
    pub fn render_dest(&self) -> PathBuf {
        self.reporter
            .dest
            .clone()
            .unwrap_or_else(|| self.output_dir.join("a11y-html-report"))
    }

    /// Renderer for the configured executable, if any
    pub fn renderer(&self) -> Option<CommandRenderer> {
        self.reporter
            .binary
            .as_ref()
            .map(|binary| CommandRenderer::new(binary, self.render_dest(), &self.reporter.format))
    }
}

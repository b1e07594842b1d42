//! WebDriver server management - spawning and readiness checking the driver

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use a11y_common::{Error, Result};

use crate::config::WebDriverConfig;

/// Handle to a running WebDriver server process (chromedriver, geckodriver, ...)
pub struct DriverService {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl DriverService {
    /// Spawn the driver binary and wait until it reports ready
    pub async fn spawn(config: &DriverConfig) -> Result<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let child = Command::new(&config.binary_path)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::SessionUnavailable(format!(
                    "Failed to spawn {}: {}",
                    config.binary_path.display(),
                    e
                ))
            })?;

        let service = DriverService {
            child,
            base_url: base_url.clone(),
            port,
        };

        service.wait_for_ready(config.startup_timeout).await?;

        info!("WebDriver server is ready at {}", base_url);
        Ok(service)
    }

    /// Poll `/status` until the driver accepts new sessions
    async fn wait_for_ready(&self, timeout_duration: Duration) -> Result<()> {
        let status_url = format!("{}/status", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| Error::SessionUnavailable(format!("cannot build HTTP client: {}", e)))?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let ready = resp
                        .json::<serde_json::Value>()
                        .await
                        .ok()
                        .and_then(|body| body["value"]["ready"].as_bool())
                        .unwrap_or(false);
                    if ready {
                        return Ok(());
                    }
                }
                Ok(resp) => {
                    warn!("Driver status returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for WebDriver server to start...");
                    }
                    // Connection refused is expected while the driver is starting
                    if !e.is_connect() {
                        warn!("Driver status error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(Error::SessionUnavailable(format!(
            "WebDriver server not ready after {} attempts",
            attempts
        )))
    }

    /// Get the base URL for this driver
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the driver without blocking the runtime
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.has_exited() {
            return Ok(());
        }
        if self.terminate() {
            sleep(GRACE_PERIOD).await;
        }
        self.force_kill();
        Ok(())
    }

    /// Stop the driver, blocking for the grace period (used on drop)
    pub fn stop(&mut self) -> Result<()> {
        if self.has_exited() {
            return Ok(());
        }
        if self.terminate() {
            std::thread::sleep(GRACE_PERIOD);
        }
        self.force_kill();
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Ask the driver to exit; true when the signal was delivered
    fn terminate(&self) -> bool {
        info!("Stopping WebDriver server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            kill(pid, Signal::SIGTERM).is_ok()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn force_kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Time a driver gets to exit after SIGTERM
const GRACE_PERIOD: Duration = Duration::from_millis(200);

impl Drop for DriverService {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Path to the driver binary
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Timeout for driver startup
    pub startup_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from(&WebDriverConfig::default())
    }
}

impl From<&WebDriverConfig> for DriverConfig {
    fn from(config: &WebDriverConfig) -> Self {
        Self {
            binary_path: config.driver_binary.clone(),
            port: config.port,
            startup_timeout: config.startup_timeout(),
        }
    }
}

/// Find a free port to use
fn find_free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port = find_free_port().unwrap();
        assert!(port > 1024);
    }

    #[tokio::test]
    async fn test_missing_binary_is_session_unavailable() {
        let config = DriverConfig {
            binary_path: PathBuf::from("/nonexistent/chromedriver"),
            port: None,
            startup_timeout: Duration::from_millis(100),
        };
        let err = DriverService::spawn(&config).await.err().unwrap();
        assert!(err.is_session_lost());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_reaps_process() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let mut service = DriverService {
            child,
            base_url: "http://127.0.0.1:0".to_string(),
            port: 0,
        };
        service.shutdown().await.unwrap();
        assert!(service.has_exited());
        service.shutdown().await.unwrap();
    }
}

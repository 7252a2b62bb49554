//! Local browser process
//!
//! The browser runs with a fresh profile directory and an OS-assigned
//! DevTools port. The WebSocket URL is read from the banner the browser
//! prints on stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use uuid::Uuid;

use crate::error::BrowserError;
use crate::Result;

const DEVTOOLS_BANNER: &str = "DevTools listening on ";

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Browser binary; discovered when unset
    pub executable: Option<PathBuf>,
    /// Appended after the built-in arguments
    pub extra_args: Vec<String>,
    /// How long to wait for the DevTools banner
    pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            extra_args: Vec::new(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

impl LaunchOptions {
    fn arguments(&self, profile_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "--remote-debugging-port=0".to_string(),
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("about:blank".to_string());
        args
    }
}

/// Running browser; killed and its profile removed when dropped
pub(crate) struct BrowserProcess {
    child: Child,
    profile_dir: PathBuf,
    ws_url: String,
}

impl BrowserProcess {
    pub(crate) async fn launch(options: &LaunchOptions) -> Result<Self> {
        let executable = match &options.executable {
            Some(path) => path.clone(),
            None => find_executable().ok_or(BrowserError::ExecutableNotFound)?,
        };

        let profile_dir = std::env::temp_dir().join(format!("idb-scraper-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&profile_dir)?;

        tracing::info!(
            executable = %executable.display(),
            headless = options.headless,
            "Launching browser"
        );

        let spawned = Command::new(&executable)
            .args(options.arguments(&profile_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(BrowserError::Launch(format!(
                    "{}: {}",
                    executable.display(),
                    e
                )));
            }
        };

        // From here on, Drop tears the process and profile down on failure
        let mut process = Self {
            child,
            profile_dir,
            ws_url: String::new(),
        };
        process.ws_url = process.wait_for_devtools(options.startup_timeout).await?;

        tracing::debug!(url = %process.ws_url, "Browser DevTools endpoint ready");
        Ok(process)
    }

    pub(crate) fn ws_url(&self) -> &str {
        &self.ws_url
    }

    async fn wait_for_devtools(&mut self, limit: Duration) -> Result<String> {
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or_else(|| BrowserError::Launch("browser stderr not captured".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();

        let banner = async {
            while let Some(line) = lines.next_line().await? {
                if let Some(url) = parse_devtools_banner(&line) {
                    return Ok(Some(url.to_string()));
                }
                tracing::trace!(line = %line, "browser stderr");
            }
            Ok::<_, std::io::Error>(None)
        };

        let found = tokio::time::timeout(limit, banner)
            .await
            .map_err(|_| BrowserError::timeout("Waiting for the DevTools endpoint", limit))??;

        let url = found.ok_or_else(|| {
            BrowserError::Launch("browser exited before opening a DevTools endpoint".to_string())
        })?;

        // Keep draining stderr so the browser never blocks on a full pipe
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::trace!(line = %line, "browser stderr");
            }
        });

        Ok(url)
    }

    /// Wait for the process to exit on its own, then kill it
    pub(crate) async fn shutdown(mut self, grace: Duration) {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(status = %status, "Browser exited"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Failed to wait for browser"),
            Err(_) => {
                tracing::debug!("Browser still running after close, killing it");
                let _ = self.child.kill().await;
            }
        }
    }
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            tracing::debug!(
                path = %self.profile_dir.display(),
                error = %e,
                "Failed to remove browser profile"
            );
        }
    }
}

fn parse_devtools_banner(line: &str) -> Option<&str> {
    let start = line.find(DEVTOOLS_BANNER)? + DEVTOOLS_BANNER.len();
    let url = line[start..].trim();
    (url.starts_with("ws://") || url.starts_with("wss://")).then_some(url)
}

/// Locate an installed Chromium-family browser
pub fn find_executable() -> Option<PathBuf> {
    if let Some(found) = candidates::installed().into_iter().find(|p| p.is_file()) {
        return Some(found);
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        candidates::COMMANDS
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    })
}

// Well-known install locations per platform
mod candidates {
    use std::path::PathBuf;

    #[cfg(target_os = "windows")]
    pub const COMMANDS: &[&str] = &["chrome.exe", "msedge.exe", "chromium.exe"];
    #[cfg(not(target_os = "windows"))]
    pub const COMMANDS: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "microsoft-edge",
    ];

    pub fn installed() -> Vec<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let mut found = Vec::new();
            for var in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
                if let Ok(base) = std::env::var(var) {
                    let base = PathBuf::from(base);
                    found.push(base.join("Google/Chrome/Application/chrome.exe"));
                    found.push(base.join("Microsoft/Edge/Application/msedge.exe"));
                    found.push(base.join("Chromium/Application/chrome.exe"));
                }
            }
            found
        }
        #[cfg(target_os = "macos")]
        {
            vec![
                PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
                PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
                PathBuf::from("/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"),
            ]
        }
        #[cfg(target_os = "linux")]
        {
            vec![
                PathBuf::from("/usr/bin/google-chrome"),
                PathBuf::from("/usr/bin/google-chrome-stable"),
                PathBuf::from("/usr/bin/chromium"),
                PathBuf::from("/usr/bin/chromium-browser"),
                PathBuf::from("/snap/bin/chromium"),
            ]
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            Vec::new()
        }
    }
}

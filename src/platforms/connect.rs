//! Platform connect flow: login window plus URL polling.
//!
//! The flow opens a 600×700 login window on the platform's external OAuth
//! URL and polls it every 500 ms. Three things can happen: the window
//! reaches a URL matching the platform's success pattern (logged in), the
//! window closes without matching, or the wait times out. The latter two
//! fall back to dashboard verification — they do not mean failure, only
//! that the window could not tell us.
//!
//! Window implementations sit behind [`LoginWindow`]; a window that cannot
//! report its URL (cross-origin pages, or the system browser, which offers
//! no introspection at all) returns `None` from `current_url` and the poll
//! simply keeps going.

use crate::api::BackendClient;
use crate::config::PopupConfig;
use crate::error::{ClientError, Result};
use crate::platforms::verify::{PlatformVerifier, VerifyOutcome};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

/// A login window under observation.
pub trait LoginWindow: Send {
    /// The window's current URL, if readable. Cross-origin pages yield
    /// `None` — never an error that would abort polling.
    fn current_url(&mut self) -> Option<String>;

    /// Whether the user has closed the window.
    fn is_closed(&mut self) -> bool;

    /// Close the window.
    fn close(&mut self);
}

/// Opens login windows. The seam that lets tests (and embedders with a
/// real windowing layer) drive the flow.
pub trait LoginWindowOpener: Send + Sync {
    /// Open a window of the given size on `url`.
    ///
    /// # Errors
    /// Returns [`ClientError::Connect`] when no window can be opened (the
    /// popup-blocked case); the caller surfaces this to the user.
    fn open(&self, url: &str, width: u32, height: u32) -> Result<Box<dyn LoginWindow>>;
}

/// How a login poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPoll {
    /// The window reached a URL matching the success pattern.
    LoggedIn,
    /// The window closed before any match.
    WindowClosed,
    /// Neither happened within the timeout.
    TimedOut,
}

/// Poll `window` until login success, window close, or timeout.
pub async fn poll_login(
    window: &mut dyn LoginWindow,
    success_pattern: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> LoginPoll {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return LoginPoll::TimedOut,
            _ = ticker.tick() => {
                if window.is_closed() {
                    return LoginPoll::WindowClosed;
                }
                if let Some(url) = window.current_url()
                    && url.contains(success_pattern)
                {
                    return LoginPoll::LoggedIn;
                }
            }
        }
    }
}

/// Drives the end-to-end connect flow for one platform.
pub struct ConnectFlow {
    client: BackendClient,
    verifier: Arc<PlatformVerifier>,
    opener: Box<dyn LoginWindowOpener>,
    popup: PopupConfig,
}

impl ConnectFlow {
    pub fn new(
        client: BackendClient,
        verifier: Arc<PlatformVerifier>,
        opener: Box<dyn LoginWindowOpener>,
        popup: PopupConfig,
    ) -> Self {
        Self {
            client,
            verifier,
            opener,
            popup,
        }
    }

    /// Connect `platform`, returning whether it ended up connected.
    ///
    /// # Errors
    /// Fails when the OAuth URL cannot be fetched or the login window
    /// cannot be opened; both are user-facing ("enable popups").
    pub async fn connect(&self, platform: &str) -> Result<bool> {
        // Pattern lookup goes through the verifier's catalog so the two
        // halves of the flow cannot disagree about a platform.
        let pattern = self
            .verifier
            .catalog()
            .get(platform)
            .map(|entry| entry.success_url_pattern.clone())
            .ok_or_else(|| ClientError::Connect(format!("unknown platform '{platform}'")))?;

        let oauth_url = self.client.oauth_url(platform).await?;

        let mut window = self
            .opener
            .open(&oauth_url, self.popup.width, self.popup.height)
            .map_err(|e| {
                ClientError::Connect(format!(
                    "could not open a login window (enable popups and retry): {e}"
                ))
            })?;

        let outcome = poll_login(
            window.as_mut(),
            &pattern,
            Duration::from_millis(self.popup.poll_interval_ms),
            Duration::from_secs(self.popup.login_timeout_secs),
        )
        .await;

        match outcome {
            LoginPoll::LoggedIn => {
                window.close();
                self.verifier.record_connected(platform)?;
                // Tell the backend too; local state is the source of truth,
                // so a failure here only warns.
                if let Err(e) = self.client.connect_platform(platform).await {
                    tracing::warn!(platform, error = %e, "backend connect registration failed");
                }
                Ok(true)
            }
            LoginPoll::WindowClosed | LoginPoll::TimedOut => {
                tracing::debug!(platform, ?outcome, "login window inconclusive, verifying");
                let verdict = self.verifier.verify(platform).await?;
                Ok(verdict == VerifyOutcome::Connected)
            }
        }
    }
}

/// Opens the login URL in the system browser.
///
/// The system browser offers no URL or close introspection, so flows using
/// this opener always resolve through the timeout → verify fallback.
pub struct SystemBrowserOpener;

impl SystemBrowserOpener {
    fn launcher() -> Option<&'static str> {
        const CANDIDATES: &[&str] = if cfg!(target_os = "macos") {
            &["open"]
        } else if cfg!(target_os = "windows") {
            &["explorer"]
        } else {
            &["xdg-open", "sensible-browser", "x-www-browser"]
        };
        CANDIDATES
            .iter()
            .copied()
            .find(|candidate| which::which(candidate).is_ok())
    }
}

impl LoginWindowOpener for SystemBrowserOpener {
    fn open(&self, url: &str, _width: u32, _height: u32) -> Result<Box<dyn LoginWindow>> {
        let launcher = Self::launcher()
            .ok_or_else(|| ClientError::Connect("no browser launcher found".to_string()))?;

        std::process::Command::new(launcher)
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ClientError::Connect(format!("failed to launch '{launcher}': {e}")))?;

        tracing::info!(url, launcher, "login page opened in system browser");
        Ok(Box::new(SystemBrowserWindow))
    }
}

/// Placeholder window for the system browser: nothing is observable.
struct SystemBrowserWindow;

impl LoginWindow for SystemBrowserWindow {
    fn current_url(&mut self) -> Option<String> {
        None
    }

    fn is_closed(&mut self) -> bool {
        false
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A scripted window: yields each URL in turn, then `closed`.
    struct ScriptedWindow {
        urls: VecDeque<Option<String>>,
        closed_at_end: bool,
        closed: bool,
    }

    impl ScriptedWindow {
        fn new(urls: &[Option<&str>], closed_at_end: bool) -> Self {
            Self {
                urls: urls
                    .iter()
                    .map(|u| u.map(|s| s.to_string()))
                    .collect(),
                closed_at_end,
                closed: false,
            }
        }
    }

    impl LoginWindow for ScriptedWindow {
        fn current_url(&mut self) -> Option<String> {
            self.urls.pop_front().flatten()
        }

        fn is_closed(&mut self) -> bool {
            self.closed || (self.urls.is_empty() && self.closed_at_end)
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    const POLL: Duration = Duration::from_millis(500);
    const TIMEOUT: Duration = Duration::from_secs(120);

    #[tokio::test(start_paused = true)]
    async fn success_url_match_logs_in() {
        let mut window = ScriptedWindow::new(
            &[
                Some("https://accounts.example/login"),
                None, // cross-origin hop: unreadable, poll continues
                Some("https://www.linkedin.com/feed/"),
            ],
            false,
        );
        let outcome = poll_login(&mut window, "linkedin.com/feed", POLL, TIMEOUT).await;
        assert_eq!(outcome, LoginPoll::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_match_is_reported() {
        let mut window =
            ScriptedWindow::new(&[Some("https://accounts.example/login"), None], true);
        let outcome = poll_login(&mut window, "linkedin.com/feed", POLL, TIMEOUT).await;
        assert_eq!(outcome, LoginPoll::WindowClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_window_times_out() {
        struct OpaqueWindow;
        impl LoginWindow for OpaqueWindow {
            fn current_url(&mut self) -> Option<String> {
                None
            }
            fn is_closed(&mut self) -> bool {
                false
            }
            fn close(&mut self) {}
        }

        let mut window = OpaqueWindow;
        let outcome = poll_login(
            &mut window,
            "linkedin.com/feed",
            POLL,
            Duration::from_secs(3),
        )
        .await;
        assert_eq!(outcome, LoginPoll::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn pattern_must_match_substring() {
        let mut window = ScriptedWindow::new(
            &[Some("https://www.linkedin.com/checkpoint/challenge")],
            true,
        );
        let outcome = poll_login(&mut window, "linkedin.com/feed", POLL, TIMEOUT).await;
        assert_eq!(outcome, LoginPoll::WindowClosed);
    }
}

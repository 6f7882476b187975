use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

pub type CdpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// How to start Chromium.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchOptions {
    pub visible: bool,
    /// `CHROME_BIN`; chromiumoxide searches the usual locations otherwise.
    pub chrome_bin: Option<PathBuf>,
    /// `RUPERT_USER_DATA_DIR`; a throwaway profile otherwise.
    pub user_data_dir: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn from_env(visible: bool) -> Self {
        Self::from_lookup(visible, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(visible: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            visible,
            chrome_bin: path("CHROME_BIN"),
            user_data_dir: path("RUPERT_USER_DATA_DIR"),
        }
    }
}

/// Chromium profile directory. Temporary ones are deleted on close.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDir {
    pub path: PathBuf,
    pub temporary: bool,
}

impl ProfileDir {
    pub fn resolve(explicit: Option<PathBuf>) -> std::io::Result<Self> {
        let (path, temporary) = match explicit {
            Some(path) => (path, false),
            None => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                let name = format!("rupert-chromium-profile-{}-{}", std::process::id(), nanos);
                (std::env::temp_dir().join(name), true)
            }
        };
        std::fs::create_dir_all(&path)?;
        Ok(Self { path, temporary })
    }

    pub fn cleanup(&self) {
        if !self.temporary {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::debug!("Failed to remove profile {}: {}", self.path.display(), e);
        }
    }
}

/// A launched Chromium process plus the page it opened with.
pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    profile: ProfileDir,
}

impl CdpClient {
    pub async fn launch(options: LaunchOptions) -> CdpResult<Self> {
        let profile = ProfileDir::resolve(options.user_data_dir.clone())?;
        tracing::info!(
            visible = options.visible,
            temporary = profile.temporary,
            "Starting Chromium with profile {}",
            profile.path.display()
        );

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&profile.path);
        if options.visible {
            builder = builder.with_head();
        }
        if let Some(bin) = &options.chrome_bin {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }
        let config = builder
            .build()
            .map_err(|e| format!("Invalid browser config: {}", e))?;

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                profile.cleanup();
                return Err(format!("Failed to launch browser: {}", e).into());
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {}", e);
                }
            }
            tracing::debug!("CDP handler finished");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to open first page: {}", e))?;
        watch_page(&page).await?;

        Ok(Self {
            browser,
            handler_task,
            page,
            profile,
        })
    }

    /// Opens another page (tab) with the same console and dialog handling
    /// as the first one.
    pub async fn open_page(&self, url: &str) -> CdpResult<Page> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| format!("Failed to open {}: {}", url, e))?;
        watch_page(&page).await?;
        Ok(page)
    }

    pub async fn close(mut self) -> CdpResult<()> {
        let closed = self.browser.close().await;
        let joined = self.handler_task.await;
        self.profile.cleanup();
        closed.map_err(|e| format!("Error closing browser: {}", e))?;
        joined.map_err(|e| format!("CDP handler panicked: {}", e))?;
        Ok(())
    }
}

/// Mirrors page console output into tracing and accepts JavaScript dialogs,
/// which otherwise block every later evaluation.
async fn watch_page(page: &Page) -> CdpResult<()> {
    let mut console = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;
    tokio::spawn(async move {
        while let Some(event) = console.next().await {
            let text: Vec<String> = event
                .args
                .iter()
                .filter_map(|arg| {
                    arg.description
                        .clone()
                        .or_else(|| arg.value.as_ref().map(|v| v.to_string()))
                })
                .collect();
            tracing::debug!(kind = ?event.r#type, "page console: {}", text.join(" "));
        }
    });

    let mut dialogs = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;
    let page = page.clone();
    tokio::spawn(async move {
        while let Some(dialog) = dialogs.next().await {
            tracing::info!(kind = ?dialog.r#type, "Accepting dialog: {}", dialog.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                tracing::warn!("Failed to accept dialog: {}", e);
            }
        }
    });

    Ok(())
}

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};

static VIDEO_PAGE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"(?:^|[/.@])youtube\.com/(?:watch|embed/[^/?#\s]+|v/[^/?#\s]+)|(?:^|[/.@])youtu\.be/[^/?#\s]+",
    )
    .case_insensitive(true)
    .build()
    .expect("valid video page pattern")
});

/// Whether `url` looks like a YouTube video page.
///
/// Pattern based rather than a strict parse so query strings, fragments and
/// `www.` / `m.` prefixes all pass.
pub fn is_video_page(url: Option<&str>) -> bool {
    match url {
        Some(url) if !url.trim().is_empty() => VIDEO_PAGE.is_match(url.trim()),
        _ => false,
    }
}

/// Reports the URL of the browser tab the user is looking at.
#[async_trait]
pub trait ActiveTab: Send + Sync {
    async fn active_tab_url(&self) -> Option<String>;
}

/// An `ActiveTab` whose URL is set by the host, e.g. from tab-activated events.
#[derive(Debug, Default)]
pub struct FixedTab {
    url: Mutex<Option<String>>,
}

impl FixedTab {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url: Mutex::new(url),
        }
    }

    pub fn set_url(&self, url: Option<String>) {
        *self.url.lock() = url;
    }
}

#[async_trait]
impl ActiveTab for FixedTab {
    async fn active_tab_url(&self) -> Option<String> {
        self.url.lock().clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPageCheck {
    pub url: Option<String>,
    pub is_video_page: bool,
}

/// On-demand check behind the "you can only add notes on a video" indicator.
pub struct VideoPageProbe<'a> {
    tab: &'a dyn ActiveTab,
}

impl<'a> VideoPageProbe<'a> {
    pub fn new(tab: &'a dyn ActiveTab) -> Self {
        Self { tab }
    }

    pub async fn check(&self) -> VideoPageCheck {
        let url = self.tab.active_tab_url().await;
        let is_video_page = is_video_page(url.as_deref());
        tracing::debug!(?url, is_video_page, "checked active tab");
        VideoPageCheck { url, is_video_page }
    }
}

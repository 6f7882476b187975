//! Well-known sites: spoken-name shortcuts, URL normalization and
//! site-aware search URLs.

use url::Url;

/// Spoken site names the assistant opens without a full address.
pub const SITE_SHORTCUTS: &[(&str, &str)] = &[
    ("amazon", "https://amazon.com"),
    ("google", "https://google.com"),
    ("youtube", "https://youtube.com"),
    ("gmail", "https://gmail.com"),
    ("github", "https://github.com"),
    ("twitter", "https://twitter.com"),
    ("facebook", "https://facebook.com"),
    ("linkedin", "https://linkedin.com"),
    ("instagram", "https://instagram.com"),
];

pub const GOOGLE_SEARCH: &str = "https://www.google.com/search";

/// Looks up a spoken site name ("YouTube", "amazon") in the shortcut table.
pub fn resolve_site(name: &str) -> Option<&'static str> {
    let key: String = name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let key = key.strip_suffix(".com").unwrap_or(&key);
    SITE_SHORTCUTS
        .iter()
        .find(|(site, _)| *site == key)
        .map(|(_, url)| *url)
}

/// Turns a spoken destination into an absolute URL.
///
/// Shortcut names win, explicit schemes are kept, and anything that looks
/// like a host (contains a dot, no spaces) gets `https://`. Returns `None`
/// when the destination is better treated as a search query.
pub fn normalize_url(destination: &str) -> Option<String> {
    let trimmed = destination.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(url) = resolve_site(trimmed) {
        return Some(url.to_string());
    }
    let lower = trimmed.to_lowercase();
    if ["http://", "https://", "chrome://", "about:", "file://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return Some(trimmed.to_string());
    }
    if trimmed.contains('.') && !trimmed.contains(char::is_whitespace) {
        return Some(format!("https://{}", trimmed));
    }
    None
}

/// Host of an absolute URL, without a leading `www.`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSite {
    Amazon,
    YouTube,
    GitHub,
    Google,
}

impl SearchSite {
    /// Picks the site search matching the page the user is looking at.
    pub fn for_active_url(active_url: Option<&str>) -> Self {
        let host = active_url.and_then(host_of).unwrap_or_default();
        let on = |domain: &str| {
            host == domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        };
        if on("amazon.com") {
            SearchSite::Amazon
        } else if on("youtube.com") {
            SearchSite::YouTube
        } else if on("github.com") {
            SearchSite::GitHub
        } else {
            SearchSite::Google
        }
    }

    fn endpoint(&self) -> (&'static str, &'static str) {
        match self {
            SearchSite::Amazon => ("https://www.amazon.com/s", "k"),
            SearchSite::YouTube => ("https://www.youtube.com/results", "search_query"),
            SearchSite::GitHub => ("https://github.com/search", "q"),
            SearchSite::Google => (GOOGLE_SEARCH, "q"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchSite::Amazon => "Amazon",
            SearchSite::YouTube => "YouTube",
            SearchSite::GitHub => "GitHub",
            SearchSite::Google => "Google",
        }
    }

    /// Search URL with the query form-urlencoded.
    pub fn search_url(&self, query: &str) -> String {
        let (base, param) = self.endpoint();
        match Url::parse_with_params(base, &[(param, query.trim())]) {
            Ok(url) => url.to_string(),
            Err(_) => base.to_string(),
        }
    }
}

/// Search URL for `query`, site-aware when the active tab is a known store.
pub fn search_url(query: &str, active_url: Option<&str>) -> String {
    SearchSite::for_active_url(active_url).search_url(query)
}

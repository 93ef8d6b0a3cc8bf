/// A news outlet recognised by name in prompts and by domain in URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outlet {
    pub name: &'static str,
    pub domain: &'static str,
}

impl Outlet {
    /// True when `host` is the outlet's domain or one of its subdomains
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        host == self.domain
            || host
                .strip_suffix(self.domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Outlets whose articles cannot be fetched directly
pub const PAYWALLED_OUTLETS: &[Outlet] = &[
    Outlet {
        name: "The New York Times",
        domain: "nytimes.com",
    },
    Outlet {
        name: "The Washington Post",
        domain: "washingtonpost.com",
    },
    Outlet {
        name: "The Wall Street Journal",
        domain: "wsj.com",
    },
];

/// Outlets preferred when choosing search results
pub const TRUSTED_OUTLETS: &[&str] = &["BBC News", "CBC News", "TIME"];

/// Parse `url`, reading a scheme-less (`www.nytimes.com/x`) or
/// protocol-relative (`//wsj.com/x`) address as https.
fn parse_lenient(url: &str) -> Option<url::Url> {
    let url = url.trim();
    if let Ok(parsed) = url::Url::parse(url) {
        if parsed.has_host() {
            return Some(parsed);
        }
    }
    let rest = url.strip_prefix("//").unwrap_or(url);
    url::Url::parse(&format!("https://{}", rest)).ok()
}

/// The paywalled outlet serving `url`, if any
pub fn paywalled_outlet_for(url: &str) -> Option<&'static Outlet> {
    let parsed = parse_lenient(url)?;
    let host = parsed.host_str()?;
    PAYWALLED_OUTLETS.iter().find(|o| o.matches_host(host))
}

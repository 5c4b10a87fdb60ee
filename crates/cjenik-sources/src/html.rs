//! Minimal HTML plumbing for the chains' price-list index pages.
//!
//! The index pages are plain listings of `<a href="…​.csv">` links; a regex
//! over `href` attributes is all the structure we rely on. Resolution of
//! relative hrefs goes through [`reqwest::Url::join`] so root-relative and
//! subpath-relative links both land on the resource the page actually
//! points at.

use regex::Regex;
use reqwest::Url;

/// Extract all `.csv` link targets from an index page, resolved against
/// `base`. Duplicates and unresolvable hrefs are dropped, first occurrence
/// kept.
pub(crate) fn extract_csv_links(html: &str, base: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base) else {
        tracing::warn!(base, "unparsable base URL for index page");
        return Vec::new();
    };

    let re = Regex::new(r#"(?is)href\s*=\s*["']([^"']+)["']"#).expect("valid href regex");
    let mut seen = std::collections::HashSet::new();
    re.captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|href| href.to_ascii_lowercase().ends_with(".csv"))
        .filter_map(|href| base.join(&href).ok())
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

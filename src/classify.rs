//! URL classification: crawl scope and resource kind.

/// Suffixes downloaded verbatim rather than parsed for links.
pub const BINARY_SUFFIXES: &[&str] = &[
    "js", "jpg", "png", "gif", "svg", "json", "xml", "ico", "jpeg", "ttf", "mp3", "mp4", "wav",
    "doc", "xls", "pdf", "docx", "xlsx", "eot", "woff", "csv", "swf", "tar", "gz", "zip", "rar",
    "txt", "exe", "ppt", "pptx", "m3u8", "avi", "wsf",
];

/// Large media formats that get the long download timeout.
pub const MEDIA_SUFFIXES: &[&str] = &[
    "mp3", "mp4", "pdf", "gz", "tar", "zip", "rar", "wav", "m3u8", "avi",
];

/// How a worker processes a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Fetched as text, scanned with both extraction patterns, rewritten.
    Html,
    /// Fetched as text, scanned with the CSS pattern only, rewritten.
    Css,
    /// Streamed to disk verbatim.
    Binary,
}

/// Lowercase suffix after the last `.` of the URL path, if the path has one.
pub fn url_suffix(link: &str) -> Option<String> {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    let suffix = path.rsplit_once('.')?.1;
    if suffix.contains('/') {
        return None;
    }
    Some(suffix.to_ascii_lowercase())
}

pub fn classify(link: &str) -> ResourceKind {
    match url_suffix(link).as_deref() {
        Some("css") => ResourceKind::Css,
        Some(suffix) if BINARY_SUFFIXES.contains(&suffix) => ResourceKind::Binary,
        _ => ResourceKind::Html,
    }
}

pub fn is_media(link: &str) -> bool {
    url_suffix(link)
        .as_deref()
        .is_some_and(|suffix| MEDIA_SUFFIXES.contains(&suffix))
}

/// Whether a raw link extracted from a document may be crawled at all.
///
/// Script pseudo-links, mail addresses, and inline `data:image` payloads are
/// never followed. A link that names a host must name this site's host
/// (modulo an explicit `:80`); hostless links resolve inside the site later
/// and always pass.
pub fn in_scope(link: &str, site_host: &str) -> bool {
    if link.starts_with("javascript:") || link.contains('@') || link.starts_with("data:image") {
        return false;
    }
    if link.contains("http") {
        if let Some(host) = netloc(link) {
            let host = host.strip_suffix(":80").unwrap_or(host);
            return host == site_host;
        }
    }
    true
}

/// Authority component of a link, when it has one. A link carries an
/// authority only when it starts with `//` or `scheme://`.
fn netloc(link: &str) -> Option<&str> {
    let rest = if let Some(stripped) = link.strip_prefix("//") {
        stripped
    } else {
        let (scheme, rest) = link.split_once(':')?;
        let valid_scheme = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c));
        if !valid_scheme {
            return None;
        }
        rest.strip_prefix("//")?
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(&rest[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_comes_from_the_path_not_the_query() {
        assert_eq!(url_suffix("http://ex.test/a.CSS").as_deref(), Some("css"));
        assert_eq!(
            url_suffix("http://ex.test/lib.js?v=1.2").as_deref(),
            Some("js")
        );
        assert_eq!(url_suffix("http://ex.test/page"), None);
        assert_eq!(url_suffix("http://ex.test/dir.v1/page"), None);
    }

    #[test]
    fn classification_by_suffix() {
        assert_eq!(classify("http://ex.test/style.css"), ResourceKind::Css);
        assert_eq!(classify("http://ex.test/a.PNG"), ResourceKind::Binary);
        assert_eq!(classify("http://ex.test/docs/x.pdf"), ResourceKind::Binary);
        assert_eq!(classify("http://ex.test/page"), ResourceKind::Html);
        assert_eq!(classify("http://ex.test/"), ResourceKind::Html);
    }

    #[test]
    fn media_suffixes_pick_the_long_timeout() {
        assert!(is_media("http://ex.test/video.mp4"));
        assert!(is_media("http://ex.test/bundle.tar"));
        assert!(!is_media("http://ex.test/a.png"));
        assert!(!is_media("http://ex.test/page"));
    }

    #[test]
    fn pseudo_links_are_out_of_scope() {
        assert!(!in_scope("javascript:void(0)", "ex.test"));
        assert!(!in_scope("mailto:someone@ex.test", "ex.test"));
        assert!(!in_scope("data:image/png;base64,AAAA", "ex.test"));
    }

    #[test]
    fn foreign_hosts_are_out_of_scope() {
        assert!(!in_scope("http://other.test/x", "ex.test"));
        assert!(in_scope("http://ex.test/x", "ex.test"));
        assert!(in_scope("https://ex.test/x", "ex.test"));
    }

    #[test]
    fn explicit_default_port_matches_the_bare_host() {
        assert!(in_scope("http://ex.test:80/x", "ex.test"));
        assert!(!in_scope("http://ex.test:8080/x", "ex.test"));
    }

    #[test]
    fn hostless_links_are_always_in_scope() {
        assert!(in_scope("../style/main.css", "ex.test"));
        assert!(in_scope("/a/b.png", "ex.test"));
        assert!(in_scope("//cdn.ex.test/x", "ex.test"));
    }
}

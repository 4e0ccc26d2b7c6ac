//! Link extraction from HTML and CSS text, and in-document rewriting.
//!
//! Extraction is deliberately regex-based: a real HTML parser would also
//! surface URLs inside comments and script literals that the rewriting pass
//! could then no longer match against the raw document text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::config::SiteConfig;
use crate::paths;

/// `href=` / `src=` attributes in HTML text.
static HTML_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(href|src)=("|')([^"']*)"#).unwrap());

/// `url(...)` references in CSS text.
static CSS_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"url\(("|')([^"']*)"#).unwrap());

/// Every candidate link in an HTML document: attribute values plus any
/// `url(...)` references in inline styles.
pub fn extract_html_links(text: &str) -> HashSet<String> {
    let mut links: HashSet<String> = HTML_LINK
        .captures_iter(text)
        .filter_map(|captures| captures.get(3))
        .map(|m| m.as_str().to_string())
        .filter(|link| !link.is_empty())
        .collect();
    links.extend(extract_css_links(text));
    links
}

/// Candidate links in a stylesheet.
pub fn extract_css_links(text: &str) -> HashSet<String> {
    CSS_LINK
        .captures_iter(text)
        .filter_map(|captures| captures.get(2))
        .map(|m| m.as_str().to_string())
        .filter(|link| !link.is_empty())
        .collect()
}

/// Join a possibly-relative link against a base URL.
pub fn resolve_link(base: &str, link: &str) -> String {
    match Url::parse(base).and_then(|parsed| parsed.join(link)) {
        Ok(joined) => joined.to_string(),
        Err(_) => link.to_string(),
    }
}

/// Repair the sloppy scheme spellings sites ship and resolve viewer
/// wrappers, yielding a link ready to join against the document URL.
///
/// `//host/...` gains the root scheme, a leading `/` resolves against the
/// root URL, `http:/x` and `http:x` get their missing slashes.
pub fn normalize_link(link: &str, config: &SiteConfig) -> String {
    let link = paths::percent_decode(link).replace('\\', "/");
    let link = paths::viewer_file_link(&link).to_string();

    if link.is_empty() {
        return link;
    }
    if let Some(rest) = link.strip_prefix("//") {
        return format!("{}://{}", config.scheme, rest);
    }
    if link.starts_with('/') {
        return resolve_link(&config.root_url, &link);
    }
    if !link.contains("http") || link.contains("http://") || link.contains("https://") {
        return link;
    }
    if link.contains("http:/") || link.contains("https:/") {
        return link.replace(":/", "://");
    }
    if link.contains("http:") || link.contains("https:") {
        if let Some(idx) = link.find(':') {
            return format!("{}://{}", &link[..idx], &link[idx + 1..]);
        }
    }
    link
}

/// Rewrite every extracted in-scope URL in `content` into a relative path
/// that resolves against the document's own mapped location on disk.
///
/// Longer URLs are replaced first so a shorter URL that is a prefix of a
/// longer one cannot match ahead of it. Fragments survive verbatim after
/// the relative path.
pub fn rewrite_links(content: String, links: &[String], doc_url: &str, config: &SiteConfig) -> String {
    let doc_path = paths::local_path(&config.home_dir, doc_url);

    let mut ordered: Vec<&str> = links.iter().map(|link| link.as_str()).collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    ordered.dedup();

    let mut content = content;
    for link in ordered {
        let resolved = resolve_link(doc_url, &normalize_link(link, config));
        let (target, fragment) = match resolved.split_once('#') {
            Some((target, fragment)) => (target.to_string(), Some(fragment.to_string())),
            None => (resolved, None),
        };

        let target_path = paths::local_path(&config.home_dir, &target);
        let mut relative = paths::relative_link(&target_path, &doc_path);
        if let Some(fragment) = fragment {
            relative.push('#');
            relative.push_str(&fragment);
        }

        let replacement = format!("\"{relative}\"");
        content = content
            .replace(&format!("\"{link}\""), &replacement)
            .replace(&format!("'{link}'"), &replacement);
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config() -> SiteConfig {
        let mut config = SiteConfig::for_url("http://ex.test/").unwrap();
        config.home_dir = PathBuf::from("/m");
        config
    }

    #[test]
    fn html_pattern_captures_href_and_src_in_both_quote_styles() {
        let text = r#"<a href="/a">x</a><img src='/b.png'><link href="/c.css">"#;
        let links = extract_html_links(text);
        assert!(links.contains("/a"));
        assert!(links.contains("/b.png"));
        assert!(links.contains("/c.css"));
    }

    #[test]
    fn html_pattern_also_picks_up_inline_style_urls() {
        let text = r#"<div style="background: url('/bg.jpg')"></div>"#;
        let links = extract_html_links(text);
        assert!(links.contains("/bg.jpg"));
    }

    #[test]
    fn css_pattern_only_matches_url_references() {
        let text = r#".a { background: url("../img/x.png"); } /* href="/no" */"#;
        let links = extract_css_links(text);
        assert_eq!(links.len(), 1);
        assert!(links.contains("../img/x.png"));
    }

    #[test]
    fn empty_attribute_values_are_not_links() {
        assert!(extract_html_links(r#"<a href="">x</a>"#).is_empty());
    }

    #[test]
    fn normalize_repairs_scheme_spellings() {
        let config = test_config();
        assert_eq!(
            normalize_link("//ex.test/x", &config),
            "http://ex.test/x"
        );
        assert_eq!(normalize_link("/a/b", &config), "http://ex.test/a/b");
        assert_eq!(
            normalize_link("http:/ex.test/a", &config),
            "http://ex.test/a"
        );
        assert_eq!(
            normalize_link("http:ex.test/a", &config),
            "http://ex.test/a"
        );
        assert_eq!(normalize_link("rel/path", &config), "rel/path");
        assert_eq!(
            normalize_link("http://ex.test/ok", &config),
            "http://ex.test/ok"
        );
    }

    #[test]
    fn normalize_unwraps_viewer_links() {
        let config = test_config();
        assert_eq!(
            normalize_link("web/viewer.html?file=docs/a.pdf", &config),
            "docs/a.pdf"
        );
        assert_eq!(
            normalize_link("web/viewer.html?file=%2Fdocs%2Fa.pdf", &config),
            "http://ex.test/docs/a.pdf"
        );
    }

    #[test]
    fn rewrite_points_links_at_mapped_files() {
        let config = test_config();
        let content = r#"<img src="/a.png"><a href="/page">p</a>"#.to_string();
        let links = vec!["/a.png".to_string(), "/page".to_string()];
        let out = rewrite_links(content, &links, "http://ex.test/", &config);
        assert!(out.contains(r#"src="a.png""#));
        assert!(out.contains(r#"href="page.html""#));
    }

    #[test]
    fn rewrite_preserves_fragments() {
        let config = test_config();
        let content = r#"<a href="/b#x">x</a><a href="/b#y">y</a>"#.to_string();
        let links = vec!["/b#x".to_string(), "/b#y".to_string()];
        let out = rewrite_links(content, &links, "http://ex.test/", &config);
        assert!(out.contains(r#"href="b.html#x""#));
        assert!(out.contains(r#"href="b.html#y""#));
    }

    #[test]
    fn rewrite_replaces_longer_urls_first() {
        let config = test_config();
        let content = r#"<a href="/a">s</a><a href="/a/deep">d</a>"#.to_string();
        let links = vec!["/a".to_string(), "/a/deep".to_string()];
        let out = rewrite_links(content, &links, "http://ex.test/", &config);
        assert!(out.contains(r#"href="a.html""#));
        assert!(out.contains(r#"href="a/deep.html""#));
    }

    #[test]
    fn rewrite_walks_up_from_nested_documents() {
        let config = test_config();
        let content = r#"url("/img/x.png")"#.to_string();
        let links = vec!["/img/x.png".to_string()];
        let out = rewrite_links(content, &links, "http://ex.test/css/site.css", &config);
        assert!(out.contains(r#"url("../img/x.png")"#));
    }

    #[test]
    fn rewrite_resolves_viewer_wrappers_to_the_inner_target() {
        let config = test_config();
        let content = r#"<a href="web/viewer.html?file=docs/a.pdf">doc</a>"#.to_string();
        let links = vec!["web/viewer.html?file=docs/a.pdf".to_string()];
        let out = rewrite_links(content, &links, "http://ex.test/", &config);
        assert!(out.contains(r#"href="docs/a.pdf""#));
    }
}

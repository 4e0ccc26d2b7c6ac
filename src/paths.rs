//! URL to local-path mapping and relative-link computation.
//!
//! The mapping must agree byte-for-byte between the save side and the
//! rewrite side, so every rule lives here: the hyphenated percent-escapes
//! that keep filenames legal, the `index.html` completion for directory
//! URLs, and the `.html` completion that makes extension-less pages open in
//! a browser.

use std::path::{Path, PathBuf};

/// Suffixes that mark a URL as a bare domain with no path.
const DOMAIN_SUFFIXES: &[&str] = &["com", "cn", "net", "org", "gov", "io"];

/// Characters rewritten into hyphenated escapes on disk. `%2B` becomes
/// `%2-B` and so on; the inserted `-` keeps the name from reading as a
/// percent-escape when a browser opens the local file.
const ENCODE_MARKS: &[(char, &str)] = &[
    ('+', "%2-B"),
    (' ', "%2-0"),
    ('?', "%3-F"),
    ('%', "%2-5"),
    ('&', "%2-6"),
    ('=', "%3-D"),
];

/// Hyphenated escapes understood by [`decode_link`]. Includes the `%2-F`
/// and `%2-3` forms older mirror trees were written with.
const DECODE_MARKS: &[(&str, &str)] = &[
    ("%2-B", "%2B"),
    ("%2-0", "%20"),
    ("%2-F", "%2F"),
    ("%3-F", "%3F"),
    ("%2-5", "%25"),
    ("%2-3", "%23"),
    ("%2-6", "%26"),
    ("%3-D", "%3D"),
];

const VIEWER_MARK: &str = "viewer.html?file=";

/// Percent-decode, keeping invalid escape sequences as literal text.
pub fn percent_decode(link: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(link.as_bytes())).into_owned()
}

/// Encode a URL into the exact form used for on-disk filenames: fully
/// percent-decode, then hyphen-escape the characters in [`ENCODE_MARKS`].
pub fn encode_link(link: &str) -> String {
    let decoded = percent_decode(link);
    let mut out = String::with_capacity(decoded.len());
    for ch in decoded.chars() {
        match ENCODE_MARKS.iter().find(|(mark, _)| *mark == ch) {
            Some((_, escape)) => out.push_str(escape),
            None => out.push(ch),
        }
    }
    out
}

/// Undo the `-` insertion of [`encode_link`], yielding plain percent-escapes.
pub fn decode_link(link: &str) -> String {
    let mut out = link.to_string();
    for (mark, escape) in DECODE_MARKS {
        out = out.replace(mark, escape);
    }
    out
}

/// Resolve viewer-wrapper links: `.../viewer.html?file=<inner>` is a
/// reference to `<inner>`. Expects already percent-decoded input.
pub fn viewer_file_link(link: &str) -> &str {
    match link.rfind(VIEWER_MARK) {
        Some(idx) => &link[idx + VIEWER_MARK.len()..],
        None => link,
    }
}

/// Map an absolute URL to its file path inside the mirror tree.
///
/// Directory URLs gain `index.html`, bare domains gain `/index.html`, the
/// scheme is dropped, and a `.html` suffix is appended whenever the final
/// segment has no usable extension, so that a browser treats the artifact
/// as a page.
pub fn local_path(home_dir: &Path, link: &str) -> PathBuf {
    let mut link = link.replace('\\', "/");
    if link.ends_with('/') {
        link.push_str("index.html");
    } else if link
        .rsplit_once('.')
        .is_some_and(|(_, suffix)| DOMAIN_SUFFIXES.contains(&suffix))
    {
        link.push_str("/index.html");
    }

    let encoded = encode_link(&link);
    let rest = match encoded.find("//") {
        Some(idx) => &encoded[idx + 2..],
        None => encoded.as_str(),
    };
    let mut path = format!("{}/{}", home_dir.display(), rest);

    let last = path.rsplit('/').next().unwrap_or("");
    let needs_html = !last.contains('.')
        || last
            .rsplit('.')
            .next()
            .is_some_and(|suffix| suffix.contains('%'));
    if needs_html {
        path.push_str(".html");
    }

    if path.contains("..") {
        path = collapse_traversal(&path);
    }

    let path = PathBuf::from(path);
    if path.is_dir() {
        path.join("index.html")
    } else {
        path
    }
}

/// Collapse a `..` in the joined path by dropping the two segments to its
/// left and keeping the right-hand side.
fn collapse_traversal(path: &str) -> String {
    let parts: Vec<&str> = path.split("..").collect();
    let left: Vec<&str> = parts[0].split('/').collect();
    let kept = &left[..left.len().saturating_sub(2)];
    format!("{}{}", kept.join("/"), parts.get(1).copied().unwrap_or(""))
}

/// POSIX relative path from the directory containing `referrer` to `target`.
pub fn relative_link(target: &Path, referrer: &Path) -> String {
    let base: Vec<_> = referrer
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .components()
        .collect();
    let dest: Vec<_> = target.components().collect();
    let common = base
        .iter()
        .zip(dest.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base.len() {
        parts.push("..".to_string());
    }
    for component in &dest[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

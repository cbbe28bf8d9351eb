//! Path and encoding utilities
//!
//! WebDAV hrefs arrive URL-encoded segment-wise and may carry HTML
//! entities in path text. Everything is decoded and normalized here, once,
//! before comparison or storage.

use std::collections::BTreeSet;

use percent_encoding::percent_decode_str;

use crate::domain::errors::DomainError;
use crate::domain::paths::RemotePath;
use crate::ports::remote_directory::StatModel;

/// Collapses a raw path to the domain convention
///
/// Ensures a leading `/` and strips trailing slashes (the root stays `/`).
/// Repeated separators are collapsed.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for segment in raw.split('/') {
        if segment.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Maps a WebDAV href to a normalized [`RemotePath`]
///
/// Decodes percent-encoding segment-wise, decodes HTML entities, then
/// strips the server `base_path` prefix (`"/"` is a no-op strip).
pub fn href_to_path(href: &str, base_path: &str) -> Result<RemotePath, DomainError> {
    // Absolute-URL hrefs are allowed by RFC 4918; keep only the path part.
    let raw = if let Some(idx) = href.find("://") {
        match href[idx + 3..].find('/') {
            Some(slash) => &href[idx + 3 + slash..],
            None => "/",
        }
    } else {
        href
    };

    let mut decoded = String::with_capacity(raw.len());
    for segment in raw.split('/') {
        if segment.is_empty() {
            continue;
        }
        let seg = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|e| DomainError::InvalidHref(format!("{href}: {e}")))?;
        decoded.push('/');
        decoded.push_str(&decode_html_entities(&seg));
    }
    if decoded.is_empty() {
        decoded.push('/');
    }

    let stripped = strip_base_path(&decoded, base_path);
    RemotePath::new(stripped)
}

/// Strips the server path prefix from an already-decoded path
#[must_use]
pub fn strip_base_path(path: &str, base_path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return normalize_path(path);
    }
    let normalized = normalize_path(path);
    if normalized == base {
        return "/".to_string();
    }
    match normalized.strip_prefix(&format!("{base}/")) {
        Some(rest) => format!("/{rest}"),
        None => normalized,
    }
}

/// Decodes HTML entities appearing in path strings
///
/// Handles the named entities servers emit in hrefs and display names
/// (`&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`) plus decimal and hex
/// numeric references. Unknown or malformed entities pass through verbatim.
#[must_use]
pub fn decode_html_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';') {
            // Entities are short; a distant semicolon means a bare ampersand
            Some(end) if end <= 10 => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(decoded) => out.push_str(&decoded),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => return Some("&".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "quot" => return Some("\"".to_string()),
        "apos" => return Some("'".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()?
    } else {
        return None;
    };

    char::from_u32(code).map(|c| c.to_string())
}

/// Re-adds ancestor directories implied by included files
///
/// Filtering can drop a directory entry while keeping files beneath it.
/// This walks every listed path's ancestors (relative, `/`-separated) and
/// appends a synthetic directory record for each one missing from the set.
#[must_use]
pub fn complete_loss_dir(mut listing: Vec<StatModel>) -> Vec<StatModel> {
    let present: BTreeSet<String> = listing.iter().map(|s| s.path.clone()).collect();
    let mut missing: BTreeSet<String> = BTreeSet::new();

    for stat in &listing {
        let mut path = stat.path.as_str();
        while let Some(idx) = path.rfind('/') {
            let ancestor = &path[..idx];
            if ancestor.is_empty() || present.contains(ancestor) {
                break;
            }
            missing.insert(ancestor.to_string());
            path = ancestor;
        }
    }

    for dir in missing {
        let basename = dir.rsplit('/').next().unwrap_or(&dir).to_string();
        listing.push(StatModel {
            path: dir,
            basename,
            is_dir: true,
            is_deleted: false,
            mtime_ms: 0,
            size: 0,
        });
    }

    listing
}

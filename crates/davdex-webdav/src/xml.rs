//! PROPFIND multistatus parsing
//!
//! Converts a `207 Multi-Status` body into [`StatModel`] records. Matching
//! is on local element names so any namespace prefix (`D:`, `d:`, `lp1:`,
//! none) is accepted. Only properties under a 2xx `propstat` contribute;
//! a `404` propstat carries the properties the server does not have.

use chrono::DateTime;
use quick_xml::events::Event;
use quick_xml::Reader;

use davdex_core::domain::RemotePath;
use davdex_core::encoding::href_to_path;
use davdex_core::ports::remote_directory::StatModel;

use crate::WebdavError;

/// Properties accumulated for one `propstat` block
#[derive(Debug, Default)]
struct PropBlock {
    status_ok: Option<bool>,
    is_dir: bool,
    mtime_ms: Option<i64>,
    size: Option<u64>,
}

/// State for one `response` element
#[derive(Debug, Default)]
struct ResponseBlock {
    href: Option<String>,
    accepted: Option<PropBlock>,
}

/// Which element's text is currently being captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    Href,
    Status,
    Mtime,
    Size,
}

/// Parses a multistatus body into stat records, in document order
///
/// `base_path` is the server prefix to strip from hrefs (`"/"` strips
/// nothing). Responses whose href cannot be mapped to a valid path are
/// rejected as malformed.
pub fn parse_multistatus(body: &str, base_path: &str) -> Result<Vec<StatModel>, WebdavError> {
    let mut reader = Reader::from_str(body);

    let mut stats = Vec::new();
    let mut response: Option<ResponseBlock> = None;
    let mut pending: Option<PropBlock> = None;
    let mut target = TextTarget::None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();

                if name.eq_ignore_ascii_case(b"response") {
                    response = Some(ResponseBlock::default());
                } else if name.eq_ignore_ascii_case(b"propstat") {
                    pending = Some(PropBlock::default());
                } else if name.eq_ignore_ascii_case(b"collection") {
                    if let Some(ref mut block) = pending {
                        block.is_dir = true;
                    }
                } else if name.eq_ignore_ascii_case(b"href") {
                    target = TextTarget::Href;
                } else if name.eq_ignore_ascii_case(b"status") {
                    target = TextTarget::Status;
                } else if name.eq_ignore_ascii_case(b"getlastmodified") {
                    target = TextTarget::Mtime;
                } else if name.eq_ignore_ascii_case(b"getcontentlength") {
                    target = TextTarget::Size;
                }
            }
            // An empty element carries no text; only the collection marker
            // matters in this form.
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref().eq_ignore_ascii_case(b"collection") {
                    if let Some(ref mut block) = pending {
                        block.is_dir = true;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| WebdavError::Xml(e.to_string()))?;
                let text = text.trim();

                match target {
                    TextTarget::Href => {
                        if let Some(ref mut resp) = response {
                            resp.href = Some(text.to_string());
                        }
                    }
                    TextTarget::Status => {
                        if let Some(ref mut block) = pending {
                            block.status_ok = Some(text.contains("200"));
                        }
                    }
                    TextTarget::Mtime => {
                        if let Some(ref mut block) = pending {
                            block.mtime_ms = parse_http_date(text);
                        }
                    }
                    TextTarget::Size => {
                        if let Some(ref mut block) = pending {
                            block.size = text.parse().ok();
                        }
                    }
                    TextTarget::None => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                target = TextTarget::None;

                if name.eq_ignore_ascii_case(b"propstat") {
                    if let Some(block) = pending.take() {
                        // A missing status element counts as success
                        if block.status_ok.unwrap_or(true) {
                            if let Some(ref mut resp) = response {
                                resp.accepted = Some(block);
                            }
                        }
                    }
                } else if name.eq_ignore_ascii_case(b"response") {
                    if let Some(resp) = response.take() {
                        if let Some(stat) = finalize_response(resp, base_path)? {
                            stats.push(stat);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(WebdavError::Xml(e.to_string())),
        }
    }

    Ok(stats)
}

fn finalize_response(
    resp: ResponseBlock,
    base_path: &str,
) -> Result<Option<StatModel>, WebdavError> {
    let (Some(href), Some(props)) = (resp.href, resp.accepted) else {
        return Ok(None);
    };

    let path = href_to_path(&href, base_path).map_err(|e| WebdavError::Xml(e.to_string()))?;
    let basename = path.file_name().unwrap_or("/").to_string();

    Ok(Some(StatModel {
        path: path.as_str().to_string(),
        basename,
        is_dir: props.is_dir,
        is_deleted: false,
        mtime_ms: props.mtime_ms.unwrap_or(0),
        size: if props.is_dir {
            0
        } else {
            props.size.unwrap_or(0)
        },
    }))
}

/// Reorders a depth-1 listing so the target itself comes first
///
/// Servers conventionally list the requested resource first, but that is
/// not mandated; callers rely on the position.
pub fn target_first(mut stats: Vec<StatModel>, target: &RemotePath) -> Vec<StatModel> {
    if let Some(idx) = stats.iter().position(|s| s.path == target.as_str()) {
        if idx != 0 {
            let stat = stats.remove(idx);
            stats.insert(0, stat);
        }
    }
    stats
}

/// Parses an HTTP-date (RFC 1123) into epoch milliseconds
fn parse_http_date(text: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH1_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/dav/notes/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype><D:collection/></D:resourcetype>
        <D:getlastmodified>Fri, 03 Jul 2026 10:00:00 GMT</D:getlastmodified>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/dav/notes/a.txt</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype/>
        <D:getcontentlength>10</D:getcontentlength>
        <D:getlastmodified>Fri, 03 Jul 2026 10:05:00 GMT</D:getlastmodified>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    #[test]
    fn test_parse_depth1_listing() {
        let stats = parse_multistatus(DEPTH1_BODY, "/dav").unwrap();
        assert_eq!(stats.len(), 2);

        let dir = &stats[0];
        assert_eq!(dir.path, "/notes");
        assert_eq!(dir.basename, "notes");
        assert!(dir.is_dir);
        assert_eq!(dir.size, 0);
        assert!(dir.mtime_ms > 0);

        let file = &stats[1];
        assert_eq!(file.path, "/notes/a.txt");
        assert!(!file.is_dir);
        assert_eq!(file.size, 10);
        assert!(file.mtime_ms > dir.mtime_ms);
    }

    #[test]
    fn test_parse_ignores_404_propstat() {
        let body = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/x.bin</d:href>
    <d:propstat>
      <d:prop><d:getcontentlength>42</d:getcontentlength></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:getlastmodified/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        let stats = parse_multistatus(body, "/").unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].size, 42);
        // The 404 block did not provide a modification time
        assert_eq!(stats[0].mtime_ms, 0);
    }

    #[test]
    fn test_parse_response_without_ok_propstat_is_skipped() {
        let body = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/gone.txt</d:href>
    <d:propstat>
      <d:prop><d:getcontentlength/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        let stats = parse_multistatus(body, "/").unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn test_parse_percent_encoded_href() {
        let body = r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/dav/My%20Notes/caf%C3%A9.md</D:href>
    <D:propstat>
      <D:prop><D:getcontentlength>7</D:getcontentlength></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

        let stats = parse_multistatus(body, "/dav").unwrap();
        assert_eq!(stats[0].path, "/My Notes/café.md");
        assert_eq!(stats[0].basename, "café.md");
    }

    #[test]
    fn test_parse_entity_encoded_href() {
        // XML escaping (&amp;amp;) decodes to the literal entity &amp;,
        // which the path layer then decodes to a bare ampersand.
        let body = r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/a%20&amp;amp;%20b.txt</D:href>
    <D:propstat>
      <D:prop><D:getcontentlength>1</D:getcontentlength></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

        let stats = parse_multistatus(body, "/").unwrap();
        assert_eq!(stats[0].path, "/a & b.txt");
    }

    #[test]
    fn test_parse_unprefixed_elements() {
        let body = r#"<?xml version="1.0"?>
<multistatus xmlns="DAV:">
  <response>
    <href>/plain.txt</href>
    <propstat>
      <prop><getcontentlength>3</getcontentlength></prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;

        let stats = parse_multistatus(body, "/").unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].path, "/plain.txt");
    }

    #[test]
    fn test_parse_truncated_body_yields_nothing() {
        // Depending on where the input breaks off, the reader either
        // reports a syntax error or reaches EOF with no complete response.
        match parse_multistatus("<multistatus><respons", "/") {
            Ok(stats) => assert!(stats.is_empty()),
            Err(WebdavError::Xml(_)) => {}
            Err(other) => panic!("unexpected error kind: {other}"),
        }
    }

    #[test]
    fn test_target_first_reorders() {
        let stats = parse_multistatus(DEPTH1_BODY, "/dav").unwrap();
        let reversed: Vec<StatModel> = stats.into_iter().rev().collect();
        assert_eq!(reversed[0].path, "/notes/a.txt");

        let target = RemotePath::new("/notes").unwrap();
        let ordered = target_first(reversed, &target);
        assert_eq!(ordered[0].path, "/notes");
        assert_eq!(ordered[1].path, "/notes/a.txt");
    }

    #[test]
    fn test_parse_http_date() {
        let ms = parse_http_date("Fri, 03 Jul 2026 10:00:00 GMT").unwrap();
        assert!(ms > 1_700_000_000_000);
        assert!(parse_http_date("not a date").is_none());
    }
}

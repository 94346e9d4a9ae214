use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

use crate::util::validate_channel_url;

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
const MAX_OPML_DEPTH: usize = 50;

#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// A channel subscription found in an OPML file.
#[derive(Debug, Clone, PartialEq)]
pub struct OpmlFeed {
    /// `title` attribute, then `text`, then the URL itself.
    pub title: String,
    pub xml_url: String,
}

/// Reads an OPML file and returns every outline carrying an `xmlUrl`.
///
/// Outlines whose URL fails [`validate_channel_url`] are skipped with a
/// warning rather than failing the whole import.
pub async fn parse(path: &Path) -> Result<Vec<OpmlFeed>, OpmlError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_opml_content(&content)
}

fn parse_opml_content(content: &str) -> Result<Vec<OpmlFeed>, OpmlError> {
    // SEC-002: quick-xml (0.37) never parses <!ENTITY> declarations, custom
    // entities surface as unescape errors instead of being expanded.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                if let Some(feed) = outline_feed(&e, &reader)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                if let Some(feed) = outline_feed(&e, &reader)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
    }

    Ok(feeds)
}

fn outline_feed(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Option<OpmlFeed>, OpmlError> {
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let slot = match attr.key.as_ref() {
            b"xmlUrl" => &mut xml_url,
            b"title" => &mut title,
            b"text" => &mut text,
            _ => continue,
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| OpmlError::XmlParse(err.to_string()))?;
        *slot = Some(value.into_owned());
    }

    let Some(url) = xml_url else {
        // Folder outline
        return Ok(None);
    };

    if let Err(err) = validate_channel_url(&url) {
        tracing::warn!(url = %url, error = %err, "Skipping invalid channel URL in OPML");
        return Ok(None);
    }

    let title = title
        .or(text)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| url.clone());

    Ok(Some(OpmlFeed {
        title,
        xml_url: url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_outlines() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Channels</title></head>
  <body>
    <outline text="Blogs" title="Blogs">
      <outline type="rss" text="Example Blog" title="Example Blog" xmlUrl="https://example.com/feed.xml"/>
      <outline type="rss" text="Text Only" xmlUrl="https://textonly.com/rss"/>
      <outline type="rss" xmlUrl="https://notitle.com/feed"/>
    </outline>
  </body>
</opml>"#;

        let feeds = parse_opml_content(content).unwrap();
        assert_eq!(
            feeds,
            vec![
                OpmlFeed {
                    title: "Example Blog".into(),
                    xml_url: "https://example.com/feed.xml".into()
                },
                OpmlFeed {
                    title: "Text Only".into(),
                    xml_url: "https://textonly.com/rss".into()
                },
                OpmlFeed {
                    title: "https://notitle.com/feed".into(),
                    xml_url: "https://notitle.com/feed".into()
                },
            ]
        );
    }

    #[test]
    fn test_skips_unsafe_urls() {
        let content = r#"<?xml version="1.0"?>
    <opml version="2.0"><body>
        <outline xmlUrl="https://valid.com/feed"/>
        <outline xmlUrl="http://192.168.1.1/feed"/>
        <outline xmlUrl="http://localhost/feed"/>
        <outline xmlUrl="file:///etc/passwd"/>
    </body></opml>"#;

        let feeds = parse_opml_content(content).unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].xml_url, "https://valid.com/feed");
    }

    #[test]
    fn test_empty_opml() {
        let content = r#"<?xml version="1.0"?><opml version="2.0"><body></body></opml>"#;
        assert!(parse_opml_content(content).unwrap().is_empty());
    }

    #[test]
    fn test_xxe_entity_not_expanded() {
        let malicious = r#"<?xml version="1.0"?>
<!DOCTYPE opml [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<opml version="2.0"><body>
    <outline title="&xxe;" xmlUrl="https://example.com/feed"/>
</body></opml>"#;

        match parse_opml_content(malicious) {
            Ok(feeds) => assert!(feeds.iter().all(|f| !f.title.contains("root:"))),
            Err(e) => assert!(matches!(e, OpmlError::XmlParse(_))),
        }
    }

    #[test]
    fn test_deeply_nested_opml_rejected() {
        let mut content = String::from("<opml><body>");
        for _ in 0..=MAX_OPML_DEPTH {
            content.push_str("<outline text=\"x\">");
        }
        for _ in 0..=MAX_OPML_DEPTH {
            content.push_str("</outline>");
        }
        content.push_str("</body></opml>");

        assert!(matches!(
            parse_opml_content(&content),
            Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH))
        ));
    }

    #[tokio::test]
    async fn test_parse_from_file() {
        let dir = std::env::temp_dir().join("feedcrawl_opml_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("channels.opml");
        std::fs::write(
            &path,
            r#"<opml><body><outline title="A" xmlUrl="https://a.example.com/rss"/></body></opml>"#,
        )
        .unwrap();

        let feeds = parse(&path).await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "A");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = parse(Path::new("/nonexistent/feedcrawl/channels.opml"))
            .await
            .unwrap_err();
        assert!(matches!(err, OpmlError::Io(_)));
    }
}

use chrono::{DateTime, Utc};
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{EngineError, RawFeedItem};
use crate::util::sanitize_xml;

/// Fields collected from the direct children of one `<item>`.
#[derive(Default)]
struct ItemFields {
    link: Option<String>,
    title: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
    guid: Option<String>,
    author: Option<String>,
}

impl ItemFields {
    fn append(&mut self, field: &[u8], text: &str) {
        let slot = match field {
            b"link" => &mut self.link,
            b"title" => &mut self.title,
            b"description" => &mut self.description,
            b"pubDate" => &mut self.pub_date,
            b"guid" => &mut self.guid,
            b"author" => &mut self.author,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn into_item(self) -> Option<RawFeedItem> {
        let link = self.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;

        Some(RawFeedItem {
            id: self.guid.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()),
            title: self.title.map(|t| t.trim().to_string()),
            link: Some(link),
            description: self.description.map(|d| d.trim().to_string()),
            published: self.pub_date.as_deref().and_then(parse_pub_date),
            author: self.author.map(|a| a.trim().to_string()),
            content: None,
        })
    }
}

/// Lenient scraper for `rss/channel/item` documents.
///
/// The body is decoded as UTF-8 (lossy), stripped of XML-illegal control
/// characters and bare ampersands are escaped before parsing, so feeds that
/// strict readers reject still yield their items. Text of nested markup
/// inside a field is concatenated with its surrounding whitespace intact;
/// only the finished field is trimmed.
///
/// SEC-002: quick-xml never expands `<!ENTITY>` declarations. Each entity
/// reference is resolved on its own and unknown ones stay literal.
pub fn parse_raw_xml(bytes: &[u8]) -> Result<Vec<RawFeedItem>, EngineError> {
    let decoded = String::from_utf8_lossy(bytes);
    let body = sanitize_xml(&decoded);

    let mut reader = Reader::from_str(&body);

    let mut items = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<ItemFields> = None;
    let mut saw_rss_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if path.is_empty() && name == b"rss" {
                    saw_rss_root = true;
                }
                path.push(name);
                if is_item_path(&path) {
                    current = Some(ItemFields::default());
                }
            }
            Ok(Event::End(_)) => {
                if is_item_path(&path) {
                    if let Some(item) = current.take().and_then(ItemFields::into_item) {
                        items.push(item);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(e)) => {
                if let (Some(fields), Some(field)) = (current.as_mut(), item_field(&path)) {
                    fields.append(field, &unescape_lenient(&String::from_utf8_lossy(&e)));
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(fields), Some(field)) = (current.as_mut(), item_field(&path)) {
                    fields.append(field, &String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(EngineError::Parse(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !saw_rss_root {
        return Err(EngineError::Parse("document root is not <rss>".to_string()));
    }

    Ok(items)
}

fn is_item_path(path: &[Vec<u8>]) -> bool {
    path.len() == 3 && path[0] == b"rss" && path[1] == b"channel" && path[2] == b"item"
}

/// Name of the item child the reader is currently inside, if any.
fn item_field(path: &[Vec<u8>]) -> Option<&[u8]> {
    if path.len() >= 4 && is_item_path(&path[..3]) {
        Some(path[3].as_slice())
    } else {
        None
    }
}

/// Resolve predefined and numeric references, leaving anything else as written.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let resolved = tail.find(';').and_then(|end| {
            let name = &tail[1..end];
            resolve_reference(name).map(|value| (value, end + 1))
        });
        match resolved {
            Some((value, consumed)) => {
                out.push_str(&value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_xml_entity(name).map(str::to_string)
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

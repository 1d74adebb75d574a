use feed_rs::parser;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// The feed body could not be interpreted as RSS or Atom.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct ParseError(#[from] parser::ParseFeedError);

/// One entry of a feed, reduced to what gets rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
}

impl FeedItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Feed title plus its items in the feed's own order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub items: Vec<FeedItem>,
}

/// Parses RSS/Atom bytes. Missing titles or links become empty strings
/// rather than dropping the entry, so item positions stay stable.
///
/// Links are taken verbatim from the document where possible; `feed-rs`
/// normalizes them (`http://a` becomes `http://a/`).
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let feed = parser::parse(bytes)?;

    let raw_links = raw_item_links(bytes).filter(|links| links.len() == feed.entries.len());
    if raw_links.is_none() {
        tracing::debug!("Item links not matched in document, using normalized links");
    }
    let mut raw_links = raw_links.into_iter().flatten();

    let title = feed.title.map(|t| t.content).unwrap_or_default();
    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let normalized = entry.links.into_iter().next().map(|l| l.href);
            let link = raw_links
                .next()
                .flatten()
                .or(normalized)
                .unwrap_or_default();
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            FeedItem { title, link }
        })
        .collect();

    Ok(ParsedFeed { title, items })
}

/// First `<link>` of every `<item>`/`<entry>` in document order, as written.
///
/// RSS links are element text, Atom links the `href` attribute. Returns
/// `None` if the bytes are not well-formed XML (e.g. a JSON feed).
fn raw_item_links(bytes: &[u8]) -> Option<Vec<Option<String>>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut buf = Vec::new();
    // Link of the item being read; `None` outside items
    let mut item: Option<Option<String>> = None;
    let mut in_link = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => item = Some(None),
                b"link" => {
                    if let Some(slot) = item.as_mut().filter(|slot| slot.is_none()) {
                        *slot = link_href(&e, &reader);
                        in_link = slot.is_none();
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"link" => {
                if let Some(slot) = item.as_mut().filter(|slot| slot.is_none()) {
                    *slot = link_href(&e, &reader);
                }
            }
            Ok(Event::Text(text)) if in_link => {
                let text = text.unescape().ok()?;
                if let Some(slot) = item.as_mut() {
                    *slot = Some(text.trim().to_string()).filter(|t| !t.is_empty());
                }
            }
            Ok(Event::CData(data)) if in_link => {
                let text = String::from_utf8_lossy(&data).trim().to_string();
                if let Some(slot) = item.as_mut() {
                    *slot = Some(text).filter(|t| !t.is_empty());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    links.push(item.take().flatten());
                    in_link = false;
                }
                b"link" => in_link = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    Some(links)
}

fn link_href(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Option<String> {
    let attr = e.try_get_attribute("href").ok()??;
    let href = attr.decode_and_unescape_value(reader.decoder()).ok()?;
    Some(href.trim().to_string()).filter(|h| !h.is_empty())
}

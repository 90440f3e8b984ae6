//! ATOM feed parsing for the government-procurement feed poll.
//!
//! Only the handful of per-entry fields the ops surface reports are
//! extracted (`title`, `id`, first `link`, `updated`). Elements nested
//! deeper inside an entry (e.g. FPDS award payloads under `<content>`) are
//! ignored even when they reuse those names.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;

/// Error returned when a feed body cannot be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("response is not an ATOM feed")]
    NotAtom,
}

/// One `<entry>` of an ATOM feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AtomEntry {
    pub title: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// Parsed feed: every entry in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomFeed {
    pub entries: Vec<AtomEntry>,
}

impl AtomFeed {
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// The first `limit` entries (fewer if the feed is shorter).
    pub fn sample(&self, limit: usize) -> &[AtomEntry] {
        &self.entries[..limit.min(self.entries.len())]
    }
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Id,
    Updated,
}

fn xml_err(e: impl std::fmt::Display) -> FeedError {
    FeedError::Xml(e.to_string())
}

fn first_href(entry: &mut AtomEntry, tag: &BytesStart<'_>) -> Result<(), FeedError> {
    if entry.link.is_some() {
        return Ok(());
    }
    if let Some(attr) = tag.try_get_attribute("href").map_err(xml_err)? {
        entry.link = Some(attr.unescape_value().map_err(xml_err)?.into_owned());
    }
    Ok(())
}

fn push_text(entry: &mut AtomEntry, field: Field, text: &str) {
    match field {
        Field::Title => entry.title.push_str(text),
        Field::Id => entry.id.push_str(text),
        Field::Updated => entry.updated.get_or_insert_with(String::new).push_str(text),
    }
}

/// Parse an ATOM document into its entries.
///
/// Returns [`FeedError::NotAtom`] when the document has no `<feed>` root,
/// which is how an HTML error page served with status 200 shows up.
pub fn parse_atom(xml: &str) -> Result<AtomFeed, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut saw_feed = false;
    let mut entries = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut entry_depth = 0usize;
    let mut field: Option<Field> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(tag) => {
                depth += 1;
                let child_of_entry = current.is_some() && depth == entry_depth + 1;
                match tag.local_name().as_ref() {
                    b"feed" if depth == 1 => saw_feed = true,
                    b"entry" if saw_feed && current.is_none() => {
                        current = Some(AtomEntry::default());
                        entry_depth = depth;
                    }
                    b"title" if child_of_entry => field = Some(Field::Title),
                    b"id" if child_of_entry => field = Some(Field::Id),
                    b"updated" if child_of_entry => field = Some(Field::Updated),
                    b"link" if child_of_entry => {
                        if let Some(entry) = current.as_mut() {
                            first_href(entry, &tag)?;
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(tag) => {
                if depth == 0 && tag.local_name().as_ref() == b"feed" {
                    saw_feed = true;
                } else if tag.local_name().as_ref() == b"link" && depth == entry_depth {
                    if let Some(entry) = current.as_mut() {
                        first_href(entry, &tag)?;
                    }
                }
            }
            Event::Text(text) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    push_text(entry, f, &text.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(data) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    push_text(entry, f, &String::from_utf8_lossy(&data));
                }
            }
            Event::End(tag) => {
                if current.is_some() {
                    if depth == entry_depth + 1 {
                        field = None;
                    } else if depth == entry_depth && tag.local_name().as_ref() == b"entry" {
                        entries.extend(current.take());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_feed {
        return Err(FeedError::NotAtom);
    }
    Ok(AtomFeed { entries })
}

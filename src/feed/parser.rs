use std::collections::HashMap;

use anyhow::Result;
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};

use crate::util::strip_control_chars;
use crate::watcher::{FeedItem, ItemMeta};

/// Torrent-index extension elements found inside one RSS `<item>`.
///
/// `feed-rs` drops unknown namespaces, so these are collected in a separate
/// pass and joined back to entries by guid (or position).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct TorrentExtensions {
    guid: Option<String>,
    infohash: Option<String>,
    size: Option<String>,
    seeders: Option<String>,
    leechers: Option<String>,
    downloads: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum ExtField {
    Guid,
    InfoHash,
    Size,
    Seeders,
    Leechers,
    Downloads,
    Category,
}

impl ExtField {
    /// Extension fields are namespaced (`nyaa:infoHash`); only `<guid>` is bare.
    fn from_qname(qname: &[u8]) -> Option<Self> {
        let prefixed = qname.contains(&b':');
        let local = qname.rsplit(|b| *b == b':').next()?.to_ascii_lowercase();
        match (prefixed, local.as_slice()) {
            (false, b"guid") => Some(ExtField::Guid),
            (true, b"infohash") => Some(ExtField::InfoHash),
            (true, b"size") => Some(ExtField::Size),
            (true, b"seeders") => Some(ExtField::Seeders),
            (true, b"leechers") => Some(ExtField::Leechers),
            (true, b"downloads") => Some(ExtField::Downloads),
            (true, b"category") => Some(ExtField::Category),
            _ => None,
        }
    }
}

impl TorrentExtensions {
    fn set(&mut self, field: ExtField, value: String) {
        let value = value.trim().to_string();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            ExtField::Guid => &mut self.guid,
            ExtField::InfoHash => &mut self.infohash,
            ExtField::Size => &mut self.size,
            ExtField::Seeders => &mut self.seeders,
            ExtField::Leechers => &mut self.leechers,
            ExtField::Downloads => &mut self.downloads,
            ExtField::Category => &mut self.category,
        };
        *slot = Some(value);
    }
}

/// Parse an RSS or Atom document into feed items, preserving feed order.
///
/// The item identifier is the published infohash when present, then the
/// entry guid, then a SHA-256 of link, title and publish time.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes)?;
    let extensions = scan_torrent_extensions(bytes);

    let by_guid: HashMap<&str, &TorrentExtensions> = extensions
        .iter()
        .filter_map(|ext| ext.guid.as_deref().map(|g| (g, ext)))
        .collect();
    let positional = extensions.len() == feed.entries.len();

    let items = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let ext = by_guid
                .get(entry.id.trim())
                .copied()
                .or_else(|| positional.then(|| &extensions[idx]))
                .cloned()
                .unwrap_or_default();

            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published_at = entry.published.or(entry.updated);
            let title = entry
                .title
                .map(|t| strip_control_chars(t.content.trim()).into_owned())
                .unwrap_or_else(|| "Untitled".to_string());

            let identifier = match ext.infohash.as_deref() {
                Some(hash) => hash.to_string(),
                None => generate_guid(
                    Some(entry.id.as_str()),
                    Some(link.as_str()),
                    &title,
                    published_at.map(|dt| dt.timestamp()),
                ),
            };

            let page = ext
                .guid
                .filter(|g| g.starts_with("http://") || g.starts_with("https://"));

            FeedItem {
                title,
                link,
                identifier,
                published_at,
                meta: ItemMeta {
                    page,
                    size: ext.size,
                    seeders: ext.seeders,
                    leechers: ext.leechers,
                    downloads: ext.downloads,
                    category: ext.category,
                },
            }
        })
        .collect();

    Ok(items)
}

/// Collect extension elements from every `<item>`, in document order.
///
/// Best effort: a malformed document yields whatever was read before the
/// error, and `feed-rs` reports the actual parse failure.
fn scan_torrent_extensions(bytes: &[u8]) -> Vec<TorrentExtensions> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<TorrentExtensions> = None;
    let mut field: Option<ExtField> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"item" {
                    current = Some(TorrentExtensions::default());
                    field = None;
                } else if current.is_some() {
                    field = ExtField::from_qname(e.name().as_ref());
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    item.set(f, text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    item.set(f, String::from_utf8_lossy(&c).into_owned());
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped scanning feed extensions");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    items
}

fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

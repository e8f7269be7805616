//! Listing pagination.
//!
//! Backends iterate their keys in order, starting at the cursor, and feed
//! them through [`paginate_objects`] or [`paginate_versions`]. These apply
//! the prefix matcher, collapse common prefixes, count every emitted entry
//! (object, version, or new common prefix) once against the page size, and
//! compute the next cursor.
//!
//! A cursor that names a common prefix resumes after every key under that
//! prefix, so a folder is never emitted twice across pages.

use s3gate_model::types::{ObjectSummary, UploadSummary, VersionSummary};

use crate::prefix::{CommonPrefixAccumulator, Prefix};

/// Cursor of an object listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Resume strictly after this key or common prefix.
    pub marker: Option<String>,
    /// Maximum entries on the page.
    pub max_keys: usize,
}

/// One page of objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    /// Objects, in key order.
    pub contents: Vec<ObjectSummary>,
    /// Collapsed common prefixes, in key order.
    pub common_prefixes: Vec<String>,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// The last key or prefix on the page, when truncated.
    pub next_marker: Option<String>,
}

/// Cursor of a version listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPage {
    /// Resume at this key.
    pub key_marker: Option<String>,
    /// Resume after this version of `key_marker`; without it the whole key is skipped.
    pub version_id_marker: Option<String>,
    /// Maximum entries on the page.
    pub max_keys: usize,
}

/// One page of versions.
#[derive(Debug, Clone, Default)]
pub struct VersionListing {
    /// Versions and delete markers, newest first within a key.
    pub versions: Vec<VersionSummary>,
    /// Collapsed common prefixes.
    pub common_prefixes: Vec<String>,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// Key of the last entry, when truncated.
    pub next_key_marker: Option<String>,
    /// Version of the last entry, when truncated.
    pub next_version_id_marker: Option<String>,
}

/// Paginate current objects.
///
/// `entries` yields keys in ascending order, starting after the marker.
/// `summarize` returns `None` for keys without a visible current version.
pub fn paginate_objects<'a, I, T, F>(
    entries: I,
    prefix: &Prefix,
    page: &ListPage,
    mut summarize: F,
) -> ObjectListing
where
    I: IntoIterator<Item = (&'a str, T)>,
    F: FnMut(&str, T) -> Option<ObjectSummary>,
{
    let mut listing = ObjectListing::default();
    if page.max_keys == 0 {
        return listing;
    }

    let marker = page.marker.as_deref();
    let mut prefixes = CommonPrefixAccumulator::new();
    let mut emitted = 0usize;
    let mut last: Option<String> = None;

    for (key, entry) in entries {
        if marker.is_some_and(|m| key <= m) {
            continue;
        }
        let Some(hit) = prefix.matches(key) else {
            continue;
        };
        if hit.is_common_prefix
            && (prefixes.contains(&hit.matched_part) || marker == Some(hit.matched_part.as_str()))
        {
            continue;
        }
        let Some(summary) = summarize(key, entry) else {
            continue;
        };

        if emitted >= page.max_keys {
            listing.is_truncated = true;
            break;
        }
        emitted += 1;

        if hit.is_common_prefix {
            prefixes.insert(&hit.matched_part);
            last = Some(hit.matched_part);
        } else {
            last = Some(key.to_owned());
            listing.contents.push(summary);
        }
    }

    if listing.is_truncated {
        listing.next_marker = last;
    }
    listing.common_prefixes = prefixes.into_vec();
    listing
}

/// An entry listed under a key and identified within it, such as an object
/// version or an in-progress upload.
pub trait KeyedEntry {
    /// Id of the entry within its key.
    fn entry_id(&self) -> &str;
}

impl KeyedEntry for VersionSummary {
    fn entry_id(&self) -> &str {
        &self.version_id
    }
}

impl KeyedEntry for UploadSummary {
    fn entry_id(&self) -> &str {
        &self.upload_id
    }
}

/// One page of entries grouped under keys.
#[derive(Debug, Clone)]
pub struct GroupedPage<T> {
    /// Entries, in key order.
    pub entries: Vec<T>,
    /// Collapsed common prefixes.
    pub common_prefixes: Vec<String>,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// Key of the last entry or prefix, when truncated.
    pub next_key_marker: Option<String>,
    /// Id of the last entry, when truncated on an entry.
    pub next_id_marker: Option<String>,
}

impl<T> Default for GroupedPage<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            common_prefixes: Vec::new(),
            is_truncated: false,
            next_key_marker: None,
            next_id_marker: None,
        }
    }
}

/// Paginate entries grouped under keys.
///
/// `entries` yields keys in ascending order, each with its entries in
/// listing order. Entries of `key_marker` itself are resumed after
/// `id_marker`; without an id marker that key is skipped entirely.
pub fn paginate_grouped<'a, I, T>(
    entries: I,
    prefix: &Prefix,
    key_marker: Option<&str>,
    id_marker: Option<&str>,
    max: usize,
) -> GroupedPage<T>
where
    I: IntoIterator<Item = (&'a str, Vec<T>)>,
    T: KeyedEntry,
{
    let mut page = GroupedPage::default();
    if max == 0 {
        return page;
    }

    let mut prefixes = CommonPrefixAccumulator::new();
    let mut emitted = 0usize;
    let mut last: Option<(String, Option<String>)> = None;

    'keys: for (key, mut group) in entries {
        if key_marker.is_some_and(|m| key < m) || group.is_empty() {
            continue;
        }
        let Some(hit) = prefix.matches(key) else {
            continue;
        };

        if key_marker == Some(key) {
            let resume = id_marker.and_then(|id| group.iter().position(|e| e.entry_id() == id));
            let Some(idx) = resume else {
                continue;
            };
            group.drain(..=idx);
            if group.is_empty() {
                continue;
            }
        }

        if hit.is_common_prefix {
            if prefixes.contains(&hit.matched_part) || key_marker == Some(hit.matched_part.as_str())
            {
                continue;
            }
            if emitted >= max {
                page.is_truncated = true;
                break;
            }
            emitted += 1;
            prefixes.insert(&hit.matched_part);
            last = Some((hit.matched_part, None));
            continue;
        }

        for entry in group {
            if emitted >= max {
                page.is_truncated = true;
                break 'keys;
            }
            emitted += 1;
            last = Some((key.to_owned(), Some(entry.entry_id().to_owned())));
            page.entries.push(entry);
        }
    }

    if page.is_truncated {
        if let Some((key, id)) = last {
            page.next_key_marker = Some(key);
            page.next_id_marker = id;
        }
    }
    page.common_prefixes = prefixes.into_vec();
    page
}

/// Paginate versions.
///
/// `entries` yields keys in ascending order, starting at the key marker,
/// each with its versions newest first.
pub fn paginate_versions<'a, I>(entries: I, prefix: &Prefix, page: &VersionPage) -> VersionListing
where
    I: IntoIterator<Item = (&'a str, Vec<VersionSummary>)>,
{
    let grouped = paginate_grouped(
        entries,
        prefix,
        page.key_marker.as_deref(),
        page.version_id_marker.as_deref(),
        page.max_keys,
    );
    VersionListing {
        versions: grouped.entries,
        common_prefixes: grouped.common_prefixes,
        is_truncated: grouped.is_truncated,
        next_key_marker: grouped.next_key_marker,
        next_version_id_marker: grouped.next_id_marker,
    }
}

//! Hierarchical prefix matching for listings.
//!
//! A listing query carries an optional prefix and an optional delimiter. For
//! each candidate key [`Prefix::matches`] decides whether the key belongs on
//! the page and whether it collapses into a common prefix ("folder").
//!
//! With a delimiter, both the prefix and the key are split into segments
//! after dropping one leading delimiter. Every prefix segment except the last
//! must equal the corresponding key segment; the last one only has to be a
//! string prefix of it. A key with more segments than the prefix collapses
//! into the joined matched segments plus a trailing delimiter.
//!
//! ```
//! use s3gate_core::prefix::Prefix;
//!
//! let query = Prefix::new(Some("a/".to_owned()), Some("/".to_owned()));
//! let hit = query.matches("a/b/c").unwrap();
//! assert!(hit.is_common_prefix);
//! assert_eq!(hit.matched_part, "a/b/");
//! ```

use std::collections::HashSet;

/// The prefix/delimiter pair of a listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefix {
    prefix: Option<String>,
    delimiter: Option<String>,
}

/// Outcome of matching one key against a [`Prefix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch {
    /// The key collapses into the common prefix in `matched_part`.
    pub is_common_prefix: bool,
    /// The key itself, the prefix, or the collapsed common prefix.
    pub matched_part: String,
}

impl Prefix {
    /// Create a query. An empty delimiter is treated as no delimiter.
    #[must_use]
    pub fn new(prefix: Option<String>, delimiter: Option<String>) -> Self {
        Self {
            prefix,
            delimiter: delimiter.filter(|d| !d.is_empty()),
        }
    }

    /// The requested prefix, empty when none was given.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or_default()
    }

    /// The requested delimiter.
    #[must_use]
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// Match `key` against this query. `None` means the key is not listed.
    #[must_use]
    pub fn matches(&self, key: &str) -> Option<PrefixMatch> {
        match (self.prefix.as_deref(), self.delimiter.as_deref()) {
            (None, None) => Some(PrefixMatch {
                is_common_prefix: false,
                matched_part: key.to_owned(),
            }),
            (Some(prefix), None) => key.starts_with(prefix).then(|| PrefixMatch {
                is_common_prefix: false,
                matched_part: prefix.to_owned(),
            }),
            (prefix, Some(delimiter)) => {
                Self::match_segments(prefix.unwrap_or_default(), delimiter, key)
            }
        }
    }

    fn match_segments(prefix: &str, delimiter: &str, key: &str) -> Option<PrefixMatch> {
        let trimmed_prefix = prefix.strip_prefix(delimiter).unwrap_or(prefix);
        let trimmed_key = key.strip_prefix(delimiter).unwrap_or(key);

        let prefix_parts: Vec<&str> = trimmed_prefix.split(delimiter).collect();
        let key_parts: Vec<&str> = trimmed_key.split(delimiter).collect();

        if key_parts.len() < prefix_parts.len() {
            return None;
        }
        let has_more = key_parts.len() > prefix_parts.len();

        let last = prefix_parts.len() - 1;
        for (idx, (want, got)) in prefix_parts.iter().zip(&key_parts).enumerate() {
            let ok = if idx == last {
                got.starts_with(want)
            } else {
                want == got
            };
            if !ok {
                return None;
            }
        }

        if !has_more {
            return Some(PrefixMatch {
                is_common_prefix: false,
                matched_part: key.to_owned(),
            });
        }

        let mut matched = String::with_capacity(key.len());
        if key.starts_with(delimiter) {
            matched.push_str(delimiter);
        }
        matched.push_str(&key_parts[..prefix_parts.len()].join(delimiter));
        matched.push_str(delimiter);

        Some(PrefixMatch {
            is_common_prefix: true,
            matched_part: matched,
        })
    }
}

/// Common prefixes already emitted by the current listing call.
#[derive(Debug, Default)]
pub struct CommonPrefixAccumulator {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl CommonPrefixAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `prefix` was already emitted.
    #[must_use]
    pub fn contains(&self, prefix: &str) -> bool {
        self.seen.contains(prefix)
    }

    /// Record `prefix`; returns `false` if it was already present.
    pub fn insert(&mut self, prefix: &str) -> bool {
        if self.seen.contains(prefix) {
            return false;
        }
        self.seen.insert(prefix.to_owned());
        self.ordered.push(prefix.to_owned());
        true
    }

    /// Number of distinct prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// The prefixes in emission order.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

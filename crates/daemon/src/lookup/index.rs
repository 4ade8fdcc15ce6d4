//! Code → value lookup over a cached table.
//!
//! The table is fetched whole from a [`TabularSource`] and cached for a fixed
//! TTL. The first row is the header; key and value columns are found by
//! header synonyms. Queries match the key column in three widening passes:
//! exact, suffix, then substring.

use std::sync::Arc;

use super::{SourceError, TabularSource};
use crate::cache::TtlCell;
use crate::config::LookupConfig;

/// Raw table rows, header first.
pub type Rows = Arc<Vec<Vec<String>>>;

/// How a query is compared with a key cell, from strictest to loosest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchPass {
    Exact,
    Suffix,
    Substring,
}

impl MatchPass {
    const ALL: [MatchPass; 3] = [MatchPass::Exact, MatchPass::Suffix, MatchPass::Substring];

    fn matches(self, cell: &str, needle: &str) -> bool {
        match self {
            MatchPass::Exact => cell == needle,
            MatchPass::Suffix => cell.ends_with(needle),
            MatchPass::Substring => cell.contains(needle),
        }
    }
}

/// Column layout detected from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub key: usize,
    pub value: usize,
}

impl Columns {
    /// Find key and value columns by header synonym, defaulting to 0 and 1.
    pub fn detect(header: &[String], key_headers: &[String], value_headers: &[String]) -> Self {
        let find = |synonyms: &[String]| {
            header.iter().position(|cell| {
                let cell = cell.trim().to_lowercase();
                synonyms.iter().any(|s| s.trim().to_lowercase() == cell)
            })
        };
        Self {
            key: find(key_headers).unwrap_or(0),
            value: find(value_headers).unwrap_or(1),
        }
    }
}

/// Find the value for `query` in `rows`.
///
/// Returns `None` for an empty query, when no row matches, or when the
/// matched row's value cell is empty or missing.
pub fn find_value(rows: &[Vec<String>], columns: Columns, query: &str) -> Option<String> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let data = rows.get(1..)?;

    for pass in MatchPass::ALL {
        let hit = data.iter().find(|row| {
            row.get(columns.key)
                .map(|cell| cell.trim().to_lowercase())
                .is_some_and(|cell| !cell.is_empty() && pass.matches(&cell, &needle))
        });
        if let Some(row) = hit {
            tracing::debug!(query, ?pass, "Lookup matched");
            return row
                .get(columns.value)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string);
        }
    }
    None
}

/// Text replied to a lookup.
pub fn lookup_reply(query: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{query} → {value}"),
        None => format!("{query}: not found"),
    }
}

/// Cached lookup table.
pub struct LookupIndex<S> {
    source: S,
    rows: TtlCell<Rows>,
    key_headers: Vec<String>,
    value_headers: Vec<String>,
}

impl<S: TabularSource> LookupIndex<S> {
    /// Create an index over `source` using the configured synonyms and TTL.
    pub fn new(source: S, config: &LookupConfig) -> Self {
        Self {
            source,
            rows: TtlCell::new(config.cache_ttl()),
            key_headers: config.key_headers.clone(),
            value_headers: config.value_headers.clone(),
        }
    }

    /// The source behind the index.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve a code to its value.
    ///
    /// An empty query returns `None` without touching the source.
    pub async fn resolve(&self, query: &str) -> Result<Option<String>, SourceError> {
        if query.trim().is_empty() {
            return Ok(None);
        }
        let rows = self.table().await?;
        let Some(header) = rows.first() else {
            return Ok(None);
        };
        let columns = Columns::detect(header, &self.key_headers, &self.value_headers);
        Ok(find_value(&rows, columns, query))
    }

    async fn table(&self) -> Result<Rows, SourceError> {
        let source = &self.source;
        self.rows
            .get_or_refresh(|| async move {
                let rows = source.fetch_rows().await?;
                tracing::info!(rows = rows.len(), "Lookup table refreshed");
                Ok(Arc::new(rows))
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Source serving a fixed table.
    pub(crate) struct StaticSource {
        pub rows: Vec<Vec<String>>,
        pub fail: bool,
        pub fetches: AtomicUsize,
    }

    impl StaticSource {
        pub fn new(rows: &[&[&str]]) -> Self {
            Self {
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|c| c.to_string()).collect())
                    .collect(),
                fail: false,
                fetches: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }
    }

    impl TabularSource for StaticSource {
        async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Status {
                    status: 403,
                    message: "The caller does not have permission".to_string(),
                });
            }
            Ok(self.rows.clone())
        }
    }

    fn index(source: StaticSource) -> LookupIndex<StaticSource> {
        LookupIndex::new(source, &LookupConfig::default())
    }

    #[tokio::test]
    async fn test_resolve_exact_and_suffix() {
        let index = index(StaticSource::new(&[&["Розетка", "DMX"], &["14Н", "5"]]));

        assert_eq!(index.resolve("14Н").await.unwrap().as_deref(), Some("5"));
        assert_eq!(index.resolve("  14н ").await.unwrap().as_deref(), Some("5"));
        assert_eq!(index.resolve("Н").await.unwrap().as_deref(), Some("5"));
        assert_eq!(index.resolve("99").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_exact_beats_earlier_suffix() {
        let index = index(StaticSource::new(&[
            &["Code", "Value"],
            &["A12", "first"],
            &["12", "second"],
        ]));
        assert_eq!(index.resolve("12").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_suffix_beats_earlier_substring() {
        let index = index(StaticSource::new(&[
            &["key", "value"],
            &["X120", "substring"],
            &["B12", "suffix"],
        ]));
        assert_eq!(index.resolve("12").await.unwrap().as_deref(), Some("suffix"));
    }

    #[tokio::test]
    async fn test_columns_found_by_header() {
        let index = index(StaticSource::new(&[
            &["Комментарий", "DMX", "Розетка"],
            &["сцена", "17", "3A"],
        ]));
        assert_eq!(index.resolve("3a").await.unwrap().as_deref(), Some("17"));
    }

    #[tokio::test]
    async fn test_empty_value_is_not_found() {
        let index = index(StaticSource::new(&[&["code", "value"], &["7", ""], &["8"]]));
        assert_eq!(index.resolve("7").await.unwrap(), None);
        assert_eq!(index.resolve("8").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_query_skips_source() {
        let index = index(StaticSource::new(&[&["code", "value"]]));
        assert_eq!(index.resolve("   ").await.unwrap(), None);
        assert_eq!(index.source().fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let index = index(StaticSource::failing());
        assert!(matches!(
            index.resolve("1").await,
            Err(SourceError::Status { status: 403, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_table_cached_for_ttl() {
        let index = index(StaticSource::new(&[&["code", "value"], &["1", "one"]]));

        index.resolve("1").await.unwrap();
        index.resolve("1").await.unwrap();
        assert_eq!(index.source().fetches.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        index.resolve("1").await.unwrap();
        assert_eq!(index.source().fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_columns_default_when_headers_unknown() {
        let header = vec!["foo".to_string(), "bar".to_string()];
        let columns = Columns::detect(&header, &["code".to_string()], &["value".to_string()]);
        assert_eq!(columns, Columns { key: 0, value: 1 });
    }

    #[test]
    fn test_lookup_reply() {
        assert_eq!(lookup_reply("14Н", Some("5")), "14Н → 5");
        assert_eq!(lookup_reply("99", None), "99: not found");
    }
}

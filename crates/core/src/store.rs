//! Ordered, in-memory history of accepted doodles.
//!
//! [`DoodleStore`] keeps every accepted [`Doodle`] sorted newest-first by
//! [`DoodleId`]. The submission pipeline is its only writer; the broadcast
//! hub and the snapshot endpoint only read. The store performs no I/O: the
//! startup directory listing is handed to [`DoodleStore::bootstrap`] by the
//! caller.
//!
//! Designed to be wrapped in `Arc` and shared across the application.

use std::collections::VecDeque;

use chrono::{TimeZone, Utc};
use tokio::sync::RwLock;

use crate::doodle::{Doodle, DoodleId};
use crate::error::CoreError;
use crate::naming::{is_doodle_image, parse_doodle_filename, public_uri};
use crate::types::{EpochMillis, Timestamp};

/// Default number of entries returned by [`DoodleStore::latest`].
pub const DEFAULT_LATEST_LIMIT: usize = 18;

/// One entry of the startup directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Bare file name, e.g. `doodle_1700000000000.png`.
    pub name: String,
    /// Modification time, used to order names that carry no timestamp.
    pub modified_millis: Option<EpochMillis>,
}

struct StoreInner {
    /// Newest first.
    history: VecDeque<Doodle>,
    last_id: Option<DoodleId>,
}

pub struct DoodleStore {
    inner: RwLock<StoreInner>,
    public_prefix: String,
    default_limit: usize,
}

impl DoodleStore {
    /// Create an empty store.
    ///
    /// * `public_prefix` - URI prefix prepended to bootstrapped file names.
    /// * `default_limit` - cap used by [`latest`](Self::latest) when no
    ///   explicit limit is given.
    pub fn new(public_prefix: impl Into<String>, default_limit: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                history: VecDeque::new(),
                last_id: None,
            }),
            public_prefix: public_prefix.into(),
            default_limit,
        }
    }

    /// Seed the history from the doodle directory listing.
    ///
    /// Non-image entries are dropped. Entries are ordered by the timestamp
    /// embedded in their name, falling back to modification time, then by
    /// name; ids are assigned in that order and the history ends up
    /// newest-first. Must run before the first [`insert`](Self::insert).
    ///
    /// Returns the number of doodles loaded.
    pub async fn bootstrap(&self, listing: Vec<ScannedFile>) -> Result<usize, CoreError> {
        let mut inner = self.inner.write().await;
        if !inner.history.is_empty() {
            return Err(CoreError::Validation(
                "Doodle store has already been populated".into(),
            ));
        }

        let mut keyed: Vec<((EpochMillis, u32), String)> = listing
            .into_iter()
            .filter(|f| is_doodle_image(&f.name))
            .map(|f| {
                let key = parse_doodle_filename(&f.name)
                    .unwrap_or((f.modified_millis.unwrap_or(0), 0));
                (key, f.name)
            })
            .collect();
        keyed.sort();

        for ((millis, _), name) in keyed {
            let id = DoodleId::next_after(inner.last_id, millis);
            let doodle = Doodle {
                id,
                uri: public_uri(&self.public_prefix, &name),
                created_at: millis_to_timestamp(id.millis),
            };
            inner.last_id = Some(id);
            inner.history.push_front(doodle);
        }

        let count = inner.history.len();
        tracing::info!(count, "Doodle history bootstrapped");
        Ok(count)
    }

    /// The id the next inserted doodle must carry when created at `now`.
    ///
    /// The pipeline serializes `next_id` + [`insert`](Self::insert), so the
    /// id it reads here is still the next one when it inserts.
    pub async fn next_id(&self, now: Timestamp) -> DoodleId {
        DoodleId::next_after(self.inner.read().await.last_id, now.timestamp_millis())
    }

    /// Insert a newly accepted doodle at the front of the history.
    ///
    /// Rejects an id that does not sort after every stored id, so the
    /// history stays newest-first.
    pub async fn insert(&self, doodle: Doodle) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        if let Some(last) = inner.last_id {
            if doodle.id <= last {
                return Err(CoreError::Internal(format!(
                    "Doodle id {} does not follow {last}",
                    doodle.id
                )));
            }
        }
        inner.last_id = Some(doodle.id);
        inner.history.push_front(doodle);
        Ok(())
    }

    /// The newest `limit` doodles, newest first.
    ///
    /// `None` uses the configured default limit.
    pub async fn latest(&self, limit: Option<usize>) -> Vec<Doodle> {
        let n = limit.unwrap_or(self.default_limit);
        self.inner
            .read()
            .await
            .history
            .iter()
            .take(n)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.history.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.history.is_empty()
    }
}

fn millis_to_timestamp(millis: EpochMillis) -> Timestamp {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn scanned(name: &str, modified: Option<EpochMillis>) -> ScannedFile {
        ScannedFile {
            name: name.to_string(),
            modified_millis: modified,
        }
    }

    fn uris(doodles: &[Doodle]) -> Vec<&str> {
        doodles.iter().map(|d| d.uri.as_str()).collect()
    }

    async fn append(store: &DoodleStore, uri: &str, now: Timestamp) -> Doodle {
        let doodle = Doodle {
            id: store.next_id(now).await,
            uri: uri.to_string(),
            created_at: now,
        };
        store.insert(doodle.clone()).await.unwrap();
        doodle
    }

    #[tokio::test]
    async fn insert_makes_doodle_the_latest() {
        let store = DoodleStore::new("/static/doodles", 18);

        for i in 0..5 {
            let appended = append(&store, &format!("/d/{i}.png"), Utc::now()).await;
            let latest = store.latest(Some(1)).await;
            assert_eq!(latest, vec![appended]);
        }
    }

    #[tokio::test]
    async fn ids_strictly_increase_in_insert_order() {
        let store = DoodleStore::new("/static/doodles", 100);
        let now = Utc::now();

        // Same timestamp for every insert forces the seq disambiguator.
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(append(&store, &format!("/d/{i}.png"), now).await.id);
        }
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let history = store.latest(None).await;
        assert!(history.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn stale_id_is_rejected() {
        let store = DoodleStore::new("/static/doodles", 18);
        let now = Utc::now();
        let stale = store.next_id(now).await;
        append(&store, "/d/0.png", now).await;

        let result = store
            .insert(Doodle {
                id: stale,
                uri: "/d/1.png".into(),
                created_at: now,
            })
            .await;

        assert_matches!(result, Err(CoreError::Internal(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn latest_respects_limit_and_default() {
        let store = DoodleStore::new("/static/doodles", 3);
        for i in 0..5 {
            append(&store, &format!("/d/{i}.png"), Utc::now()).await;
        }

        assert_eq!(store.latest(None).await.len(), 3);
        assert_eq!(store.latest(Some(2)).await.len(), 2);
        assert_eq!(store.latest(Some(50)).await.len(), 5);
        assert_eq!(uris(&store.latest(Some(2)).await), vec!["/d/4.png", "/d/3.png"]);
    }

    #[tokio::test]
    async fn bootstrap_filters_and_orders_newest_first() {
        let store = DoodleStore::new("/static/doodles", 18);
        let listing = vec![
            scanned("doodle_3000.png", None),
            scanned("readme.txt", None),
            scanned("doodle_1000.png", None),
            scanned("doodle_2000.png", None),
            scanned("doodle_2000_1.png", None),
        ];

        let count = store.bootstrap(listing).await.unwrap();
        assert_eq!(count, 4);

        let latest = store.latest(None).await;
        assert_eq!(
            uris(&latest),
            vec![
                "/static/doodles/doodle_3000.png",
                "/static/doodles/doodle_2000_1.png",
                "/static/doodles/doodle_2000.png",
                "/static/doodles/doodle_1000.png",
            ]
        );
        assert!(latest.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn bootstrap_uses_mtime_for_foreign_names() {
        let store = DoodleStore::new("/static/doodles", 18);
        let listing = vec![
            scanned("sketch.png", Some(5_000)),
            scanned("doodle_1000.png", None),
            scanned("older.png", Some(500)),
        ];
        store.bootstrap(listing).await.unwrap();

        assert_eq!(
            uris(&store.latest(None).await),
            vec![
                "/static/doodles/sketch.png",
                "/static/doodles/doodle_1000.png",
                "/static/doodles/older.png",
            ]
        );
    }

    #[tokio::test]
    async fn bootstrap_is_reproducible() {
        let listing = vec![
            scanned("doodle_1000.png", None),
            scanned("doodle_3000.png", None),
            scanned("doodle_2000.png", None),
        ];

        let first = DoodleStore::new("/static/doodles", 18);
        first.bootstrap(listing.clone()).await.unwrap();

        let mut shuffled = listing;
        shuffled.reverse();
        let second = DoodleStore::new("/static/doodles", 18);
        second.bootstrap(shuffled).await.unwrap();

        assert_eq!(first.latest(None).await, second.latest(None).await);
    }

    #[tokio::test]
    async fn insert_after_bootstrap_is_newest() {
        let store = DoodleStore::new("/static/doodles", 18);
        // A file from the far future must not let a new append sort below it.
        store
            .bootstrap(vec![scanned("doodle_9999999999999.png", None)])
            .await
            .unwrap();

        let appended = append(&store, "/static/doodles/new.png", Utc::now()).await;
        let latest = store.latest(None).await;
        assert_eq!(latest[0], appended);
        assert!(latest[0].id > latest[1].id);
    }

    #[tokio::test]
    async fn bootstrap_twice_is_rejected() {
        let store = DoodleStore::new("/static/doodles", 18);
        store
            .bootstrap(vec![scanned("doodle_1.png", None)])
            .await
            .unwrap();

        let result = store.bootstrap(vec![scanned("doodle_2.png", None)]).await;
        assert_matches!(result, Err(CoreError::Validation(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn empty_store_returns_empty_snapshot() {
        let store = DoodleStore::new("/static/doodles", 18);
        assert!(store.is_empty().await);
        assert!(store.latest(None).await.is_empty());
    }
}

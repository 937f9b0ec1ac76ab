//! Local snapshot of the user's collections and tags.
//!
//! Listing every collection and tag costs several requests, so the snapshot
//! is kept between runs and only rebuilt when the server's change marker
//! (`meta.changedBookmarksDate` from `GET /user/stats`) moves past the one
//! recorded with the snapshot.

use crate::api::ApiClient;
use crate::models::{Collection, NewCollection, SystemCollection, UserStats};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CHANGE_MARKER_KEY: &str = "changedBookmarksDate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: i64,
    pub title: String,
    #[serde(rename = "count", default)]
    pub item_count: u64,
    #[serde(rename = "parent", default)]
    pub parent_id: Option<i64>,
}

impl CollectionSummary {
    pub fn is_system(&self) -> bool {
        self.id <= 0
    }
}

impl From<Collection> for CollectionSummary {
    fn from(c: Collection) -> Self {
        Self {
            id: c.id,
            title: c.title,
            item_count: c.count,
            parent_id: c.parent,
        }
    }
}

/// Opaque server marker of the last bookmark change.
///
/// Two markers that both parse as integers compare numerically, two that
/// both parse as RFC 3339 compare as instants; otherwise they compare as
/// plain strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMarker(String);

impl ChangeMarker {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_meta(meta: &Map<String, Value>) -> Option<Self> {
        match meta.get(CHANGE_MARKER_KEY)? {
            Value::String(s) => Some(Self(s.clone())),
            Value::Null => None,
            other => Some(Self(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_newer_than(&self, other: &ChangeMarker) -> bool {
        if let (Ok(mine), Ok(theirs)) = (self.0.trim().parse::<i128>(), other.0.trim().parse::<i128>()) {
            return mine > theirs;
        }
        match (
            DateTime::parse_from_rfc3339(&self.0),
            DateTime::parse_from_rfc3339(&other.0),
        ) {
            (Ok(mine), Ok(theirs)) => mine > theirs,
            _ => self.0 > other.0,
        }
    }
}

/// What `refresh` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot matched the server's change marker; nothing was listed.
    Fresh,
    /// Collections and tags were listed again.
    Rebuilt,
}

/// Persisted form: `{collections, tags, refreshed, meta}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub collections: Vec<CollectionSummary>,
    pub tags: Vec<String>,
    pub refreshed: DateTime<Utc>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl Snapshot {
    pub fn change_marker(&self) -> Option<ChangeMarker> {
        ChangeMarker::from_meta(&self.meta)
    }
}

/// JSON file holding the snapshot between runs.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/raindrop-shell/state.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("raindrop-shell").join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory snapshot plus optional persistence.
#[derive(Debug, Default)]
pub struct LocalState {
    snapshot: Option<Snapshot>,
    store: Option<StateStore>,
}

impl LocalState {
    pub fn new(store: Option<StateStore>) -> Self {
        Self { snapshot: None, store }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Bring the snapshot up to date.
    ///
    /// Without `force`, an existing snapshot (in memory, else on disk) costs a
    /// single `GET /user/stats`; the full listing only runs when the server's
    /// change marker is newer. Network errors abort without touching the
    /// current snapshot. Persisting the result is best effort.
    pub fn refresh(&mut self, api: &mut ApiClient, force: bool) -> Result<RefreshOutcome> {
        let mut stats = None;

        if !force {
            if self.snapshot.is_none() {
                self.snapshot = self.load_persisted();
            }
            if let Some(current) = &self.snapshot {
                let latest = api.user_stats()?;
                let stored = current.change_marker();
                let remote = ChangeMarker::from_meta(&latest.meta);
                if let (Some(stored), Some(remote)) = (&stored, &remote) {
                    if !remote.is_newer_than(stored) {
                        info!(marker = stored.as_str(), "collection snapshot is current");
                        return Ok(RefreshOutcome::Fresh);
                    }
                }
                info!(
                    stored = ?stored.as_ref().map(ChangeMarker::as_str),
                    remote = ?remote.as_ref().map(ChangeMarker::as_str),
                    "collection snapshot is stale"
                );
                stats = Some(latest);
            }
        }

        let snapshot = rebuild(api, stats)?;
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&snapshot) {
                warn!(path = %store.path().display(), error = %e, "failed to persist collection snapshot");
            }
        }
        self.snapshot = Some(snapshot);
        Ok(RefreshOutcome::Rebuilt)
    }

    fn load_persisted(&self) -> Option<Snapshot> {
        let store = self.store.as_ref()?;
        match store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "ignoring unreadable collection snapshot");
                None
            }
        }
    }

    pub fn collections(&self) -> &[CollectionSummary] {
        self.snapshot.as_ref().map(|s| s.collections.as_slice()).unwrap_or(&[])
    }

    pub fn tags(&self) -> &[String] {
        self.snapshot.as_ref().map(|s| s.tags.as_slice()).unwrap_or(&[])
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.refreshed)
    }

    /// Case-insensitive exact title match.
    pub fn find_collection_by_title(&self, title: &str) -> Result<&CollectionSummary> {
        let wanted = title.trim().to_lowercase();
        self.collections()
            .iter()
            .find(|c| c.title.to_lowercase() == wanted)
            .ok_or_else(|| Error::NotFoundLocal(format!("collection '{}'", title.trim())))
    }

    pub fn find_collection_by_id(&self, id: i64) -> Result<&CollectionSummary> {
        self.collections()
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFoundLocal(format!("collection #{}", id)))
    }

    /// Look a collection up by title, creating it remotely when missing. The
    /// new collection is added to the snapshot without a full refresh.
    pub fn get_or_create_collection(&mut self, api: &mut ApiClient, title: &str) -> Result<CollectionSummary> {
        if let Ok(existing) = self.find_collection_by_title(title) {
            return Ok(existing.clone());
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Collection title can't be empty.".to_string()));
        }

        let created: CollectionSummary = api
            .create_collection(&NewCollection {
                title: title.to_string(),
                ..Default::default()
            })?
            .into();
        info!(id = created.id, title = %created.title, "created collection");

        let snapshot = self.snapshot.get_or_insert_with(|| Snapshot {
            collections: Vec::new(),
            tags: Vec::new(),
            refreshed: Utc::now(),
            meta: Map::new(),
        });
        snapshot.collections.push(created.clone());
        sort_collections(&mut snapshot.collections);
        Ok(created)
    }

    /// Sorted titles, optionally without the system collections.
    pub fn collection_titles(&self, exclude_system: bool) -> Vec<String> {
        let mut titles: Vec<String> = self
            .collections()
            .iter()
            .filter(|c| !(exclude_system && c.is_system()))
            .map(|c| c.title.clone())
            .collect();
        titles.sort_by_key(|t| t.to_lowercase());
        titles
    }

    /// Bookmarks in user collections (system collections excluded).
    pub fn total_bookmarks(&self) -> u64 {
        self.collections()
            .iter()
            .filter(|c| !c.is_system())
            .map(|c| c.item_count)
            .sum()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.to_lowercase();
        self.tags().iter().any(|t| t.to_lowercase() == wanted)
    }
}

fn rebuild(api: &mut ApiClient, stats: Option<UserStats>) -> Result<Snapshot> {
    let roots = api.root_collections()?;
    let children = api.child_collections()?;
    let stats = match stats {
        Some(stats) => stats,
        None => api.user_stats()?,
    };
    let tags = api.tags(None)?;
    debug!(
        roots = roots.len(),
        children = children.len(),
        tags = tags.len(),
        "rebuilt collection snapshot"
    );

    let mut seen = HashSet::new();
    let mut collections: Vec<CollectionSummary> = roots
        .into_iter()
        .chain(children)
        .filter(|c| seen.insert(c.id))
        .map(CollectionSummary::from)
        .collect();
    if let Some(count) = stats.count_of(SystemCollection::Unsorted) {
        if seen.insert(SystemCollection::Unsorted.id()) {
            collections.push(CollectionSummary {
                id: SystemCollection::Unsorted.id(),
                title: SystemCollection::Unsorted.title().to_string(),
                item_count: count,
                parent_id: None,
            });
        }
    }
    sort_collections(&mut collections);

    let mut unique: BTreeMap<String, String> = BTreeMap::new();
    for tag in tags {
        unique.entry(tag.name.to_lowercase()).or_insert(tag.name);
    }

    Ok(Snapshot {
        collections,
        tags: unique.into_values().collect(),
        refreshed: Utc::now(),
        meta: stats.meta,
    })
}

fn sort_collections(collections: &mut [CollectionSummary]) {
    collections.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()).then(a.id.cmp(&b.id)));
}

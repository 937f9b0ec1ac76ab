//! Record types exchanged with the Raindrop REST API.
//!
//! Each record keeps the fields the client works with and collects any
//! other field the server sends into `other`, so unofficial additions to the
//! payload survive decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Access level of the current user on a collection. Sent as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum AccessLevel {
    ReadOnly = 1,
    CollaboratorRead = 2,
    CollaboratorWrite = 3,
    Owner = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    List,
    Simple,
    Grid,
    Masonry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkType {
    Link,
    Article,
    Image,
    Video,
    Document,
    Audio,
    #[serde(other)]
    Other,
}

/// Well-known collections that exist for every user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum SystemCollection {
    All = 0,
    Unsorted = -1,
    Trash = -99,
}

impl SystemCollection {
    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn title(self) -> &'static str {
        match self {
            SystemCollection::All => "All",
            SystemCollection::Unsorted => "Unsorted",
            SystemCollection::Trash => "Trash",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(SystemCollection::All),
            -1 => Some(SystemCollection::Unsorted),
            -99 => Some(SystemCollection::Trash),
            _ => None,
        }
    }
}

/// `{"$id": n}` reference to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    #[serde(rename = "$id")]
    pub id: i64,
}

impl CollectionRef {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

impl From<SystemCollection> for CollectionRef {
    fn from(system: SystemCollection) -> Self {
        Self { id: system.id() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Access {
    pub level: AccessLevel,
    #[serde(default)]
    pub draggable: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Collection {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default, deserialize_with = "parent_id")]
    pub parent: Option<i64>,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastUpdate")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParentField {
    Ref(CollectionRef),
    Id(i64),
}

// The API nests the parent as `{"$id": n}`; older payloads use a bare id.
fn parent_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<ParentField>::deserialize(deserializer)?.map(|p| match p {
        ParentField::Ref(r) => r.id,
        ParentField::Id(id) => id,
    }))
}

fn unsorted() -> CollectionRef {
    SystemCollection::Unsorted.into()
}

/// A bookmark ("raindrop").
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bookmark {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default = "unsorted")]
    pub collection: CollectionRef,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastUpdate")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub kind: Option<BookmarkType>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub important: Option<bool>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Bookmark {
    pub fn collection_id(&self) -> i64 {
        self.collection.id
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default, rename = "fullName")]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub pro: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Item count of one system collection.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SystemCount {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default)]
    pub count: u64,
}

/// `GET /user/stats`: system collection counts plus the account `meta`
/// object carrying `changedBookmarksDate`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub items: Vec<SystemCount>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl UserStats {
    pub fn count_of(&self, system: SystemCollection) -> Option<u64> {
        self.items.iter().find(|i| i.id == system.id()).map(|i| i.count)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewCollection {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<CollectionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<CollectionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
}

/// Empty marker object asking the server to parse the page in the background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PleaseParse {}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewBookmark {
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
    #[serde(rename = "pleaseParse", skip_serializing_if = "Option::is_none")]
    pub please_parse: Option<PleaseParse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookmarkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
}

impl BookmarkUpdate {
    pub fn is_empty(&self) -> bool {
        *self == BookmarkUpdate::default()
    }
}

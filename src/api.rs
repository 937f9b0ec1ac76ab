// API client module: typed calls against the Raindrop REST endpoints.
// Every call is a single blocking request through `Transport`, which takes
// care of the bearer token, refreshes and rate-limit bookkeeping.

use crate::models::{
    Bookmark, BookmarkUpdate, Collection, CollectionUpdate, NewBookmark, NewCollection, Tag, User, UserStats,
};
use crate::transport::{FilePart, RateLimitState, Transport};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// Thin client over `Transport` exposing one method per endpoint the shell
/// uses.
pub struct ApiClient {
    transport: Transport,
}

#[derive(Serialize)]
struct SearchClause<'a> {
    key: &'static str,
    val: &'a str,
}

impl ApiClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn rate_limit(&self) -> RateLimitState {
        self.transport.rate_limit()
    }

    /// The user the access token belongs to.
    pub fn user(&mut self) -> Result<User> {
        field(self.transport.get("user", Vec::new())?, "user")
    }

    /// System collection counts and the account `meta` (change marker).
    pub fn user_stats(&mut self) -> Result<UserStats> {
        Ok(serde_json::from_value(self.transport.get("user/stats", Vec::new())?)?)
    }

    pub fn root_collections(&mut self) -> Result<Vec<Collection>> {
        field(self.transport.get("collections", Vec::new())?, "items")
    }

    pub fn child_collections(&mut self) -> Result<Vec<Collection>> {
        field(self.transport.get("collections/childrens", Vec::new())?, "items")
    }

    pub fn collection(&mut self, id: i64) -> Result<Collection> {
        field(self.transport.get(&format!("collection/{}", id), Vec::new())?, "item")
    }

    pub fn create_collection(&mut self, request: &NewCollection) -> Result<Collection> {
        field(self.transport.post("collection", request)?, "item")
    }

    pub fn update_collection(&mut self, id: i64, request: &CollectionUpdate) -> Result<Collection> {
        field(self.transport.put(&format!("collection/{}", id), request)?, "item")
    }

    pub fn delete_collection(&mut self, id: i64) -> Result<()> {
        self.transport.delete(&format!("collection/{}", id), &json!({}))?;
        Ok(())
    }

    /// Tags across all collections, or within one.
    pub fn tags(&mut self, collection: Option<i64>) -> Result<Vec<Tag>> {
        let path = match collection {
            Some(id) => format!("tags/{}", id),
            None => "tags".to_string(),
        };
        field(self.transport.get(&path, Vec::new())?, "items")
    }

    pub fn delete_tags(&mut self, tags: &[String]) -> Result<()> {
        self.transport.delete("tags", &json!({ "tags": tags }))?;
        Ok(())
    }

    pub fn bookmark(&mut self, id: i64) -> Result<Bookmark> {
        field(self.transport.get(&format!("raindrop/{}", id), Vec::new())?, "item")
    }

    pub fn create_link(&mut self, request: &NewBookmark) -> Result<Bookmark> {
        field(self.transport.post("raindrop", request)?, "item")
    }

    /// Upload a file as a new bookmark. The upload endpoint only takes the
    /// file and a collection, so any other attributes go out in a second
    /// `PUT` on the created bookmark.
    pub fn create_file(
        &mut self,
        path: &Path,
        content_type: &str,
        collection: i64,
        attributes: &BookmarkUpdate,
    ) -> Result<Bookmark> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        let part = FilePart {
            field_name: "file".to_string(),
            file_name,
            content_type: content_type.to_string(),
            bytes,
            fields: vec![("collectionId".to_string(), collection.to_string())],
        };
        let created: Bookmark = field(self.transport.put_file("raindrop/file", part)?, "item")?;
        if attributes.is_empty() {
            return Ok(created);
        }
        self.update_bookmark(created.id, attributes)
    }

    pub fn update_bookmark(&mut self, id: i64, request: &BookmarkUpdate) -> Result<Bookmark> {
        field(self.transport.put(&format!("raindrop/{}", id), request)?, "item")
    }

    pub fn delete_bookmark(&mut self, id: i64) -> Result<()> {
        self.transport.delete(&format!("raindrop/{}", id), &json!({}))?;
        Ok(())
    }

    /// One page of bookmarks in `collection`. `term: None` lists everything.
    pub fn search_page(&mut self, collection: i64, term: Option<&str>, page: u32, per_page: u32) -> Result<Vec<Bookmark>> {
        let clauses: Vec<SearchClause> = term.map(|val| SearchClause { key: "word", val }).into_iter().collect();
        let query = vec![
            ("search".to_string(), serde_json::to_string(&clauses)?),
            ("perpage".to_string(), per_page.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        debug!(collection, page, per_page, "search page");
        field(self.transport.get(&format!("raindrops/{}", collection), query)?, "items")
    }
}

/// Decode `value[key]` into `T`.
fn field<T: DeserializeOwned>(mut value: Value, key: &str) -> Result<T> {
    let inner = value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| Error::Json(serde::de::Error::custom(format!("response has no `{}` field", key))))?;
    Ok(serde_json::from_value(inner)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionRef, SystemCollection};
    use crate::testing::{api_client, bookmark_json, json_response, path_of, query_param, FakeConnector};
    use crate::transport::{Body, Method, WireResponse};
    use tempfile::TempDir;

    #[test]
    fn test_search_page_wire_format() {
        let fake = FakeConnector::new(|_| json_response(200, json!({"items": [bookmark_json(1, "a", 12)]})));
        let mut api = api_client(&fake);

        let items = api.search_page(12, Some("apple"), 2, 50).unwrap();

        assert_eq!(items.len(), 1);
        let req = &fake.requests()[0];
        assert_eq!(path_of(req), "raindrops/12");
        assert_eq!(query_param(req, "page"), Some("2"));
        assert_eq!(query_param(req, "perpage"), Some("50"));
        let search: Value = serde_json::from_str(query_param(req, "search").unwrap()).unwrap();
        assert_eq!(search, json!([{"key": "word", "val": "apple"}]));
    }

    #[test]
    fn test_search_page_without_term_sends_empty_clause_list() {
        let fake = FakeConnector::new(|_| json_response(200, json!({"items": []})));
        let mut api = api_client(&fake);
        api.search_page(0, None, 0, 50).unwrap();
        assert_eq!(query_param(&fake.requests()[0], "search"), Some("[]"));
    }

    #[test]
    fn test_missing_items_field_is_decode_error() {
        let fake = FakeConnector::new(|_| json_response(200, json!({"result": true})));
        let mut api = api_client(&fake);
        assert!(matches!(api.root_collections(), Err(Error::Json(_))));
    }

    #[test]
    fn test_tags_path_with_and_without_collection() {
        let fake = FakeConnector::new(|_| json_response(200, json!({"items": [{"_id": "rust", "count": 2}]})));
        let mut api = api_client(&fake);
        let tags = api.tags(None).unwrap();
        api.tags(Some(5)).unwrap();
        assert_eq!(tags[0].name, "rust");
        let paths: Vec<String> = fake.calls().into_iter().map(|(_, p)| p).collect();
        assert_eq!(paths, vec!["tags".to_string(), "tags/5".to_string()]);
    }

    #[test]
    fn test_create_file_uploads_then_updates_attributes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paper.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let fake = FakeConnector::new(|req| match (req.method, path_of(req)) {
            (Method::Put, "raindrop/file") => json_response(200, json!({"item": bookmark_json(99, "paper.pdf", 3)})),
            (Method::Put, "raindrop/99") => json_response(200, json!({"item": bookmark_json(99, "Paper", 3)})),
            _ => WireResponse::new(404, ""),
        });
        let mut api = api_client(&fake);
        let attributes = BookmarkUpdate {
            title: Some("Paper".into()),
            ..Default::default()
        };

        let created = api.create_file(&path, "application/pdf", 3, &attributes).unwrap();

        assert_eq!(created.title, "Paper");
        let log = fake.requests();
        assert_eq!(log.len(), 2);
        match &log[0].body {
            Body::Multipart(part) => {
                assert_eq!(part.file_name, "paper.pdf");
                assert_eq!(part.content_type, "application/pdf");
                assert_eq!(part.fields, vec![("collectionId".to_string(), "3".to_string())]);
            }
            other => panic!("expected multipart, got {:?}", other),
        }
    }

    #[test]
    fn test_update_bookmark_moves_collection() {
        let fake = FakeConnector::new(|_| json_response(200, json!({"item": bookmark_json(4, "x", -1)})));
        let mut api = api_client(&fake);
        api.update_bookmark(
            4,
            &BookmarkUpdate {
                collection: Some(SystemCollection::Unsorted.into()),
                ..Default::default()
            },
        )
        .unwrap();
        let Body::Json(text) = &fake.requests()[0].body else {
            panic!("expected json body")
        };
        let sent: Value = serde_json::from_str(text).unwrap();
        assert_eq!(sent, json!({"collection": {"$id": -1}}));
    }

    #[test]
    fn test_collection_endpoints_wire_paths() {
        let fake = FakeConnector::new(|req| match (req.method, path_of(req)) {
            (Method::Get, "collection/12") => json_response(200, json!({"item": {"_id": 12, "title": "Books", "count": 4}})),
            (Method::Put, "collection/12") => json_response(200, json!({"item": {"_id": 12, "title": "Novels", "count": 4}})),
            (Method::Delete, "collection/12") => json_response(200, json!({"result": true})),
            _ => WireResponse::new(404, ""),
        });
        let mut api = api_client(&fake);

        assert_eq!(api.collection(12).unwrap().title, "Books");
        let renamed = api
            .update_collection(
                12,
                &CollectionUpdate {
                    title: Some("Novels".into()),
                    parent: Some(CollectionRef::new(3)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.title, "Novels");
        api.delete_collection(12).unwrap();

        let log = fake.requests();
        assert_eq!(log.len(), 3);
        let Body::Json(text) = &log[1].body else {
            panic!("expected json body")
        };
        let sent: Value = serde_json::from_str(text).unwrap();
        assert_eq!(sent, json!({"title": "Novels", "parent": {"$id": 3}}));
        assert_eq!(log[2].method, Method::Delete);
    }

    #[test]
    fn test_delete_tags_sends_names_in_body() {
        let fake = FakeConnector::new(|req| match (req.method, path_of(req)) {
            (Method::Delete, "tags") => json_response(200, json!({"result": true})),
            _ => WireResponse::new(404, ""),
        });
        let mut api = api_client(&fake);

        api.delete_tags(&["rust".to_string(), "jazz".to_string()]).unwrap();

        let Body::Json(text) = &fake.requests()[0].body else {
            panic!("expected json body")
        };
        let sent: Value = serde_json::from_str(text).unwrap();
        assert_eq!(sent, json!({"tags": ["rust", "jazz"]}));
    }

    #[test]
    fn test_single_bookmark_lookup() {
        let fake = FakeConnector::new(|req| match path_of(req) {
            "raindrop/42" => json_response(200, json!({"item": bookmark_json(42, "Answer", 7)})),
            _ => WireResponse::new(404, r#"{"errorMessage":"Not found"}"#),
        });
        let mut api = api_client(&fake);

        let found = api.bookmark(42).unwrap();
        assert_eq!(found.id, 42);
        assert_eq!(found.collection_id(), 7);
        assert_eq!(api.bookmark(43).unwrap_err().status(), Some(404));
    }
}

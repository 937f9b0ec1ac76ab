//! In-process fakes shared by the unit tests.

use crate::api::ApiClient;
use crate::credential::Credential;
use crate::transport::{Connector, Method, Transport, WireRequest, WireResponse};
use crate::Result;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub const TEST_BASE: &str = "https://api.test/rest/v1";
pub const TEST_REFRESH: &str = "https://auth.test/oauth/access_token";

type Handler = Box<dyn FnMut(&WireRequest) -> WireResponse>;

struct FakeState {
    handler: Handler,
    log: Vec<WireRequest>,
}

/// Connector answering from a closure and recording every request.
#[derive(Clone)]
pub struct FakeConnector {
    inner: Rc<RefCell<FakeState>>,
}

impl FakeConnector {
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(&WireRequest) -> WireResponse + 'static,
    {
        Self {
            inner: Rc::new(RefCell::new(FakeState {
                handler: Box::new(handler),
                log: Vec::new(),
            })),
        }
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.inner.borrow().log.clone()
    }

    /// `(method, path)` of every request against the API base.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.requests()
            .iter()
            .map(|r| (r.method, path_of(r).to_string()))
            .collect()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().log.clear();
    }
}

impl Connector for FakeConnector {
    fn send(&self, request: &WireRequest) -> Result<WireResponse> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        state.log.push(request.clone());
        Ok((state.handler)(request))
    }
}

pub fn path_of(request: &WireRequest) -> &str {
    request
        .url
        .strip_prefix(TEST_BASE)
        .unwrap_or(&request.url)
        .trim_start_matches('/')
}

pub fn query_param<'a>(request: &'a WireRequest, name: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

pub fn json_response(status: u16, body: Value) -> WireResponse {
    WireResponse::new(status, body.to_string())
}

pub fn api_client(fake: &FakeConnector) -> ApiClient {
    let transport = Transport::new(Box::new(fake.clone()), TEST_BASE, Credential::bearer("test-token"))
        .with_refresh_url(TEST_REFRESH);
    ApiClient::new(transport)
}

/// Bookmark JSON as the search endpoint returns it.
pub fn bookmark_json(id: i64, title: &str, collection: i64) -> Value {
    serde_json::json!({
        "_id": id,
        "title": title,
        "link": format!("https://example.com/{}", id),
        "collection": {"$id": collection},
        "tags": ["rust"],
        "created": "2024-01-01T00:00:00.000Z",
        "lastUpdate": "2024-01-02T00:00:00.000Z",
        "type": "link",
        "excerpt": "",
        "sort": id
    })
}

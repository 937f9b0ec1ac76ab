// Create screens: a bookmark from a URL, from a local file, or a batch of
// either described in a TOML file.

use super::{Flow, Screen, Session, Terminal};
use crate::models::{Bookmark, BookmarkUpdate, CollectionRef, NewBookmark, PleaseParse, SystemCollection};
use crate::{Error, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const CREATE_OPTIONS: &str = "url, file, bulk, back/.";
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Reachability check run before a URL is bookmarked.
pub trait LinkProbe {
    fn check(&self, url: &Url) -> std::result::Result<(), String>;
}

/// `HEAD` request with a short timeout.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl LinkProbe for HttpProbe {
    fn check(&self, url: &Url) -> std::result::Result<(), String> {
        match self.client.head(url.clone()).send() {
            Ok(resp) if resp.status().is_server_error() => Err(format!("HTTP {}", resp.status().as_u16())),
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => Err("no answer within 2 seconds".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// http(s) URL with a host.
pub(crate) fn parse_link(text: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(text.trim()).map_err(|e| format!("'{}' is not a valid URL ({})", text.trim(), e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(format!("'{}' must be an http or https URL", text.trim()));
    }
    Ok(url)
}

/// MIME type from the file's magic bytes; undetected UTF-8 is plain text.
pub(crate) fn sniff_content_type(bytes: &[u8]) -> String {
    match infer::get(bytes) {
        Some(kind) => kind.mime_type().to_string(),
        None if std::str::from_utf8(bytes).is_ok() => "text/plain".to_string(),
        None => "application/octet-stream".to_string(),
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Source {
    Link(Url),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CreateRequest {
    pub source: Source,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Collection title; `None` files into Unsorted.
    pub collection: Option<String>,
    pub tags: Vec<String>,
}

impl CreateRequest {
    fn new(source: Source) -> Self {
        Self {
            source,
            title: None,
            description: None,
            collection: None,
            tags: Vec::new(),
        }
    }

    fn describe(&self) -> String {
        match &self.source {
            Source::Link(url) => url.to_string(),
            Source::File(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkFile {
    #[serde(default)]
    requests: Vec<BulkEntry>,
}

#[derive(Debug, Deserialize)]
struct BulkEntry {
    url: Option<String>,
    #[serde(alias = "file_path")]
    file: Option<String>,
    title: Option<String>,
    description: Option<String>,
    collection: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl BulkEntry {
    fn into_request(self) -> std::result::Result<CreateRequest, String> {
        let source = match (self.url, self.file) {
            (Some(url), None) => Source::Link(parse_link(&url)?),
            (None, Some(file)) => Source::File(expand_home(&file)),
            _ => return Err("each request needs exactly one of 'url' or 'file'".to_string()),
        };
        Ok(CreateRequest {
            title: self.title,
            description: self.description,
            collection: self.collection,
            tags: self.tags,
            ..CreateRequest::new(source)
        })
    }
}

impl<T: Terminal> Session<T> {
    pub(super) fn create_menu(&mut self) -> Screen {
        self.term.say(CREATE_OPTIONS);
        let Some(line) = self.ask(&["create"]) else {
            return Screen::Exit;
        };
        match line.trim().to_lowercase().as_str() {
            "url" | "u" => self.create_from_link(),
            "file" | "f" => self.create_from_file(),
            "bulk" => self.create_bulk(),
            "back" | "b" | "." | "q" => Screen::TopMenu,
            "?" | "help" => {
                self.term.say("url  : bookmark a web page");
                self.term.say("file : upload a local file as a bookmark");
                self.term.say("bulk : create everything listed in a TOML file of [[requests]]");
                Screen::Create
            }
            "" => Screen::Create,
            other => {
                self.term.say(&format!("Sorry, '{}' must be one of {}.", other, CREATE_OPTIONS));
                Screen::Create
            }
        }
    }

    fn create_from_link(&mut self) -> Screen {
        let url = loop {
            let text = match self.ask_field(&["create", "url", "link?"]) {
                Flow::Quit => return Screen::Exit,
                Flow::Cancel => return Screen::Create,
                Flow::Continue(t) if t.is_empty() => continue,
                Flow::Continue(t) => t,
            };
            match self.check_link(&text) {
                Ok(url) => break url,
                Err(reason) => self.term.say(&format!("Sorry, {}.", reason)),
            }
        };
        self.finish_interactive(CreateRequest::new(Source::Link(url)), "url")
    }

    fn create_from_file(&mut self) -> Screen {
        let path = loop {
            let text = match self.ask_field(&["create", "file", "path?"]) {
                Flow::Quit => return Screen::Exit,
                Flow::Cancel => return Screen::Create,
                Flow::Continue(t) if t.is_empty() => continue,
                Flow::Continue(t) => t,
            };
            let path = expand_home(&text);
            if path.is_file() {
                break path;
            }
            self.term.say(&format!("Sorry, no file with name '{}' exists.", text));
        };
        self.finish_interactive(CreateRequest::new(Source::File(path)), "file")
    }

    /// Ask for the remaining attributes and create the bookmark. A
    /// recoverable failure asks for the attributes again.
    fn finish_interactive(&mut self, mut request: CreateRequest, kind: &str) -> Screen {
        loop {
            request = match self.complete_request(request, kind) {
                Flow::Quit => return Screen::Exit,
                Flow::Cancel => return Screen::Create,
                Flow::Continue(r) => r,
            };
            self.term.busy("Creating bookmark...");
            let created = self.submit(&request);
            self.term.idle();
            match created {
                Err(e) if e.is_recoverable() => {
                    self.report(&format!("couldn't create {}", request.describe()), &e);
                    request = CreateRequest::new(request.source);
                }
                created => {
                    self.report_created(&request, created);
                    return Screen::Create;
                }
            }
        }
    }

    fn check_link(&self, text: &str) -> std::result::Result<Url, String> {
        let url = parse_link(text)?;
        self.probe
            .check(&url)
            .map_err(|e| format!("'{}' isn't reachable: {}", url, e))?;
        Ok(url)
    }

    /// Ask for the attributes shared by every kind of bookmark, then confirm.
    fn complete_request(&mut self, mut request: CreateRequest, kind: &str) -> Flow<CreateRequest> {
        let optional = |s: String| if s.is_empty() { None } else { Some(s) };

        match self.ask_field(&["create", kind, "title?"]) {
            Flow::Continue(t) => request.title = optional(t),
            Flow::Cancel => return Flow::Cancel,
            Flow::Quit => return Flow::Quit,
        }
        match self.ask_field(&["create", kind, "description?"]) {
            Flow::Continue(d) => request.description = optional(d),
            Flow::Cancel => return Flow::Cancel,
            Flow::Quit => return Flow::Quit,
        }
        match self.ask_field(&["create", kind, "collection?"]) {
            Flow::Continue(c) => request.collection = optional(c),
            Flow::Cancel => return Flow::Cancel,
            Flow::Quit => return Flow::Quit,
        }
        loop {
            let line = match self.ask_field(&["create", kind, "tag(s)?"]) {
                Flow::Continue(line) => line,
                Flow::Cancel => return Flow::Cancel,
                Flow::Quit => return Flow::Quit,
            };
            let tags = super::search::parse_collection_list(&line);
            match tags.iter().find(|t| !self.state.has_tag(t)) {
                Some(unknown) => self.term.say(&format!("Sorry, tag '{}' does not currently exist.", unknown)),
                None => {
                    request.tags = tags;
                    break;
                }
            }
        }

        let collection = request
            .collection
            .clone()
            .unwrap_or_else(|| SystemCollection::Unsorted.title().to_string());
        self.term.say(&format!("{} -> {}", request.describe(), collection));
        match self.term.confirm("Create this bookmark?") {
            None => Flow::Quit,
            Some(false) => Flow::Cancel,
            Some(true) => Flow::Continue(request),
        }
    }

    /// Send one create request, creating its collection first if needed.
    fn submit(&mut self, request: &CreateRequest) -> Result<Bookmark> {
        let collection = match request.collection.as_deref() {
            Some(title) => self.state.get_or_create_collection(&mut self.api, title)?.id,
            None => SystemCollection::Unsorted.id(),
        };
        let tags = if request.tags.is_empty() {
            None
        } else {
            Some(request.tags.clone())
        };

        let created = match &request.source {
            Source::Link(url) => self.api.create_link(&NewBookmark {
                link: url.to_string(),
                title: request.title.clone(),
                excerpt: request.description.clone(),
                tags,
                collection: Some(CollectionRef::new(collection)),
                please_parse: Some(PleaseParse {}),
                ..Default::default()
            })?,
            Source::File(path) => {
                let content_type = sniff_content_type(&std::fs::read(path)?);
                let attributes = BookmarkUpdate {
                    title: request.title.clone(),
                    excerpt: request.description.clone(),
                    tags,
                    ..Default::default()
                };
                self.api.create_file(path, &content_type, collection, &attributes)?
            }
        };
        info!(id = created.id, collection, "created bookmark");
        Ok(created)
    }

    fn report_created(&mut self, request: &CreateRequest, created: Result<Bookmark>) {
        match created {
            Ok(bookmark) => {
                let title = if bookmark.title.is_empty() {
                    request.describe()
                } else {
                    bookmark.title.clone()
                };
                let collection = self.collection_title(bookmark.collection_id());
                self.term.say(&format!("Created '{}' in {}.", title, collection));
            }
            Err(e) => {
                self.report(&format!("couldn't create {}", request.describe()), &e);
            }
        }
    }

    fn create_bulk(&mut self) -> Screen {
        let (path, file) = loop {
            let text = match self.ask_field(&["create", "bulk", "TOML file?"]) {
                Flow::Quit => return Screen::Exit,
                Flow::Cancel => return Screen::Create,
                Flow::Continue(t) if t.is_empty() => continue,
                Flow::Continue(t) => t,
            };
            let path = expand_home(&text);
            match load_bulk(&path) {
                Ok(file) => break (path, file),
                Err(e) => self.term.say(&format!("Sorry, {}", e)),
            }
        };

        let mut requests = Vec::new();
        for (n, entry) in file.requests.into_iter().enumerate() {
            match entry.into_request().and_then(|r| self.validate_bulk(r)) {
                Ok(request) => requests.push(request),
                Err(reason) => self.term.say(&format!("Skipping request #{}: {}.", n + 1, reason)),
            }
        }
        if requests.is_empty() {
            self.term.say(&format!("Nothing to create from {}.", path.display()));
            return Screen::Create;
        }

        match self.term.confirm(&format!("Create {} bookmark(s)?", requests.len())) {
            None => return Screen::Exit,
            Some(false) => return Screen::Create,
            Some(true) => {}
        }
        for (n, request) in requests.iter().enumerate() {
            if n > 0 && !self.bulk_pause.is_zero() {
                std::thread::sleep(self.bulk_pause);
            }
            self.term.busy(&format!("Creating {}...", request.describe()));
            let created = self.submit(request);
            self.term.idle();
            if let Err(e) = &created {
                warn!(request = %request.describe(), error = %e, "bulk create failed");
            }
            self.report_created(request, created);
        }
        Screen::Create
    }

    fn validate_bulk(&self, request: CreateRequest) -> std::result::Result<CreateRequest, String> {
        match &request.source {
            Source::File(path) if !path.is_file() => {
                return Err(format!("no file with name '{}' exists", path.display()));
            }
            Source::Link(url) => {
                self.probe
                    .check(url)
                    .map_err(|e| format!("'{}' isn't reachable: {}", url, e))?;
            }
            Source::File(_) => {}
        }
        if let Some(tag) = request.tags.iter().find(|t| !self.state.has_tag(t)) {
            return Err(format!("tag '{}' does not currently exist", tag));
        }
        Ok(request)
    }
}

fn load_bulk(path: &Path) -> Result<BulkFile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Validation(format!("unable to read '{}': {}", path.display(), e)))?;
    toml::from_str(&text).map_err(|e| Error::Validation(format!("'{}' is not a valid request file: {}", path.display(), e)))
}

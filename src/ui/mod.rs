// UI layer: the interactive shell. `Session` owns the API client, the local
// collection snapshot and the current search results, and moves between
// screens one prompt at a time. End of input (Ctrl-D) or an interrupt at any
// prompt ends the session with a goodbye message.

mod create;
mod manage;
mod search;
pub mod terminal;

pub use create::{HttpProbe, LinkProbe};
pub use terminal::{ConsoleTerminal, Terminal};

use crate::api::ApiClient;
use crate::models::{Bookmark, SystemCollection, User};
use crate::search::{SearchAggregator, SearchQuery, SearchResultSet};
use crate::state::{LocalState, RefreshOutcome};
use crate::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Screens of the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    TopMenu,
    SearchPrompt,
    SearchResults,
    ItemDetail,
    Create,
    Manage,
    Exit,
}

/// Result of a sub-prompt inside a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<T> {
    Continue(T),
    /// The user typed "." to back out.
    Cancel,
    /// End of input or interrupt.
    Quit,
}

pub struct Session<T: Terminal> {
    api: ApiClient,
    state: LocalState,
    aggregator: SearchAggregator,
    term: T,
    probe: Box<dyn LinkProbe>,
    user: Option<User>,
    screen: Screen,
    last_query: Option<SearchQuery>,
    results: SearchResultSet,
    bulk_pause: Duration,
}

impl<T: Terminal> Session<T> {
    pub fn new(api: ApiClient, state: LocalState, term: T, probe: Box<dyn LinkProbe>) -> Self {
        Self {
            api,
            state,
            aggregator: SearchAggregator::default(),
            term,
            probe,
            user: None,
            screen: Screen::TopMenu,
            last_query: None,
            results: SearchResultSet::default(),
            bulk_pause: Duration::from_secs(1),
        }
    }

    /// Replace the default search aggregator, e.g. to change the page size.
    pub fn with_aggregator(mut self, aggregator: SearchAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Pause between requests of a bulk create.
    pub fn with_bulk_pause(mut self, pause: Duration) -> Self {
        self.bulk_pause = pause;
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn results(&self) -> &SearchResultSet {
        &self.results
    }

    pub fn state(&self) -> &LocalState {
        &self.state
    }

    pub fn terminal(&self) -> &T {
        &self.term
    }

    /// Identify the token's user and bring the collection snapshot up to date.
    pub fn login(&mut self, force_refresh: bool) -> Result<()> {
        self.term.busy("Logging into Raindrop...");
        let user = self.api.user();
        self.term.idle();
        let user = user?;
        info!(user = %user.full_name, "logged in");
        self.user = Some(user);

        self.term.busy("Refreshing Raindrop status...");
        let outcome = self.state.refresh(&mut self.api, force_refresh);
        self.term.idle();
        if outcome? == RefreshOutcome::Rebuilt {
            info!(collections = self.state.collections().len(), "collection snapshot rebuilt");
        }
        Ok(())
    }

    /// Run screens until the user leaves.
    pub fn run(&mut self) -> Result<()> {
        self.term.say("search, create, manage or exit; '?' for help, Ctrl-D or '.' to exit.");
        while self.screen != Screen::Exit {
            self.screen = self.step();
        }
        self.term.say("Thanks, Gracias, Merci, Danke, ありがとう, Köszönöm...!");
        Ok(())
    }

    /// Handle one prompt of the current screen and return the next screen.
    pub fn step(&mut self) -> Screen {
        match self.screen {
            Screen::TopMenu => self.top_menu(),
            Screen::SearchPrompt => self.search_prompt(),
            Screen::SearchResults => self.search_results(),
            Screen::ItemDetail => self.item_detail(),
            Screen::Create => self.create_menu(),
            Screen::Manage => self.manage_menu(),
            Screen::Exit => Screen::Exit,
        }
    }

    fn top_menu(&mut self) -> Screen {
        let options = ["search", "create", "manage", "exit/."];
        self.term.say(&options.join(", "));
        let Some(line) = self.ask(&[]) else {
            return Screen::Exit;
        };
        match line.trim().to_lowercase().as_str() {
            "exit" | "e" | "quit" | "q" | "." => Screen::Exit,
            "search" | "s" => Screen::SearchPrompt,
            "create" | "c" => Screen::Create,
            "manage" | "m" => Screen::Manage,
            "?" | "help" | "h" => {
                self.term.say("search : find bookmarks by term across one, many or all collections");
                self.term.say("create : add a bookmark from a URL, a file, or a bulk TOML file");
                self.term.say("manage : show status, collections and tags, refresh the local snapshot");
                self.term.say("exit   : leave (Ctrl-D works at any prompt)");
                Screen::TopMenu
            }
            "" => Screen::TopMenu,
            other => {
                self.term.say(&format!("Sorry, '{}' must be one of {}.", other, options.join(", ")));
                Screen::TopMenu
            }
        }
    }

    /// Prompt rendered from nested levels, e.g. `search > term(s)?`.
    fn ask(&mut self, levels: &[&str]) -> Option<String> {
        let prompt = if levels.is_empty() {
            ">".to_string()
        } else {
            levels.join(" > ")
        };
        self.term.read_line(&prompt)
    }

    /// Tell the user what went wrong. Returns true when the error is worth
    /// asking again for; anything else ends the current sub-flow.
    fn report(&mut self, context: &str, error: &Error) -> bool {
        self.term.say(&format!("Sorry, {}: {}", context, error));
        let recoverable = error.is_recoverable();
        if !recoverable {
            warn!(context, error = %error, "giving up on the current prompt");
        }
        recoverable
    }

    /// Ask for a value where "." backs out.
    fn ask_field(&mut self, levels: &[&str]) -> Flow<String> {
        match self.ask(levels) {
            None => Flow::Quit,
            Some(line) if line.trim() == "." => Flow::Cancel,
            Some(line) => Flow::Continue(line.trim().to_string()),
        }
    }

    fn collection_title(&self, id: i64) -> String {
        if let Ok(found) = self.state.find_collection_by_id(id) {
            return found.title.clone();
        }
        match SystemCollection::from_id(id) {
            Some(system) => system.title().to_string(),
            None => format!("#{}", id),
        }
    }

    fn show_bookmark(&mut self, bookmark: &Bookmark) {
        let mut rows: Vec<(&str, String)> = vec![
            ("Collection", self.collection_title(bookmark.collection_id())),
            ("Title", bookmark.title.clone()),
        ];
        if let Some(kind) = &bookmark.kind {
            rows.push(("Type", format!("{:?}", kind).to_lowercase()));
        }
        if let Some(excerpt) = bookmark.excerpt.as_deref().filter(|e| !e.is_empty()) {
            rows.push(("Description", excerpt.to_string()));
        }
        if !bookmark.tags.is_empty() {
            rows.push(("Tags", bookmark.tags.join(", ")));
        }
        let created = bookmark.created.map(|c| c.format("%Y-%m-%d %H:%M:%S").to_string());
        let updated = bookmark.last_update.map(|u| u.format("%Y-%m-%d %H:%M:%S").to_string());
        if let Some(created) = &created {
            rows.push(("Created", created.clone()));
        }
        if let Some(updated) = updated.filter(|u| Some(u) != created.as_ref()) {
            rows.push(("Updated", updated));
        }
        if let Some(link) = &bookmark.link {
            rows.push(("Link", link.clone()));
        }
        for (label, value) in rows {
            self.term.say(&format!("{:<12} {}", label, value));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::session;
    use super::*;
    use crate::testing::{json_response, path_of, FakeConnector};
    use crate::transport::WireResponse;
    use serde_json::json;

    fn minimal_backend() -> FakeConnector {
        FakeConnector::new(|req| match path_of(req) {
            "user" => json_response(200, json!({"user": {"_id": 1, "fullName": "Ada Lovelace"}})),
            "user/stats" => json_response(
                200,
                json!({"items": [{"_id": -1, "count": 0}], "meta": {"changedBookmarksDate": "2024-01-01T00:00:00Z"}}),
            ),
            "collections" | "collections/childrens" | "tags" => json_response(200, json!({"items": []})),
            _ => WireResponse::new(404, ""),
        })
    }

    #[test]
    fn test_exit_commands_end_session() {
        for exit in ["exit", "q", ".", "E"] {
            let fake = minimal_backend();
            let mut s = session(&fake, &[exit]);
            s.run().unwrap();
            assert_eq!(s.screen(), Screen::Exit);
            assert!(s.terminal().transcript().contains("Thanks"));
        }
    }

    #[test]
    fn test_end_of_input_at_top_menu_is_graceful() {
        let fake = minimal_backend();
        let mut s = session(&fake, &[]);
        s.run().unwrap();
        assert_eq!(s.screen(), Screen::Exit);
    }

    #[test]
    fn test_top_menu_routes_commands() {
        let fake = minimal_backend();
        let mut s = session(&fake, &["s", "bogus", "m", "c", "?"]);
        assert_eq!(s.step(), Screen::SearchPrompt);
        s.screen = Screen::TopMenu;
        assert_eq!(s.step(), Screen::TopMenu);
        assert!(s.terminal().transcript().contains("Sorry, 'bogus'"));
        assert_eq!(s.step(), Screen::Manage);
        s.screen = Screen::TopMenu;
        assert_eq!(s.step(), Screen::Create);
        s.screen = Screen::TopMenu;
        assert_eq!(s.step(), Screen::TopMenu);
    }

    #[test]
    fn test_login_fetches_user_and_snapshot() {
        let fake = minimal_backend();
        let mut s = session(&fake, &[]);
        s.login(false).unwrap();
        assert_eq!(s.user.as_ref().map(|u| u.full_name.as_str()), Some("Ada Lovelace"));
        // Snapshot was already current, so only the user and stats calls ran.
        let paths: Vec<String> = fake.calls().into_iter().map(|(_, p)| p).collect();
        assert_eq!(paths, vec!["user".to_string(), "user/stats".to_string()]);
    }

    #[test]
    fn test_login_failure_propagates() {
        let fake = FakeConnector::new(|_| WireResponse::new(401, r#"{"errorMessage":"Incorrect access_token"}"#));
        let mut s = Session::new(
            crate::testing::api_client(&fake),
            LocalState::new(None),
            crate::ui::terminal::ScriptedTerminal::new(&[]),
            Box::new(super::test_support::Reachable),
        );
        let err = s.login(false).unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}

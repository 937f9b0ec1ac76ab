// Search screens: prompting for a query, the result list, and the detail
// view of a selected bookmark.

use super::{Flow, Screen, Session, Terminal};
use crate::models::{BookmarkUpdate, CollectionRef};
use crate::search::{SearchQuery, WILDCARD};
use tracing::debug;

const RESULT_OPTIONS: &str = "#, list, requery, back/.";
const DETAIL_OPTIONS: &str = "view, open, edit, delete, list, back/.";

/// Split a collection list. Commas separate titles that contain spaces,
/// otherwise whitespace does; a trailing "." only ends the list.
pub(crate) fn parse_collection_list(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_suffix('.').map(str::trim_end).unwrap_or(line);
    let parts: Vec<&str> = if line.contains(',') {
        line.split(',').collect()
    } else {
        line.split_whitespace().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl<T: Terminal> Session<T> {
    pub(super) fn search_prompt(&mut self) -> Screen {
        let term = loop {
            match self.ask_field(&["search", "term(s)?"]) {
                Flow::Quit => return Screen::Exit,
                Flow::Cancel => return self.leave_search(),
                Flow::Continue(t) if t == "q" => return self.leave_search(),
                Flow::Continue(t) if t == "?" => self.search_help(),
                Flow::Continue(t) if t.is_empty() => {}
                Flow::Continue(t) => break t,
            }
        };

        let collections = match self.ask_field(&["search", "collection(s)?"]) {
            Flow::Quit => return Screen::Exit,
            Flow::Cancel => return self.leave_search(),
            Flow::Continue(line) => parse_collection_list(&line),
        };

        let query = SearchQuery::new(term, collections);
        if let Err(e) = query.validate() {
            return if self.report("invalid search", &e) {
                Screen::SearchPrompt
            } else {
                self.leave_search()
            };
        }
        self.run_query(query)
    }

    /// Run `query`, replacing the current results.
    fn run_query(&mut self, query: SearchQuery) -> Screen {
        self.term.busy(&format!("{}...", query.describe()));
        let outcome = self.aggregator.search(&mut self.api, &self.state, &query);
        self.term.idle();
        self.last_query = Some(query.clone());

        let results = match outcome {
            Ok(results) => results,
            Err(e) => {
                self.results = Default::default();
                return if self.report("the search failed", &e) {
                    Screen::SearchPrompt
                } else {
                    self.leave_search()
                };
            }
        };
        for skipped in results.skipped() {
            self.term.say(&format!("Skipped '{}': {}", skipped.title, skipped.reason));
        }
        self.results = results;

        if self.results.is_empty() {
            let scope = match query.collections.len() {
                0 => " across ALL collections.".to_string(),
                1 => format!(" in collection: '{}'.", query.collections[0]),
                n => format!(" across {} collections.", n),
            };
            self.term.say(&format!("Sorry, nothing found for search: '{}'{}", query.term, scope));
            return Screen::SearchPrompt;
        }
        self.list_results();
        Screen::SearchResults
    }

    /// Results don't outlive the search screens.
    fn leave_search(&mut self) -> Screen {
        self.results = Default::default();
        self.last_query = None;
        Screen::TopMenu
    }

    fn requery(&mut self) -> Screen {
        match self.last_query.clone() {
            Some(query) => self.run_query(query),
            None => Screen::SearchPrompt,
        }
    }

    fn list_results(&mut self) {
        let show_collection = self.results.collection_count() > 1;
        let rows: Vec<String> = self
            .results
            .items()
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let mut tags = b.tags.clone();
                tags.sort();
                let tags: Vec<String> = tags.iter().map(|t| format!("#{}", t)).collect();
                let collection = if show_collection {
                    format!("{:<16} ", self.collection_title(b.collection_id()))
                } else {
                    String::new()
                };
                format!("{:>4}  {}{}  {}", i + 1, collection, b.title, tags.join(" "))
                    .trim_end()
                    .to_string()
            })
            .collect();
        for row in rows {
            self.term.say(&row);
        }
    }

    pub(super) fn search_results(&mut self) -> Screen {
        self.term.say(RESULT_OPTIONS);
        let suffix = self.results.prompt_suffix();
        let Some(line) = self.ask(&["search results", &suffix]) else {
            return Screen::Exit;
        };
        let line = line.trim().to_lowercase();
        if let Ok(number) = line.parse::<usize>() {
            return self.select(number, Screen::SearchResults);
        }
        match line.as_str() {
            "back" | "b" | "." => {
                self.results.clear_selection();
                Screen::SearchPrompt
            }
            "q" | "quit" => self.leave_search(),
            "list" | "l" => {
                self.list_results();
                Screen::SearchResults
            }
            "requery" | "r" => self.requery(),
            "view" | "v" | "open" | "o" | "edit" | "e" | "delete" | "d" => match self.results.selected_index() {
                Some(_) => self.detail_command(&line),
                None => {
                    self.term.say("Select a result by number first.");
                    Screen::SearchResults
                }
            },
            "" => Screen::SearchResults,
            other => {
                self.term.say(&format!("Sorry, '{}' must be a result number or one of {}.", other, RESULT_OPTIONS));
                Screen::SearchResults
            }
        }
    }

    fn select(&mut self, number: usize, stay: Screen) -> Screen {
        match self.results.select(number) {
            Ok(bookmark) => {
                let bookmark = bookmark.clone();
                self.show_bookmark(&bookmark);
                Screen::ItemDetail
            }
            Err(e) => {
                self.term.say(&e.to_string());
                stay
            }
        }
    }

    pub(super) fn item_detail(&mut self) -> Screen {
        self.term.say(DETAIL_OPTIONS);
        let suffix = self.results.prompt_suffix();
        let Some(line) = self.ask(&["search results", &suffix]) else {
            return Screen::Exit;
        };
        let line = line.trim().to_lowercase();
        if let Ok(number) = line.parse::<usize>() {
            return self.select(number, Screen::ItemDetail);
        }
        match line.as_str() {
            "back" | "b" | "." => {
                self.results.clear_selection();
                Screen::SearchResults
            }
            "q" | "quit" => self.leave_search(),
            "list" | "l" => {
                self.list_results();
                Screen::ItemDetail
            }
            "" => Screen::ItemDetail,
            command => self.detail_command(command),
        }
    }

    /// Commands acting on the selected bookmark.
    fn detail_command(&mut self, command: &str) -> Screen {
        let Some(bookmark) = self.results.selected().cloned() else {
            return Screen::SearchResults;
        };
        match command {
            "view" | "v" => {
                self.show_bookmark(&bookmark);
                Screen::ItemDetail
            }
            "open" | "o" => {
                match bookmark.link.as_deref() {
                    Some(link) => {
                        if let Err(e) = self.term.open_url(link) {
                            self.term.say(&format!("Sorry, couldn't open {}: {}", link, e));
                        }
                    }
                    None => self.term.say("Sorry, this bookmark has no link."),
                }
                Screen::ItemDetail
            }
            "edit" | "e" => self.edit(bookmark.id),
            "delete" | "d" => {
                let Some(confirmed) = self.term.confirm(&format!("Delete '{}'?", bookmark.title)) else {
                    return Screen::Exit;
                };
                if !confirmed {
                    return Screen::ItemDetail;
                }
                self.term.busy("Deleting bookmark...");
                let deleted = self.api.delete_bookmark(bookmark.id);
                self.term.idle();
                match deleted {
                    Ok(()) => {
                        debug!(id = bookmark.id, "deleted bookmark");
                        self.term.say(&format!("Deleted '{}'.", bookmark.title));
                        self.requery()
                    }
                    Err(e) => {
                        self.report("couldn't delete", &e);
                        Screen::ItemDetail
                    }
                }
            }
            other => {
                self.term.say(&format!("Sorry, '{}' must be one of {}.", other, DETAIL_OPTIONS));
                Screen::ItemDetail
            }
        }
    }

    fn edit(&mut self, id: i64) -> Screen {
        let field = loop {
            match self.ask_field(&["edit", "title, description, tags or collection?"]) {
                Flow::Quit => return Screen::Exit,
                Flow::Cancel => return Screen::ItemDetail,
                Flow::Continue(f) => match f.to_lowercase().as_str() {
                    "title" | "t" => break "title",
                    "description" | "d" => break "description",
                    "tags" | "tag" => break "tags",
                    "collection" | "c" => break "collection",
                    _ => self.term.say("Sorry, must be one of title, description, tags, collection."),
                },
            }
        };
        let update = loop {
            let value = match self.ask_field(&["edit", field, "new value?"]) {
                Flow::Quit => return Screen::Exit,
                Flow::Cancel => return Screen::ItemDetail,
                Flow::Continue(v) => v,
            };
            let mut update = BookmarkUpdate::default();
            match field {
                "title" => update.title = Some(value),
                "description" => update.excerpt = Some(value),
                "tags" => {
                    let tags = parse_collection_list(&value);
                    if let Some(unknown) = tags.iter().find(|t| !self.state.has_tag(t)) {
                        self.term.say(&format!("Sorry, tag '{}' does not currently exist.", unknown));
                        continue;
                    }
                    update.tags = Some(tags);
                }
                _ => match self.state.get_or_create_collection(&mut self.api, &value) {
                    Ok(collection) => update.collection = Some(CollectionRef::new(collection.id)),
                    Err(e) => {
                        if self.report("couldn't use that collection", &e) {
                            continue;
                        }
                        return Screen::ItemDetail;
                    }
                },
            }
            break update;
        };

        self.term.busy("Updating bookmark...");
        let updated = self.api.update_bookmark(id, &update);
        self.term.idle();
        match updated {
            Ok(bookmark) => {
                self.term.say(&format!("Updated '{}'.", bookmark.title));
                self.requery()
            }
            Err(e) => {
                self.report("couldn't update", &e);
                Screen::ItemDetail
            }
        }
    }

    fn search_help(&mut self) {
        let rows = [
            (WILDCARD, "Everything (needs at least one collection)"),
            ("apple iphone", "Items containing these words"),
            ("#coffee", "Items with a tag"),
            ("\"superman vs. batman\"", "Exact phrase"),
            ("-superman -#coffee", "Exclude a word or tag"),
            ("created:>2021-07-15", "Created after a date (also lastUpdate:)"),
            ("link:dropbox", "Word in the URL"),
            ("type:article", "By type: link, article, image, video, document, audio"),
        ];
        for (example, meaning) in rows {
            self.term.say(&format!("{:<24} {}", example, meaning));
        }
        self.term.say("Collections: blank for all, titles separated by spaces or commas, '.' to go back.");
    }
}

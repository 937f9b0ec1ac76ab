// Manage screen: account status and the local collection/tag snapshot.

use super::{Screen, Session, Terminal};
use chrono::Utc;

const MANAGE_OPTIONS: &str = "status, collections, tags, refresh, back/.";

fn age(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

impl<T: Terminal> Session<T> {
    pub(super) fn manage_menu(&mut self) -> Screen {
        self.term.say(MANAGE_OPTIONS);
        let Some(line) = self.ask(&["manage"]) else {
            return Screen::Exit;
        };
        match line.trim().to_lowercase().as_str() {
            "status" | "s" => self.show_status(),
            "collections" | "c" => {
                let rows: Vec<String> = self
                    .state
                    .collections()
                    .iter()
                    .map(|c| format!("{:>6}  {}", c.item_count, c.title))
                    .collect();
                for row in rows {
                    self.term.say(&row);
                }
            }
            "tags" | "t" => {
                let tags = self.state.tags().join(", ");
                self.term.say(if tags.is_empty() { "(no tags)" } else { tags.as_str() });
            }
            "refresh" | "r" => {
                self.term.busy("Refreshing Raindrop status...");
                let outcome = self.state.refresh(&mut self.api, true);
                self.term.idle();
                match outcome {
                    Ok(_) => self.term.say(&format!(
                        "Refreshed: {} collections, {} tags.",
                        self.state.collections().len(),
                        self.state.tags().len()
                    )),
                    Err(e) => self.term.say(&format!("Sorry, the refresh failed: {}", e)),
                }
            }
            "back" | "b" | "." | "q" => return Screen::TopMenu,
            "?" | "help" => {
                self.term.say("status      : who you are and what the local snapshot holds");
                self.term.say("collections : every collection with its bookmark count");
                self.term.say("tags        : every tag in use");
                self.term.say("refresh     : rebuild the snapshot from Raindrop now");
            }
            "" => {}
            other => self.term.say(&format!("Sorry, '{}' must be one of {}.", other, MANAGE_OPTIONS)),
        }
        Screen::Manage
    }

    fn show_status(&mut self) {
        let mut rows = Vec::new();
        if let Some(user) = &self.user {
            rows.push(format!("User        {}", user.full_name));
        }
        rows.push(format!("Bookmarks   {}", self.state.total_bookmarks()));
        rows.push(format!("Collections {}", self.state.collection_titles(true).len()));
        rows.push(format!("Tags        {}", self.state.tags().len()));
        if let Some(at) = self.state.refreshed_at() {
            rows.push(format!("Refreshed   {}", age(Utc::now() - at)));
        }
        let limits = self.api.rate_limit();
        if let (Some(remaining), Some(limit)) = (limits.remaining, limits.limit) {
            rows.push(format!("Rate limit  {}/{} requests left", remaining, limit));
        }
        for row in rows {
            self.term.say(&row);
        }
    }
}

// Library root
// -----------
// The library holds everything the `raindrop-shell` binary needs, so the
// client and the shell can be tested without a terminal or a network.
//
// Module responsibilities:
// - `transport`, `credential`: authenticated HTTP with token refresh and
//   rate-limit bookkeeping, behind the `Connector` seam.
// - `api`, `models`: typed Raindrop.io endpoints and records.
// - `state`: the collection/tag snapshot and its on-disk copy.
// - `search`: paginated search across one, many or all collections.
// - `ui`: the interactive shell, behind the `Terminal` seam.
// - `config`, `logging`, `error`: the ambient pieces shared by all of them.
pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod logging;
pub mod models;
pub mod search;
pub mod state;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

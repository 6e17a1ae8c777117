//! msearch session façade: one active dataset, one query, one published view.
//!
//! Frontends talk to a session through commands and read it through `watch`
//! channels. All mutation happens on the session task; fetches and index
//! builds run as their own tasks and report back, and their results are
//! installed only if they still belong to the latest load.

#![forbid(unsafe_code)]

mod pagination;
mod scheduler;
mod session;

pub use pagination::Pagination;
pub use scheduler::Debouncer;
pub use session::{spawn_session, Command, SessionClosed, SessionHandle, View};

pub use msearch_persist::PersistedState;
pub use msearch_search::ResultSet;

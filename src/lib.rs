/// Study Panel - password-gated study documents, exams and a tagged blog
///
/// Content lives in a document store with live subscriptions; binary assets
/// go to a media host. The panel keeps typed local snapshots of every
/// collection, gates documents behind per-document passwords and exposes the
/// whole thing as a headless session and a JSON API.

pub mod access;
pub mod api;
pub mod auth;
pub mod browse;
pub mod compose;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod media;
pub mod models;
pub mod panel;
pub mod rate_limit;
pub mod server;
pub mod service;
pub mod store;
pub mod sync;

pub use context::AppContext;
pub use error::{PanelError, PanelResult};

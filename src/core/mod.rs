// src/core/mod.rs

// The `core` module holds everything between a parsed client request and the
// outside world. The server only talks to `dispatcher` and `emitter`.

/// Request, event and record types shared by every job.
pub mod models;

/// The error taxonomy jobs report to their origin.
pub mod error;

/// Domain and IPv4 grammars guarding every external call.
pub mod validator;

/// Spawning external tools, streamed or bounded.
pub mod runner;

/// Outbound HTTP requests and WHOIS lookups.
pub mod client;
pub mod whois;

/// Per-session delivery of update events.
pub mod emitter;

/// SQLite persistence for discovered subdomains.
pub mod store;

/// One handler per job kind.
pub mod jobs;

/// Validation, task isolation and error reporting around the handlers.
pub mod dispatcher;

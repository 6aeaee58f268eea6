//! Engine-level tests against the in-memory store

mod cli_parse;
mod migration_flow;
mod support;

//! Durable local store for the OrderNet node.
//!
//! A single SQLite database file (default `<home>/.ordernet/ordernet.db`)
//! holds the identity, observed peers, channels with their group keys,
//! message history, vouches, and join requests. All writes on the
//! protocol paths are idempotent; reads are point lookups and bounded
//! range scans.

mod channels;
mod database;
mod identity;
mod join_requests;
mod messages;
mod migrations;
mod peers;
mod vouches;

pub use database::Database;
pub use identity::IdentityRow;

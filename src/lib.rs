//! Football fixtures sync core.
//!
//! A [`sync::Scheduler`] polls an upstream feed ([`feed::FeedClient`]) on a
//! fixed interval, maps each provider record to a canonical
//! [`db::models::Match`], and upserts it into the SQLite-backed
//! [`db::Database`]. The read functions on `Database` serve the list
//! endpoints that live outside this crate.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod sync;

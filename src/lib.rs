#![doc = "pocket-inventory-core: the incremental synchronisation pipeline behind the Analogue Pocket core inventory."]

//! Downloads each listed repository, parses its core definitions, compares
//! versions against a persistent cache and only redoes the expensive work
//! (GitHub lookups, image conversion, posts) for cores that changed.
//!
//! # Usage
//! Build a [`synchronise::Synchroniser`] from implementations of the traits in
//! [`contract`] and call [`synchronise::run`] with a loaded [`config::Config`].

pub mod assets;
pub mod cache;
pub mod config;
pub mod contract;
pub mod definition;
pub mod download;
pub mod error;
pub mod github;
pub mod output;
pub mod posts;
pub mod record;
pub mod repositories;
pub mod sponsor;
pub mod synchronise;

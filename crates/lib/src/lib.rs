//! atomupd-lib: catalog and update-selection core for atomupd
//!
//! This crate answers one question: given a client running some OS image,
//! which image(s) must it install next to become up to date? It provides:
//! - `scan`: filesystem discovery of image manifests and their artifacts
//! - `catalog`: policy validation, track grouping, and the hot-swap handle
//! - `select`: the checkpoint-aware candidate selection engine
//! - `export`: the static JSON tree served by a plain file server
//!
//! The crate never writes into the image pool and never inspects bundle
//! contents; it only reads manifests and checks artifact presence.

pub mod catalog;
pub mod config;
pub mod consts;
pub mod export;
pub mod image;
pub mod manifest;
pub mod scan;
pub mod select;
pub mod update;
pub mod version;

#![doc = "media-batch-core: core engine library for media-batch."]

//! This crate contains the resumable batch engine that turns source media
//! objects into derived artifacts (audio tracks, metadata documents,
//! transcripts) in a destination location. Cloud clients are not included
//! here: the engine talks to storage and transformation tools only through
//! the traits in [`contract`].
//!
//! # Usage
//! Build a [`synchronise::SynchroniseConfig`], pick a
//! [`transform::TransformStrategy`], and hand both to
//! [`synchronise::synchronise`] together with an [`contract::ObjectStore`]
//! and a [`trace::FailureLog`].

pub mod contract;
pub mod error;
pub mod inventory;
pub mod item;
pub mod listing;
pub mod processor;
pub mod scratch;
pub mod synchronise;
pub mod timestamps;
pub mod tools;
pub mod trace;
pub mod transform;
pub mod work;

//! # Film Bias Common Library
//!
//! Shared code for the film stereotype analyzer including:
//! - Error type used across crates
//! - TOML configuration loading and resolution
//! - Character/film data model
//! - Stereotype taxonomy table and lookup

pub mod config;
pub mod error;
pub mod model;
pub mod taxonomy;

pub use error::{Error, Result};
pub use model::{
    AttributeSlot, Category, CharacterMention, Film, Gender, MentionSource, StereotypeMatch,
};
pub use taxonomy::{Taxonomy, TaxonomyEntry, TaxonomyHit};

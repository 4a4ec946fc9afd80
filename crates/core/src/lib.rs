//! Core library for slidegen
//!
//! This crate implements the **Functional Core** of the slidegen application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`slidegen_core`** (this crate): record normalization, placeholder
//!   discovery, field resolution, classification, prompt construction and the
//!   error taxonomy. No I/O.
//! - **`slidegen`**: HTTP clients, the document and image stores, the slide
//!   materialization driver and the CLI (the Imperative Shell).
//!
//! Everything here is a pure function over plain data, so tests use fixture
//! values and never mock anything.
//!
//! # Module Organization
//!
//! - [`item`]: the schemaless record every other module works on
//! - [`resolve`]: multi-strategy lookup of a placeholder name in an item
//! - [`classify`]: image/text routing, refinement eligibility, content types
//! - [`refine`]: refinement prompt construction and outcomes
//! - [`image`]: image value classification, decoding and placement
//! - [`deck`]: the presentation document model
//! - [`template`]: placeholder discovery, manifests, legacy conversion, presets
//! - [`pairing`]: `single`/`double` layout pairing
//! - [`substitute`]: two-stage placeholder substitution
//! - [`ingest`]: record normalization and raw-text parsing
//! - [`mapping`]: model-assisted mapping prompts and response parsing
//! - [`rotation`]: credential rotation cursor
//! - [`gemini`]: `generateContent` wire types
//! - [`outcome`]: run outcomes and the numbered error taxonomy
//! - [`settings`]: optional TOML settings file
//!
//! # Example Usage
//!
//! ```rust
//! use serde_json::json;
//! use slidegen_core::item::Item;
//! use slidegen_core::pairing::{pair, Layout};
//! use slidegen_core::resolve::resolve;
//!
//! let items: Vec<Item> = serde_json::from_value(json!([
//!     {"companyName": "Acme"},
//!     {"companyName": "Globex"}
//! ]))
//! .unwrap();
//!
//! assert_eq!(resolve(&items[0], "company_name").as_deref(), Some("Acme"));
//!
//! let paired = pair(items, Layout::Double);
//! assert_eq!(paired.len(), 1);
//! assert_eq!(resolve(&paired[0], "company2Name").as_deref(), Some("Globex"));
//! ```

pub mod classify;
pub mod deck;
pub mod gemini;
pub mod image;
pub mod ingest;
pub mod item;
pub mod mapping;
pub mod outcome;
pub mod pairing;
pub mod refine;
pub mod resolve;
pub mod rotation;
pub mod settings;
pub mod substitute;
pub mod template;

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Tape Core
//!
//! Tape-backed in-memory store for IFC/STEP models, with a tokenizer built on
//! [nom](https://docs.rs/nom) and an explicit-stack argument codec.
//!
//! ## Overview
//!
//! - **Token Stream**: append-only paged byte tape of typed tokens
//! - **Line Directory**: identifier to tape-offset index with type filtering
//! - **Argument Codec**: iterative decode/encode of nested argument lists
//! - **Model Registry**: open models addressed by generation-tagged handles
//! - **Export**: render a model back to ISO 10303-21 text
//!
//! Every line is tokenized once at open time; reads seek straight to the
//! line's offset. Rewriting a line appends a new version and repoints the
//! directory, so older offsets stay valid.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_tape_core::{ArgumentValue, IfcType, ModelRegistry};
//!
//! let mut registry = ModelRegistry::new();
//! let handle = registry.open(b"#1=IFCWALL($,$,'Wall-1');")?;
//!
//! let wall = registry.get_line(handle, 1)?;
//! assert_eq!(wall.get_string(2), Some("Wall-1"));
//!
//! let args = ArgumentValue::List(vec![ArgumentValue::Null]);
//! registry.write_line(handle, 2, IfcType::IfcDoor.code(), &args)?;
//!
//! let text = registry.export_as_text(handle)?;
//! registry.close(handle)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for decoded lines and values

pub mod codec;
pub mod directory;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod tape;
pub mod token;
pub mod value;

pub use codec::{decode_arguments, decode_line, encode_line, encode_value, Line};
pub use directory::{LineDirectory, LineEntry};
pub use error::{Error, Result};
pub use export::export_step;
pub use model::{LoadStats, Model, ModelConfig, Transform};
pub use parser::{parse_entity, EntityStatement, StepReader, Token};
pub use registry::{ModelHandle, ModelRegistry};
pub use schema::{IfcSchema, IfcType, TypeCatalog};
pub use tape::{StringView, TokenSink, TokenStream, DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};
pub use token::TokenKind;
pub use value::{ArgumentValue, TextKind};

//! Raw input collection.
//!
//! Decodes native raw-input packets into typed keyboard and pointer samples.
//! Key identities never leave this module except through the special-key
//! table in [`keys`].

pub mod decoder;
pub mod keys;
pub mod types;

pub use decoder::{DecodeError, QueryStage, RawInputDecoder, RawInputLayout, RawInputQuery};
pub use types::{InputSample, KeyboardSample, ModifierKeys, PointerSample};

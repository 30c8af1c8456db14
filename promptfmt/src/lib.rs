//! promptfmt - template-driven dialog formatting into token sequences.
//!
//! A [`FormatDefinition`] maps role names to turn templates such as
//! `"User: |message|\n"`. A [`Formatter`] checks a [`Dialog`] against the
//! format, expands every turn, tokenizes it and returns an [`EncodedDialog`]:
//! the full token sequence, the context before the final output-role turn,
//! the answer tokens of that turn and a per-token loss mask.
//!
//! Formats can be built in code, loaded from YAML or JSON, and registered by
//! name in a [`FormatRegistry`].

pub mod builtin;
pub mod dialog;
pub mod engine;
pub mod error;
pub mod format;
pub mod modality;
pub mod prelude;
pub mod registry;
pub mod template;
pub mod tokenizer;

pub use dialog::{Dialog, Turn};
pub use engine::{EncodedDialog, Formatter, TurnSpan};
pub use error::{
    ConfigError, Error, LookupError, ModalityError, Result, TokenizerError, ValidationError,
};
pub use format::{FormatDeclaration, FormatDefinition, FormatDefinitionBuilder, RoleDeclaration};
pub use modality::Modality;
pub use registry::{FormatRegistry, register_format, resolve_format};
pub use template::{Segment, TurnTemplate};
pub use tokenizer::{ByteTokenizer, TokenId, Tokenizer};

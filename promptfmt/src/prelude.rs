//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use promptfmt::prelude::*;
//! ```

pub use crate::dialog::{Dialog, Turn};
pub use crate::engine::{EncodedDialog, Formatter, TurnSpan};
pub use crate::error::{ConfigError, Error, LookupError, Result, ValidationError};
pub use crate::format::FormatDefinition;
pub use crate::modality::Modality;
pub use crate::registry::{FormatRegistry, register_format, resolve_format};
pub use crate::tokenizer::{ByteTokenizer, TokenId, Tokenizer};

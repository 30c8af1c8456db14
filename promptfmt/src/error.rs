//! Error types for format definitions, dialog validation and registry lookups.
//!
//! The hierarchy follows the lifecycle of a format:
//! - [`ConfigError`] - a format definition is malformed (detected when it is built)
//! - [`ValidationError`] - a dialog does not fit the active format (detected per `encode`)
//! - [`LookupError`] - a format name is not registered

/// Result type alias for promptfmt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for promptfmt.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed format definition.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dialog rejected by the active format.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Format name could not be resolved.
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
}

impl Error {
    /// Returns `true` if this error was raised while validating a dialog.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if this error comes from a malformed format definition.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Error raised while building or loading a format definition.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A `|` opens a placeholder that is never closed.
    #[error("role '{role}': unterminated placeholder starting at byte {offset}")]
    UnterminatedPlaceholder {
        /// Role whose pattern is malformed.
        role: String,
        /// Byte offset of the opening delimiter.
        offset: usize,
    },

    /// Placeholder name contains characters outside `[A-Za-z0-9_]`.
    #[error("role '{role}': invalid placeholder name '{name}' at byte {offset}")]
    InvalidPlaceholderName {
        /// Role whose pattern is malformed.
        role: String,
        /// The offending name.
        name: String,
        /// Byte offset of the opening delimiter.
        offset: usize,
    },

    /// Pattern references a placeholder with no declared modality.
    #[error("role '{role}': placeholder '|{name}|' has no declared slot")]
    UndeclaredPlaceholder {
        /// Role whose pattern is malformed.
        role: String,
        /// Placeholder name.
        name: String,
    },

    /// A declared slot never appears in the pattern.
    #[error("role '{role}': slot '{name}' is declared but never used in the pattern")]
    UnusedSlot {
        /// Role whose declaration is malformed.
        role: String,
        /// Slot name.
        name: String,
    },

    /// A slot uses one of the reserved marker names.
    #[error("role '{role}': slot name '{name}' is reserved for sequence markers")]
    ReservedSlotName {
        /// Role whose declaration is malformed.
        role: String,
        /// Slot name.
        name: String,
    },

    /// A literal modality with nothing allowed can never be satisfied.
    #[error("role '{role}': slot '{slot}' declares a literal modality with no allowed values")]
    EmptyLiteralSet {
        /// Role whose declaration is malformed.
        role: String,
        /// Slot name.
        slot: String,
    },

    /// The designated output role is not one of the format's roles.
    #[error("format '{format}': output role '{role}' is not one of [{}]", .roles.join(", "))]
    MissingOutputRole {
        /// Format name.
        format: String,
        /// The designated output role.
        role: String,
        /// Roles the format declares.
        roles: Vec<String>,
    },

    /// The same role is declared twice.
    #[error("format '{format}': role '{role}' is declared more than once")]
    DuplicateRole {
        /// Format name.
        format: String,
        /// Role name.
        role: String,
    },

    /// The format declares no roles at all.
    #[error("format '{format}' declares no roles")]
    NoRoles {
        /// Format name.
        format: String,
    },

    /// The format name is empty.
    #[error("format name must not be empty")]
    EmptyName,

    /// A format with this name is already registered.
    #[error("format '{0}' is already registered")]
    DuplicateFormat(String),

    /// YAML declaration could not be parsed.
    #[error("failed to parse format YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON declaration could not be parsed.
    #[error("failed to parse format JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Declaration file could not be read.
    #[error("failed to read format file: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a slot value does not satisfy its declared modality.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ModalityError {
    /// Value is not a member of the literal set.
    #[error("value '{value}' is not one of [{}]", .allowed.join(", "))]
    NotAllowed {
        /// The rejected value.
        value: String,
        /// The allowed values, sorted.
        allowed: Vec<String>,
    },
}

/// Error reported by a [`Tokenizer`](crate::tokenizer::Tokenizer) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TokenizerError(String);

impl TokenizerError {
    /// Create a tokenizer error with a message.
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Error raised when a dialog does not fit the active format.
///
/// Every variant carries the zero-based index of the offending turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// Turn uses a role the format does not declare.
    #[error("turn {turn}: unknown role '{role}' (valid roles: {})", .valid.join(", "))]
    UnknownRole {
        /// Turn index.
        turn: usize,
        /// The unknown role.
        role: String,
        /// Roles the format declares.
        valid: Vec<String>,
    },

    /// Provided slot names differ from the declared slot set.
    #[error(
        "turn {turn} ({role}): expected slots [{}], got [{}]",
        .expected.join(", "),
        .provided.join(", ")
    )]
    SlotMismatch {
        /// Turn index.
        turn: usize,
        /// Turn role.
        role: String,
        /// Declared slot names, sorted.
        expected: Vec<String>,
        /// Provided slot names, sorted.
        provided: Vec<String>,
    },

    /// A slot value violates its modality.
    #[error("turn {turn} ({role}): slot '{slot}': {source}")]
    Modality {
        /// Turn index.
        turn: usize,
        /// Turn role.
        role: String,
        /// Slot name.
        slot: String,
        /// Underlying modality failure.
        source: ModalityError,
    },

    /// The tokenizer failed on the text of a turn.
    #[error("turn {turn} ({role}): tokenizer failed: {source}")]
    Tokenizer {
        /// Turn index.
        turn: usize,
        /// Turn role.
        role: String,
        /// Underlying tokenizer failure.
        source: TokenizerError,
    },
}

impl ValidationError {
    /// Index of the turn that failed validation.
    #[must_use]
    pub const fn turn(&self) -> usize {
        match self {
            Self::UnknownRole { turn, .. }
            | Self::SlotMismatch { turn, .. }
            | Self::Modality { turn, .. }
            | Self::Tokenizer { turn, .. } => *turn,
        }
    }
}

/// Error raised when a format name cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LookupError {
    /// No format is registered under this name.
    #[error("unknown format '{name}' (known formats: {})", .known.join(", "))]
    UnknownFormat {
        /// The requested name.
        name: String,
        /// Registered names, sorted.
        known: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_role_lists_valid_roles() {
        let err = ValidationError::UnknownRole {
            turn: 2,
            role: "tool".into(),
            valid: vec!["user".into(), "assistant".into()],
        };
        assert_eq!(
            err.to_string(),
            "turn 2: unknown role 'tool' (valid roles: user, assistant)"
        );
        assert_eq!(err.turn(), 2);
    }

    #[test]
    fn test_slot_mismatch_message() {
        let err = ValidationError::SlotMismatch {
            turn: 0,
            role: "user".into(),
            expected: vec!["message".into()],
            provided: vec!["content".into(), "message".into()],
        };
        assert_eq!(
            err.to_string(),
            "turn 0 (user): expected slots [message], got [content, message]"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = LookupError::UnknownFormat {
            name: "vicuna".into(),
            known: vec!["chatml".into()],
        }
        .into();
        assert!(!err.is_validation());
        assert!(!err.is_config());
        assert!(err.to_string().contains("unknown format 'vicuna'"));

        let err: Error = ConfigError::EmptyName.into();
        assert!(err.is_config());
    }
}

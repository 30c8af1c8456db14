//! Slot modalities and value validation.
//!
//! A [`Modality`] is the declared kind of a template slot. Every value bound
//! to a slot is checked against it before the turn is expanded, so new slot
//! kinds only need a new variant here and never touch the formatter engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModalityError;

/// The kind of value a slot accepts.
///
/// Serialized as an internally tagged map so declarations read naturally in
/// YAML and JSON:
///
/// ```yaml
/// message: { type: text }
/// label: { type: text_literal, values: [positive, negative] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Modality {
    /// Any string.
    #[default]
    Text,
    /// A string drawn from a fixed set.
    TextLiteral {
        /// Allowed values.
        values: BTreeSet<String>,
    },
}

impl Modality {
    /// Free-form text.
    #[must_use]
    pub const fn text() -> Self {
        Self::Text
    }

    /// Text constrained to the given values.
    #[must_use]
    pub fn literal<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::TextLiteral {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check a value against this modality.
    ///
    /// # Errors
    ///
    /// Returns [`ModalityError::NotAllowed`] when a literal modality does not
    /// contain `value`. The error lists every allowed value.
    pub fn validate(&self, value: &str) -> Result<(), ModalityError> {
        match self {
            Self::Text => Ok(()),
            Self::TextLiteral { values } => {
                if values.contains(value) {
                    Ok(())
                } else {
                    Err(ModalityError::NotAllowed {
                        value: value.to_owned(),
                        allowed: values.iter().cloned().collect(),
                    })
                }
            }
        }
    }

    /// Returns `true` if `value` satisfies this modality.
    #[must_use]
    pub fn check(&self, value: &str) -> bool {
        self.validate(value).is_ok()
    }

    /// A literal modality that no value can satisfy.
    pub(crate) fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::TextLiteral { values } if values.is_empty())
    }
}

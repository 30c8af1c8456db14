//! The formatter engine: dialog in, token sequences and loss mask out.
//!
//! Encoding runs in two passes. Every turn is first checked against the
//! active format (role, slot set, modalities); nothing is tokenized unless the
//! whole dialog is valid. Each turn is then expanded and tokenized on its own,
//! so text is never merged across turn boundaries and every turn owns one
//! contiguous run of `input_ids`.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::dialog::{Dialog, Turn};
use crate::error::{LookupError, ValidationError};
use crate::format::FormatDefinition;
use crate::registry::{self, FormatRegistry};
use crate::template::{Segment, TurnTemplate};
use crate::tokenizer::{TokenId, Tokenizer};

/// The tokens produced by one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSpan {
    /// Role of the turn.
    pub role: String,
    /// First token index in `input_ids`.
    pub start: usize,
    /// One past the last token index.
    pub end: usize,
    /// Whether the turn has the output role.
    pub is_output: bool,
}

impl TurnSpan {
    /// Token range in `input_ids`.
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of tokens the turn produced.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the turn produced no tokens.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Result of encoding a dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedDialog {
    /// Full token sequence.
    pub input_ids: Vec<TokenId>,
    /// Everything before the final output-role turn; equal to `input_ids`
    /// when the dialog does not end with the output role.
    pub context_ids: Vec<TokenId>,
    /// Tokens of the final output-role turn; empty when the dialog does not
    /// end with the output role.
    pub answer_ids: Vec<TokenId>,
    /// `true` at every token produced by an output-role turn.
    pub mask: Vec<bool>,
    /// Per-turn token ranges, in dialog order.
    pub turn_spans: Vec<TurnSpan>,
    /// Whether the dialog ends with the output role.
    pub complete: bool,
}

impl EncodedDialog {
    /// Number of tokens in the full sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Returns `true` if no tokens were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Whether the dialog ends with the output role.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Training labels: the token id where the mask is set, `ignore_index`
    /// everywhere else (typically `-100`).
    #[must_use]
    pub fn labels(&self, ignore_index: i64) -> Vec<i64> {
        self.input_ids
            .iter()
            .zip(&self.mask)
            .map(|(&id, &trained)| if trained { i64::from(id) } else { ignore_index })
            .collect()
    }

    /// Number of tokens the mask selects.
    #[must_use]
    pub fn masked_len(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Formats dialogs with one format definition and one tokenizer.
///
/// `encode` takes `&self` and keeps no state between calls, so a formatter
/// can be shared across threads whenever its tokenizer can.
///
/// # Example
///
/// ```rust,ignore
/// let formatter = Formatter::from_name(ByteTokenizer::new(), "user_assistant")?;
/// let dialog = Dialog::new()
///     .with_turn(Turn::message("user", "Hi"))
///     .with_turn(Turn::message("assistant", "Hello"));
/// let encoded = formatter.encode(&dialog)?;
/// assert_eq!(encoded.input_ids.len(), encoded.mask.len());
/// ```
#[derive(Debug, Clone)]
pub struct Formatter<T> {
    tokenizer: T,
    format: Arc<FormatDefinition>,
}

impl<T: Tokenizer> Formatter<T> {
    /// Create a formatter for a format definition.
    #[must_use]
    pub fn new(tokenizer: T, format: impl Into<Arc<FormatDefinition>>) -> Self {
        Self {
            tokenizer,
            format: format.into(),
        }
    }

    /// Create a formatter for a format registered in the global registry.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownFormat`] if `name` is not registered.
    pub fn from_name(tokenizer: T, name: &str) -> Result<Self, LookupError> {
        Self::from_registry(tokenizer, registry::global(), name)
    }

    /// Create a formatter for a format registered in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownFormat`] if `name` is not registered.
    pub fn from_registry(
        tokenizer: T,
        registry: &FormatRegistry,
        name: &str,
    ) -> Result<Self, LookupError> {
        Ok(Self::new(tokenizer, registry.resolve(name)?))
    }

    /// The active format.
    #[must_use]
    pub fn format(&self) -> &FormatDefinition {
        &self.format
    }

    /// The tokenizer.
    #[must_use]
    pub const fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    /// Check a dialog against the active format without tokenizing it.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, in turn order.
    pub fn validate(&self, dialog: &Dialog) -> Result<(), ValidationError> {
        self.templates_for(dialog).map(drop)
    }

    /// Expand a dialog to text, with sequence markers shown as `|BOS|` and
    /// `|EOS|`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, in turn order.
    pub fn render(&self, dialog: &Dialog) -> Result<String, ValidationError> {
        let templates = self.templates_for(dialog)?;
        Ok(dialog
            .turns()
            .iter()
            .zip(templates)
            .map(|(turn, template)| template.render(&turn.slots))
            .collect())
    }

    /// Encode a dialog into token sequences and a loss mask.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if any turn has an unknown role, a slot
    /// set that differs from its template's, a value violating its modality,
    /// or text the tokenizer rejects. No partial output is produced.
    #[instrument(
        level = "debug",
        skip_all,
        fields(format = %self.format.name(), turns = dialog.len())
    )]
    pub fn encode(&self, dialog: &Dialog) -> Result<EncodedDialog, ValidationError> {
        let templates = self.templates_for(dialog)?;

        let mut input_ids = Vec::new();
        let mut mask = Vec::new();
        let mut turn_spans = Vec::with_capacity(dialog.len());

        for (index, (turn, template)) in dialog.turns().iter().zip(templates).enumerate() {
            let start = input_ids.len();
            self.encode_turn(index, turn, template, &mut input_ids)?;

            let is_output = self.format.is_output_role(&turn.role);
            mask.resize(input_ids.len(), is_output);
            trace!(
                turn = index,
                role = %turn.role,
                tokens = input_ids.len() - start,
                is_output,
                "encoded turn"
            );
            turn_spans.push(TurnSpan {
                role: turn.role.clone(),
                start,
                end: input_ids.len(),
                is_output,
            });
        }

        let complete = dialog.ends_with_role(self.format.output_role());
        let (context_ids, answer_ids) = match turn_spans.last() {
            Some(last) if complete => (
                input_ids[..last.start].to_vec(),
                input_ids[last.start..].to_vec(),
            ),
            _ => (input_ids.clone(), Vec::new()),
        };

        debug!(
            tokens = input_ids.len(),
            context = context_ids.len(),
            answer = answer_ids.len(),
            complete,
            "encoded dialog"
        );

        Ok(EncodedDialog {
            input_ids,
            context_ids,
            answer_ids,
            mask,
            turn_spans,
            complete,
        })
    }

    fn encode_turn(
        &self,
        index: usize,
        turn: &Turn,
        template: &TurnTemplate,
        out: &mut Vec<TokenId>,
    ) -> Result<(), ValidationError> {
        for segment in template.expand(&turn.slots) {
            match segment {
                Segment::Text(text) => {
                    let ids = self.tokenizer.text_to_ids(&text).map_err(|source| {
                        ValidationError::Tokenizer {
                            turn: index,
                            role: turn.role.clone(),
                            source,
                        }
                    })?;
                    out.extend(ids);
                }
                Segment::Bos => out.push(self.tokenizer.bos_id()),
                Segment::Eos => out.push(self.tokenizer.eos_id()),
            }
        }
        Ok(())
    }

    /// Resolve and check the template of every turn.
    fn templates_for(&self, dialog: &Dialog) -> Result<Vec<&TurnTemplate>, ValidationError> {
        dialog
            .turns()
            .iter()
            .enumerate()
            .map(|(index, turn)| {
                let template = self.format.template(&turn.role).ok_or_else(|| {
                    ValidationError::UnknownRole {
                        turn: index,
                        role: turn.role.clone(),
                        valid: self.format.roles().map(str::to_owned).collect(),
                    }
                })?;
                template.validate(index, &turn.slots)?;
                Ok(template)
            })
            .collect()
    }
}

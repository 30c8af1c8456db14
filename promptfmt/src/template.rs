//! Turn templates: placeholder parsing and expansion.
//!
//! A pattern is literal text with placeholders written between pipes:
//!
//! ```text
//! |BOS|[INST] |message| [/INST]
//! ```
//!
//! - `|name|` is replaced by the value bound to slot `name`
//! - `|BOS|` and `|EOS|` are the tokenizer's begin/end-of-sequence ids and are
//!   never passed through text tokenization
//! - `||` is a literal pipe, so `<||im_end||>` renders as `<|im_end|>`
//!
//! Patterns are parsed once when the template is built; expansion walks the
//! cached chunk list.

use std::collections::BTreeMap;

use crate::error::{ConfigError, ValidationError};
use crate::modality::Modality;

/// Placeholder delimiter.
pub const DELIMITER: char = '|';

/// Reserved placeholder for the begin-of-sequence id.
pub const BOS_MARKER: &str = "BOS";

/// Reserved placeholder for the end-of-sequence id.
pub const EOS_MARKER: &str = "EOS";

/// A parsed piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Literal(String),
    Slot(String),
    Bos,
    Eos,
}

/// A piece of an expanded turn.
///
/// Text segments are tokenized; markers are spliced in as raw ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal and slot text, already substituted.
    Text(String),
    /// Begin-of-sequence marker.
    Bos,
    /// End-of-sequence marker.
    Eos,
}

/// The pattern and slot declarations for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTemplate {
    role: String,
    pattern: String,
    slots: BTreeMap<String, Modality>,
    chunks: Vec<Chunk>,
}

impl TurnTemplate {
    /// Parse and validate a template for `role`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the pattern has an unterminated or
    /// malformed placeholder, references an undeclared slot, leaves a declared
    /// slot unused, declares a reserved slot name, or declares a literal
    /// modality with no allowed values.
    pub fn new(
        role: impl Into<String>,
        pattern: impl Into<String>,
        slots: BTreeMap<String, Modality>,
    ) -> Result<Self, ConfigError> {
        let role = role.into();
        let pattern = pattern.into();

        for (name, modality) in &slots {
            if name == BOS_MARKER || name == EOS_MARKER {
                return Err(ConfigError::ReservedSlotName {
                    role,
                    name: name.clone(),
                });
            }
            if modality.is_unsatisfiable() {
                return Err(ConfigError::EmptyLiteralSet {
                    role,
                    slot: name.clone(),
                });
            }
        }

        let chunks = parse_pattern(&role, &pattern)?;

        for chunk in &chunks {
            if let Chunk::Slot(name) = chunk
                && !slots.contains_key(name)
            {
                return Err(ConfigError::UndeclaredPlaceholder {
                    role,
                    name: name.clone(),
                });
            }
        }
        if let Some(unused) = slots
            .keys()
            .find(|name| !chunks.iter().any(|c| matches!(c, Chunk::Slot(n) if n == *name)))
        {
            return Err(ConfigError::UnusedSlot {
                role,
                name: unused.clone(),
            });
        }

        Ok(Self {
            role,
            pattern,
            slots,
            chunks,
        })
    }

    /// The role this template formats.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Declared slots and their modalities.
    #[must_use]
    pub const fn slots(&self) -> &BTreeMap<String, Modality> {
        &self.slots
    }

    /// Declared slot names, sorted.
    #[must_use]
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Check a turn's slot values against this template.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SlotMismatch`] if the provided names differ
    /// from the declared set, or [`ValidationError::Modality`] for the first
    /// value that violates its modality.
    pub fn validate(
        &self,
        turn: usize,
        values: &BTreeMap<String, String>,
    ) -> Result<(), ValidationError> {
        if !values.keys().eq(self.slots.keys()) {
            return Err(ValidationError::SlotMismatch {
                turn,
                role: self.role.clone(),
                expected: self.slots.keys().cloned().collect(),
                provided: values.keys().cloned().collect(),
            });
        }
        for (name, modality) in &self.slots {
            let value = values.get(name).map_or("", String::as_str);
            modality
                .validate(value)
                .map_err(|source| ValidationError::Modality {
                    turn,
                    role: self.role.clone(),
                    slot: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Substitute `values` into the pattern.
    ///
    /// Adjacent literal and slot text is merged into a single
    /// [`Segment::Text`]; markers break text runs. Values should have passed
    /// [`validate`](Self::validate) first; an unbound slot expands to nothing.
    #[must_use]
    pub fn expand(&self, values: &BTreeMap<String, String>) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut text = String::new();

        for chunk in &self.chunks {
            match chunk {
                Chunk::Literal(lit) => text.push_str(lit),
                Chunk::Slot(name) => {
                    text.push_str(values.get(name).map_or("", String::as_str));
                }
                Chunk::Bos | Chunk::Eos => {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(if matches!(chunk, Chunk::Bos) {
                        Segment::Bos
                    } else {
                        Segment::Eos
                    });
                }
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        segments
    }

    /// Expand to plain text, showing markers as `|BOS|` and `|EOS|`.
    #[must_use]
    pub fn render(&self, values: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for segment in self.expand(values) {
            match segment {
                Segment::Text(text) => out.push_str(&text),
                Segment::Bos => push_marker(&mut out, BOS_MARKER),
                Segment::Eos => push_marker(&mut out, EOS_MARKER),
            }
        }
        out
    }
}

fn push_marker(out: &mut String, name: &str) {
    out.push(DELIMITER);
    out.push_str(name);
    out.push(DELIMITER);
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Slot names referenced by `pattern`, in first-use order.
///
/// A malformed pattern yields no names; the parse error is reported when the
/// template itself is built.
pub(crate) fn placeholder_names(pattern: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for chunk in parse_pattern("", pattern).unwrap_or_default() {
        if let Chunk::Slot(name) = chunk
            && !names.contains(&name)
        {
            names.push(name);
        }
    }
    names
}

fn parse_pattern(role: &str, pattern: &str) -> Result<Vec<Chunk>, ConfigError> {
    let mut chunks = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while let Some(rel) = pattern[pos..].find(DELIMITER) {
        let open = pos + rel;
        literal.push_str(&pattern[pos..open]);
        let start = open + DELIMITER.len_utf8();

        // `||` escapes a literal pipe.
        if pattern[start..].starts_with(DELIMITER) {
            literal.push(DELIMITER);
            pos = start + DELIMITER.len_utf8();
            continue;
        }

        let Some(len) = pattern[start..].find(DELIMITER) else {
            return Err(ConfigError::UnterminatedPlaceholder {
                role: role.to_owned(),
                offset: open,
            });
        };
        let name = &pattern[start..start + len];
        if !is_valid_name(name) {
            return Err(ConfigError::InvalidPlaceholderName {
                role: role.to_owned(),
                name: name.to_owned(),
                offset: open,
            });
        }

        if !literal.is_empty() {
            chunks.push(Chunk::Literal(std::mem::take(&mut literal)));
        }
        chunks.push(match name {
            BOS_MARKER => Chunk::Bos,
            EOS_MARKER => Chunk::Eos,
            _ => Chunk::Slot(name.to_owned()),
        });
        pos = start + len + DELIMITER.len_utf8();
    }

    literal.push_str(&pattern[pos..]);
    if !literal.is_empty() {
        chunks.push(Chunk::Literal(literal));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_slots(names: &[&str]) -> BTreeMap<String, Modality> {
        names
            .iter()
            .map(|n| ((*n).to_owned(), Modality::text()))
            .collect()
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_parse_literal_and_slot() {
        let t = TurnTemplate::new("user", "User: |message|\n", text_slots(&["message"]))
            .expect("valid template");
        assert_eq!(
            t.chunks,
            vec![
                Chunk::Literal("User: ".into()),
                Chunk::Slot("message".into()),
                Chunk::Literal("\n".into()),
            ]
        );
    }

    #[test]
    fn test_escaped_pipes() {
        let t = TurnTemplate::new(
            "user",
            "<||im_start||>user\n|message|<||im_end||>\n",
            text_slots(&["message"]),
        )
        .expect("valid template");
        assert_eq!(
            t.render(&values(&[("message", "Hi")])),
            "<|im_start|>user\nHi<|im_end|>\n"
        );
    }

    #[test]
    fn test_markers_split_text() {
        let t = TurnTemplate::new(
            "assistant",
            " |message| |EOS|",
            text_slots(&["message"]),
        )
        .expect("valid template");
        assert_eq!(
            t.expand(&values(&[("message", "ok")])),
            vec![Segment::Text(" ok ".into()), Segment::Eos]
        );

        let t = TurnTemplate::new("user", "|BOS||EOS|", BTreeMap::new()).expect("valid template");
        assert_eq!(t.expand(&BTreeMap::new()), vec![Segment::Bos, Segment::Eos]);
        assert_eq!(t.render(&BTreeMap::new()), "|BOS||EOS|");
    }

    #[test]
    fn test_slot_names_are_sorted() {
        let t = TurnTemplate::new("user", "|name|: |message|", text_slots(&["message", "name"]))
            .expect("valid template");
        assert_eq!(t.slot_names().collect::<Vec<_>>(), vec!["message", "name"]);
    }

    #[test]
    fn test_repeated_placeholder() {
        let t = TurnTemplate::new("user", "|name| said |name|", text_slots(&["name"]))
            .expect("valid template");
        assert_eq!(t.render(&values(&[("name", "Ann")])), "Ann said Ann");
    }

    #[test]
    fn test_placeholder_names() {
        assert_eq!(
            placeholder_names("|BOS||a| and |b| and |a||| x"),
            vec!["a".to_owned(), "b".to_owned()]
        );
        assert!(placeholder_names("|unterminated").is_empty());
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = TurnTemplate::new("user", "Hi |message", text_slots(&["message"]))
            .expect_err("unterminated");
        assert!(matches!(
            err,
            ConfigError::UnterminatedPlaceholder { offset: 3, .. }
        ));
    }

    #[test]
    fn test_invalid_placeholder_name() {
        let err = TurnTemplate::new("user", "a | b | c", BTreeMap::new()).expect_err("bad name");
        assert!(matches!(
            err,
            ConfigError::InvalidPlaceholderName { ref name, offset: 2, .. } if name == " b "
        ));
    }

    #[test]
    fn test_undeclared_placeholder() {
        let err = TurnTemplate::new("user", "|message| |extra|", text_slots(&["message"]))
            .expect_err("undeclared");
        assert!(matches!(
            err,
            ConfigError::UndeclaredPlaceholder { ref name, .. } if name == "extra"
        ));
    }

    #[test]
    fn test_unused_slot() {
        let err = TurnTemplate::new("user", "|message|", text_slots(&["message", "name"]))
            .expect_err("unused");
        assert!(matches!(
            err,
            ConfigError::UnusedSlot { ref name, ref role } if name == "name" && role == "user"
        ));
    }

    #[test]
    fn test_reserved_slot_name() {
        let err = TurnTemplate::new("user", "|BOS|", text_slots(&["BOS"])).expect_err("reserved");
        assert!(matches!(err, ConfigError::ReservedSlotName { .. }));
    }

    #[test]
    fn test_empty_literal_set() {
        let slots = BTreeMap::from([("label".to_owned(), Modality::literal(Vec::<String>::new()))]);
        let err = TurnTemplate::new("user", "|label|", slots).expect_err("empty set");
        assert!(matches!(err, ConfigError::EmptyLiteralSet { .. }));
    }

    #[test]
    fn test_validate_slot_mismatch() {
        let t = TurnTemplate::new("user", "|message|", text_slots(&["message"]))
            .expect("valid template");
        let err = t
            .validate(3, &values(&[("message", "a"), ("extra", "b")]))
            .expect_err("extra slot");
        assert_eq!(
            err,
            ValidationError::SlotMismatch {
                turn: 3,
                role: "user".into(),
                expected: vec!["message".into()],
                provided: vec!["extra".into(), "message".into()],
            }
        );

        let err = t.validate(0, &BTreeMap::new()).expect_err("missing slot");
        assert!(matches!(err, ValidationError::SlotMismatch { .. }));
    }

    #[test]
    fn test_validate_modality() {
        let slots = BTreeMap::from([("label".to_owned(), Modality::literal(["yes", "no"]))]);
        let t = TurnTemplate::new("answer", "Label: |label|", slots).expect("valid template");

        assert!(t.validate(0, &values(&[("label", "yes")])).is_ok());
        let err = t
            .validate(1, &values(&[("label", "perhaps")]))
            .expect_err("not allowed");
        assert!(matches!(
            err,
            ValidationError::Modality { turn: 1, ref slot, .. } if slot == "label"
        ));
    }
}

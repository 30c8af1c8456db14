//! Dialogs: ordered role-tagged turns with slot values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One turn of a dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Role name; must be declared by the active format.
    pub role: String,
    /// Slot values keyed by slot name.
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

impl Turn {
    /// Create a turn with no slot values.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            slots: BTreeMap::new(),
        }
    }

    /// Create a turn with a single `message` slot.
    #[must_use]
    pub fn message(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(role).with_slot("message", message)
    }

    /// Bind a slot value.
    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }
}

/// An ordered sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dialog {
    turns: Vec<Turn>,
}

impl Dialog {
    /// Create an empty dialog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    #[must_use]
    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    /// Append a turn in place.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The turns, in order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The final turn, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if there are no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns `true` if the dialog ends with a turn of `output_role`.
    #[must_use]
    pub fn ends_with_role(&self, output_role: &str) -> bool {
        self.last().is_some_and(|t| t.role == output_role)
    }
}

impl From<Vec<Turn>> for Dialog {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl FromIterator<Turn> for Dialog {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dialog {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dialog() {
        let dialog = Dialog::new()
            .with_turn(Turn::message("user", "Hi"))
            .with_turn(Turn::message("assistant", "Hello"));
        assert_eq!(dialog.len(), 2);
        assert!(dialog.ends_with_role("assistant"));
        assert!(!dialog.ends_with_role("user"));
        assert_eq!(dialog.turns()[0].slots["message"], "Hi");
    }

    #[test]
    fn test_push_and_iterate() {
        let mut dialog = Dialog::from(vec![Turn::message("user", "Hi")]);
        dialog.push(Turn::message("assistant", "Hello"));

        let mut roles = Vec::new();
        for turn in &dialog {
            roles.push(turn.role.as_str());
        }
        assert_eq!(roles, ["user", "assistant"]);
        assert_eq!(dialog.last().map(|t| t.slots["message"].as_str()), Some("Hello"));
    }

    #[test]
    fn test_empty_dialog_has_no_last_role() {
        let dialog = Dialog::new();
        assert!(dialog.is_empty());
        assert!(!dialog.ends_with_role("assistant"));
    }

    #[test]
    fn test_deserialize_from_json() {
        let dialog: Dialog = serde_json::from_str(
            r#"[
                {"role": "system", "slots": {"message": "Be brief."}},
                {"role": "user", "slots": {"message": "Hi", "name": "ann"}},
                {"role": "sep"}
            ]"#,
        )
        .expect("valid dialog json");
        assert_eq!(dialog.len(), 3);
        assert_eq!(
            dialog.turns()[1],
            Turn::message("user", "Hi").with_slot("name", "ann")
        );
        assert!(dialog.turns()[2].slots.is_empty());
    }
}

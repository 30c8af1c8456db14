//! Built-in format declarations, embedded at compile time.

use crate::format::FormatDefinition;

/// `System:` / `User:` / `Assistant:` lines.
pub const USER_ASSISTANT_YAML: &str = include_str!("user_assistant.yaml");

/// ChatML (`<|im_start|>role ... <|im_end|>`).
pub const CHATML_YAML: &str = include_str!("chatml.yaml");

/// Llama-2 chat (`<s>[INST] ... [/INST] ... </s>`).
pub const LLAMA2_YAML: &str = include_str!("llama2.yaml");

/// Alpaca instruction format.
pub const ALPACA_YAML: &str = include_str!("alpaca.yaml");

/// Names of the built-in formats.
pub const NAMES: [&str; 4] = ["user_assistant", "chatml", "llama2", "alpaca"];

const SOURCES: [&str; 4] = [USER_ASSISTANT_YAML, CHATML_YAML, LLAMA2_YAML, ALPACA_YAML];

/// Parse every built-in format.
///
/// # Panics
///
/// Panics if the embedded YAML is invalid.
#[must_use]
pub fn all() -> Vec<FormatDefinition> {
    SOURCES
        .iter()
        .map(|yaml| FormatDefinition::from_yaml(yaml).expect("built-in format should be valid"))
        .collect()
}

/// The built-in `user_assistant` format.
///
/// # Panics
///
/// Panics if the embedded YAML is invalid.
#[must_use]
pub fn user_assistant() -> FormatDefinition {
    FormatDefinition::from_yaml(USER_ASSISTANT_YAML)
        .expect("built-in user_assistant.yaml should be valid")
}

/// The built-in `chatml` format.
///
/// # Panics
///
/// Panics if the embedded YAML is invalid.
#[must_use]
pub fn chatml() -> FormatDefinition {
    FormatDefinition::from_yaml(CHATML_YAML).expect("built-in chatml.yaml should be valid")
}

/// The built-in `llama2` format.
///
/// # Panics
///
/// Panics if the embedded YAML is invalid.
#[must_use]
pub fn llama2() -> FormatDefinition {
    FormatDefinition::from_yaml(LLAMA2_YAML).expect("built-in llama2.yaml should be valid")
}

/// The built-in `alpaca` format.
///
/// # Panics
///
/// Panics if the embedded YAML is invalid.
#[must_use]
pub fn alpaca() -> FormatDefinition {
    FormatDefinition::from_yaml(ALPACA_YAML).expect("built-in alpaca.yaml should be valid")
}

//! Format definitions: the complete set of turn templates for one prompt format.
//!
//! A format is plain data. It can be declared in YAML or JSON:
//!
//! ```yaml
//! name: user_assistant
//! output_role: assistant
//! roles:
//!   - role: user
//!     pattern: "User: |message|\n"
//!     slots:
//!       message: { type: text }
//!   - role: assistant
//!     pattern: "Assistant: |message|\n"
//!     slots:
//!       message: { type: text }
//! ```
//!
//! or built in code with [`FormatDefinition::builder`]. Either way every
//! template is parsed and checked once, when the definition is built.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::modality::Modality;
use crate::template::{self, TurnTemplate};

/// Serializable declaration of a format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDeclaration {
    /// Unique format name.
    pub name: String,
    /// Role whose turns are the model's expected output.
    pub output_role: String,
    /// Role templates, in declaration order.
    pub roles: Vec<RoleDeclaration>,
}

/// Serializable declaration of one role's template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDeclaration {
    /// Role name.
    pub role: String,
    /// Pattern with `|slot|` placeholders.
    pub pattern: String,
    /// Slot modalities.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, Modality>,
}

/// A validated, immutable prompt format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDefinition {
    name: String,
    output_role: String,
    templates: Vec<TurnTemplate>,
}

impl FormatDefinition {
    /// Start building a format named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FormatDefinitionBuilder {
        FormatDefinitionBuilder::new(name)
    }

    /// Validate a declaration and parse its templates.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the name is empty, no roles are declared,
    /// a role is declared twice, a template is malformed, or the output role
    /// is not one of the declared roles.
    pub fn from_declaration(decl: FormatDeclaration) -> Result<Self, ConfigError> {
        let FormatDeclaration {
            name,
            output_role,
            roles,
        } = decl;

        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if roles.is_empty() {
            return Err(ConfigError::NoRoles { format: name });
        }

        let mut seen = HashSet::with_capacity(roles.len());
        let mut templates = Vec::with_capacity(roles.len());
        for role in roles {
            if !seen.insert(role.role.clone()) {
                return Err(ConfigError::DuplicateRole {
                    format: name,
                    role: role.role,
                });
            }
            templates.push(TurnTemplate::new(role.role, role.pattern, role.slots)?);
        }

        if !seen.contains(&output_role) {
            return Err(ConfigError::MissingOutputRole {
                format: name,
                role: output_role,
                roles: templates.iter().map(|t| t.role().to_owned()).collect(),
            });
        }

        Ok(Self {
            name,
            output_role,
            templates,
        })
    }

    /// Load a format from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or the declaration is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_declaration(serde_yaml::from_str(yaml)?)
    }

    /// Load a format from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the declaration is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_declaration(serde_json::from_str(json)?)
    }

    /// Load a format from a file. Files ending in `.json` are read as JSON,
    /// anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the
    /// declaration is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Format name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role whose turns are the model's expected output.
    #[must_use]
    pub fn output_role(&self) -> &str {
        &self.output_role
    }

    /// Returns `true` if `role` is the output role.
    #[must_use]
    pub fn is_output_role(&self, role: &str) -> bool {
        self.output_role == role
    }

    /// Role names in declaration order.
    #[must_use]
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(TurnTemplate::role)
    }

    /// Templates in declaration order.
    #[must_use]
    pub fn templates(&self) -> &[TurnTemplate] {
        &self.templates
    }

    /// The template for `role`, if declared.
    #[must_use]
    pub fn template(&self, role: &str) -> Option<&TurnTemplate> {
        self.templates.iter().find(|t| t.role() == role)
    }

    /// Convert back into a serializable declaration.
    #[must_use]
    pub fn to_declaration(&self) -> FormatDeclaration {
        FormatDeclaration {
            name: self.name.clone(),
            output_role: self.output_role.clone(),
            roles: self
                .templates
                .iter()
                .map(|t| RoleDeclaration {
                    role: t.role().to_owned(),
                    pattern: t.pattern().to_owned(),
                    slots: t.slots().clone(),
                })
                .collect(),
        }
    }

    /// Serialize the declaration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.to_declaration())?)
    }
}

impl TryFrom<FormatDeclaration> for FormatDefinition {
    type Error = ConfigError;

    fn try_from(decl: FormatDeclaration) -> Result<Self, Self::Error> {
        Self::from_declaration(decl)
    }
}

/// Builder for [`FormatDefinition`].
///
/// Errors are collected at [`build`](Self::build) time.
#[derive(Debug, Clone)]
pub struct FormatDefinitionBuilder {
    decl: FormatDeclaration,
}

impl FormatDefinitionBuilder {
    /// Create a builder for a format named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            decl: FormatDeclaration {
                name: name.into(),
                output_role: String::new(),
                roles: Vec::new(),
            },
        }
    }

    /// Set the output role.
    #[must_use]
    pub fn output_role(mut self, role: impl Into<String>) -> Self {
        self.decl.output_role = role.into();
        self
    }

    /// Add a role with explicit slot modalities.
    #[must_use]
    pub fn role<I, K>(mut self, role: impl Into<String>, pattern: impl Into<String>, slots: I) -> Self
    where
        I: IntoIterator<Item = (K, Modality)>,
        K: Into<String>,
    {
        self.decl.roles.push(RoleDeclaration {
            role: role.into(),
            pattern: pattern.into(),
            slots: slots.into_iter().map(|(k, m)| (k.into(), m)).collect(),
        });
        self
    }

    /// Add a role whose placeholders are all free text.
    #[must_use]
    pub fn text_role(mut self, role: impl Into<String>, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let slots = template::placeholder_names(&pattern)
            .into_iter()
            .map(|name| (name, Modality::Text))
            .collect();
        self.decl.roles.push(RoleDeclaration {
            role: role.into(),
            pattern,
            slots,
        });
        self
    }

    /// Validate and build the format.
    ///
    /// # Errors
    ///
    /// See [`FormatDefinition::from_declaration`].
    pub fn build(self) -> Result<FormatDefinition, ConfigError> {
        FormatDefinition::from_declaration(self.decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_ASSISTANT: &str = r#"
name: ua
output_role: assistant
roles:
  - role: user
    pattern: "User: |message|\n"
    slots:
      message: { type: text }
  - role: assistant
    pattern: "Assistant: |message|\n"
    slots:
      message: { type: text }
"#;

    #[test]
    fn test_from_yaml() {
        let fmt = FormatDefinition::from_yaml(USER_ASSISTANT).expect("valid yaml");
        assert_eq!(fmt.name(), "ua");
        assert_eq!(fmt.output_role(), "assistant");
        assert_eq!(fmt.roles().collect::<Vec<_>>(), vec!["user", "assistant"]);
        assert!(fmt.is_output_role("assistant"));
        assert!(!fmt.is_output_role("user"));
        assert!(fmt.template("system").is_none());
    }

    #[test]
    fn test_builder_matches_yaml() {
        let built = FormatDefinition::builder("ua")
            .output_role("assistant")
            .text_role("user", "User: |message|\n")
            .role("assistant", "Assistant: |message|\n", [("message", Modality::text())])
            .build()
            .expect("valid format");
        let loaded = FormatDefinition::from_yaml(USER_ASSISTANT).expect("valid yaml");
        assert_eq!(built, loaded);
    }

    #[test]
    fn test_missing_output_role() {
        let err = FormatDefinition::builder("ua")
            .output_role("assistant")
            .text_role("user", "|message|")
            .build()
            .expect_err("no assistant role");
        assert!(matches!(
            err,
            ConfigError::MissingOutputRole { ref role, ref roles, .. }
                if role == "assistant" && roles == &["user".to_owned()]
        ));
    }

    #[test]
    fn test_duplicate_role() {
        let err = FormatDefinition::builder("ua")
            .output_role("user")
            .text_role("user", "|message|")
            .text_role("user", "again |message|")
            .build()
            .expect_err("duplicate role");
        assert!(matches!(err, ConfigError::DuplicateRole { .. }));
    }

    #[test]
    fn test_empty_name_and_no_roles() {
        let err = FormatDefinition::builder("  ")
            .output_role("user")
            .text_role("user", "|message|")
            .build()
            .expect_err("empty name");
        assert!(matches!(err, ConfigError::EmptyName));

        let err = FormatDefinition::builder("empty")
            .output_role("user")
            .build()
            .expect_err("no roles");
        assert!(matches!(err, ConfigError::NoRoles { .. }));
    }

    #[test]
    fn test_template_error_surfaces_from_yaml() {
        let yaml = r#"
name: broken
output_role: user
roles:
  - role: user
    pattern: "|message| |name|"
    slots:
      message: { type: text }
"#;
        let err = FormatDefinition::from_yaml(yaml).expect_err("undeclared placeholder");
        assert!(matches!(err, ConfigError::UndeclaredPlaceholder { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = FormatDefinition::from_yaml("name: [").expect_err("bad yaml");
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_json_and_yaml_round_trip() {
        let fmt = FormatDefinition::builder("labels")
            .output_role("answer")
            .text_role("question", "Q: |text|\n")
            .role("answer", "A: |label||EOS|", [("label", Modality::literal(["yes", "no"]))])
            .build()
            .expect("valid format");

        let json = serde_json::to_string(&fmt.to_declaration()).expect("serialize json");
        assert_eq!(FormatDefinition::from_json(&json).expect("parse json"), fmt);

        let yaml = fmt.to_yaml().expect("serialize yaml");
        assert_eq!(FormatDefinition::from_yaml(&yaml).expect("parse yaml"), fmt);

        let converted = FormatDefinition::try_from(fmt.to_declaration()).expect("convert");
        assert_eq!(converted, fmt);
    }
}

//! Format registry: name → format definition.
//!
//! Registration is write-once per name. A [`FormatRegistry`] can be created
//! and passed around explicitly; [`global`] returns the process-wide instance,
//! which is seeded with the [built-in formats](crate::builtin) the first time
//! it is touched.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::builtin;
use crate::error::{ConfigError, LookupError};
use crate::format::FormatDefinition;

/// A thread-safe map from format name to definition.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: RwLock<HashMap<String, Arc<FormatDefinition>>>,
}

impl FormatRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in format.
    #[must_use]
    pub fn with_builtins() -> Self {
        let formats = builtin::all()
            .into_iter()
            .map(|def| (def.name().to_owned(), Arc::new(def)))
            .collect();
        Self {
            formats: RwLock::new(formats),
        }
    }

    /// Register a format under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateFormat`] if the name is taken; the
    /// existing definition is left in place.
    pub fn register(
        &self,
        definition: impl Into<Arc<FormatDefinition>>,
    ) -> Result<Arc<FormatDefinition>, ConfigError> {
        let definition = definition.into();
        let mut formats = self.formats.write().unwrap_or_else(PoisonError::into_inner);
        if formats.contains_key(definition.name()) {
            return Err(ConfigError::DuplicateFormat(definition.name().to_owned()));
        }
        debug!(
            format = definition.name(),
            output_role = definition.output_role(),
            roles = definition.templates().len(),
            "registered format"
        );
        formats.insert(definition.name().to_owned(), Arc::clone(&definition));
        Ok(definition)
    }

    /// Look up a format by name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownFormat`], listing the registered names,
    /// if `name` is not registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<FormatDefinition>, LookupError> {
        let formats = self.formats.read().unwrap_or_else(PoisonError::into_inner);
        formats.get(name).cloned().ok_or_else(|| {
            let mut known: Vec<String> = formats.keys().cloned().collect();
            known.sort_unstable();
            LookupError::UnknownFormat {
                name: name.to_owned(),
                known,
            }
        })
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.formats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .formats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of registered formats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.formats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static GLOBAL: OnceLock<FormatRegistry> = OnceLock::new();

/// The process-wide registry, seeded with the built-in formats.
pub fn global() -> &'static FormatRegistry {
    GLOBAL.get_or_init(FormatRegistry::with_builtins)
}

/// Register a format in the global registry.
///
/// # Errors
///
/// Returns [`ConfigError::DuplicateFormat`] if the name is taken.
pub fn register_format(
    definition: impl Into<Arc<FormatDefinition>>,
) -> Result<Arc<FormatDefinition>, ConfigError> {
    global().register(definition)
}

/// Look up a format in the global registry.
///
/// # Errors
///
/// Returns [`LookupError::UnknownFormat`] if `name` is not registered.
pub fn resolve_format(name: &str) -> Result<Arc<FormatDefinition>, LookupError> {
    global().resolve(name)
}

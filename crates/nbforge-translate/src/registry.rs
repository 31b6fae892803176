//! Translator registry
//!
//! Translators are keyed by kernel name or language. Lookup tries an exact
//! kernel-name match first, then an exact language match. Later registrations
//! shadow earlier ones under the same key.

use crate::error::TranslateError;
use crate::languages::{
    BashTranslator, JuliaTranslator, PythonTranslator, RTranslator, ScalaTranslator,
};
use crate::translator::Translator;
use nbforge_document::Parameters;
use std::fmt;
use std::sync::Arc;

/// Ordered translator registrations, most recent first
#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    translators: Vec<(String, Arc<dyn Translator>)>,
}

impl fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl TranslatorRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in translators
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let python: Arc<dyn Translator> = Arc::new(PythonTranslator);
        let r: Arc<dyn Translator> = Arc::new(RTranslator);
        let scala: Arc<dyn Translator> = Arc::new(ScalaTranslator);

        registry.register("python", Arc::clone(&python));
        registry.register("R", Arc::clone(&r));
        registry.register("scala", Arc::clone(&scala));
        registry.register("julia", Arc::new(JuliaTranslator));
        registry.register("bash", Arc::new(BashTranslator));
        registry.register("pysparkkernel", python);
        registry.register("sparkkernel", scala);
        registry.register("sparkrkernel", r);
        registry
    }

    /// Register `translator` under `key`, shadowing earlier registrations
    pub fn register(&mut self, key: impl Into<String>, translator: Arc<dyn Translator>) {
        let key = key.into();
        tracing::debug!(key = %key, translator = translator.name(), "registering translator");
        self.translators.insert(0, (key, translator));
    }

    /// Registered keys, most recent first
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.translators.iter().map(|(k, _)| k.as_str()).collect()
    }

    fn lookup(&self, key: &str) -> Option<Arc<dyn Translator>> {
        self.translators
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, t)| Arc::clone(t))
    }

    /// Find the translator for a kernel/language pair
    ///
    /// # Errors
    ///
    /// Returns `TranslateError::NoTranslator` when neither key is registered.
    pub fn find_translator(
        &self,
        kernel_name: &str,
        language: &str,
    ) -> Result<Arc<dyn Translator>, TranslateError> {
        self.lookup(kernel_name)
            .or_else(|| self.lookup(language))
            .ok_or_else(|| TranslateError::no_translator(kernel_name, language))
    }

    /// Render a parameter block for a kernel/language pair
    ///
    /// # Errors
    ///
    /// Returns `TranslateError::NoTranslator` when no translator matches.
    pub fn translate_parameters(
        &self,
        kernel_name: &str,
        language: &str,
        parameters: &Parameters,
        comment: &str,
    ) -> Result<String, TranslateError> {
        Ok(self
            .find_translator(kernel_name, language)?
            .codify(parameters, comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbforge_document::{ParamValue, Parameters};

    struct Fixed(&'static str);

    impl Translator for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn translate_list(&self, _items: &[ParamValue]) -> String {
            String::new()
        }

        fn translate_map(&self, _map: &Parameters) -> String {
            String::new()
        }

        fn comment(&self, text: &str) -> String {
            format!("-- {text}")
        }
    }

    #[test]
    fn kernel_match_beats_language_match() {
        let mut registry = TranslatorRegistry::new();
        registry.register("my_new_kernel", Arc::new(Fixed("kernel")));
        registry.register("my_new_language", Arc::new(Fixed("language")));

        let found = registry
            .find_translator("my_new_kernel", "my_new_language")
            .unwrap();
        assert_eq!(found.name(), "kernel");
    }

    #[test]
    fn falls_back_to_language() {
        let mut registry = TranslatorRegistry::new();
        registry.register("my_new_language", Arc::new(Fixed("language")));
        let found = registry
            .find_translator("unregistered_kernel", "my_new_language")
            .unwrap();
        assert_eq!(found.name(), "language");
    }

    #[test]
    fn unknown_pair_fails() {
        let registry = TranslatorRegistry::with_defaults();
        let err = registry
            .find_translator("unregistered_kernel", "unregistered_language")
            .err()
            .unwrap();
        assert_eq!(
            err,
            TranslateError::no_translator("unregistered_kernel", "unregistered_language")
        );
    }

    #[test]
    fn later_registration_shadows() {
        let mut registry = TranslatorRegistry::with_defaults();
        registry.register("python", Arc::new(Fixed("override")));
        let found = registry.find_translator("python3", "python").unwrap();
        assert_eq!(found.name(), "override");
        assert_eq!(registry.keys()[0], "python");
    }

    #[test]
    fn defaults_cover_spark_kernels() {
        let registry = TranslatorRegistry::with_defaults();
        assert_eq!(registry.find_translator("pysparkkernel", "").unwrap().name(), "python");
        assert_eq!(registry.find_translator("sparkkernel", "").unwrap().name(), "scala");
        assert_eq!(registry.find_translator("sparkrkernel", "").unwrap().name(), "R");
        assert_eq!(registry.find_translator("ir", "R").unwrap().name(), "R");
        assert_eq!(registry.find_translator("julia-1.9", "julia").unwrap().name(), "julia");
    }

    #[test]
    fn translate_parameters_uses_kernel_translator() {
        let registry = TranslatorRegistry::with_defaults();
        let mut params = Parameters::new();
        params.insert("foo".into(), ParamValue::Bool(true));
        let block = registry
            .translate_parameters("python3", "R", &params, "Parameters")
            .unwrap();
        assert_eq!(block, "# Parameters\nfoo = TRUE\n");
    }
}

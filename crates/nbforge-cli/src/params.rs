//! Parameter sources
//!
//! Sources merge in a fixed order, later ones overwriting earlier ones on
//! the same name: base64 YAML blobs, YAML files, inline YAML, typed
//! `NAME VALUE` pairs, raw `NAME VALUE` pairs.

use base64::Engine as _;
use nbforge_document::{ParamValue, Parameters};
use nbforge_io::{parse_yaml, IoError, StorageRouter};

/// Errors raised while assembling parameters
#[derive(Debug, thiserror::Error)]
pub enum ParamSourceError {
    /// A `-b` payload is not valid base64
    #[error("invalid base64 parameters: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A decoded `-b` payload is not UTF-8
    #[error("base64 parameters are not UTF-8 text")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A parameter file or YAML payload could not be read
    #[error(transparent)]
    Io(#[from] IoError),

    /// A source decoded to something other than a mapping
    #[error("parameters from {source_name} must be a mapping, got {kind}")]
    NotAMapping {
        /// Which source
        source_name: String,
        /// Kind of value found
        kind: &'static str,
    },
}

/// Raw parameter options as given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSources {
    /// Base64-encoded YAML mappings
    pub base64: Vec<String>,
    /// YAML or JSON files
    pub files: Vec<String>,
    /// Inline YAML mappings
    pub yaml: Vec<String>,
    /// Pairs whose values are type-coerced
    pub pairs: Vec<(String, String)>,
    /// Pairs whose values stay text
    pub raw: Vec<(String, String)>,
}

impl ParameterSources {
    /// Merge every source into one mapping
    ///
    /// Files are read through `storage`. An empty or comment-only YAML
    /// payload contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns a `ParamSourceError` for undecodable, unreadable or
    /// non-mapping sources.
    pub fn collect(&self, storage: &StorageRouter) -> Result<Parameters, ParamSourceError> {
        let mut parameters = Parameters::new();
        for blob in &self.base64 {
            let text = String::from_utf8(base64::engine::general_purpose::STANDARD.decode(blob.trim())?)?;
            merge(&mut parameters, parse_yaml(&text)?, "base64 parameters")?;
        }
        for file in &self.files {
            merge(&mut parameters, storage.read_yaml_file(file)?, file)?;
        }
        for yaml in &self.yaml {
            merge(&mut parameters, parse_yaml(yaml)?, "YAML parameters")?;
        }
        for (name, value) in &self.pairs {
            parameters.insert(name.clone(), resolve_type(value));
        }
        for (name, value) in &self.raw {
            parameters.insert(name.clone(), ParamValue::Str(value.clone()));
        }
        Ok(parameters)
    }
}

fn merge(parameters: &mut Parameters, value: ParamValue, source_name: &str) -> Result<(), ParamSourceError> {
    match value {
        ParamValue::Null => Ok(()),
        ParamValue::Map(map) => {
            parameters.extend(map);
            Ok(())
        }
        other => Err(ParamSourceError::NotAMapping {
            source_name: source_name.to_string(),
            kind: other.kind_name(),
        }),
    }
}

/// Coerce a command-line value
///
/// `True`, `False` and `None` become booleans and null; integer text
/// becomes an integer, other numeric text a float; anything else stays text.
#[must_use]
pub fn resolve_type(value: &str) -> ParamValue {
    match value {
        "True" => ParamValue::Bool(true),
        "False" => ParamValue::Bool(false),
        "None" => ParamValue::Null,
        _ => parse_int(value)
            .map(ParamValue::Int)
            .or_else(|| parse_float(value).map(ParamValue::Float))
            .unwrap_or_else(|| ParamValue::Str(value.to_string())),
    }
}

/// Underscores may only separate digits
fn valid_separators(text: &str) -> bool {
    !(text.starts_with('_') || text.ends_with('_') || text.contains("__"))
}

fn parse_int(value: &str) -> Option<i64> {
    let text = value.trim();
    let digits = text.trim_start_matches(|c| c == '+' || c == '-');
    if text.len() - digits.len() > 1
        || digits.is_empty()
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '_')
        || !valid_separators(digits)
    {
        return None;
    }
    text.replace('_', "").parse().ok()
}

fn parse_float(value: &str) -> Option<f64> {
    let text = value.trim();
    if text.is_empty() || !valid_separators(text) {
        return None;
    }
    text.replace('_', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords() {
        assert_eq!(resolve_type("True"), ParamValue::Bool(true));
        assert_eq!(resolve_type("False"), ParamValue::Bool(false));
        assert_eq!(resolve_type("None"), ParamValue::Null);
        assert_eq!(resolve_type("true"), ParamValue::Str("true".into()));
    }

    #[test]
    fn numbers() {
        assert_eq!(resolve_type("10"), ParamValue::Int(10));
        assert_eq!(resolve_type("-3"), ParamValue::Int(-3));
        assert_eq!(resolve_type(" 7 "), ParamValue::Int(7));
        assert_eq!(resolve_type("1_000"), ParamValue::Int(1000));
        assert_eq!(resolve_type("12.51"), ParamValue::Float(12.51));
        assert_eq!(resolve_type("1e3"), ParamValue::Float(1000.0));
        assert!(matches!(resolve_type("nan"), ParamValue::Float(f) if f.is_nan()));
        assert_eq!(resolve_type("-inf"), ParamValue::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn text_passes_through() {
        assert_eq!(resolve_type("hello"), ParamValue::Str("hello".into()));
        assert_eq!(resolve_type("1__0"), ParamValue::Str("1__0".into()));
        assert_eq!(resolve_type("--1"), ParamValue::Str("--1".into()));
        assert_eq!(resolve_type(""), ParamValue::Str(String::new()));
    }
}

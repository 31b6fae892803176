//! The translator capability
//!
//! A [`Translator`] renders [`ParamValue`]s as source literals for one target
//! language. Defaults cover the behaviour most languages share; each language
//! overrides the literals that differ and must supply its own collection and
//! comment syntax.

use crate::error::TranslateError;
use crate::inspect::Parameter;
use nbforge_document::{Cell, ParamValue, Parameters};

/// Header comment written above injected parameters
pub const DEFAULT_PARAMETERS_COMMENT: &str = "Parameters";

/// Per-language literal and parameter-block generator
pub trait Translator: Send + Sync {
    /// Display name of the target language
    fn name(&self) -> &'static str;

    /// Render text as a string literal
    fn translate_str(&self, value: &str) -> String {
        escape_double_quoted(value)
    }

    /// Render the null value
    fn translate_none(&self) -> String {
        "None".to_string()
    }

    /// Render a boolean
    fn translate_bool(&self, value: bool) -> String {
        if value { "true" } else { "false" }.to_string()
    }

    /// Render an integer
    fn translate_int(&self, value: i64) -> String {
        value.to_string()
    }

    /// Render a float, including non-finite values
    fn translate_float(&self, value: f64) -> String {
        if value.is_finite() {
            float_repr(value)
        } else if value.is_nan() {
            "nan".to_string()
        } else if value.is_sign_negative() {
            "-inf".to_string()
        } else {
            "inf".to_string()
        }
    }

    /// Render an ordered sequence
    fn translate_list(&self, items: &[ParamValue]) -> String;

    /// Render a string-keyed mapping
    fn translate_map(&self, map: &Parameters) -> String;

    /// Render any value, recursing into collections
    fn translate(&self, value: &ParamValue) -> String {
        match value {
            ParamValue::Null => self.translate_none(),
            ParamValue::Bool(b) => self.translate_bool(*b),
            ParamValue::Int(i) => self.translate_int(*i),
            ParamValue::Float(f) => self.translate_float(*f),
            ParamValue::Str(s) => self.translate_str(s),
            ParamValue::List(items) => self.translate_list(items),
            ParamValue::Map(map) => self.translate_map(map),
        }
    }

    /// Render a line comment
    fn comment(&self, text: &str) -> String;

    /// Render one assignment statement
    fn assign(&self, name: &str, literal: &str) -> String {
        format!("{name} = {literal}")
    }

    /// Render a full parameter block: comment header, then one assignment per entry
    fn codify(&self, parameters: &Parameters, comment: &str) -> String {
        let mut content = format!("{}\n", self.comment(comment));
        for (name, value) in parameters {
            content.push_str(&self.assign(name, &self.translate(value)));
            content.push('\n');
        }
        content
    }

    /// Recover the declared parameters from a parameter cell
    ///
    /// # Errors
    ///
    /// Returns `TranslateError::InspectionUnsupported` unless the language
    /// implements inspection.
    fn inspect(&self, cell: &Cell) -> Result<Vec<Parameter>, TranslateError> {
        let _ = cell;
        Err(TranslateError::InspectionUnsupported(self.name().to_string()))
    }
}

/// Double-quote `value`, escaping backslashes, quotes and control characters
#[must_use]
pub fn escape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Shortest round-tripping decimal form of a finite float, always with a
/// fractional part or exponent so it never reads back as an integer
#[must_use]
pub fn float_repr(value: f64) -> String {
    format!("{value:?}")
}

/// Join rendered items with `sep`
pub(crate) fn join_rendered<I: IntoIterator>(
    items: I,
    sep: &str,
    render: impl FnMut(I::Item) -> String,
) -> String {
    items.into_iter().map(render).collect::<Vec<_>>().join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_controls() {
        assert_eq!(escape_double_quoted("foo"), "\"foo\"");
        assert_eq!(
            escape_double_quoted(r#"{"foo": "bar"}"#),
            r#""{\"foo\": \"bar\"}""#
        );
        assert_eq!(escape_double_quoted("a\\b\nc\t"), r#""a\\b\nc\t""#);
    }

    #[test]
    fn float_repr_keeps_fraction() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(1.2345), "1.2345");
        assert_eq!(float_repr(-5432.1), "-5432.1");
    }
}

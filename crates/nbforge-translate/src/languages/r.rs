//! R literals

use crate::translator::{float_repr, join_rendered, Translator};
use nbforge_document::{ParamValue, Parameters};

/// R translator, also used for SparkR kernels
#[derive(Debug, Clone, Copy, Default)]
pub struct RTranslator;

impl Translator for RTranslator {
    fn name(&self) -> &'static str {
        "R"
    }

    fn translate_none(&self) -> String {
        "NULL".to_string()
    }

    fn translate_bool(&self, value: bool) -> String {
        if value { "TRUE" } else { "FALSE" }.to_string()
    }

    fn translate_float(&self, value: f64) -> String {
        if value.is_finite() {
            float_repr(value)
        } else if value.is_nan() {
            "NaN".to_string()
        } else if value.is_sign_negative() {
            "-Inf".to_string()
        } else {
            "Inf".to_string()
        }
    }

    fn translate_list(&self, items: &[ParamValue]) -> String {
        format!("list({})", join_rendered(items, ", ", |v| self.translate(v)))
    }

    fn translate_map(&self, map: &Parameters) -> String {
        let entries = join_rendered(map, ", ", |(k, v)| {
            format!("{} = {}", self.translate_str(k), self.translate(v))
        });
        format!("list({entries})")
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}").trim().to_string()
    }

    // Leading underscores are not legal in R names.
    fn assign(&self, name: &str, literal: &str) -> String {
        format!("{} = {literal}", name.trim_start_matches('_'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbforge_document::ParamValue as V;

    #[test]
    fn translate_values() {
        let t = RTranslator;
        let mut inner = Parameters::new();
        inner.insert("bar".into(), V::from("\"baz\""));
        let mut outer = Parameters::new();
        outer.insert("foo".into(), V::Map(inner));

        assert_eq!(t.translate(&V::Map(outer)), r#"list("foo" = list("bar" = "\"baz\""))"#);
        assert_eq!(t.translate(&V::from(vec!["foo", "\"bar\""])), r#"list("foo", "\"bar\"")"#);
        assert_eq!(t.translate(&V::Bool(true)), "TRUE");
        assert_eq!(t.translate(&V::Bool(false)), "FALSE");
        assert_eq!(t.translate(&V::Null), "NULL");
        assert_eq!(t.translate(&V::Float(-5432.1)), "-5432.1");
        assert_eq!(t.translate(&V::Float(f64::NAN)), "NaN");
        assert_eq!(t.translate(&V::Float(f64::NEG_INFINITY)), "-Inf");
    }

    #[test]
    fn codify_strips_leading_underscores() {
        let mut params = Parameters::new();
        params.insert("___foo".into(), V::Int(5));
        params.insert("bar".into(), V::from(vec!["baz"]));
        assert_eq!(
            RTranslator.codify(&params, "Parameters"),
            "# Parameters\nfoo = 5\nbar = list(\"baz\")\n"
        );
    }
}

//! Scala literals

use crate::translator::{float_repr, join_rendered, Translator};
use nbforge_document::{ParamValue, Parameters};

/// Scala translator, also used for Spark kernels
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalaTranslator;

impl Translator for ScalaTranslator {
    fn name(&self) -> &'static str {
        "scala"
    }

    /// Values outside the `Int` range need the `Long` suffix
    fn translate_int(&self, value: i64) -> String {
        if i32::try_from(value).is_ok() {
            value.to_string()
        } else {
            format!("{value}L")
        }
    }

    fn translate_float(&self, value: f64) -> String {
        if value.is_finite() {
            float_repr(value)
        } else if value.is_nan() {
            "Double.NaN".to_string()
        } else if value.is_sign_negative() {
            "Double.NegativeInfinity".to_string()
        } else {
            "Double.PositiveInfinity".to_string()
        }
    }

    fn translate_list(&self, items: &[ParamValue]) -> String {
        format!("Seq({})", join_rendered(items, ", ", |v| self.translate(v)))
    }

    fn translate_map(&self, map: &Parameters) -> String {
        let entries = join_rendered(map, ", ", |(k, v)| {
            format!("{} -> {}", self.translate_str(k), self.translate(v))
        });
        format!("Map({entries})")
    }

    fn comment(&self, text: &str) -> String {
        format!("// {text}").trim().to_string()
    }

    fn assign(&self, name: &str, literal: &str) -> String {
        format!("val {name} = {literal}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbforge_document::ParamValue as V;

    #[test]
    fn long_suffix_outside_int_range() {
        let t = ScalaTranslator;
        assert_eq!(t.translate(&V::Int(2_147_483_647)), "2147483647");
        assert_eq!(t.translate(&V::Int(2_147_483_648)), "2147483648L");
        assert_eq!(t.translate(&V::Int(-2_147_483_649)), "-2147483649L");
    }

    #[test]
    fn collections_and_assign() {
        let t = ScalaTranslator;
        let mut map = Parameters::new();
        map.insert("foo".into(), V::from(vec![1i64, 2]));
        assert_eq!(t.translate(&V::Map(map.clone())), r#"Map("foo" -> Seq(1, 2))"#);
        assert_eq!(t.translate(&V::Null), "None");
        assert_eq!(t.translate(&V::Bool(true)), "true");
        assert_eq!(t.comment(""), "//");
        assert_eq!(
            t.codify(&map, "Parameters"),
            "// Parameters\nval foo = Seq(1, 2)\n"
        );
    }
}

//! Julia literals

use crate::translator::{float_repr, join_rendered, Translator};
use nbforge_document::{ParamValue, Parameters};

/// Julia translator
#[derive(Debug, Clone, Copy, Default)]
pub struct JuliaTranslator;

impl Translator for JuliaTranslator {
    fn name(&self) -> &'static str {
        "julia"
    }

    fn translate_none(&self) -> String {
        "nothing".to_string()
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
        format!("[{}]", join_rendered(items, ", ", |v| self.translate(v)))
    }

    fn translate_map(&self, map: &Parameters) -> String {
        let entries = join_rendered(map, ", ", |(k, v)| {
            format!("{} => {}", self.translate_str(k), self.translate(v))
        });
        format!("Dict({entries})")
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}").trim().to_string()
    }
}

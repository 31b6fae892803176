//! Python literals

use crate::error::TranslateError;
use crate::inspect::{inspect_python, Parameter};
use crate::translator::{float_repr, join_rendered, Translator};
use nbforge_document::{Cell, ParamValue, Parameters};

/// Python translator, also used for PySpark kernels
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonTranslator;

impl Translator for PythonTranslator {
    fn name(&self) -> &'static str {
        "python"
    }

    fn translate_bool(&self, value: bool) -> String {
        if value { "True" } else { "False" }.to_string()
    }

    fn translate_float(&self, value: f64) -> String {
        if value.is_finite() {
            float_repr(value)
        } else if value.is_nan() {
            "float('nan')".to_string()
        } else if value.is_sign_negative() {
            "float('-inf')".to_string()
        } else {
            "float('inf')".to_string()
        }
    }

    fn translate_list(&self, items: &[ParamValue]) -> String {
        format!("[{}]", join_rendered(items, ", ", |v| self.translate(v)))
    }

    fn translate_map(&self, map: &Parameters) -> String {
        let entries = join_rendered(map, ", ", |(k, v)| {
            format!("{}: {}", self.translate_str(k), self.translate(v))
        });
        format!("{{{entries}}}")
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}").trim().to_string()
    }

    fn inspect(&self, cell: &Cell) -> Result<Vec<Parameter>, TranslateError> {
        inspect_python(&cell.source)
    }
}

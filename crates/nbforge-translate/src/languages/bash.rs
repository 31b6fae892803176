//! Bash literals
//!
//! Strings are shell-quoted: left bare when every character is safe,
//! otherwise single-quoted with embedded apostrophes spliced as `'"'"'`.

use crate::translator::{join_rendered, Translator};
use nbforge_document::{ParamValue, Parameters};

/// Bash translator
#[derive(Debug, Clone, Copy, Default)]
pub struct BashTranslator;

fn is_shell_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "_@%+=:,./-".contains(ch)
}

/// Quote `value` for a POSIX shell
#[must_use]
pub fn shell_quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    if value.chars().all(is_shell_safe) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

impl Translator for BashTranslator {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn translate_str(&self, value: &str) -> String {
        shell_quote(value)
    }

    fn translate_none(&self) -> String {
        String::new()
    }

    fn translate_list(&self, items: &[ParamValue]) -> String {
        format!("({})", join_rendered(items, " ", |v| self.translate(v)))
    }

    /// Associative-array literal, `([key]=value ...)`
    fn translate_map(&self, map: &Parameters) -> String {
        let entries = join_rendered(map, " ", |(k, v)| {
            format!("[{}]={}", shell_quote(k), self.translate(v))
        });
        format!("({entries})")
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}").trim().to_string()
    }

    fn assign(&self, name: &str, literal: &str) -> String {
        format!("{name}={literal}")
    }
}

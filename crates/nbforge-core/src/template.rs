//! Path templating
//!
//! Input and output paths may reference run parameters with `{name}`,
//! `{name[key]}`, `{name.key}` and `{name:FORMAT}` fields. `{{` and `}}`
//! produce literal braces. Built-in values live under `nb`:
//!
//! | Field | Value |
//! |---|---|
//! | `nb.run_uuid` | fresh UUID for the run |
//! | `nb.current_datetime_local` | local wall-clock time |
//! | `nb.current_datetime_utc` | UTC time |
//!
//! Datetime fields take a strftime format; other values take a
//! `[[fill]align][0][width][.precision][type]` format with types
//! `s`, `d` and `f`.

use crate::error::NbforgeError;
use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDateTime, Utc};
use indexmap::IndexMap;
use nbforge_document::{ParamValue, Parameters};
use nbforge_translate::translator::float_repr;
use nbforge_translate::{PythonTranslator, Translator};
use std::fmt::Write as _;

/// Key of the built-in parameter group
pub const BUILTIN_GROUP: &str = "nb";

/// A value a path template can reference
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    /// A run parameter
    Param(ParamValue),
    /// A timestamp
    Time(NaiveDateTime),
    /// Named sub-values
    Group(IndexMap<String, TemplateValue>),
}

/// Values available to path templates
pub type PathParameters = IndexMap<String, TemplateValue>;

/// Built-in values merged under the caller's parameters
///
/// Caller parameters win on key collision, including `nb`.
#[must_use]
pub fn add_builtin_parameters(parameters: &Parameters) -> PathParameters {
    let mut builtins = IndexMap::new();
    builtins.insert(
        "run_uuid".to_string(),
        TemplateValue::Param(ParamValue::Str(uuid::Uuid::new_v4().to_string())),
    );
    builtins.insert(
        "current_datetime_local".to_string(),
        TemplateValue::Time(Local::now().naive_local()),
    );
    builtins.insert(
        "current_datetime_utc".to_string(),
        TemplateValue::Time(Utc::now().naive_utc()),
    );

    let mut values = PathParameters::new();
    values.insert(BUILTIN_GROUP.to_string(), TemplateValue::Group(builtins));
    for (name, value) in parameters {
        values.insert(name.clone(), TemplateValue::Param(value.clone()));
    }
    values
}

/// Resolve the fields of a path template
///
/// # Errors
///
/// Returns `NbforgeError::MissingParameter` for a field without a value
/// and `NbforgeError::Template` for malformed templates or formats.
pub fn render_path(template: &str, values: &PathParameters) -> Result<String, NbforgeError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    field.push(next);
                }
                if !closed {
                    return Err(NbforgeError::template(template, "unmatched '{' in format spec"));
                }
                out.push_str(&render_field(template, &field, values)?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(NbforgeError::template(
                    template,
                    "single '}' encountered in format string",
                ))
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Resolve a template when there is one
///
/// # Errors
///
/// See [`render_path`].
pub fn render_optional_path(
    template: Option<&str>,
    values: &PathParameters,
) -> Result<Option<String>, NbforgeError> {
    template.map(|t| render_path(t, values)).transpose()
}

#[derive(Clone, Copy)]
enum Resolved<'v> {
    Template(&'v TemplateValue),
    Param(&'v ParamValue),
}

fn render_field(template: &str, field: &str, values: &PathParameters) -> Result<String, NbforgeError> {
    let (expr, spec) = field.split_once(':').unwrap_or((field, ""));
    let expr = expr.split_once('!').map_or(expr, |(e, _)| e);

    let name_end = expr.find(['.', '[']).unwrap_or(expr.len());
    let name = &expr[..name_end];
    if name.is_empty() {
        return Err(NbforgeError::template(template, "positional fields are not supported"));
    }
    let mut current = values
        .get(name)
        .map(Resolved::Template)
        .ok_or_else(|| NbforgeError::MissingParameter(name.to_string()))?;

    let mut rest = &expr[name_end..];
    while !rest.is_empty() {
        let (key, remaining) = if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            (&after[..end], &after[end..])
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after
                .find(']')
                .ok_or_else(|| NbforgeError::template(template, "missing ']' in field"))?;
            (&after[..end], &after[end + 1..])
        } else {
            return Err(NbforgeError::template(template, "only '.' or '[' may follow ']'"));
        };
        current = lookup(current, key).ok_or_else(|| NbforgeError::MissingParameter(expr.to_string()))?;
        rest = remaining;
    }

    match current {
        Resolved::Template(TemplateValue::Time(time)) => render_time(template, time, spec),
        Resolved::Template(TemplateValue::Param(param)) | Resolved::Param(param) => {
            render_param(template, param, spec)
        }
        Resolved::Template(TemplateValue::Group(_)) => {
            Err(NbforgeError::template(template, "cannot format a parameter group"))
        }
    }
}

fn lookup<'v>(value: Resolved<'v>, key: &str) -> Option<Resolved<'v>> {
    let param = match value {
        Resolved::Template(TemplateValue::Group(group)) => return group.get(key).map(Resolved::Template),
        Resolved::Template(TemplateValue::Time(_)) => return None,
        Resolved::Template(TemplateValue::Param(param)) | Resolved::Param(param) => param,
    };
    match param {
        ParamValue::Map(map) => map.get(key).map(Resolved::Param),
        ParamValue::List(items) => items.get(key.parse::<usize>().ok()?).map(Resolved::Param),
        _ => None,
    }
}

fn render_time(template: &str, time: &NaiveDateTime, spec: &str) -> Result<String, NbforgeError> {
    let spec = if spec.is_empty() { "%Y-%m-%d %H:%M:%S%.6f" } else { spec };
    if StrftimeItems::new(spec).any(|item| matches!(item, Item::Error)) {
        return Err(NbforgeError::template(template, format!("invalid datetime format '{spec}'")));
    }
    let mut out = String::new();
    write!(out, "{}", time.format_with_items(StrftimeItems::new(spec)))
        .map_err(|_| NbforgeError::template(template, format!("invalid datetime format '{spec}'")))?;
    Ok(out)
}

#[allow(clippy::cast_precision_loss)]
fn render_param(template: &str, param: &ParamValue, spec: &str) -> Result<String, NbforgeError> {
    let spec = FormatSpec::parse(spec).ok_or_else(|| {
        NbforgeError::template(template, format!("invalid format specifier '{spec}'"))
    })?;
    let wrong_code = || {
        NbforgeError::template(
            template,
            format!("unknown format code for a {} value", param.kind_name()),
        )
    };
    let (text, numeric) = match param {
        ParamValue::Float(v) => match (spec.kind, spec.precision) {
            (Some('d'), _) => return Err(wrong_code()),
            (Some('f'), precision) => (format!("{:.*}", precision.unwrap_or(6), v), true),
            (_, Some(precision)) => (format!("{v:.precision$}"), true),
            (_, None) => (float_repr(*v), true),
        },
        ParamValue::Int(v) => match spec.kind {
            Some('f') => (format!("{:.*}", spec.precision.unwrap_or(6), *v as f64), true),
            _ => (v.to_string(), true),
        },
        _ if matches!(spec.kind, Some('d' | 'f')) => return Err(wrong_code()),
        _ => {
            let mut text = display_param(param);
            if let Some(precision) = spec.precision {
                text = text.chars().take(precision).collect();
            }
            (text, false)
        }
    };
    Ok(spec.pad(&text, numeric))
}

fn display_param(param: &ParamValue) -> String {
    match param {
        ParamValue::Str(s) => s.clone(),
        ParamValue::Null => "None".to_string(),
        ParamValue::Bool(true) => "True".to_string(),
        ParamValue::Bool(false) => "False".to_string(),
        ParamValue::Int(v) => v.to_string(),
        ParamValue::Float(v) => float_repr(*v),
        ParamValue::List(_) | ParamValue::Map(_) => PythonTranslator.translate(param),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = Self::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
        if chars.len() >= 2 && is_align(chars[1]) {
            parsed.fill = Some(chars[0]);
            parsed.align = Some(chars[1]);
            i = 2;
        } else if chars.first().copied().is_some_and(is_align) {
            parsed.align = chars.first().copied();
            i = 1;
        }
        if chars.get(i) == Some(&'0') {
            parsed.zero = true;
            i += 1;
        }
        let width_start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        if i > width_start {
            parsed.width = chars[width_start..i].iter().collect::<String>().parse().ok()?;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(char::is_ascii_digit) {
                i += 1;
            }
            parsed.precision = Some(chars[start..i].iter().collect::<String>().parse().ok()?);
        }
        match chars.get(i) {
            None => {}
            Some(&c) if matches!(c, 's' | 'd' | 'f') && i + 1 == chars.len() => {
                parsed.kind = Some(c);
            }
            Some(_) => return None,
        }
        Some(parsed)
    }

    fn pad(&self, text: &str, numeric: bool) -> String {
        let len = text.chars().count();
        if len >= self.width {
            return text.to_string();
        }
        let missing = self.width - len;
        let (fill, align) = match (self.fill, self.align, self.zero && numeric) {
            (Some(fill), Some(align), _) => (fill, align),
            (None, Some(align), true) => ('0', align),
            (None, Some(align), false) => (' ', align),
            (_, None, true) => ('0', '='),
            (_, None, false) => (' ', if numeric { '>' } else { '<' }),
        };
        let fill_str = |n: usize| fill.to_string().repeat(n);
        match align {
            '<' => format!("{text}{}", fill_str(missing)),
            '^' => format!("{}{text}{}", fill_str(missing / 2), fill_str(missing - missing / 2)),
            '=' => match text.strip_prefix('-') {
                Some(digits) => format!("-{}{digits}", fill_str(missing)),
                None => format!("{}{text}", fill_str(missing)),
            },
            _ => format!("{}{text}", fill_str(missing)),
        }
    }
}

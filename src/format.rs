//! Declarative output transforms selected by `--format`.

use crate::error::{AdminError, SpecError, UsageError};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;

static RAW: Transform = Transform::Raw;

/// One `s/pattern/replacement/` rule applied to a single line.
#[derive(Debug, Clone)]
pub struct Substitution {
    pattern: Regex,
    replacement: String,
}

#[derive(Debug, Clone)]
pub enum Transform {
    /// Pass the body through unchanged.
    Raw,
    /// Line-oriented substitution. With `filter`, lines no rule matched are dropped.
    Substitute {
        rules: Vec<Substitution>,
        filter: bool,
    },
    /// One field per JSON record, one record per line.
    Project {
        records: Option<String>,
        field: String,
    },
    /// Several fields per JSON record, tab-joined in declared order.
    Table {
        records: Option<String>,
        fields: Vec<String>,
    },
}

impl Transform {
    /// Builds a substitution transform from `(pattern, replacement)` pairs.
    ///
    /// Replacements use `$1`/`${name}` capture syntax.
    pub fn substitute(rules: &[(&str, &str)], filter: bool) -> Result<Self, SpecError> {
        let rules = rules
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|pattern| Substitution {
                        pattern,
                        replacement: replacement.to_string(),
                    })
                    .map_err(|e| SpecError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Transform::Substitute { rules, filter })
    }

    /// `records` is a JSON pointer to the record array; `None` means the root.
    pub fn project(records: Option<&str>, field: &str) -> Self {
        Transform::Project {
            records: records.map(str::to_string),
            field: field.to_string(),
        }
    }

    pub fn table(records: Option<&str>, fields: &[&str]) -> Self {
        Transform::Table {
            records: records.map(str::to_string),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Applies the transform to a successful result body.
    pub fn apply(&self, body: &str) -> Result<String, AdminError> {
        match self {
            Transform::Raw => Ok(body.to_string()),
            Transform::Substitute { rules, filter } => Ok(substitute_lines(body, rules, *filter)),
            Transform::Project { records, field } => {
                let rows = records_of(body, records.as_deref())?;
                Ok(join_lines(rows.iter().map(|r| render(lookup(r, field)))))
            }
            Transform::Table { records, fields } => {
                let rows = records_of(body, records.as_deref())?;
                Ok(join_lines(rows.iter().map(|r| {
                    fields
                        .iter()
                        .map(|f| render(lookup(r, f)))
                        .collect::<Vec<_>>()
                        .join("\t")
                })))
            }
        }
    }
}

fn substitute_lines(body: &str, rules: &[Substitution], filter: bool) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let mut current = line.to_string();
        let mut matched = false;
        for rule in rules {
            if rule.pattern.is_match(&current) {
                matched = true;
                current = rule
                    .pattern
                    .replace(&current, rule.replacement.as_str())
                    .into_owned();
            }
        }
        if matched || !filter {
            kept.push(current);
        }
    }
    join_lines(kept.into_iter())
}

fn records_of(body: &str, pointer: Option<&str>) -> Result<Vec<Value>, AdminError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| AdminError::Output(format!("response is not JSON: {}", e)))?;
    let target = match pointer {
        Some(p) => root
            .pointer(p)
            .ok_or_else(|| AdminError::Output(format!("response has no records at {}", p)))?,
        None => &root,
    };
    match target {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(_) => Ok(vec![target.clone()]),
        other => Err(AdminError::Output(format!(
            "expected records, found {}",
            other
        ))),
    }
}

/// Follows a dotted path such as `namespace.full_path` or `errors.0.msg`.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn join_lines(lines: impl Iterator<Item = String>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Selector tokens accepted by one route, each bound to a transform.
#[derive(Debug, Clone, Default)]
pub struct FormatTable {
    transforms: BTreeMap<&'static str, Transform>,
}

impl FormatTable {
    pub fn insert(&mut self, selector: &'static str, transform: Transform) {
        self.transforms.insert(selector, transform);
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn selectors(&self) -> Vec<&'static str> {
        self.transforms.keys().copied().collect()
    }

    /// Resolves a selector. No selector means raw passthrough.
    ///
    /// # Errors
    ///
    /// [`UsageError::UnknownSelector`] for any token not in the table.
    pub fn resolve(&self, selector: Option<&str>) -> Result<&Transform, UsageError> {
        let Some(selector) = selector else {
            return Ok(&RAW);
        };
        self.transforms
            .get(selector)
            .ok_or_else(|| UsageError::UnknownSelector {
                selector: selector.to_string(),
                expected: self.selectors().join(", "),
            })
    }
}

/// Transforms a successful body and writes it out.
///
/// `None` means the call legitimately returned nothing; nothing is written.
pub fn emit<W: Write + ?Sized>(
    transform: &Transform,
    body: Option<&str>,
    out: &mut W,
) -> Result<(), AdminError> {
    let Some(body) = body else {
        return Ok(());
    };
    let text = transform.apply(body)?;
    out.write_all(text.as_bytes())
        .map_err(|e| AdminError::Output(e.to_string()))?;
    Ok(())
}

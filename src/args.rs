//! Declarative flag specifications and per-flag validation.
//!
//! Every handler declares the flags it accepts with a compact spec string:
//!
//! ```text
//! --name=        required, takes a value
//! [--mail=]      optional, takes a value
//! --confirm      required presence marker
//! [--force]      optional presence marker
//! ```
//!
//! [`ArgSpec::bind`] turns the raw command-line tail into [`BoundArgs`], and
//! [`Validators::validate`] checks every bound value against the rule
//! registered for its flag name. Both run before any external call is made.

use crate::error::{SpecError, UsageError};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One accepted command-line option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    pub required: bool,
    pub takes_value: bool,
}

impl FlagSpec {
    fn parse(entry: &str) -> Result<Self, SpecError> {
        let malformed = || SpecError::MalformedFlag(entry.to_string());

        let (body, required) = match entry.strip_prefix('[') {
            Some(inner) => (inner.strip_suffix(']').ok_or_else(malformed)?, false),
            None => (entry, true),
        };
        let (name, takes_value) = match body.strip_suffix('=') {
            Some(name) => (name, true),
            None => (body, false),
        };

        let bare = name.strip_prefix("--").ok_or_else(malformed)?;
        if bare.is_empty()
            || bare.starts_with('-')
            || !bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(malformed());
        }

        Ok(Self {
            name: name.to_string(),
            required,
            takes_value,
        })
    }

    fn render(&self) -> String {
        let body = if self.takes_value {
            format!("{}=", self.name)
        } else {
            self.name.clone()
        };
        if self.required {
            body
        } else {
            format!("[{}]", body)
        }
    }
}

/// The full set of flags one handler accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSpec {
    flags: Vec<FlagSpec>,
}

impl ArgSpec {
    /// Parses a whitespace-separated spec string.
    ///
    /// # Errors
    ///
    /// Fails on malformed entries and on names declared more than once.
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        let mut parsed = Self::default();
        for entry in spec.split_whitespace() {
            parsed = parsed.with_flag(FlagSpec::parse(entry)?)?;
        }
        Ok(parsed)
    }

    /// Appends one flag, rejecting a name that is already declared.
    pub fn with_flag(mut self, flag: FlagSpec) -> Result<Self, SpecError> {
        if self.find(&flag.name).is_some() {
            return Err(SpecError::DuplicateFlag {
                flag: flag.name,
                spec: self.render(),
            });
        }
        self.flags.push(flag);
        Ok(self)
    }

    pub fn flags(&self) -> &[FlagSpec] {
        &self.flags
    }

    pub fn find(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Renders the flag list back into its declarative form for usage text.
    pub fn render(&self) -> String {
        self.flags
            .iter()
            .map(FlagSpec::render)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Scans `tokens` left to right and binds every declared flag found.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an undeclared token, a repeated flag,
    /// a value-bearing flag at the end of the line, or a missing required flag.
    pub fn bind(&self, tokens: &[String]) -> Result<BoundArgs, UsageError> {
        let mut bound = BoundArgs::default();
        let mut iter = tokens.iter();

        while let Some(token) = iter.next() {
            let flag = self
                .find(token)
                .ok_or_else(|| UsageError::UnknownFlag(token.clone()))?;

            if bound.contains(&flag.name) {
                return Err(UsageError::RepeatedFlag(flag.name.clone()));
            }

            if flag.takes_value {
                let value = iter
                    .next()
                    .ok_or_else(|| UsageError::MissingValue(flag.name.clone()))?;
                bound.values.insert(flag.name.clone(), value.clone());
            } else {
                bound.switches.insert(flag.name.clone());
            }
        }

        if let Some(missing) = self
            .flags
            .iter()
            .find(|f| f.required && !bound.contains(&f.name))
        {
            return Err(UsageError::MissingFlag(missing.name.clone()));
        }

        Ok(bound)
    }
}

/// Flags present on one command line.
///
/// Absent optional flags are simply missing; they are never stored as empty
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    values: BTreeMap<String, String>,
    switches: BTreeSet<String>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value of a flag declared as required.
    pub fn require(&self, name: &str) -> Result<&str, UsageError> {
        self.get(name)
            .ok_or_else(|| UsageError::MissingFlag(name.to_string()))
    }

    /// Whether a presence-marker flag was given.
    pub fn is_set(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.switches.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.switches.contains(name)
    }
}

/// A pure predicate over one flag value.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Every character must be ASCII alphanumeric (when enabled) or in `extra`.
    AllowList {
        max_len: usize,
        alphanumeric: bool,
        extra: String,
    },
    /// The whole value must match the expression.
    Pattern { max_len: usize, regex: Regex },
}

impl Rule {
    /// ASCII letters and digits plus the given extra characters.
    pub fn alphanumeric(max_len: usize, extra: &str) -> Self {
        Rule::AllowList {
            max_len,
            alphanumeric: true,
            extra: extra.to_string(),
        }
    }

    /// Exactly the given characters.
    pub fn chars(max_len: usize, allowed: &str) -> Self {
        Rule::AllowList {
            max_len,
            alphanumeric: false,
            extra: allowed.to_string(),
        }
    }

    /// A regular expression that must match the entire value.
    pub fn pattern(max_len: usize, pattern: &str) -> Result<Self, SpecError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            SpecError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Rule::Pattern { max_len, regex })
    }

    fn max_len(&self) -> usize {
        match self {
            Rule::AllowList { max_len, .. } | Rule::Pattern { max_len, .. } => *max_len,
        }
    }

    /// Checks `value`, describing the violated constraint on failure.
    pub fn check(&self, value: &str) -> Result<(), String> {
        let len = value.chars().count();
        if len > self.max_len() {
            return Err(format!(
                "exceeds maximum length of {} ({} given)",
                self.max_len(),
                len
            ));
        }

        match self {
            Rule::AllowList {
                alphanumeric,
                extra,
                ..
            } => {
                let bad = value
                    .chars()
                    .find(|c| !((*alphanumeric && c.is_ascii_alphanumeric()) || extra.contains(*c)));
                match bad {
                    Some(c) => Err(format!("character '{}' is not allowed", c)),
                    None => Ok(()),
                }
            }
            Rule::Pattern { regex, .. } => {
                if regex.is_match(value) {
                    Ok(())
                } else {
                    Err(format!("does not match {}", regex.as_str()))
                }
            }
        }
    }
}

/// Validation rules keyed by flag name, assembled once per tool at startup.
#[derive(Debug, Clone, Default)]
pub struct Validators {
    rules: HashMap<String, Rule>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, flag: &str, rule: Rule) -> Self {
        self.rules.insert(flag.to_string(), rule);
        self
    }

    pub fn get(&self, flag: &str) -> Option<&Rule> {
        self.rules.get(flag)
    }

    /// Checks every present value in spec order.
    ///
    /// Absent optional flags are skipped, and flags with no registered rule
    /// are accepted unchecked.
    pub fn validate(&self, spec: &ArgSpec, args: &BoundArgs) -> Result<(), UsageError> {
        for flag in spec.flags() {
            let (Some(value), Some(rule)) = (args.get(&flag.name), self.get(&flag.name)) else {
                continue;
            };
            rule.check(value).map_err(|reason| UsageError::InvalidValue {
                flag: flag.name.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

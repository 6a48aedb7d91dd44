use crate::error::{AdminError, AdminResult};
use std::collections::{BTreeMap, BTreeSet};

/// Flags that never take a value.
const SWITCHES: [&str; 6] = ["yes", "replace", "anonymous", "no-criticality", "inactive", "all"];

/// `positional... --flag value --switch`. Repeated flags keep every value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub positional: Vec<String>,
    flags: BTreeMap<String, Vec<String>>,
    switches: BTreeSet<String>,
}

impl CliArgs {
    pub fn parse<I, S>(args: I) -> AdminResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self::default();
        let mut iter = args.into_iter().map(Into::into).peekable();
        while let Some(arg) = iter.next() {
            let Some(name) = arg.strip_prefix("--") else {
                out.positional.push(arg);
                continue;
            };
            if let Some((key, value)) = name.split_once('=') {
                out.flags
                    .entry(key.to_string())
                    .or_default()
                    .push(value.to_string());
                continue;
            }
            if SWITCHES.contains(&name) {
                out.switches.insert(name.to_string());
                continue;
            }
            match iter.next_if(|next| !next.starts_with("--")) {
                Some(value) => out.flags.entry(name.to_string()).or_default().push(value),
                None => return Err(AdminError::Usage(format!("--{name} needs a value"))),
            }
        }
        Ok(out)
    }

    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    pub fn require_positional(&self, index: usize, what: &str) -> AdminResult<&str> {
        self.positional(index)
            .ok_or_else(|| AdminError::Usage(format!("missing {what}")))
    }

    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    pub fn flag_values(&self, name: &str) -> &[String] {
        self.flags.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn switch(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    pub fn parsed_flag<V: std::str::FromStr>(&self, name: &str) -> AdminResult<Option<V>>
    where
        V::Err: std::fmt::Display,
    {
        self.flag(name)
            .map(|raw| {
                raw.parse::<V>()
                    .map_err(|e| AdminError::Usage(format!("--{name}: {e}")))
            })
            .transpose()
    }
}

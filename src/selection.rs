// src/selection.rs

//! Selection language: decides which tasks the user asked for.
//!
//! A selection is an ordered list of tokens:
//!
//! - `all`        select everything
//! - `all_<tag>`  select tasks carrying `<tag>` or whose component is `<tag>`
//! - `no`         deselect everything
//! - `no_<tag>`   deselect tasks carrying `<tag>`, whose component is `<tag>`,
//!   or whose task name is `<tag>`
//! - `<name>`     select the task whose task name is `<name>`
//!
//! Tokens are applied left to right against one candidate at a time; the
//! last token that matches the candidate wins. Nothing matching means the
//! task is not wanted.

use std::fmt;
use std::str::FromStr;

use crate::task::TaskDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    All,
    AllTag(String),
    No,
    NoTag(String),
    Name(String),
}

impl SelectionToken {
    /// `Some(verdict)` if this token matches the candidate, `None` otherwise.
    fn verdict_for(&self, task: &TaskDescriptor) -> Option<bool> {
        match self {
            SelectionToken::All => Some(true),
            SelectionToken::No => Some(false),
            SelectionToken::AllTag(tag) => {
                (task.tags.contains(tag) || task.component == *tag).then_some(true)
            }
            SelectionToken::NoTag(tag) => (task.tags.contains(tag)
                || task.component == *tag
                || task.id.task == *tag)
                .then_some(false),
            SelectionToken::Name(name) => (task.id.task == *name).then_some(true),
        }
    }
}

impl FromStr for SelectionToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty selection token".to_string());
        }

        let token = match s {
            "all" => SelectionToken::All,
            "no" => SelectionToken::No,
            _ => {
                if let Some(tag) = s.strip_prefix("all_") {
                    SelectionToken::AllTag(tag.to_string())
                } else if let Some(tag) = s.strip_prefix("no_") {
                    SelectionToken::NoTag(tag.to_string())
                } else {
                    SelectionToken::Name(s.to_string())
                }
            }
        };
        Ok(token)
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionToken::All => f.write_str("all"),
            SelectionToken::No => f.write_str("no"),
            SelectionToken::AllTag(tag) => write!(f, "all_{tag}"),
            SelectionToken::NoTag(tag) => write!(f, "no_{tag}"),
            SelectionToken::Name(name) => f.write_str(name),
        }
    }
}

/// Parsed selection expression list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    tokens: Vec<SelectionToken>,
}

impl Selection {
    pub fn new(tokens: Vec<SelectionToken>) -> Self {
        Self { tokens }
    }

    /// Parse tokens, skipping blank entries.
    pub fn parse<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = items
            .into_iter()
            .filter_map(|s| s.as_ref().parse::<SelectionToken>().ok())
            .collect();
        Self { tokens }
    }

    /// Parse a comma-separated list such as `"all,no_sose,climatologyMapSst"`.
    pub fn from_csv(s: &str) -> Self {
        Self::parse(s.split(','))
    }

    pub fn tokens(&self) -> &[SelectionToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Evaluate the token list against one candidate.
    pub fn wants(&self, task: &TaskDescriptor) -> bool {
        let mut generate = false;
        for token in &self.tokens {
            if let Some(verdict) = token.verdict_for(task) {
                generate = verdict;
            }
        }
        generate
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.tokens.iter().map(|t| t.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

// src/config/view.rs

//! Opaque section/option store handed to tasks.
//!
//! The scheduling core never interprets these values; tasks query them by
//! section and option name during `validate()` and `execute()`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::ValidationError;

static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}"));

#[derive(Debug, Clone, Default)]
pub struct ConfigView {
    sections: toml::Table,
}

impl ConfigView {
    pub fn new(sections: toml::Table) -> Self {
        Self { sections }
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.section(section).is_some()
    }

    pub fn section(&self, section: &str) -> Option<&toml::Table> {
        self.sections.get(section).and_then(|v| v.as_table())
    }

    pub fn get(&self, section: &str, option: &str) -> Option<&toml::Value> {
        self.section(section).and_then(|t| t.get(option))
    }

    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.get(section, option).is_some()
    }

    /// Option rendered as text: strings as-is, arrays space-separated,
    /// other scalars in their TOML form.
    pub fn get_string(&self, section: &str, option: &str) -> Option<String> {
        self.get(section, option).map(render_value)
    }

    /// Require an option to be present.
    pub fn require(&self, section: &str, option: &str) -> Result<&toml::Value, ValidationError> {
        if !self.has_section(section) {
            return Err(ValidationError::MissingSection(section.to_string()));
        }
        self.get(section, option)
            .ok_or_else(|| ValidationError::MissingOption {
                section: section.to_string(),
                option: option.to_string(),
            })
    }

    /// Look up a `section.option` key.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let (section, option) = split_key(key)?;
        self.get_string(section, option)
    }

    /// Replace every `${section.option}` in `s`. Keys that are not options
    /// fall back to environment variables; anything else is an error.
    pub fn interpolate(&self, s: &str) -> Result<String, ValidationError> {
        let placeholder = PLACEHOLDER
            .as_ref()
            .map_err(|e| ValidationError::Failed(format!("placeholder pattern: {e}")))?;
        let mut missing: Option<String> = None;

        let out = placeholder.replace_all(s, |caps: &Captures| {
            let key = caps[1].trim();
            if let Some(value) = self.lookup(key) {
                return value;
            }
            if let Ok(value) = std::env::var(key) {
                return value;
            }
            if missing.is_none() {
                missing = Some(key.to_string());
            }
            String::new()
        });

        match missing {
            Some(key) => Err(ValidationError::UnresolvedPlaceholder(key)),
            None => Ok(out.into_owned()),
        }
    }
}

/// Split `section.option` on the first dot.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (section, option) = key.split_once('.')?;
    if section.is_empty() || option.is_empty() {
        return None;
    }
    Some((section, option))
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ConfigView {
        let table: toml::Table = toml::from_str(
            r#"
[climatologyMapSst]
seasons = ["JFM", "JAS"]
depth = 100

[oceanObservations]
baseDirectory = "/data/obs"
"#,
        )
        .unwrap();
        ConfigView::new(table)
    }

    #[test]
    fn renders_scalars_and_arrays() {
        let v = view();
        assert_eq!(v.lookup("climatologyMapSst.seasons").as_deref(), Some("JFM JAS"));
        assert_eq!(v.lookup("climatologyMapSst.depth").as_deref(), Some("100"));
        assert_eq!(v.lookup("oceanObservations.baseDirectory").as_deref(), Some("/data/obs"));
        assert_eq!(v.lookup("nodot"), None);
    }

    #[test]
    fn interpolates_known_keys_and_reports_unknown_ones() {
        let v = view();
        assert_eq!(
            v.interpolate("plot ${oceanObservations.baseDirectory}/sst.nc").unwrap(),
            "plot /data/obs/sst.nc"
        );
        assert_eq!(
            v.interpolate("${nothere.option}"),
            Err(ValidationError::UnresolvedPlaceholder("nothere.option".to_string()))
        );
    }

    #[test]
    fn require_distinguishes_missing_section_and_option() {
        let v = view();
        assert!(v.require("climatologyMapSst", "seasons").is_ok());
        assert!(matches!(
            v.require("climatologyMapSst", "grids"),
            Err(ValidationError::MissingOption { .. })
        ));
        assert!(matches!(
            v.require("sose", "seasons"),
            Err(ValidationError::MissingSection(_))
        ));
    }
}

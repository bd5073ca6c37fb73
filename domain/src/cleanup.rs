//! Path cleanup: turns titles and hand-typed paths into URL-safe resource locators.
//!
//! Cleanup runs in a fixed order:
//! 1. the locale replacer table, then the default table (ordered string replacements)
//! 2. split on `/`, transliterate each part to ASCII with `deunicode`
//! 3. lowercase, map whitespace to `-`, drop anything outside `[a-z0-9-]`
//! 4. collapse hyphen runs, trim hyphens, drop empty segments
//!
//! The result is always absolute and always passes [`PathCleanup::validate`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::validate::{is_segment_char, is_valid_path, ROOT_PATH};
use crate::CoreError;

/// One `(pattern, replacement)` pair.
pub type Replacement = (String, String);

/// Replacer tables keyed by locale, loaded once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacerTables {
    /// Applied for every locale, after the locale table.
    #[serde(default)]
    pub default: Vec<Replacement>,
    /// Locale code (lowercase) to its table.
    #[serde(default)]
    pub locales: BTreeMap<String, Vec<Replacement>>,
}

fn pairs(raw: &[(&str, &str)]) -> Vec<Replacement> {
    raw.iter()
        .map(|(p, r)| ((*p).to_string(), (*r).to_string()))
        .collect()
}

impl ReplacerTables {
    /// Built-in tables covering common punctuation and a handful of locales.
    pub fn builtin() -> Self {
        let mut locales = BTreeMap::new();
        locales.insert(
            "de".to_string(),
            pairs(&[
                ("ä", "ae"),
                ("ö", "oe"),
                ("ü", "ue"),
                ("Ä", "ae"),
                ("Ö", "oe"),
                ("Ü", "ue"),
                ("ß", "ss"),
                ("&", "und"),
            ]),
        );
        locales.insert("en".to_string(), pairs(&[("&", "and")]));
        locales.insert("fr".to_string(), pairs(&[("&", "et")]));
        locales.insert("nl".to_string(), pairs(&[("&", "en")]));
        locales.insert("es".to_string(), pairs(&[("&", "y")]));
        locales.insert("it".to_string(), pairs(&[("&", "e")]));
        Self {
            default: pairs(&[(" ", "-"), ("+", "-"), (".", "-"), ("_", "-")]),
            locales,
        }
    }

    /// Parse tables from JSON, e.g. `{"default": [["+", "-"]], "locales": {"de": [["ä", "ae"]]}}`.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let mut tables: ReplacerTables = serde_json::from_str(raw)
            .map_err(|e| CoreError::InvalidConfig(format!("replacer tables: {e}")))?;
        if tables
            .default
            .iter()
            .chain(tables.locales.values().flatten())
            .any(|(pattern, _)| pattern.is_empty())
        {
            return Err(CoreError::InvalidConfig(
                "replacer tables: empty pattern".into(),
            ));
        }
        tables.locales = tables
            .locales
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Ok(tables)
    }

    /// Table for `locale`, falling back from `de_AT`/`de-AT` to `de`.
    pub fn for_locale(&self, locale: &str) -> &[Replacement] {
        let code = locale.to_lowercase();
        if let Some(table) = self.locales.get(&code) {
            return table;
        }
        code.split(['_', '-'])
            .next()
            .and_then(|language| self.locales.get(language))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Locale-aware cleanup engine.
#[derive(Clone, Debug)]
pub struct PathCleanup {
    tables: ReplacerTables,
}

impl Default for PathCleanup {
    fn default() -> Self {
        Self::new(ReplacerTables::builtin())
    }
}

impl PathCleanup {
    pub fn new(tables: ReplacerTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &ReplacerTables {
        &self.tables
    }

    /// Normalize `raw` (a title or a full path) into a valid resource locator.
    ///
    /// Never fails; input with nothing usable in it cleans to `/`.
    pub fn cleanup(&self, raw: &str, locale: &str) -> String {
        let segments: Vec<String> = self
            .replace(raw, locale)
            .split('/')
            .map(clean_segment)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return ROOT_PATH.to_string();
        }
        format!("/{}", segments.join("/"))
    }

    /// Normalize a title into exactly one path segment.
    ///
    /// A `/` inside the title becomes a hyphen instead of a hierarchy level.
    /// Returns an empty string when nothing usable is left.
    pub fn cleanup_segment(&self, raw: &str, locale: &str) -> String {
        clean_segment(&self.replace(raw, locale).replace('/', "-"))
    }

    fn replace(&self, raw: &str, locale: &str) -> String {
        let mut dirty = raw.to_string();
        for (pattern, replacement) in self.tables.for_locale(locale) {
            dirty = dirty.replace(pattern.as_str(), replacement);
        }
        for (pattern, replacement) in &self.tables.default {
            dirty = dirty.replace(pattern.as_str(), replacement);
        }
        dirty
    }

    /// True iff `path` already satisfies the grammar `cleanup` produces.
    pub fn validate(&self, path: &str) -> bool {
        is_valid_path(path)
    }
}

fn clean_segment(part: &str) -> String {
    let ascii = deunicode::deunicode(part).to_lowercase();
    let mut out = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        let mapped = if c.is_whitespace() { '-' } else { c };
        if !is_segment_char(mapped) {
            continue;
        }
        if mapped == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(mapped);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

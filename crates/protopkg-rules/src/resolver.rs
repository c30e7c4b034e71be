use crate::label::Label;
use crate::RulesError;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::warn;

type ImportLabels = BTreeMap<String, Vec<Label>>;

/// Which rule labels provide which imports, per language pair.
///
/// Loaded from CSV lines `lang,imp_lang,import,label`. Lookups for a
/// `(lang, imp_lang)` pair fall back to entries registered under `lang`
/// alone.
#[derive(Debug, Clone, Default)]
pub struct ProvidedIndex {
    known: HashMap<String, ImportLabels>,
}

fn lang_key(lang: &str, imp_lang: &str) -> String {
    if imp_lang.is_empty() {
        lang.to_owned()
    } else {
        format!("{lang} {imp_lang}")
    }
}

impl ProvidedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), RulesError> {
        let content = fs::read_to_string(path).map_err(|e| RulesError::io(path, e))?;
        self.load(&content)
    }

    /// Add every entry in `input`. Lines starting with `#` are comments;
    /// lines without four fields are skipped with a warning.
    pub fn load(&mut self, input: &str) -> Result<(), RulesError> {
        for line in input.lines() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.splitn(4, ',').collect();
            let [lang, imp_lang, import, label] = parts[..] else {
                warn!(
                    "parse {line:?}: expected 4 items, got {}",
                    parts.len()
                );
                continue;
            };
            let label: Label = label.parse().map_err(|e| RulesError::IndexLabel {
                line: line.to_owned(),
                source: Box::new(e),
            })?;
            self.provide(lang, imp_lang, import, label);
        }
        Ok(())
    }

    /// Record that `label` provides `import`. Repeats are ignored.
    pub fn provide(&mut self, lang: &str, imp_lang: &str, import: &str, label: Label) {
        let labels = self
            .known
            .entry(lang_key(lang, imp_lang))
            .or_default()
            .entry(import.to_owned())
            .or_default();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    fn lookup(&self, lang: &str, imp_lang: &str) -> Option<&ImportLabels> {
        self.known
            .get(&lang_key(lang, imp_lang))
            .or_else(|| self.known.get(lang))
    }

    /// Labels providing `import`, most recently provided first.
    pub fn resolve(&self, lang: &str, imp_lang: &str, import: &str) -> Vec<&Label> {
        self.lookup(lang, imp_lang)
            .and_then(|known| known.get(import))
            .map(|labels| labels.iter().rev().collect())
            .unwrap_or_default()
    }

    /// Every providing label with the imports it provides.
    pub fn provided(&self, lang: &str, imp_lang: &str) -> BTreeMap<&Label, Vec<&str>> {
        let mut result: BTreeMap<&Label, Vec<&str>> = BTreeMap::new();
        if let Some(known) = self.lookup(lang, imp_lang) {
            for (import, labels) in known {
                for label in labels {
                    result.entry(label).or_default().push(import);
                }
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

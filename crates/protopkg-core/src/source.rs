use crate::CoreError;
use std::collections::BTreeMap;
use std::path::Path;

/// Candidate source texts keyed by the path they were read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    entries: BTreeMap<String, String>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a comma-separated path list. Empty entries are ignored.
    pub fn load_list(paths: &str) -> Result<Self, CoreError> {
        let mut map = Self::new();
        for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            map.load(Path::new(path))?;
        }
        Ok(map)
    }

    pub fn load(&mut self, path: &Path) -> Result<(), CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Io(std::io::Error::new(
                e.kind(),
                format!("reading source file {}: {e}", path.display()),
            ))
        })?;
        self.insert(path.to_string_lossy(), text);
        Ok(())
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(path.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The single source whose path is `file_name` or ends with `/<file_name>`.
    pub fn lookup(&self, file_name: &str) -> Result<&str, CoreError> {
        let suffix = format!("/{file_name}");
        let matches: Vec<(&String, &String)> = self
            .entries
            .iter()
            .filter(|(path, _)| path.as_str() == file_name || path.ends_with(&suffix))
            .collect();

        match matches.as_slice() {
            [] => Err(CoreError::SourceNotFound(file_name.to_owned())),
            [(_, text)] => Ok(text.as_str()),
            _ => Err(CoreError::AmbiguousSource {
                file: file_name.to_owned(),
                candidates: matches.iter().map(|(path, _)| (*path).clone()).collect(),
            }),
        }
    }
}

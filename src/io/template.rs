use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use super::output::write_json;
use crate::models::MappingTemplate;

/// Directory of saved mapping templates, one `<name>.json` per template
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create template directory: {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("Invalid template name: {:?}", name);
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    pub fn save(&self, template: &MappingTemplate) -> Result<PathBuf> {
        let path = self.path_for(&template.name)?;
        write_json(template, &path)?;
        info!("Saved template {:?} to {:?}", template.name, path);
        Ok(path)
    }

    /// Load a template by name, `None` when it was never saved
    pub fn load(&self, name: &str) -> Result<Option<MappingTemplate>> {
        let path = self.path_for(name)?;
        if !path.exists() {
            warn!("Template not found: {}", name);
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let template = serde_json::from_str(&content).with_context(|| format!("Failed to parse template: {:?}", path))?;
        Ok(Some(template))
    }

    /// Names of all saved templates, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries =
            std::fs::read_dir(&self.dir).with_context(|| format!("Failed to read directory: {:?}", self.dir))?;

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldId, FieldMapping, MatchMethod, UnmappedReason};

    fn sample() -> MappingTemplate {
        MappingTemplate::from_mappings(
            "broker_intake",
            &[
                FieldMapping::mapped(FieldId::Name, "Full Legal Name", MatchMethod::Exact, 1.0),
                FieldMapping::mapped(FieldId::Phone, "Primary Contact", MatchMethod::Semantic, 0.81),
                FieldMapping::unmapped(FieldId::Email, UnmappedReason::NoMatch),
            ],
        )
    }

    #[test]
    fn test_save_load_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path().join("templates")).unwrap();

        let template = sample();
        assert_eq!(template.mappings.len(), 2);
        store.save(&template).unwrap();
        std::fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap(), vec!["broker_intake".to_string()]);
        assert_eq!(store.load("broker_intake").unwrap(), Some(template));
        assert_eq!(store.load("missing").unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path()).unwrap();

        assert!(store.load("../escape").is_err());
        assert!(store.load("").is_err());
    }
}

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::IngestionConfig;
use crate::parsers::{merge_class_maps, parse_classes, ClassMap};

/// Walks a project tree and collects every class declared in its source files.
pub struct ModelCrawler {
    source_extension: String,
    directory_blacklist: Vec<String>,
}

impl ModelCrawler {
    pub fn new(config: &IngestionConfig) -> Self {
        ModelCrawler {
            source_extension: config.source_extension.trim_start_matches('.').to_string(),
            directory_blacklist: config.directory_blacklist.clone(),
        }
    }

    /// List the source files under `root`, skipping blacklisted directories.
    ///
    /// Within each directory files come before subdirectories and entries are
    /// sorted by name, so repeated runs see files in the same order.
    pub fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            anyhow::bail!("Project directory not found: {}", root.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by(|a, b| {
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|e| !self.is_blacklisted(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Skipping unreadable directory entry: {}", err);
                    continue;
                }
            };

            // Follows file symlinks; symlinked directories are still not descended into
            if entry.path().is_file() && self.is_source_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Parse every source file under `root` and merge the results into one
    /// map. On a name collision the class from the later file wins.
    pub fn parse_classes_from_directory(&self, root: &Path) -> Result<ClassMap> {
        let files = self.discover_files(root)?;
        let mut classes = ClassMap::new();

        for path in &files {
            let content = read_source(path)?;
            let file_classes = parse_classes(&content);
            log::debug!("{}: {} classes", path.display(), file_classes.len());
            merge_class_maps(&mut classes, file_classes);
        }

        log::info!("Scanned {} files, found {} classes", files.len(), classes.len());
        Ok(classes)
    }

    fn is_blacklisted(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        let blacklisted = self.directory_blacklist.iter().any(|d| d.as_str() == name);
        if blacklisted {
            log::debug!("Skipping directory {}", entry.path().display());
        }
        blacklisted
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |ext| ext == self.source_extension)
    }
}

/// Read a source file with line endings normalised to `\n`
fn read_source(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file {}", path.display()))?;
    if content.contains('\r') {
        Ok(content.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Ok(content)
    }
}

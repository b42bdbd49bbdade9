use crate::{
    compat::CompatContext,
    entry::ModEntry,
    log::Logger,
    manifest,
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Folder names containing this are extracted core game data, never mods.
const RESERVED_FOLDER_TOKEN: &str = "spacehaven";

/// Holder of a declared prefix during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixClaim {
    pub path: PathBuf,
    pub enabled: bool,
}

/// Installed mods found under a set of root directories, sorted by display
/// name. Every scan rebuilds the whole list.
#[derive(Debug, Clone)]
pub struct ModRegistry {
    roots: Vec<PathBuf>,
    context: CompatContext,
    mods: Vec<ModEntry>,
    prefixes: BTreeMap<u32, PrefixClaim>,
}

impl ModRegistry {
    pub fn scan(roots: Vec<PathBuf>, context: CompatContext, log: &Logger) -> Self {
        let mut registry = Self {
            roots,
            context,
            mods: Vec::new(),
            prefixes: BTreeMap::new(),
        };
        registry.rescan(log);
        registry
    }

    pub fn rescan(&mut self, log: &Logger) {
        self.mods.clear();
        self.prefixes.clear();

        log.info("Locating mods...");
        for root in &self.roots {
            for candidate in candidate_dirs(root, log) {
                let entry = ModEntry::load(&candidate, &self.context, log);
                let prefix = entry.prefix();
                if prefix != 0 {
                    if let Some(holder) = self.prefixes.get(&prefix) {
                        log.warn(format!(
                            "  Warning: Mod prefix {prefix} for mod {} is already in use by {}.",
                            entry.title(),
                            holder.path.display()
                        ));
                    } else {
                        self.prefixes.insert(
                            prefix,
                            PrefixClaim {
                                path: entry.path.clone(),
                                enabled: entry.enabled,
                            },
                        );
                    }
                }
                self.mods.push(entry);
            }
        }

        // Stable: equal names keep root order, then folder order.
        self.mods.sort_by(|a, b| a.name.cmp(&b.name));
        log.info(format!("Found {} mod(s)", self.mods.len()));
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn context(&self) -> &CompatContext {
        &self.context
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn mods(&self) -> &[ModEntry] {
        &self.mods
    }

    pub fn active_mods(&self) -> Vec<&ModEntry> {
        self.mods.iter().filter(|entry| entry.enabled).collect()
    }

    pub fn inactive_mods(&self) -> Vec<&ModEntry> {
        self.mods.iter().filter(|entry| !entry.enabled).collect()
    }

    pub fn mod_by_path(&self, path: &Path) -> Option<&ModEntry> {
        self.mods.iter().find(|entry| entry.path == path)
    }

    pub fn mod_by_path_mut(&mut self, path: &Path) -> Option<&mut ModEntry> {
        self.mods.iter_mut().find(|entry| entry.path == path)
    }

    /// Looks a mod up by path, display name, manifest name or folder name.
    pub fn find(&self, query: &str) -> Option<&ModEntry> {
        let as_path = Path::new(query);
        self.mod_by_path(as_path).or_else(|| {
            self.mods.iter().find(|entry| {
                entry.name == query
                    || entry.manifest.name == query
                    || entry.folder_name() == query
            })
        })
    }

    pub fn prefix_claims(&self) -> &BTreeMap<u32, PrefixClaim> {
        &self.prefixes
    }
}

/// Immediate child directories of `root` that carry a manifest, in file name
/// order.
fn candidate_dirs(root: &Path, log: &Logger) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log.warn(format!("  Cannot read {}: {err}", root.display()));
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        if name.contains(RESERVED_FOLDER_TOKEN) {
            continue;
        }
        if !entry.path().is_dir() {
            continue;
        }
        if manifest::find_manifest(entry.path()).is_none() {
            continue;
        }
        out.push(entry.path().to_path_buf());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_mod(root: &Path, folder: &str, name: &str, extra: &str) -> PathBuf {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("info.xml"),
            format!(
                "<mod><name>{name}</name><description>d</description>\
                 <minimumLoaderVersion>0.1</minimumLoaderVersion>{extra}</mod>"
            ),
        )
        .unwrap();
        dir
    }

    fn names(registry: &ModRegistry) -> Vec<String> {
        registry.mods().iter().map(|entry| entry.name.clone()).collect()
    }

    #[test]
    fn skips_reserved_files_and_manifestless_dirs() {
        let temp = TempDir::new().unwrap();
        write_mod(temp.path(), "zeta", "Zeta", "");
        write_mod(temp.path(), "alpha", "Alpha", "");
        write_mod(temp.path(), "spacehaven_0.14", "Core", "");
        fs::create_dir_all(temp.path().join("no_manifest")).unwrap();
        fs::write(temp.path().join("logs.txt"), "x").unwrap();
        fs::write(temp.path().join("info"), "<mod/>").unwrap();

        let registry = ModRegistry::scan(
            vec![temp.path().to_path_buf()],
            CompatContext::default(),
            &Logger::new(),
        );
        assert_eq!(names(&registry), vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn equal_names_keep_root_then_folder_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let late_folder = write_mod(first.path(), "z", "Same", "");
        let second_a = write_mod(second.path(), "a", "Same", "");
        let second_b = write_mod(second.path(), "b", "Same", "");

        let registry = ModRegistry::scan(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            CompatContext::default(),
            &Logger::new(),
        );
        let paths: Vec<&Path> = registry
            .mods()
            .iter()
            .map(|entry| entry.path.as_path())
            .collect();
        assert_eq!(paths, vec![&*late_folder, &*second_a, &*second_b]);
    }

    #[test]
    fn sorts_names_case_sensitively() {
        let temp = TempDir::new().unwrap();
        write_mod(temp.path(), "one", "beta", "");
        write_mod(temp.path(), "two", "Zeta", "");
        write_mod(temp.path(), "three", "alpha", "");

        let registry = ModRegistry::scan(
            vec![temp.path().to_path_buf()],
            CompatContext::default(),
            &Logger::new(),
        );
        assert_eq!(names(&registry), vec!["Zeta", "alpha", "beta"]);
    }

    #[test]
    fn malformed_manifest_is_registered_broken() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("info"), "<mod><name>Broken</name>").unwrap();

        let registry = ModRegistry::scan(
            vec![temp.path().to_path_buf()],
            CompatContext::default(),
            &Logger::new(),
        );
        assert_eq!(registry.mods().len(), 1);
        assert!(registry.mods()[0].is_broken());
        assert_eq!(registry.mods()[0].name, "broken [!]");
    }

    #[test]
    fn sorts_across_roots_and_splits_active_inactive() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_mod(first.path(), "c", "Charlie", "");
        let bravo = write_mod(second.path(), "b", "Bravo", "");
        write_mod(second.path(), "a", "Alpha", "");
        fs::write(bravo.join("disabled.txt"), "off").unwrap();

        let registry = ModRegistry::scan(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            CompatContext::default(),
            &Logger::new(),
        );
        assert_eq!(names(&registry), vec!["Alpha", "Bravo", "Charlie"]);
        let active: Vec<&str> = registry
            .active_mods()
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(active, vec!["Alpha", "Charlie"]);
        assert_eq!(registry.inactive_mods().len(), 1);
        assert_eq!(registry.mod_by_path(&bravo).unwrap().name, "Bravo");
        assert_eq!(registry.find("b").unwrap().name, "Bravo");
        assert_eq!(registry.find("Charlie").unwrap().folder_name(), "c");
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn duplicate_prefix_warns_and_keeps_both() {
        let temp = TempDir::new().unwrap();
        let first = write_mod(temp.path(), "one", "One", "<modid>3</modid>");
        write_mod(temp.path(), "two", "Two", "<modid>3</modid>");
        let log = Logger::new();

        let mut registry = ModRegistry::scan(
            vec![temp.path().to_path_buf()],
            CompatContext::default(),
            &log,
        );
        assert_eq!(registry.mods().len(), 2);
        assert!(log.text().contains("Mod prefix 3"));
        assert_eq!(registry.prefix_claims().len(), 1);
        let holder = &registry.prefix_claims()[&3];
        assert!(holder.enabled);
        assert!(holder.path == first || holder.path == temp.path().join("two"));

        let two = temp.path().join("two");
        registry.mod_by_path_mut(&two).unwrap().disable().unwrap();
        assert!(!registry.mod_by_path(&two).unwrap().enabled);
        assert!(registry.mod_by_path(&first).unwrap().enabled);
        for entry in registry.mods() {
            assert!(!entry.description().contains("already in use"));
        }
    }

    #[test]
    fn rescan_rebuilds_from_disk() {
        let temp = TempDir::new().unwrap();
        write_mod(temp.path(), "one", "One", "");
        let log = Logger::new();
        let mut registry = ModRegistry::scan(
            vec![temp.path().to_path_buf()],
            CompatContext::default(),
            &log,
        );
        assert_eq!(registry.mods().len(), 1);

        write_mod(temp.path(), "two", "Two", "");
        fs::write(temp.path().join("one").join("disabled.txt"), "off").unwrap();
        registry.rescan(&log);
        assert_eq!(names(&registry), vec!["One", "Two"]);
        assert_eq!(registry.active_mods().len(), 1);
    }

    #[test]
    fn missing_root_is_logged_not_fatal() {
        let temp = TempDir::new().unwrap();
        let log = Logger::new();
        let registry = ModRegistry::scan(
            vec![temp.path().join("absent")],
            CompatContext::default(),
            &log,
        );
        assert!(registry.is_empty());
        assert!(log.text().contains("Cannot read"));
    }
}

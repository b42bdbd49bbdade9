use crate::{
    compat::{self, CompatContext},
    error::ModError,
    log::Logger,
    manifest::{self, Manifest, MANIFEST_FILE_NAMES},
};
use anyhow::{Context, Result};
use std::{
    collections::HashSet,
    fs,
    path::{Component, Path, PathBuf},
};

pub const DISABLED_MARKER: &str = "disabled.txt";
const DISABLED_MARKER_TEXT: &str =
    "this mod is disabled, remove this file to enable it again (or toggle it via the modloader UI)";

/// Number of global IDs reserved per mod prefix.
pub const ID_BLOCK_SIZE: u32 = 1000;

pub const BROKEN_MARKER: &str = " [!]";
const MISSING_MANIFEST_TEXT: &str = "Error loading mod: no info file present. Please create one.";
const INVALID_MANIFEST_TEXT: &str = "Error loading mod: error parsing info file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModHealth {
    Ok,
    ManifestMissing,
    ManifestInvalid,
}

/// One installed mod directory.
#[derive(Debug, Clone)]
pub struct ModEntry {
    pub path: PathBuf,
    /// Display name, possibly carrying `[!]` markers.
    pub name: String,
    pub enabled: bool,
    pub health: ModHealth,
    pub manifest: Manifest,
    base_description: String,
    allocated_ids: HashSet<u32>,
}

impl ModEntry {
    pub fn load(path: &Path, context: &CompatContext, log: &Logger) -> Self {
        let path = absolute_path(path);
        log.info(format!("  Loading mod at {}...", path.display()));

        let folder_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let enabled = !path.join(DISABLED_MARKER).is_file();

        let mut entry = Self {
            name: folder_name,
            enabled,
            health: ModHealth::Ok,
            manifest: Manifest::default(),
            base_description: String::new(),
            allocated_ids: HashSet::new(),
            path,
        };

        let manifest_path = manifest::find_manifest(&entry.path)
            .unwrap_or_else(|| entry.path.join(MANIFEST_FILE_NAMES[0]));
        match manifest::read_manifest(&manifest_path) {
            Ok(manifest) => {
                entry.name = manifest.name.clone();
                entry.base_description = manifest.description.clone();
                entry.manifest = manifest;
                entry.run_compat_checks(context, log);
            }
            Err(ModError::ManifestMissing { .. }) => {
                log.warn("    No info file present");
                entry.mark_broken(ModHealth::ManifestMissing, MISSING_MANIFEST_TEXT);
            }
            Err(err) => {
                log.warn(format!("    Failed to parse info file: {err}"));
                entry.mark_broken(ModHealth::ManifestInvalid, INVALID_MANIFEST_TEXT);
            }
        }

        log.info(format!("    Finished loading {}", entry.name));
        entry
    }

    fn run_compat_checks(&mut self, context: &CompatContext, log: &Logger) {
        log.info(format!(
            "    Minimum Loader Version: {}",
            self.manifest.minimum_loader_version
        ));
        if let Some(warning) = compat::loader_warning(&self.manifest, context) {
            self.warn(&warning, log);
        }

        if context.check_game_versions {
            if let Some(declared) = &self.manifest.game_versions {
                log.info(format!("    Game Versions: {}", declared.join(", ")));
            }
        }
        if let Some(warning) = compat::game_version_warning(&self.manifest, context) {
            self.warn(&warning, log);
        }
    }

    fn mark_broken(&mut self, health: ModHealth, text: &str) {
        self.health = health;
        self.name.push_str(BROKEN_MARKER);
        self.base_description = text.to_string();
    }

    fn warn(&mut self, message: &str, log: &Logger) {
        log.warn(format!("    Warning: {message}"));
        self.name.push_str(BROKEN_MARKER);
        self.base_description
            .push_str(&format!("\nWARNING: {message}!"));
    }

    pub fn is_broken(&self) -> bool {
        self.health != ModHealth::Ok
    }

    pub fn folder_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn version(&self) -> Option<&str> {
        Some(self.manifest.version.as_str()).filter(|version| !version.is_empty())
    }

    pub fn prefix(&self) -> u32 {
        self.manifest.prefix
    }

    /// Removes the disabled marker. A missing marker is not an error.
    pub fn enable(&mut self) {
        let _ = fs::remove_file(self.path.join(DISABLED_MARKER));
        self.enabled = true;
    }

    pub fn disable(&mut self) -> Result<()> {
        fs::write(self.path.join(DISABLED_MARKER), DISABLED_MARKER_TEXT)
            .with_context(|| format!("write disabled marker in {}", self.path.display()))?;
        self.enabled = false;
        Ok(())
    }

    pub fn title(&self) -> String {
        match self.version() {
            Some(version) => format!("{} ({version})", self.name),
            None => self.name.clone(),
        }
    }

    pub fn description(&self) -> String {
        let mut description = String::new();
        if !self.manifest.author.is_empty() {
            description.push_str(&format!("AUTHOR: {}\n", self.manifest.author));
        }
        description.push_str(&self.base_description);
        description.push('\n');
        if !self.manifest.known_issues.is_empty() {
            description.push_str(&format!("\nKNOWN ISSUES: {}", self.manifest.known_issues));
        }
        if self.manifest.prefix != 0 {
            description.push_str(&format!("\nPREFIX: {}", self.manifest.prefix));
        }
        if !self.manifest.website.is_empty() {
            description.push_str(&format!("\nURL: {}", self.manifest.website));
        }
        description
    }

    /// Maps a mod-local ID into the mod's global block:
    /// `prefix * ID_BLOCK_SIZE + local_id`.
    pub fn allocate_id(&mut self, local_id: u32) -> Result<u64, ModError> {
        if self.allocated_ids.contains(&local_id) {
            return Err(ModError::DuplicateAllocation {
                mod_title: self.title(),
                local_id,
            });
        }
        if local_id >= ID_BLOCK_SIZE {
            return Err(ModError::AllocationOutOfRange {
                mod_title: self.title(),
                local_id,
                limit: ID_BLOCK_SIZE,
            });
        }
        self.allocated_ids.insert(local_id);
        Ok(u64::from(self.manifest.prefix) * u64::from(ID_BLOCK_SIZE) + u64::from(local_id))
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically. Relative
/// paths are taken from the working directory.
pub(crate) fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize_path(&cwd.join(path)),
        Err(_) => normalize_path(path),
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_mod(root: &Path, folder: &str, body: &str) -> PathBuf {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("info"), body).unwrap();
        dir
    }

    fn manifest(name: &str, extra: &str) -> String {
        format!(
            "<mod><name>{name}</name><description>Does things</description>\
             <minimumLoaderVersion>0.1.0</minimumLoaderVersion>{extra}</mod>"
        )
    }

    #[test]
    fn loads_manifest_fields() {
        let temp = TempDir::new().unwrap();
        let dir = write_mod(
            temp.path(),
            "hull",
            &manifest("Better Hull", "<version>1.2</version><modid>3</modid>"),
        );
        let entry = ModEntry::load(&dir, &CompatContext::default(), &Logger::new());
        assert_eq!(entry.name, "Better Hull");
        assert_eq!(entry.title(), "Better Hull (1.2)");
        assert!(entry.enabled);
        assert!(!entry.is_broken());
        assert_eq!(entry.prefix(), 3);
    }

    #[test]
    fn missing_manifest_marks_entry_broken() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("empty");
        fs::create_dir_all(&dir).unwrap();
        let entry = ModEntry::load(&dir, &CompatContext::default(), &Logger::new());
        assert_eq!(entry.health, ModHealth::ManifestMissing);
        assert_eq!(entry.name, "empty [!]");
        assert!(entry.description().contains("no info file present"));
    }

    #[test]
    fn invalid_manifest_marks_entry_broken() {
        let temp = TempDir::new().unwrap();
        let dir = write_mod(temp.path(), "bad", "<mod><name>Bad</name></mod>");
        let entry = ModEntry::load(&dir, &CompatContext::default(), &Logger::new());
        assert_eq!(entry.health, ModHealth::ManifestInvalid);
        assert_eq!(entry.name, "bad [!]");
        assert!(entry.description().contains("error parsing info file"));
    }

    #[test]
    fn old_loader_adds_warning_but_keeps_mod_usable() {
        let temp = TempDir::new().unwrap();
        let dir = write_mod(
            temp.path(),
            "future",
            "<mod><name>Future</name><description>Needs new loader</description>\
             <minimumLoaderVersion>99.0</minimumLoaderVersion></mod>",
        );
        let log = Logger::new();
        let entry = ModEntry::load(&dir, &CompatContext::default(), &log);
        assert_eq!(entry.name, "Future [!]");
        assert!(!entry.is_broken());
        assert!(entry
            .description()
            .contains("WARNING: Mod loader version 99.0 is required!"));
        assert!(log.text().contains("Warning: Mod loader version 99.0"));
    }

    #[test]
    fn marker_file_controls_enabled_state() {
        let temp = TempDir::new().unwrap();
        let dir = write_mod(temp.path(), "toggle", &manifest("Toggle", ""));
        let context = CompatContext::default();
        let log = Logger::new();
        let mut entry = ModEntry::load(&dir, &context, &log);

        entry.disable().unwrap();
        entry.disable().unwrap();
        assert!(!entry.enabled);
        assert!(dir.join(DISABLED_MARKER).is_file());
        assert!(!ModEntry::load(&dir, &context, &log).enabled);

        entry.enable();
        entry.enable();
        assert!(entry.enabled);
        assert!(!dir.join(DISABLED_MARKER).exists());
        assert!(ModEntry::load(&dir, &context, &log).enabled);
    }

    #[test]
    fn description_blocks_follow_fixed_order() {
        let temp = TempDir::new().unwrap();
        let dir = write_mod(
            temp.path(),
            "full",
            &manifest(
                "Full",
                "<author>Ann</author><knownIssues>Crashes</knownIssues>\
                 <modid>7</modid><website>https://example.com</website>",
            ),
        );
        let entry = ModEntry::load(&dir, &CompatContext::default(), &Logger::new());
        assert_eq!(
            entry.description(),
            "AUTHOR: Ann\nDoes things\n\nKNOWN ISSUES: Crashes\nPREFIX: 7\nURL: https://example.com"
        );

        let dir = write_mod(temp.path(), "bare", &manifest("Bare", ""));
        let entry = ModEntry::load(&dir, &CompatContext::default(), &Logger::new());
        assert_eq!(entry.description(), "Does things\n");
    }

    #[test]
    fn allocates_ids_inside_prefix_block() {
        let temp = TempDir::new().unwrap();
        let dir = write_mod(temp.path(), "ids", &manifest("Ids", "<modid>2</modid>"));
        let mut entry = ModEntry::load(&dir, &CompatContext::default(), &Logger::new());

        assert_eq!(entry.allocate_id(0), Ok(2000));
        assert_eq!(entry.allocate_id(999), Ok(2999));
        assert!(matches!(
            entry.allocate_id(0),
            Err(ModError::DuplicateAllocation { local_id: 0, .. })
        ));
        assert!(matches!(
            entry.allocate_id(1000),
            Err(ModError::AllocationOutOfRange { local_id: 1000, limit: 1000, .. })
        ));
        assert_eq!(entry.allocate_id(5), Ok(2005));
    }

    #[test]
    fn normalizes_installation_path() {
        assert_eq!(
            normalize_path(Path::new("/games/mods/./a/../b")),
            PathBuf::from("/games/mods/b")
        );
        assert_eq!(
            normalize_path(Path::new("../../SpaceHaven/mods/a")),
            PathBuf::from("../../SpaceHaven/mods/a")
        );
        assert_eq!(
            normalize_path(Path::new("../x/../../y")),
            PathBuf::from("../../y")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert!(absolute_path(Path::new("../../SpaceHaven/mods/a")).is_absolute());
    }

    #[test]
    fn loads_mod_through_parent_segments() {
        let temp = TempDir::new().unwrap();
        let dir = write_mod(temp.path(), "a", &manifest("A", ""));
        fs::write(dir.join(DISABLED_MARKER), "off").unwrap();
        fs::create_dir_all(temp.path().join("one").join("two")).unwrap();

        let indirect = temp
            .path()
            .join("one")
            .join("two")
            .join("..")
            .join("..")
            .join("a");
        let entry = ModEntry::load(&indirect, &CompatContext::default(), &Logger::new());
        assert_eq!(entry.path, dir);
        assert_eq!(entry.name, "A");
        assert!(!entry.enabled);
        assert!(!entry.is_broken());
    }
}

use crate::entry::absolute_path;
use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const GAME_NAME: &str = "Space Haven";
const JAR_NAME: &str = "spacehaven.jar";
const MODS_DIR_NAME: &str = "mods";

const CANDIDATE_LOCATIONS: &[&str] = &[
    // macOS
    "/Applications/spacehaven.app",
    "/Applications/Games/spacehaven.app",
    "/Applications/Games/Space Haven/spacehaven.app",
    "./spacehaven.app",
    "../spacehaven.app",
    // Windows
    "../spacehaven/spacehaven.exe",
    "../../spacehaven/spacehaven.exe",
    "../spacehaven.exe",
    "../../spacehaven.exe",
    "C:/Program Files (x86)/Steam/steamapps/common/SpaceHaven/spacehaven.exe",
    // Linux
    "../SpaceHaven/spacehaven",
    "../../SpaceHaven/spacehaven",
    "~/Games/SpaceHaven/spacehaven",
    "~/.local/share/Steam/steamapps/common/SpaceHaven/spacehaven",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePaths {
    /// What the operator picked: bundle, jar or executable.
    pub game_path: PathBuf,
    pub jar_path: PathBuf,
    pub mods_dir: PathBuf,
}

impl GamePaths {
    /// Derives jar and mods locations from a picked path and creates the mods
    /// directory when it does not exist yet.
    pub fn from_location(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            bail!("empty game path");
        }
        let path = absolute_path(path);
        let path = path.as_path();

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        let paths = match extension.as_deref() {
            Some("app") => {
                let resources = path.join("Contents").join("Resources");
                GamePaths {
                    game_path: path.to_path_buf(),
                    jar_path: resources.join(JAR_NAME),
                    mods_dir: resources.join(MODS_DIR_NAME),
                }
            }
            Some("jar") => GamePaths {
                game_path: path.to_path_buf(),
                jar_path: path.to_path_buf(),
                mods_dir: sibling(path, MODS_DIR_NAME),
            },
            _ => GamePaths {
                game_path: path.to_path_buf(),
                jar_path: sibling(path, JAR_NAME),
                mods_dir: sibling(path, MODS_DIR_NAME),
            },
        };

        fs::create_dir_all(&paths.mods_dir)
            .with_context(|| format!("create mods dir {}", paths.mods_dir.display()))?;
        Ok(paths)
    }

    /// Primary mods directory first, then the extra roots without duplicates.
    pub fn mod_roots(&self, extra: &[PathBuf]) -> Vec<PathBuf> {
        let mut roots = vec![self.mods_dir.clone()];
        for path in extra {
            if !roots.contains(path) {
                roots.push(path.clone());
            }
        }
        roots
    }
}

/// Previous location if it still exists, otherwise the first well-known
/// install location that does.
pub fn autolocate(previous: Option<&Path>) -> Option<PathBuf> {
    if let Some(previous) = previous {
        if previous.exists() {
            return Some(absolute_path(previous));
        }
    }

    CANDIDATE_LOCATIONS
        .iter()
        .filter_map(|raw| expand_home(raw))
        .map(|path| absolute_path(&path))
        .find(|path| path.exists())
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn expand_home(raw: &str) -> Option<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let base = directories::BaseDirs::new()?;
            Some(base.home_dir().join(rest))
        }
        None => Some(PathBuf::from(raw)),
    }
}

use crate::manifest::Manifest;
use std::{cmp::Ordering, fmt};

/// Version of this loader, compared against `minimumLoaderVersion`.
pub const LOADER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Numeric dotted version (`1.2`, `0.10.3`). Missing trailing segments count
/// as zero, so `1.2 == 1.2.0`.
#[derive(Debug, Clone, Default)]
pub struct DottedVersion(Vec<u64>);

impl DottedVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let segments = raw
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;
        Some(Self(segments))
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for index in 0..len {
            let left = self.0.get(index).copied().unwrap_or(0);
            let right = other.0.get(index).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DottedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DottedVersion {}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|part| part.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Inputs for the per-mod compatibility checks run while loading a manifest.
#[derive(Debug, Clone)]
pub struct CompatContext {
    pub loader_version: DottedVersion,
    pub game_version: Option<String>,
    /// Gate for the declared-game-versions check. Off by default.
    pub check_game_versions: bool,
}

impl CompatContext {
    pub fn new(game_version: Option<String>, check_game_versions: bool) -> Self {
        Self {
            loader_version: DottedVersion::parse(LOADER_VERSION).unwrap_or_default(),
            game_version,
            check_game_versions,
        }
    }

    pub fn with_loader_version(mut self, version: DottedVersion) -> Self {
        self.loader_version = version;
        self
    }
}

impl Default for CompatContext {
    fn default() -> Self {
        Self::new(None, false)
    }
}

pub fn loader_warning(manifest: &Manifest, context: &CompatContext) -> Option<String> {
    if manifest.minimum_loader_version > context.loader_version {
        return Some(format!(
            "Mod loader version {} is required",
            manifest.minimum_loader_version
        ));
    }
    None
}

pub fn game_version_warning(manifest: &Manifest, context: &CompatContext) -> Option<String> {
    if !context.check_game_versions {
        return None;
    }

    let Some(declared) = manifest.game_versions.as_ref() else {
        return Some("This mod does not declare what game version(s) it supports.".to_string());
    };

    let Some(game_version) = context.game_version.as_deref() else {
        return Some(
            "Could not determine Space Haven version. You might need to update your loader."
                .to_string(),
        );
    };

    if declared.iter().any(|version| version == game_version) {
        return None;
    }

    Some(format!(
        "This mod may not support Space Haven {game_version}, it only supports {}.",
        declared.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(raw: &str) -> DottedVersion {
        DottedVersion::parse(raw).unwrap()
    }

    #[test]
    fn compares_segments_numerically() {
        assert!(version("0.10.0") > version("0.9.5"));
        assert!(version("1.2") < version("1.10"));
        assert_eq!(version("1.2"), version("1.2.0"));
        assert!(version("2") > version("1.99.99"));
    }

    #[test]
    fn rejects_non_numeric_versions() {
        assert!(DottedVersion::parse("").is_none());
        assert!(DottedVersion::parse("1.x").is_none());
        assert!(DottedVersion::parse("1..2").is_none());
    }

    #[test]
    fn warns_when_loader_is_too_old() {
        let context = CompatContext::default().with_loader_version(version("0.8.0"));
        let manifest = Manifest {
            minimum_loader_version: version("0.9.0"),
            ..Manifest::default()
        };
        let warning = loader_warning(&manifest, &context).unwrap();
        assert!(warning.contains("0.9.0"));

        let manifest = Manifest {
            minimum_loader_version: version("0.8"),
            ..Manifest::default()
        };
        assert!(loader_warning(&manifest, &context).is_none());
    }

    #[test]
    fn game_version_check_is_inert_unless_enabled() {
        let manifest = Manifest::default();
        let context = CompatContext::new(Some("0.14.1".to_string()), false);
        assert!(game_version_warning(&manifest, &context).is_none());
    }

    #[test]
    fn game_version_check_reports_mismatches_when_enabled() {
        let context = CompatContext::new(Some("0.14.1".to_string()), true);

        let undeclared = Manifest::default();
        assert!(game_version_warning(&undeclared, &context)
            .unwrap()
            .contains("does not declare"));

        let other = Manifest {
            game_versions: Some(vec!["0.13.0".to_string()]),
            ..Manifest::default()
        };
        assert!(game_version_warning(&other, &context)
            .unwrap()
            .contains("only supports 0.13.0"));

        let matching = Manifest {
            game_versions: Some(vec!["0.13.0".to_string(), "0.14.1".to_string()]),
            ..Manifest::default()
        };
        assert!(game_version_warning(&matching, &context).is_none());

        let unknown_game = CompatContext::new(None, true);
        assert!(game_version_warning(&matching, &unknown_game)
            .unwrap()
            .contains("Could not determine"));
    }
}

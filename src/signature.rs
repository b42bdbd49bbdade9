use crate::registry::ModRegistry;
use sha2::{Digest, Sha256};
use std::fmt;

const GAME_TAG: &str = "spacehaven";
const TOKEN_SEPARATOR: &str = "__";
pub const VERSION_UNKNOWN: &str = "VERSION_UNKNOWN";

/// Cache key for the patched game built from the active mod set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildSignature(String);

impl BuildSignature {
    /// `mods` must be in load order (registry order).
    pub fn compute<'a, I>(game_version: &str, mods: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let tokens = signature_tokens(game_version, mods);
        let text = tokens.join(TOKEN_SEPARATOR).to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn for_registry(registry: &ModRegistry, game_version: &str) -> Self {
        Self::compute(
            game_version,
            registry
                .active_mods()
                .into_iter()
                .map(|entry| (entry.name.as_str(), entry.version())),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn signature_tokens<'a, I>(game_version: &str, mods: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut tokens = vec![GAME_TAG.to_string(), game_version.to_string()];
    for (name, version) in mods {
        tokens.push(name.to_string());
        tokens.push(version.unwrap_or(VERSION_UNKNOWN).to_string());
    }
    tokens
}

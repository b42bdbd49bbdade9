//! Collaborators the loader hands work to: the jar patcher, the quick-launch
//! artifact cache, and the game process itself.

use crate::{log::Logger, signature::BuildSignature};
use anyhow::{bail, Context, Result};
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

pub trait PatchStep: Send + Sync {
    /// Merges `mod_paths` (load order) into the jar and caches the result
    /// under `signature`.
    fn load(&self, jar: &Path, mod_paths: &[PathBuf], signature: &BuildSignature) -> Result<()>;
    /// Installs a previously cached artifact for `signature`.
    fn quick_load(&self, jar: &Path, signature: &BuildSignature) -> Result<()>;
    /// Restores the vanilla jar.
    fn unload(&self, jar: &Path) -> Result<()>;
}

pub trait ArtifactCache: Send + Sync {
    fn is_available(&self, signature: &BuildSignature) -> bool;
    fn clear(&self, signature: &BuildSignature) -> Result<()>;
}

pub trait GameLauncher: Send + Sync {
    fn launch_and_wait(&self, game_path: &Path) -> Result<()>;
}

/// Patch step implemented by an external executable:
/// `<command> load <jar> <signature> <mod>...`, `<command> quickload <jar>
/// <signature>`, `<command> unload <jar>`.
#[derive(Debug, Clone)]
pub struct CommandPatcher {
    command: PathBuf,
}

impl CommandPatcher {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }

    fn run(&self, args: &[&OsStr]) -> Result<()> {
        let status = Command::new(&self.command)
            .args(args)
            .status()
            .with_context(|| format!("run patcher {}", self.command.display()))?;
        if !status.success() {
            bail!("patcher {} exited {status}", self.command.display());
        }
        Ok(())
    }
}

impl PatchStep for CommandPatcher {
    fn load(&self, jar: &Path, mod_paths: &[PathBuf], signature: &BuildSignature) -> Result<()> {
        let mut args = vec![
            OsStr::new("load"),
            jar.as_os_str(),
            OsStr::new(signature.as_str()),
        ];
        args.extend(mod_paths.iter().map(|path| path.as_os_str()));
        self.run(&args)
    }

    fn quick_load(&self, jar: &Path, signature: &BuildSignature) -> Result<()> {
        self.run(&[
            OsStr::new("quickload"),
            jar.as_os_str(),
            OsStr::new(signature.as_str()),
        ])
    }

    fn unload(&self, jar: &Path) -> Result<()> {
        self.run(&[OsStr::new("unload"), jar.as_os_str()])
    }
}

/// Stand-in when no patcher is configured. Loading fails, unloading is a no-op.
#[derive(Debug, Clone, Default)]
pub struct NoPatcher;

impl PatchStep for NoPatcher {
    fn load(&self, _jar: &Path, _mod_paths: &[PathBuf], _signature: &BuildSignature) -> Result<()> {
        bail!("no patcher configured (set patcher_command in config.json)")
    }

    fn quick_load(&self, _jar: &Path, _signature: &BuildSignature) -> Result<()> {
        bail!("no patcher configured (set patcher_command in config.json)")
    }

    fn unload(&self, _jar: &Path) -> Result<()> {
        Ok(())
    }
}

/// Quick-launch artifacts stored as `<dir>/<signature>.jar`.
#[derive(Debug, Clone)]
pub struct QuickLaunchDir {
    dir: PathBuf,
}

impl QuickLaunchDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn artifact_path(&self, signature: &BuildSignature) -> PathBuf {
        self.dir.join(format!("{signature}.jar"))
    }
}

impl ArtifactCache for QuickLaunchDir {
    fn is_available(&self, signature: &BuildSignature) -> bool {
        self.artifact_path(signature).is_file()
    }

    fn clear(&self, signature: &BuildSignature) -> Result<()> {
        let path = self.artifact_path(signature);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("remove quick-launch file {}", path.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl GameLauncher for ProcessLauncher {
    fn launch_and_wait(&self, game_path: &Path) -> Result<()> {
        let is_bundle = game_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("app"));
        let is_jar = game_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));

        let mut command = if is_bundle {
            let mut command = Command::new("open");
            command.arg("-W").arg(game_path);
            command
        } else if is_jar {
            let mut command = Command::new("java");
            command.arg("-jar").arg(game_path);
            command
        } else {
            Command::new(game_path)
        };
        if let Some(dir) = game_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if !is_bundle {
                command.current_dir(dir);
            }
        }

        let status = command
            .status()
            .with_context(|| format!("launch {}", game_path.display()))?;
        if !status.success() {
            bail!("game exited {status}");
        }
        Ok(())
    }
}

/// Opens a folder in the desktop file manager; failures are only logged.
pub fn open_folder(path: &Path, log: &Logger) {
    let target = path.as_os_str();
    let candidates: [(&str, Vec<&OsStr>); 4] = [
        ("xdg-open", vec![target]),
        ("gio", vec![OsStr::new("open"), target]),
        ("open", vec![target]),
        ("explorer", vec![target]),
    ];
    let mut errors = Vec::new();
    for (command, args) in candidates {
        match Command::new(command)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return,
            Ok(status) => errors.push(format!("{command} exited {status}")),
            Err(err) => errors.push(format!("{command} failed: {err}")),
        }
    }
    log.warn(format!(
        "Failed to open {}: {}",
        path.display(),
        errors.join("; ")
    ));
}

use crate::{
    compat::CompatContext,
    config::AppConfig,
    error::ModError,
    external::{
        self, ArtifactCache, CommandPatcher, GameLauncher, NoPatcher, PatchStep, ProcessLauncher,
        QuickLaunchDir,
    },
    game::{self, GamePaths},
    log::Logger,
    registry::ModRegistry,
    signature::{BuildSignature, VERSION_UNKNOWN},
    task::{TaskOutcome, TaskRunner, TaskStatus},
};
use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Vanilla,
    QuickLaunch,
    Patch,
}

impl LaunchMode {
    pub fn label(self) -> &'static str {
        match self {
            LaunchMode::Vanilla => "LAUNCH ORIGINAL GAME",
            LaunchMode::QuickLaunch => "QUICKLAUNCH!",
            LaunchMode::Patch => "LAUNCH!",
        }
    }

    fn task_label(self) -> &'static str {
        match self {
            LaunchMode::Vanilla => "Launching original game",
            LaunchMode::QuickLaunch => "Quicklaunching",
            LaunchMode::Patch => "Launching",
        }
    }
}

/// Interactive controls that must stay locked while a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    ToggleMod,
    Rescan,
    Launch,
    LocateGame,
    OpenFolder,
    ClearQuickLaunch,
    Quit,
}

pub struct App {
    pub config: AppConfig,
    pub log: Logger,
    paths: Option<GamePaths>,
    registry: Option<ModRegistry>,
    runner: TaskRunner,
    patcher: Arc<dyn PatchStep>,
    cache: Arc<dyn ArtifactCache>,
    launcher: Arc<dyn GameLauncher>,
    launch_label: String,
    last_error: Option<String>,
    /// Session-only game version; never written to `config.json`.
    game_version_override: Option<String>,
}

impl App {
    pub fn initialize(config: AppConfig, log: Logger) -> Self {
        let patcher: Arc<dyn PatchStep> = match config.patcher_command.clone() {
            Some(command) => Arc::new(CommandPatcher::new(command)),
            None => Arc::new(NoPatcher),
        };
        let cache = Arc::new(QuickLaunchDir::new(config.quicklaunch_dir()));
        Self::with_collaborators(config, log, patcher, cache, Arc::new(ProcessLauncher))
    }

    pub fn with_collaborators(
        config: AppConfig,
        log: Logger,
        patcher: Arc<dyn PatchStep>,
        cache: Arc<dyn ArtifactCache>,
        launcher: Arc<dyn GameLauncher>,
    ) -> Self {
        Self {
            config,
            log,
            paths: None,
            registry: None,
            runner: TaskRunner::new(),
            patcher,
            cache,
            launcher,
            launch_label: LaunchMode::Vanilla.label().to_string(),
            last_error: None,
            game_version_override: None,
        }
    }

    /// Uses `version` for compatibility checks and signatures in this session
    /// without touching the saved configuration.
    pub fn set_game_version_override(&mut self, version: Option<String>) {
        self.game_version_override = version.filter(|version| !version.is_empty());
    }

    /// Locates the game from the remembered path or well-known install
    /// locations. Returns `false` when the operator has to pick it manually.
    pub fn autolocate(&mut self) -> Result<bool> {
        match game::autolocate(self.config.last_game_path.as_deref()) {
            Some(path) => {
                self.locate_game(&path)?;
                Ok(true)
            }
            None => {
                self.log
                    .info("Unable to autolocate installation. User will need to pick manually.");
                Ok(false)
            }
        }
    }

    pub fn locate_game(&mut self, path: &Path) -> Result<()> {
        self.ensure_idle()?;
        let paths = GamePaths::from_location(path)?;

        self.log.set_log_dir(&paths.mods_dir);
        self.log
            .info(format!("Discovered game at {}", paths.game_path.display()));
        self.log
            .info(format!("  gamePath: {}", paths.game_path.display()));
        self.log.info(format!("  modPath: {}", paths.mods_dir.display()));
        self.log.info(format!("  jarPath: {}", paths.jar_path.display()));

        self.config.last_game_path = Some(paths.game_path.clone());
        self.config.save()?;

        if let Err(err) = self.patcher.unload(&paths.jar_path) {
            self.log
                .warn(format!("Failed to restore {}: {err:#}", paths.jar_path.display()));
        }

        let roots = paths.mod_roots(&self.config.extra_mod_paths);
        let context = CompatContext::new(
            self.effective_game_version().map(str::to_string),
            self.config.check_game_versions,
        );
        self.registry = Some(ModRegistry::scan(roots, context, &self.log));
        self.paths = Some(paths);
        self.refresh_launch_label();
        Ok(())
    }

    pub fn game_paths(&self) -> Result<&GamePaths, ModError> {
        self.paths.as_ref().ok_or(ModError::RegistryNotReady)
    }

    pub fn game_version(&self) -> &str {
        self.effective_game_version().unwrap_or(VERSION_UNKNOWN)
    }

    fn effective_game_version(&self) -> Option<&str> {
        self.game_version_override
            .as_deref()
            .or(self.config.game_version.as_deref())
            .filter(|version| !version.is_empty())
    }

    pub fn registry(&self) -> Result<&ModRegistry, ModError> {
        self.registry.as_ref().ok_or(ModError::RegistryNotReady)
    }

    pub fn registry_mut(&mut self) -> Result<&mut ModRegistry, ModError> {
        self.registry.as_mut().ok_or(ModError::RegistryNotReady)
    }

    pub fn refresh_mods(&mut self) -> Result<()> {
        self.ensure_idle()?;
        let log = self.log.clone();
        self.registry_mut()?.rescan(&log);
        self.refresh_launch_label();
        Ok(())
    }

    /// Flips the mod at `path` and returns its new enabled state.
    pub fn toggle_mod(&mut self, path: &Path) -> Result<bool> {
        let enabled = self
            .registry()?
            .mod_by_path(path)
            .map(|entry| entry.enabled)
            .with_context(|| format!("no mod installed at {}", path.display()))?;
        self.set_mod_enabled(path, !enabled)?;
        Ok(!enabled)
    }

    pub fn set_mod_enabled(&mut self, path: &Path, enabled: bool) -> Result<()> {
        self.ensure_idle()?;
        let entry = self
            .registry_mut()?
            .mod_by_path_mut(path)
            .with_context(|| format!("no mod installed at {}", path.display()))?;
        if enabled {
            entry.enable();
        } else {
            entry.disable()?;
        }
        let title = entry.title();
        self.log.info(format!(
            "{} {title}",
            if enabled { "Enabled" } else { "Disabled" }
        ));
        self.refresh_launch_label();
        Ok(())
    }

    pub fn current_signature(&self) -> Result<BuildSignature, ModError> {
        Ok(BuildSignature::for_registry(
            self.registry()?,
            self.game_version(),
        ))
    }

    pub fn launch_mode(&self) -> Result<LaunchMode, ModError> {
        let registry = self.registry()?;
        if registry.active_mods().is_empty() {
            return Ok(LaunchMode::Vanilla);
        }
        if self.cache.is_available(&self.current_signature()?) {
            return Ok(LaunchMode::QuickLaunch);
        }
        Ok(LaunchMode::Patch)
    }

    pub fn launch_label(&self) -> &str {
        &self.launch_label
    }

    fn refresh_launch_label(&mut self) {
        let mode = self.launch_mode().unwrap_or(LaunchMode::Vanilla);
        self.launch_label = mode.label().to_string();
    }

    pub fn control_enabled(&self, control: Control) -> bool {
        if self.runner.is_busy() {
            return false;
        }
        match control {
            Control::ToggleMod | Control::Rescan | Control::Launch | Control::OpenFolder => {
                self.registry.is_some()
            }
            Control::ClearQuickLaunch => {
                matches!(self.launch_mode(), Ok(LaunchMode::QuickLaunch))
            }
            Control::LocateGame | Control::Quit => true,
        }
    }

    /// Snapshots the active mods and signature, then launches on the worker.
    pub fn start_launch(&mut self) -> Result<LaunchMode> {
        self.ensure_idle()?;
        let mode = self.launch_mode()?;
        let paths = self.game_paths()?.clone();
        let signature = self.current_signature()?;
        let mod_paths: Vec<PathBuf> = self
            .registry()?
            .active_mods()
            .iter()
            .map(|entry| entry.path.clone())
            .collect();

        let patcher = self.patcher.clone();
        let launcher = self.launcher.clone();
        let log = self.log.clone();
        let task = move || -> Result<()> {
            match mode {
                LaunchMode::Vanilla => launcher.launch_and_wait(&paths.game_path),
                LaunchMode::QuickLaunch => {
                    log.info(format!("Quick-loading build {signature}"));
                    patcher
                        .quick_load(&paths.jar_path, &signature)
                        .context("Error during quick launch")?;
                    launcher.launch_and_wait(&paths.game_path)?;
                    patcher.unload(&paths.jar_path)
                }
                LaunchMode::Patch => {
                    log.info(format!(
                        "Loading {} mod(s) as build {signature}",
                        mod_paths.len()
                    ));
                    patcher
                        .load(&paths.jar_path, &mod_paths, &signature)
                        .context("Error loading mods")?;
                    launcher.launch_and_wait(&paths.game_path)?;
                    patcher.unload(&paths.jar_path)
                }
            }
        };

        self.runner.start(mode.task_label(), task)?;
        self.log.info(format!("{}...", mode.task_label()));
        Ok(mode)
    }

    /// One interactive tick. On completion the launch label is re-evaluated
    /// and any failure is kept for [`App::take_error`].
    pub fn poll_task(&mut self) -> TaskStatus {
        let status = self.runner.poll();
        match &status {
            TaskStatus::Running { indicator } => self.launch_label = indicator.clone(),
            TaskStatus::Finished(outcome) => self.finish_task(outcome),
            TaskStatus::Idle => {}
        }
        status
    }

    pub fn wait_for_task(
        &mut self,
        interval: Duration,
        mut on_tick: impl FnMut(&str),
    ) -> Option<TaskOutcome> {
        loop {
            match self.poll_task() {
                TaskStatus::Idle => return None,
                TaskStatus::Finished(outcome) => return Some(outcome),
                TaskStatus::Running { indicator } => {
                    on_tick(&indicator);
                    std::thread::sleep(interval);
                }
            }
        }
    }

    fn finish_task(&mut self, outcome: &TaskOutcome) {
        match outcome.error_message() {
            Some(message) => {
                self.log.error("!! Exception !!");
                self.log.error(message.clone());
                self.last_error = Some(message);
            }
            None => self.log.info(format!("{} finished", outcome.label())),
        }
        self.refresh_launch_label();
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    pub fn is_busy(&self) -> bool {
        self.runner.is_busy()
    }

    pub fn clear_quick_launch(&mut self) -> Result<()> {
        self.ensure_idle()?;
        let signature = self.current_signature()?;
        self.cache.clear(&signature)?;
        self.log.info(format!("Cleared quick-launch build {signature}"));
        self.refresh_launch_label();
        Ok(())
    }

    pub fn open_mods_folder(&self) -> Result<()> {
        self.ensure_idle()?;
        external::open_folder(&self.game_paths()?.mods_dir, &self.log);
        Ok(())
    }

    pub fn request_quit(&self) -> Result<(), ModError> {
        self.ensure_idle()
    }

    fn ensure_idle(&self) -> Result<(), ModError> {
        if self.runner.is_busy() {
            return Err(ModError::TaskRunning);
        }
        Ok(())
    }
}

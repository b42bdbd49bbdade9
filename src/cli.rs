use crate::{
    app::App,
    compat::LOADER_VERSION,
    config::AppConfig,
    entry::ModEntry,
    game::GAME_NAME,
    log::Logger,
    task::{TaskOutcome, POLL_INTERVAL},
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{
    io::{self, Write},
    path::PathBuf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct GlobalOptions {
    game: Option<PathBuf>,
    game_version: Option<String>,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Mods(OutputFormat),
    Enable(String),
    Disable(String),
    Signature,
    Launch,
    ClearQuickLaunch,
    OpenFolder,
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, command) = parse_args(&args)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("havenloader v{LOADER_VERSION}");
            Ok(())
        }
        command => {
            let mut app = open_app(&global)?;
            run_command(&mut app, command)
        }
    }
}

fn parse_args(args: &[String]) -> Result<(GlobalOptions, CliCommand)> {
    let mut global = GlobalOptions::default();
    let mut format = OutputFormat::Text;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--game" => {
                let value = iter.next().context("--game requires a path")?;
                global.game = Some(PathBuf::from(value));
            }
            "--game-version" => {
                let value = iter.next().context("--game-version requires a value")?;
                global.game_version = Some(value.to_string());
            }
            "--format" => {
                let value = iter.next().context("--format requires a value")?;
                format = OutputFormat::parse(value)
                    .with_context(|| format!("Unknown format: {value}"))?;
            }
            "--verbose" | "-v" => global.verbose = true,
            value if value.starts_with("--game=") => {
                global.game = Some(PathBuf::from(value.trim_start_matches("--game=")));
            }
            value if value.starts_with("--game-version=") => {
                global.game_version = Some(value.trim_start_matches("--game-version=").to_string());
            }
            value if value.starts_with("--format=") => {
                let key = value.trim_start_matches("--format=");
                format =
                    OutputFormat::parse(key).with_context(|| format!("Unknown format: {key}"))?;
            }
            _ => tokens.push(arg.to_string()),
        }
    }

    let command = match tokens.first().map(|token| token.as_str()) {
        None | Some("mods") | Some("list") => CliCommand::Mods(format),
        Some("enable") => CliCommand::Enable(mod_argument(&tokens, "enable")?),
        Some("disable") => CliCommand::Disable(mod_argument(&tokens, "disable")?),
        Some("signature") => CliCommand::Signature,
        Some("launch") => CliCommand::Launch,
        Some("clear-quicklaunch") => CliCommand::ClearQuickLaunch,
        Some("open") => CliCommand::OpenFolder,
        Some("paths") => CliCommand::Paths,
        Some("help" | "--help" | "-h") => CliCommand::Help,
        Some("version" | "--version" | "-V") => CliCommand::Version,
        Some(other) => bail!("Unknown command: {other} (see 'havenloader help')"),
    };
    Ok((global, command))
}

fn mod_argument(tokens: &[String], command: &str) -> Result<String> {
    let rest = tokens.get(1..).unwrap_or(&[]);
    if rest.is_empty() {
        bail!("{command} requires a mod name or path");
    }
    Ok(rest.join(" "))
}

fn open_app(global: &GlobalOptions) -> Result<App> {
    let config = AppConfig::load_or_create()?;
    let log = Logger::new();
    log.set_echo(global.verbose);
    let mut app = App::initialize(config, log);
    app.set_game_version_override(global.game_version.clone());
    match &global.game {
        Some(path) => app.locate_game(path)?,
        None => {
            if !app.autolocate()? {
                bail!("{GAME_NAME} not found: pass --game <path to the game>");
            }
        }
    }
    Ok(app)
}

#[derive(Serialize)]
struct ModListItem {
    name: String,
    title: String,
    path: PathBuf,
    enabled: bool,
    broken: bool,
    version: Option<String>,
    prefix: u32,
}

impl ModListItem {
    fn from_entry(entry: &ModEntry) -> Self {
        Self {
            name: entry.name.clone(),
            title: entry.title(),
            path: entry.path.clone(),
            enabled: entry.enabled,
            broken: entry.is_broken(),
            version: entry.version().map(|version| version.to_string()),
            prefix: entry.prefix(),
        }
    }
}

fn run_command(app: &mut App, command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Mods(format) => list_mods(app, format),
        CliCommand::Enable(query) => set_enabled(app, &query, true),
        CliCommand::Disable(query) => set_enabled(app, &query, false),
        CliCommand::Signature => {
            println!("{}", app.current_signature()?);
            Ok(())
        }
        CliCommand::Launch => launch(app),
        CliCommand::ClearQuickLaunch => app.clear_quick_launch(),
        CliCommand::OpenFolder => app.open_mods_folder(),
        CliCommand::Paths => {
            let paths = app.game_paths()?;
            println!("game:    {}", paths.game_path.display());
            println!("jar:     {}", paths.jar_path.display());
            for root in app.registry()?.roots() {
                println!("mods:    {}", root.display());
            }
            println!("config:  {}", app.config.data_dir().display());
            println!("version: {}", app.game_version());
            Ok(())
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn list_mods(app: &App, format: OutputFormat) -> Result<()> {
    let items: Vec<ModListItem> = app
        .registry()?
        .mods()
        .iter()
        .map(ModListItem::from_entry)
        .collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No mods found. Install some mods into your mods folder.");
            }
            for item in items {
                let enabled = if item.enabled { "x" } else { " " };
                let prefix = if item.prefix == 0 {
                    "-".to_string()
                } else {
                    item.prefix.to_string()
                };
                println!("[{enabled}] {prefix:>4} {}", item.title);
            }
            println!();
            println!("{}", app.launch_label());
        }
    }
    Ok(())
}

fn set_enabled(app: &mut App, query: &str, enabled: bool) -> Result<()> {
    let entry = app
        .registry()?
        .find(query)
        .with_context(|| format!("No mod matches '{query}'"))?;
    let path = entry.path.clone();
    app.set_mod_enabled(&path, enabled)?;
    if let Some(entry) = app.registry()?.mod_by_path(&path) {
        println!("{}", entry.title());
        println!("{}", entry.description());
    }
    println!("{}", app.launch_label());
    Ok(())
}

fn launch(app: &mut App) -> Result<()> {
    let mode = app.start_launch()?;
    println!("{}", mode.label());
    let mut stderr = io::stderr();
    let outcome = app.wait_for_task(POLL_INTERVAL, |indicator| {
        let _ = write!(stderr, "\r{indicator:<40}");
        let _ = stderr.flush();
    });
    let _ = writeln!(stderr);

    if let Some(message) = app.take_error() {
        bail!(message);
    }
    if let Some(TaskOutcome::Completed { label }) = outcome {
        println!("{label}: done");
    }
    Ok(())
}

fn print_help() {
    println!("havenloader v{LOADER_VERSION}");
    println!();
    println!("Usage:");
    println!("  havenloader [mods]                 List installed mods");
    println!("  havenloader enable <mod>           Enable a mod (name, folder or path)");
    println!("  havenloader disable <mod>          Disable a mod");
    println!("  havenloader signature              Print the build signature of the active mods");
    println!("  havenloader launch                 Patch (or quick-load) and launch the game");
    println!("  havenloader clear-quicklaunch      Remove the cached build for the active mods");
    println!("  havenloader open                   Open the mods folder");
    println!("  havenloader paths                  Show resolved paths");
    println!();
    println!("Global options:");
    println!("  --game <path>                      Game executable, .app bundle or .jar");
    println!("  --game-version <version>           Game version used for the build signature");
    println!("  --format <json|text>               Output format for the mod list");
    println!("  -v, --verbose                      Echo the operator log to stderr");
    println!("  -h, --help                         Show help");
    println!("  -V, --version                      Show version");
}

//! `rdr`: render scene descriptions with external renderers

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{debug, info, warn};
use render_bench::foundation::logging;
use render_bench::prelude::*;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "render_bench.toml";
const DEFAULT_BACKEND: &str = "luxcore";

fn cli() -> Command {
    Command::new("rdr")
        .about("Exports scenes to external renderers and runs them")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file (.toml or .ron)"),
        )
        .subcommand(
            Command::new("render")
                .about("Write a scene file for a renderer")
                .arg(
                    Arg::new("scene")
                        .value_name("SCENE")
                        .required(true)
                        .help("Scene description in RON"),
                )
                .arg(
                    Arg::new("backend")
                        .short('b')
                        .long("backend")
                        .value_name("ID")
                        .default_value(DEFAULT_BACKEND)
                        .help("Renderer to export for"),
                )
                .arg(
                    Arg::new("width")
                        .long("width")
                        .value_name("PIXELS")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("height")
                        .long("height")
                        .value_name("PIXELS")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("spp")
                        .long("spp")
                        .value_name("SAMPLES")
                        .value_parser(value_parser!(u32))
                        .help("Samples per pixel"),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Directory for the scene file"),
                )
                .arg(
                    Arg::new("print")
                        .long("print")
                        .help("Print the scene text instead of writing it")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("launch")
                        .long("launch")
                        .help("Run the renderer and wait for it")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("cards")
                .about("Inspect material cards")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List card names"))
                .subcommand(
                    Command::new("show")
                        .about("Print the parameters of a card")
                        .arg(Arg::new("name").value_name("NAME").required(true)),
                ),
        )
        .subcommand(Command::new("backends").about("List renderer backends"))
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut config = load_config(matches.get_one::<String>("config").map(PathBuf::from))?;
    logging::init_with_level(&config.log_level);
    debug!("Configuration: {config:?}");

    match matches.subcommand() {
        Some(("render", sub)) => {
            apply_overrides(&mut config, sub);
            config.validate().map_err(anyhow::Error::msg)?;
            render(&Workbench::new(config), sub)
        }
        Some(("cards", sub)) => cards(&Workbench::new(config), sub),
        Some(("backends", _)) => {
            backends(&Workbench::new(config));
            Ok(())
        }
        _ => Ok(()),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<BenchConfig> {
    match path {
        Some(path) => BenchConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => BenchConfig::load_from_file(DEFAULT_CONFIG)
            .with_context(|| format!("Failed to load configuration {DEFAULT_CONFIG}")),
        None => Ok(BenchConfig::default()),
    }
}

fn apply_overrides(config: &mut BenchConfig, args: &ArgMatches) {
    if let Some(&width) = args.get_one::<u32>("width") {
        config.defaults.width = width;
    }
    if let Some(&height) = args.get_one::<u32>("height") {
        config.defaults.height = height;
    }
    if let Some(&spp) = args.get_one::<u32>("spp") {
        config.defaults.spp = spp;
    }
    if let Some(dir) = args.get_one::<String>("output-dir") {
        config.output_dir = Some(PathBuf::from(dir));
    }
}

fn load_scene(path: &Path) -> Result<Scene> {
    debug!("Reading scene {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene {}", path.display()))?;
    ron::from_str(&contents).with_context(|| format!("Failed to parse scene {}", path.display()))
}

/// One-line count of the diagnostics per kind, `None` when there are none
fn summary(diagnostics: &Diagnostics) -> Option<String> {
    if diagnostics.is_empty() {
        return None;
    }
    let mut counts: Vec<(String, usize)> = Vec::new();
    for diagnostic in diagnostics.iter() {
        let kind = format!("{:?}", diagnostic.kind);
        match counts.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, count)) => *count += 1,
            None => counts.push((kind, 1)),
        }
    }
    let parts: Vec<String> = counts.iter().map(|(kind, count)| format!("{count} {kind}")).collect();
    Some(parts.join(", "))
}

fn report(diagnostics: &Diagnostics) {
    if let Some(summary) = summary(diagnostics) {
        warn!("Scene assembled with diagnostics: {summary}");
    }
    for diagnostic in diagnostics.iter() {
        eprintln!("warning: {diagnostic}");
    }
}

fn render(workbench: &Workbench, args: &ArgMatches) -> Result<()> {
    let scene_file = args.get_one::<String>("scene").map(PathBuf::from).unwrap_or_default();
    let backend = args
        .get_one::<String>("backend")
        .map_or(DEFAULT_BACKEND, String::as_str);
    let scene = load_scene(&scene_file)?;
    info!("Rendering {} with {backend}", scene_file.display());

    if args.get_flag("print") {
        let assembled = workbench.assemble(&scene, backend)?;
        report(&assembled.diagnostics);
        print!("{}", assembled.text);
        for sidecar in &assembled.sidecars {
            println!("--- sidecar {} ---", sidecar.suffix);
            print!("{}", sidecar.contents);
        }
        return Ok(());
    }

    if !args.get_flag("launch") {
        let output = workbench.render(&scene, backend)?;
        report(&output.diagnostics);
        info!("Scene written to {}", output.scene_path.display());
        println!("{}", output.scene_path.display());
        for path in &output.sidecar_paths {
            println!("{}", path.display());
        }
        println!("{}", output.argv.join(" "));
        return Ok(());
    }

    let finished = workbench.render_and_launch(&scene, backend, &CancelToken::new())?;
    report(&finished.output.diagnostics);
    debug!("Renderer exit code: {:?}", finished.job.exit_code);
    for line in &finished.job.stdout_tail {
        println!("{line}");
    }
    for line in &finished.job.stderr_tail {
        eprintln!("{line}");
    }
    println!("Scene: {}", finished.output.scene_path.display());

    match finished.job.exit_code {
        Some(0) => Ok(()),
        Some(code) => std::process::exit(code),
        None => anyhow::bail!("Renderer was terminated"),
    }
}

fn cards(workbench: &Workbench, args: &ArgMatches) -> Result<()> {
    let store = workbench.cards();
    match args.subcommand() {
        Some(("list", _)) => {
            for name in store.list_cards() {
                println!("{name}");
            }
            Ok(())
        }
        Some(("show", sub)) => {
            let name = sub.get_one::<String>("name").map_or("", String::as_str);
            let card = store.load_card(name)?;
            if let Some(path) = store.card_path(name) {
                println!("# {}", path.display());
            }
            for (key, value) in card.iter() {
                println!("{key} = {value}");
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn backends(workbench: &Workbench) {
    for backend in workbench.registry().iter() {
        let kinds: Vec<&str> = MaterialKind::ALL
            .iter()
            .filter(|kind| backend.supports(**kind))
            .map(|kind| kind.name())
            .collect();
        println!(
            "{:<10} .{:<10} {:<16} {}",
            backend.id(),
            backend.extension(),
            backend.default_executable(),
            kinds.join(", ")
        );
    }
}

use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libsputter_timeline::config::Config;
use libsputter_timeline::process::{collect_log_files, process_log};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn main() {
    // Create a cli
    let matches = Command::new("sputter_timeline_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Log Path: {}", config.log_path.to_string_lossy());
    match &config.report_dir {
        Some(dir) => log::info!("Report Path: {}", dir.to_string_lossy()),
        None => log::info!("Report Path: next to each log"),
    }
    log::info!(
        "Text report: {} YAML report: {}",
        config.write_text_report,
        config.write_yaml_report
    );

    // Resolve the batch
    let files = if config.is_directory_run() {
        match collect_log_files(&config.log_path) {
            Ok(files) => files,
            Err(e) => {
                log::error!("{e}");
                return;
            }
        }
    } else {
        vec![config.log_path.clone()]
    };
    if files.is_empty() {
        log::warn!("No log files found under {}", config.log_path.to_string_lossy());
        return;
    }

    // Process the logs behind a progress bar
    let pb = pb_manager.add(ProgressBar::new(files.len() as u64));
    let mut processed = 0;
    let mut failed = 0;
    for file in &files {
        match process_log(&config, file) {
            Ok(run) => {
                processed += 1;
                log::info!(
                    "{}: {} timeline events",
                    file.file_name().unwrap_or_default().to_string_lossy(),
                    run.events.len()
                );
            }
            Err(e) => {
                failed += 1;
                log::error!("{e}");
            }
        }
        pb.inc(1);
    }
    pb.finish();

    if failed > 0 {
        log::warn!("Processed {processed} logs, {failed} failed.");
    } else {
        log::info!("Successfully processed {processed} logs!");
    }
    log::info!("Done.");
}

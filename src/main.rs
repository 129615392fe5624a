use clap::Parser;
use std::path::Path;
use std::process;
use systrace_parser::{
    build_info, output_mode_for, Cli, OutputFormatter, SystraceParser, TraceError,
    UserFriendlyError,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);
    tracing::debug!("{}", build_info());

    if cli.generate_config {
        let code = handle_generate_config(&cli);
        if code != 0 || !cli.has_work() {
            return code;
        }
    }

    let parser = match SystraceParser::from_cli(&cli) {
        Ok(parser) => parser,
        Err(e) => {
            print_startup_error(&e, &cli);
            return exit_code_for(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &parser);
    }

    let mut write_failures = false;

    if let Some(ref filename) = cli.filename {
        match parser.extract_single(filename, cli.output.as_deref()) {
            Ok(outcome) => write_failures |= !outcome.is_clean(),
            Err(e) => {
                parser.handle_error(&e);
                return exit_code_for(&e);
            }
        }
    }

    if let Some(ref input_dir) = cli.input_dir {
        match parser.extract_directory(input_dir, cli.output_dir.as_deref()) {
            Ok(report) => {
                parser.output_formatter().print_extraction_report(&report);
                write_failures |= report.has_errors();
            }
            Err(e) => {
                parser.handle_error(&e);
                return exit_code_for(&e);
            }
        }
    }

    if write_failures {
        2
    } else {
        0
    }
}

fn exit_code_for(error: &TraceError) -> i32 {
    match error {
        TraceError::Cancelled => 130,
        TraceError::ReadSource { .. } => 3,
        TraceError::InvalidPath { .. } | TraceError::DirectoryUnreadable { .. } => 4,
        TraceError::Config { .. } | TraceError::Selector { .. } => 5,
        TraceError::Io(_) => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "systrace-parser.toml".to_string());

    if Path::new(&config_path).exists() {
        eprintln!("Refusing to overwrite existing file: {}", config_path);
        return 1;
    }

    match SystraceParser::generate_sample_config(&config_path) {
        Ok(()) => {
            if !cli.quiet {
                println!("Generated sample configuration file: {}", config_path);
                println!("\nTo use this configuration:");
                println!("  systrace-parser -i <input_dir> --config {}", config_path);
            }
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, parser: &SystraceParser) -> i32 {
    let formatter = parser.output_formatter();
    let config = parser.config();

    formatter.info("DRY RUN MODE - No files will be written");
    formatter.print_separator();

    formatter.info("Configuration that would be used:");
    formatter.info(&format!("  Extension: {}", config.scan.extension));
    formatter.info(&format!("  Marker class: {}", config.extract.marker_class));
    formatter.info(&format!("  Multi-match: {}", config.extract.multi_match));
    formatter.info(&format!("  On parse error: {}", config.extract.on_parse_error));

    if let Some(ref filename) = cli.filename {
        let destination = parser.plan_single(filename, cli.output.as_deref());
        println!("{} -> {}", filename.display(), destination.display());
    }

    if let Some(ref input_dir) = cli.input_dir {
        match parser.plan_directory(input_dir, cli.output_dir.as_deref()) {
            Ok(plan) => {
                for (source, destination) in &plan {
                    println!("{} -> {}", source.display(), destination.display());
                }
                formatter.info(&format!("{} files would be processed", plan.len()));
            }
            Err(e) => {
                parser.handle_error(&e);
                return exit_code_for(&e);
            }
        }
    }

    formatter.print_separator();
    formatter.success("Dry run completed successfully");

    0
}

fn print_startup_error(error: &TraceError, cli: &Cli) {
    let formatter = OutputFormatter::new(output_mode_for(&cli.output_format), 0, cli.quiet);
    formatter.print_user_friendly_error(error);
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("systrace_parser={}", level))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use systrace_parser::{Config, GracefulShutdown, OutputMode};
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["systrace-parser"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn quiet_parser() -> SystraceParser {
        SystraceParser::with_shutdown(
            Config::default(),
            OutputMode::Plain,
            0,
            true,
            GracefulShutdown::detached(),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        let path = config_path.to_string_lossy().to_string();

        let cli = cli(&["--generate-config", "-q", "--config", &path]);
        assert_eq!(handle_generate_config(&cli), 0);

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[extract]"));

        // second run must not clobber the file
        assert_eq!(handle_generate_config(&cli), 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let input = TempDir::new().unwrap();
        let source = input.path().join("a.html");
        fs::write(
            &source,
            "<html><body><script class=\"trace-data\">\nx</script></body></html>",
        )
        .unwrap();

        let dir = input.path().to_string_lossy().to_string();
        let cli = cli(&["-i", &dir, "--dry-run", "-q"]);
        assert_eq!(handle_dry_run(&cli, &quiet_parser()), 0);
        assert!(!input.path().join("a.txt").exists());
    }

    #[test]
    fn test_dry_run_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing").to_string_lossy().to_string();

        let cli = cli(&["-i", &missing, "--dry-run", "-q"]);
        assert_eq!(handle_dry_run(&cli, &quiet_parser()), 4);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&TraceError::Cancelled), 130);
        assert_eq!(
            exit_code_for(&TraceError::ReadSource {
                path: "a.html".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone")
            }),
            3
        );
        assert_eq!(
            exit_code_for(&TraceError::InvalidPath {
                path: "/elsewhere/a.html".to_string()
            }),
            4
        );
        assert_eq!(
            exit_code_for(&TraceError::Config {
                message: "bad".to_string()
            }),
            5
        );
    }
}

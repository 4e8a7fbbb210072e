mod cli;

use soundforged::{config, session};
use soundforged_av::{FfprobeProber, ToolRegistry};
use soundforged_core::TargetFormat;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag.
    // Logs go to stderr so stdout stays usable for listings and JSON.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "soundforged=debug,soundforged_scheduler=debug,soundforged_av=debug,soundforged_naming=debug".to_string()
        } else {
            "soundforged=info,soundforged_scheduler=warn,soundforged_av=warn,soundforged_naming=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            inputs,
            output_dir,
            format,
            pattern,
            jobs,
            recursive,
            dry_run,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            apply_overrides(&mut config, output_dir, format, pattern, jobs);
            config::validate_config(&config)?;

            let request = session::ConvertRequest {
                inputs,
                recursive,
                dry_run,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(session::convert(&config, &request))
        }
        Commands::Probe { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Formats => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            list_formats(&config);
            Ok(())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("soundforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn apply_overrides(
    config: &mut config::Config,
    output_dir: Option<PathBuf>,
    format: Option<TargetFormat>,
    pattern: Option<String>,
    jobs: Option<usize>,
) {
    if let Some(dir) = output_dir {
        config.naming.output_dir = Some(dir);
    }
    if let Some(format) = format {
        config.conversion.format = format;
    }
    if let Some(pattern) = pattern {
        config.naming.pattern = pattern;
    }
    if let Some(jobs) = jobs {
        config.conversion.concurrency = jobs;
    }
}

async fn probe_file(config: &config::Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(tools.ffprobe()?.to_path_buf());
    let info = prober.probe(file).await?;

    if json {
        let json_str = serde_json::to_string_pretty(&info)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", file.display());
    if let Some(ref format) = info.format_name {
        println!("Container: {}", format);
    }
    if let Some(size) = info.size_bytes {
        println!("Size: {} bytes", size);
    }
    if let Some(duration) = info.duration_secs {
        let secs = duration.round() as u64;
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
    }

    if info.has_audio {
        print!("Audio: {}", info.codec.as_deref().unwrap_or("unknown"));
        if let Some(rate) = info.sample_rate {
            print!(" {} Hz", rate);
        }
        if let Some(channels) = info.channels {
            print!(" {}ch", channels);
        }
        println!();
    } else {
        println!("Audio: none");
    }

    let tags = &info.tags;
    let fields: [(&str, Option<String>); 8] = [
        ("Title", tags.title.clone()),
        ("Artist", tags.artist.clone()),
        ("Album artist", tags.album_artist.clone()),
        ("Album", tags.album.clone()),
        ("Genre", tags.genre.clone()),
        ("Year", tags.year.clone()),
        ("Track", number_pair(tags.track_number, tags.track_count)),
        ("Disc", number_pair(tags.disc_number, tags.disc_count)),
    ];
    println!("\nTags:");
    for (label, value) in fields {
        if let Some(value) = value {
            println!("  {}: {}", label, value);
        }
    }

    Ok(())
}

fn number_pair(number: Option<u32>, total: Option<u32>) -> Option<String> {
    match (number, total) {
        (Some(n), Some(t)) => Some(format!("{}/{}", n, t)),
        (Some(n), None) => Some(n.to_string()),
        _ => None,
    }
}

fn check_tools(config: &config::Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. ffmpeg is required for conversion; ffprobe for tags.");
    }

    Ok(())
}

fn list_formats(config: &config::Config) {
    println!(
        "{:<8} {:<12} {:<6} {:<24} DEFAULT QUALITY",
        "NAME", "LABEL", "EXT", "MIME TYPE"
    );
    for format in TargetFormat::ALL {
        println!(
            "{:<8} {:<12} {:<6} {:<24} {}",
            format.to_string(),
            format.label(),
            format.extension(),
            format.mime_type(),
            config.conversion.quality_for(format)
        );
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let conversion = &config.conversion;
    println!("  Format: {}", conversion.format);
    println!(
        "  Encoding: {}",
        conversion.encoding_params(conversion.format)
    );
    println!(
        "  Parallel jobs: {}",
        conversion.effective_concurrency()
    );
    println!("  Pattern: {}", config.naming.effective_pattern());
    match &config.naming.output_dir {
        Some(dir) => println!("  Output dir: {}", dir.display()),
        None => println!("  Output dir: next to each source"),
    }
    println!("  Preflight checks: {}", config.scheduler.preflight);

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use paper_atlas::config::{self, AtlasConfig};
use paper_atlas::{dataset, serve, themes};

#[derive(Parser, Debug)]
#[command(
    name = "paper-atlas",
    version,
    about = "Interactive dashboard over a 2-D embedding of conference paper titles"
)]
struct Cli {
    #[arg(long, global = true, default_value = "atlas_config.json")]
    config: PathBuf,
    #[arg(
        long,
        global = true,
        help = "Write the resolved config to disk before running"
    )]
    write_config: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(name = "serve")]
    Serve(serve::ServeArgs),
    #[command(name = "validate")]
    Validate,
}

fn run_validate(config: &AtlasConfig) -> Result<(), String> {
    let dataset = dataset::load_dataset(
        Path::new(&config.dataset_path),
        Path::new(&config.embeddings_path),
        Path::new(&config.embeddings_json_path),
    )?;
    println!(
        "dataset: {} records from {}",
        dataset.len(),
        config.dataset_path
    );
    println!(
        "embeddings: {} x {}",
        dataset.len(),
        dataset.embedding_dim()
    );

    let themes_dir = Path::new(&config.themes_dir);
    let counts = themes::available_cluster_counts(themes_dir);
    if counts.is_empty() {
        return Err(format!(
            "No cluster theme artifacts found in {}",
            themes_dir.display()
        ));
    }
    for &k in &counts {
        let cluster_themes = themes::load_cluster_themes(themes_dir, k)?;
        cluster_themes.validate_record_count(dataset.len())?;
        println!(
            "cluster themes (K={k}): {} themes, {} assignments",
            cluster_themes.themes.len(),
            cluster_themes.assignments.len()
        );
        if cluster_themes.themes.len() != k {
            eprintln!(
                "warning: artifact for K={k} contains {} themes",
                cluster_themes.themes.len()
            );
        }
    }
    println!("all artifacts are consistent");
    Ok(())
}

fn run_command(command: Commands, config: AtlasConfig) -> Result<(), String> {
    match command {
        Commands::Serve(args) => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|err| format!("Failed to create runtime: {err}"))?;
            rt.block_on(serve::run_with_args(args, config))
                .map_err(|err| format!("serve failed: {err}"))
        }
        Commands::Validate => run_validate(&config),
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if cli.write_config {
        if let Err(err) = config::write_config(&cli.config, &config) {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }

    let Some(command) = cli.command else {
        if !cli.write_config {
            eprintln!("No subcommand supplied. Use --help for usage details.");
            std::process::exit(2);
        }
        return;
    };

    if let Err(err) = run_command(command, config) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

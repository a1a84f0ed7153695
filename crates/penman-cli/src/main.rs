mod checkpoint;
mod config;
mod generate_cmd;
mod html;
mod plan_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use penman_core::provider::ProviderKind;
use penman_core::{ArticleRequest, SectionFailurePolicy};

use config::{CliOverrides, ConfigFile, PenmanConfig};

#[derive(Parser)]
#[command(
    name = "penman",
    about = "Generate structured HTML articles with LLM providers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a penman config file
    Init {
        /// Default provider recorded in the file (openrouter or gemini)
        #[arg(long, default_value = "openrouter")]
        provider: ProviderKind,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Plan, write and validate an article, then save it as HTML
    Generate {
        #[command(flatten)]
        article: ArticleArgs,
        /// Directory for the HTML file (overrides PENMAN_OUTPUT_DIR)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Also write the outline as <slug>_plan.json before expansion
        #[arg(long)]
        save_plan: bool,
        /// Fail instead of warning when validation finds issues
        #[arg(long)]
        strict: bool,
        /// What to do when a section cannot be written (continue or abort)
        #[arg(long)]
        on_section_failure: Option<SectionFailurePolicy>,
        /// Maximum section requests in flight (1 keeps document order and
        /// example tracking)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Generate the article outline only and print it as JSON
    Plan {
        #[command(flatten)]
        article: ArticleArgs,
    },
}

#[derive(Args)]
struct ArticleArgs {
    /// Title of the article
    #[arg(long)]
    title: String,
    /// Main topic of the article
    #[arg(long)]
    topic: String,
    /// Programming language the article is about
    #[arg(long)]
    language: String,
    /// API provider (overrides API_PROVIDER)
    #[arg(long)]
    provider: Option<ProviderKind>,
}

impl ArticleArgs {
    fn into_request(self) -> ArticleRequest {
        let request = ArticleRequest::new(self.title, self.topic, self.language);
        match self.provider {
            Some(provider) => request.with_provider(provider),
            None => request,
        }
    }
}

/// Execute the `penman init` command: write config file.
fn cmd_init(provider: ProviderKind, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    config::save_config_to(&path, &ConfigFile::starter(provider))?;

    println!("Config written to {}", path.display());
    println!("  provider = {provider}");
    println!();
    println!(
        "Next: set {} (or add api_key under [{provider}]) and run `penman generate`.",
        provider.api_key_env()
    );

    Ok(())
}

/// Cancel `token` on the first Ctrl+C; exit on the second.
fn install_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let mut interrupted = false;
        loop {
            tokio::signal::ctrl_c().await.ok();
            if interrupted {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            interrupted = true;
            eprintln!("\nCancelling (Ctrl+C again to force)...");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // A .env in the working directory feeds the env layer of the config
    // chain; absence is normal.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    let result = match cli.command {
        Commands::Init { provider, force } => cmd_init(provider, force),
        Commands::Generate {
            article,
            output_dir,
            save_plan,
            strict,
            on_section_failure,
            concurrency,
        } => {
            let overrides = CliOverrides {
                provider: article.provider,
                output_dir,
                strict,
                on_section_failure,
                concurrency,
            };
            match PenmanConfig::resolve(&overrides) {
                Ok(resolved) => {
                    install_interrupt_handler(cancel.clone());
                    generate_cmd::run_generate(&resolved, article.into_request(), save_plan, &cancel)
                        .await
                        .map(|_| ())
                }
                Err(e) => Err(e),
            }
        }
        Commands::Plan { article } => {
            let overrides = CliOverrides {
                provider: article.provider,
                ..CliOverrides::default()
            };
            match PenmanConfig::resolve(&overrides) {
                Ok(resolved) => {
                    install_interrupt_handler(cancel.clone());
                    plan_cmd::run_plan(&resolved, article.into_request(), &cancel).await
                }
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

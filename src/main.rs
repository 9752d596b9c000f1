//! pull-all: clone or update every repository of a GitHub organization or user.
//!
//! # Usage
//!
//! ```bash
//! pull-all --org acme --dir ~/src/acme
//! pull-all --user octocat --threads 4 --no-live-updates
//! pull-all --org acme --delete --yes
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pull_all::git::{GitCli, RepoExecutor, SyncOptions};
use pull_all::github::{fetch_repositories, gh_auth_token, Owner, Repository};
use pull_all::ui::{
    detect_interactive, AnsiTerminal, Palette, RenderConfig, RenderLoop, RenderMode,
    StatusRenderer, SummaryReporter,
};
use pull_all::{BoundedScheduler, StatusListener, SyncConfig, SyncError, TaskStore};

#[derive(Parser, Debug)]
#[command(name = "pull-all", version, about = "Sync all repositories of a GitHub organization or user")]
#[command(group(ArgGroup::new("owner").required(true).args(["org", "user"])))]
struct Cli {
    /// GitHub organization name
    #[arg(short, long)]
    org: Option<String>,

    /// GitHub username
    #[arg(short, long)]
    user: Option<String>,

    /// GitHub personal access token (falls back to GITHUB_TOKEN, then `gh auth token`)
    #[arg(short, long)]
    token: Option<String>,

    /// Use SSH URLs for cloning
    #[arg(short, long)]
    ssh: bool,

    /// Target directory for repositories
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Number of repositories processed concurrently
    #[arg(short = 'j', long, value_parser = parse_threads)]
    threads: Option<usize>,

    /// Process repositories one at a time
    #[arg(long, conflicts_with = "threads")]
    single_thread: bool,

    /// Show in-progress states while repositories are processed
    #[arg(long, overrides_with = "no_live_updates")]
    live_updates: bool,

    /// Only show each repository's final status
    #[arg(long, overrides_with = "live_updates")]
    no_live_updates: bool,

    /// Delete local clones instead of syncing (skips repositories with uncommitted changes)
    #[arg(long)]
    delete: bool,

    /// Skip the confirmation prompt for --delete
    #[arg(short, long)]
    yes: bool,

    /// Merge the default branch into the current branch after fetching
    #[arg(long)]
    pull_from_default: bool,

    /// Configuration file (defaults to ./pull-all.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exit with status 2 when any repository failed
    #[arg(long)]
    fail_on_error: bool,
}

fn parse_threads(value: &str) -> std::result::Result<usize, String> {
    let threads: usize = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if threads == 0 {
        return Err("Thread count must be at least 1".to_string());
    }
    Ok(threads)
}

impl Cli {
    fn owner(&self) -> Option<Owner> {
        match (&self.org, &self.user) {
            (Some(org), _) => Some(Owner::Organization(org.clone())),
            (None, Some(user)) => Some(Owner::User(user.clone())),
            (None, None) => None,
        }
    }

    /// Flags win over the file and environment layers.
    fn apply(&self, config: &mut SyncConfig) {
        if self.single_thread {
            config.concurrency = 1;
        } else if let Some(threads) = self.threads {
            config.concurrency = threads;
        }
        if self.no_live_updates {
            config.live_updates = false;
        } else if self.live_updates {
            config.live_updates = true;
        }
        if self.ssh {
            config.use_ssh = true;
        }
        if self.pull_from_default {
            config.pull_from_default = true;
        }
        if let Some(dir) = &self.dir {
            config.target_dir = dir.clone();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    ctrlc::set_handler(|| {
        let _ = crossterm::execute!(io::stdout(), crossterm::cursor::Show);
        println!();
        std::process::exit(130);
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut config = SyncConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    let owner = cli
        .owner()
        .context("Either --org or --user must be provided")?;
    let interactive = detect_interactive();
    let palette = Palette::new(interactive);
    let timeouts = config.timeout_config();

    if config.token.is_none() {
        config.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    }
    if config.token.is_none() {
        if let Some(token) = gh_auth_token(timeouts.listing_timeout).await {
            println!("{}", palette.cyan().apply_to("🔑 Using GitHub token from gh CLI"));
            config.token = Some(token);
        }
    }

    print_banner(&cli, &owner, &config, &palette);

    if cli.delete && !cli.yes && !confirm_delete(&config).await? {
        println!("{}", palette.yellow().apply_to("✖️  Operation cancelled"));
        return Ok(ExitCode::SUCCESS);
    }

    tokio::fs::create_dir_all(&config.target_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.target_dir.display()))?;

    let repos = fetch_repositories(&owner, config.token.as_deref(), &timeouts)
        .await
        .with_context(|| format!("Failed to list repositories for {}", owner.name()))?;
    println!(
        "{}",
        palette
            .green()
            .apply_to(format!("✅ Found {} repositories", repos.len()))
    );

    let store = Arc::new(TaskStore::new());
    for repo in &repos {
        store.add_item(repo.name.clone());
    }

    let render_config = RenderConfig::new(config.concurrency, config.live_updates, interactive);
    let term_width = render_config.term_width;
    let renderer = Arc::new(StatusRenderer::new(render_config, Arc::clone(&store)));
    let listener: Arc<dyn StatusListener> = renderer.clone();
    let scheduler = BoundedScheduler::new(config.concurrency, Arc::clone(&store))?.with_listener(listener);

    let windowed = renderer.mode() == RenderMode::Windowed;
    if windowed {
        crossterm::execute!(io::stdout(), crossterm::cursor::Hide)?;
    }
    let render_loop = RenderLoop::start(Arc::clone(&renderer), config.render_interval());

    let executor = Arc::new(RepoExecutor::new(
        GitCli::with_timeout(timeouts.git_timeout),
        SyncOptions {
            target_dir: config.target_dir.clone(),
            use_ssh: config.use_ssh,
            pull_from_default: config.pull_from_default,
            has_token: config.token.is_some(),
        },
    ));
    let delete = cli.delete;
    let results = scheduler
        .run(repos, move |repo: Repository, reporter| {
            let executor = Arc::clone(&executor);
            async move {
                let result = if delete {
                    executor.delete_repository(&repo.name, &reporter).await
                } else {
                    executor.process(&repo, &reporter).await
                };
                Ok::<_, SyncError>(result)
            }
        })
        .await;

    if let Some(render_loop) = render_loop {
        render_loop.finish().await?;
    }
    if windowed {
        crossterm::execute!(io::stdout(), crossterm::cursor::Show)?;
    }

    SummaryReporter::new(&store, term_width, renderer.palette())
        .print(&mut AnsiTerminal::stdout())?;

    if cli.fail_on_error && results.iter().any(|result| !result.success) {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_banner(cli: &Cli, owner: &Owner, config: &SyncConfig, palette: &Palette) {
    let kind = owner.kind().to_lowercase();
    if cli.delete {
        println!(
            "{}",
            palette
                .red()
                .apply_to(format!("🗑️  Starting {} {} repository deletion...", owner.name(), kind))
        );
    } else {
        println!(
            "{}",
            palette
                .blue()
                .apply_to(format!("🚀 Starting {} {} repository sync...", owner.name(), kind))
        );
    }
    println!(
        "{}",
        palette
            .cyan()
            .apply_to(format!("📁 Target directory: {}", config.target_dir.display()))
    );
    if !cli.delete {
        let scheme = if config.use_ssh { "SSH" } else { "HTTPS" };
        println!(
            "{}",
            palette
                .cyan()
                .apply_to(format!("🔗 Using {} for cloning", scheme))
        );
        if config.pull_from_default {
            println!(
                "{}",
                palette.cyan().apply_to("🔀 Pull from default branch: enabled")
            );
        }
    }
    println!(
        "{}",
        palette
            .cyan()
            .apply_to(format!("⚡ Concurrency: {}", config.concurrency_label()))
    );
}

async fn confirm_delete(config: &SyncConfig) -> Result<bool> {
    print!(
        "⚠️  Are you sure you want to delete all repositories from {}? (y/N): ",
        config.target_dir.display()
    );
    io::stdout().flush()?;

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("Confirmation prompt failed")??;

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

//! `hound`: the operator CLI for houndd (§10.8). A thin clap front end over
//! the control socket — no indexing or search logic lives here, only
//! request construction and result rendering.

mod control_client;

use clap::{Parser, Subcommand};
use hound_core::control::{Request, Response};

use crate::control_client::ControlClient;

#[derive(Parser)]
#[command(name = "hound", about = "Operator CLI for houndd")]
#[command(disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print raw JSON responses instead of formatted output.
    #[arg(long, global = true)]
    json: bool,

    /// Print version information and exit.
    #[arg(short = 'V', long = "version", action = clap::ArgAction::SetTrue)]
    version: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report daemon build info and per-repo indexing state.
    Status,
    /// Trigger a reindex, either for one repo or every configured repo.
    Reindex {
        #[arg(long)]
        repo: Option<String>,
    },
    /// Ask houndd to stop.
    Shutdown,
    /// Search every ready repo (or a chosen subset) for a pattern.
    Search {
        pattern: String,
        #[arg(long)]
        repo: Vec<String>,
        #[arg(long)]
        files: Option<String>,
        #[arg(long, short = 'i')]
        ignore_case: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        max_files_per_repo: Option<usize>,
        #[arg(long, short = 'C', default_value_t = 0)]
        context: u32,
        /// Give up after this many milliseconds and return partial results.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        let b = &hound_core::build_info::CURRENT;
        println!("hound {} ({}, built {})", b.version, b.git_sha, b.timestamp);
        return Ok(());
    }

    let Some(command) = &cli.command else {
        anyhow::bail!("no subcommand given; try `hound status`, `hound search PATTERN`, or `hound --help`");
    };

    let request = match command {
        Commands::Status => Request::Status,
        Commands::Reindex { repo } => Request::Reindex { repo: repo.clone() },
        Commands::Shutdown => Request::Shutdown,
        Commands::Search {
            pattern,
            repo,
            files,
            ignore_case,
            limit,
            max_files_per_repo,
            context,
            timeout_ms,
        } => Request::Search {
            pattern: pattern.clone(),
            files: files.clone(),
            repos: if repo.is_empty() { None } else { Some(repo.clone()) },
            ignore_case: *ignore_case,
            limit: *limit,
            max_files_per_repo: *max_files_per_repo,
            context_lines: *context,
            timeout_ms: *timeout_ms,
        },
    };

    let mut client = ControlClient::connect()?;
    let response = client.request(&request)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    render(&response);
    Ok(())
}

fn render(response: &Response) {
    use owo_colors::OwoColorize;

    match response {
        Response::Status { build, repos } => {
            println!(
                "{} {} ({}, built {})",
                "houndd".bold(),
                build.version,
                build.git_sha,
                build.timestamp
            );
            if repos.is_empty() {
                println!("  no repos configured");
                return;
            }
            for repo in repos {
                let state = match repo.state.as_str() {
                    "ready" => repo.state.bright_green().to_string(),
                    "failed" => repo.state.bright_red().to_string(),
                    _ => repo.state.bright_yellow().to_string(),
                };
                print!("  {:<24} {}", repo.name.bold(), state);
                if let Some(rev) = &repo.last_indexed_revision {
                    print!("  rev={}", rev.dimmed());
                }
                if let Some(err) = &repo.last_error {
                    print!("  {}", err.bright_red());
                }
                println!();
            }
        }
        Response::Ok => println!("{}", "ok".bright_green()),
        Response::Error { message } => eprintln!("{} {}", "error:".bright_red().bold(), message),
        Response::SearchResults { repos, errors, truncated } => {
            let mut total = 0usize;
            for (repo, files) in repos {
                for (path, matches) in files {
                    for m in matches {
                        println!(
                            "{}{}{}{}{}: {}",
                            repo.bright_blue(),
                            ":".dimmed(),
                            path.bright_cyan(),
                            ":".dimmed(),
                            m.line_number.to_string().bright_yellow(),
                            m.line_text.trim_end()
                        );
                        for line in &m.before {
                            println!("  {}", line.dimmed());
                        }
                        for line in &m.after {
                            println!("  {}", line.dimmed());
                        }
                        total += 1;
                    }
                }
            }
            for (repo, message) in errors {
                eprintln!("{} {}: {}", "warning:".bright_yellow().bold(), repo, message);
            }
            if *truncated {
                println!("{}", "(results truncated)".dimmed());
            }
            println!("{} {}", total, if total == 1 { "match" } else { "matches" });
        }
    }
}

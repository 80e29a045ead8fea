use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::Result;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::info;

use sprintd::config::Config;
use sprintd::dates::parse_ddmmyyyy;
use sprintd::jira::{JiraClient, StateFilter};
use sprintd::upstream::UpstreamAdapter;
use sprintd::{
  Mode, QueryParams, Resolution, ResolveError, ResolveOptions, Resolver, ResolverCaches,
};

#[derive(Parser, Debug)]
#[command(name = "sprintd")]
#[command(about = "Resolve Jira sprints by id, name, issue, or date")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/sprintd/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Resolve a sprint from exactly one selector
  Resolve(ResolveArgs),
  /// Print one page of a board's sprint listing
  BoardSprints(BoardSprintsArgs),
}

#[derive(ClapArgs, Debug)]
struct ResolveArgs {
  #[arg(long)]
  sprint_id: Option<u64>,

  #[arg(long)]
  sprint_name: Option<String>,

  #[arg(long)]
  issue_key: Option<String>,

  /// Date inside the sprint, DDMMYYYY
  #[arg(long)]
  date: Option<String>,

  /// Range start, DDMMYYYY
  #[arg(long)]
  start_date: Option<String>,

  /// Range end, DDMMYYYY
  #[arg(long)]
  end_date: Option<String>,

  /// Issue lookups: latest sprint only, or every sprint of the issue
  #[arg(long, value_enum, default_value_t = Mode::Single)]
  mode: Mode,

  /// Board to search; repeat for several, highest priority first
  #[arg(long = "board")]
  boards: Vec<u64>,

  /// Search all configured boards when no --board is given
  #[arg(long)]
  cross_board: bool,

  /// Collapse date matches to the latest sprint
  #[arg(long)]
  single_result: bool,

  /// Listing state filter; `active` with no selector lists the current sprints
  #[arg(long, value_enum, default_value_t = StateFilter::All)]
  state: StateFilter,

  /// Overall deadline (default: resolve.deadline_secs)
  #[arg(long)]
  timeout_secs: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct BoardSprintsArgs {
  board_id: u64,

  #[arg(long, value_enum, default_value_t = StateFilter::All)]
  state: StateFilter,

  #[arg(long, default_value_t = 0)]
  start_at: u64,

  /// Page size, at most 200
  #[arg(long, default_value_t = 50)]
  max_results: u64,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = sprintd::logging::init(config.log_file.as_deref())?;

  let client = JiraClient::new(&config)?;
  let upstream = UpstreamAdapter::new(
    Arc::new(client),
    config.http.backoff(),
    config.http.max_attempts,
  );
  let caches = ResolverCaches::new();
  let resolver = Resolver::new(upstream, &caches, config.resolver_settings());

  let outcome = match args.command {
    Command::Resolve(resolve_args) => run_resolve(&resolver, &config, resolve_args).await,
    Command::BoardSprints(page_args) => run_board_sprints(&resolver, &config, page_args).await,
  };

  match outcome {
    Ok(output) => {
      println!("{}", serde_json::to_string_pretty(&output)?);
      Ok(ExitCode::SUCCESS)
    }
    Err(e) => {
      info!(code = e.code(), "request failed: {}", e);
      let output = json!({ "error": { "code": e.code(), "message": e.to_string() } });
      println!("{}", serde_json::to_string_pretty(&output)?);
      Ok(ExitCode::FAILURE)
    }
  }
}

async fn run_resolve(
  resolver: &Resolver,
  config: &Config,
  args: ResolveArgs,
) -> Result<Value, ResolveError> {
  let parse = |value: Option<String>, field: &str| {
    value.map(|v| parse_ddmmyyyy(&v, field)).transpose()
  };

  let params = QueryParams {
    sprint_id: args.sprint_id,
    sprint_name: args.sprint_name,
    issue_key: args.issue_key,
    date: parse(args.date, "date")?,
    start_date: parse(args.start_date, "start_date")?,
    end_date: parse(args.end_date, "end_date")?,
    mode: args.mode,
  };
  // No selector with --state active asks for the current sprints
  let active_only = !params.has_selector() && args.state == StateFilter::Active;
  let query = if active_only {
    None
  } else {
    Some(params.into_query()?)
  };

  // Fall back to the configured default board
  let boards = match (args.boards.is_empty(), args.cross_board, config.boards.default) {
    (true, false, Some(default)) => vec![default],
    _ => args.boards,
  };

  let timeout = args
    .timeout_secs
    .map(Duration::from_secs)
    .unwrap_or_else(|| config.resolve.deadline());
  let mut options = ResolveOptions::within(timeout)
    .with_boards(boards)
    .with_state(args.state);
  if args.cross_board {
    options = options.cross_board();
  }
  if args.single_result {
    options = options.single_result();
  }

  let (resolved_by, resolution) = match &query {
    Some(query) => (query.strategy(), resolver.resolve(query, &options).await?),
    None => ("active", resolver.active_sprints(&options).await?),
  };
  let count = resolution.sprints().len();
  Ok(match resolution {
    Resolution::Single(sprint) => json!({
      "mode": "single",
      "resolved_by": resolved_by,
      "sprint": sprint,
      "count": count,
    }),
    Resolution::List(sprints) => json!({
      "mode": "list",
      "resolved_by": resolved_by,
      "sprints": sprints,
      "count": count,
    }),
  })
}

async fn run_board_sprints(
  resolver: &Resolver,
  config: &Config,
  args: BoardSprintsArgs,
) -> Result<Value, ResolveError> {
  let deadline = Instant::now() + config.resolve.deadline();
  let page = resolver
    .board_sprints(args.board_id, args.state, args.start_at, args.max_results, deadline)
    .await?;

  Ok(json!({
    "board_id": args.board_id,
    "state": args.state.as_str(),
    "start_at": page.start_at,
    "next_start_at": page.next_start_at,
    "is_last": page.next_start_at.is_none(),
    "count": page.sprints.len(),
    "sprints": page.sprints,
  }))
}

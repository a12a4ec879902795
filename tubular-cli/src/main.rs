//! Command-line client for Tubular grid endpoints.

mod paths;

use std::fs;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use log::LevelFilter;
use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::Config;
use simplelog::SharedLogger;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;
use tubular_lib::GridController;
use tubular_lib::HttpDataService;
use tubular_lib::api::DataRequest;
use tubular_lib::api::GridDataRequest;
use tubular_lib::api::GridDataResponse;
use tubular_lib::api::Method;
use tubular_lib::api::Payload;
use tubular_lib::api::timezone_offset;
use tubular_lib::auth::SessionContext;
use tubular_lib::export;
use tubular_lib::grid::GridEvent;
use tubular_lib::grid::GridOptions;
use tubular_lib::model::Column;
use tubular_lib::model::Search;
use tubular_lib::service::DataService;
use tubular_lib::service::WebApiConfig;
use tubular_lib::storage::SqliteStore;
use tubular_lib::storage::StateStore;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "tubular", version, about = "Query and export Tubular grid endpoints")]
struct Cli {
    /// Server address, e.g. https://orders.example.com
    #[arg(long, env = "TUBULAR_URL", global = true)]
    server: Option<String>,

    /// Do not send bearer tokens or require a session.
    #[arg(long, global = true)]
    anonymous: bool,

    /// Log requests to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session for later commands.
    Login {
        #[arg(long, env = "TUBULAR_USERNAME")]
        username: String,
        #[arg(long, env = "TUBULAR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Print one page of a grid.
    Fetch {
        #[command(flatten)]
        grid: GridArgs,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        page_size: Option<i64>,
    },
    /// Write grid data as CSV.
    Export {
        #[command(flatten)]
        grid: GridArgs,
        /// Export every record instead of the first page.
        #[arg(long)]
        all: bool,
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GridArgs {
    /// Grid endpoint, e.g. /api/orders/paged
    route: String,
    /// Comma-separated columns; the first is the key. Inferred when omitted.
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,
    #[arg(long)]
    search: Option<String>,
    /// Column to sort by; repeat for a multi-column sort.
    #[arg(long)]
    sort: Vec<String>,
}

fn init_logging(verbose: bool) {
    let term_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let log_file = paths::log_file().and_then(|path| {
        let parent = path.parent()?;
        fs::create_dir_all(parent).ok()?;
        File::create(path).ok()
    });
    if let Some(file) = log_file {
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logger: {e}");
    }
}

fn open_store() -> StateStore {
    match SqliteStore::open_default() {
        Ok(store) => StateStore::new(store),
        Err(e) => {
            log::warn!("State database unavailable, using memory: {}", e);
            StateStore::in_memory()
        }
    }
}

fn build_service(cli: &Cli, store: &StateStore) -> CliResult<HttpDataService> {
    let server = cli
        .server
        .as_deref()
        .ok_or("no server address: pass --server or set TUBULAR_URL")?;
    let config = if cli.anonymous {
        WebApiConfig::anonymous()
    } else {
        WebApiConfig::default().with_refresh_tokens(true)
    };

    Ok(HttpDataService::builder()
        .server(server)
        .session(SessionContext::new(store.clone()))
        .config(config)
        .build()?)
}

/// Asks the endpoint for a single record and derives columns from it.
async fn probe_columns(service: &HttpDataService, route: &str) -> CliResult<Vec<Column>> {
    let request = DataRequest::new(route, Method::Post).with_payload(Payload::Grid(GridDataRequest {
        count: 0,
        columns: Vec::new(),
        skip: 0,
        take: 1,
        search: Search::none(),
        timezone_offset: timezone_offset(),
    }));

    let body = service.retrieve(request).await?.ok_or("not signed in: run `tubular login`")?;
    let response = GridDataResponse::from_value(&body).ok_or("endpoint did not answer with a grid page")?;
    let columns = response
        .payload
        .iter()
        .find_map(|record| record.as_object())
        .map(Column::infer_from_record)
        .unwrap_or_default();

    if columns.is_empty() {
        return Err("cannot infer columns from an empty grid: pass --columns".into());
    }
    Ok(columns)
}

async fn open_grid(
    service: HttpDataService,
    args: &GridArgs,
    anonymous: bool,
) -> CliResult<GridController> {
    let columns = if args.columns.is_empty() {
        probe_columns(&service, &args.route).await?
    } else {
        args.columns
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let column = Column::new(name.trim()).searchable();
                if index == 0 { column.key() } else { column }
            })
            .collect()
    };

    // Grid state lives for one command; only the session is stored.
    let name = args.route.trim_matches('/').replace('/', "_");
    let options = GridOptions::new(name)
        .with_server_url(&args.route)
        .with_authentication(!anonymous);
    let grid = GridController::new(options, Arc::new(service), StateStore::in_memory());

    grid.begin_registration()?;
    for column in columns {
        grid.add_column(column)?;
    }
    grid.seal_registration();
    Ok(grid)
}

/// Runs the grid's first fetch with the requested search and sort applied.
async fn load(grid: &GridController, args: &GridArgs) -> CliResult<()> {
    let mut events = grid.subscribe();

    if let Some(search) = &args.search {
        grid.set_search(search.as_str()).await;
    }
    for (index, column) in args.sort.iter().enumerate() {
        grid.sort_column(column, index > 0).await;
    }
    if args.search.is_none() && args.sort.is_empty() {
        grid.retrieve_data().await;
    }

    while let Ok(event) = events.try_recv() {
        if let GridEvent::ConnectionError(error) = event {
            return Err(format!("request failed: {error}").into());
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> CliResult<()> {
    let store = open_store();

    match &cli.command {
        Command::Login { username, password } => {
            let service = build_service(&cli, &store)?;
            let user = service.authenticate(username, password).await?;
            println!("Signed in as {}", user.username);
            if let Some(expires) = user.expiration_date {
                println!("Token expires at {expires}");
            }
        }
        Command::Logout => {
            SessionContext::new(store).sign_out();
            println!("Signed out");
        }
        Command::Fetch {
            grid: args,
            page,
            page_size,
        } => {
            let service = build_service(&cli, &store)?;
            let grid = open_grid(service, args, cli.anonymous).await?;
            load(&grid, args).await?;
            if let Some(size) = page_size {
                grid.set_page_size(*size).await;
            }
            if *page > 1 {
                grid.go_to_page(*page).await;
            }

            let csv = export::export_current(&grid)?;
            print!("{}", String::from_utf8_lossy(&csv));

            let info = grid.pager_info();
            let state = grid.state();
            eprintln!(
                "Records {}-{} of {} (page {} of {}){}",
                info.first,
                info.last,
                info.filtered_record_count,
                state.current_page,
                state.total_pages,
                if info.is_filtered {
                    format!(", {} total", info.total_record_count)
                } else {
                    String::new()
                }
            );
        }
        Command::Export {
            grid: args,
            all,
            output,
        } => {
            let service = build_service(&cli, &store)?;
            let grid = open_grid(service, args, cli.anonymous).await?;
            let csv = if *all {
                export::export_all(&grid).await?
            } else {
                load(&grid, args).await?;
                export::export_current(&grid)?
            };

            match output {
                Some(path) => {
                    fs::write(path, &csv)?;
                    log::info!("Wrote {} bytes to {}", csv.len(), path.display());
                }
                None => print!("{}", String::from_utf8_lossy(&csv)),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

//! Fetch the first page of a remote grid and print it as CSV.
//!
//! Run with: cargo run --example fetch_grid
//!
//! Requires .env file with:
//! - TUBULAR_URL (e.g. `https://orders.example.com`)
//! - TUBULAR_ROUTE (e.g. `/api/orders/paged`)
//!
//! Optional:
//! - TUBULAR_USERNAME and TUBULAR_PASSWORD to sign in first
//! - TUBULAR_COLUMNS, a comma-separated column list (first one is the key)

use std::env;
use std::sync::Arc;

use tubular_lib::GridController;
use tubular_lib::HttpDataService;
use tubular_lib::auth::SessionContext;
use tubular_lib::export;
use tubular_lib::grid::GridEvent;
use tubular_lib::grid::GridOptions;
use tubular_lib::model::Column;
use tubular_lib::service::WebApiConfig;
use tubular_lib::storage::StateStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let url = env::var("TUBULAR_URL").expect("TUBULAR_URL not set");
    let route = env::var("TUBULAR_ROUTE").expect("TUBULAR_ROUTE not set");
    let credentials = env::var("TUBULAR_USERNAME").ok().zip(env::var("TUBULAR_PASSWORD").ok());
    let columns = env::var("TUBULAR_COLUMNS").unwrap_or_else(|_| "Id".to_string());

    let config = if credentials.is_some() {
        WebApiConfig::default().with_refresh_tokens(true)
    } else {
        WebApiConfig::anonymous()
    };
    let service = HttpDataService::builder()
        .server(&url)
        .session(SessionContext::in_memory())
        .config(config)
        .build()?;

    if let Some((username, password)) = credentials {
        println!("Signing in as {username}...");
        let user = service.authenticate(&username, &password).await?;
        println!("Token expires at: {:?}\n", user.expiration_date);
    }

    let grid = GridController::new(
        GridOptions::new("example").with_server_url(&route),
        Arc::new(service),
        StateStore::in_memory(),
    );
    let mut events = grid.subscribe();

    grid.begin_registration()?;
    for (index, name) in columns.split(',').map(str::trim).enumerate() {
        let column = Column::new(name);
        grid.add_column(if index == 0 { column.key() } else { column })?;
    }
    grid.seal_registration();

    grid.retrieve_data().await;

    while let Ok(event) = events.try_recv() {
        if let GridEvent::ConnectionError(error) = event {
            eprintln!("Request failed: {error}");
            return Ok(());
        }
    }

    let info = grid.pager_info();
    println!(
        "Showing {}-{} of {} ({} filtered)\n",
        info.first, info.last, info.total_record_count, info.filtered_record_count
    );
    let csv = export::export_current(&grid)?;
    print!("{}", String::from_utf8_lossy(&csv));

    Ok(())
}

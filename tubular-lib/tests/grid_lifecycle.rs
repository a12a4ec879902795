//! Grid controller behavior against in-process data services.

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use tubular_lib::api::DataRequest;
use tubular_lib::api::Method;
use tubular_lib::api::Payload;
use tubular_lib::error::ApiError;
use tubular_lib::error::ConfigError;
use tubular_lib::export;
use tubular_lib::grid::ConnectionError;
use tubular_lib::grid::FetchOutcome;
use tubular_lib::grid::GridController;
use tubular_lib::grid::GridEvent;
use tubular_lib::grid::GridOptions;
use tubular_lib::model::Column;
use tubular_lib::model::DataType;
use tubular_lib::model::Filter;
use tubular_lib::model::FilterOperator;
use tubular_lib::model::SaveOutcome;
use tubular_lib::model::SortDirection;
use tubular_lib::server::InMemoryDataService;
use tubular_lib::service::DataService;
use tubular_lib::storage::StateStore;

use common::ScriptedService;
use common::orders;
use common::page;

fn options() -> GridOptions {
    GridOptions::new("orders")
        .with_server_url("/orders")
        .with_save_url("/orders")
}

fn register(grid: &GridController) {
    grid.begin_registration().unwrap();
    grid.add_column(Column::new("OrderId").key().data_type(DataType::Numeric))
        .unwrap();
    grid.add_column(Column::new("CustomerName").searchable()).unwrap();
    grid.add_column(Column::new("Amount").data_type(DataType::Numeric))
        .unwrap();
    grid.add_column(Column::new("ShippedDate").data_type(DataType::Date))
        .unwrap();
    grid.seal_registration();
}

fn grid_with(service: Arc<dyn DataService>, store: StateStore, options: GridOptions) -> GridController {
    let grid = GridController::new(options, service, store);
    register(&grid);
    grid
}

fn many_orders(count: i64) -> Vec<Value> {
    (1..=count)
        .map(|i| json!({"OrderId": i, "CustomerName": format!("C{i}"), "Amount": i, "ShippedDate": null}))
        .collect()
}

fn in_memory(records: Vec<Value>) -> Arc<InMemoryDataService> {
    Arc::new(InMemoryDataService::from_records("orders", records))
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<GridEvent>) -> Vec<GridEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// =============================================================================
// Column registration
// =============================================================================

#[tokio::test]
async fn test_add_column_after_seal_fails() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());

    let err = grid.add_column(Column::new("Extra")).unwrap_err();
    assert_eq!(err, ConfigError::ColumnsSealed);
    assert_eq!(grid.begin_registration().unwrap_err(), ConfigError::ColumnsSealed);
    assert_eq!(grid.columns().len(), 4);

    // Sealing twice is harmless.
    grid.seal_registration();
    assert!(grid.is_sealed());
}

#[tokio::test]
async fn test_duplicate_and_empty_column_names() {
    let grid = GridController::new(options(), in_memory(orders()), StateStore::in_memory());
    grid.add_column(Column::new("OrderId")).unwrap();

    assert_eq!(
        grid.add_column(Column::new("OrderId")).unwrap_err(),
        ConfigError::DuplicateColumn("OrderId".to_string())
    );
    grid.add_column(Column::new("")).unwrap();
    assert_eq!(grid.columns().len(), 1);
}

#[tokio::test]
async fn test_greets_parent_on_registration() {
    let grid = GridController::new(options(), in_memory(orders()), StateStore::in_memory());
    let mut rx = grid.subscribe();
    register(&grid);

    assert_eq!(
        rx.try_recv().unwrap(),
        GridEvent::GreetParent {
            name: "orders".to_string()
        }
    );
}

// =============================================================================
// Fetch lifecycle
// =============================================================================

#[tokio::test]
async fn test_rows_and_metadata_from_payload() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    let mut rx = grid.subscribe();

    assert_eq!(grid.retrieve_data().await, FetchOutcome::Loaded);

    let rows = grid.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].key(), "1");
    assert_eq!(rows[0].get("CustomerName"), Some(&json!("Acme")));
    assert_eq!(rows[2].get("ShippedDate"), Some(&json!("")));

    let state = grid.state();
    assert_eq!(state.total_record_count, 3);
    assert_eq!(state.filtered_record_count, 3);
    assert_eq!(state.request_counter, 1);
    assert!(!state.is_empty);
    assert!(!grid.is_in_flight());

    let events = drain(&mut rx);
    assert!(matches!(events[0], GridEvent::BeforeRequest(ref r) if r.url == "/orders"));
    assert_eq!(
        events[1],
        GridEvent::DataLoaded {
            name: "orders".to_string()
        }
    );
}

#[tokio::test]
async fn test_request_object_shape() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    let request = service.last_request();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.timeout, Some(Duration::from_secs(20)));
    assert!(request.require_authentication);

    let payload = request.grid_payload().unwrap();
    assert_eq!(payload.count, 0);
    assert_eq!(payload.skip, 0);
    assert_eq!(payload.take, 20);
    assert_eq!(payload.columns.len(), 4);

    // The next request carries the updated counter.
    assert_eq!(grid.get_request_object(0).grid_payload().unwrap().count, 1);
}

#[tokio::test]
async fn test_page_size_clamp() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(service.clone(), StateStore::in_memory(), options().with_page_size(5));
    grid.retrieve_data().await;
    assert_eq!(grid.state().page_size, 20);
    assert_eq!(service.last_request().grid_payload().unwrap().take, 20);

    let grid = grid_with(service.clone(), StateStore::in_memory(), options().with_page_size(50));
    grid.retrieve_data().await;
    assert_eq!(grid.state().page_size, 50);
    assert_eq!(service.last_request().grid_payload().unwrap().take, 50);
}

#[tokio::test]
async fn test_huge_page_size_keeps_grid_usable() {
    let grid = grid_with(in_memory(many_orders(45)), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    assert_eq!(grid.set_page_size(i64::MAX).await, FetchOutcome::Loaded);
    assert_eq!(grid.rows().len(), 45);
    assert_eq!(grid.state().total_pages, 1);
    assert_eq!((grid.pager_info().first, grid.pager_info().last), (1, 45));
    assert!(!grid.is_in_flight());

    assert_eq!(grid.set_page_size(20).await, FetchOutcome::Loaded);
    assert_eq!(grid.rows().len(), 20);
}

#[tokio::test]
async fn test_requested_page_is_clamped_to_record_count() {
    let total = Arc::new(AtomicI64::new(45));
    let count = total.clone();
    let service = ScriptedService::new(move |request| {
        let payload = request.grid_payload().unwrap();
        let total = count.load(Ordering::SeqCst);
        Ok(Some(json!({
            "Payload": [],
            "CurrentPage": payload.skip / payload.take + 1,
            "TotalPages": (total + payload.take - 1) / payload.take,
            "TotalRecordCount": total,
            "FilteredRecordCount": total,
        })))
    });
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    grid.go_to_page(9).await;
    assert_eq!(service.last_request().grid_payload().unwrap().skip, 40);
    assert_eq!(grid.state().current_page, 3);

    // The server now holds a single page; the next fetch still asks for
    // page 3 and learns the new count from the answer.
    total.store(20, Ordering::SeqCst);
    grid.retrieve_data().await;
    assert_eq!(grid.state().total_record_count, 20);

    grid.retrieve_data().await;
    assert_eq!(service.last_request().grid_payload().unwrap().skip, 0);
    assert_eq!(grid.state().requested_page, 1);
    assert_eq!(grid.state().current_page, 1);
}

#[tokio::test]
async fn test_empty_url_is_skipped() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(service.clone(), StateStore::in_memory(), GridOptions::new("orders"));

    assert_eq!(grid.retrieve_data().await, FetchOutcome::Skipped);
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_fetches_make_one_call() {
    let service = Arc::new(
        InMemoryDataService::from_records("orders", orders()).with_latency(Duration::from_millis(50)),
    );
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());

    let (first, second) = tokio::join!(grid.retrieve_data(), grid.retrieve_data());

    let mut outcomes = [first, second];
    outcomes.sort_by_key(|o| *o == FetchOutcome::Skipped);
    assert_eq!(outcomes, [FetchOutcome::Loaded, FetchOutcome::Skipped]);
    assert_eq!(service.request_count(), 1);
    assert!(!grid.is_in_flight());
}

#[tokio::test]
async fn test_null_payload_emits_one_connection_error() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());
    let mut rx = grid.subscribe();

    assert!(!grid.process_payload(None));

    assert_eq!(
        rx.try_recv().unwrap(),
        GridEvent::ConnectionError(ConnectionError::new(0, "Data is empty"))
    );
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    assert_eq!(grid.state().request_counter, 1);
}

#[tokio::test]
async fn test_invalid_payload_is_reported() {
    let service = ScriptedService::answering(json!({"Foo": 1}));
    let grid = grid_with(service, StateStore::in_memory(), options());
    let mut rx = grid.subscribe();

    assert_eq!(grid.retrieve_data().await, FetchOutcome::Failed);

    let errors: Vec<GridEvent> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, GridEvent::ConnectionError(_)))
        .collect();
    assert_eq!(
        errors,
        [GridEvent::ConnectionError(ConnectionError::new(
            0,
            "tubularGrid(orders): response is invalid."
        ))]
    );
}

#[tokio::test]
async fn test_failure_rolls_back_requested_page() {
    let loaded = Arc::new(AtomicBool::new(false));
    let flag = loaded.clone();
    let service = ScriptedService::new(move |_| {
        if flag.swap(true, Ordering::SeqCst) {
            Err(ApiError::http(500, "Database is down"))
        } else {
            let mut body = page(orders(), 100);
            body["FilteredRecordCount"] = json!(100);
            Ok(Some(body))
        }
    });
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    let mut rx = grid.subscribe();
    assert_eq!(grid.go_to_page(3).await, FetchOutcome::Failed);

    assert_eq!(service.last_request().grid_payload().unwrap().skip, 40);
    let state = grid.state();
    assert_eq!(state.requested_page, 1);
    assert_eq!(state.current_page, 1);
    assert!(drain(&mut rx).contains(&GridEvent::ConnectionError(ConnectionError::new(
        500,
        "Database is down"
    ))));
}

#[tokio::test]
async fn test_before_fetch_hook_runs() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let options = options().with_before_fetch(move |request| {
        assert_eq!(request.url, "/orders");
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options);

    grid.retrieve_data().await;
    grid.retrieve_data().await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Sorting, filtering, visibility
// =============================================================================

#[tokio::test]
async fn test_triple_sort_returns_to_unsorted() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());
    grid.retrieve_data().await;
    let mut rx = grid.subscribe();

    let sort_of = |grid: &GridController| {
        let state = grid.state();
        let column = state.column("CustomerName").unwrap();
        (column.sort_direction, column.sort_order)
    };

    grid.sort_column("CustomerName", false).await;
    assert_eq!(sort_of(&grid), (SortDirection::Ascending, 1));

    grid.sort_column("CustomerName", false).await;
    assert_eq!(sort_of(&grid), (SortDirection::Descending, 1));

    grid.sort_column("CustomerName", false).await;
    assert_eq!(sort_of(&grid), (SortDirection::None, -1));

    let sort_events = drain(&mut rx)
        .into_iter()
        .filter(|e| *e == GridEvent::SortChanged)
        .count();
    assert_eq!(sort_events, 3);
}

#[tokio::test]
async fn test_sort_applies_on_server() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    grid.sort_column("Amount", false).await;
    let keys: Vec<String> = grid.rows().iter().map(|r| r.key().to_string()).collect();
    assert_eq!(keys, ["3", "2", "1"]);
}

#[tokio::test]
async fn test_multiple_sort_ranking() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    grid.sort_column("CustomerName", false).await;
    grid.sort_column("Amount", true).await;
    let state = grid.state();
    assert_eq!(state.column("CustomerName").unwrap().sort_order, 1);
    assert_eq!(state.column("Amount").unwrap().sort_order, 2);

    // Changing direction moves the column to the end of the sort.
    grid.sort_column("CustomerName", true).await;
    let state = grid.state();
    let customer = state.column("CustomerName").unwrap();
    assert_eq!(customer.sort_direction, SortDirection::Descending);
    assert_eq!(customer.sort_order, 2);
    assert_eq!(state.column("Amount").unwrap().sort_order, 1);

    // A single sort clears the others.
    grid.sort_column("OrderId", false).await;
    let state = grid.state();
    assert_eq!(state.column("OrderId").unwrap().sort_order, 1);
    assert!(!state.column("Amount").unwrap().is_sorted());
    assert!(!state.column("CustomerName").unwrap().is_sorted());
}

#[tokio::test]
async fn test_unknown_or_unsortable_column_is_ignored() {
    let service = in_memory(orders());
    let grid = GridController::new(options(), service.clone(), StateStore::in_memory());
    grid.add_column(Column::new("OrderId").key()).unwrap();
    grid.add_column(Column::new("CustomerName").sortable(false)).unwrap();
    grid.seal_registration();

    assert_eq!(grid.sort_column("Missing", false).await, FetchOutcome::Skipped);
    assert_eq!(grid.sort_column("CustomerName", false).await, FetchOutcome::Skipped);
    assert_eq!(service.request_count(), 0);
}

#[tokio::test]
async fn test_stored_layout_is_reconciled() {
    let store = StateStore::in_memory();
    let mut filter = Filter::new("CustomerName");
    filter.apply("ac", None, FilterOperator::Contains);
    store
        .set(
            "orders_columns",
            &vec![
                Column::new("OrderId").sorted(1, SortDirection::Descending),
                Column::new("CustomerName").with_filter(filter),
                Column::new("Amount").visible(false),
                Column::new("Gone").visible(false),
            ],
        )
        .unwrap();

    let grid = grid_with(in_memory(orders()), store, options());
    grid.retrieve_data().await;

    let state = grid.state();
    assert!(!state.column("Amount").unwrap().visible);
    assert!(state.column("ShippedDate").unwrap().visible);
    assert_eq!(
        state.column("OrderId").unwrap().sort_direction,
        SortDirection::Descending
    );
    assert_eq!(
        state.column("CustomerName").unwrap().filter.as_ref().unwrap().text.as_deref(),
        Some("ac")
    );
    assert_eq!(grid.visible_column_count(), 3);
    // "Acme" is the only customer containing "ac".
    assert_eq!(state.filtered_record_count, 1);
}

#[tokio::test]
async fn test_stored_sort_ignored_after_first_fetch() {
    let store = StateStore::in_memory();
    let grid = grid_with(in_memory(orders()), store.clone(), options());
    grid.retrieve_data().await;

    store
        .set(
            "orders_columns",
            &vec![
                Column::new("OrderId").sorted(1, SortDirection::Descending),
                Column::new("Amount").visible(false),
            ],
        )
        .unwrap();
    grid.retrieve_data().await;

    let state = grid.state();
    assert_eq!(state.column("OrderId").unwrap().sort_direction, SortDirection::None);
    assert!(!state.column("Amount").unwrap().visible);
    assert_eq!(grid.rows()[0].key(), "1");
}

#[tokio::test]
async fn test_live_filter_wins_over_stored_filter() {
    let store = StateStore::in_memory();
    let grid = grid_with(in_memory(orders()), store.clone(), options());
    grid.retrieve_data().await;
    grid.apply_filter("CustomerName", "sky", None, FilterOperator::Contains)
        .await
        .unwrap();

    let mut stored = Filter::new("CustomerName");
    stored.apply("ac", None, FilterOperator::Contains);
    store
        .set(
            "orders_columns",
            &vec![Column::new("CustomerName").with_filter(stored)],
        )
        .unwrap();
    grid.retrieve_data().await;

    let state = grid.state();
    assert_eq!(
        state.column("CustomerName").unwrap().filter.as_ref().unwrap().text.as_deref(),
        Some("sky")
    );
    assert_eq!(grid.rows().len(), 1);
    assert_eq!(grid.rows()[0].key(), "2");
}

#[tokio::test]
async fn test_layout_is_saved_on_first_fetch() {
    let store = StateStore::in_memory();
    let grid = grid_with(in_memory(orders()), store.clone(), options());
    assert!(store.get::<Vec<Column>>("orders_columns").unwrap().is_none());

    grid.retrieve_data().await;
    let saved: Vec<Column> = store.get("orders_columns").unwrap().unwrap();
    assert_eq!(saved.len(), 4);

    grid.set_column_visible("Amount", false).unwrap();
    let saved: Vec<Column> = store.get("orders_columns").unwrap().unwrap();
    assert!(!saved.iter().find(|c| c.name() == "Amount").unwrap().visible);
    assert_eq!(
        grid.set_column_visible("Missing", false).unwrap_err(),
        ConfigError::UnknownColumn("Missing".to_string())
    );
}

#[tokio::test]
async fn test_apply_and_clear_filter() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    let outcome = grid
        .apply_filter("CustomerName", "sky", None, FilterOperator::Contains)
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::Loaded);
    assert_eq!(grid.rows().len(), 1);
    assert_eq!(grid.rows()[0].key(), "2");

    grid.clear_filter("CustomerName").await.unwrap();
    assert_eq!(grid.rows().len(), 3);

    assert!(matches!(
        grid.apply_filter("Missing", "x", None, FilterOperator::Equals).await,
        Err(ConfigError::UnknownColumn(_))
    ));
}

// =============================================================================
// Paging and search
// =============================================================================

#[tokio::test]
async fn test_page_is_persisted_and_restored() {
    let store = StateStore::in_memory();
    let service = in_memory(many_orders(45));
    let grid = grid_with(service.clone(), store.clone(), options());
    grid.retrieve_data().await;

    assert_eq!(grid.go_to_page(3).await, FetchOutcome::Loaded);
    assert_eq!(grid.state().current_page, 3);
    assert_eq!(store.get::<i64>("orders_page").unwrap(), Some(3));

    let info = grid.pager_info();
    assert_eq!((info.first, info.last), (41, 45));
    assert_eq!(info.total_record_count, 45);

    let restored = grid_with(service.clone(), store.clone(), options());
    assert_eq!(restored.state().current_page, 3);
    assert_eq!(restored.state().requested_page, 3);

    let fresh = grid_with(service, store, options().with_save_page(false));
    assert_eq!(fresh.state().current_page, 1);
}

#[tokio::test]
async fn test_go_to_same_page_is_skipped() {
    let service = in_memory(many_orders(45));
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    assert_eq!(grid.go_to_page(1).await, FetchOutcome::Skipped);
    assert_eq!(service.request_count(), 1);
}

#[tokio::test]
async fn test_page_size_is_persisted() {
    let store = StateStore::in_memory();
    let service = in_memory(many_orders(45));
    let grid = grid_with(service.clone(), store.clone(), options());
    grid.retrieve_data().await;

    assert_eq!(grid.set_page_size(50).await, FetchOutcome::Loaded);
    assert_eq!(grid.rows().len(), 45);
    assert_eq!(store.get::<i64>("orders_pageSize").unwrap(), Some(50));

    // A new grid picks the stored size up on its first fetch.
    let restored = grid_with(service, store, options());
    restored.retrieve_data().await;
    assert_eq!(restored.state().page_size, 50);
}

#[tokio::test]
async fn test_search_resets_page_and_persists() {
    let store = StateStore::in_memory();
    let grid = grid_with(in_memory(many_orders(45)), store.clone(), options());
    grid.retrieve_data().await;
    grid.go_to_page(2).await;

    assert_eq!(grid.set_search("C1").await, FetchOutcome::Loaded);
    let state = grid.state();
    assert_eq!(state.current_page, 1);
    assert_eq!(state.search.operator, FilterOperator::Auto);
    // C1 and C10..C19
    assert_eq!(state.filtered_record_count, 11);
    assert_eq!(store.get::<String>("orders_search").unwrap().as_deref(), Some("C1"));

    grid.set_search("").await;
    assert_eq!(grid.state().search.operator, FilterOperator::None);
    assert_eq!(grid.state().filtered_record_count, 45);
    assert!(store.get::<String>("orders_search").unwrap().is_none());
}

#[tokio::test]
async fn test_server_url_change_refetches() {
    let service = Arc::new(
        InMemoryDataService::new()
            .with_source("orders", tubular_lib::server::GridDataSource::infer("orders", orders()))
            .with_source(
                "archive",
                tubular_lib::server::GridDataSource::infer("archive", many_orders(5)),
            ),
    );
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    assert_eq!(grid.set_server_url("/archive").await, FetchOutcome::Loaded);
    assert_eq!(grid.state().total_record_count, 5);
    assert_eq!(grid.set_server_url("/archive").await, FetchOutcome::Skipped);
}

// =============================================================================
// Selection
// =============================================================================

#[tokio::test]
async fn test_selection_survives_new_controller() {
    let store = StateStore::in_memory();
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(service.clone(), store.clone(), options());
    grid.retrieve_data().await;

    let mut row = grid.rows()[1].clone();
    assert!(grid.change_selection(&mut row));
    assert!(row.selected);
    assert!(grid.rows()[1].selected);
    assert_eq!(grid.selected_keys(), ["2"]);

    let restored = grid_with(service, store.clone(), options());
    assert_eq!(restored.selected_keys(), ["2"]);
    assert!(!restored.is_empty_selection());

    restored.retrieve_data().await;
    let rows = restored.rows();
    assert!(rows[1].selected);
    assert!(!rows[0].selected);
    assert_eq!(restored.selected_rows().len(), 1);

    restored.clear_selection();
    assert!(restored.is_empty_selection());
    assert!(store.get::<Vec<String>>("orders_rows").unwrap().is_none());
}

#[tokio::test]
async fn test_change_selection_toggles() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    let mut row = grid.rows()[0].clone();
    assert!(grid.change_selection(&mut row));
    assert!(!grid.change_selection(&mut row));
    assert!(grid.is_empty_selection());
}

// =============================================================================
// Rows
// =============================================================================

#[tokio::test]
async fn test_row_save_unchanged_and_modified() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;
    let calls = service.calls();

    let mut row = grid.rows()[0].clone();
    assert_eq!(row.save(false).await.unwrap(), SaveOutcome::NoChanges);
    assert_eq!(service.calls(), calls);

    row.set("CustomerName", json!("Acme Corp"));
    assert!(row.has_changes());
    assert!(matches!(row.save(false).await.unwrap(), SaveOutcome::Saved(_)));
    assert!(!row.has_changes());

    let request = service.last_request();
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.url, "/orders");
    let Some(Payload::Update(update)) = request.payload else {
        panic!("expected an update payload");
    };
    assert_eq!(update.old["CustomerName"], json!("Acme"));
    assert_eq!(update.new["CustomerName"], json!("Acme Corp"));
}

#[tokio::test]
async fn test_new_row_is_posted_with_timezone() {
    let service = ScriptedService::answering(json!({"OrderId": 9}));
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());

    let mut row = grid.new_row(Some(json!({"CustomerName": "Northwind"})));
    assert!(row.is_new);
    assert!(row.is_editing());
    assert_eq!(row.get("CustomerName"), Some(&json!("Northwind")));

    assert_eq!(
        row.save(false).await.unwrap(),
        SaveOutcome::Saved(Some(json!({"OrderId": 9})))
    );

    let request = service.last_request();
    assert_eq!(request.method, Method::Post);
    assert!(request.url.starts_with("/orders?timezoneOffset="));
    let Some(Payload::Record(record)) = request.payload else {
        panic!("expected a record payload");
    };
    assert_eq!(record["CustomerName"], json!("Northwind"));
}

#[tokio::test]
async fn test_edit_copy_is_detached() {
    let grid = grid_with(in_memory(orders()), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    let mut copy = grid.edit_copy(0).unwrap();
    copy.set("CustomerName", json!("Changed"));
    assert_eq!(grid.rows()[0].get("CustomerName"), Some(&json!("Acme")));
    assert!(grid.edit_copy(99).is_none());
}

#[tokio::test]
async fn test_delete_row_keeps_query_and_refetches() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(
        service.clone(),
        StateStore::in_memory(),
        options().with_delete_url("/orders/remove?tenant=7"),
    );
    grid.retrieve_data().await;
    let mut rx = grid.subscribe();

    let row = grid.rows()[0].clone();
    assert!(row.delete(&grid).await.unwrap());

    let requests = service.requests();
    let delete = &requests[requests.len() - 2];
    assert_eq!(delete.method, Method::Delete);
    assert_eq!(delete.url, "/orders/remove/1?tenant=7");
    assert!(service.last_request().grid_payload().is_some());

    let events = drain(&mut rx);
    assert!(matches!(events[0], GridEvent::RemoveSuccess(Some(_))));
}

/// Slow page fetches, fast deletes; tracks how many page fetches overlap.
struct SlowBackend {
    inner: InMemoryDataService,
    fetching: AtomicUsize,
    max_fetching: AtomicUsize,
    deletes: AtomicUsize,
}

#[async_trait]
impl DataService for SlowBackend {
    async fn retrieve(&self, request: DataRequest) -> Result<Option<Value>, ApiError> {
        if request.method == Method::Delete {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            return self.inner.retrieve(request).await;
        }

        let now = self.fetching.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_fetching.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let result = self.inner.retrieve(request).await;
        self.fetching.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test]
async fn test_delete_row_refused_while_fetch_pending() {
    let backend = Arc::new(SlowBackend {
        inner: InMemoryDataService::from_records("orders", orders()),
        fetching: AtomicUsize::new(0),
        max_fetching: AtomicUsize::new(0),
        deletes: AtomicUsize::new(0),
    });
    let grid = grid_with(backend.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;
    let row = grid.rows()[0].clone();

    let (fetched, deleted) = tokio::join!(grid.retrieve_data(), grid.delete_row(&row));
    assert_eq!(fetched, FetchOutcome::Loaded);
    assert!(!deleted.unwrap());
    assert_eq!(backend.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(backend.max_fetching.load(Ordering::SeqCst), 1);
    assert!(!grid.is_in_flight());

    assert!(grid.delete_row(&row).await.unwrap());
    assert_eq!(backend.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(backend.max_fetching.load(Ordering::SeqCst), 1);
    assert_eq!(grid.rows().len(), 2);
}

#[tokio::test]
async fn test_delete_row_without_url_fails() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(
        service,
        StateStore::in_memory(),
        GridOptions::new("orders").with_server_url("/orders"),
    );
    grid.retrieve_data().await;

    let row = grid.rows()[0].clone();
    assert_eq!(
        grid.delete_row(&row).await.unwrap_err(),
        ConfigError::MissingDeleteUrl
    );
}

#[tokio::test]
async fn test_delete_row_against_in_memory_backend() {
    let service = in_memory(orders());
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.retrieve_data().await;

    let row = grid.rows()[1].clone();
    assert!(grid.delete_row(&row).await.unwrap());
    assert_eq!(grid.rows().len(), 2);
    assert_eq!(service.source("orders").unwrap().len(), 2);
}

// =============================================================================
// Full data source and export
// =============================================================================

#[tokio::test]
async fn test_full_data_source_ignores_paging_and_search() {
    let service = ScriptedService::answering(page(orders(), 3));
    let grid = grid_with(service.clone(), StateStore::in_memory(), options());
    grid.set_search("acme").await;

    let records = grid.get_full_data_source().await.unwrap();
    assert_eq!(records.len(), 3);

    let payload = service.last_request().grid_payload().cloned().unwrap();
    assert_eq!(payload.take, -1);
    assert_eq!(payload.search.text, "");
    assert_eq!(payload.search.operator, FilterOperator::None);
}

#[tokio::test]
async fn test_full_data_source_failure_is_reported() {
    let grid = grid_with(
        ScriptedService::failing(503, ""),
        StateStore::in_memory(),
        options(),
    );
    let mut rx = grid.subscribe();

    let err = grid.get_full_data_source().await.unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert_eq!(
        rx.try_recv().unwrap(),
        GridEvent::ConnectionError(ConnectionError::new(503, "Service Unavailable"))
    );
}

#[tokio::test]
async fn test_export_current_and_all() {
    let grid = grid_with(in_memory(many_orders(25)), StateStore::in_memory(), options());
    grid.retrieve_data().await;
    grid.set_column_visible("ShippedDate", false).unwrap();

    let current = String::from_utf8(export::export_current(&grid).unwrap()).unwrap();
    let lines: Vec<&str> = current.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines[0], "Order Id,Customer Name,Amount");
    assert_eq!(lines[1], "1,C1,1");
    assert_eq!(lines.len(), 21);

    let all = String::from_utf8(export::export_all(&grid).await.unwrap()).unwrap();
    assert_eq!(all.lines().count(), 26);
}

// region:    --- Imports
use auction_platform::audit::PostgresAuditLogWriter;
use auction_platform::database::DatabaseManager;
use auction_platform::handlers::{self, AppState};
use auction_platform::notification::PostgresNotificationQueue;
use auction_platform::scheduler::PhaseScheduler;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new().await);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // 단계 자동 전환 스케줄러 시작
    let scheduler = PhaseScheduler::new(Arc::clone(&db_manager));
    scheduler.start().await;

    // 관리용 클라이언트를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        db: Arc::clone(&db_manager),
        audit: Arc::new(PostgresAuditLogWriter::new(Arc::clone(&db_manager))),
        notifier: Arc::new(PostgresNotificationQueue::new(Arc::clone(&db_manager))),
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/auctions", post(handlers::handle_create_auction))
        .route("/auctions/:id", get(handlers::handle_get_auction))
        .route("/auctions/:id/settings", patch(handlers::handle_update_settings))
        .route("/auctions/:id/code", put(handlers::handle_change_code))
        .route("/auctions/:id/phase", post(handlers::handle_set_phase))
        .route(
            "/auctions/:id/notifications",
            patch(handlers::handle_update_notification_settings),
        )
        .route("/auctions/:id/join", post(handlers::handle_join_auction))
        .route(
            "/auctions/:id/items",
            post(handlers::handle_create_item).get(handlers::handle_list_items),
        )
        .route("/items/:id", get(handlers::handle_get_item))
        .route("/items/:id/highest-bid", get(handlers::handle_get_highest_bid))
        .route("/items/:id/winner", post(handlers::handle_assign_live_winner))
        .route(
            "/auctions/:id/items/:item_id/bids",
            post(handlers::handle_place_bid_request).get(handlers::handle_list_item_bids),
        )
        .route(
            "/auctions/:id/bids/:bid_id",
            delete(handlers::handle_delete_bid),
        )
        .route("/auctions/:id/totals/me", get(handlers::handle_get_my_totals))
        .route("/auctions/:id/totals", get(handlers::handle_list_totals))
        .route(
            "/auctions/:id/totals/recompute",
            post(handlers::handle_recompute_totals),
        )
        .route(
            "/auctions/:id/payments/:bidder_id",
            patch(handlers::handle_update_payment),
        )
        .route("/auctions/:id/reports", get(handlers::handle_get_reports))
        .route("/notifications", get(handlers::handle_list_notifications))
        .route(
            "/notifications/:id/read",
            post(handlers::handle_mark_notification_read),
        )
        .layer(cors)
        .with_state(state);

    // 리스너 생성 (기본 0.0.0.0:3000)
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main

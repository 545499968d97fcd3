/// 경매/상품 관리 커맨드 처리
/// 1. 경매 생성
/// 2. 경매 설정 변경
/// 3. 알림 설정 변경
/// 4. 상품 등록
// region:    --- Imports
use crate::auction::code;
use crate::auction::model::Auction;
use crate::auction::phase::AuctionStatus;
use crate::bidding::model::Item;
use crate::database::{is_unique_violation, DatabaseManager};
use crate::error::ApiError;
use crate::query;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Commands

#[derive(Debug, Clone)]
pub struct CreateAuctionInput {
    pub name: String,
    pub time_zone: String,
    pub auction_code: String,
    pub payment_url: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Default, Clone)]
pub struct UpdateAuctionSettings {
    pub name: Option<String>,
    pub time_zone: Option<String>,
    pub payment_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub auction_id: String,
    pub title: String,
    pub item_type: String,
    pub starting_price: i64,
    pub image_url: Option<String>,
}

const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (id, name, time_zone, auction_code, status, phase_schedule,
                          in_app_notifications, payment_url, created_by, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, NULL, TRUE, $6, $7, $8, $8)
    RETURNING id, name, time_zone, auction_code, status, phase_schedule,
              in_app_notifications, payment_url, created_by, created_at, updated_at
"#;

const UPDATE_AUCTION_SETTINGS: &str = r#"
    UPDATE auctions
    SET name = $2, time_zone = $3, payment_url = $4, updated_at = $5
    WHERE id = $1
    RETURNING id, name, time_zone, auction_code, status, phase_schedule,
              in_app_notifications, payment_url, created_by, created_at, updated_at
"#;

const UPDATE_AUCTION_NOTIFICATIONS: &str = r#"
    UPDATE auctions
    SET in_app_notifications = $2, updated_at = $3
    WHERE id = $1
    RETURNING id, name, time_zone, auction_code, status, phase_schedule,
              in_app_notifications, payment_url, created_by, created_at, updated_at
"#;

const INSERT_ITEM: &str = r#"
    INSERT INTO items (id, auction_id, title, item_type, starting_price, image_url, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING id, auction_id, title, item_type, starting_price, image_url, created_at
"#;

/// 1. 경매 생성 (초기 단계는 Setup)
/// 참가 코드는 생성 시점에 인덱스 행을 선점한다. 이미 점유된 코드는
/// 유일 제약 위반으로 거부된다.
pub async fn create_auction(
    db: &DatabaseManager,
    input: CreateAuctionInput,
) -> Result<Auction, ApiError> {
    info!("{:<12} --> 경매 생성: {}", "Command", input.name);
    let result: Result<Auction, sqlx::Error> = db
        .transaction(move |tx| {
            Box::pin(async move {
                let id = Uuid::new_v4().to_string();
                let now = Utc::now();
                sqlx::query(code::INSERT_CODE_INDEX)
                    .bind(&input.auction_code)
                    .bind(&id)
                    .bind(now)
                    .execute(&mut **tx)
                    .await?;
                sqlx::query_as::<_, Auction>(INSERT_AUCTION)
                    .bind(&id)
                    .bind(&input.name)
                    .bind(&input.time_zone)
                    .bind(&input.auction_code)
                    .bind(AuctionStatus::Setup.as_str())
                    .bind(&input.payment_url)
                    .bind(&input.created_by)
                    .bind(now)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await;
    match result {
        Ok(auction) => Ok(auction),
        Err(e) if is_unique_violation(&e) => Err(ApiError::AuctionCodeConflict),
        Err(e) => Err(e.into()),
    }
}

/// 2. 경매 설정 변경 (이름/시간대/결제 링크)
pub async fn update_auction_settings(
    db: &DatabaseManager,
    auction_id: &str,
    updates: UpdateAuctionSettings,
) -> Result<Option<Auction>, ApiError> {
    info!("{:<12} --> 경매 설정 변경: {}", "Command", auction_id);
    let Some(existing) = query::handlers::get_auction(db, auction_id).await? else {
        return Ok(None);
    };

    let name = updates.name.unwrap_or(existing.name);
    let time_zone = updates.time_zone.unwrap_or(existing.time_zone);
    let payment_url = updates.payment_url.or(existing.payment_url);

    let auction_id = auction_id.to_string();
    let updated = db
        .transaction(move |tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(UPDATE_AUCTION_SETTINGS)
                    .bind(&auction_id)
                    .bind(&name)
                    .bind(&time_zone)
                    .bind(&payment_url)
                    .bind(Utc::now())
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await?;
    Ok(Some(updated))
}

/// 3. 알림 설정 변경 (outbid 알림 토글)
pub async fn update_notification_settings(
    db: &DatabaseManager,
    auction_id: &str,
    in_app_enabled: bool,
) -> Result<Option<Auction>, ApiError> {
    info!(
        "{:<12} --> 알림 설정 변경: auction={}, in_app={}",
        "Command", auction_id, in_app_enabled
    );
    let auction_id = auction_id.to_string();
    let updated = db
        .transaction(move |tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(UPDATE_AUCTION_NOTIFICATIONS)
                    .bind(&auction_id)
                    .bind(in_app_enabled)
                    .bind(Utc::now())
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await?;
    Ok(updated)
}

/// 4. 상품 등록
pub async fn create_item(db: &DatabaseManager, input: CreateItemInput) -> Result<Item, ApiError> {
    info!(
        "{:<12} --> 상품 등록: auction={}, title={}",
        "Command", input.auction_id, input.title
    );
    if query::handlers::get_auction(db, &input.auction_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(
            "auction_not_found",
            "경매를 찾을 수 없습니다.",
        ));
    }

    let item = db
        .transaction(move |tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Item>(INSERT_ITEM)
                    .bind(Uuid::new_v4().to_string())
                    .bind(&input.auction_id)
                    .bind(&input.title)
                    .bind(&input.item_type)
                    .bind(input.starting_price)
                    .bind(&input.image_url)
                    .bind(Utc::now())
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await?;
    Ok(item)
}

// endregion: --- Commands

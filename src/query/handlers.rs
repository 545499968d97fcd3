// region:    --- Imports
use super::queries;
use crate::auction::model::Auction;
use crate::bidding::model::{Bid, Item, LiveWinner};
use crate::bidding::view;
use crate::database::DatabaseManager;
use crate::membership::Membership;
use crate::notification::Notification;
use crate::totals::Totals;
use sqlx::Error as SqlxError;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 경매 조회
pub async fn get_auction(
    db: &DatabaseManager,
    auction_id: &str,
) -> Result<Option<Auction>, SqlxError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
        .bind(auction_id)
        .fetch_optional(db.pool())
        .await
}

/// 참가 코드로 경매 조회
/// 인덱스 불변식이 깨졌는지 탐지할 수 있도록 목록으로 반환한다.
pub async fn find_auctions_by_code(
    db: &DatabaseManager,
    auction_code: &str,
) -> Result<Vec<Auction>, SqlxError> {
    info!("{:<12} --> 코드로 경매 조회: {}", "Query", auction_code);
    sqlx::query_as::<_, Auction>(queries::FIND_AUCTIONS_BY_CODE)
        .bind(auction_code)
        .fetch_all(db.pool())
        .await
}

/// 상품 조회
pub async fn get_item(db: &DatabaseManager, item_id: &str) -> Result<Option<Item>, SqlxError> {
    info!("{:<12} --> 상품 조회 id: {}", "Query", item_id);
    sqlx::query_as::<_, Item>(queries::GET_ITEM)
        .bind(item_id)
        .fetch_optional(db.pool())
        .await
}

/// 경매의 상품 목록 조회
pub async fn list_items_for_auction(
    db: &DatabaseManager,
    auction_id: &str,
) -> Result<Vec<Item>, SqlxError> {
    info!("{:<12} --> 상품 목록 조회: {}", "Query", auction_id);
    sqlx::query_as::<_, Item>(queries::LIST_ITEMS_FOR_AUCTION)
        .bind(auction_id)
        .fetch_all(db.pool())
        .await
}

/// 상품의 입찰 목록 조회
pub async fn list_bids_for_item(
    db: &DatabaseManager,
    item_id: &str,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 입찰 목록 조회 id: {}", "Query", item_id);
    sqlx::query_as::<_, Bid>(queries::LIST_BIDS_FOR_ITEM)
        .bind(item_id)
        .fetch_all(db.pool())
        .await
}

/// 경매의 입찰 목록 조회
pub async fn list_bids_for_auction(
    db: &DatabaseManager,
    auction_id: &str,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 경매 입찰 목록 조회 id: {}", "Query", auction_id);
    sqlx::query_as::<_, Bid>(queries::LIST_BIDS_FOR_AUCTION)
        .bind(auction_id)
        .fetch_all(db.pool())
        .await
}

/// 입찰 조회
pub async fn get_bid(db: &DatabaseManager, bid_id: &str) -> Result<Option<Bid>, SqlxError> {
    info!("{:<12} --> 입찰 조회 id: {}", "Query", bid_id);
    sqlx::query_as::<_, Bid>(queries::GET_BID)
        .bind(bid_id)
        .fetch_optional(db.pool())
        .await
}

/// 현재 최고 입찰 조회
/// 전체 입찰 목록을 읽어 표준 순서로 매번 재계산한다.
pub async fn get_current_high_bid(
    db: &DatabaseManager,
    item_id: &str,
) -> Result<Option<Bid>, SqlxError> {
    info!("{:<12} --> 최고 입찰 조회 id: {}", "Query", item_id);
    let bids = list_bids_for_item(db, item_id).await?;
    Ok(view::current_high_bid(&bids).cloned())
}

/// 경매의 라이브 낙찰 목록 조회
pub async fn list_live_winners_for_auction(
    db: &DatabaseManager,
    auction_id: &str,
) -> Result<Vec<LiveWinner>, SqlxError> {
    info!("{:<12} --> 라이브 낙찰 목록 조회: {}", "Query", auction_id);
    sqlx::query_as::<_, LiveWinner>(queries::LIST_LIVE_WINNERS_FOR_AUCTION)
        .bind(auction_id)
        .fetch_all(db.pool())
        .await
}

/// 멤버십 조회
pub async fn get_membership(
    db: &DatabaseManager,
    auction_id: &str,
    user_id: &str,
) -> Result<Option<Membership>, SqlxError> {
    info!(
        "{:<12} --> 멤버십 조회: auction={}, user={}",
        "Query", auction_id, user_id
    );
    sqlx::query_as::<_, Membership>(queries::GET_MEMBERSHIP)
        .bind(auction_id)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await
}

/// 입찰자 합계 조회
pub async fn get_totals(
    db: &DatabaseManager,
    auction_id: &str,
    bidder_id: &str,
) -> Result<Option<Totals>, SqlxError> {
    info!(
        "{:<12} --> 합계 조회: auction={}, bidder={}",
        "Query", auction_id, bidder_id
    );
    sqlx::query_as::<_, Totals>(queries::GET_TOTALS)
        .bind(auction_id)
        .bind(bidder_id)
        .fetch_optional(db.pool())
        .await
}

/// 경매의 합계 목록 조회
pub async fn list_totals_for_auction(
    db: &DatabaseManager,
    auction_id: &str,
) -> Result<Vec<Totals>, SqlxError> {
    info!("{:<12} --> 합계 목록 조회: {}", "Query", auction_id);
    sqlx::query_as::<_, Totals>(queries::LIST_TOTALS_FOR_AUCTION)
        .bind(auction_id)
        .fetch_all(db.pool())
        .await
}

/// 사용자 알림 목록 조회
pub async fn list_notifications_for_user(
    db: &DatabaseManager,
    user_id: &str,
) -> Result<Vec<Notification>, SqlxError> {
    info!("{:<12} --> 알림 목록 조회: {}", "Query", user_id);
    sqlx::query_as::<_, Notification>(queries::LIST_NOTIFICATIONS_FOR_USER)
        .bind(user_id)
        .fetch_all(db.pool())
        .await
}

// endregion: --- Query Handlers

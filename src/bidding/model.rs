use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 상품 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Item {
    pub id: String,
    pub auction_id: String,
    pub title: String,
    pub item_type: String,
    pub starting_price: i64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// 라이브 상품 낙찰 기록
// 라이브 상품은 입찰 이력 대신 관리자가 최종가와 낙찰자를 직접 배정한다.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LiveWinner {
    pub item_id: String,
    pub auction_id: String,
    pub bidder_id: String,
    pub final_price: i64,
    pub assigned_at: DateTime<Utc>,
}

// 입찰 모델
// 생성 이후 불변이다. 수정되지 않으며 관리자 삭제만 허용된다.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Bid {
    pub id: String,
    pub auction_id: String,
    pub item_id: String,
    pub bidder_id: String,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 모델
// updated_at 은 낙관적 동시성 제어의 펜싱 토큰으로 쓰인다.
// phase_schedule 은 {"open_at": "...", "closed_at": "..."} 형태의
// 단계명 -> 예정 시각(RFC3339) 맵이다.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Auction {
    pub id: String,
    pub name: String,
    pub time_zone: String,
    pub auction_code: String,
    pub status: String,
    pub phase_schedule: Option<serde_json::Value>,
    pub in_app_notifications: bool,
    pub payment_url: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

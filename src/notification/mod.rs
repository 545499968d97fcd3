/// 인앱 알림
/// 알림은 읽기 모델이다. 생성은 도메인 연산의 부수 효과로만 일어나며
/// (예: 입찰 교체 시 이전 최고 입찰자에게 outbid 알림), 전달 보장은 없다.
// region:    --- Imports
use crate::database::DatabaseManager;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Model

// 알림 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: String,
    pub auction_id: String,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub ref_type: String,
    pub ref_id: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// 새 알림 요청
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub auction_id: String,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub ref_type: String,
    pub ref_id: String,
}

// endregion: --- Model

// region:    --- Enqueuer

/// 알림 적재기
#[async_trait]
pub trait NotificationEnqueuer: Send + Sync {
    async fn enqueue(&self, notification: NewNotification) -> Result<(), ApiError>;
}

const INSERT_NOTIFICATION: &str = r#"
    INSERT INTO notifications (id, auction_id, user_id, kind, message, ref_type, ref_id, created_at, read_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)
"#;

/// Postgres 알림 큐
/// 경매 설정에서 인앱 알림이 꺼져 있으면 적재하지 않는다. 호출자가 설정을
/// 확인한 뒤 호출하므로 여기서는 단순 삽입만 한다.
pub struct PostgresNotificationQueue {
    db: Arc<DatabaseManager>,
}

impl PostgresNotificationQueue {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationEnqueuer for PostgresNotificationQueue {
    async fn enqueue(&self, notification: NewNotification) -> Result<(), ApiError> {
        info!(
            "{:<12} --> 알림 적재: auction={}, user={}, kind={}",
            "Notify", notification.auction_id, notification.user_id, notification.kind
        );
        sqlx::query(INSERT_NOTIFICATION)
            .bind(Uuid::new_v4().to_string())
            .bind(&notification.auction_id)
            .bind(&notification.user_id)
            .bind(&notification.kind)
            .bind(&notification.message)
            .bind(&notification.ref_type)
            .bind(&notification.ref_id)
            .bind(Utc::now())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

// endregion: --- Enqueuer

// region:    --- Read Marking

const MARK_NOTIFICATION_READ: &str = r#"
    UPDATE notifications
    SET read_at = $3
    WHERE id = $1 AND user_id = $2 AND read_at IS NULL
"#;

/// 알림 읽음 처리 (본인 알림만, 멱등)
pub async fn mark_notification_read(
    db: &DatabaseManager,
    notification_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    info!(
        "{:<12} --> 알림 읽음 처리: id={}, user={}",
        "Notify", notification_id, user_id
    );
    sqlx::query(MARK_NOTIFICATION_READ)
        .bind(notification_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;
    Ok(())
}

// endregion: --- Read Marking

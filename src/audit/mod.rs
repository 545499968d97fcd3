/// 감사 로그
/// 관리자 행위(입찰 삭제, 단계 변경, 합계 재계산 등)를 행위자와 대상,
/// 부가 정보와 함께 기록한다.
// region:    --- Imports
use crate::database::DatabaseManager;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Model

/// 감사 기록 항목
#[derive(Debug, Serialize, Clone)]
pub struct AuditEntry {
    pub auction_id: String,
    pub actor_user_id: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    /// 필수 필드 확인
    /// 행위자/대상이 비어 있는 감사 기록은 추적 가치가 없으므로 거부한다.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.auction_id.trim().is_empty()
            || self.actor_user_id.trim().is_empty()
            || self.action.trim().is_empty()
            || self.target_type.trim().is_empty()
            || self.target_id.trim().is_empty()
        {
            return Err(ApiError::Validation(
                "감사 기록의 필수 필드가 비어 있습니다.".to_string(),
            ));
        }
        Ok(())
    }
}

// endregion: --- Model

// region:    --- Writer

/// 감사 로그 기록기
#[async_trait]
pub trait AuditLogWriter: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), ApiError>;
}

const INSERT_AUDIT_LOG: &str = r#"
    INSERT INTO audit_logs (id, auction_id, actor_user_id, action, target_type, target_id, metadata, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

/// Postgres 감사 로그 기록기
pub struct PostgresAuditLogWriter {
    db: Arc<DatabaseManager>,
}

impl PostgresAuditLogWriter {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditLogWriter for PostgresAuditLogWriter {
    async fn record(&self, entry: AuditEntry) -> Result<(), ApiError> {
        entry.validate()?;
        info!(
            "{:<12} --> 감사 기록: auction={}, actor={}, action={}",
            "Audit", entry.auction_id, entry.actor_user_id, entry.action
        );
        sqlx::query(INSERT_AUDIT_LOG)
            .bind(Uuid::new_v4().to_string())
            .bind(&entry.auction_id)
            .bind(&entry.actor_user_id)
            .bind(&entry.action)
            .bind(&entry.target_type)
            .bind(&entry.target_id)
            .bind(&entry.metadata)
            .bind(Utc::now())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

// endregion: --- Writer

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> AuditEntry {
        AuditEntry {
            auction_id: "a1".to_string(),
            actor_user_id: "admin1".to_string(),
            action: "bid_deleted".to_string(),
            target_type: "bid".to_string(),
            target_id: "b1".to_string(),
            metadata: json!({ "amount": 100 }),
        }
    }

    #[test]
    fn test_valid_entry_passes() {
        assert!(entry().validate().is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut e = entry();
        e.actor_user_id = "  ".to_string();
        assert!(e.validate().is_err());

        let mut e = entry();
        e.target_id = String::new();
        assert!(e.validate().is_err());
    }
}

// endregion: --- Tests

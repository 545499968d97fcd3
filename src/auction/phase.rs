/// 경매 단계 상태 기계
/// 단계는 고정된 전방 순서로만 이동한다. 관리자 오버라이드와 스케줄 평가기
/// 두 경로가 있으며, 평가기는 updated_at 펜싱 토큰 기반의 낙관적
/// compare-and-swap 으로만 전진을 적용한다.
// region:    --- Imports
use crate::auction::model::Auction;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Status

/// 경매 단계 (전방 순서 고정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuctionStatus {
    Setup,
    Ready,
    Open,
    Pending,
    Complete,
    Closed,
}

/// 단계 전방 순서
pub const STATUS_ORDER: [AuctionStatus; 6] = [
    AuctionStatus::Setup,
    AuctionStatus::Ready,
    AuctionStatus::Open,
    AuctionStatus::Pending,
    AuctionStatus::Complete,
    AuctionStatus::Closed,
];

impl AuctionStatus {
    /// 저장용 문자열
    pub fn as_str(self) -> &'static str {
        match self {
            AuctionStatus::Setup => "Setup",
            AuctionStatus::Ready => "Ready",
            AuctionStatus::Open => "Open",
            AuctionStatus::Pending => "Pending",
            AuctionStatus::Complete => "Complete",
            AuctionStatus::Closed => "Closed",
        }
    }

    /// 저장 문자열 파싱
    pub fn parse(value: &str) -> Option<Self> {
        STATUS_ORDER.iter().copied().find(|s| s.as_str() == value)
    }

    /// 전방 순서 상의 순위
    pub fn rank(self) -> usize {
        STATUS_ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    /// phase_schedule 맵에서 이 단계의 예정 시각 키
    fn schedule_key(self) -> Option<&'static str> {
        match self {
            AuctionStatus::Setup => None,
            AuctionStatus::Ready => Some("ready_at"),
            AuctionStatus::Open => Some("open_at"),
            AuctionStatus::Pending => Some("pending_at"),
            AuctionStatus::Complete => Some("complete_at"),
            AuctionStatus::Closed => Some("closed_at"),
        }
    }
}

/// 예정 시각이 이미 지난 단계 중 가장 먼 단계를 계산
/// 전방 순서로 훑으며 예정 시각 <= now 인 마지막 단계를 남긴다.
/// 문자열이 아니거나 파싱되지 않는 항목은 건너뛴다.
pub fn resolve_target_status(
    phase_schedule: Option<&serde_json::Value>,
    now: DateTime<Utc>,
) -> Option<AuctionStatus> {
    let schedule = phase_schedule?.as_object()?;

    let mut target = None;
    for status in STATUS_ORDER {
        let Some(key) = status.schedule_key() else {
            continue;
        };
        let Some(raw) = schedule.get(key).and_then(|v| v.as_str()) else {
            continue;
        };
        let Ok(due) = DateTime::parse_from_rfc3339(raw) else {
            continue;
        };
        if due.with_timezone(&Utc) <= now {
            target = Some(status);
        }
    }

    target
}

// endregion: --- Status

// region:    --- Admin Override

const SELECT_AUCTION_FOR_UPDATE: &str = r#"
    SELECT id, name, time_zone, auction_code, status, phase_schedule,
           in_app_notifications, payment_url, created_by, created_at, updated_at
    FROM auctions
    WHERE id = $1
    FOR UPDATE
"#;

const UPDATE_AUCTION_PHASE: &str = r#"
    UPDATE auctions
    SET status = $2, phase_schedule = $3, updated_at = $4
    WHERE id = $1
    RETURNING id, name, time_zone, auction_code, status, phase_schedule,
              in_app_notifications, payment_url, created_by, created_at, updated_at
"#;

/// 관리자 단계 오버라이드
/// 예정 시각을 확인하지 않고 직접 단계를 설정한다. 후방 전환은 오류가 아니라
/// no-op 이며, phase_schedule 은 전달된 경우에만 교체된다.
pub async fn set_auction_phase(
    db: &DatabaseManager,
    auction_id: &str,
    status: AuctionStatus,
    phase_schedule: Option<Option<serde_json::Value>>,
) -> Result<Option<Auction>, ApiError> {
    info!(
        "{:<12} --> 단계 오버라이드: auction={}, status={}",
        "Phase",
        auction_id,
        status.as_str()
    );

    let auction_id = auction_id.to_string();
    db.transaction(move |tx| {
        Box::pin(async move {
            let existing = sqlx::query_as::<_, Auction>(SELECT_AUCTION_FOR_UPDATE)
                .bind(&auction_id)
                .fetch_optional(&mut **tx)
                .await?;
            let Some(existing) = existing else {
                return Ok(None);
            };

            let current_rank = AuctionStatus::parse(&existing.status)
                .map(AuctionStatus::rank)
                .unwrap_or_default();
            let forward = status.rank() > current_rank;
            if !forward && phase_schedule.is_none() {
                // 후방 또는 제자리 전환은 무시 (관리자 경로에서 오류 아님)
                return Ok(Some(existing));
            }

            let next_status = if forward {
                status.as_str().to_string()
            } else {
                existing.status.clone()
            };
            let next_schedule = match phase_schedule {
                Some(schedule) => schedule,
                None => existing.phase_schedule.clone(),
            };

            let updated = sqlx::query_as::<_, Auction>(UPDATE_AUCTION_PHASE)
                .bind(&auction_id)
                .bind(&next_status)
                .bind(&next_schedule)
                .bind(Utc::now())
                .fetch_one(&mut **tx)
                .await?;
            Ok(Some(updated))
        })
    })
    .await
}

// endregion: --- Admin Override

// region:    --- Scheduled Auto Advance

/// 평가기 실행 결과 요약
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PhaseAutoAdvanceResult {
    pub scanned: usize,
    pub advanced: usize,
}

#[derive(sqlx::FromRow)]
struct PhaseCandidate {
    id: String,
    status: String,
    phase_schedule: Option<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

const LIST_AUCTIONS_FOR_PHASE_ADVANCE: &str =
    "SELECT id, status, phase_schedule, updated_at FROM auctions";

const ADVANCE_AUCTION_PHASE_IF_UNCHANGED: &str = r#"
    UPDATE auctions
    SET status = $2, updated_at = $3
    WHERE id = $1 AND updated_at = $4
"#;

/// 예정 단계 전환 평가기
/// 스캔 시점의 updated_at 이 쓰기 시점까지 유지된 경우에만 전진을 적용한다.
/// CAS 에서 진 경우 이번 실행에서는 재시도하지 않는다. 다음 실행이 새 상태를
/// 기준으로 다시 평가하므로 관리자 오버라이드가 덮어써지지 않는다.
pub async fn run_phase_auto_advance(
    db: &DatabaseManager,
    now: DateTime<Utc>,
) -> Result<PhaseAutoAdvanceResult, ApiError> {
    let candidates = sqlx::query_as::<_, PhaseCandidate>(LIST_AUCTIONS_FOR_PHASE_ADVANCE)
        .fetch_all(db.pool())
        .await?;
    let scanned = candidates.len();
    let mut advanced = 0;

    for candidate in candidates {
        let Some(target) = resolve_target_status(candidate.phase_schedule.as_ref(), now) else {
            continue;
        };
        let current_rank = AuctionStatus::parse(&candidate.status)
            .map(AuctionStatus::rank)
            .unwrap_or_default();
        if target.rank() <= current_rank {
            continue;
        }

        let result = sqlx::query(ADVANCE_AUCTION_PHASE_IF_UNCHANGED)
            .bind(&candidate.id)
            .bind(target.as_str())
            .bind(now)
            .bind(candidate.updated_at)
            .execute(db.pool())
            .await?;
        if result.rows_affected() == 1 {
            info!(
                "{:<12} --> 단계 전진: auction={}, {} -> {}",
                "Phase",
                candidate.id,
                candidate.status,
                target.as_str()
            );
            advanced += 1;
        } else {
            // 스캔 이후 다른 쓰기가 선행됨 (CAS 패배) - 오류 아님
            debug!(
                "{:<12} --> 전진 생략(펜싱 토큰 불일치): auction={}",
                "Phase", candidate.id
            );
        }
    }

    debug!(
        "{:<12} --> 평가기 완료: scanned={}, advanced={}",
        "Phase", scanned, advanced
    );

    Ok(PhaseAutoAdvanceResult { scanned, advanced })
}

// endregion: --- Scheduled Auto Advance

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_status_order_is_strictly_increasing() {
        for window in STATUS_ORDER.windows(2) {
            assert!(window[0].rank() < window[1].rank());
        }
        assert_eq!(AuctionStatus::Setup.rank(), 0);
        assert_eq!(AuctionStatus::Closed.rank(), 5);
    }

    #[test]
    fn test_parse_round_trip() {
        for status in STATUS_ORDER {
            assert_eq!(AuctionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AuctionStatus::parse("Unknown"), None);
    }

    #[test]
    fn test_resolve_target_picks_furthest_due_phase() {
        let schedule = json!({
            "ready_at": "2026-01-01T00:00:00Z",
            "open_at": "2026-01-02T00:00:00Z",
            "pending_at": "2026-01-03T00:00:00Z",
        });
        let target = resolve_target_status(Some(&schedule), at("2026-01-02T12:00:00Z"));
        assert_eq!(target, Some(AuctionStatus::Open));
    }

    #[test]
    fn test_resolve_target_none_when_nothing_due() {
        let schedule = json!({ "open_at": "2026-06-01T00:00:00Z" });
        let target = resolve_target_status(Some(&schedule), at("2026-01-01T00:00:00Z"));
        assert_eq!(target, None);
        assert_eq!(resolve_target_status(None, at("2026-01-01T00:00:00Z")), None);
    }

    #[test]
    fn test_resolve_target_ignores_invalid_entries() {
        let schedule = json!({
            "ready_at": "2026-01-01T00:00:00Z",
            "open_at": "not-a-timestamp",
            "pending_at": 12345,
        });
        let target = resolve_target_status(Some(&schedule), at("2026-02-01T00:00:00Z"));
        assert_eq!(target, Some(AuctionStatus::Ready));
    }

    #[test]
    fn test_resolve_target_due_exactly_now_counts() {
        let schedule = json!({ "closed_at": "2026-01-01T00:00:00Z" });
        let target = resolve_target_status(Some(&schedule), at("2026-01-01T00:00:00Z"));
        assert_eq!(target, Some(AuctionStatus::Closed));
    }
}

// endregion: --- Tests

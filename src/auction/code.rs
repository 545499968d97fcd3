/// 경매 코드 인덱스
/// 참가 코드 -> 경매 의 유일한 역방향 매핑을 유지한다. 코드 변경은 경매 갱신,
/// 새 인덱스 기록, 구 인덱스 삭제를 하나의 트랜잭션으로 교체한다.
/// 미점유 코드는 잠글 행이 없으므로 FOR UPDATE 만으로는 동시 선점을 막지
/// 못한다. 새 점유는 항상 평범한 INSERT 로 기록하고, 유일 제약 위반(23505)을
/// 코드 충돌로 해석한다. auctions.auction_code 의 UNIQUE 제약이 최종 방어선이다.
// region:    --- Imports
use crate::auction::model::Auction;
use crate::database::{is_serialization_conflict, is_unique_violation, DatabaseManager};
use crate::error::ApiError;
use chrono::Utc;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Queries

const SELECT_AUCTION_FOR_UPDATE: &str = r#"
    SELECT id, name, time_zone, auction_code, status, phase_schedule,
           in_app_notifications, payment_url, created_by, created_at, updated_at
    FROM auctions
    WHERE id = $1
    FOR UPDATE
"#;

const SELECT_CODE_CLAIM_FOR_UPDATE: &str =
    "SELECT auction_id FROM auction_code_index WHERE auction_code = $1 FOR UPDATE";

const UPDATE_AUCTION_CODE: &str = r#"
    UPDATE auctions
    SET auction_code = $2, updated_at = $3
    WHERE id = $1
    RETURNING id, name, time_zone, auction_code, status, phase_schedule,
              in_app_notifications, payment_url, created_by, created_at, updated_at
"#;

pub(crate) const INSERT_CODE_INDEX: &str = r#"
    INSERT INTO auction_code_index (auction_code, auction_id, updated_at)
    VALUES ($1, $2, $3)
"#;

const REFRESH_CODE_INDEX: &str =
    "UPDATE auction_code_index SET updated_at = $2 WHERE auction_code = $1";

const DELETE_CODE_INDEX: &str = "DELETE FROM auction_code_index WHERE auction_code = $1";

// endregion: --- Queries

// region:    --- Claim Resolution

/// 인덱스 점유 판정 결과
#[derive(Debug, PartialEq, Eq)]
pub enum CodeClaim {
    /// 미점유 코드 - 새 인덱스 행 삽입
    Insert,
    /// 본인이 이미 점유한 코드 - 시각만 갱신
    Refresh,
}

/// 후보 코드의 기존 점유자를 보고 점유 방식을 판정한다.
/// 다른 경매가 점유한 코드는 충돌이다.
pub fn resolve_code_claim(
    claimed_by: Option<&str>,
    auction_id: &str,
) -> Result<CodeClaim, ApiError> {
    match claimed_by {
        Some(other) if other != auction_id => Err(ApiError::AuctionCodeConflict),
        Some(_) => Ok(CodeClaim::Refresh),
        None => Ok(CodeClaim::Insert),
    }
}

// endregion: --- Claim Resolution

// region:    --- Code Change

// 경합으로 중단된 트랜잭션의 최대 재시도 횟수
const MAX_RETRIES: i32 = 100;

/// 경매 참가 코드 변경
/// 후보 코드가 다른 경매에 배정되어 있으면 아무것도 변경하지 않고 충돌을
/// 반환한다. 두 코드가 동시에 같은 경매를 가리키는 상태는 관측될 수 없다.
pub async fn change_auction_code(
    db: &DatabaseManager,
    auction_id: &str,
    new_code: &str,
) -> Result<Option<Auction>, ApiError> {
    let new_code = new_code.trim();
    if new_code.is_empty() {
        return Err(ApiError::Validation(
            "auction_code 필드는 비어 있을 수 없습니다.".to_string(),
        ));
    }
    info!(
        "{:<12} --> 코드 변경: auction={}, code={}",
        "CodeIndex", auction_id, new_code
    );

    let mut retries = 0;
    loop {
        let auction_id = auction_id.to_string();
        let code = new_code.to_string();
        let result: Result<Option<Auction>, ApiError> = db
            .transaction(move |tx| {
                Box::pin(async move {
                    let existing = sqlx::query_as::<_, Auction>(SELECT_AUCTION_FOR_UPDATE)
                        .bind(&auction_id)
                        .fetch_optional(&mut **tx)
                        .await?;
                    let Some(existing) = existing else {
                        return Ok(None);
                    };

                    let claimed_by: Option<String> =
                        sqlx::query_scalar(SELECT_CODE_CLAIM_FOR_UPDATE)
                            .bind(&code)
                            .fetch_optional(&mut **tx)
                            .await?;
                    let claim = resolve_code_claim(claimed_by.as_deref(), &auction_id)?;

                    let now = Utc::now();
                    let updated = sqlx::query_as::<_, Auction>(UPDATE_AUCTION_CODE)
                        .bind(&auction_id)
                        .bind(&code)
                        .bind(now)
                        .fetch_one(&mut **tx)
                        .await?;
                    match claim {
                        CodeClaim::Insert => {
                            // 동시 선점자는 여기서 유일 제약 위반으로 탈락한다
                            sqlx::query(INSERT_CODE_INDEX)
                                .bind(&code)
                                .bind(&auction_id)
                                .bind(now)
                                .execute(&mut **tx)
                                .await?;
                        }
                        CodeClaim::Refresh => {
                            sqlx::query(REFRESH_CODE_INDEX)
                                .bind(&code)
                                .bind(now)
                                .execute(&mut **tx)
                                .await?;
                        }
                    }
                    if existing.auction_code != code {
                        sqlx::query(DELETE_CODE_INDEX)
                            .bind(&existing.auction_code)
                            .execute(&mut **tx)
                            .await?;
                    }

                    Ok(Some(updated))
                })
            })
            .await;

        match result {
            Err(ApiError::Database(e)) if is_unique_violation(&e) => {
                // 같은 코드를 먼저 점유한 트랜잭션이 커밋됨
                return Err(ApiError::AuctionCodeConflict);
            }
            Err(ApiError::Database(e)) if is_serialization_conflict(&e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    return Err(ApiError::MaxRetriesExceeded);
                }
                warn!(
                    "{:<12} --> 경합으로 인한 재시도: {}/{}",
                    "CodeIndex", retries, MAX_RETRIES
                );
            }
            other => return other,
        }
    }
}

// endregion: --- Code Change

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unclaimed_code_is_inserted() {
        assert_eq!(resolve_code_claim(None, "a1").unwrap(), CodeClaim::Insert);
    }

    #[test]
    fn test_own_claim_is_refreshed() {
        assert_eq!(
            resolve_code_claim(Some("a1"), "a1").unwrap(),
            CodeClaim::Refresh
        );
    }

    #[test]
    fn test_foreign_claim_is_a_conflict() {
        assert!(matches!(
            resolve_code_claim(Some("a2"), "a1"),
            Err(ApiError::AuctionCodeConflict)
        ));
    }
}

// endregion: --- Tests

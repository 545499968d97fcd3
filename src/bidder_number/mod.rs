/// 입찰 번호 할당기
/// 경매별로 유일하고 단조 증가하는 입찰 번호를 배정한다. 요청은 공유 메모리가
/// 없는 독립 실행이므로 카운터는 인메모리가 아니라 저장 계층의 원자적
/// read-modify-write 트랜잭션 안에서만 변경되는 작은 레코드다.
// region:    --- Imports
use crate::database::{is_serialization_conflict, is_unique_violation, DatabaseManager};
use crate::error::ApiError;
use chrono::Utc;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Allocator

// 경합으로 중단된 트랜잭션의 최대 재시도 횟수
const MAX_RETRIES: i32 = 100;

const SELECT_COUNTER_FOR_UPDATE: &str =
    "SELECT next_number FROM bidder_number_counters WHERE auction_id = $1 FOR UPDATE";

const UPDATE_COUNTER: &str =
    "UPDATE bidder_number_counters SET next_number = $2, updated_at = $3 WHERE auction_id = $1";

const INSERT_COUNTER: &str = r#"
    INSERT INTO bidder_number_counters (auction_id, next_number, updated_at)
    VALUES ($1, $2, $3)
"#;

/// 다음 입찰 번호 배정
/// 카운터 읽기(없으면 1), 현재 값 반환, next+1 기록이 하나의 트랜잭션으로
/// 실행된다. 경합으로 중단되면 전체 연산을 재시도한다.
pub async fn allocate_bidder_number(
    db: &DatabaseManager,
    auction_id: &str,
) -> Result<i64, ApiError> {
    let mut retries = 0;
    loop {
        let auction_id_owned = auction_id.to_string();
        let result: Result<i64, sqlx::Error> = db
            .transaction(move |tx| {
                Box::pin(async move {
                    let now = Utc::now();
                    let existing: Option<i64> = sqlx::query_scalar(SELECT_COUNTER_FOR_UPDATE)
                        .bind(&auction_id_owned)
                        .fetch_optional(&mut **tx)
                        .await?;

                    match existing {
                        Some(next) => {
                            sqlx::query(UPDATE_COUNTER)
                                .bind(&auction_id_owned)
                                .bind(next + 1)
                                .bind(now)
                                .execute(&mut **tx)
                                .await?;
                            Ok(next)
                        }
                        None => {
                            sqlx::query(INSERT_COUNTER)
                                .bind(&auction_id_owned)
                                .bind(2_i64)
                                .bind(now)
                                .execute(&mut **tx)
                                .await?;
                            Ok(1)
                        }
                    }
                })
            })
            .await;

        match result {
            Ok(number) => {
                info!(
                    "{:<12} --> 입찰 번호 배정: auction={}, number={}",
                    "Allocator", auction_id, number
                );
                return Ok(number);
            }
            Err(e) if is_serialization_conflict(&e) || is_unique_violation(&e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    return Err(ApiError::MaxRetriesExceeded);
                }
                warn!(
                    "{:<12} --> 경합으로 인한 재시도: {}/{}",
                    "Allocator", retries, MAX_RETRIES
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// endregion: --- Allocator

/// 입찰 허용 엔진
/// 경로는 선조건 검사, 내구 저장, 저장 후 재확인의 세 구간으로 나뉜다.
/// 선조건 검사와 저장 사이에는 원자성이 없으므로 저장 뒤 전체 입찰을 다시
/// 읽어 표준 순서로 재판정한다. 저장된 입찰은 판정과 무관하게 이력에 남는다.
// region:    --- Imports
use super::model::{Bid, LiveWinner};
use super::view;
use crate::audit::{AuditEntry, AuditLogWriter};
use crate::auction::phase::AuctionStatus;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::membership::Membership;
use crate::notification::{NewNotification, NotificationEnqueuer};
use crate::query;
use crate::totals::{self, Totals};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Admission Rules

/// 저장 전 선조건 판정 (순수)
/// 단계가 Open 이고, 금액이 음수가 아니며, 현재 최고 입찰가보다 엄격히 커야
/// 한다. 첫 입찰은 음수가 아니면 금액 제한이 없다. 통과 시 교체될 직전 최고
/// 입찰을 돌려준다.
pub fn admit_bid(status: &str, bids: &[Bid], amount: i64) -> Result<Option<Bid>, ApiError> {
    if AuctionStatus::parse(status) != Some(AuctionStatus::Open) {
        return Err(ApiError::PhaseClosed);
    }
    if amount < 0 {
        return Err(ApiError::Validation(
            "입찰 금액은 음수일 수 없습니다.".to_string(),
        ));
    }
    let previous_high = view::current_high_bid(bids).cloned();
    if let Some(high) = &previous_high {
        if amount <= high.amount {
            return Err(ApiError::BidTooLow {
                current_amount: high.amount,
            });
        }
    }
    Ok(previous_high)
}

/// 저장 후 재판정 (순수)
/// 저장된 입찰이 표준 순서의 승자가 아니면 outbid 다.
pub fn confirm_high_bid(bids: &[Bid], bid_id: &str) -> Result<(), ApiError> {
    match view::current_high_bid(bids) {
        Some(winner) if winner.id == bid_id => Ok(()),
        _ => Err(ApiError::Outbid),
    }
}

// endregion: --- Admission Rules

// region:    --- Place Bid

/// 입찰 요청
#[derive(Debug, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: String,
    pub item_id: String,
    pub bidder_id: String,
    pub amount: i64,
}

/// 입찰 성공 결과
#[derive(Debug, Serialize, Clone)]
pub struct PlaceBidOutcome {
    pub bid: Bid,
    pub previous_high: Option<Bid>,
    pub totals: Totals,
}

const INSERT_BID: &str = r#"
    INSERT INTO bids (id, auction_id, item_id, bidder_id, amount, placed_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id, auction_id, item_id, bidder_id, amount, placed_at
"#;

/// 입찰 처리
/// 오류 우선순위: 대상 없음 > 권한 > 단계 > 금액. 저장 후 재확인에서 밀리면
/// outbid 를 반환하지만 저장된 입찰은 남는다.
pub async fn handle_place_bid(
    db: &DatabaseManager,
    audit: &dyn AuditLogWriter,
    notifier: &dyn NotificationEnqueuer,
    membership: &Membership,
    command: PlaceBidCommand,
) -> Result<PlaceBidOutcome, ApiError> {
    info!(
        "{:<12} --> 입찰 요청: item={}, bidder={}, amount={}",
        "Bidding", command.item_id, command.bidder_id, command.amount
    );

    let auction = query::handlers::get_auction(db, &command.auction_id)
        .await?
        .ok_or_else(|| ApiError::not_found("auction_not_found", "경매를 찾을 수 없습니다."))?;

    let item = query::handlers::get_item(db, &command.item_id)
        .await?
        .filter(|item| item.auction_id == command.auction_id)
        .ok_or_else(|| ApiError::not_found("item_not_found", "상품을 찾을 수 없습니다."))?;

    // 선조건용 최고 입찰 판독 (저장 전 스냅샷)
    let before = query::handlers::list_bids_for_item(db, &command.item_id).await?;
    let previous_high = admit_bid(&auction.status, &before, command.amount)?;

    // 내구 저장
    let bid = sqlx::query_as::<_, Bid>(INSERT_BID)
        .bind(Uuid::new_v4().to_string())
        .bind(&command.auction_id)
        .bind(&command.item_id)
        .bind(&command.bidder_id)
        .bind(command.amount)
        .bind(Utc::now())
        .fetch_one(db.pool())
        .await?;

    // 저장 후 재확인 - 동시 입찰이 끼어들었으면 표준 순서가 판정한다
    let after = query::handlers::list_bids_for_item(db, &command.item_id).await?;
    if let Err(e) = confirm_high_bid(&after, &bid.id) {
        warn!(
            "{:<12} --> 저장 후 재확인에서 밀림: bid={}",
            "Bidding", bid.id
        );
        return Err(e);
    }

    let totals = totals::apply_accepted_bid(db, membership, &bid, previous_high.as_ref()).await?;

    audit
        .record(AuditEntry {
            auction_id: bid.auction_id.clone(),
            actor_user_id: bid.bidder_id.clone(),
            action: "bid_placed".to_string(),
            target_type: "bid".to_string(),
            target_id: bid.id.clone(),
            metadata: json!({ "item_id": bid.item_id, "amount": bid.amount }),
        })
        .await?;

    // 교체된 입찰자에게 outbid 알림 (본인 교체 제외, 경매 설정에 따름)
    if auction.in_app_notifications {
        if let Some(previous) = &previous_high {
            if previous.bidder_id != bid.bidder_id {
                notifier
                    .enqueue(NewNotification {
                        auction_id: bid.auction_id.clone(),
                        user_id: previous.bidder_id.clone(),
                        kind: "outbid".to_string(),
                        message: format!("'{}' 상품에서 더 높은 입찰이 들어왔습니다.", item.title),
                        ref_type: "item".to_string(),
                        ref_id: item.id.clone(),
                    })
                    .await?;
            }
        }
    }

    Ok(PlaceBidOutcome {
        bid,
        previous_high,
        totals,
    })
}

// endregion: --- Place Bid

// region:    --- Delete Bid

const DELETE_BID: &str = "DELETE FROM bids WHERE id = $1";

/// 입찰 삭제 (관리자)
/// 삭제 후 합계를 전체 재계산으로 복구하고 감사 기록을 남긴다.
pub async fn delete_bid(
    db: &DatabaseManager,
    audit: &dyn AuditLogWriter,
    actor_user_id: &str,
    auction_id: &str,
    bid_id: &str,
) -> Result<Bid, ApiError> {
    let bid = query::handlers::get_bid(db, bid_id)
        .await?
        .filter(|bid| bid.auction_id == auction_id)
        .ok_or_else(|| ApiError::not_found("bid_not_found", "입찰을 찾을 수 없습니다."))?;

    info!(
        "{:<12} --> 입찰 삭제: bid={}, actor={}",
        "Bidding", bid_id, actor_user_id
    );
    sqlx::query(DELETE_BID)
        .bind(bid_id)
        .execute(db.pool())
        .await?;

    let remaining = query::handlers::list_bids_for_auction(db, auction_id).await?;
    let winners = query::handlers::list_live_winners_for_auction(db, auction_id).await?;
    totals::reconcile_totals(db, auction_id, &remaining, &winners).await?;

    audit
        .record(AuditEntry {
            auction_id: auction_id.to_string(),
            actor_user_id: actor_user_id.to_string(),
            action: "bid_deleted".to_string(),
            target_type: "bid".to_string(),
            target_id: bid.id.clone(),
            metadata: json!({
                "item_id": bid.item_id,
                "bidder_id": bid.bidder_id,
                "amount": bid.amount,
            }),
        })
        .await?;

    Ok(bid)
}

// endregion: --- Delete Bid

// region:    --- Live Winner

/// 라이브 낙찰 배정 가능 여부 (순수)
/// 경매가 Pending 단계 이상이어야 하고 최종가는 음수일 수 없다.
pub fn check_live_assignment(status: &str, final_price: i64) -> Result<(), ApiError> {
    let rank = AuctionStatus::parse(status)
        .map(AuctionStatus::rank)
        .unwrap_or_default();
    if rank < AuctionStatus::Pending.rank() {
        return Err(ApiError::PhaseClosed);
    }
    if final_price < 0 {
        return Err(ApiError::Validation(
            "최종가는 음수일 수 없습니다.".to_string(),
        ));
    }
    Ok(())
}

const SELECT_LIVE_WINNER_FOR_UPDATE: &str = r#"
    SELECT item_id, auction_id, bidder_id, final_price, assigned_at
    FROM live_winners
    WHERE item_id = $1
    FOR UPDATE
"#;

const UPSERT_LIVE_WINNER: &str = r#"
    INSERT INTO live_winners (item_id, auction_id, bidder_id, final_price, assigned_at)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (item_id)
    DO UPDATE SET bidder_id = EXCLUDED.bidder_id,
                  final_price = EXCLUDED.final_price,
                  assigned_at = EXCLUDED.assigned_at
"#;

/// 라이브 낙찰 배정 (관리자)
/// 낙찰 기록과 합계 반영이 한 트랜잭션으로 처리된다. 재배정 시 이전
/// 낙찰자의 합계에서 이전 최종가를 빼므로 전체 재계산과 결과가 같다.
pub async fn assign_live_winner(
    db: &DatabaseManager,
    audit: &dyn AuditLogWriter,
    actor_user_id: &str,
    item_id: &str,
    bidder_id: &str,
    final_price: i64,
) -> Result<LiveWinner, ApiError> {
    let item = query::handlers::get_item(db, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("item_not_found", "상품을 찾을 수 없습니다."))?;
    let auction = query::handlers::get_auction(db, &item.auction_id)
        .await?
        .ok_or_else(|| ApiError::not_found("auction_not_found", "경매를 찾을 수 없습니다."))?;
    check_live_assignment(&auction.status, final_price)?;

    info!(
        "{:<12} --> 라이브 낙찰 배정: item={}, bidder={}, price={}",
        "LiveWinner", item_id, bidder_id, final_price
    );

    let winner = LiveWinner {
        item_id: item.id.clone(),
        auction_id: item.auction_id.clone(),
        bidder_id: bidder_id.to_string(),
        final_price,
        assigned_at: Utc::now(),
    };
    let record = winner.clone();
    let result: Result<LiveWinner, sqlx::Error> = db
        .transaction(move |tx| {
            Box::pin(async move {
                let previous: Option<LiveWinner> =
                    sqlx::query_as::<_, LiveWinner>(SELECT_LIVE_WINNER_FOR_UPDATE)
                        .bind(&record.item_id)
                        .fetch_optional(&mut **tx)
                        .await?;

                // 이전 낙찰자의 합계에서 이전 최종가를 뺀다 (본인 재배정 포함)
                if let Some(previous) = &previous {
                    let prior: Option<Totals> =
                        sqlx::query_as::<_, Totals>(totals::SELECT_TOTALS_FOR_UPDATE)
                            .bind(&previous.auction_id)
                            .bind(&previous.bidder_id)
                            .fetch_optional(&mut **tx)
                            .await?;
                    if let Some(prior) = prior {
                        sqlx::query(totals::UPSERT_TOTALS)
                            .bind(&prior.auction_id)
                            .bind(&prior.bidder_id)
                            .bind(prior.bidder_number)
                            .bind(&prior.display_name)
                            .bind(prior.subtotal - previous.final_price)
                            .bind(prior.total - previous.final_price)
                            .bind(prior.paid)
                            .bind(record.assigned_at)
                            .execute(&mut **tx)
                            .await?;
                    }
                }

                sqlx::query(UPSERT_LIVE_WINNER)
                    .bind(&record.item_id)
                    .bind(&record.auction_id)
                    .bind(&record.bidder_id)
                    .bind(record.final_price)
                    .bind(record.assigned_at)
                    .execute(&mut **tx)
                    .await?;

                let existing: Option<Totals> =
                    sqlx::query_as::<_, Totals>(totals::SELECT_TOTALS_FOR_UPDATE)
                        .bind(&record.auction_id)
                        .bind(&record.bidder_id)
                        .fetch_optional(&mut **tx)
                        .await?;
                let (subtotal, total, paid, bidder_number, display_name) = match &existing {
                    Some(t) => (
                        t.subtotal,
                        t.total,
                        t.paid,
                        t.bidder_number,
                        t.display_name.clone(),
                    ),
                    None => (0, 0, false, 0, record.bidder_id.clone()),
                };
                sqlx::query(totals::UPSERT_TOTALS)
                    .bind(&record.auction_id)
                    .bind(&record.bidder_id)
                    .bind(bidder_number)
                    .bind(&display_name)
                    .bind(subtotal + record.final_price)
                    .bind(total + record.final_price)
                    .bind(paid)
                    .bind(record.assigned_at)
                    .execute(&mut **tx)
                    .await?;

                Ok(record)
            })
        })
        .await;
    let winner = result?;

    audit
        .record(AuditEntry {
            auction_id: winner.auction_id.clone(),
            actor_user_id: actor_user_id.to_string(),
            action: "live_winner_assigned".to_string(),
            target_type: "item".to_string(),
            target_id: winner.item_id.clone(),
            metadata: json!({
                "bidder_id": winner.bidder_id,
                "final_price": winner.final_price,
            }),
        })
        .await?;

    Ok(winner)
}

// endregion: --- Live Winner

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bid(id: &str, bidder: &str, amount: i64, secs: i64) -> Bid {
        Bid {
            id: id.to_string(),
            auction_id: "a1".to_string(),
            item_id: "i1".to_string(),
            bidder_id: bidder.to_string(),
            amount,
            placed_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_bid_rejected_outside_open_phase() {
        for status in ["Setup", "Ready", "Pending", "Complete", "Closed"] {
            assert!(matches!(
                admit_bid(status, &[], 100),
                Err(ApiError::PhaseClosed)
            ));
        }
    }

    #[test]
    fn test_negative_amount_is_invalid() {
        assert!(matches!(
            admit_bid("Open", &[], -1),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_first_bid_of_zero_is_admissible() {
        // 입찰이 없는 상품의 첫 입찰은 0 도 허용된다
        assert!(matches!(admit_bid("Open", &[], 0), Ok(None)));
    }

    #[test]
    fn test_equal_amount_is_too_low() {
        let bids = vec![bid("b1", "u1", 100, 0)];
        match admit_bid("Open", &bids, 100) {
            Err(ApiError::BidTooLow { current_amount }) => assert_eq!(current_amount, 100),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_higher_amount_returns_displaced_high() {
        let bids = vec![bid("b1", "u1", 100, 0), bid("b2", "u2", 150, 1)];
        let previous = admit_bid("Open", &bids, 200).unwrap();
        assert_eq!(previous.map(|b| b.id), Some("b2".to_string()));
    }

    #[test]
    fn test_recheck_detects_interleaved_higher_bid() {
        // 저장 사이에 더 높은 입찰이 끼어든 경우 저장된 입찰은 outbid 다
        let after = vec![bid("mine", "u1", 200, 5), bid("race", "u2", 300, 4)];
        assert!(matches!(
            confirm_high_bid(&after, "mine"),
            Err(ApiError::Outbid)
        ));
        assert!(confirm_high_bid(&after, "race").is_ok());
    }

    #[test]
    fn test_live_assignment_requires_pending_or_later() {
        for status in ["Setup", "Ready", "Open"] {
            assert!(matches!(
                check_live_assignment(status, 100),
                Err(ApiError::PhaseClosed)
            ));
        }
        for status in ["Pending", "Complete", "Closed"] {
            assert!(check_live_assignment(status, 100).is_ok());
        }
        assert!(matches!(
            check_live_assignment("Pending", -5),
            Err(ApiError::Validation(_))
        ));
    }
}

// endregion: --- Tests

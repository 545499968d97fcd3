/// 합계 파생
/// 입찰자별 누적 금액은 파생 상태다. 같은 입찰 이력이 주어지면 증분 갱신과
/// 전체 재계산이 동일한 결과를 내야 하며, 재계산이 정본 정의다.
// region:    --- Imports
use crate::bidding::model::{Bid, LiveWinner};
use crate::bidding::view::compare_bids;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::membership::Membership;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

// endregion: --- Imports

// region:    --- Model

// 합계 모델 (경매, 입찰자 쌍마다 하나)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Totals {
    pub auction_id: String,
    pub bidder_id: String,
    pub bidder_number: i64,
    pub display_name: String,
    pub subtotal: i64,
    pub total: i64,
    pub paid: bool,
    pub updated_at: DateTime<Utc>,
}

/// 재계산 결과 행
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct ComputedTotals {
    pub bidder_id: String,
    pub subtotal: i64,
    pub total: i64,
}

// endregion: --- Model

// region:    --- Reconciliation

/// 전체 재계산 (정본)
/// 상품별로 표준 순서의 승자를 뽑아 입찰자별 낙찰 금액을 합산한다.
/// 라이브 낙찰 기록이 있는 상품은 입찰 이력 대신 최종가가 집계된다.
/// 결과는 입찰자 id 오름차순으로 정렬된다.
pub fn compute_totals(bids: &[Bid], winners: &[LiveWinner]) -> Vec<ComputedTotals> {
    let assigned_items: HashSet<&str> = winners.iter().map(|w| w.item_id.as_str()).collect();

    let mut high_by_item: HashMap<&str, &Bid> = HashMap::new();
    for bid in bids {
        if assigned_items.contains(bid.item_id.as_str()) {
            continue;
        }
        high_by_item
            .entry(bid.item_id.as_str())
            .and_modify(|current| {
                if compare_bids(bid, current) == Ordering::Less {
                    *current = bid;
                }
            })
            .or_insert(bid);
    }

    let mut by_bidder: BTreeMap<&str, i64> = BTreeMap::new();
    for winning in high_by_item.values() {
        *by_bidder.entry(winning.bidder_id.as_str()).or_insert(0) += winning.amount;
    }
    for winner in winners {
        *by_bidder.entry(winner.bidder_id.as_str()).or_insert(0) += winner.final_price;
    }

    by_bidder
        .into_iter()
        .map(|(bidder_id, subtotal)| ComputedTotals {
            bidder_id: bidder_id.to_string(),
            subtotal,
            total: subtotal,
        })
        .collect()
}

/// 입찰 이력만으로 재계산 (라이브 낙찰이 없는 경로)
pub fn compute_totals_from_bids(bids: &[Bid]) -> Vec<ComputedTotals> {
    compute_totals(bids, &[])
}

// endregion: --- Reconciliation

// region:    --- Persistence

pub(crate) const UPSERT_TOTALS: &str = r#"
    INSERT INTO totals (auction_id, bidder_id, bidder_number, display_name,
                        subtotal, total, paid, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (auction_id, bidder_id)
    DO UPDATE SET bidder_number = EXCLUDED.bidder_number,
                  display_name = EXCLUDED.display_name,
                  subtotal = EXCLUDED.subtotal,
                  total = EXCLUDED.total,
                  paid = EXCLUDED.paid,
                  updated_at = EXCLUDED.updated_at
"#;

pub(crate) const SELECT_TOTALS_FOR_UPDATE: &str = r#"
    SELECT auction_id, bidder_id, bidder_number, display_name, subtotal, total, paid, updated_at
    FROM totals
    WHERE auction_id = $1 AND bidder_id = $2
    FOR UPDATE
"#;

const ZERO_TOTALS_FOR_AUCTION: &str =
    "UPDATE totals SET subtotal = 0, total = 0, updated_at = $2 WHERE auction_id = $1";

const RECONCILE_UPSERT_TOTALS: &str = r#"
    INSERT INTO totals (auction_id, bidder_id, bidder_number, display_name,
                        subtotal, total, paid, updated_at)
    VALUES ($1, $2, 0, $2, $3, $4, FALSE, $5)
    ON CONFLICT (auction_id, bidder_id)
    DO UPDATE SET subtotal = EXCLUDED.subtotal,
                  total = EXCLUDED.total,
                  updated_at = EXCLUDED.updated_at
"#;

/// 증분 갱신 (입찰 허용 성공 경로 전용)
/// 허용된 입찰은 항상 해당 상품의 새 최고 입찰이므로, 교체된 직전 최고
/// 입찰의 금액을 그 소유자 행에서 빼고(자기 자신을 앞지른 경우 포함) 새 금액을
/// 더하면 재계산과 같은 결과가 유지된다. paid 플래그는 보존한다.
pub async fn apply_accepted_bid(
    db: &DatabaseManager,
    membership: &Membership,
    bid: &Bid,
    displaced: Option<&Bid>,
) -> Result<Totals, ApiError> {
    info!(
        "{:<12} --> 합계 증분 갱신: auction={}, bidder={}, amount={}",
        "Totals", bid.auction_id, bid.bidder_id, bid.amount
    );

    let bidder_number = membership.bidder_number.unwrap_or(0);
    let bid = bid.clone();
    let displaced = displaced.cloned();
    let result: Result<Totals, sqlx::Error> = db
        .transaction(move |tx| {
            Box::pin(async move {
                let now = Utc::now();

                // 다른 입찰자를 교체한 경우 그쪽 행에서 낙찰 금액을 뺀다
                let mut own_adjustment = 0_i64;
                if let Some(displaced) = &displaced {
                    if displaced.bidder_id == bid.bidder_id {
                        own_adjustment = displaced.amount;
                    } else {
                        let other: Option<Totals> =
                            sqlx::query_as::<_, Totals>(SELECT_TOTALS_FOR_UPDATE)
                                .bind(&bid.auction_id)
                                .bind(&displaced.bidder_id)
                                .fetch_optional(&mut **tx)
                                .await?;
                        if let Some(other) = other {
                            sqlx::query(UPSERT_TOTALS)
                                .bind(&other.auction_id)
                                .bind(&other.bidder_id)
                                .bind(other.bidder_number)
                                .bind(&other.display_name)
                                .bind(other.subtotal - displaced.amount)
                                .bind(other.total - displaced.amount)
                                .bind(other.paid)
                                .bind(now)
                                .execute(&mut **tx)
                                .await?;
                        }
                    }
                }

                let existing: Option<Totals> =
                    sqlx::query_as::<_, Totals>(SELECT_TOTALS_FOR_UPDATE)
                        .bind(&bid.auction_id)
                        .bind(&bid.bidder_id)
                        .fetch_optional(&mut **tx)
                        .await?;
                let (subtotal, total, paid, display_name) = match &existing {
                    Some(t) => (t.subtotal, t.total, t.paid, t.display_name.clone()),
                    None => (0, 0, false, bid.bidder_id.clone()),
                };

                let record = Totals {
                    auction_id: bid.auction_id.clone(),
                    bidder_id: bid.bidder_id.clone(),
                    bidder_number,
                    display_name,
                    subtotal: subtotal - own_adjustment + bid.amount,
                    total: total - own_adjustment + bid.amount,
                    paid,
                    updated_at: now,
                };
                sqlx::query(UPSERT_TOTALS)
                    .bind(&record.auction_id)
                    .bind(&record.bidder_id)
                    .bind(record.bidder_number)
                    .bind(&record.display_name)
                    .bind(record.subtotal)
                    .bind(record.total)
                    .bind(record.paid)
                    .bind(record.updated_at)
                    .execute(&mut **tx)
                    .await?;
                Ok(record)
            })
        })
        .await;
    Ok(result?)
}

/// 전체 재계산 결과를 저장 (감사/백필용)
/// 기존 행을 0 으로 되돌린 뒤 계산된 행을 덮어쓴다. paid 와 입찰 번호,
/// 표시 이름은 기존 값을 유지한다.
pub async fn reconcile_totals(
    db: &DatabaseManager,
    auction_id: &str,
    bids: &[Bid],
    winners: &[LiveWinner],
) -> Result<Vec<ComputedTotals>, ApiError> {
    info!(
        "{:<12} --> 합계 재계산: auction={}, bids={}, winners={}",
        "Totals",
        auction_id,
        bids.len(),
        winners.len()
    );
    let computed = compute_totals(bids, winners);

    let auction_id = auction_id.to_string();
    let rows = computed.clone();
    db.transaction(move |tx| {
        Box::pin(async move {
            let now = Utc::now();
            sqlx::query(ZERO_TOTALS_FOR_AUCTION)
                .bind(&auction_id)
                .bind(now)
                .execute(&mut **tx)
                .await?;
            for row in &rows {
                sqlx::query(RECONCILE_UPSERT_TOTALS)
                    .bind(&auction_id)
                    .bind(&row.bidder_id)
                    .bind(row.subtotal)
                    .bind(row.total)
                    .bind(now)
                    .execute(&mut **tx)
                    .await?;
            }
            Ok(())
        })
    })
    .await
    .map_err(ApiError::Database)?;

    Ok(computed)
}

const UPDATE_TOTALS_PAID: &str = r#"
    UPDATE totals
    SET paid = $3, updated_at = $4
    WHERE auction_id = $1 AND bidder_id = $2
    RETURNING auction_id, bidder_id, bidder_number, display_name, subtotal, total, paid, updated_at
"#;

/// 결제 완료 표시 (관리자)
/// 합계 행이 없으면 None - 호출자가 totals_not_found 로 변환한다.
pub async fn set_totals_paid(
    db: &DatabaseManager,
    auction_id: &str,
    bidder_id: &str,
    paid: bool,
) -> Result<Option<Totals>, ApiError> {
    info!(
        "{:<12} --> 결제 표시: auction={}, bidder={}, paid={}",
        "Totals", auction_id, bidder_id, paid
    );
    let updated = sqlx::query_as::<_, Totals>(UPDATE_TOTALS_PAID)
        .bind(auction_id)
        .bind(bidder_id)
        .bind(paid)
        .bind(Utc::now())
        .fetch_optional(db.pool())
        .await?;
    Ok(updated)
}

// endregion: --- Persistence

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bid(id: &str, item: &str, bidder: &str, amount: i64, secs: i64) -> Bid {
        Bid {
            id: id.to_string(),
            auction_id: "a1".to_string(),
            item_id: item.to_string(),
            bidder_id: bidder.to_string(),
            amount,
            placed_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_bids_produce_no_totals() {
        assert!(compute_totals_from_bids(&[]).is_empty());
    }

    #[test]
    fn test_only_winning_bids_are_summed() {
        let bids = vec![
            bid("b1", "i1", "u1", 100, 0),
            bid("b2", "i1", "u2", 200, 1),
            bid("b3", "i2", "u1", 50, 2),
        ];
        let totals = compute_totals_from_bids(&bids);
        assert_eq!(
            totals,
            vec![
                ComputedTotals {
                    bidder_id: "u1".to_string(),
                    subtotal: 50,
                    total: 50,
                },
                ComputedTotals {
                    bidder_id: "u2".to_string(),
                    subtotal: 200,
                    total: 200,
                },
            ]
        );
    }

    #[test]
    fn test_superseding_own_bid_counts_once() {
        // 자기 입찰을 자기가 앞지른 경우 마지막 낙찰 금액만 집계된다
        let bids = vec![
            bid("b1", "i1", "u1", 100, 0),
            bid("b2", "i1", "u1", 300, 1),
        ];
        let totals = compute_totals_from_bids(&bids);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].subtotal, 300);
    }

    #[test]
    fn test_tie_break_matches_high_bid_view() {
        // 금액/시각 동률이면 id 사전순이 승자 - 뷰와 같은 규칙
        let bids = vec![
            bid("b1", "i1", "u1", 100, 0),
            bid("b0", "i1", "u2", 100, 0),
        ];
        let totals = compute_totals_from_bids(&bids);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].bidder_id, "u2");
    }

    #[test]
    fn test_live_winner_overrides_item_bids() {
        // 라이브 낙찰이 배정된 상품은 입찰 이력이 아니라 최종가로 집계된다
        let bids = vec![
            bid("b1", "i-live", "u1", 500, 0),
            bid("b2", "i-silent", "u2", 70, 1),
        ];
        let winners = vec![LiveWinner {
            item_id: "i-live".to_string(),
            auction_id: "a1".to_string(),
            bidder_id: "u3".to_string(),
            final_price: 800,
            assigned_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
        }];
        let totals = compute_totals(&bids, &winners);
        let get = |bidder: &str| totals.iter().find(|t| t.bidder_id == bidder).map(|t| t.total);
        assert_eq!(get("u1"), None);
        assert_eq!(get("u2"), Some(70));
        assert_eq!(get("u3"), Some(800));
    }

    #[test]
    fn test_output_sorted_by_bidder_id() {
        let bids = vec![
            bid("b1", "i1", "zed", 10, 0),
            bid("b2", "i2", "amy", 20, 0),
            bid("b3", "i3", "mia", 30, 0),
        ];
        let totals = compute_totals_from_bids(&bids);
        let ids: Vec<&str> = totals.iter().map(|t| t.bidder_id.as_str()).collect();
        assert_eq!(ids, vec!["amy", "mia", "zed"]);
    }
}

// endregion: --- Tests

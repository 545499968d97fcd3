/// 표준 순서, 합계 파생, 단계 계산, 역할 해석의 결정적 성질 테스트
// region:    --- Imports
use auction_platform::auction::phase::{resolve_target_status, AuctionStatus};
use auction_platform::bidding::commands::{admit_bid, confirm_high_bid};
use auction_platform::bidding::model::Bid;
use auction_platform::error::ApiError;
use auction_platform::bidding::view::{compare_bids, current_high_bid};
use auction_platform::membership::{resolve_effective_role, Role};
use auction_platform::totals::compute_totals_from_bids;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::cmp::Ordering;

// endregion: --- Imports

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

fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap()
        .with_timezone(&Utc)
}

// region:    --- High Bid View

#[test]
fn test_canonical_order_is_total() {
    // 서로 다른 id 를 가진 어떤 입찰 쌍도 동률이 되지 않는다
    let bids = vec![
        bid("b1", "i1", "u1", 100, 0),
        bid("b2", "i1", "u2", 100, 0),
        bid("b3", "i1", "u3", 100, 1),
        bid("b4", "i1", "u4", 200, 1),
    ];
    for left in &bids {
        for right in &bids {
            if left.id != right.id {
                assert_ne!(compare_bids(left, right), Ordering::Equal);
            }
        }
    }
}

#[test]
fn test_winner_is_independent_of_arrival_order() {
    let mut bids = vec![
        bid("b3", "i1", "u3", 300, 5),
        bid("b1", "i1", "u1", 500, 2),
        bid("b2", "i1", "u2", 500, 1),
    ];
    let expected = current_high_bid(&bids).unwrap().id.clone();
    bids.reverse();
    assert_eq!(current_high_bid(&bids).unwrap().id, expected);
    bids.swap(0, 2);
    assert_eq!(current_high_bid(&bids).unwrap().id, expected);
    assert_eq!(expected, "b2");
}

#[test]
fn test_concurrent_equal_bids_resolve_by_id() {
    // 같은 금액, 같은 시각이면 id 사전순으로 단 하나의 승자가 정해진다
    let bids = vec![
        bid("b-zz", "i1", "u1", 100, 0),
        bid("b-aa", "i1", "u2", 100, 0),
    ];
    assert_eq!(current_high_bid(&bids).unwrap().id, "b-aa");
}

// endregion: --- High Bid View

// region:    --- Bid Admission

#[test]
fn test_admission_chain_rejections() {
    let history = vec![bid("b1", "i1", "u1", 100, 0)];

    // 단계가 Open 이 아니면 금액과 무관하게 phase_closed
    assert!(matches!(
        admit_bid("Pending", &history, 999),
        Err(ApiError::PhaseClosed)
    ));
    // 같은 금액은 bid_too_low - 현재 최고가가 details 로 전달된다
    assert!(matches!(
        admit_bid("Open", &history, 100),
        Err(ApiError::BidTooLow { current_amount: 100 })
    ));
    // 통과하면 교체될 직전 최고 입찰을 돌려준다
    let previous = admit_bid("Open", &history, 150).unwrap();
    assert_eq!(previous.map(|b| b.id), Some("b1".to_string()));
}

#[test]
fn test_write_then_recheck_outbid() {
    // 저장과 재판독 사이에 더 높은 입찰이 커밋된 시나리오
    let after = vec![
        bid("mine", "i1", "u1", 200, 10),
        bid("race", "i1", "u2", 250, 9),
    ];
    assert!(matches!(
        confirm_high_bid(&after, "mine"),
        Err(ApiError::Outbid)
    ));
    assert!(confirm_high_bid(&after, "race").is_ok());
}

// endregion: --- Bid Admission

// region:    --- Totals Derivation

#[test]
fn test_totals_agree_with_high_bid_view_per_item() {
    let bids = vec![
        bid("b1", "i1", "u1", 100, 0),
        bid("b2", "i1", "u2", 250, 1),
        bid("b3", "i2", "u2", 80, 2),
        bid("b4", "i2", "u1", 120, 3),
        bid("b5", "i3", "u3", 40, 4),
    ];
    let totals = compute_totals_from_bids(&bids);

    // 상품별 승자: i1 -> u2(250), i2 -> u1(120), i3 -> u3(40)
    let get = |bidder: &str| {
        totals
            .iter()
            .find(|t| t.bidder_id == bidder)
            .map(|t| t.total)
    };
    assert_eq!(get("u1"), Some(120));
    assert_eq!(get("u2"), Some(250));
    assert_eq!(get("u3"), Some(40));
}

#[test]
fn test_losing_bidders_have_no_totals_row() {
    let bids = vec![
        bid("b1", "i1", "loser", 100, 0),
        bid("b2", "i1", "winner", 200, 1),
    ];
    let totals = compute_totals_from_bids(&bids);
    assert!(totals.iter().all(|t| t.bidder_id != "loser"));
}

// endregion: --- Totals Derivation

// region:    --- Phase Transition

#[test]
fn test_missed_ticks_jump_to_furthest_due_phase() {
    // 평가기가 오래 멈췄다 재개해도 중간 단계를 거치지 않고 한 번에 이동한다
    let schedule = json!({
        "ready_at": "2026-01-01T00:00:00Z",
        "open_at": "2026-01-02T00:00:00Z",
        "pending_at": "2026-01-03T00:00:00Z",
        "complete_at": "2026-01-04T00:00:00Z",
        "closed_at": "2026-01-05T00:00:00Z",
    });
    assert_eq!(
        resolve_target_status(Some(&schedule), at("2026-01-04T12:00:00Z")),
        Some(AuctionStatus::Complete)
    );
    assert_eq!(
        resolve_target_status(Some(&schedule), at("2026-02-01T00:00:00Z")),
        Some(AuctionStatus::Closed)
    );
}

#[test]
fn test_empty_or_missing_schedule_never_advances() {
    assert_eq!(resolve_target_status(None, Utc::now()), None);
    let empty = json!({});
    assert_eq!(resolve_target_status(Some(&empty), Utc::now()), None);
}

#[test]
fn test_phase_ranks_are_forward_only() {
    assert!(AuctionStatus::Setup.rank() < AuctionStatus::Ready.rank());
    assert!(AuctionStatus::Open.rank() < AuctionStatus::Pending.rank());
    assert!(AuctionStatus::Complete.rank() < AuctionStatus::Closed.rank());
}

// endregion: --- Phase Transition

// region:    --- Roles

#[test]
fn test_role_override_never_escalates() {
    for global in [Role::Bidder, Role::AdminL3, Role::AdminL2, Role::AdminL1] {
        for overridden in [Role::Bidder, Role::AdminL3, Role::AdminL2, Role::AdminL1] {
            let effective = resolve_effective_role(global, Some(overridden));
            if global != Role::AdminL1 {
                assert!(effective.rank() <= global.rank());
            } else {
                assert_eq!(effective, Role::AdminL1);
            }
        }
    }
}

// endregion: --- Roles

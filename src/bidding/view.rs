/// 최고 입찰 뷰
/// 상품의 전체 입찰 목록에서 현재 최고 입찰을 계산하는 순수 함수.
/// 캐시를 유지하지 않고 매번 재계산하므로 영속화된 상태와 항상 일치한다.
// region:    --- Imports
use crate::bidding::model::Bid;
use std::cmp::Ordering;

// endregion: --- Imports

// region:    --- High Bid View

/// 낙찰 판정에 쓰이는 표준 전체 순서
/// 금액 내림차순, 입찰 시각 오름차순(먼저 도착한 쪽 우선),
/// 입찰 id 오름차순(사전순). 승자가 필요한 모든 곳이 이 순서를 재사용한다.
pub fn compare_bids(left: &Bid, right: &Bid) -> Ordering {
    right
        .amount
        .cmp(&left.amount)
        .then_with(|| left.placed_at.cmp(&right.placed_at))
        .then_with(|| left.id.cmp(&right.id))
}

/// 현재 최고 입찰 조회
pub fn current_high_bid(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().min_by(|left, right| compare_bids(left, right))
}

// endregion: --- High Bid View

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

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
    fn test_empty_bid_list_has_no_high_bid() {
        assert_eq!(current_high_bid(&[]), None);
    }

    #[test]
    fn test_highest_amount_wins() {
        let bids = vec![bid("b1", "u1", 100, 0), bid("b2", "u2", 250, 1)];
        assert_eq!(current_high_bid(&bids).map(|b| b.id.as_str()), Some("b2"));
    }

    #[test]
    fn test_earlier_timestamp_breaks_amount_tie() {
        let bids = vec![bid("b2", "u2", 100, 5), bid("b1", "u1", 100, 1)];
        assert_eq!(current_high_bid(&bids).map(|b| b.id.as_str()), Some("b1"));
    }

    #[test]
    fn test_lower_id_breaks_full_tie() {
        // 금액과 시각이 모두 같으면 사전순으로 작은 id가 승자
        let bids = vec![bid("b1", "u1", 100, 0), bid("b0", "u2", 100, 0)];
        assert_eq!(current_high_bid(&bids).map(|b| b.id.as_str()), Some("b0"));
    }

    #[test]
    fn test_result_is_stable_under_input_reordering() {
        let mut bids = vec![
            bid("b3", "u3", 100, 2),
            bid("b1", "u1", 300, 9),
            bid("b2", "u2", 300, 4),
            bid("b4", "u4", 50, 0),
        ];
        let winner = current_high_bid(&bids).cloned();
        bids.reverse();
        assert_eq!(current_high_bid(&bids).cloned(), winner);
        bids.swap(0, 2);
        assert_eq!(current_high_bid(&bids).cloned(), winner);
        assert_eq!(winner.map(|b| b.id), Some("b2".to_string()));
    }
}

// endregion: --- Tests

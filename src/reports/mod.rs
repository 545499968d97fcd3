/// 요약 리포트
/// 판매 판정은 최고 입찰 뷰와 같은 표준 순서를 재사용한다. 라이브 낙찰이
/// 배정된 상품은 최종가로 집계된다.
// region:    --- Imports
use crate::bidding::model::{Bid, Item, LiveWinner};
use crate::bidding::view::current_high_bid;
use serde::Serialize;
use std::collections::HashMap;

// endregion: --- Imports

// region:    --- Summary

/// 경매 요약 리포트
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReportsSummary {
    pub bidder_count: usize,
    pub items_count: usize,
    pub items_sold_count: usize,
    pub gross_total: i64,
}

/// 요약 계산 (순수)
/// 상품별 낙찰 금액(라이브 낙찰 최종가 또는 표준 순서의 최고 입찰가)을
/// 합산한다. bidder_count 는 합계 행 수를 그대로 쓴다.
pub fn summarize_auction(
    items: &[Item],
    bids: &[Bid],
    winners: &[LiveWinner],
    bidder_count: usize,
) -> ReportsSummary {
    let winner_by_item: HashMap<&str, &LiveWinner> =
        winners.iter().map(|w| (w.item_id.as_str(), w)).collect();
    let mut bids_by_item: HashMap<&str, Vec<Bid>> = HashMap::new();
    for bid in bids {
        bids_by_item
            .entry(bid.item_id.as_str())
            .or_default()
            .push(bid.clone());
    }

    let mut items_sold_count = 0;
    let mut gross_total = 0;
    for item in items {
        if let Some(winner) = winner_by_item.get(item.id.as_str()) {
            items_sold_count += 1;
            gross_total += winner.final_price;
            continue;
        }
        let item_bids = bids_by_item.get(item.id.as_str());
        if let Some(high) = item_bids.and_then(|bids| current_high_bid(bids)) {
            items_sold_count += 1;
            gross_total += high.amount;
        }
    }

    ReportsSummary {
        bidder_count,
        items_count: items.len(),
        items_sold_count,
        gross_total,
    }
}

// endregion: --- Summary

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(id: &str, item_type: &str) -> Item {
        Item {
            id: id.to_string(),
            auction_id: "a1".to_string(),
            title: id.to_string(),
            item_type: item_type.to_string(),
            starting_price: 25,
            image_url: None,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn bid(id: &str, item: &str, bidder: &str, amount: i64) -> Bid {
        Bid {
            id: id.to_string(),
            auction_id: "a1".to_string(),
            item_id: item.to_string(),
            bidder_id: bidder.to_string(),
            amount,
            placed_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_summary_combines_silent_and_live_sales() {
        // 무입찰 상품은 판매에 포함되지 않는다
        let items = vec![item("i-silent", "silent"), item("i-live", "live")];
        let bids = vec![bid("b1", "i-silent", "u1", 100)];
        let winners = vec![LiveWinner {
            item_id: "i-live".to_string(),
            auction_id: "a1".to_string(),
            bidder_id: "u2".to_string(),
            final_price: 300,
            assigned_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
        }];
        let summary = summarize_auction(&items, &bids, &winners, 2);
        assert_eq!(
            summary,
            ReportsSummary {
                bidder_count: 2,
                items_count: 2,
                items_sold_count: 2,
                gross_total: 400,
            }
        );
    }

    #[test]
    fn test_unsold_items_contribute_nothing() {
        let items = vec![item("i1", "silent"), item("i2", "silent")];
        let summary = summarize_auction(&items, &[], &[], 0);
        assert_eq!(summary.items_count, 2);
        assert_eq!(summary.items_sold_count, 0);
        assert_eq!(summary.gross_total, 0);
    }

    #[test]
    fn test_summary_uses_canonical_winner_amount() {
        // 같은 상품의 여러 입찰 중 표준 순서의 승자 금액만 집계된다
        let items = vec![item("i1", "silent")];
        let bids = vec![
            bid("b1", "i1", "u1", 100),
            bid("b2", "i1", "u2", 250),
            bid("b3", "i1", "u3", 150),
        ];
        let summary = summarize_auction(&items, &bids, &[], 3);
        assert_eq!(summary.gross_total, 250);
    }
}

// endregion: --- Tests

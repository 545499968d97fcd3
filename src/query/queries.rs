/// 경매 조회
pub const GET_AUCTION: &str = r#"
    SELECT id, name, time_zone, auction_code, status, phase_schedule,
           in_app_notifications, payment_url, created_by, created_at, updated_at
    FROM auctions
    WHERE id = $1
"#;

/// 참가 코드로 경매 조회
pub const FIND_AUCTIONS_BY_CODE: &str = r#"
    SELECT id, name, time_zone, auction_code, status, phase_schedule,
           in_app_notifications, payment_url, created_by, created_at, updated_at
    FROM auctions
    WHERE auction_code = $1
    ORDER BY created_at
"#;

/// 상품 조회
pub const GET_ITEM: &str = r#"
    SELECT id, auction_id, title, item_type, starting_price, image_url, created_at
    FROM items
    WHERE id = $1
"#;

/// 경매의 상품 목록 조회
pub const LIST_ITEMS_FOR_AUCTION: &str = r#"
    SELECT id, auction_id, title, item_type, starting_price, image_url, created_at
    FROM items
    WHERE auction_id = $1
    ORDER BY created_at
"#;

/// 상품의 입찰 목록 조회
pub const LIST_BIDS_FOR_ITEM: &str = r#"
    SELECT id, auction_id, item_id, bidder_id, amount, placed_at
    FROM bids
    WHERE item_id = $1
    ORDER BY placed_at
"#;

/// 경매의 입찰 목록 조회
pub const LIST_BIDS_FOR_AUCTION: &str = r#"
    SELECT id, auction_id, item_id, bidder_id, amount, placed_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY placed_at
"#;

/// 입찰 조회
pub const GET_BID: &str = r#"
    SELECT id, auction_id, item_id, bidder_id, amount, placed_at
    FROM bids
    WHERE id = $1
"#;

/// 경매의 라이브 낙찰 목록 조회
pub const LIST_LIVE_WINNERS_FOR_AUCTION: &str = r#"
    SELECT item_id, auction_id, bidder_id, final_price, assigned_at
    FROM live_winners
    WHERE auction_id = $1
    ORDER BY assigned_at
"#;

/// 멤버십 조회
pub const GET_MEMBERSHIP: &str = r#"
    SELECT auction_id, user_id, bidder_number, status, role_override, created_at
    FROM memberships
    WHERE auction_id = $1 AND user_id = $2
"#;

/// 입찰자 합계 조회
pub const GET_TOTALS: &str = r#"
    SELECT auction_id, bidder_id, bidder_number, display_name, subtotal, total, paid, updated_at
    FROM totals
    WHERE auction_id = $1 AND bidder_id = $2
"#;

/// 경매의 합계 목록 조회
pub const LIST_TOTALS_FOR_AUCTION: &str = r#"
    SELECT auction_id, bidder_id, bidder_number, display_name, subtotal, total, paid, updated_at
    FROM totals
    WHERE auction_id = $1
    ORDER BY bidder_id
"#;

/// 사용자 알림 목록 조회 (최신순)
pub const LIST_NOTIFICATIONS_FOR_USER: &str = r#"
    SELECT id, auction_id, user_id, kind, message, ref_type, ref_id, created_at, read_at
    FROM notifications
    WHERE user_id = $1
    ORDER BY created_at DESC
"#;

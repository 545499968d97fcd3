/// 멤버십/역할 처리
/// 1. 역할 해석 (멤버십 오버라이드는 권한 축소만 가능)
/// 2. 경매 참가 (참가 코드 확인 + 입찰 번호 배정)
// region:    --- Imports
use crate::bidder_number;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::query;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// endregion: --- Imports

// region:    --- Role

/// 전역/경매 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Bidder,
    AdminL3,
    AdminL2,
    AdminL1,
}

impl Role {
    /// 권한 순위
    pub fn rank(self) -> u8 {
        match self {
            Role::Bidder => 0,
            Role::AdminL3 => 1,
            Role::AdminL2 => 2,
            Role::AdminL1 => 3,
        }
    }

    /// 역할 문자열 파싱
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Bidder" => Some(Role::Bidder),
            "AdminL3" => Some(Role::AdminL3),
            "AdminL2" => Some(Role::AdminL2),
            "AdminL1" => Some(Role::AdminL1),
            _ => None,
        }
    }

    /// 경매 관리 권한 (생성/설정/합계 관리)
    pub fn can_manage_auctions(self) -> bool {
        self.rank() >= Role::AdminL2.rank()
    }

    /// 상품/입찰 관리 권한
    pub fn can_manage_items(self) -> bool {
        self.rank() >= Role::AdminL3.rank()
    }
}

/// 경매별 유효 역할 해석
/// L1 은 전역 역할을 유지하고, 오버라이드는 권한을 낮추는 경우에만 적용된다.
pub fn resolve_effective_role(global_role: Role, role_override: Option<Role>) -> Role {
    let Some(role_override) = role_override else {
        return global_role;
    };
    if global_role == Role::AdminL1 {
        return Role::AdminL1;
    }
    if role_override.rank() <= global_role.rank() {
        role_override
    } else {
        global_role
    }
}

// endregion: --- Role

// region:    --- Membership

// 멤버십 모델
// bidder_number 는 참가 시점에 할당기로 정확히 한 번 배정된다.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Membership {
    pub auction_id: String,
    pub user_id: String,
    pub bidder_number: Option<i64>,
    pub status: String,
    pub role_override: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// 활성 멤버십 요구 (L1 은 전역 접근이므로 예외)
pub fn require_auction_membership(
    role: Role,
    membership: Option<Membership>,
) -> Result<Option<Membership>, ApiError> {
    if role == Role::AdminL1 {
        return Ok(None);
    }
    match membership {
        Some(m) if m.is_active() => Ok(Some(m)),
        _ => Err(ApiError::RoleForbidden(
            "해당 경매의 활성 멤버가 아닙니다.".to_string(),
        )),
    }
}

const INSERT_MEMBERSHIP: &str = r#"
    INSERT INTO memberships (auction_id, user_id, bidder_number, status, role_override, created_at)
    VALUES ($1, $2, $3, 'active', NULL, $4)
    RETURNING auction_id, user_id, bidder_number, status, role_override, created_at
"#;

/// 경매 참가
/// 참가 코드를 확인하고, 입찰 번호를 배정한 뒤 활성 멤버십을 만든다.
pub async fn join_auction(
    db: &DatabaseManager,
    auction_id: &str,
    user_id: &str,
    auction_code: &str,
) -> Result<Membership, ApiError> {
    info!(
        "{:<12} --> 경매 참가: auction={}, user={}",
        "Membership", auction_id, user_id
    );

    let matched = query::handlers::find_auctions_by_code(db, auction_code).await?;
    if matched.is_empty() {
        return Err(ApiError::not_found(
            "auction_not_found",
            "경매를 찾을 수 없습니다.",
        ));
    }
    if matched.len() > 1 {
        // 코드 인덱스 불변식 위반 - 코드 하나가 여러 경매에 배정됨
        return Err(ApiError::AuctionCodeConflict);
    }
    if matched[0].id != auction_id {
        return Err(ApiError::not_found(
            "auction_not_found",
            "경매를 찾을 수 없습니다.",
        ));
    }

    if query::handlers::get_membership(db, auction_id, user_id)
        .await?
        .is_some()
    {
        return Err(ApiError::MembershipExists);
    }

    let bidder_number = bidder_number::allocate_bidder_number(db, auction_id).await?;

    let auction_id = auction_id.to_string();
    let user_id = user_id.to_string();
    let membership = db
        .transaction(move |tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Membership>(INSERT_MEMBERSHIP)
                    .bind(&auction_id)
                    .bind(&user_id)
                    .bind(bidder_number)
                    .bind(Utc::now())
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await?;
    Ok(membership)
}

// endregion: --- Membership

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_only_downscopes() {
        assert_eq!(
            resolve_effective_role(Role::AdminL2, Some(Role::Bidder)),
            Role::Bidder
        );
        assert_eq!(
            resolve_effective_role(Role::AdminL3, Some(Role::AdminL2)),
            Role::AdminL3
        );
        assert_eq!(resolve_effective_role(Role::Bidder, None), Role::Bidder);
    }

    #[test]
    fn test_l1_ignores_overrides() {
        assert_eq!(
            resolve_effective_role(Role::AdminL1, Some(Role::Bidder)),
            Role::AdminL1
        );
    }

    #[test]
    fn test_membership_guard() {
        let membership = Membership {
            auction_id: "a1".to_string(),
            user_id: "u1".to_string(),
            bidder_number: Some(7),
            status: "active".to_string(),
            role_override: None,
            created_at: Utc::now(),
        };
        assert!(require_auction_membership(Role::Bidder, Some(membership.clone())).is_ok());
        assert!(require_auction_membership(Role::Bidder, None).is_err());

        let revoked = Membership {
            status: "revoked".to_string(),
            ..membership
        };
        assert!(require_auction_membership(Role::Bidder, Some(revoked)).is_err());

        // L1 은 멤버십 없이 접근 가능
        assert!(matches!(
            require_auction_membership(Role::AdminL1, None),
            Ok(None)
        ));
    }
}

// endregion: --- Tests

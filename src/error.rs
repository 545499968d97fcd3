/// API 오류 모델
/// 도메인 오류를 표준 응답 본문 {"error": {"code", "message", "details"}} 으로 변환한다.
// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

// endregion: --- Imports

// region:    --- Error Model

/// 도메인 오류
#[derive(Error, Debug)]
pub enum ApiError {
    /// 인증 정보 없음
    #[error("인증 정보가 없습니다.")]
    AuthRequired,
    /// 대상 없음 (경매/상품/입찰 등, code로 구분)
    #[error("{message}")]
    NotFound {
        code: &'static str,
        message: String,
    },
    /// 권한 또는 멤버십 부족
    #[error("{0}")]
    RoleForbidden(String),
    /// 잘못된 입력
    #[error("{0}")]
    Validation(String),
    /// 입찰 금액이 현재 최고 입찰가 이하
    #[error("입찰 금액은 현재 최고 입찰가보다 높아야 합니다.")]
    BidTooLow { current_amount: i64 },
    /// 입찰 저장 후 재확인 시 다른 입찰이 최고가로 판정됨
    #[error("입찰이 접수되기 전에 더 높은 입찰이 저장되었습니다.")]
    Outbid,
    /// 경매가 Open 단계가 아님
    #[error("경매가 입찰 가능한 단계가 아닙니다.")]
    PhaseClosed,
    /// 경매 코드가 다른 경매에 사용 중
    #[error("경매 코드가 이미 다른 경매에 사용 중입니다.")]
    AuctionCodeConflict,
    /// 이미 참여 중인 경매
    #[error("이미 해당 경매에 참여한 사용자입니다.")]
    MembershipExists,
    /// 트랜잭션 경합 재시도 한도 초과
    #[error("최대 재시도 횟수 초과")]
    MaxRetriesExceeded,
    /// 데이터베이스 오류
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// 대상 없음 오류 생성
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::NotFound {
            code,
            message: message.into(),
        }
    }

    /// 오류 코드
    pub fn code(&self) -> &str {
        match self {
            ApiError::AuthRequired => "auth_required",
            ApiError::NotFound { code, .. } => code,
            ApiError::RoleForbidden(_) => "role_forbidden",
            ApiError::Validation(_) => "validation_error",
            ApiError::BidTooLow { .. } => "bid_too_low",
            ApiError::Outbid => "outbid",
            ApiError::PhaseClosed => "phase_closed",
            ApiError::AuctionCodeConflict => "auction_code_conflict",
            ApiError::MembershipExists => "membership_exists",
            ApiError::MaxRetriesExceeded => "max_retries_exceeded",
            ApiError::Database(_) => "internal_error",
        }
    }

    /// HTTP 상태 코드 매핑
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthRequired => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RoleForbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::BidTooLow { .. }
            | ApiError::Outbid
            | ApiError::PhaseClosed
            | ApiError::AuctionCodeConflict
            | ApiError::MembershipExists => StatusCode::CONFLICT,
            ApiError::MaxRetriesExceeded | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 응답 본문의 details 필드
    fn details(&self) -> serde_json::Value {
        match self {
            ApiError::BidTooLow { current_amount } => {
                json!({ "current_amount": current_amount })
            }
            _ => json!({}),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{:<12} --> 내부 오류: {:?}", "Error", self);
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "details": self.details(),
            }
        });
        (status, Json(body)).into_response()
    }
}

// endregion: --- Error Model

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_errors_map_to_409() {
        for err in [
            ApiError::BidTooLow { current_amount: 100 },
            ApiError::Outbid,
            ApiError::PhaseClosed,
            ApiError::AuctionCodeConflict,
            ApiError::MembershipExists,
        ] {
            assert_eq!(err.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::not_found("item_not_found", "없음").code(),
            "item_not_found"
        );
        assert_eq!(ApiError::Outbid.code(), "outbid");
        assert_eq!(
            ApiError::BidTooLow { current_amount: 1 }.code(),
            "bid_too_low"
        );
        assert_eq!(ApiError::AuthRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::RoleForbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_bid_too_low_details_carry_current_amount() {
        let details = ApiError::BidTooLow {
            current_amount: 1500,
        }
        .details();
        assert_eq!(details["current_amount"], 1500);
    }
}

// endregion: --- Tests

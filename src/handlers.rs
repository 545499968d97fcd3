/// HTTP 핸들러
/// 인증은 게이트웨이가 검증한 x-user-id / x-user-role 헤더를 신뢰한다.
/// 핸들러는 역할 해석과 입력 검증만 하고 도메인 로직은 각 모듈에 위임한다.
// region:    --- Imports
use crate::audit::{AuditEntry, AuditLogWriter};
use crate::auction::code::change_auction_code;
use crate::auction::commands::{
    self, CreateAuctionInput, CreateItemInput, UpdateAuctionSettings,
};
use crate::auction::phase::{self, AuctionStatus};
use crate::bidding::commands::{
    assign_live_winner, delete_bid, handle_place_bid, PlaceBidCommand,
};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::membership::{self, resolve_effective_role, Membership, Role};
use crate::notification::{self, NotificationEnqueuer};
use crate::query;
use crate::reports;
use crate::totals;
use axum::extract::{Path, State};
use axum::http::header::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub audit: Arc<dyn AuditLogWriter>,
    pub notifier: Arc<dyn NotificationEnqueuer>,
}

// endregion: --- App State

// region:    --- Actor

/// 요청 행위자 (게이트웨이 헤더에서 복원)
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub global_role: Role,
}

/// 헤더에서 행위자 복원 (x-user-id 없으면 인증 오류, 역할 기본값은 Bidder)
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::AuthRequired)?;
    let global_role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .and_then(Role::parse)
        .unwrap_or(Role::Bidder);
    Ok(Actor {
        user_id: user_id.to_string(),
        global_role,
    })
}

/// 경매별 유효 역할과 멤버십 해석
async fn effective_role_for(
    db: &DatabaseManager,
    auction_id: &str,
    actor: &Actor,
) -> Result<(Role, Option<Membership>), ApiError> {
    let membership = query::handlers::get_membership(db, auction_id, &actor.user_id).await?;
    let role_override = membership
        .as_ref()
        .and_then(|m| m.role_override.as_deref())
        .and_then(Role::parse);
    Ok((
        resolve_effective_role(actor.global_role, role_override),
        membership,
    ))
}

/// 필수 문자열 필드 검증
fn require_non_empty(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!(
            "{} 필드는 비어 있을 수 없습니다.",
            field
        )));
    }
    Ok(trimmed.to_string())
}

fn auction_not_found() -> ApiError {
    ApiError::not_found("auction_not_found", "경매를 찾을 수 없습니다.")
}

// endregion: --- Actor

// region:    --- Auction Handlers

#[derive(Debug, Deserialize)]
pub struct CreateAuctionPayload {
    pub name: String,
    pub time_zone: String,
    pub auction_code: String,
    pub payment_url: Option<String>,
}

/// 경매 생성 핸들러
pub async fn handle_create_auction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAuctionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    if !actor.global_role.can_manage_auctions() {
        return Err(ApiError::RoleForbidden(
            "경매 생성 권한이 없습니다.".to_string(),
        ));
    }

    let input = CreateAuctionInput {
        name: require_non_empty(&payload.name, "name")?,
        time_zone: require_non_empty(&payload.time_zone, "time_zone")?,
        auction_code: require_non_empty(&payload.auction_code, "auction_code")?,
        payment_url: payload.payment_url,
        created_by: actor.user_id,
    };
    let auction = commands::create_auction(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(auction)))
}

/// 경매 조회 핸들러
pub async fn handle_get_auction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    actor_from_headers(&headers)?;
    let auction = query::handlers::get_auction(&state.db, &auction_id)
        .await?
        .ok_or_else(auction_not_found)?;
    Ok(Json(auction))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsPayload {
    pub name: Option<String>,
    pub time_zone: Option<String>,
    pub payment_url: Option<String>,
}

/// 경매 설정 변경 핸들러
pub async fn handle_update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
    Json(payload): Json<UpdateSettingsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_auctions() {
        return Err(ApiError::RoleForbidden(
            "경매 설정 변경 권한이 없습니다.".to_string(),
        ));
    }

    let updates = UpdateAuctionSettings {
        name: payload.name.as_deref().map(|v| require_non_empty(v, "name")).transpose()?,
        time_zone: payload
            .time_zone
            .as_deref()
            .map(|v| require_non_empty(v, "time_zone"))
            .transpose()?,
        payment_url: payload.payment_url,
    };
    let auction = commands::update_auction_settings(&state.db, &auction_id, updates)
        .await?
        .ok_or_else(auction_not_found)?;
    Ok(Json(auction))
}

#[derive(Debug, Deserialize)]
pub struct ChangeCodePayload {
    pub auction_code: String,
}

/// 경매 코드 변경 핸들러
pub async fn handle_change_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
    Json(payload): Json<ChangeCodePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_auctions() {
        return Err(ApiError::RoleForbidden(
            "경매 코드 변경 권한이 없습니다.".to_string(),
        ));
    }

    let auction = change_auction_code(&state.db, &auction_id, &payload.auction_code)
        .await?
        .ok_or_else(auction_not_found)?;

    state
        .audit
        .record(AuditEntry {
            auction_id: auction_id.clone(),
            actor_user_id: actor.user_id,
            action: "code_changed".to_string(),
            target_type: "auction".to_string(),
            target_id: auction_id,
            metadata: json!({ "auction_code": auction.auction_code }),
        })
        .await?;
    Ok(Json(auction))
}

#[derive(Debug, Deserialize)]
pub struct SetPhasePayload {
    pub status: String,
    #[serde(default, with = "double_option")]
    pub phase_schedule: Option<Option<serde_json::Value>>,
}

// phase_schedule 필드의 "없음"과 "null로 지움"을 구분하기 위한 역직렬화
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<Option<serde_json::Value>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<serde_json::Value>::deserialize(deserializer).map(Some)
    }
}

/// 단계 오버라이드 핸들러
pub async fn handle_set_phase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
    Json(payload): Json<SetPhasePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_auctions() {
        return Err(ApiError::RoleForbidden(
            "단계 변경 권한이 없습니다.".to_string(),
        ));
    }

    let status = AuctionStatus::parse(&payload.status)
        .ok_or_else(|| ApiError::Validation("알 수 없는 단계입니다.".to_string()))?;
    let auction = phase::set_auction_phase(&state.db, &auction_id, status, payload.phase_schedule)
        .await?
        .ok_or_else(auction_not_found)?;

    state
        .audit
        .record(AuditEntry {
            auction_id: auction_id.clone(),
            actor_user_id: actor.user_id,
            action: "phase_set".to_string(),
            target_type: "auction".to_string(),
            target_id: auction_id,
            metadata: json!({ "status": status.as_str() }),
        })
        .await?;
    Ok(Json(auction))
}

#[derive(Debug, Deserialize)]
pub struct NotificationSettingsPayload {
    pub in_app_notifications: bool,
}

/// 알림 설정 변경 핸들러
pub async fn handle_update_notification_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
    Json(payload): Json<NotificationSettingsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_auctions() {
        return Err(ApiError::RoleForbidden(
            "알림 설정 변경 권한이 없습니다.".to_string(),
        ));
    }

    let auction = commands::update_notification_settings(
        &state.db,
        &auction_id,
        payload.in_app_notifications,
    )
    .await?
    .ok_or_else(auction_not_found)?;
    Ok(Json(auction))
}

// endregion: --- Auction Handlers

// region:    --- Membership Handlers

#[derive(Debug, Deserialize)]
pub struct JoinAuctionPayload {
    pub auction_code: String,
}

/// 경매 참가 핸들러
pub async fn handle_join_auction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
    Json(payload): Json<JoinAuctionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let auction_code = require_non_empty(&payload.auction_code, "auction_code")?;
    let membership =
        membership::join_auction(&state.db, &auction_id, &actor.user_id, &auction_code).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

// endregion: --- Membership Handlers

// region:    --- Item Handlers

#[derive(Debug, Deserialize)]
pub struct CreateItemPayload {
    pub title: String,
    #[serde(default = "default_item_type")]
    pub item_type: String,
    #[serde(default)]
    pub starting_price: i64,
    pub image_url: Option<String>,
}

fn default_item_type() -> String {
    "silent".to_string()
}

/// 상품 등록 핸들러
pub async fn handle_create_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
    Json(payload): Json<CreateItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_items() {
        return Err(ApiError::RoleForbidden(
            "상품 등록 권한이 없습니다.".to_string(),
        ));
    }
    if payload.starting_price < 0 {
        return Err(ApiError::Validation(
            "시작가는 음수일 수 없습니다.".to_string(),
        ));
    }

    let item = commands::create_item(
        &state.db,
        CreateItemInput {
            auction_id,
            title: require_non_empty(&payload.title, "title")?,
            item_type: payload.item_type,
            starting_price: payload.starting_price,
            image_url: payload.image_url,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// 상품 조회 핸들러
pub async fn handle_get_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    actor_from_headers(&headers)?;
    let item = query::handlers::get_item(&state.db, &item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("item_not_found", "상품을 찾을 수 없습니다."))?;
    Ok(Json(item))
}

/// 경매 상품 목록 핸들러
pub async fn handle_list_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    actor_from_headers(&headers)?;
    if query::handlers::get_auction(&state.db, &auction_id)
        .await?
        .is_none()
    {
        return Err(auction_not_found());
    }
    let items = query::handlers::list_items_for_auction(&state.db, &auction_id).await?;
    Ok(Json(items))
}

// endregion: --- Item Handlers

// region:    --- Bid Handlers

#[derive(Debug, Deserialize)]
pub struct PlaceBidPayload {
    pub amount: i64,
}

/// 입찰 핸들러
/// 입찰자는 행위자 본인이며 활성 멤버십이 있어야 한다.
pub async fn handle_place_bid_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((auction_id, item_id)): Path<(String, String)>,
    Json(payload): Json<PlaceBidPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    if query::handlers::get_auction(&state.db, &auction_id)
        .await?
        .is_none()
    {
        return Err(auction_not_found());
    }
    // 대상 없음이 권한 오류보다 먼저다 - 상품 확인 후 멤버십을 본다
    if query::handlers::get_item(&state.db, &item_id)
        .await?
        .filter(|item| item.auction_id == auction_id)
        .is_none()
    {
        return Err(ApiError::not_found(
            "item_not_found",
            "상품을 찾을 수 없습니다.",
        ));
    }
    let (_, membership) = effective_role_for(&state.db, &auction_id, &actor).await?;
    let membership = membership
        .filter(Membership::is_active)
        .ok_or_else(|| ApiError::RoleForbidden("해당 경매의 활성 멤버가 아닙니다.".to_string()))?;

    let outcome = handle_place_bid(
        &state.db,
        state.audit.as_ref(),
        state.notifier.as_ref(),
        &membership,
        PlaceBidCommand {
            auction_id,
            item_id,
            bidder_id: actor.user_id,
            amount: payload.amount,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// 최고 입찰 조회 핸들러
pub async fn handle_get_highest_bid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    actor_from_headers(&headers)?;
    if query::handlers::get_item(&state.db, &item_id).await?.is_none() {
        return Err(ApiError::not_found(
            "item_not_found",
            "상품을 찾을 수 없습니다.",
        ));
    }
    let high = query::handlers::get_current_high_bid(&state.db, &item_id).await?;
    Ok(Json(json!({ "highest_bid": high })))
}

/// 상품 입찰 이력 핸들러 (관리자)
pub async fn handle_list_item_bids(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((auction_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_items() {
        return Err(ApiError::RoleForbidden(
            "입찰 이력 조회 권한이 없습니다.".to_string(),
        ));
    }
    let bids = query::handlers::list_bids_for_item(&state.db, &item_id).await?;
    Ok(Json(bids))
}

/// 입찰 삭제 핸들러 (관리자, 감사 기록)
pub async fn handle_delete_bid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((auction_id, bid_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_items() {
        return Err(ApiError::RoleForbidden(
            "입찰 삭제 권한이 없습니다.".to_string(),
        ));
    }

    let deleted = delete_bid(
        &state.db,
        state.audit.as_ref(),
        &actor.user_id,
        &auction_id,
        &bid_id,
    )
    .await?;
    Ok(Json(deleted))
}

#[derive(Debug, Deserialize)]
pub struct LiveWinnerPayload {
    pub bidder_id: String,
    pub final_price: i64,
}

/// 라이브 낙찰 배정 핸들러 (관리자, 감사 기록)
pub async fn handle_assign_live_winner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    Json(payload): Json<LiveWinnerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let item = query::handlers::get_item(&state.db, &item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("item_not_found", "상품을 찾을 수 없습니다."))?;
    let (role, _) = effective_role_for(&state.db, &item.auction_id, &actor).await?;
    if !role.can_manage_items() {
        return Err(ApiError::RoleForbidden(
            "라이브 낙찰 배정 권한이 없습니다.".to_string(),
        ));
    }

    let bidder_id = require_non_empty(&payload.bidder_id, "bidder_id")?;
    let winner = assign_live_winner(
        &state.db,
        state.audit.as_ref(),
        &actor.user_id,
        &item_id,
        &bidder_id,
        payload.final_price,
    )
    .await?;
    Ok(Json(winner))
}

// endregion: --- Bid Handlers

// region:    --- Totals Handlers

/// 본인 합계 조회 핸들러
pub async fn handle_get_my_totals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, membership) = effective_role_for(&state.db, &auction_id, &actor).await?;
    let membership = membership::require_auction_membership(role, membership)?;

    // 합계 행이 아직 없으면 0 으로 채운 기본 행을 돌려준다
    let totals = query::handlers::get_totals(&state.db, &auction_id, &actor.user_id)
        .await?
        .unwrap_or_else(|| totals::Totals {
            auction_id,
            bidder_id: actor.user_id.clone(),
            bidder_number: membership.and_then(|m| m.bidder_number).unwrap_or(0),
            display_name: actor.user_id,
            subtotal: 0,
            total: 0,
            paid: false,
            updated_at: Utc::now(),
        });
    Ok(Json(totals))
}

/// 합계 목록 핸들러 (관리자)
pub async fn handle_list_totals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_auctions() {
        return Err(ApiError::RoleForbidden(
            "합계 조회 권한이 없습니다.".to_string(),
        ));
    }
    let totals = query::handlers::list_totals_for_auction(&state.db, &auction_id).await?;
    Ok(Json(totals))
}

/// 합계 재계산 핸들러 (관리자, 감사 기록)
pub async fn handle_recompute_totals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_auctions() {
        return Err(ApiError::RoleForbidden(
            "합계 재계산 권한이 없습니다.".to_string(),
        ));
    }
    if query::handlers::get_auction(&state.db, &auction_id)
        .await?
        .is_none()
    {
        return Err(auction_not_found());
    }

    info!("{:<12} --> 합계 재계산 요청: {}", "Handler", auction_id);
    let bids = query::handlers::list_bids_for_auction(&state.db, &auction_id).await?;
    let winners = query::handlers::list_live_winners_for_auction(&state.db, &auction_id).await?;
    let computed = totals::reconcile_totals(&state.db, &auction_id, &bids, &winners).await?;

    state
        .audit
        .record(AuditEntry {
            auction_id: auction_id.clone(),
            actor_user_id: actor.user_id,
            action: "totals_recomputed".to_string(),
            target_type: "auction".to_string(),
            target_id: auction_id,
            metadata: json!({ "bid_count": bids.len(), "row_count": computed.len() }),
        })
        .await?;
    Ok(Json(computed))
}

#[derive(Debug, Deserialize)]
pub struct PaymentPayload {
    pub paid: bool,
}

/// 결제 완료 표시 핸들러 (관리자)
pub async fn handle_update_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((auction_id, bidder_id)): Path<(String, String)>,
    Json(payload): Json<PaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_items() {
        return Err(ApiError::RoleForbidden(
            "결제 표시 권한이 없습니다.".to_string(),
        ));
    }

    let totals = totals::set_totals_paid(&state.db, &auction_id, &bidder_id, payload.paid)
        .await?
        .ok_or_else(|| ApiError::not_found("totals_not_found", "합계 기록을 찾을 수 없습니다."))?;
    Ok(Json(totals))
}

// endregion: --- Totals Handlers

// region:    --- Reports Handlers

/// 요약 리포트 핸들러 (관리자)
pub async fn handle_get_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auction_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (role, _) = effective_role_for(&state.db, &auction_id, &actor).await?;
    if !role.can_manage_items() {
        return Err(ApiError::RoleForbidden(
            "리포트 조회 권한이 없습니다.".to_string(),
        ));
    }
    if query::handlers::get_auction(&state.db, &auction_id)
        .await?
        .is_none()
    {
        return Err(auction_not_found());
    }

    let items = query::handlers::list_items_for_auction(&state.db, &auction_id).await?;
    let bids = query::handlers::list_bids_for_auction(&state.db, &auction_id).await?;
    let winners = query::handlers::list_live_winners_for_auction(&state.db, &auction_id).await?;
    let totals = query::handlers::list_totals_for_auction(&state.db, &auction_id).await?;
    let summary = reports::summarize_auction(&items, &bids, &winners, totals.len());
    Ok(Json(json!({ "auction_id": auction_id, "totals": summary })))
}

// endregion: --- Reports Handlers

// region:    --- Notification Handlers

/// 본인 알림 목록 핸들러
pub async fn handle_list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let notifications =
        query::handlers::list_notifications_for_user(&state.db, &actor.user_id).await?;
    Ok(Json(notifications))
}

/// 알림 읽음 처리 핸들러
pub async fn handle_mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    notification::mark_notification_read(&state.db, &notification_id, &actor.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// endregion: --- Notification Handlers

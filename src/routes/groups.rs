use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        group::{CreateGroupRequest, GroupSummary, InvitePreview, JoinGroupRequest},
        ledger::{
            AddMemberRequest, LedgerSnapshotView, MarkPaidRequest, MemberStatusView, MemberView,
            PaymentRecordedResponse, PeriodQuery, ReportView, RequestSpotRequest, RequestView,
            SetExemptRequest,
        },
    },
    error::AppError,
    identity::Caller,
    services::{group_service, ledger_service},
    state::SharedState,
};

/// Group, invite and ledger endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/join", post(join_group))
        .route("/invites/{code}", get(resolve_invite))
        .route("/groups/{id}/ledger", get(ledger_snapshot))
        .route("/groups/{id}/report", get(ledger_report))
        .route("/groups/{id}/status", get(member_status))
        .route("/groups/{id}/members", post(add_member))
        .route("/groups/{id}/members/{member_id}", delete(remove_member))
        .route(
            "/groups/{id}/members/{member_id}/exempt",
            put(set_member_exempt),
        )
        .route("/groups/{id}/payments", post(mark_as_paid))
        .route("/groups/{id}/payments/{key}", delete(undo_payment))
        .route("/groups/{id}/history/{key}", delete(delete_historical))
        .route("/groups/{id}/requests", post(request_spot))
        .route("/groups/{id}/requests/{request_id}/accept", post(accept_request))
        .route("/groups/{id}/requests/{request_id}", delete(reject_request))
}

/// List the groups the caller owns or was invited to.
#[utoipa::path(
    get,
    path = "/groups",
    tag = "groups",
    responses(
        (status = 200, description = "Visible groups", body = [GroupSummary]),
        (status = 401, description = "Sign-in required")
    )
)]
pub async fn list_groups(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<Vec<GroupSummary>>, AppError> {
    Ok(Json(group_service::list_groups(&state, &caller).await?))
}

/// Create a group owned by the caller.
#[utoipa::path(
    post,
    path = "/groups",
    tag = "groups",
    request_body = CreateGroupRequest,
    responses((status = 201, description = "Group created", body = GroupSummary))
)]
pub async fn create_group(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<CreateGroupRequest>>,
) -> Result<(StatusCode, Json<GroupSummary>), AppError> {
    let group = group_service::create_group(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Join a group through its invite code.
#[utoipa::path(
    post,
    path = "/groups/join",
    tag = "groups",
    request_body = JoinGroupRequest,
    responses(
        (status = 200, description = "Joined", body = GroupSummary),
        (status = 404, description = "Unknown invite code")
    )
)]
pub async fn join_group(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<JoinGroupRequest>>,
) -> Result<Json<GroupSummary>, AppError> {
    Ok(Json(
        group_service::join_group_by_code(&state, &caller, payload).await?,
    ))
}

/// Look up the group behind an invite code.
#[utoipa::path(
    get,
    path = "/invites/{code}",
    tag = "groups",
    params(("code" = String, Path, description = "Invite code")),
    responses(
        (status = 200, description = "Group preview", body = InvitePreview),
        (status = 404, description = "Unknown invite code")
    )
)]
pub async fn resolve_invite(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<InvitePreview>, AppError> {
    Ok(Json(group_service::resolve_invite(&state, &code).await?))
}

/// Members, payments, requests and report of one period.
#[utoipa::path(
    get,
    path = "/groups/{id}/ledger",
    tag = "ledger",
    params(("id" = Uuid, Path, description = "Group identifier"), PeriodQuery),
    responses((status = 200, description = "Ledger snapshot", body = LedgerSnapshotView))
)]
pub async fn ledger_snapshot(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<LedgerSnapshotView>, AppError> {
    let period = query.period()?;
    Ok(Json(
        ledger_service::snapshot(&state, &caller, id, period).await?,
    ))
}

/// Reconciled status rows of one period.
#[utoipa::path(
    get,
    path = "/groups/{id}/report",
    tag = "ledger",
    params(("id" = Uuid, Path, description = "Group identifier"), PeriodQuery),
    responses((status = 200, description = "Monthly report", body = ReportView))
)]
pub async fn ledger_report(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ReportView>, AppError> {
    let period = query.period()?;
    Ok(Json(ledger_service::report(&state, &caller, id, period).await?))
}

/// The caller's own obligation status.
#[utoipa::path(
    get,
    path = "/groups/{id}/status",
    tag = "ledger",
    params(("id" = Uuid, Path, description = "Group identifier"), PeriodQuery),
    responses((status = 200, description = "Member status", body = MemberStatusView))
)]
pub async fn member_status(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<MemberStatusView>, AppError> {
    let period = query.period()?;
    Ok(Json(ledger_service::status(&state, &caller, id, period).await?))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/members",
    tag = "ledger",
    params(("id" = Uuid, Path, description = "Group identifier")),
    request_body = AddMemberRequest,
    responses((status = 201, description = "Member added", body = MemberView))
)]
pub async fn add_member(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AddMemberRequest>>,
) -> Result<(StatusCode, Json<MemberView>), AppError> {
    let member = ledger_service::add_member(&state, &caller, id, payload).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/members/{member_id}",
    tag = "ledger",
    params(
        ("id" = Uuid, Path, description = "Group identifier"),
        ("member_id" = String, Path, description = "Member identifier")
    ),
    responses((status = 204, description = "Member removed"))
)]
pub async fn remove_member(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, member_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, AppError> {
    ledger_service::remove_member(&state, &caller, id, &member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move a member in or out of the VIP tier.
#[utoipa::path(
    put,
    path = "/groups/{id}/members/{member_id}/exempt",
    tag = "ledger",
    params(
        ("id" = Uuid, Path, description = "Group identifier"),
        ("member_id" = String, Path, description = "Member identifier")
    ),
    request_body = SetExemptRequest,
    responses((status = 200, description = "Member updated", body = MemberView))
)]
pub async fn set_member_exempt(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, member_id)): Path<(Uuid, String)>,
    Valid(Json(payload)): Valid<Json<SetExemptRequest>>,
) -> Result<Json<MemberView>, AppError> {
    Ok(Json(
        ledger_service::set_member_exempt(&state, &caller, id, &member_id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/payments",
    tag = "ledger",
    params(("id" = Uuid, Path, description = "Group identifier")),
    request_body = MarkPaidRequest,
    responses((status = 200, description = "Payment recorded", body = PaymentRecordedResponse))
)]
pub async fn mark_as_paid(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<MarkPaidRequest>>,
) -> Result<Json<PaymentRecordedResponse>, AppError> {
    Ok(Json(
        ledger_service::mark_as_paid(&state, &caller, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/payments/{key}",
    tag = "ledger",
    params(
        ("id" = Uuid, Path, description = "Group identifier"),
        ("key" = String, Path, description = "Payment key `{member_id}_{year}-{month}`")
    ),
    responses((status = 204, description = "Payment removed"))
)]
pub async fn undo_payment(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, key)): Path<(Uuid, String)>,
) -> Result<StatusCode, AppError> {
    ledger_service::undo_payment(&state, &caller, id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a payment record regardless of whether its member still exists.
#[utoipa::path(
    delete,
    path = "/groups/{id}/history/{key}",
    tag = "ledger",
    params(
        ("id" = Uuid, Path, description = "Group identifier"),
        ("key" = String, Path, description = "Payment key `{member_id}_{year}-{month}`")
    ),
    responses((status = 204, description = "Record removed"))
)]
pub async fn delete_historical(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, key)): Path<(Uuid, String)>,
) -> Result<StatusCode, AppError> {
    ledger_service::delete_historical(&state, &caller, id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/groups/{id}/requests",
    tag = "ledger",
    params(("id" = Uuid, Path, description = "Group identifier")),
    request_body = RequestSpotRequest,
    responses((status = 201, description = "Request filed", body = RequestView))
)]
pub async fn request_spot(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<RequestSpotRequest>>,
) -> Result<(StatusCode, Json<RequestView>), AppError> {
    let request = ledger_service::request_spot(&state, &caller, id, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/requests/{request_id}/accept",
    tag = "ledger",
    params(
        ("id" = Uuid, Path, description = "Group identifier"),
        ("request_id" = String, Path, description = "Join request identifier")
    ),
    responses((status = 200, description = "Request accepted", body = MemberView))
)]
pub async fn accept_request(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, request_id)): Path<(Uuid, String)>,
) -> Result<Json<MemberView>, AppError> {
    Ok(Json(
        ledger_service::accept_request(&state, &caller, id, &request_id).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/requests/{request_id}",
    tag = "ledger",
    params(
        ("id" = Uuid, Path, description = "Group identifier"),
        ("request_id" = String, Path, description = "Join request identifier")
    ),
    responses((status = 204, description = "Request rejected"))
)]
pub async fn reject_request(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, request_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, AppError> {
    ledger_service::reject_request(&state, &caller, id, &request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

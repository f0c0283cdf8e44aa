use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Hub Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::group_stream,
        crate::routes::sse::rooms_stream,
        crate::routes::groups::list_groups,
        crate::routes::groups::create_group,
        crate::routes::groups::join_group,
        crate::routes::groups::resolve_invite,
        crate::routes::groups::ledger_snapshot,
        crate::routes::groups::ledger_report,
        crate::routes::groups::member_status,
        crate::routes::groups::add_member,
        crate::routes::groups::remove_member,
        crate::routes::groups::set_member_exempt,
        crate::routes::groups::mark_as_paid,
        crate::routes::groups::undo_payment,
        crate::routes::groups::delete_historical,
        crate::routes::groups::request_spot,
        crate::routes::groups::accept_request,
        crate::routes::groups::reject_request,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::create_room,
        crate::routes::rooms::my_rooms,
        crate::routes::rooms::join_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::finish_room,
        crate::routes::rooms::price_split,
        crate::routes::rooms::add_player,
        crate::routes::rooms::remove_player,
        crate::routes::rooms::update_player_status,
        crate::routes::rooms::update_price,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::group::CreateGroupRequest,
            crate::dto::group::JoinGroupRequest,
            crate::dto::group::GroupSummary,
            crate::dto::group::InvitePreview,
            crate::dto::ledger::AddMemberRequest,
            crate::dto::ledger::SetExemptRequest,
            crate::dto::ledger::MarkPaidRequest,
            crate::dto::ledger::RequestSpotRequest,
            crate::dto::ledger::MemberView,
            crate::dto::ledger::PaymentView,
            crate::dto::ledger::RequestView,
            crate::dto::ledger::ReportRowView,
            crate::dto::ledger::ReportView,
            crate::dto::ledger::LedgerSnapshotView,
            crate::dto::ledger::MemberStatusKind,
            crate::dto::ledger::MemberStatusView,
            crate::dto::ledger::PaymentRecordedResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::AddPlayerRequest,
            crate::dto::room::UpdatePlayerStatusRequest,
            crate::dto::room::UpdatePriceRequest,
            crate::dto::room::PlayerView,
            crate::dto::room::PriceSplitView,
            crate::dto::room::RoomView,
            crate::dto::sse::ActiveRoomsEvent,
            crate::dto::sse::RoomUpdatedEvent,
            crate::dao::models::RequestStatus,
            crate::dao::models::RoomStatus,
            crate::dao::models::TeamSide,
            crate::dao::models::PlayerStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "groups", description = "Household groups and invite codes"),
        (name = "ledger", description = "Monthly obligation ledger of a group"),
        (name = "rooms", description = "Recocho pickup-game rooms"),
    )
)]
pub struct ApiDoc;

//! Ledger operations of a group: roster changes, payment records and join requests.
//!
//! Every mutation runs under the group's gate, then recomputes the current period's
//! snapshot and pushes it to the group's SSE subscribers.

use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::RequestStatus,
    dto::{
        format_system_time,
        ledger::{
            AddMemberRequest, LedgerSnapshotView, MarkPaidRequest, MemberStatusView, MemberView,
            PaymentRecordedResponse, ReportView, RequestSpotRequest, RequestView, SetExemptRequest,
        },
    },
    error::ServiceError,
    identity::Caller,
    services::{group_service, sse_events},
    state::{
        SharedState,
        ledger::{JoinRequest, LedgerSnapshot, Member, PaymentRecord, member_status, reconcile},
        obligation::{ObligationKey, ObligationPeriod},
        roster::{plan_new_member, sanitize_name},
    },
};

/// Read members, payments and requests of a group concurrently and reconcile them.
pub async fn load_snapshot(
    state: &SharedState,
    group_id: Uuid,
    period: Option<ObligationPeriod>,
) -> Result<LedgerSnapshot, ServiceError> {
    let store = state.require_store().await?;
    let (members, payments, requests) = tokio::try_join!(
        store.list_members(group_id),
        store.list_payments(group_id),
        store.list_requests(group_id)
    )?;

    Ok(LedgerSnapshot::build(
        group_id,
        period.unwrap_or_else(ObligationPeriod::current),
        members.into_iter().map(Member::from).collect(),
        payments
            .into_iter()
            .map(|(key, payment)| (key, PaymentRecord::from(payment)))
            .collect(),
        requests.into_iter().map(JoinRequest::from).collect(),
    ))
}

/// Recompute the current snapshot and broadcast it. Failures are logged, never returned:
/// the mutation itself already succeeded.
async fn publish_ledger(state: &SharedState, group_id: Uuid) {
    match load_snapshot(state, group_id, None).await {
        Ok(snapshot) => sse_events::broadcast_ledger_snapshot(state, group_id, snapshot),
        Err(err) => warn!(%group_id, error = %err, "failed to publish ledger snapshot"),
    }
}

async fn load_members(state: &SharedState, group_id: Uuid) -> Result<Vec<Member>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_members(group_id)
        .await?
        .into_iter()
        .map(Member::from)
        .collect())
}

fn find_member(members: &[Member], member_id: &str) -> Result<Member, ServiceError> {
    members
        .iter()
        .find(|member| member.id == member_id)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound(format!("member `{member_id}` not found")))
}

/// Full ledger of a group for `period` (default: current month).
pub async fn snapshot(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    period: Option<ObligationPeriod>,
) -> Result<LedgerSnapshotView, ServiceError> {
    group_service::ensure_viewer(state, caller, group_id).await?;
    Ok(load_snapshot(state, group_id, period).await?.into())
}

/// Reconciled monthly report of a group.
pub async fn report(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    period: Option<ObligationPeriod>,
) -> Result<ReportView, ServiceError> {
    group_service::ensure_viewer(state, caller, group_id).await?;
    let period = period.unwrap_or_else(ObligationPeriod::current);
    let store = state.require_store().await?;
    let (members, payments) =
        tokio::try_join!(store.list_members(group_id), store.list_payments(group_id))?;

    let members: Vec<Member> = members.into_iter().map(Member::from).collect();
    let payments = payments
        .into_iter()
        .map(|(key, payment)| (key, PaymentRecord::from(payment)))
        .collect();
    Ok(ReportView::new(period, reconcile(&members, &payments, period)))
}

/// The caller's own badge in the group.
pub async fn status(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    period: Option<ObligationPeriod>,
) -> Result<MemberStatusView, ServiceError> {
    group_service::ensure_viewer(state, caller, group_id).await?;
    let identity = caller.require_identity()?;
    let snapshot = load_snapshot(state, group_id, period).await?;
    let payments = snapshot.payments.into_iter().collect();
    let (status, member_id) = member_status(&snapshot.members, &payments, identity, snapshot.period);

    Ok(MemberStatusView {
        status: status.into(),
        member_id,
        year: snapshot.period.year(),
        month: snapshot.period.month(),
    })
}

/// Append a member; newcomers start exempt once the paying pool is full.
pub async fn add_member(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    payload: AddMemberRequest,
) -> Result<MemberView, ServiceError> {
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    let member = insert_member(state, group_id, &payload.name, None).await?;
    publish_ledger(state, group_id).await;
    Ok(member.into())
}

async fn insert_member(
    state: &SharedState,
    group_id: Uuid,
    name: &str,
    user_id: Option<String>,
) -> Result<Member, ServiceError> {
    let roster = load_members(state, group_id).await?;
    let member = plan_new_member(
        name,
        user_id,
        &roster,
        state.config().paying_member_threshold,
        state.member_ids().next_id(),
        SystemTime::now(),
    )?;

    let store = state.require_store().await?;
    store.save_member(group_id, member.clone().into()).await?;
    info!(
        %group_id,
        member_id = %member.id,
        exempt = member.is_exempt,
        "member added"
    );
    Ok(member)
}

/// Remove a member. Their payment records stay and later surface as ex-member rows.
pub async fn remove_member(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    member_id: &str,
) -> Result<(), ServiceError> {
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    let store = state.require_store().await?;
    if !store.delete_member(group_id, member_id.to_owned()).await? {
        return Err(ServiceError::NotFound(format!(
            "member `{member_id}` not found"
        )));
    }
    info!(%group_id, member_id, "member removed");
    publish_ledger(state, group_id).await;
    Ok(())
}

/// Set the VIP flag of one member. Repeating the same value changes nothing.
pub async fn set_member_exempt(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    member_id: &str,
    payload: SetExemptRequest,
) -> Result<MemberView, ServiceError> {
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    let mut member = find_member(&load_members(state, group_id).await?, member_id)?;
    if member.is_exempt == payload.is_exempt {
        return Ok(member.into());
    }
    member.is_exempt = payload.is_exempt;

    let store = state.require_store().await?;
    store.save_member(group_id, member.clone().into()).await?;
    info!(%group_id, member_id, exempt = member.is_exempt, "member exemption updated");
    publish_ledger(state, group_id).await;
    Ok(member.into())
}

/// Record a payment for a member and period. Recording twice overwrites the record.
pub async fn mark_as_paid(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    payload: MarkPaidRequest,
) -> Result<PaymentRecordedResponse, ServiceError> {
    let period = payload
        .period()?
        .unwrap_or_else(ObligationPeriod::current);
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    let member = find_member(&load_members(state, group_id).await?, &payload.member_id)?;
    if member.is_exempt {
        return Err(ServiceError::InvalidState(format!(
            "member `{}` is exempt",
            member.id
        )));
    }

    let key = ObligationKey::encode(&member.id, period);
    let record = PaymentRecord {
        date: format_system_time(SystemTime::now()),
        name: member.name,
    };
    let store = state.require_store().await?;
    store
        .save_payment(group_id, key.clone(), record.clone().into())
        .await?;
    info!(%group_id, %key, "payment recorded");
    publish_ledger(state, group_id).await;

    Ok(PaymentRecordedResponse {
        key,
        date: record.date,
        name: record.name,
    })
}

/// Delete the payment record of a current member. Deleting a missing record succeeds.
pub async fn undo_payment(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    key: &str,
) -> Result<(), ServiceError> {
    let decoded = ObligationKey::decode(key)?;
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    find_member(&load_members(state, group_id).await?, decoded.member_id())?;
    delete_payment(state, group_id, key).await
}

/// Delete any well-formed payment record, typically one left by a removed member.
pub async fn delete_historical(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    key: &str,
) -> Result<(), ServiceError> {
    ObligationKey::decode(key)?;
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    delete_payment(state, group_id, key).await
}

async fn delete_payment(
    state: &SharedState,
    group_id: Uuid,
    key: &str,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let removed = store.delete_payment(group_id, key.to_owned()).await?;
    info!(%group_id, key, removed, "payment deleted");
    publish_ledger(state, group_id).await;
    Ok(())
}

/// File a self-service request for a spot, tagged with the caller's uid.
pub async fn request_spot(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    payload: RequestSpotRequest,
) -> Result<RequestView, ServiceError> {
    let identity = caller.require_identity()?;
    let name = sanitize_name(&payload.name)?;
    group_service::load_group(state, group_id).await?;
    let _gate = state.lock(group_id).await;

    let store = state.require_store().await?;
    let (members, requests) =
        tokio::try_join!(store.list_members(group_id), store.list_requests(group_id))?;

    if members
        .iter()
        .any(|member| member.user_id.as_deref() == Some(identity.uid.as_str()))
    {
        return Err(ServiceError::InvalidState(
            "already a member of this group".into(),
        ));
    }
    if let Some(existing) = requests.into_iter().find(|request| {
        request.status == RequestStatus::Pending
            && request.user_id.as_deref() == Some(identity.uid.as_str())
    }) {
        return Ok(JoinRequest::from(existing).into());
    }

    let request = JoinRequest {
        id: state.member_ids().next_id(),
        name,
        created_at: SystemTime::now(),
        status: RequestStatus::Pending,
        user_id: Some(identity.uid.clone()),
    };
    store.save_request(group_id, request.clone().into()).await?;
    info!(%group_id, request_id = %request.id, "join request filed");
    publish_ledger(state, group_id).await;
    Ok(request.into())
}

/// Turn a request into a roster entry, then drop the request.
pub async fn accept_request(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    request_id: &str,
) -> Result<MemberView, ServiceError> {
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    let store = state.require_store().await?;
    let request = store
        .list_requests(group_id)
        .await?
        .into_iter()
        .find(|request| request.id == request_id)
        .ok_or_else(|| ServiceError::NotFound(format!("request `{request_id}` not found")))?;

    let roster = load_members(state, group_id).await?;
    let linked = request.user_id.as_deref().and_then(|uid| {
        roster
            .iter()
            .find(|member| member.user_id.as_deref() == Some(uid))
            .cloned()
    });
    let member = match linked {
        Some(member) => member,
        None => insert_member(state, group_id, &request.name, request.user_id.clone()).await?,
    };

    store.delete_request(group_id, request.id.clone()).await?;
    info!(%group_id, request_id, member_id = %member.id, "join request accepted");
    publish_ledger(state, group_id).await;
    Ok(member.into())
}

/// Drop a request without touching the roster.
pub async fn reject_request(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
    request_id: &str,
) -> Result<(), ServiceError> {
    group_service::ensure_admin(state, caller, group_id).await?;
    let _gate = state.lock(group_id).await;

    let store = state.require_store().await?;
    if !store
        .delete_request(group_id, request_id.to_owned())
        .await?
    {
        return Err(ServiceError::NotFound(format!(
            "request `{request_id}` not found"
        )));
    }
    info!(%group_id, request_id, "join request rejected");
    publish_ledger(state, group_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::memory::MemoryStore,
        dto::{group::CreateGroupRequest, ledger::MemberStatusKind},
        identity::Identity,
        state::AppState,
    };

    fn caller(uid: &str, display_name: Option<&str>) -> Caller {
        Caller::authenticated(Identity {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
            display_name: display_name.map(Into::into),
        })
    }

    async fn setup() -> (SharedState, Caller, Uuid) {
        let state = AppState::new(AppConfig::default());
        state.set_store(Arc::new(MemoryStore::new())).await;
        let owner = caller("owner", None);
        let group = group_service::create_group(
            &state,
            &owner,
            CreateGroupRequest { name: "Casa".into() },
        )
        .await
        .unwrap();
        (state, owner, group.id)
    }

    async fn add(state: &SharedState, owner: &Caller, group_id: Uuid, name: &str) -> MemberView {
        add_member(state, owner, group_id, AddMemberRequest { name: name.into() })
            .await
            .unwrap()
    }

    fn pay(member_id: &str) -> MarkPaidRequest {
        MarkPaidRequest {
            member_id: member_id.into(),
            year: Some(2024),
            month: Some(7),
        }
    }

    fn july() -> Option<ObligationPeriod> {
        Some(ObligationPeriod::new(2024, 7).unwrap())
    }

    #[tokio::test]
    async fn seventh_member_starts_exempt() {
        let (state, owner, group_id) = setup().await;
        for i in 0..6 {
            assert!(!add(&state, &owner, group_id, &format!("m{i}")).await.is_exempt);
        }
        assert!(add(&state, &owner, group_id, "late").await.is_exempt);
    }

    #[tokio::test]
    async fn payment_lifecycle_and_ex_members() {
        let (state, owner, group_id) = setup().await;
        let ana = add(&state, &owner, group_id, "Ana").await;
        let beto = add(&state, &owner, group_id, "Beto").await;

        let paid = mark_as_paid(&state, &owner, group_id, pay(&ana.id)).await.unwrap();
        assert_eq!(paid.key, format!("{}_2024-7", ana.id));
        // marking twice keeps a single record
        mark_as_paid(&state, &owner, group_id, pay(&ana.id)).await.unwrap();

        let report = report(&state, &owner, group_id, july()).await.unwrap();
        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().any(|row| row.id == ana.id && row.is_paid));
        assert!(report.rows.iter().any(|row| row.id == beto.id && !row.is_paid));

        remove_member(&state, &owner, group_id, &ana.id).await.unwrap();
        let snapshot = snapshot(&state, &owner, group_id, july()).await.unwrap();
        let ex = snapshot.report.iter().find(|row| row.id == ana.id).unwrap();
        assert!(ex.is_ex_member);
        assert_eq!(ex.name, "Ana");

        assert!(matches!(
            undo_payment(&state, &owner, group_id, &paid.key).await,
            Err(ServiceError::NotFound(_))
        ));
        delete_historical(&state, &owner, group_id, &paid.key)
            .await
            .unwrap();
        let report = super::report(&state, &owner, group_id, july()).await.unwrap();
        assert_eq!(report.rows.len(), 1);
    }

    #[tokio::test]
    async fn undo_is_idempotent_and_keys_are_checked() {
        let (state, owner, group_id) = setup().await;
        let ana = add(&state, &owner, group_id, "Ana").await;
        let paid = mark_as_paid(&state, &owner, group_id, pay(&ana.id)).await.unwrap();

        undo_payment(&state, &owner, group_id, &paid.key).await.unwrap();
        undo_payment(&state, &owner, group_id, &paid.key).await.unwrap();
        assert!(matches!(
            undo_payment(&state, &owner, group_id, "no-separator").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            delete_historical(&state, &owner, group_id, "1_2024-07").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn exempt_members_cannot_be_charged() {
        let (state, owner, group_id) = setup().await;
        let ana = add(&state, &owner, group_id, "Ana").await;
        let updated = set_member_exempt(&state, &owner, group_id, &ana.id, exempt(true))
            .await
            .unwrap();
        assert!(updated.is_exempt);
        assert!(matches!(
            mark_as_paid(&state, &owner, group_id, pay(&ana.id)).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    fn exempt(is_exempt: bool) -> SetExemptRequest {
        SetExemptRequest { is_exempt }
    }

    #[tokio::test]
    async fn exemption_is_set_not_flipped() {
        let (state, owner, group_id) = setup().await;
        let ana = add(&state, &owner, group_id, "Ana").await;

        for _ in 0..2 {
            let view = set_member_exempt(&state, &owner, group_id, &ana.id, exempt(true))
                .await
                .unwrap();
            assert!(view.is_exempt);
        }
        let snapshot = snapshot(&state, &owner, group_id, None).await.unwrap();
        assert!(snapshot.members[0].is_exempt);

        let cleared = set_member_exempt(&state, &owner, group_id, &ana.id, exempt(false))
            .await
            .unwrap();
        assert!(!cleared.is_exempt);
        let again = set_member_exempt(&state, &owner, group_id, &ana.id, exempt(false))
            .await
            .unwrap();
        assert!(!again.is_exempt);
        assert!(mark_as_paid(&state, &owner, group_id, pay(&ana.id)).await.is_ok());

        assert!(matches!(
            set_member_exempt(&state, &owner, group_id, "missing", exempt(true)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn join_requests_become_linked_members() {
        let (state, owner, group_id) = setup().await;
        let visitor = caller("visitor", Some("Vera"));

        let request = request_spot(
            &state,
            &visitor,
            group_id,
            RequestSpotRequest { name: "Vera".into() },
        )
        .await
        .unwrap();
        let again = request_spot(
            &state,
            &visitor,
            group_id,
            RequestSpotRequest { name: "Vera".into() },
        )
        .await
        .unwrap();
        assert_eq!(request.id, again.id);

        assert!(matches!(
            accept_request(&state, &visitor, group_id, &request.id).await,
            Err(ServiceError::Unauthorized(_))
        ));
        let member = accept_request(&state, &owner, group_id, &request.id)
            .await
            .unwrap();
        assert_eq!(member.user_id.as_deref(), Some("visitor"));

        let view = snapshot(&state, &owner, group_id, None).await.unwrap();
        assert!(view.requests.is_empty());
        assert_eq!(view.members.len(), 1);

        assert!(matches!(
            request_spot(
                &state,
                &visitor,
                group_id,
                RequestSpotRequest { name: "Vera".into() }
            )
            .await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            reject_request(&state, &owner, group_id, &request.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn member_status_follows_payments() {
        let (state, owner, group_id) = setup().await;
        add(&state, &owner, group_id, "owner").await;

        let badge = status(&state, &owner, group_id, july()).await.unwrap();
        assert_eq!(badge.status, MemberStatusKind::Pending);

        let member_id = badge.member_id.unwrap();
        mark_as_paid(&state, &owner, group_id, pay(&member_id)).await.unwrap();
        let badge = status(&state, &owner, group_id, july()).await.unwrap();
        assert_eq!(badge.status, MemberStatusKind::Paid);
    }

    #[tokio::test]
    async fn mutations_publish_snapshots() {
        let (state, owner, group_id) = setup().await;
        let mut receiver = state.group_sse(group_id).subscribe();

        add(&state, &owner, group_id, "Ana").await;
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(sse_events::EVENT_LEDGER_SNAPSHOT));
        assert!(event.data.contains("\"Ana\""));
    }

    #[tokio::test]
    async fn degraded_mode_fails_fast() {
        let (state, owner, group_id) = setup().await;
        state.update_degraded(true);
        assert!(matches!(
            add_member(&state, &owner, group_id, AddMemberRequest { name: "A".into() }).await,
            Err(ServiceError::Degraded)
        ));
    }
}

//! DTOs of the group ledger routes and of the `ledger.snapshot` SSE event.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::RequestStatus,
    dto::format_system_time,
    error::ServiceError,
    state::{
        ledger::{JoinRequest, LedgerSnapshot, Member, MemberStatus, PaymentRecord, ReportRow},
        obligation::ObligationPeriod,
    },
};

/// Optional billing period selector; both fields or neither.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    pub year: Option<i32>,
    /// 1 to 12.
    pub month: Option<u32>,
}

impl PeriodQuery {
    /// The selected period, or `None` for the current one.
    pub fn period(&self) -> Result<Option<ObligationPeriod>, ServiceError> {
        match (self.year, self.month) {
            (Some(year), Some(month)) => Ok(Some(ObligationPeriod::new(year, month)?)),
            (None, None) => Ok(None),
            _ => Err(ServiceError::InvalidInput(
                "year and month must be given together".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddMemberRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
}

/// Explicit VIP override for one member.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetExemptRequest {
    pub is_exempt: bool,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RequestSpotRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
}

/// Record a payment for one member. The period defaults to the current month.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct MarkPaidRequest {
    #[validate(length(min = 1))]
    pub member_id: String,
    pub year: Option<i32>,
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u32>,
}

impl MarkPaidRequest {
    pub fn period(&self) -> Result<Option<ObligationPeriod>, ServiceError> {
        PeriodQuery {
            year: self.year,
            month: self.month,
        }
        .period()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberView {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub user_id: Option<String>,
    /// VIP members are outside the monthly obligation pool.
    pub is_exempt: bool,
}

impl From<Member> for MemberView {
    fn from(value: Member) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: format_system_time(value.created_at),
            user_id: value.user_id,
            is_exempt: value.is_exempt,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentView {
    /// Composite `{member_id}_{year}-{month}` key.
    pub key: String,
    pub date: String,
    pub name: String,
}

impl From<(String, PaymentRecord)> for PaymentView {
    fn from((key, record): (String, PaymentRecord)) -> Self {
        Self {
            key,
            date: record.date,
            name: record.name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestView {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub status: RequestStatus,
    pub user_id: Option<String>,
}

impl From<JoinRequest> for RequestView {
    fn from(value: JoinRequest) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: format_system_time(value.created_at),
            status: value.status,
            user_id: value.user_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportRowView {
    /// Member id, possibly of a removed member.
    pub id: String,
    pub key: String,
    pub name: String,
    pub is_paid: bool,
    pub date: Option<String>,
    pub is_ex_member: bool,
}

impl From<ReportRow> for ReportRowView {
    fn from(value: ReportRow) -> Self {
        Self {
            id: value.id,
            key: value.key,
            name: value.name,
            is_paid: value.is_paid,
            date: value.date,
            is_ex_member: value.is_ex_member,
        }
    }
}

/// Reconciled report for one period.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportView {
    pub year: i32,
    pub month: u8,
    pub rows: Vec<ReportRowView>,
}

impl ReportView {
    pub fn new(period: ObligationPeriod, rows: Vec<ReportRow>) -> Self {
        Self {
            year: period.year(),
            month: period.month(),
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }
}

/// Full ledger state of a group for one period.
#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerSnapshotView {
    pub group_id: Uuid,
    pub year: i32,
    pub month: u8,
    pub members: Vec<MemberView>,
    pub payments: Vec<PaymentView>,
    pub requests: Vec<RequestView>,
    pub report: Vec<ReportRowView>,
}

impl From<LedgerSnapshot> for LedgerSnapshotView {
    fn from(value: LedgerSnapshot) -> Self {
        Self {
            group_id: value.group_id,
            year: value.period.year(),
            month: value.period.month(),
            members: value.members.into_iter().map(Into::into).collect(),
            payments: value.payments.into_iter().map(Into::into).collect(),
            requests: value.requests.into_iter().map(Into::into).collect(),
            report: value.report.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatusKind {
    Unlinked,
    Vip,
    Paid,
    Pending,
}

impl From<MemberStatus> for MemberStatusKind {
    fn from(value: MemberStatus) -> Self {
        match value {
            MemberStatus::Unlinked => Self::Unlinked,
            MemberStatus::Vip => Self::Vip,
            MemberStatus::Paid => Self::Paid,
            MemberStatus::Pending => Self::Pending,
        }
    }
}

/// The caller's own standing in a group for one period.
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberStatusView {
    pub status: MemberStatusKind,
    pub member_id: Option<String>,
    pub year: i32,
    pub month: u8,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentRecordedResponse {
    pub key: String,
    pub date: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_query_requires_both_parts() {
        let full = PeriodQuery {
            year: Some(2024),
            month: Some(7),
        };
        assert_eq!(
            full.period().unwrap(),
            Some(ObligationPeriod::new(2024, 7).unwrap())
        );
        assert_eq!(PeriodQuery::default().period().unwrap(), None);

        let half = PeriodQuery {
            year: Some(2024),
            month: None,
        };
        assert!(half.period().is_err());

        let bad_month = PeriodQuery {
            year: Some(2024),
            month: Some(13),
        };
        assert!(matches!(bad_month.period(), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn add_member_rejects_empty_names() {
        assert!(AddMemberRequest { name: String::new() }.validate().is_err());
        assert!(AddMemberRequest { name: "Ana".into() }.validate().is_ok());
    }
}

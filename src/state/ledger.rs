//! Group ledger: roster, sparse payment records, join requests, and the monthly
//! reconciliation that merges them into one status row per member.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    time::SystemTime,
};

use uuid::Uuid;

use crate::{
    dao::models::{GroupEntity, MemberEntity, PaymentEntity, RequestEntity, RequestStatus},
    identity::Identity,
    state::obligation::{ObligationKey, ObligationPeriod},
};

/// Display name used for paid rows whose member no longer exists and left no name snapshot.
pub const EX_MEMBER_PLACEHOLDER: &str = "Ex-Member";

/// Household group owning a roster, its payments and its join requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub created_at: SystemTime,
    /// Identity references of users with read access besides the owner.
    pub member_uids: Vec<String>,
    pub invite_code: Option<String>,
}

impl Group {
    /// Owner or listed member.
    pub fn has_access(&self, uid: &str) -> bool {
        self.owner_id == uid || self.member_uids.iter().any(|member| member == uid)
    }
}

/// Roster entry of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Time-derived identifier, never contains `_`.
    pub id: String,
    pub name: String,
    pub created_at: SystemTime,
    pub user_id: Option<String>,
    /// Excluded from the monthly obligation pool (VIP).
    pub is_exempt: bool,
}

/// Proof of payment for one member and period. Its existence is the only "paid" flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    /// RFC 3339 timestamp of the payment.
    pub date: String,
    /// Member name at the time of payment.
    pub name: String,
}

/// Self-service request for a spot in the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub id: String,
    pub name: String,
    pub created_at: SystemTime,
    pub status: RequestStatus,
    pub user_id: Option<String>,
}

/// Reconciled status of one member (or ex-member) for a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub id: String,
    pub key: String,
    pub name: String,
    pub is_paid: bool,
    pub date: Option<String>,
    pub is_ex_member: bool,
}

/// Merge the roster with the payment records of `period`.
///
/// Paid rows come from the records themselves, so members removed after paying still
/// surface (flagged as ex-members, under their snapshotted name). Every current member
/// that is not exempt and has no record gets a pending row. The result is sorted with
/// [`compare_names`] and is fully determined by the inputs.
pub fn reconcile(
    members: &[Member],
    payments: &HashMap<String, PaymentRecord>,
    period: ObligationPeriod,
) -> Vec<ReportRow> {
    let suffix = period.suffix();
    let roster: HashMap<&str, &Member> = members.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut covered = HashSet::new();
    let mut rows = Vec::with_capacity(members.len().max(payments.len()));

    for (key, record) in payments {
        if !key.ends_with(&suffix) {
            continue;
        }
        let member_id = key.split('_').next().unwrap_or_default();
        let current = roster.get(member_id);
        let name = if !record.name.is_empty() {
            record.name.clone()
        } else if let Some(member) = current {
            member.name.clone()
        } else {
            EX_MEMBER_PLACEHOLDER.to_owned()
        };

        covered.insert(member_id.to_owned());
        rows.push(ReportRow {
            id: member_id.to_owned(),
            key: key.clone(),
            name,
            is_paid: true,
            date: Some(record.date.clone()),
            is_ex_member: current.is_none(),
        });
    }

    for member in members {
        if member.is_exempt || covered.contains(&member.id) {
            continue;
        }
        rows.push(ReportRow {
            id: member.id.clone(),
            key: ObligationKey::encode(&member.id, period),
            name: member.name.clone(),
            is_paid: false,
            date: None,
            is_ex_member: false,
        });
    }

    rows.sort_by(|a, b| compare_names(&a.name, &b.name).then_with(|| a.key.cmp(&b.key)));
    rows
}

/// Case-insensitive, accent-insensitive ordering for display names.
///
/// Ties on the folded form fall back to the raw strings so the order stays total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded_a = a.chars().flat_map(fold_char);
    let folded_b = b.chars().flat_map(fold_char);
    folded_a.cmp(folded_b).then_with(|| a.cmp(b))
}

fn fold_char(c: char) -> impl Iterator<Item = char> {
    let base = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other,
    };
    base.to_lowercase()
}

/// Badge shown to a signed-in user about their own obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// No roster entry matches the identity.
    Unlinked,
    Vip,
    Paid,
    Pending,
}

/// Find the caller's roster entry and report their status for `period`.
///
/// Matching prefers the linked `user_id`, then a case-insensitive name match against the
/// identity handle.
pub fn member_status(
    members: &[Member],
    payments: &HashMap<String, PaymentRecord>,
    identity: &Identity,
    period: ObligationPeriod,
) -> (MemberStatus, Option<String>) {
    let handle = identity.handle().to_lowercase();
    let member = members
        .iter()
        .find(|m| m.user_id.as_deref() == Some(identity.uid.as_str()))
        .or_else(|| members.iter().find(|m| m.name.to_lowercase() == handle));

    let Some(member) = member else {
        return (MemberStatus::Unlinked, None);
    };
    if member.is_exempt {
        return (MemberStatus::Vip, Some(member.id.clone()));
    }

    let key = ObligationKey::encode(&member.id, period);
    let status = if payments.contains_key(&key) {
        MemberStatus::Paid
    } else {
        MemberStatus::Pending
    };
    (status, Some(member.id.clone()))
}

/// Everything a client needs to render a group ledger for one period.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub group_id: Uuid,
    pub period: ObligationPeriod,
    /// Oldest first.
    pub members: Vec<Member>,
    /// Keyed by composite key, in key order.
    pub payments: BTreeMap<String, PaymentRecord>,
    /// Newest first.
    pub requests: Vec<JoinRequest>,
    pub report: Vec<ReportRow>,
}

impl LedgerSnapshot {
    pub fn build(
        group_id: Uuid,
        period: ObligationPeriod,
        mut members: Vec<Member>,
        payments: HashMap<String, PaymentRecord>,
        mut requests: Vec<JoinRequest>,
    ) -> Self {
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let report = reconcile(&members, &payments, period);
        Self {
            group_id,
            period,
            members,
            payments: payments.into_iter().collect(),
            requests,
            report,
        }
    }
}

impl From<GroupEntity> for Group {
    fn from(value: GroupEntity) -> Self {
        Self {
            id: value.id,
            owner_id: value.owner_id,
            name: value.name,
            created_at: value.created_at,
            member_uids: value.member_uids,
            invite_code: value.invite_code,
        }
    }
}

impl From<Group> for GroupEntity {
    fn from(value: Group) -> Self {
        Self {
            id: value.id,
            owner_id: value.owner_id,
            name: value.name,
            created_at: value.created_at,
            member_uids: value.member_uids,
            invite_code: value.invite_code,
        }
    }
}

impl From<MemberEntity> for Member {
    fn from(value: MemberEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at,
            user_id: value.user_id,
            is_exempt: value.is_exempt,
        }
    }
}

impl From<Member> for MemberEntity {
    fn from(value: Member) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at,
            user_id: value.user_id,
            is_exempt: value.is_exempt,
        }
    }
}

impl From<PaymentEntity> for PaymentRecord {
    fn from(value: PaymentEntity) -> Self {
        Self {
            date: value.date,
            name: value.name,
        }
    }
}

impl From<PaymentRecord> for PaymentEntity {
    fn from(value: PaymentRecord) -> Self {
        Self {
            date: value.date,
            name: value.name,
        }
    }
}

impl From<RequestEntity> for JoinRequest {
    fn from(value: RequestEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at,
            status: value.status,
            user_id: value.user_id,
        }
    }
}

impl From<JoinRequest> for RequestEntity {
    fn from(value: JoinRequest) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at,
            status: value.status,
            user_id: value.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn member(id: &str, name: &str, exempt: bool) -> Member {
        Member {
            id: id.into(),
            name: name.into(),
            created_at: SystemTime::UNIX_EPOCH + Duration::from_millis(id.parse().unwrap_or(0)),
            user_id: None,
            is_exempt: exempt,
        }
    }

    fn paid(name: &str) -> PaymentRecord {
        PaymentRecord {
            date: "2024-07-03T10:00:00Z".into(),
            name: name.into(),
        }
    }

    fn july() -> ObligationPeriod {
        ObligationPeriod::new(2024, 7).unwrap()
    }

    #[test]
    fn pending_and_paid_rows() {
        let members = vec![member("1", "Beto", false), member("2", "ana", false)];
        let mut payments = HashMap::new();
        payments.insert("1_2024-7".to_string(), paid("Beto"));

        let rows = reconcile(&members, &payments, july());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "ana");
        assert!(!rows[0].is_paid);
        assert_eq!(rows[0].key, "2_2024-7");
        assert_eq!(rows[0].date, None);
        assert_eq!(rows[1].name, "Beto");
        assert!(rows[1].is_paid);
        assert_eq!(rows[1].date.as_deref(), Some("2024-07-03T10:00:00Z"));
    }

    #[test]
    fn every_non_exempt_member_appears_once() {
        let members: Vec<Member> = (1..=9)
            .map(|i| member(&i.to_string(), &format!("M{i}"), i % 4 == 0))
            .collect();
        let mut payments = HashMap::new();
        payments.insert("3_2024-7".to_string(), paid("M3"));
        payments.insert("5_2024-7".to_string(), paid("M5"));
        payments.insert("5_2024-6".to_string(), paid("M5"));
        payments.insert("7_2023-7".to_string(), paid("M7"));

        let rows = reconcile(&members, &payments, july());
        for m in members.iter().filter(|m| !m.is_exempt) {
            assert_eq!(rows.iter().filter(|r| r.id == m.id).count(), 1, "{}", m.id);
        }
        assert!(rows.iter().all(|r| r.key.ends_with("_2024-7")));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let members = vec![
            member("1", "Zoe", false),
            member("2", "zoe", false),
            member("3", "Ángel", false),
        ];
        let mut payments = HashMap::new();
        payments.insert("9_2024-7".to_string(), paid("Zoe"));
        payments.insert("2_2024-7".to_string(), paid("zoe"));

        let first = reconcile(&members, &payments, july());
        let second = reconcile(&members, &payments, july());
        assert_eq!(first, second);
        assert_eq!(first[0].name, "Ángel");
    }

    #[test]
    fn removed_member_surfaces_as_ex_member() {
        let mut payments = HashMap::new();
        payments.insert("1_2024-7".to_string(), paid("Carla"));

        let rows = reconcile(&[member("2", "Dani", false)], &payments, july());
        let ex = rows.iter().find(|r| r.id == "1").unwrap();
        assert!(ex.is_ex_member);
        assert!(ex.is_paid);
        assert_eq!(ex.name, "Carla");
    }

    #[test]
    fn ex_member_without_snapshot_uses_placeholder() {
        let mut payments = HashMap::new();
        payments.insert("1_2024-7".to_string(), paid(""));

        let rows = reconcile(&[], &payments, july());
        assert_eq!(rows[0].name, "Ex-Member");

        let rows = reconcile(&[member("1", "Eva", false)], &payments, july());
        assert_eq!(rows[0].name, "Eva");
        assert!(!rows[0].is_ex_member);
    }

    #[test]
    fn exempt_members_keep_history_but_never_pend() {
        let members = vec![member("1", "Vip", true)];
        let mut payments = HashMap::new();
        payments.insert("1_2024-6".to_string(), paid("Vip"));

        assert!(reconcile(&members, &payments, july()).is_empty());
        let june = reconcile(&members, &payments, ObligationPeriod::new(2024, 6).unwrap());
        assert_eq!(june.len(), 1);
        assert!(june[0].is_paid);
    }

    #[test]
    fn suffix_match_does_not_confuse_months() {
        let mut payments = HashMap::new();
        payments.insert("1_2024-11".to_string(), paid("A"));
        let rows = reconcile(&[], &payments, ObligationPeriod::new(2024, 1).unwrap());
        assert!(rows.is_empty());
    }

    #[test]
    fn names_collate_without_case_or_accents() {
        assert_eq!(compare_names("árbol", "Bote"), Ordering::Less);
        assert_eq!(compare_names("Ñandú", "nube"), Ordering::Less);
        assert_eq!(compare_names("ñu", "nu"), "ñu".cmp("nu"));
        assert_eq!(compare_names("ana", "ANA"), "ana".cmp("ANA"));
    }

    #[test]
    fn status_by_user_id_then_handle() {
        let mut linked = member("1", "Someone", false);
        linked.user_id = Some("uid-1".into());
        let members = vec![linked, member("2", "darwin", false), member("3", "vip", true)];
        let mut payments = HashMap::new();
        payments.insert("1_2024-7".to_string(), paid("Someone"));

        let by_uid = Identity {
            uid: "uid-1".into(),
            email: "x@example.com".into(),
            display_name: None,
        };
        assert_eq!(
            member_status(&members, &payments, &by_uid, july()),
            (MemberStatus::Paid, Some("1".into()))
        );

        let by_name = Identity {
            uid: "uid-2".into(),
            email: "Darwin@example.com".into(),
            display_name: None,
        };
        assert_eq!(
            member_status(&members, &payments, &by_name, july()).0,
            MemberStatus::Pending
        );

        let vip = Identity {
            uid: "uid-3".into(),
            email: "z@example.com".into(),
            display_name: Some("VIP".into()),
        };
        assert_eq!(member_status(&members, &payments, &vip, july()).0, MemberStatus::Vip);

        let stranger = Identity {
            uid: "uid-4".into(),
            email: "nobody@example.com".into(),
            display_name: None,
        };
        assert_eq!(
            member_status(&members, &payments, &stranger, july()),
            (MemberStatus::Unlinked, None)
        );
    }

    #[test]
    fn snapshot_orders_members_and_requests() {
        let requests = vec![
            JoinRequest {
                id: "10".into(),
                name: "old".into(),
                created_at: SystemTime::UNIX_EPOCH + Duration::from_millis(10),
                status: RequestStatus::Pending,
                user_id: None,
            },
            JoinRequest {
                id: "20".into(),
                name: "new".into(),
                created_at: SystemTime::UNIX_EPOCH + Duration::from_millis(20),
                status: RequestStatus::Pending,
                user_id: None,
            },
        ];
        let snapshot = LedgerSnapshot::build(
            Uuid::nil(),
            july(),
            vec![member("5", "b", false), member("2", "a", false)],
            HashMap::new(),
            requests,
        );
        assert_eq!(snapshot.members[0].id, "2");
        assert_eq!(snapshot.requests[0].id, "20");
        assert_eq!(snapshot.report.len(), 2);
    }
}

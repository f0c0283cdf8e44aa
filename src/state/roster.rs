//! Roster mutation rules: identifier allocation and automatic VIP tiering.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::{error::ServiceError, state::ledger::Member};

/// Maximum length accepted for member and request names.
pub const MAX_NAME_LEN: usize = 60;

/// Issues time-derived identifiers that stay unique under rapid successive calls.
///
/// Each id is the current Unix time in milliseconds, bumped past the previously issued
/// value when two calls land in the same millisecond.
#[derive(Debug, Default)]
pub struct MemberIdGenerator {
    last: AtomicU64,
}

impl MemberIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;

        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => last = actual,
            }
        }
    }
}

/// Trim and validate a display name.
pub fn sanitize_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Number of members currently in the paying pool.
pub fn paying_count(roster: &[Member]) -> usize {
    roster.iter().filter(|m| !m.is_exempt).count()
}

/// Build the member that an add action would create against `roster`.
///
/// Once `threshold` paying members exist, newcomers start exempt. The flag is decided
/// here only; later roster changes never re-tier existing members.
pub fn plan_new_member(
    name: &str,
    user_id: Option<String>,
    roster: &[Member],
    threshold: usize,
    id: String,
    now: SystemTime,
) -> Result<Member, ServiceError> {
    Ok(Member {
        id,
        name: sanitize_name(name)?,
        created_at: now,
        user_id,
        is_exempt: paying_count(roster) >= threshold,
    })
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    fn roster(paying: usize, exempt: usize) -> Vec<Member> {
        (0..paying + exempt)
            .map(|i| Member {
                id: i.to_string(),
                name: format!("m{i}"),
                created_at: SystemTime::UNIX_EPOCH,
                user_id: None,
                is_exempt: i >= paying,
            })
            .collect()
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids = MemberIdGenerator::new();
        let issued: Vec<u64> = (0..1_000).map(|_| ids.next_id().parse().unwrap()).collect();
        assert!(issued.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let ids = Arc::new(MemberIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(!id.contains('_'));
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 2_000);
    }

    #[test]
    fn seventh_paying_member_becomes_exempt() {
        let member = plan_new_member(
            "  Nuevo  ",
            None,
            &roster(6, 0),
            6,
            "99".into(),
            SystemTime::UNIX_EPOCH,
        )
        .unwrap();
        assert!(member.is_exempt);
        assert_eq!(member.name, "Nuevo");
    }

    #[test]
    fn exempt_members_do_not_fill_the_pool() {
        let member = plan_new_member(
            "Otra",
            Some("uid".into()),
            &roster(5, 3),
            6,
            "99".into(),
            SystemTime::UNIX_EPOCH,
        )
        .unwrap();
        assert!(!member.is_exempt);
        assert_eq!(member.user_id.as_deref(), Some("uid"));
    }

    #[test]
    fn rejects_blank_and_overlong_names() {
        assert!(sanitize_name("   ").is_err());
        assert!(sanitize_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert_eq!(sanitize_name(" Ana ").unwrap(), "Ana");
    }
}

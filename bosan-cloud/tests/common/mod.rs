//! In-memory test doubles for the pipeline's collaborators.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use bosan_cloud::db::{
    CandidateKeys, ExistingMatches, LegacyCallUp, MemberStats, MemberStore, PendingMember,
    StoreError, schema_validate,
};
use bosan_cloud::mail::{MailError, MailTransport};
use bosan_cloud::pipeline::dedup::digit_part;
use bosan_cloud::pipeline::dispatch::PacingPolicy;
use bosan_cloud::pipeline::ingest::Cell;
use shared::util::now_millis;
use shared::{Member, NewMember, Role};

/// Member store holding everything in a `Mutex<Vec<Member>>`, with the same
/// uniqueness rules as the real schema.
#[derive(Default)]
pub struct MemStore {
    pub members: Mutex<Vec<Member>>,
    /// Make `find_existing` fail, to exercise degraded dedup.
    pub fail_existence_check: AtomicBool,
    /// Make `set_activation_token` fail.
    pub fail_token_update: AtomicBool,
    /// Make `record_dispatch_outcome` fail.
    pub fail_outcome_update: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, member: Member) {
        self.members.lock().unwrap().push(member);
    }

    pub fn get(&self, id: Uuid) -> Option<Member> {
        self.members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn by_email(&self, email: &str) -> Option<Member> {
        self.members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.email == email)
            .cloned()
    }

    fn check_unique(&self, candidate: &NewMember) -> Result<(), StoreError> {
        let members = self.members.lock().unwrap();
        if members
            .iter()
            .any(|m| m.call_up_number == candidate.call_up_number)
        {
            return Err(StoreError::Conflict(
                "Call-up Number already exists in the database".into(),
            ));
        }
        if members.iter().any(|m| m.email == candidate.email) {
            return Err(StoreError::Conflict(
                "Email already exists in the database".into(),
            ));
        }
        if members.iter().any(|m| m.name == candidate.name) {
            return Err(StoreError::Conflict(
                "Name already exists in the database".into(),
            ));
        }
        Ok(())
    }

    fn insert(&self, candidate: &NewMember) -> Result<Uuid, StoreError> {
        self.check_unique(candidate)?;
        let id = Uuid::new_v4();
        let now = now_millis();
        self.members.lock().unwrap().push(Member {
            id,
            call_up_number: candidate.call_up_number.clone(),
            legacy_id: candidate.legacy_id.clone(),
            name: candidate.name.clone(),
            full_name: candidate.full_name.clone(),
            email: candidate.email.clone(),
            elevation_year: candidate.elevation_year,
            debit_balance: candidate.debit_balance,
            is_active: candidate.is_active,
            activation_token: Some(candidate.activation_token.clone()),
            activation_token_expires_at: Some(candidate.activation_token_expires_at),
            invitation_sent: candidate.invitation_sent,
            last_error: candidate.last_error.clone(),
            hashed_password: None,
            role: candidate.role,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }
}

#[async_trait]
impl MemberStore for MemStore {
    async fn list_legacy_numeric(&self) -> Result<Vec<LegacyCallUp>, StoreError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                !m.call_up_number.is_empty()
                    && m.call_up_number.chars().all(|c| c.is_ascii_digit())
            })
            .map(|m| LegacyCallUp {
                id: m.id,
                call_up_number: m.call_up_number.clone(),
            })
            .collect())
    }

    async fn rewrite_call_up_number(&self, id: Uuid, canonical: &str) -> Result<(), StoreError> {
        let mut members = self.members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::Unavailable("no such member".into()))?;
        member.call_up_number = canonical.to_string();
        member.updated_at = now_millis();
        Ok(())
    }

    async fn find_existing(&self, keys: &CandidateKeys) -> Result<ExistingMatches, StoreError> {
        if self.fail_existence_check.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("existence check refused".into()));
        }
        let mut matches = ExistingMatches::default();
        let members = self.members.lock().unwrap();
        for m in members.iter() {
            let digits = digit_part(&m.call_up_number);
            let hit = keys.call_ups.contains(&m.call_up_number)
                || digits.as_ref().is_some_and(|d| keys.call_up_digits.contains(d))
                || keys.emails.contains(&m.email.to_lowercase())
                || keys.names.contains(&m.name);
            if hit {
                matches.add(&m.call_up_number, &m.email, &m.name);
            }
        }
        Ok(matches)
    }

    async fn insert_raw(&self, member: &NewMember) -> Result<Uuid, StoreError> {
        self.insert(member)
    }

    async fn insert_validated(&self, member: &NewMember) -> Result<Uuid, StoreError> {
        schema_validate(member)?;
        self.insert(member)
    }

    async fn find_pending(
        &self,
        ids: Option<&[Uuid]>,
        force_resend: bool,
    ) -> Result<Vec<PendingMember>, StoreError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !m.is_active && !m.email.is_empty())
            .filter(|m| ids.is_none_or(|ids| ids.contains(&m.id)))
            .filter(|m| force_resend || !m.invitation_sent)
            .map(|m| PendingMember {
                id: m.id,
                name: m.name.clone(),
                full_name: m.full_name.clone(),
                email: m.email.clone(),
                activation_token: m.activation_token.clone(),
                activation_token_expires_at: m.activation_token_expires_at,
            })
            .collect())
    }

    async fn set_activation_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        if self.fail_token_update.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("token update refused".into()));
        }
        let mut members = self.members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::Unavailable("no such member".into()))?;
        member.activation_token = Some(token.to_string());
        member.activation_token_expires_at = Some(expires_at);
        member.updated_at = now_millis();
        Ok(())
    }

    async fn record_dispatch_outcome(
        &self,
        id: Uuid,
        invitation_sent: bool,
        last_error: &str,
    ) -> Result<(), StoreError> {
        if self.fail_outcome_update.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("outcome update refused".into()));
        }
        let mut members = self.members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::Unavailable("no such member".into()))?;
        member.invitation_sent = invitation_sent;
        member.last_error = last_error.to_string();
        member.updated_at = now_millis();
        Ok(())
    }

    async fn stats(&self) -> Result<MemberStats, StoreError> {
        let members = self.members.lock().unwrap();
        Ok(MemberStats {
            total: members.len() as i64,
            active: members.iter().filter(|m| m.is_active).count() as i64,
            inactive: members.iter().filter(|m| !m.is_active).count() as i64,
            invites_sent: members.iter().filter(|m| m.invitation_sent).count() as i64,
            pending_invites: members
                .iter()
                .filter(|m| !m.is_active && !m.invitation_sent)
                .count() as i64,
            legacy_numeric: members
                .iter()
                .filter(|m| m.call_up_number.chars().all(|c| c.is_ascii_digit()))
                .count() as i64,
        })
    }

    async fn find_by_activation_token(
        &self,
        token: &str,
        now_millis: i64,
    ) -> Result<Option<Member>, StoreError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.activation_token.as_deref() == Some(token)
                    && m.activation_token_expires_at
                        .is_some_and(|exp| exp > now_millis)
            })
            .cloned())
    }

    async fn activate(&self, id: Uuid, hashed_password: &str) -> Result<(), StoreError> {
        let mut members = self.members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::Unavailable("no such member".into()))?;
        member.is_active = true;
        member.hashed_password = Some(hashed_password.to_string());
        member.activation_token = None;
        member.activation_token_expires_at = None;
        member.updated_at = now_millis();
        Ok(())
    }
}

/// Mail transport that records sends and can refuse specific recipients.
#[derive(Default)]
pub struct MockTransport {
    /// (to, subject, html) per delivered message.
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail_for: Mutex<HashSet<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse(&self, email: &str) {
        self.fail_for.lock().unwrap().insert(email.to_string());
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _, _)| to.clone())
            .collect()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        if self.fail_for.lock().unwrap().contains(to) {
            return Err(MailError::Send("550 recipient rejected".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), html_body.to_string()));
        Ok(())
    }
}

/// Pacing shrunk to milliseconds so sweep tests stay fast.
pub fn fast_pacing(batch_size: usize) -> PacingPolicy {
    PacingPolicy {
        per_item: (Duration::from_millis(5), Duration::from_millis(10)),
        per_batch: (Duration::from_millis(10), Duration::from_millis(20)),
        batch_size,
    }
}

/// A stored member with sane defaults for seeding.
pub fn existing_member(call_up: &str, name: &str, email: &str) -> Member {
    let now = now_millis();
    Member {
        id: Uuid::new_v4(),
        call_up_number: call_up.to_string(),
        legacy_id: None,
        name: name.to_string(),
        full_name: format!("{name}, SAN"),
        email: email.to_string(),
        elevation_year: Some(2004),
        debit_balance: 0.0,
        is_active: false,
        activation_token: None,
        activation_token_expires_at: None,
        invitation_sent: false,
        last_error: String::new(),
        hashed_password: None,
        role: Role::User,
        created_at: now,
        updated_at: now,
    }
}

pub fn text(s: &str) -> Cell {
    Cell::Text(s.to_string())
}

/// Standard import sheet header.
pub fn header() -> Vec<Cell> {
    vec![
        text("callUpNumber"),
        text("name"),
        text("fullName"),
        text("email"),
        text("elevationYear"),
        text("debitBalance"),
    ]
}

/// One data row matching [`header`].
pub fn data_row(call_up: &str, name: &str, email: &str) -> Vec<Cell> {
    vec![
        text(call_up),
        text(name),
        text(&format!("{name}, SAN")),
        text(email),
        Cell::Number(2004.0),
        Cell::Number(0.0),
    ]
}

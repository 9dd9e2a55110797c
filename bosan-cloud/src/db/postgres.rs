//! PostgreSQL member store

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use shared::util::now_millis;
use shared::{Member, NewMember, Role};

use super::{
    CandidateKeys, ExistingMatches, LegacyCallUp, MemberStats, MemberStore, PendingMember,
    StoreError, schema_validate,
};

/// Member store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgMemberStore {
    pool: PgPool,
}

impl PgMemberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, member: &NewMember) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO members (
                id, call_up_number, legacy_id, name, full_name, email,
                elevation_year, debit_balance, is_active,
                activation_token, activation_token_expires_at,
                invitation_sent, last_error, role, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(id)
        .bind(&member.call_up_number)
        .bind(&member.legacy_id)
        .bind(&member.name)
        .bind(&member.full_name)
        .bind(&member.email)
        .bind(member.elevation_year)
        .bind(member.debit_balance)
        .bind(member.is_active)
        .bind(&member.activation_token)
        .bind(member.activation_token_expires_at)
        .bind(member.invitation_sent)
        .bind(&member.last_error)
        .bind(member.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(id)
    }
}

#[async_trait]
impl MemberStore for PgMemberStore {
    async fn list_legacy_numeric(&self) -> Result<Vec<LegacyCallUp>, StoreError> {
        sqlx::query_as::<_, LegacyCallUp>(
            "SELECT id, call_up_number FROM members WHERE call_up_number ~ '^[0-9]+$'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn rewrite_call_up_number(&self, id: Uuid, canonical: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE members SET call_up_number = $1, updated_at = $2 WHERE id = $3")
            .bind(canonical)
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_existing(&self, keys: &CandidateKeys) -> Result<ExistingMatches, StoreError> {
        #[derive(FromRow)]
        struct IdentityRow {
            call_up_number: String,
            email: String,
            name: String,
        }

        let rows = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT call_up_number, email, name FROM members
            WHERE call_up_number = ANY($1)
               OR substring(call_up_number FROM '[0-9]+') = ANY($2)
               OR lower(email) = ANY($3)
               OR name = ANY($4)
            "#,
        )
        .bind(&keys.call_ups)
        .bind(&keys.call_up_digits)
        .bind(&keys.emails)
        .bind(&keys.names)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut matches = ExistingMatches::default();
        for row in rows {
            matches.add(&row.call_up_number, &row.email, &row.name);
        }
        Ok(matches)
    }

    async fn insert_raw(&self, member: &NewMember) -> Result<Uuid, StoreError> {
        self.insert(member).await
    }

    async fn insert_validated(&self, member: &NewMember) -> Result<Uuid, StoreError> {
        schema_validate(member)?;
        self.insert(member).await
    }

    async fn find_pending(
        &self,
        ids: Option<&[Uuid]>,
        force_resend: bool,
    ) -> Result<Vec<PendingMember>, StoreError> {
        sqlx::query_as::<_, PendingMember>(
            r#"
            SELECT id, name, full_name, email,
                   activation_token, activation_token_expires_at
            FROM members
            WHERE is_active = FALSE
              AND email <> ''
              AND ($1::uuid[] IS NULL OR id = ANY($1))
              AND ($2::bool OR invitation_sent = FALSE)
            ORDER BY created_at
            "#,
        )
        .bind(ids.map(|s| s.to_vec()))
        .bind(force_resend)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn set_activation_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE members
            SET activation_token = $1, activation_token_expires_at = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn record_dispatch_outcome(
        &self,
        id: Uuid,
        invitation_sent: bool,
        last_error: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE members SET invitation_sent = $1, last_error = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(invitation_sent)
        .bind(last_error)
        .bind(now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn stats(&self) -> Result<MemberStats, StoreError> {
        let (total, active, inactive, invites_sent, pending_invites, legacy_numeric) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
                r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE is_active),
                       COUNT(*) FILTER (WHERE NOT is_active),
                       COUNT(*) FILTER (WHERE invitation_sent),
                       COUNT(*) FILTER (WHERE NOT is_active AND NOT invitation_sent),
                       COUNT(*) FILTER (WHERE call_up_number ~ '^[0-9]+$')
                FROM members
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(MemberStats {
            total,
            active,
            inactive,
            invites_sent,
            pending_invites,
            legacy_numeric,
        })
    }

    async fn find_by_activation_token(
        &self,
        token: &str,
        now_millis: i64,
    ) -> Result<Option<Member>, StoreError> {
        sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, call_up_number, legacy_id, name, full_name, email,
                   elevation_year, debit_balance, is_active,
                   activation_token, activation_token_expires_at,
                   invitation_sent, last_error, hashed_password, role,
                   created_at, updated_at
            FROM members
            WHERE activation_token = $1 AND activation_token_expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now_millis)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)
        .map(|row| row.map(Member::from))
    }

    async fn activate(&self, id: Uuid, hashed_password: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE members
            SET is_active = TRUE,
                hashed_password = $1,
                activation_token = NULL,
                activation_token_expires_at = NULL,
                updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(hashed_password)
        .bind(now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// Row as stored; `role` is TEXT in the schema.
#[derive(FromRow)]
struct MemberRow {
    id: Uuid,
    call_up_number: String,
    legacy_id: Option<String>,
    name: String,
    full_name: String,
    email: String,
    elevation_year: Option<i32>,
    debit_balance: f64,
    is_active: bool,
    activation_token: Option<String>,
    activation_token_expires_at: Option<i64>,
    invitation_sent: bool,
    last_error: String,
    hashed_password: Option<String>,
    role: String,
    created_at: i64,
    updated_at: i64,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            id: row.id,
            call_up_number: row.call_up_number,
            legacy_id: row.legacy_id,
            name: row.name,
            full_name: row.full_name,
            email: row.email,
            elevation_year: row.elevation_year,
            debit_balance: row.debit_balance,
            is_active: row.is_active,
            activation_token: row.activation_token,
            activation_token_expires_at: row.activation_token_expires_at,
            invitation_sent: row.invitation_sent,
            last_error: row.last_error,
            hashed_password: row.hashed_password,
            role: Role::from_str_or_default(&row.role),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(friendly_conflict(db.constraint()));
        }
    }
    StoreError::Unavailable(err.to_string())
}

/// Map a unique-constraint name to the message shown in import reports.
fn friendly_conflict(constraint: Option<&str>) -> String {
    match constraint {
        Some("members_call_up_number_key") => {
            "Call-up Number already exists in the database".into()
        }
        Some("members_email_key") => "Email already exists in the database".into(),
        Some("members_name_key") => "Name already exists in the database".into(),
        _ => "Duplicate entry".into(),
    }
}

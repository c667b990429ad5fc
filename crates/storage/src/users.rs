use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use rentdesk_core::payload::{StaffPatch, UserDraft, ValidationError};
use rentdesk_core::types::{
    Branch, Coordinates, StaffMember, UnknownVariant, UserAccount, UserRole, UserStatus,
};

use crate::{constraint_violation, new_id, to_rfc3339, BranchRepository, Constraint};

const MEMBER_SELECT: &str = r#"
SELECT u.id,
       u.first_name,
       u.last_name,
       u.email,
       u.phone_number,
       u.role,
       u.status,
       u.created_at,
       u.updated_at,
       b.id AS branch_id,
       b.name AS branch_name,
       b.address AS branch_address,
       b.city AS branch_city,
       b.contact_number AS branch_contact_number,
       b.email AS branch_email,
       b.latitude AS branch_latitude,
       b.longitude AS branch_longitude,
       b.created_at AS branch_created_at,
       b.updated_at AS branch_updated_at
  FROM users AS u
  LEFT JOIN branches AS b ON b.id = u.branch_id
"#;

/// Repository for user accounts. Staff operations are scoped to `role = 'staff'`.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a user with the given role and pre-hashed password.
    pub async fn insert(
        &self,
        draft: &UserDraft,
        role: UserRole,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<StaffMember, UserError> {
        self.ensure_branch(draft.branch_id.as_deref()).await?;

        let id = new_id();
        sqlx::query(
            "INSERT INTO users \
             (id, first_name, last_name, email, password_hash, phone_number, role, status, branch_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(password_hash)
        .bind(&draft.phone_number)
        .bind(role.as_str())
        .bind(draft.status.as_str())
        .bind(&draft.branch_id)
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.fetch_member(&id, None).await
    }

    /// Looks up credentials for a login attempt.
    pub async fn find_account_by_email(
        &self,
        email: &str,
        role: UserRole,
    ) -> Result<Option<UserAccount>, UserError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, first_name, last_name, email, password_hash, role, status, branch_id \
             FROM users WHERE email = ? AND role = ?",
        )
        .bind(email.trim().to_lowercase())
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserAccount::try_from).transpose()
    }

    /// Loads the account behind an access token subject.
    pub async fn fetch_account(&self, id: &str) -> Result<Option<UserAccount>, UserError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, first_name, last_name, email, password_hash, role, status, branch_id \
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserAccount::try_from).transpose()
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, UserError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Lists staff members with their branch populated, newest first.
    pub async fn list_staff(&self) -> Result<Vec<StaffMember>, UserError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "{MEMBER_SELECT} WHERE u.role = 'staff' ORDER BY u.created_at DESC, u.last_name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(StaffMember::try_from).collect()
    }

    pub async fn fetch_staff(&self, id: &str) -> Result<StaffMember, UserError> {
        self.fetch_member(id, Some(UserRole::Staff)).await
    }

    async fn fetch_member(
        &self,
        id: &str,
        role: Option<UserRole>,
    ) -> Result<StaffMember, UserError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "{MEMBER_SELECT} WHERE u.id = ? AND (? IS NULL OR u.role = ?)"
        ))
        .bind(id)
        .bind(role.map(UserRole::as_str))
        .bind(role.map(UserRole::as_str))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(UserError::NotFound)?;
        StaffMember::try_from(row)
    }

    /// Applies a partial update to a staff member. The role never changes.
    pub async fn update_staff(
        &self,
        id: &str,
        patch: StaffPatch,
        password_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StaffMember, UserError> {
        let current = self.fetch_staff(id).await?;
        let mut draft = UserDraft {
            first_name: current.first_name,
            last_name: current.last_name,
            email: current.email,
            phone_number: current.phone_number,
            branch_id: current.branch.map(|b| b.id),
            status: current.status,
        };
        patch.apply(&mut draft)?;
        self.ensure_branch(draft.branch_id.as_deref()).await?;

        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, email = ?, phone_number = ?, \
             branch_id = ?, status = ?, password_hash = COALESCE(?, password_hash), updated_at = ? \
             WHERE id = ? AND role = 'staff'",
        )
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.phone_number)
        .bind(&draft.branch_id)
        .bind(draft.status.as_str())
        .bind(password_hash)
        .bind(to_rfc3339(now))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        self.fetch_staff(id).await
    }

    pub async fn delete_staff(&self, id: &str) -> Result<(), UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ? AND role = 'staff'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match constraint_violation(&err) {
                Some(Constraint::ForeignKey) => UserError::InUse,
                _ => UserError::Database(err),
            })?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }
}

impl UserRepository {
    async fn ensure_branch(&self, branch_id: Option<&str>) -> Result<(), UserError> {
        let Some(branch_id) = branch_id else {
            return Ok(());
        };
        if BranchRepository::new(self.pool.clone()).exists(branch_id).await? {
            Ok(())
        } else {
            Err(UserError::UnknownBranch)
        }
    }
}

fn map_write_error(err: sqlx::Error) -> UserError {
    match constraint_violation(&err) {
        Some(Constraint::Unique) => UserError::DuplicateEmail,
        Some(Constraint::ForeignKey) => UserError::UnknownBranch,
        None => UserError::Database(err),
    }
}

fn decode<T: std::str::FromStr<Err = UnknownVariant>>(value: &str) -> Result<T, UserError> {
    value
        .parse()
        .map_err(|err: UnknownVariant| UserError::Corrupt(err.to_string()))
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    role: String,
    status: String,
    branch_id: Option<String>,
}

impl TryFrom<AccountRow> for UserAccount {
    type Error = UserError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: decode(&row.role)?,
            status: decode(&row.status)?,
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            branch_id: row.branch_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone_number: Option<String>,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    branch_id: Option<String>,
    branch_name: Option<String>,
    branch_address: Option<String>,
    branch_city: Option<String>,
    branch_contact_number: Option<String>,
    branch_email: Option<String>,
    branch_latitude: Option<f64>,
    branch_longitude: Option<f64>,
    branch_created_at: Option<DateTime<Utc>>,
    branch_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<MemberRow> for StaffMember {
    type Error = UserError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let branch = match (
            row.branch_id,
            row.branch_name,
            row.branch_address,
            row.branch_city,
            row.branch_contact_number,
            row.branch_email,
            row.branch_created_at,
            row.branch_updated_at,
        ) {
            (
                Some(id),
                Some(name),
                Some(address),
                Some(city),
                Some(contact_number),
                Some(email),
                Some(created_at),
                Some(updated_at),
            ) => Some(Branch {
                id,
                name,
                address,
                city,
                contact_number,
                email,
                coordinates: row
                    .branch_latitude
                    .zip(row.branch_longitude)
                    .map(|(latitude, longitude)| Coordinates {
                        latitude,
                        longitude,
                    }),
                created_at,
                updated_at,
            }),
            _ => None,
        };

        Ok(Self {
            role: decode(&row.role)?,
            status: decode::<UserStatus>(&row.status)?,
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone_number: row.phone_number,
            branch,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Staff member not found")]
    NotFound,
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("branch does not exist")]
    UnknownBranch,
    #[error("user still has bookings on record")]
    InUse,
    #[error("stored user row is invalid: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use shared::{
    domain::{MemberId, MemberStatus, Role, SocietyId},
    protocol::ResidentPatch,
};

use crate::{is_unique_violation, Storage};

const MEMBER_COLUMNS: &str =
    "id, full_name, mobile_number, email, flat_number, role, society_id, status, created_at";

#[derive(Debug, Clone)]
pub struct StoredMember {
    pub member_id: MemberId,
    pub full_name: String,
    pub mobile_number: String,
    pub email: Option<String>,
    pub flat_number: String,
    pub role: Role,
    pub society_id: Option<SocietyId>,
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMember<'a> {
    pub full_name: &'a str,
    pub mobile_number: &'a str,
    pub flat_number: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub society_id: Option<SocietyId>,
}

#[derive(Debug, Clone)]
pub enum MemberInsert {
    Created(StoredMember),
    /// Another pending or active member already owns the mobile number.
    MobileTaken,
}

#[derive(Debug, Clone)]
pub struct LoginRecord {
    pub member: StoredMember,
    pub password_hash: String,
}

impl Storage {
    pub async fn create_member(
        &self,
        new_member: &NewMember<'_>,
        status: MemberStatus,
    ) -> Result<MemberInsert> {
        let sql = format!(
            "INSERT INTO members (full_name, mobile_number, flat_number, password_hash, role, society_id, status)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {MEMBER_COLUMNS}"
        );
        let inserted = sqlx::query(&sql)
            .bind(new_member.full_name)
            .bind(new_member.mobile_number)
            .bind(new_member.flat_number)
            .bind(new_member.password_hash)
            .bind(new_member.role.as_str())
            .bind(new_member.society_id.map(|id| id.0))
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await;

        match inserted {
            Ok(row) => Ok(MemberInsert::Created(member_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(MemberInsert::MobileTaken),
            Err(err) => Err(err).context("failed to insert member"),
        }
    }

    pub async fn member(&self, member_id: MemberId) -> Result<Option<StoredMember>> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(member_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(member_from_row).transpose()
    }

    pub async fn find_member_by_mobile(
        &self,
        mobile_number: &str,
        status: MemberStatus,
    ) -> Result<Option<StoredMember>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members
             WHERE mobile_number = ? AND status = ?
             ORDER BY id DESC
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(mobile_number)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(member_from_row).transpose()
    }

    /// Loads the live member for a mobile number together with its
    /// credential hash. Rejected rows are never returned.
    pub async fn login_record(&self, mobile_number: &str) -> Result<Option<LoginRecord>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS}, password_hash FROM members
             WHERE mobile_number = ? AND status IN ('pending', 'active')"
        );
        let row = sqlx::query(&sql)
            .bind(mobile_number)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(LoginRecord {
                member: member_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })
        })
        .transpose()
    }

    pub async fn list_applicants(&self, society_id: SocietyId) -> Result<Vec<StoredMember>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members
             WHERE society_id = ? AND status = 'pending'
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(society_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(member_from_row).collect()
    }

    pub async fn list_residents(&self, society_id: SocietyId) -> Result<Vec<StoredMember>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members
             WHERE society_id = ? AND status = 'active'
             ORDER BY lower(full_name) ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(society_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(member_from_row).collect()
    }

    /// Promotes a pending applicant of `society_id` to an active resident in
    /// one guarded statement. Returns `None` when no such applicant exists,
    /// including when it was already admitted or rejected.
    pub async fn admit_applicant(
        &self,
        applicant_id: MemberId,
        society_id: SocietyId,
    ) -> Result<Option<StoredMember>> {
        let sql = format!(
            "UPDATE members
             SET status = 'active', updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND society_id = ? AND status = 'pending'
             RETURNING {MEMBER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(applicant_id.0)
            .bind(society_id.0)
            .fetch_optional(&self.pool)
            .await
            .context("failed to admit applicant")?;
        row.as_ref().map(member_from_row).transpose()
    }

    pub async fn reject_applicant(
        &self,
        applicant_id: MemberId,
        society_id: SocietyId,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE members
             SET status = 'rejected', updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND society_id = ? AND status = 'pending'",
        )
        .bind(applicant_id.0)
        .bind(society_id.0)
        .execute(&self.pool)
        .await
        .context("failed to reject applicant")?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn update_resident(
        &self,
        resident_id: MemberId,
        society_id: SocietyId,
        patch: &ResidentPatch,
    ) -> Result<Option<StoredMember>> {
        let sql = format!(
            "UPDATE members
             SET full_name = COALESCE(?, full_name),
                 email = COALESCE(?, email),
                 flat_number = COALESCE(?, flat_number),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND society_id = ? AND status = 'active'
             RETURNING {MEMBER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(patch.full_name.as_deref())
            .bind(patch.email.as_deref())
            .bind(patch.flat_number.as_deref())
            .bind(resident_id.0)
            .bind(society_id.0)
            .fetch_optional(&self.pool)
            .await
            .context("failed to update resident")?;
        row.as_ref().map(member_from_row).transpose()
    }
}

pub(crate) fn member_from_row(row: &SqliteRow) -> Result<StoredMember> {
    Ok(StoredMember {
        member_id: MemberId(row.try_get("id")?),
        full_name: row.try_get("full_name")?,
        mobile_number: row.try_get("mobile_number")?,
        email: row.try_get("email")?,
        flat_number: row.try_get("flat_number")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        society_id: row.try_get::<Option<i64>, _>("society_id")?.map(SocietyId),
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

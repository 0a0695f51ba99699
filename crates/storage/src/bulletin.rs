use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use shared::{
    domain::{ComplaintId, ComplaintStatus, MemberId, NoticeId, SocietyId},
    protocol::ComplaintPatch,
};

use crate::Storage;

const NOTICE_COLUMNS: &str = "id, society_id, title, content, posted_by, created_at, updated_at";
const COMPLAINT_COLUMNS: &str = "id, resident_id, society_id, category, subject, description, \
     preferred_time, urgent, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct StoredNotice {
    pub notice_id: NoticeId,
    pub society_id: SocietyId,
    pub title: String,
    pub content: String,
    pub posted_by: MemberId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredComplaint {
    pub complaint_id: ComplaintId,
    pub resident_id: MemberId,
    pub society_id: SocietyId,
    pub category: String,
    pub subject: String,
    pub description: String,
    pub preferred_time: Option<String>,
    pub urgent: bool,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComplaint<'a> {
    pub resident_id: MemberId,
    pub society_id: SocietyId,
    pub category: &'a str,
    pub subject: &'a str,
    pub description: &'a str,
    pub preferred_time: Option<&'a str>,
    pub urgent: bool,
}

impl Storage {
    pub async fn create_notice(
        &self,
        society_id: SocietyId,
        posted_by: MemberId,
        title: &str,
        content: &str,
    ) -> Result<StoredNotice> {
        let sql = format!(
            "INSERT INTO notices (society_id, title, content, posted_by)
             VALUES (?, ?, ?, ?)
             RETURNING {NOTICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(society_id.0)
            .bind(title)
            .bind(content)
            .bind(posted_by.0)
            .fetch_one(&self.pool)
            .await
            .context("failed to insert notice")?;
        notice_from_row(&row)
    }

    pub async fn notice(&self, notice_id: NoticeId) -> Result<Option<StoredNotice>> {
        let sql = format!("SELECT {NOTICE_COLUMNS} FROM notices WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(notice_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(notice_from_row).transpose()
    }

    pub async fn list_notices(&self, society_id: SocietyId) -> Result<Vec<StoredNotice>> {
        let sql = format!(
            "SELECT {NOTICE_COLUMNS} FROM notices
             WHERE society_id = ?
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(society_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(notice_from_row).collect()
    }

    pub async fn update_notice(
        &self,
        notice_id: NoticeId,
        society_id: SocietyId,
        title: &str,
        content: &str,
    ) -> Result<Option<StoredNotice>> {
        let sql = format!(
            "UPDATE notices
             SET title = ?, content = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND society_id = ?
             RETURNING {NOTICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(title)
            .bind(content)
            .bind(notice_id.0)
            .bind(society_id.0)
            .fetch_optional(&self.pool)
            .await
            .context("failed to update notice")?;
        row.as_ref().map(notice_from_row).transpose()
    }

    pub async fn delete_notice(&self, notice_id: NoticeId, society_id: SocietyId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM notices WHERE id = ? AND society_id = ?")
            .bind(notice_id.0)
            .bind(society_id.0)
            .execute(&self.pool)
            .await
            .context("failed to delete notice")?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn create_complaint(&self, complaint: &NewComplaint<'_>) -> Result<StoredComplaint> {
        let sql = format!(
            "INSERT INTO complaints
                (resident_id, society_id, category, subject, description, preferred_time, urgent)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {COMPLAINT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(complaint.resident_id.0)
            .bind(complaint.society_id.0)
            .bind(complaint.category)
            .bind(complaint.subject)
            .bind(complaint.description)
            .bind(complaint.preferred_time)
            .bind(complaint.urgent)
            .fetch_one(&self.pool)
            .await
            .context("failed to insert complaint")?;
        complaint_from_row(&row)
    }

    pub async fn complaint(&self, complaint_id: ComplaintId) -> Result<Option<StoredComplaint>> {
        let sql = format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(complaint_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(complaint_from_row).transpose()
    }

    /// Lists a society's complaints, newest first. `resident_id` narrows the
    /// list to one author.
    pub async fn list_complaints(
        &self,
        society_id: SocietyId,
        resident_id: Option<MemberId>,
    ) -> Result<Vec<StoredComplaint>> {
        let sql = format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints
             WHERE society_id = ? AND (? IS NULL OR resident_id = ?)
             ORDER BY created_at DESC, id DESC"
        );
        let author = resident_id.map(|id| id.0);
        let rows = sqlx::query(&sql)
            .bind(society_id.0)
            .bind(author)
            .bind(author)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(complaint_from_row).collect()
    }

    pub async fn update_complaint(
        &self,
        complaint_id: ComplaintId,
        patch: &ComplaintPatch,
    ) -> Result<Option<StoredComplaint>> {
        let sql = format!(
            "UPDATE complaints
             SET category = COALESCE(?, category),
                 subject = COALESCE(?, subject),
                 description = COALESCE(?, description),
                 preferred_time = COALESCE(?, preferred_time),
                 urgent = COALESCE(?, urgent),
                 status = COALESCE(?, status),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?
             RETURNING {COMPLAINT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(patch.category.as_deref())
            .bind(patch.subject.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.preferred_time.as_deref())
            .bind(patch.urgent)
            .bind(patch.status.map(ComplaintStatus::as_str))
            .bind(complaint_id.0)
            .fetch_optional(&self.pool)
            .await
            .context("failed to update complaint")?;
        row.as_ref().map(complaint_from_row).transpose()
    }

    pub async fn delete_complaint(&self, complaint_id: ComplaintId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM complaints WHERE id = ?")
            .bind(complaint_id.0)
            .execute(&self.pool)
            .await
            .context("failed to delete complaint")?
            .rows_affected();
        Ok(deleted > 0)
    }
}

fn notice_from_row(row: &SqliteRow) -> Result<StoredNotice> {
    Ok(StoredNotice {
        notice_id: NoticeId(row.try_get("id")?),
        society_id: SocietyId(row.try_get("society_id")?),
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        posted_by: MemberId(row.try_get("posted_by")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn complaint_from_row(row: &SqliteRow) -> Result<StoredComplaint> {
    Ok(StoredComplaint {
        complaint_id: ComplaintId(row.try_get("id")?),
        resident_id: MemberId(row.try_get("resident_id")?),
        society_id: SocietyId(row.try_get("society_id")?),
        category: row.try_get("category")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        preferred_time: row.try_get("preferred_time")?,
        urgent: row.try_get("urgent")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
#[path = "tests/bulletin_tests.rs"]
mod tests;

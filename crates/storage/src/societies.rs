use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteRow, Row, Sqlite};

use shared::domain::{AmenityId, BillingCycle, MemberId, SocietyId};

use crate::Storage;

const SOCIETY_COLUMNS: &str =
    "id, name, address, city, pincode, registration_number, upi_id, secretary_id";

#[derive(Debug, Clone)]
pub struct StoredSociety {
    pub society_id: SocietyId,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
    pub registration_number: Option<String>,
    pub upi_id: Option<String>,
    pub secretary_id: MemberId,
}

#[derive(Debug, Clone, Default)]
pub struct SocietyDetails<'a> {
    pub name: Option<&'a str>,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    pub pincode: Option<&'a str>,
    pub registration_number: Option<&'a str>,
    pub upi_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct StoredMaintenance {
    pub society_id: SocietyId,
    pub amount: Option<i64>,
    pub billing_cycle: Option<BillingCycle>,
    pub due_day: Option<u8>,
    pub upi_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceDraft<'a> {
    pub amount: Option<i64>,
    pub billing_cycle: Option<BillingCycle>,
    pub due_day: Option<u8>,
    pub upi_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct StoredAmenity {
    pub amenity_id: AmenityId,
    pub society_id: SocietyId,
    pub name: String,
    pub allowed_days: Vec<String>,
    pub time_slots: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewAmenity {
    pub name: String,
    pub allowed_days: Vec<String>,
    pub time_slots: Vec<String>,
}

/// Everything the setup evaluator looks at, read in one transaction.
#[derive(Debug, Clone)]
pub struct SetupSnapshot {
    pub society: StoredSociety,
    pub maintenance: Option<StoredMaintenance>,
    pub amenities: Vec<StoredAmenity>,
}

impl Storage {
    /// Creates or updates the society owned by `secretary_id` and points the
    /// secretary's member row at it. Both writes commit together.
    pub async fn upsert_society_for_secretary(
        &self,
        secretary_id: MemberId,
        details: &SocietyDetails<'_>,
    ) -> Result<StoredSociety> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO societies (name, address, city, pincode, registration_number, upi_id, secretary_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(secretary_id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                city = excluded.city,
                pincode = excluded.pincode,
                registration_number = excluded.registration_number,
                upi_id = excluded.upi_id,
                updated_at = CURRENT_TIMESTAMP
             RETURNING {SOCIETY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(details.name)
            .bind(details.address)
            .bind(details.city)
            .bind(details.pincode)
            .bind(details.registration_number)
            .bind(details.upi_id)
            .bind(secretary_id.0)
            .fetch_one(&mut *tx)
            .await
            .context("failed to upsert society")?;
        let society = society_from_row(&row)?;

        sqlx::query(
            "UPDATE members SET society_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(society.society_id.0)
        .bind(secretary_id.0)
        .execute(&mut *tx)
        .await
        .context("failed to attach secretary to society")?;

        tx.commit().await?;
        Ok(society)
    }

    pub async fn society(&self, society_id: SocietyId) -> Result<Option<StoredSociety>> {
        let sql = format!("SELECT {SOCIETY_COLUMNS} FROM societies WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(society_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(society_from_row).transpose()
    }

    pub async fn society_for_secretary(
        &self,
        secretary_id: MemberId,
    ) -> Result<Option<StoredSociety>> {
        let sql = format!("SELECT {SOCIETY_COLUMNS} FROM societies WHERE secretary_id = ?");
        let row = sqlx::query(&sql)
            .bind(secretary_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(society_from_row).transpose()
    }

    pub async fn list_societies(&self) -> Result<Vec<StoredSociety>> {
        let sql = format!("SELECT {SOCIETY_COLUMNS} FROM societies ORDER BY id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(society_from_row).collect()
    }

    pub async fn upsert_maintenance(
        &self,
        society_id: SocietyId,
        draft: &MaintenanceDraft<'_>,
    ) -> Result<StoredMaintenance> {
        let row = sqlx::query(
            "INSERT INTO maintenance_settings (society_id, amount, billing_cycle, due_day, upi_id)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(society_id) DO UPDATE SET
                amount = excluded.amount,
                billing_cycle = excluded.billing_cycle,
                due_day = excluded.due_day,
                upi_id = excluded.upi_id,
                updated_at = CURRENT_TIMESTAMP
             RETURNING society_id, amount, billing_cycle, due_day, upi_id",
        )
        .bind(society_id.0)
        .bind(draft.amount)
        .bind(draft.billing_cycle.map(BillingCycle::as_str))
        .bind(draft.due_day.map(i64::from))
        .bind(draft.upi_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to upsert maintenance settings")?;
        maintenance_from_row(&row)
    }

    pub async fn maintenance(&self, society_id: SocietyId) -> Result<Option<StoredMaintenance>> {
        let row = sqlx::query(
            "SELECT society_id, amount, billing_cycle, due_day, upi_id
             FROM maintenance_settings
             WHERE society_id = ?",
        )
        .bind(society_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(maintenance_from_row).transpose()
    }

    /// Replaces the amenity set of a society in one transaction.
    pub async fn replace_amenities(
        &self,
        society_id: SocietyId,
        amenities: &[NewAmenity],
    ) -> Result<Vec<StoredAmenity>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM amenities WHERE society_id = ?")
            .bind(society_id.0)
            .execute(&mut *tx)
            .await
            .context("failed to clear amenities")?;

        let mut stored = Vec::with_capacity(amenities.len());
        for amenity in amenities {
            let row = sqlx::query(
                "INSERT INTO amenities (society_id, name, allowed_days, time_slots)
                 VALUES (?, ?, ?, ?)
                 RETURNING id, society_id, name, allowed_days, time_slots",
            )
            .bind(society_id.0)
            .bind(&amenity.name)
            .bind(serde_json::to_string(&amenity.allowed_days)?)
            .bind(serde_json::to_string(&amenity.time_slots)?)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("failed to insert amenity '{}'", amenity.name))?;
            stored.push(amenity_from_row(&row)?);
        }

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn list_amenities(&self, society_id: SocietyId) -> Result<Vec<StoredAmenity>> {
        amenities_for(&self.pool, society_id).await
    }

    /// Reads the secretary's society, its maintenance settings (left join) and
    /// its amenities from a single transaction so the three views agree.
    pub async fn setup_snapshot(&self, secretary_id: MemberId) -> Result<Option<SetupSnapshot>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT s.id, s.name, s.address, s.city, s.pincode, s.registration_number, s.upi_id,
                    s.secretary_id,
                    ms.society_id AS ms_society_id, ms.amount, ms.billing_cycle, ms.due_day,
                    ms.upi_id AS ms_upi_id
             FROM societies s
             LEFT JOIN maintenance_settings ms ON ms.society_id = s.id
             WHERE s.secretary_id = ?",
        )
        .bind(secretary_id.0)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to load society for setup status")?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let society = society_from_row(&row)?;
        let maintenance = match row.try_get::<Option<i64>, _>("ms_society_id")? {
            Some(_) => Some(StoredMaintenance {
                society_id: society.society_id,
                amount: row.try_get("amount")?,
                billing_cycle: parse_billing_cycle(row.try_get("billing_cycle")?)?,
                due_day: due_day_from(row.try_get("due_day")?)?,
                upi_id: row.try_get("ms_upi_id")?,
            }),
            None => None,
        };
        let amenities = amenities_for(&mut *tx, society.society_id).await?;

        tx.commit().await?;
        Ok(Some(SetupSnapshot {
            society,
            maintenance,
            amenities,
        }))
    }
}

async fn amenities_for<'e, E>(executor: E, society_id: SocietyId) -> Result<Vec<StoredAmenity>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, society_id, name, allowed_days, time_slots
         FROM amenities
         WHERE society_id = ?
         ORDER BY id ASC",
    )
    .bind(society_id.0)
    .fetch_all(executor)
    .await
    .context("failed to load amenities")?;
    rows.iter().map(amenity_from_row).collect()
}

fn society_from_row(row: &SqliteRow) -> Result<StoredSociety> {
    Ok(StoredSociety {
        society_id: SocietyId(row.try_get("id")?),
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        pincode: row.try_get("pincode")?,
        registration_number: row.try_get("registration_number")?,
        upi_id: row.try_get("upi_id")?,
        secretary_id: MemberId(row.try_get("secretary_id")?),
    })
}

fn maintenance_from_row(row: &SqliteRow) -> Result<StoredMaintenance> {
    Ok(StoredMaintenance {
        society_id: SocietyId(row.try_get("society_id")?),
        amount: row.try_get("amount")?,
        billing_cycle: parse_billing_cycle(row.try_get("billing_cycle")?)?,
        due_day: due_day_from(row.try_get("due_day")?)?,
        upi_id: row.try_get("upi_id")?,
    })
}

fn amenity_from_row(row: &SqliteRow) -> Result<StoredAmenity> {
    let allowed_days: String = row.try_get("allowed_days")?;
    let time_slots: String = row.try_get("time_slots")?;
    Ok(StoredAmenity {
        amenity_id: AmenityId(row.try_get("id")?),
        society_id: SocietyId(row.try_get("society_id")?),
        name: row.try_get("name")?,
        allowed_days: serde_json::from_str(&allowed_days)
            .context("amenity allowed_days is not a JSON array")?,
        time_slots: serde_json::from_str(&time_slots)
            .context("amenity time_slots is not a JSON array")?,
    })
}

fn parse_billing_cycle(raw: Option<String>) -> Result<Option<BillingCycle>> {
    Ok(raw.map(|value| value.parse()).transpose()?)
}

fn due_day_from(raw: Option<i64>) -> Result<Option<u8>> {
    raw.map(|day| u8::try_from(day).with_context(|| format!("due day {day} out of range")))
        .transpose()
}

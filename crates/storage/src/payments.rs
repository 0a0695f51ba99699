use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite};

use shared::domain::{MemberId, PaymentId, PaymentStatus, SocietyId};

use crate::{is_unique_violation, Storage};

const PAYMENT_COLUMNS: &str =
    "id, resident_id, society_id, amount, billing_period, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct StoredPayment {
    pub payment_id: PaymentId,
    pub resident_id: MemberId,
    pub society_id: SocietyId,
    pub amount: i64,
    pub billing_period: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PendingPaymentRow {
    pub payment: StoredPayment,
    pub full_name: String,
    pub flat_number: String,
}

#[derive(Debug, Clone)]
pub enum PaymentInitiation {
    Created(StoredPayment),
    /// The resident already has a pending or successful payment for the
    /// period; nothing was written.
    AlreadyActive(StoredPayment),
}

#[derive(Debug, Clone)]
pub enum PaymentTransition {
    Applied(StoredPayment),
    Missing,
    /// The payment already left `pending_verification`; the row is unchanged.
    AlreadyTerminal(StoredPayment),
}

impl Storage {
    /// Inserts a `pending_verification` payment unless an active one exists
    /// for the same resident and period.
    ///
    /// The insert is the first statement, so concurrent callers serialize on
    /// the `payments_active_period` partial unique index rather than on a
    /// read-then-write race. A loser reads back the row that beat it.
    pub async fn initiate_payment(
        &self,
        resident_id: MemberId,
        society_id: SocietyId,
        amount: i64,
        billing_period: &str,
    ) -> Result<PaymentInitiation> {
        // A second attempt covers the window where the winning row turns
        // `failed` between our insert and our read-back.
        for _ in 0..2 {
            let sql = format!(
                "INSERT INTO payments (resident_id, society_id, amount, billing_period, status)
                 VALUES (?, ?, ?, ?, 'pending_verification')
                 RETURNING {PAYMENT_COLUMNS}"
            );
            let inserted = sqlx::query(&sql)
                .bind(resident_id.0)
                .bind(society_id.0)
                .bind(amount)
                .bind(billing_period)
                .fetch_one(&self.pool)
                .await;

            match inserted {
                Ok(row) => return Ok(PaymentInitiation::Created(payment_from_row(&row)?)),
                Err(err) if is_unique_violation(&err) => {
                    if let Some(existing) =
                        active_payment(&self.pool, resident_id, billing_period).await?
                    {
                        return Ok(PaymentInitiation::AlreadyActive(existing));
                    }
                }
                Err(err) => return Err(err).context("failed to insert payment"),
            }
        }

        // Reachable only if active rows for this key were created and failed
        // again inside both read-back windows; callers see a storage failure.
        bail!("payment for resident {resident_id} period '{billing_period}' kept conflicting")
    }

    /// Moves a payment out of `pending_verification`. The guarded update and
    /// the read that explains a miss share one transaction.
    pub async fn set_payment_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentTransition> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE payments
             SET status = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND status = 'pending_verification'
             RETURNING {PAYMENT_COLUMNS}"
        );
        let updated = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(payment_id.0)
            .fetch_optional(&mut *tx)
            .await
            .context("failed to update payment status")?;

        if let Some(row) = updated {
            let payment = payment_from_row(&row)?;
            tx.commit().await?;
            return Ok(PaymentTransition::Applied(payment));
        }

        let current = payment_by_id(&mut *tx, payment_id).await?;
        tx.rollback().await?;
        Ok(match current {
            Some(payment) => PaymentTransition::AlreadyTerminal(payment),
            None => PaymentTransition::Missing,
        })
    }

    pub async fn payment(&self, payment_id: PaymentId) -> Result<Option<StoredPayment>> {
        payment_by_id(&self.pool, payment_id).await
    }

    pub async fn active_payment(
        &self,
        resident_id: MemberId,
        billing_period: &str,
    ) -> Result<Option<StoredPayment>> {
        active_payment(&self.pool, resident_id, billing_period).await
    }

    pub async fn pending_payments_for_society(
        &self,
        society_id: SocietyId,
    ) -> Result<Vec<PendingPaymentRow>> {
        let rows = sqlx::query(
            "SELECT p.id, p.resident_id, p.society_id, p.amount, p.billing_period, p.status,
                    p.created_at, p.updated_at, m.full_name, m.flat_number
             FROM payments p
             INNER JOIN members m ON m.id = p.resident_id
             WHERE p.society_id = ? AND p.status = 'pending_verification'
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .bind(society_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PendingPaymentRow {
                    payment: payment_from_row(row)?,
                    full_name: row.try_get("full_name")?,
                    flat_number: row.try_get("flat_number")?,
                })
            })
            .collect()
    }

    pub async fn payment_history(&self, resident_id: MemberId) -> Result<Vec<StoredPayment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE resident_id = ?
             ORDER BY billing_period DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(resident_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(payment_from_row).collect()
    }
}

async fn payment_by_id<'e, E>(executor: E, payment_id: PaymentId) -> Result<Option<StoredPayment>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(payment_id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(payment_from_row).transpose()
}

async fn active_payment<'e, E>(
    executor: E,
    resident_id: MemberId,
    billing_period: &str,
) -> Result<Option<StoredPayment>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE resident_id = ? AND billing_period = ?
           AND status IN ('pending_verification', 'success')"
    );
    let row = sqlx::query(&sql)
        .bind(resident_id.0)
        .bind(billing_period)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(payment_from_row).transpose()
}

fn payment_from_row(row: &SqliteRow) -> Result<StoredPayment> {
    Ok(StoredPayment {
        payment_id: PaymentId(row.try_get("id")?),
        resident_id: MemberId(row.try_get("resident_id")?),
        society_id: SocietyId(row.try_get("society_id")?),
        amount: row.try_get("amount")?,
        billing_period: row.try_get("billing_period")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
#[path = "tests/payments_tests.rs"]
mod tests;

use serde_json::json;
use shared::{
    domain::{MemberId, PaymentId, PaymentStatus},
    error::{ApiError, ErrorCode},
    protocol::{InitiatePaymentRequest, PaymentView, PendingPaymentView},
};
use storage::{PaymentInitiation, PaymentTransition, PendingPaymentRow, StoredPayment};
use tracing::info;

use crate::{
    internal, require_member_of, require_secretary_of, required, secretary_society, Actor,
    ApiContext,
};

/// Opens a `pending_verification` payment for the caller's own billing
/// period. While a pending or successful payment exists for the same period
/// the call is a `Conflict` naming that payment's status.
pub async fn initiate_payment(
    ctx: &ApiContext,
    actor: &Actor,
    req: &InitiatePaymentRequest,
) -> Result<PaymentView, ApiError> {
    let period = required(&req.period, "period")?;
    if req.amount <= 0 {
        return Err(ApiError::validation("amount must be greater than zero"));
    }
    if req.resident_id != actor.member_id {
        return Err(ApiError::unauthorized(
            "payments can only be initiated for the caller",
        ));
    }
    require_member_of(actor, req.society_id)?;

    match ctx
        .storage
        .initiate_payment(req.resident_id, req.society_id, req.amount, period)
        .await
        .map_err(internal)?
    {
        PaymentInitiation::Created(payment) => {
            info!(
                payment_id = %payment.payment_id,
                resident_id = %payment.resident_id,
                period = %payment.billing_period,
                "payment initiated"
            );
            Ok(payment_view(payment))
        }
        PaymentInitiation::AlreadyActive(existing) => Err(ApiError::new(
            ErrorCode::Conflict,
            format!("Payment for {period} is already {}.", existing.status),
        )
        .with_details(json!({
            "existing_status": existing.status,
            "payment_id": existing.payment_id,
        }))),
    }
}

/// Settles a pending payment as `success` or `failed`. Both are terminal.
pub async fn set_payment_status(
    ctx: &ApiContext,
    actor: &Actor,
    payment_id: PaymentId,
    status: PaymentStatus,
) -> Result<PaymentView, ApiError> {
    if !status.is_terminal() {
        return Err(ApiError::validation(
            "status must be either 'success' or 'failed'",
        ));
    }

    let payment = ctx
        .storage
        .payment(payment_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| payment_not_found(payment_id))?;
    require_secretary_of(ctx, actor, payment.society_id).await?;

    match ctx
        .storage
        .set_payment_status(payment_id, status)
        .await
        .map_err(internal)?
    {
        PaymentTransition::Applied(payment) => {
            info!(
                payment_id = %payment_id,
                status = %payment.status,
                verified_by = %actor.member_id,
                "payment settled"
            );
            Ok(payment_view(payment))
        }
        PaymentTransition::Missing => Err(payment_not_found(payment_id)),
        PaymentTransition::AlreadyTerminal(current) => Err(ApiError::new(
            ErrorCode::InvalidTransition,
            format!(
                "payment {payment_id} is already {} and cannot change to {status}",
                current.status
            ),
        )
        .with_details(json!({ "current_status": current.status }))),
    }
}

/// Pending payments awaiting verification in the caller's society.
pub async fn list_pending_payments(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<Vec<PendingPaymentView>, ApiError> {
    let society = secretary_society(ctx, actor).await?;
    let rows = ctx
        .storage
        .pending_payments_for_society(society.society_id)
        .await
        .map_err(internal)?;
    Ok(rows.into_iter().map(pending_view).collect())
}

/// Payment history of a resident, latest billing period first. Residents see
/// their own; the secretary sees any resident of the society.
pub async fn payment_history(
    ctx: &ApiContext,
    actor: &Actor,
    resident_id: MemberId,
) -> Result<Vec<PaymentView>, ApiError> {
    if resident_id != actor.member_id {
        let resident = ctx
            .storage
            .member(resident_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::not_found(format!("resident {resident_id} not found")))?;
        let society_id = resident
            .society_id
            .ok_or_else(|| ApiError::unauthorized("resident is not part of a society"))?;
        require_secretary_of(ctx, actor, society_id).await?;
    }

    let history = ctx
        .storage
        .payment_history(resident_id)
        .await
        .map_err(internal)?;
    Ok(history.into_iter().map(payment_view).collect())
}

fn payment_not_found(payment_id: PaymentId) -> ApiError {
    ApiError::not_found(format!("payment {payment_id} not found"))
}

fn payment_view(payment: StoredPayment) -> PaymentView {
    PaymentView {
        id: payment.payment_id,
        resident_id: payment.resident_id,
        society_id: payment.society_id,
        amount: payment.amount,
        period: payment.billing_period,
        status: payment.status,
        created_at: payment.created_at,
        updated_at: payment.updated_at,
    }
}

fn pending_view(row: PendingPaymentRow) -> PendingPaymentView {
    PendingPaymentView {
        id: row.payment.payment_id,
        resident_id: row.payment.resident_id,
        full_name: row.full_name,
        flat_number: row.flat_number,
        amount: row.payment.amount,
        period: row.payment.billing_period,
        created_at: row.payment.created_at,
    }
}

#[cfg(test)]
#[path = "tests/payments_tests.rs"]
mod tests;

use std::sync::Arc;

use shared::{
    domain::{MemberId, Role, SocietyId},
    error::{ApiError, ErrorCode},
    protocol::{ApplicantView, ResidentView},
};
use storage::{Storage, StoredMember, StoredSociety};

mod admission;
mod auth;
mod bulletin;
mod credentials;
mod payments;
mod setup;

pub use admission::{
    admit_applicant, find_applicant_by_mobile, find_resident_by_mobile, list_applicants,
    list_residents, reject_applicant, update_resident,
};
pub use auth::{authenticate, login, register};
pub use bulletin::{
    create_complaint, create_notice, delete_complaint, delete_notice, list_complaints,
    list_notices, update_complaint, update_notice,
};
pub use credentials::{Argon2JwtCredentials, CredentialService, SessionClaims};
pub use payments::{initiate_payment, list_pending_payments, payment_history, set_payment_status};
pub use setup::{
    evaluate_setup, list_amenities, list_societies, maintenance_settings, save_amenities,
    save_maintenance_settings, save_society_details, setup_status, society_for_secretary,
};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub credentials: Arc<dyn CredentialService>,
}

/// An authenticated, currently active member. Built from storage on every
/// request so role and society changes take effect immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub member_id: MemberId,
    pub role: Role,
    pub society_id: Option<SocietyId>,
}

impl Actor {
    pub fn is_secretary(&self) -> bool {
        self.role == Role::Secretary
    }
}

impl From<&StoredMember> for Actor {
    fn from(member: &StoredMember) -> Self {
        Self {
            member_id: member.member_id,
            role: member.role,
            society_id: member.society_id,
        }
    }
}

/// Loads the society this actor administers. Non-secretaries are refused;
/// a secretary who has not saved society details yet gets `NotFound`.
async fn secretary_society(ctx: &ApiContext, actor: &Actor) -> Result<StoredSociety, ApiError> {
    if !actor.is_secretary() {
        return Err(ApiError::unauthorized("secretary role required"));
    }
    ctx.storage
        .society_for_secretary(actor.member_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("society details have not been saved yet"))
}

async fn require_secretary_of(
    ctx: &ApiContext,
    actor: &Actor,
    society_id: SocietyId,
) -> Result<StoredSociety, ApiError> {
    let society = secretary_society(ctx, actor).await?;
    if society.society_id != society_id {
        return Err(ApiError::unauthorized(
            "caller is not the secretary of this society",
        ));
    }
    Ok(society)
}

fn require_member_of(actor: &Actor, society_id: SocietyId) -> Result<(), ApiError> {
    if actor.society_id != Some(society_id) {
        return Err(ApiError::unauthorized("caller does not belong to this society"));
    }
    Ok(())
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn resident_view(member: StoredMember) -> ResidentView {
    ResidentView {
        id: member.member_id,
        full_name: member.full_name,
        mobile_number: member.mobile_number,
        email: member.email,
        flat_number: member.flat_number,
        role: member.role,
        society_id: member.society_id,
    }
}

fn applicant_view(member: StoredMember) -> ApplicantView {
    ApplicantView {
        id: member.member_id,
        full_name: member.full_name,
        mobile_number: member.mobile_number,
        flat_number: member.flat_number,
        role: member.role,
        society_id: member.society_id,
        created_at: member.created_at,
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %format!("{err:#}"), "storage operation failed");
    ApiError::new(ErrorCode::StorageFailure, err.to_string())
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod support;

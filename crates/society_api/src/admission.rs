use shared::{
    domain::{MemberId, MemberStatus, SocietyId},
    error::ApiError,
    protocol::{ApplicantView, ResidentPatch, ResidentView},
};
use tracing::info;

use crate::{
    applicant_view, internal, require_secretary_of, resident_view, secretary_society, Actor,
    ApiContext,
};

/// Pending applicants of the caller's society, newest first.
pub async fn list_applicants(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<Vec<ApplicantView>, ApiError> {
    let society = secretary_society(ctx, actor).await?;
    let applicants = ctx
        .storage
        .list_applicants(society.society_id)
        .await
        .map_err(internal)?;
    Ok(applicants.into_iter().map(applicant_view).collect())
}

/// Promotes a pending applicant of the caller's society to a resident.
///
/// The promotion is one guarded status flip, so an observer sees either the
/// applicant or the resident, never both or neither. Admitting an id that
/// is not pending in this society (unknown, already admitted, rejected, or
/// belonging to another society) is `NotFound`.
pub async fn admit_applicant(
    ctx: &ApiContext,
    actor: &Actor,
    applicant_id: MemberId,
) -> Result<ResidentView, ApiError> {
    let society = secretary_society(ctx, actor).await?;
    let resident = ctx
        .storage
        .admit_applicant(applicant_id, society.society_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("applicant {applicant_id} not found")))?;

    info!(
        applicant_id = %applicant_id,
        society_id = %society.society_id,
        admitted_by = %actor.member_id,
        "applicant admitted"
    );
    Ok(resident_view(resident))
}

/// Rejects a pending applicant. A second rejection of the same id is
/// `NotFound`, distinguishable from the first call's success.
pub async fn reject_applicant(
    ctx: &ApiContext,
    actor: &Actor,
    applicant_id: MemberId,
) -> Result<(), ApiError> {
    let society = secretary_society(ctx, actor).await?;
    let rejected = ctx
        .storage
        .reject_applicant(applicant_id, society.society_id)
        .await
        .map_err(internal)?;
    if !rejected {
        return Err(ApiError::not_found(format!(
            "applicant {applicant_id} not found"
        )));
    }

    info!(
        applicant_id = %applicant_id,
        society_id = %society.society_id,
        rejected_by = %actor.member_id,
        "applicant rejected"
    );
    Ok(())
}

pub async fn find_applicant_by_mobile(
    ctx: &ApiContext,
    mobile: &str,
) -> Result<Option<ApplicantView>, ApiError> {
    let applicant = ctx
        .storage
        .find_member_by_mobile(mobile.trim(), MemberStatus::Pending)
        .await
        .map_err(internal)?;
    Ok(applicant.map(applicant_view))
}

pub async fn find_resident_by_mobile(
    ctx: &ApiContext,
    mobile: &str,
) -> Result<Option<ResidentView>, ApiError> {
    let resident = ctx
        .storage
        .find_member_by_mobile(mobile.trim(), MemberStatus::Active)
        .await
        .map_err(internal)?;
    Ok(resident.map(resident_view))
}

pub async fn list_residents(
    ctx: &ApiContext,
    actor: &Actor,
    society_id: SocietyId,
) -> Result<Vec<ResidentView>, ApiError> {
    require_secretary_of(ctx, actor, society_id).await?;
    let residents = ctx
        .storage
        .list_residents(society_id)
        .await
        .map_err(internal)?;
    Ok(residents.into_iter().map(resident_view).collect())
}

pub async fn update_resident(
    ctx: &ApiContext,
    actor: &Actor,
    resident_id: MemberId,
    patch: &ResidentPatch,
) -> Result<ResidentView, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::validation("no resident fields to update"));
    }
    let blank = [
        ("fullName", patch.full_name.as_deref()),
        ("flatNumber", patch.flat_number.as_deref()),
    ]
    .into_iter()
    .find(|(_, value)| value.is_some_and(|v| v.trim().is_empty()));
    if let Some((field, _)) = blank {
        return Err(ApiError::validation(format!("{field} cannot be blank")));
    }

    let society = secretary_society(ctx, actor).await?;
    let updated = ctx
        .storage
        .update_resident(resident_id, society.society_id, patch)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("resident {resident_id} not found")))?;
    info!(resident_id = %resident_id, "resident updated");
    Ok(resident_view(updated))
}

#[cfg(test)]
#[path = "tests/admission_tests.rs"]
mod tests;

use shared::{
    domain::{MemberId, SocietyId},
    error::ApiError,
    protocol::{
        AmenityView, MaintenanceSettingsRequest, MaintenanceView, SaveAmenitiesRequest,
        SetupDetails, SetupStatus, SocietyDetailsRequest, SocietyView,
    },
};
use storage::{
    MaintenanceDraft, NewAmenity, SetupSnapshot, SocietyDetails, StoredAmenity,
    StoredMaintenance, StoredSociety,
};
use tracing::info;

use crate::{internal, require_member_of, secretary_society, Actor, ApiContext};

/// Creates or updates the caller's society. The society row and the
/// secretary's membership pointer are written in one transaction.
pub async fn save_society_details(
    ctx: &ApiContext,
    actor: &Actor,
    req: &SocietyDetailsRequest,
) -> Result<SocietyView, ApiError> {
    if !actor.is_secretary() {
        return Err(ApiError::unauthorized("secretary role required"));
    }

    let details = SocietyDetails {
        name: non_blank(&req.name),
        address: non_blank(&req.address),
        city: non_blank(&req.city),
        pincode: non_blank(&req.pincode),
        registration_number: non_blank(&req.registration_number),
        upi_id: non_blank(&req.upi_id),
    };
    let society = ctx
        .storage
        .upsert_society_for_secretary(actor.member_id, &details)
        .await
        .map_err(internal)?;

    info!(
        society_id = %society.society_id,
        secretary_id = %actor.member_id,
        "society details saved"
    );
    Ok(society_view(society))
}

pub async fn save_maintenance_settings(
    ctx: &ApiContext,
    actor: &Actor,
    req: &MaintenanceSettingsRequest,
) -> Result<MaintenanceView, ApiError> {
    if req.amount.is_some_and(|amount| amount <= 0) {
        return Err(ApiError::validation("amount must be greater than zero"));
    }
    if req.due_day.is_some_and(|day| !(1..=31).contains(&day)) {
        return Err(ApiError::validation("dueDay must be between 1 and 31"));
    }

    let society = secretary_society(ctx, actor).await?;
    let draft = MaintenanceDraft {
        amount: req.amount,
        billing_cycle: req.billing_cycle,
        due_day: req.due_day,
        upi_id: non_blank(&req.upi_id),
    };
    let saved = ctx
        .storage
        .upsert_maintenance(society.society_id, &draft)
        .await
        .map_err(internal)?;

    info!(society_id = %society.society_id, "maintenance settings saved");
    Ok(maintenance_view(saved))
}

/// Replaces the whole amenity set of the caller's society.
pub async fn save_amenities(
    ctx: &ApiContext,
    actor: &Actor,
    req: SaveAmenitiesRequest,
) -> Result<Vec<AmenityView>, ApiError> {
    let amenities = req
        .amenities
        .into_iter()
        .map(|input| {
            let name = input.name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::validation("amenity name is required"));
            }
            Ok(NewAmenity {
                name,
                allowed_days: input.allowed_days.into_items(),
                time_slots: input.time_slots.into_items(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let society = secretary_society(ctx, actor).await?;
    let stored = ctx
        .storage
        .replace_amenities(society.society_id, &amenities)
        .await
        .map_err(internal)?;

    info!(society_id = %society.society_id, count = stored.len(), "amenities saved");
    Ok(stored.into_iter().map(amenity_view).collect())
}

pub async fn list_societies(ctx: &ApiContext) -> Result<Vec<SocietyView>, ApiError> {
    let societies = ctx.storage.list_societies().await.map_err(internal)?;
    Ok(societies.into_iter().map(society_view).collect())
}

pub async fn society_for_secretary(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<SocietyView, ApiError> {
    secretary_society(ctx, actor).await.map(society_view)
}

pub async fn list_amenities(
    ctx: &ApiContext,
    actor: &Actor,
    society_id: SocietyId,
) -> Result<Vec<AmenityView>, ApiError> {
    require_member_of(actor, society_id)?;
    let amenities = ctx
        .storage
        .list_amenities(society_id)
        .await
        .map_err(internal)?;
    Ok(amenities.into_iter().map(amenity_view).collect())
}

pub async fn maintenance_settings(
    ctx: &ApiContext,
    actor: &Actor,
    society_id: SocietyId,
) -> Result<MaintenanceView, ApiError> {
    require_member_of(actor, society_id)?;
    ctx.storage
        .maintenance(society_id)
        .await
        .map_err(internal)?
        .map(maintenance_view)
        .ok_or_else(|| ApiError::not_found("maintenance settings have not been saved yet"))
}

/// Readiness of the secretary's society. Always reads committed state.
pub async fn setup_status(
    ctx: &ApiContext,
    actor: &Actor,
    secretary_id: MemberId,
) -> Result<SetupStatus, ApiError> {
    if actor.member_id != secretary_id || !actor.is_secretary() {
        return Err(ApiError::unauthorized(
            "setup status is only visible to the society secretary",
        ));
    }
    let snapshot = ctx
        .storage
        .setup_snapshot(secretary_id)
        .await
        .map_err(internal)?;
    Ok(evaluate_setup(snapshot.as_ref()))
}

/// Derives the readiness flags from a setup snapshot. A missing society is
/// reported as entirely incomplete.
pub fn evaluate_setup(snapshot: Option<&SetupSnapshot>) -> SetupStatus {
    let Some(snapshot) = snapshot else {
        return SetupStatus {
            is_setup_complete: false,
            details: SetupDetails::default(),
        };
    };

    let details = SetupDetails {
        has_society_details: society_is_described(&snapshot.society),
        has_maintenance_settings: snapshot
            .maintenance
            .as_ref()
            .is_some_and(maintenance_is_configured),
        has_amenities: !snapshot.amenities.is_empty()
            && snapshot.amenities.iter().all(amenity_is_bookable),
    };
    SetupStatus {
        is_setup_complete: details.has_society_details
            && details.has_maintenance_settings
            && details.has_amenities,
        details,
    }
}

fn society_is_described(society: &StoredSociety) -> bool {
    [
        &society.name,
        &society.address,
        &society.city,
        &society.pincode,
    ]
    .iter()
    .all(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
}

fn maintenance_is_configured(settings: &StoredMaintenance) -> bool {
    settings.amount.is_some() && settings.billing_cycle.is_some() && settings.due_day.is_some()
}

fn amenity_is_bookable(amenity: &StoredAmenity) -> bool {
    !amenity.name.trim().is_empty()
        && !amenity.allowed_days.is_empty()
        && !amenity.time_slots.is_empty()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn society_view(society: StoredSociety) -> SocietyView {
    SocietyView {
        id: society.society_id,
        name: society.name,
        address: society.address,
        city: society.city,
        pincode: society.pincode,
        registration_number: society.registration_number,
        upi_id: society.upi_id,
        secretary_id: society.secretary_id,
    }
}

fn maintenance_view(settings: StoredMaintenance) -> MaintenanceView {
    MaintenanceView {
        society_id: settings.society_id,
        amount: settings.amount,
        billing_cycle: settings.billing_cycle,
        due_day: settings.due_day,
        upi_id: settings.upi_id,
    }
}

fn amenity_view(amenity: StoredAmenity) -> AmenityView {
    AmenityView {
        id: amenity.amenity_id,
        society_id: amenity.society_id,
        name: amenity.name,
        allowed_days: amenity.allowed_days,
        time_slots: amenity.time_slots,
    }
}

#[cfg(test)]
#[path = "tests/setup_tests.rs"]
mod tests;

use shared::{
    domain::{ComplaintId, NoticeId, SocietyId},
    error::ApiError,
    protocol::{ComplaintPatch, ComplaintRequest, ComplaintView, NoticeRequest, NoticeView},
};
use storage::{NewComplaint, StoredComplaint, StoredNotice};
use tracing::info;

use crate::{
    internal, require_member_of, require_secretary_of, required, secretary_society, Actor,
    ApiContext,
};

pub async fn create_notice(
    ctx: &ApiContext,
    actor: &Actor,
    req: &NoticeRequest,
) -> Result<NoticeView, ApiError> {
    let title = required(&req.title, "title")?;
    let content = required(&req.content, "content")?;
    let society = secretary_society(ctx, actor).await?;
    let notice = ctx
        .storage
        .create_notice(society.society_id, actor.member_id, title, content)
        .await
        .map_err(internal)?;
    info!(notice_id = %notice.notice_id, society_id = %society.society_id, "notice posted");
    Ok(notice_view(notice))
}

pub async fn list_notices(ctx: &ApiContext, actor: &Actor) -> Result<Vec<NoticeView>, ApiError> {
    let society_id = own_society(actor)?;
    let notices = ctx
        .storage
        .list_notices(society_id)
        .await
        .map_err(internal)?;
    Ok(notices.into_iter().map(notice_view).collect())
}

pub async fn update_notice(
    ctx: &ApiContext,
    actor: &Actor,
    notice_id: NoticeId,
    req: &NoticeRequest,
) -> Result<NoticeView, ApiError> {
    let title = required(&req.title, "title")?;
    let content = required(&req.content, "content")?;
    let society = secretary_society(ctx, actor).await?;
    ctx.storage
        .update_notice(notice_id, society.society_id, title, content)
        .await
        .map_err(internal)?
        .map(notice_view)
        .ok_or_else(|| ApiError::not_found(format!("notice {notice_id} not found")))
}

pub async fn delete_notice(
    ctx: &ApiContext,
    actor: &Actor,
    notice_id: NoticeId,
) -> Result<(), ApiError> {
    let society = secretary_society(ctx, actor).await?;
    let deleted = ctx
        .storage
        .delete_notice(notice_id, society.society_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(ApiError::not_found(format!("notice {notice_id} not found")));
    }
    info!(notice_id = %notice_id, "notice deleted");
    Ok(())
}

pub async fn create_complaint(
    ctx: &ApiContext,
    actor: &Actor,
    req: &ComplaintRequest,
) -> Result<ComplaintView, ApiError> {
    let category = required(&req.category, "category")?;
    let subject = required(&req.subject, "subject")?;
    let description = required(&req.description, "description")?;
    let society_id = own_society(actor)?;

    let complaint = ctx
        .storage
        .create_complaint(&NewComplaint {
            resident_id: actor.member_id,
            society_id,
            category,
            subject,
            description,
            preferred_time: req
                .preferred_time
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty()),
            urgent: req.urgent,
        })
        .await
        .map_err(internal)?;
    info!(
        complaint_id = %complaint.complaint_id,
        resident_id = %actor.member_id,
        "complaint registered"
    );
    Ok(complaint_view(complaint))
}

/// Secretaries see every complaint of their society; residents see their own.
pub async fn list_complaints(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<Vec<ComplaintView>, ApiError> {
    let (society_id, author) = if actor.is_secretary() {
        (secretary_society(ctx, actor).await?.society_id, None)
    } else {
        (own_society(actor)?, Some(actor.member_id))
    };
    let complaints = ctx
        .storage
        .list_complaints(society_id, author)
        .await
        .map_err(internal)?;
    Ok(complaints.into_iter().map(complaint_view).collect())
}

/// Authors may edit the complaint's content; only the society secretary may
/// move its status.
pub async fn update_complaint(
    ctx: &ApiContext,
    actor: &Actor,
    complaint_id: ComplaintId,
    patch: &ComplaintPatch,
) -> Result<ComplaintView, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::validation("no complaint fields to update"));
    }
    let blank = [
        ("category", patch.category.as_deref()),
        ("subject", patch.subject.as_deref()),
        ("description", patch.description.as_deref()),
    ]
    .into_iter()
    .find(|(_, value)| value.is_some_and(|v| v.trim().is_empty()));
    if let Some((field, _)) = blank {
        return Err(ApiError::validation(format!("{field} cannot be blank")));
    }

    let complaint = visible_complaint(ctx, actor, complaint_id).await?;
    if patch.status.is_some() {
        require_secretary_of(ctx, actor, complaint.society_id).await?;
    }
    if patch.touches_content() && complaint.resident_id != actor.member_id {
        return Err(ApiError::unauthorized(
            "only the author can edit a complaint's content",
        ));
    }

    let updated = ctx
        .storage
        .update_complaint(complaint_id, patch)
        .await
        .map_err(internal)?
        .ok_or_else(|| complaint_not_found(complaint_id))?;
    info!(complaint_id = %complaint_id, status = %updated.status, "complaint updated");
    Ok(complaint_view(updated))
}

pub async fn delete_complaint(
    ctx: &ApiContext,
    actor: &Actor,
    complaint_id: ComplaintId,
) -> Result<(), ApiError> {
    let complaint = visible_complaint(ctx, actor, complaint_id).await?;
    if complaint.resident_id != actor.member_id {
        require_secretary_of(ctx, actor, complaint.society_id).await?;
    }
    if !ctx
        .storage
        .delete_complaint(complaint_id)
        .await
        .map_err(internal)?
    {
        return Err(complaint_not_found(complaint_id));
    }
    info!(complaint_id = %complaint_id, deleted_by = %actor.member_id, "complaint deleted");
    Ok(())
}

/// Loads a complaint of the caller's own society.
async fn visible_complaint(
    ctx: &ApiContext,
    actor: &Actor,
    complaint_id: ComplaintId,
) -> Result<StoredComplaint, ApiError> {
    let complaint = ctx
        .storage
        .complaint(complaint_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| complaint_not_found(complaint_id))?;
    require_member_of(actor, complaint.society_id)?;
    Ok(complaint)
}

fn own_society(actor: &Actor) -> Result<SocietyId, ApiError> {
    actor
        .society_id
        .ok_or_else(|| ApiError::unauthorized("caller does not belong to a society"))
}

fn complaint_not_found(complaint_id: ComplaintId) -> ApiError {
    ApiError::not_found(format!("complaint {complaint_id} not found"))
}

fn notice_view(notice: StoredNotice) -> NoticeView {
    NoticeView {
        id: notice.notice_id,
        society_id: notice.society_id,
        title: notice.title,
        content: notice.content,
        posted_by: notice.posted_by,
        created_at: notice.created_at,
        updated_at: notice.updated_at,
    }
}

fn complaint_view(complaint: StoredComplaint) -> ComplaintView {
    ComplaintView {
        id: complaint.complaint_id,
        resident_id: complaint.resident_id,
        society_id: complaint.society_id,
        category: complaint.category,
        subject: complaint.subject,
        description: complaint.description,
        preferred_time: complaint.preferred_time,
        urgent: complaint.urgent,
        status: complaint.status,
        created_at: complaint.created_at,
        updated_at: complaint.updated_at,
    }
}

#[cfg(test)]
#[path = "tests/bulletin_tests.rs"]
mod tests;

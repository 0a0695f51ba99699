use shared::{
    domain::{MemberStatus, Role},
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, LoginResponse, RegisterRequest, Registration},
};
use storage::{MemberInsert, NewMember};
use tracing::info;

use crate::{applicant_view, internal, required, resident_view, Actor, ApiContext};

const BAD_CREDENTIALS: &str = "invalid mobile number or password";

pub async fn register(ctx: &ApiContext, req: &RegisterRequest) -> Result<Registration, ApiError> {
    let full_name = required(&req.full_name, "fullName")?;
    let mobile = required(&req.mobile, "mobile")?;
    let flat_number = required(&req.flat_number, "flatNumber")?;
    let role: Role = required(&req.role, "role")?
        .parse()
        .map_err(|e| ApiError::validation(format!("{e}")))?;
    if req.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }
    validate_mobile(mobile)?;
    // A secretary's society pointer is only ever set by saving society
    // details; applicants must name the society that will admit them.
    match (role.registers_directly(), req.society_id) {
        (true, Some(_)) => {
            return Err(ApiError::validation(
                "secretaries register without a societyId",
            ))
        }
        (false, None) => {
            return Err(ApiError::validation(
                "societyId is required for this role",
            ))
        }
        _ => {}
    }

    if let Some(society_id) = req.society_id {
        ctx.storage
            .society(society_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::not_found(format!("society {society_id} not found")))?;
    }

    let password_hash = ctx.credentials.hash(&req.password).map_err(internal)?;
    let status = if role.registers_directly() {
        MemberStatus::Active
    } else {
        MemberStatus::Pending
    };
    let new_member = NewMember {
        full_name,
        mobile_number: mobile,
        flat_number,
        password_hash: &password_hash,
        role,
        society_id: req.society_id,
    };

    let member = match ctx
        .storage
        .create_member(&new_member, status)
        .await
        .map_err(internal)?
    {
        MemberInsert::Created(member) => member,
        MemberInsert::MobileTaken => {
            return Err(ApiError::new(
                ErrorCode::Conflict,
                "a member with this mobile number already exists",
            ))
        }
    };

    info!(member_id = %member.member_id, role = %role, status = %status, "member registered");
    Ok(match status {
        MemberStatus::Active => Registration::Registered {
            resident: resident_view(member),
        },
        _ => Registration::AwaitingApproval {
            applicant: applicant_view(member),
        },
    })
}

/// Checks the password before looking at admission state, so an unknown
/// caller cannot probe which mobile numbers have pending applications.
pub async fn login(ctx: &ApiContext, req: &LoginRequest) -> Result<LoginResponse, ApiError> {
    let mobile = req.mobile.trim();
    let record = ctx
        .storage
        .login_record(mobile)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthenticated, BAD_CREDENTIALS))?;

    let verified = ctx
        .credentials
        .verify(&req.password, &record.password_hash)
        .map_err(internal)?;
    if !verified {
        return Err(ApiError::new(ErrorCode::Unauthenticated, BAD_CREDENTIALS));
    }

    let member = record.member;
    if member.status == MemberStatus::Pending {
        return Err(ApiError::new(
            ErrorCode::PendingApproval,
            "registration is awaiting approval by the society secretary",
        ));
    }

    let token = ctx
        .credentials
        .issue_token(
            member.member_id,
            &member.mobile_number,
            member.role,
            member.society_id,
        )
        .map_err(internal)?;
    info!(member_id = %member.member_id, "member logged in");
    Ok(LoginResponse {
        token,
        resident: resident_view(member),
    })
}

/// Resolves a bearer token to an active member.
pub async fn authenticate(ctx: &ApiContext, token: &str) -> Result<Actor, ApiError> {
    let claims = ctx
        .credentials
        .decode_token(token)
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthenticated, "invalid or expired session"))?;
    let member = ctx
        .storage
        .member(claims.id)
        .await
        .map_err(internal)?
        .filter(|member| member.status == MemberStatus::Active)
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthenticated, "session member is not active"))?;
    Ok(Actor::from(&member))
}

fn validate_mobile(mobile: &str) -> Result<(), ApiError> {
    let digits = mobile.strip_prefix('+').unwrap_or(mobile);
    let well_formed =
        (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(ApiError::validation(
            "mobile must be 10 to 15 digits with an optional leading +",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::{MemberId, Role, SocietyId},
    protocol::{RegisterRequest, Registration, SocietyDetailsRequest},
};
use storage::Storage;

use crate::{
    authenticate, register, save_society_details, Actor, ApiContext, CredentialService,
    SessionClaims,
};

/// Plain-text credentials so tests do not pay for Argon2.
pub(crate) struct PlainCredentials;

impl CredentialService for PlainCredentials {
    fn hash(&self, password: &str) -> Result<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(hash.strip_prefix("plain:") == Some(password))
    }

    fn issue_token(
        &self,
        member_id: MemberId,
        mobile: &str,
        _role: Role,
        _society_id: Option<SocietyId>,
    ) -> Result<String> {
        Ok(format!("token:{}:{mobile}", member_id.0))
    }

    fn decode_token(&self, token: &str) -> Option<SessionClaims> {
        let mut parts = token.strip_prefix("token:")?.splitn(2, ':');
        let id = parts.next()?.parse().ok()?;
        Some(SessionClaims {
            id: MemberId(id),
            mobile: parts.next()?.to_string(),
            role: Role::Member,
            society_id: None,
            iat: 0,
            exp: i64::MAX,
        })
    }
}

pub(crate) async fn context() -> ApiContext {
    ApiContext {
        storage: Storage::new("sqlite::memory:").await.expect("db"),
        credentials: Arc::new(PlainCredentials),
    }
}

pub(crate) fn registration(
    mobile: &str,
    role: &str,
    society: Option<SocietyId>,
) -> RegisterRequest {
    RegisterRequest {
        full_name: format!("Member {mobile}"),
        mobile: mobile.to_string(),
        flat_number: "C-303".to_string(),
        password: "s3cret".to_string(),
        role: role.to_string(),
        society_id: society,
    }
}

pub(crate) async fn actor(ctx: &ApiContext, member_id: MemberId) -> Actor {
    let member = ctx
        .storage
        .member(member_id)
        .await
        .expect("member lookup")
        .expect("member exists");
    Actor::from(&member)
}

/// A secretary with fully described society details.
pub(crate) async fn seed_secretary(ctx: &ApiContext, mobile: &str) -> (Actor, SocietyId) {
    let registered = register(ctx, &registration(mobile, "secretary", None))
        .await
        .expect("register secretary");
    let Registration::Registered { resident } = registered else {
        panic!("secretary must register directly");
    };
    let before = actor(ctx, resident.id).await;
    let society = save_society_details(
        ctx,
        &before,
        &SocietyDetailsRequest {
            name: Some("Green Park".into()),
            address: Some("12 Lake Road".into()),
            city: Some("Pune".into()),
            pincode: Some("411001".into()),
            ..SocietyDetailsRequest::default()
        },
    )
    .await
    .expect("society details");
    (actor(ctx, resident.id).await, society.id)
}

pub(crate) async fn seed_applicant(ctx: &ApiContext, society: SocietyId, mobile: &str) -> MemberId {
    let registered = register(ctx, &registration(mobile, "owner", Some(society)))
        .await
        .expect("register applicant");
    let Registration::AwaitingApproval { applicant } = registered else {
        panic!("owners must wait for approval");
    };
    applicant.id
}

pub(crate) async fn seed_resident(
    ctx: &ApiContext,
    secretary: &Actor,
    society: SocietyId,
    mobile: &str,
) -> Actor {
    let applicant_id = seed_applicant(ctx, society, mobile).await;
    crate::admit_applicant(ctx, secretary, applicant_id)
        .await
        .expect("admit");
    let token = ctx
        .credentials
        .issue_token(applicant_id, mobile, Role::Owner, Some(society))
        .expect("token");
    authenticate(ctx, &token).await.expect("authenticate")
}

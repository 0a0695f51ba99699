use super::*;
use crate::support::{actor, context, registration, seed_secretary};
use crate::{
    create_notice, find_applicant_by_mobile, find_resident_by_mobile, list_amenities,
    list_notices,
};
use shared::{domain::SocietyId, protocol::NoticeRequest};

#[tokio::test]
async fn secretary_registers_directly_without_an_applicant_row() {
    let ctx = context().await;
    let outcome = register(&ctx, &registration("9000000001", "Secretary", None))
        .await
        .expect("register");

    let Registration::Registered { resident } = outcome else {
        panic!("secretary should not wait for approval");
    };
    assert_eq!(resident.role, Role::Secretary);
    assert!(find_applicant_by_mobile(&ctx, "9000000001")
        .await
        .expect("lookup")
        .is_none());
    assert!(find_resident_by_mobile(&ctx, "9000000001")
        .await
        .expect("lookup")
        .is_some());
}

#[tokio::test]
async fn non_secretary_waits_and_login_reports_pending_approval() {
    let ctx = context().await;
    let (_secretary, society) = seed_secretary(&ctx, "9000000001").await;

    let outcome = register(&ctx, &registration("9876543210", "tenant", Some(society)))
        .await
        .expect("register");
    assert!(matches!(outcome, Registration::AwaitingApproval { .. }));
    assert!(find_resident_by_mobile(&ctx, "9876543210")
        .await
        .expect("lookup")
        .is_none());

    let err = login(
        &ctx,
        &LoginRequest {
            mobile: "9876543210".into(),
            password: "s3cret".into(),
        },
    )
    .await
    .expect_err("pending applicants cannot log in");
    assert_eq!(err.code, ErrorCode::PendingApproval);

    let wrong = login(
        &ctx,
        &LoginRequest {
            mobile: "9876543210".into(),
            password: "guess".into(),
        },
    )
    .await
    .expect_err("wrong password");
    assert_eq!(wrong.code, ErrorCode::Unauthenticated);
}

#[tokio::test]
async fn duplicate_mobile_is_a_conflict() {
    let ctx = context().await;
    register(&ctx, &registration("9000000001", "secretary", None))
        .await
        .expect("first");
    let err = register(&ctx, &registration("9000000001", "secretary", None))
        .await
        .expect_err("duplicate");
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[tokio::test]
async fn registration_validates_fields_before_writing() {
    let ctx = context().await;

    let mut missing_name = registration("9000000001", "owner", None);
    missing_name.full_name = "   ".into();
    let err = register(&ctx, &missing_name).await.expect_err("blank name");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = register(&ctx, &registration("12ab", "owner", None))
        .await
        .expect_err("bad mobile");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = register(&ctx, &registration("9000000001", "landlord", None))
        .await
        .expect_err("unknown role");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = register(&ctx, &registration("9000000001", "owner", Some(SocietyId(77))))
        .await
        .expect_err("unknown society");
    assert_eq!(err.code, ErrorCode::NotFound);

    assert!(ctx
        .storage
        .login_record("9000000001")
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn login_issues_a_token_that_authenticates() {
    let ctx = context().await;
    register(&ctx, &registration("+919000000001", "secretary", None))
        .await
        .expect("register");

    let response = login(
        &ctx,
        &LoginRequest {
            mobile: "+919000000001".into(),
            password: "s3cret".into(),
        },
    )
    .await
    .expect("login");
    assert_eq!(response.resident.mobile_number, "+919000000001");

    let actor = authenticate(&ctx, &response.token)
        .await
        .expect("authenticate");
    assert_eq!(actor.member_id, response.resident.id);
    assert!(actor.is_secretary());

    let err = authenticate(&ctx, "garbage").await.expect_err("bad token");
    assert_eq!(err.code, ErrorCode::Unauthenticated);
}

#[tokio::test]
async fn unknown_mobile_gets_the_generic_credentials_error() {
    let ctx = context().await;
    let err = login(
        &ctx,
        &LoginRequest {
            mobile: "9999999999".into(),
            password: "whatever".into(),
        },
    )
    .await
    .expect_err("unknown");
    assert_eq!(err.code, ErrorCode::Unauthenticated);
    assert_eq!(err.message, BAD_CREDENTIALS);
}

#[tokio::test]
async fn secretary_cannot_register_into_another_society() {
    let ctx = context().await;
    let (owner_of_society, society) = seed_secretary(&ctx, "9000000001").await;
    create_notice(
        &ctx,
        &owner_of_society,
        &NoticeRequest {
            title: "AGM".into(),
            content: "Sunday 11:00".into(),
        },
    )
    .await
    .expect("notice");

    let err = register(&ctx, &registration("9000000002", "secretary", Some(society)))
        .await
        .expect_err("foreign society");
    assert_eq!(err.code, ErrorCode::Validation);

    let Registration::Registered { resident } =
        register(&ctx, &registration("9000000002", "secretary", None))
            .await
            .expect("register without society")
    else {
        panic!("secretary registers directly");
    };
    let newcomer = actor(&ctx, resident.id).await;
    assert_eq!(newcomer.society_id, None);

    let err = list_notices(&ctx, &newcomer)
        .await
        .expect_err("no society yet");
    assert_eq!(err.code, ErrorCode::Unauthorized);
    let err = list_amenities(&ctx, &newcomer, society)
        .await
        .expect_err("foreign amenities");
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn applicants_must_name_the_admitting_society() {
    let ctx = context().await;
    let (_secretary, society) = seed_secretary(&ctx, "9000000001").await;

    let err = register(&ctx, &registration("9876543210", "owner", None))
        .await
        .expect_err("society missing");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(ctx
        .storage
        .login_record("9876543210")
        .await
        .expect("lookup")
        .is_none());

    let registered = register(&ctx, &registration("9876543210", "owner", Some(society)))
        .await
        .expect("register with society");
    assert!(matches!(registered, Registration::AwaitingApproval { .. }));
}

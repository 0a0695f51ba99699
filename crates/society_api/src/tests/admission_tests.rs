use super::*;
use crate::support::{actor, context, seed_applicant, seed_resident, seed_secretary};
use shared::{domain::Role, error::ErrorCode};

#[tokio::test]
async fn admit_moves_applicant_into_the_resident_set() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let applicant_id = seed_applicant(&ctx, society, "9876543210").await;

    let resident = admit_applicant(&ctx, &secretary, applicant_id)
        .await
        .expect("admit");
    assert_eq!(resident.id, applicant_id);
    assert_eq!(resident.mobile_number, "9876543210");
    assert_eq!(resident.flat_number, "C-303");
    assert_eq!(resident.role, Role::Owner);
    assert_eq!(resident.society_id, Some(society));
    assert_eq!(resident.email, None);

    assert!(find_applicant_by_mobile(&ctx, "9876543210")
        .await
        .expect("lookup")
        .is_none());
    let found = find_resident_by_mobile(&ctx, "9876543210")
        .await
        .expect("lookup")
        .expect("resident");
    assert_eq!(found, resident);
}

#[tokio::test]
async fn admitting_twice_is_not_found() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let applicant_id = seed_applicant(&ctx, society, "9876543210").await;

    admit_applicant(&ctx, &secretary, applicant_id)
        .await
        .expect("first admit");
    let err = admit_applicant(&ctx, &secretary, applicant_id)
        .await
        .expect_err("second admit");
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(
        list_residents(&ctx, &secretary, society)
            .await
            .expect("residents")
            .iter()
            .filter(|r| r.id == applicant_id)
            .count(),
        1
    );
}

#[tokio::test]
async fn second_rejection_is_observably_different() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let applicant_id = seed_applicant(&ctx, society, "9876543210").await;

    reject_applicant(&ctx, &secretary, applicant_id)
        .await
        .expect("first reject");
    let err = reject_applicant(&ctx, &secretary, applicant_id)
        .await
        .expect_err("second reject");
    assert_eq!(err.code, ErrorCode::NotFound);

    assert!(find_applicant_by_mobile(&ctx, "9876543210")
        .await
        .expect("lookup")
        .is_none());
    let err = admit_applicant(&ctx, &secretary, applicant_id)
        .await
        .expect_err("rejected applicant cannot be admitted");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn secretaries_only_see_and_decide_their_own_applicants() {
    let ctx = context().await;
    let (green_park, green_society) = seed_secretary(&ctx, "9000000001").await;
    let (blue_hills, _blue_society) = seed_secretary(&ctx, "9000000002").await;
    let applicant_id = seed_applicant(&ctx, green_society, "9876543210").await;

    assert!(list_applicants(&ctx, &blue_hills)
        .await
        .expect("list")
        .is_empty());
    let err = admit_applicant(&ctx, &blue_hills, applicant_id)
        .await
        .expect_err("cross-society admit");
    assert_eq!(err.code, ErrorCode::NotFound);
    let err = list_residents(&ctx, &blue_hills, green_society)
        .await
        .expect_err("cross-society directory");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let listed = list_applicants(&ctx, &green_park).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, applicant_id);
}

#[tokio::test]
async fn residents_cannot_run_admission() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let owner = seed_resident(&ctx, &secretary, society, "9876543210").await;
    let applicant_id = seed_applicant(&ctx, society, "9123456780").await;

    let err = admit_applicant(&ctx, &owner, applicant_id)
        .await
        .expect_err("owner admit");
    assert_eq!(err.code, ErrorCode::Unauthorized);
    let err = list_applicants(&ctx, &owner).await.expect_err("owner list");
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn secretary_without_society_details_gets_not_found() {
    let ctx = context().await;
    let registered = crate::register(
        &ctx,
        &crate::support::registration("9000000009", "secretary", None),
    )
    .await
    .expect("register");
    let shared::protocol::Registration::Registered { resident } = registered else {
        panic!("secretary registers directly");
    };
    let fresh = actor(&ctx, resident.id).await;

    let err = list_applicants(&ctx, &fresh).await.expect_err("no society");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn resident_patch_is_validated_and_scoped() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let owner = seed_resident(&ctx, &secretary, society, "9876543210").await;

    let err = update_resident(&ctx, &secretary, owner.member_id, &ResidentPatch::default())
        .await
        .expect_err("empty patch");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = update_resident(
        &ctx,
        &secretary,
        owner.member_id,
        &ResidentPatch {
            full_name: Some("  ".into()),
            ..ResidentPatch::default()
        },
    )
    .await
    .expect_err("blank name");
    assert_eq!(err.code, ErrorCode::Validation);

    let updated = update_resident(
        &ctx,
        &secretary,
        owner.member_id,
        &ResidentPatch {
            email: Some("asha@example.com".into()),
            flat_number: Some("D-404".into()),
            ..ResidentPatch::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.email.as_deref(), Some("asha@example.com"));
    assert_eq!(updated.flat_number, "D-404");
    assert_eq!(updated.role, Role::Owner);

    let (other_secretary, _) = seed_secretary(&ctx, "9000000002").await;
    let err = update_resident(
        &ctx,
        &other_secretary,
        owner.member_id,
        &ResidentPatch {
            email: Some("x@example.com".into()),
            ..ResidentPatch::default()
        },
    )
    .await
    .expect_err("cross-society update");
    assert_eq!(err.code, ErrorCode::NotFound);
}

use super::*;
use crate::support::{context, seed_resident, seed_secretary};
use shared::domain::SocietyId;

fn march(resident: &Actor, society: SocietyId) -> InitiatePaymentRequest {
    InitiatePaymentRequest {
        resident_id: resident.member_id,
        society_id: society,
        amount: 1500,
        period: "2024-03".into(),
    }
}

#[tokio::test]
async fn initiate_conflict_fail_then_retry_scenario() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let owner = seed_resident(&ctx, &secretary, society, "9876543210").await;

    let first = initiate_payment(&ctx, &owner, &march(&owner, society))
        .await
        .expect("initiate");
    assert_eq!(first.status, PaymentStatus::PendingVerification);
    assert_eq!(first.amount, 1500);
    assert_eq!(first.period, "2024-03");

    let conflict = initiate_payment(&ctx, &owner, &march(&owner, society))
        .await
        .expect_err("duplicate");
    assert_eq!(conflict.code, ErrorCode::Conflict);
    assert_eq!(
        conflict.details.as_ref().expect("details")["existing_status"],
        "pending_verification"
    );
    assert_eq!(
        payment_history(&ctx, &owner, owner.member_id)
            .await
            .expect("history")
            .len(),
        1
    );

    let failed = set_payment_status(&ctx, &secretary, first.id, PaymentStatus::Failed)
        .await
        .expect("fail");
    assert_eq!(failed.status, PaymentStatus::Failed);

    let retry = initiate_payment(&ctx, &owner, &march(&owner, society))
        .await
        .expect("retry after failure");
    assert_ne!(retry.id, first.id);
    assert_eq!(retry.status, PaymentStatus::PendingVerification);
}

#[tokio::test]
async fn terminal_payments_refuse_further_transitions() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let owner = seed_resident(&ctx, &secretary, society, "9876543210").await;
    let payment = initiate_payment(&ctx, &owner, &march(&owner, society))
        .await
        .expect("initiate");

    let verified = set_payment_status(&ctx, &secretary, payment.id, PaymentStatus::Success)
        .await
        .expect("verify");
    assert!(verified.updated_at >= payment.updated_at);

    for next in [PaymentStatus::Failed, PaymentStatus::Success] {
        let err = set_payment_status(&ctx, &secretary, payment.id, next)
            .await
            .expect_err("terminal");
        assert_eq!(err.code, ErrorCode::InvalidTransition);
    }
    let history = payment_history(&ctx, &owner, owner.member_id)
        .await
        .expect("history");
    assert_eq!(history[0].status, PaymentStatus::Success);

    let conflict = initiate_payment(&ctx, &owner, &march(&owner, society))
        .await
        .expect_err("success blocks the period");
    assert_eq!(
        conflict.details.as_ref().expect("details")["existing_status"],
        "success"
    );
}

#[tokio::test]
async fn status_update_validates_target_and_existence() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let owner = seed_resident(&ctx, &secretary, society, "9876543210").await;
    let payment = initiate_payment(&ctx, &owner, &march(&owner, society))
        .await
        .expect("initiate");

    let err = set_payment_status(
        &ctx,
        &secretary,
        payment.id,
        PaymentStatus::PendingVerification,
    )
    .await
    .expect_err("not a terminal status");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = set_payment_status(&ctx, &secretary, PaymentId(4242), PaymentStatus::Success)
        .await
        .expect_err("missing payment");
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = set_payment_status(&ctx, &owner, payment.id, PaymentStatus::Success)
        .await
        .expect_err("residents cannot verify");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let (other_secretary, _) = seed_secretary(&ctx, "9000000002").await;
    let err = set_payment_status(&ctx, &other_secretary, payment.id, PaymentStatus::Success)
        .await
        .expect_err("other society");
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn residents_only_initiate_for_themselves() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let owner = seed_resident(&ctx, &secretary, society, "9876543210").await;
    let neighbour = seed_resident(&ctx, &secretary, society, "9123456780").await;

    let err = initiate_payment(&ctx, &neighbour, &march(&owner, society))
        .await
        .expect_err("someone else's payment");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let err = initiate_payment(&ctx, &owner, &march(&owner, SocietyId(society.0 + 1)))
        .await
        .expect_err("foreign society");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let mut zero = march(&owner, society);
    zero.amount = 0;
    let err = initiate_payment(&ctx, &owner, &zero)
        .await
        .expect_err("zero amount");
    assert_eq!(err.code, ErrorCode::Validation);

    let mut blank = march(&owner, society);
    blank.period = " ".into();
    let err = initiate_payment(&ctx, &owner, &blank)
        .await
        .expect_err("blank period");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn pending_list_and_history_are_scoped() {
    let ctx = context().await;
    let (secretary, society) = seed_secretary(&ctx, "9000000001").await;
    let owner = seed_resident(&ctx, &secretary, society, "9876543210").await;
    let neighbour = seed_resident(&ctx, &secretary, society, "9123456780").await;

    initiate_payment(&ctx, &owner, &march(&owner, society))
        .await
        .expect("march");
    let mut april = march(&owner, society);
    april.period = "2024-04".into();
    initiate_payment(&ctx, &owner, &april).await.expect("april");

    let pending = list_pending_payments(&ctx, &secretary)
        .await
        .expect("pending");
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|p| p.resident_id == owner.member_id));
    assert!(pending.iter().all(|p| p.flat_number == "C-303"));

    let err = list_pending_payments(&ctx, &owner)
        .await
        .expect_err("residents cannot list pending");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let history = payment_history(&ctx, &secretary, owner.member_id)
        .await
        .expect("secretary view");
    let periods: Vec<_> = history.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-04", "2024-03"]);

    let err = payment_history(&ctx, &neighbour, owner.member_id)
        .await
        .expect_err("neighbour cannot read history");
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

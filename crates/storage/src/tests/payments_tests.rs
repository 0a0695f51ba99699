use super::*;
use crate::{MemberInsert, NewMember, SocietyDetails};
use shared::domain::{MemberStatus, Role};
use std::sync::Arc;
use tokio::sync::Barrier;

struct Seeded {
    storage: Storage,
    society: SocietyId,
    resident: MemberId,
}

async fn seeded() -> Seeded {
    seed(Storage::new("sqlite::memory:").await.expect("db")).await
}

/// File-backed ledger, so the pool holds several connections and writers
/// really contend.
async fn seeded_on_disk(temp_root: &tempfile::TempDir) -> Seeded {
    let db_path = temp_root.path().join("payments.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    seed(Storage::new(&database_url).await.expect("db")).await
}

async fn seed(storage: Storage) -> Seeded {
    let secretary = insert_active(&storage, "Sita", "9000000001", Role::Secretary, None).await;
    let society = storage
        .upsert_society_for_secretary(
            secretary,
            &SocietyDetails {
                name: Some("Green Park"),
                ..SocietyDetails::default()
            },
        )
        .await
        .expect("society")
        .society_id;
    let resident = insert_active(&storage, "Asha", "9876543210", Role::Owner, Some(society)).await;
    Seeded {
        storage,
        society,
        resident,
    }
}

async fn insert_active(
    storage: &Storage,
    name: &str,
    mobile: &str,
    role: Role,
    society_id: Option<SocietyId>,
) -> MemberId {
    let member = NewMember {
        full_name: name,
        mobile_number: mobile,
        flat_number: "B-204",
        password_hash: "hash",
        role,
        society_id,
    };
    match storage
        .create_member(&member, MemberStatus::Active)
        .await
        .expect("member")
    {
        MemberInsert::Created(member) => member.member_id,
        MemberInsert::MobileTaken => panic!("mobile taken"),
    }
}

fn created(initiation: PaymentInitiation) -> StoredPayment {
    match initiation {
        PaymentInitiation::Created(payment) => payment,
        PaymentInitiation::AlreadyActive(existing) => {
            panic!("unexpected active payment {:?}", existing.payment_id)
        }
    }
}

#[tokio::test]
async fn second_initiation_for_period_reports_existing_payment() {
    let Seeded {
        storage,
        society,
        resident,
    } = seeded().await;

    let first = created(
        storage
            .initiate_payment(resident, society, 1500, "2024-03")
            .await
            .expect("initiate"),
    );
    assert_eq!(first.status, PaymentStatus::PendingVerification);

    match storage
        .initiate_payment(resident, society, 1500, "2024-03")
        .await
        .expect("initiate")
    {
        PaymentInitiation::AlreadyActive(existing) => {
            assert_eq!(existing.payment_id, first.payment_id);
            assert_eq!(existing.status, PaymentStatus::PendingVerification);
        }
        PaymentInitiation::Created(_) => panic!("duplicate active payment"),
    }

    created(
        storage
            .initiate_payment(resident, society, 1500, "2024-04")
            .await
            .expect("other period"),
    );
}

async fn race_initiations(storage: &Storage, society: SocietyId, resident: MemberId) -> usize {
    let barrier = Arc::new(Barrier::new(8));
    let attempts = (0..8)
        .map(|_| {
            let storage = storage.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                storage
                    .initiate_payment(resident, society, 900, "2024-05")
                    .await
            })
        })
        .collect::<Vec<_>>();

    let mut created_count = 0;
    for attempt in attempts {
        match attempt.await.expect("join").expect("initiate") {
            PaymentInitiation::Created(_) => created_count += 1,
            PaymentInitiation::AlreadyActive(existing) => {
                assert!(existing.status.is_active());
            }
        }
    }
    created_count
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_initiations_create_exactly_one_payment() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let Seeded {
        storage,
        society,
        resident,
    } = seeded_on_disk(&temp_root).await;

    assert_eq!(race_initiations(&storage, society, resident).await, 1);
    let history = storage.payment_history(resident).await.expect("history");
    assert_eq!(history.len(), 1);

    let transition = storage
        .set_payment_status(history[0].payment_id, PaymentStatus::Failed)
        .await
        .expect("fail");
    assert!(matches!(transition, PaymentTransition::Applied(_)));

    assert_eq!(race_initiations(&storage, society, resident).await, 1);
    let active = storage
        .active_payment(resident, "2024-05")
        .await
        .expect("active")
        .expect("retry row");
    assert_eq!(active.status, PaymentStatus::PendingVerification);
    assert_eq!(storage.payment_history(resident).await.expect("history").len(), 2);
}

#[tokio::test]
async fn failed_payment_allows_a_retry_but_success_does_not() {
    let Seeded {
        storage,
        society,
        resident,
    } = seeded().await;

    let first = created(
        storage
            .initiate_payment(resident, society, 1500, "2024-03")
            .await
            .expect("initiate"),
    );
    storage
        .set_payment_status(first.payment_id, PaymentStatus::Failed)
        .await
        .expect("fail");

    let retry = created(
        storage
            .initiate_payment(resident, society, 1500, "2024-03")
            .await
            .expect("retry"),
    );
    storage
        .set_payment_status(retry.payment_id, PaymentStatus::Success)
        .await
        .expect("verify");

    let blocked = storage
        .initiate_payment(resident, society, 1500, "2024-03")
        .await
        .expect("initiate");
    assert!(matches!(
        blocked,
        PaymentInitiation::AlreadyActive(existing)
            if existing.payment_id == retry.payment_id && existing.status == PaymentStatus::Success
    ));
}

#[tokio::test]
async fn status_change_applies_once() {
    let Seeded {
        storage,
        society,
        resident,
    } = seeded().await;
    let payment = created(
        storage
            .initiate_payment(resident, society, 1500, "2024-03")
            .await
            .expect("initiate"),
    );

    let applied = storage
        .set_payment_status(payment.payment_id, PaymentStatus::Success)
        .await
        .expect("verify");
    assert!(matches!(
        applied,
        PaymentTransition::Applied(ref p) if p.status == PaymentStatus::Success
    ));

    match storage
        .set_payment_status(payment.payment_id, PaymentStatus::Failed)
        .await
        .expect("second")
    {
        PaymentTransition::AlreadyTerminal(current) => {
            assert_eq!(current.status, PaymentStatus::Success)
        }
        other => panic!("expected terminal payment, got {other:?}"),
    }

    let missing = storage
        .set_payment_status(PaymentId(9_999), PaymentStatus::Success)
        .await
        .expect("missing");
    assert!(matches!(missing, PaymentTransition::Missing));
}

#[tokio::test]
async fn pending_list_joins_resident_and_drops_verified_rows() {
    let Seeded {
        storage,
        society,
        resident,
    } = seeded().await;
    let march = created(
        storage
            .initiate_payment(resident, society, 1500, "2024-03")
            .await
            .expect("march"),
    );
    let april = created(
        storage
            .initiate_payment(resident, society, 1500, "2024-04")
            .await
            .expect("april"),
    );
    storage
        .set_payment_status(march.payment_id, PaymentStatus::Success)
        .await
        .expect("verify");

    let pending = storage
        .pending_payments_for_society(society)
        .await
        .expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payment.payment_id, april.payment_id);
    assert_eq!(pending[0].full_name, "Asha");
    assert_eq!(pending[0].flat_number, "B-204");

    let history = storage.payment_history(resident).await.expect("history");
    let periods: Vec<_> = history.iter().map(|p| p.billing_period.as_str()).collect();
    assert_eq!(periods, vec!["2024-04", "2024-03"]);
}

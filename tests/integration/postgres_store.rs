//! PostgreSQL store tests
//!
//! Run against the database in `DATABASE_URL` after applying the migrations.
//! Every test creates its own equipment, so they can share one database.
//! Without `DATABASE_URL` each test returns early.

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use uuid::Uuid;

use equiptrack_server::{
    models::{
        category::CreateCategory,
        enums::{EquipmentStatus, LoanKind, MaintenanceType, RequestStatus},
        equipment::{CreateEquipment, EquipmentRecord},
        loan::NewLoan,
        maintenance::NewMaintenance,
        request::{NewLoanRequest, RequestDecision},
        user::UpdateProfile,
    },
    repository::{
        InventoryStore, PgStore, RequestStore, StoreTransaction, TransitionStore, UserStore,
    },
    services::lifecycle::LifecycleManager,
    AppError,
};

async fn store() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("database connection");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Some(PgStore::new(pool))
}

async fn equipment(store: &PgStore) -> EquipmentRecord {
    let suffix = Uuid::new_v4().simple().to_string();
    let category = store
        .create_category(&CreateCategory {
            name: format!("Lab {}", suffix),
            description: None,
        })
        .await
        .unwrap();
    store
        .create_equipment(&CreateEquipment {
            name: format!("Oscilloscope {}", suffix),
            category_id: category.id,
            description: None,
        })
        .await
        .unwrap()
}

fn new_loan(equipment_id: Uuid) -> NewLoan {
    NewLoan {
        equipment_id,
        user_id: Uuid::new_v4(),
        kind: LoanKind::Loan,
        scheduled_at: None,
        reservation_id: None,
    }
}

fn new_maintenance(equipment_id: Uuid) -> NewMaintenance {
    NewMaintenance {
        equipment_id,
        technician_id: Uuid::new_v4(),
        maintenance_type: MaintenanceType::Corrective,
    }
}

#[tokio::test]
async fn test_swap_from_stale_status_is_conflict_with_found_status() {
    let Some(store) = store().await else { return };
    let equipment = equipment(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.compare_and_swap_status(equipment.id, EquipmentStatus::Available, EquipmentStatus::Loaned)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .compare_and_swap_status(
            equipment.id,
            EquipmentStatus::Available,
            EquipmentStatus::Reserved,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
    assert_eq!(err.current_status(), Some(EquipmentStatus::Loaned));

    let err = tx
        .compare_and_swap_status(
            Uuid::new_v4(),
            EquipmentStatus::Available,
            EquipmentStatus::Loaned,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let Some(store) = store().await else { return };
    let equipment = equipment(&store).await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.compare_and_swap_status(
            equipment.id,
            EquipmentStatus::Available,
            EquipmentStatus::Loaned,
        )
        .await
        .unwrap();
        tx.open_loan(new_loan(equipment.id)).await.unwrap();
    }

    let current = store.get_equipment(equipment.id).await.unwrap();
    assert_eq!(current.status, EquipmentStatus::Available);
    let mut tx = store.begin().await.unwrap();
    assert!(tx.active_loan(equipment.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_second_active_loan_hits_unique_index() {
    let Some(store) = store().await else { return };
    let equipment = equipment(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.open_loan(new_loan(equipment.id)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.open_loan(new_loan(equipment.id)).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected { .. }));

    let mut tx = store.begin().await.unwrap();
    let err = tx.open_loan(new_loan(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_loan_and_maintenance_exclude_each_other() {
    let Some(store) = store().await else { return };
    let serviced = equipment(&store).await;
    let borrowed = equipment(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.open_maintenance(new_maintenance(serviced.id)).await.unwrap();
    tx.open_loan(new_loan(borrowed.id)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.open_loan(new_loan(serviced.id)).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected { .. }));

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .open_maintenance(new_maintenance(borrowed.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Rejected { .. }));

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .open_maintenance(new_maintenance(serviced.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Rejected { .. }));
}

#[tokio::test]
async fn test_concurrent_loans_through_manager() {
    let Some(store) = store().await else { return };
    let equipment = equipment(&store).await;
    let manager = LifecycleManager::new(Arc::new(store.clone()));

    let (a, b) = tokio::join!(
        manager.request_loan(equipment.id, Uuid::new_v4()),
        manager.request_loan(equipment.id, Uuid::new_v4()),
    );
    let loser = match (a, b) {
        (Ok(_), Err(l)) | (Err(l), Ok(_)) => l,
        other => panic!("expected exactly one winner, got {:?}", other),
    };
    assert_eq!(loser.current_status(), Some(EquipmentStatus::Loaned));
    assert!(matches!(
        loser,
        AppError::Conflict { .. } | AppError::InvalidState { .. }
    ));
}

#[tokio::test]
async fn test_request_ledger_constraints() {
    let Some(store) = store().await else { return };
    let equipment = equipment(&store).await;
    let user = Uuid::new_v4();
    let request = NewLoanRequest {
        equipment_id: equipment.id,
        user_id: user,
        kind: LoanKind::Loan,
        scheduled_at: None,
    };

    let pending = store.submit_request(request.clone()).await.unwrap();
    assert_eq!(pending.status, RequestStatus::Pending);
    let err = store.submit_request(request.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected { .. }));

    let err = store
        .submit_request(NewLoanRequest {
            equipment_id: Uuid::new_v4(),
            ..request.clone()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let decision = RequestDecision {
        status: RequestStatus::Rejected,
        decided_by: Uuid::new_v4(),
        decided_at: Utc::now(),
        loan_id: None,
        notes: None,
    };
    let mut tx = store.begin().await.unwrap();
    tx.settle_request(pending.id, decision.clone()).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.settle_request(pending.id, decision).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyClosed(_)));

    // A decided request no longer blocks a new one
    store.submit_request(request).await.unwrap();
}

#[tokio::test]
async fn test_profile_with_active_loan_is_kept() {
    let Some(store) = store().await else { return };
    let equipment = equipment(&store).await;
    let user = Uuid::new_v4();
    let email = format!("{}@example.org", user.simple());

    store
        .save_profile(
            user,
            &UpdateProfile {
                name: "Marta".into(),
                email: email.clone(),
            },
            Default::default(),
        )
        .await
        .unwrap();
    let err = store
        .save_profile(
            Uuid::new_v4(),
            &UpdateProfile {
                name: "Other".into(),
                email: email.to_uppercase(),
            },
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Rejected { .. }));

    let mut tx = store.begin().await.unwrap();
    tx.open_loan(NewLoan {
        user_id: user,
        ..new_loan(equipment.id)
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let err = store.delete_profile(user).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected { .. }));
    let err = store.delete_profile(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

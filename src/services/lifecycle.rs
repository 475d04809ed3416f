//! Equipment lifecycle manager
//!
//! Every operation runs in one store transaction: read the equipment, check
//! the transition is legal from its current status, compare-and-swap the
//! status, write the ledger entry, commit. Any error before the commit drops
//! the transaction and nothing is applied. A [`TransitionEvent`] is published
//! only after a successful commit.
//!
//! Legality comes from [`TransitionKind::allowed_from`], which reads the
//! regular status table for user-facing moves and the override table for
//! `MarkUnavailable` and `Restore`.

use chrono::{DateTime, Utc};
use std::{fmt::Debug, sync::Arc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, LoanKind, LoanStatus, MaintenanceType, RequestStatus},
        equipment::EquipmentRecord,
        loan::{CloseLoan, LoanRecord, NewLoan},
        maintenance::NewMaintenance,
        request::{LoanRequest, RequestDecision},
        transition::{
            ApprovedRequest, LoanTransition, MaintenanceTransition, OverrideTransition,
            TransitionEvent, TransitionKind,
        },
    },
    repository::{StoreTransaction, TransitionStore},
};

const EVENT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn TransitionStore>,
    events: broadcast::Sender<TransitionEvent>,
}

/// Request decisions, for failure logs
#[derive(Debug, Clone, Copy)]
enum Decision {
    ApproveRequest,
    RejectRequest,
}

/// Status `kind` moves the equipment to, or `InvalidState` when the table
/// has no such move from its current status
fn require_transition(
    equipment: &EquipmentRecord,
    kind: TransitionKind,
) -> AppResult<EquipmentStatus> {
    if !kind.allowed_from(equipment.status) {
        let message = match kind.edge() {
            Some((required, _)) => format!(
                "{:?} requires equipment {} to be {}",
                kind, equipment.id, required
            ),
            None => format!("Equipment {} is already {}", equipment.id, equipment.status),
        };
        return Err(AppError::invalid_state(message, equipment.status));
    }
    Ok(kind
        .edge()
        .map_or(EquipmentStatus::Unavailable, |(_, next)| next))
}

fn opening_transition(kind: LoanKind) -> TransitionKind {
    match kind {
        LoanKind::Loan => TransitionKind::Loan,
        LoanKind::Reservation => TransitionKind::Reservation,
    }
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn log_failure(kind: impl Debug, id: Uuid, err: &AppError) {
    match err {
        AppError::Conflict { found, .. } => {
            tracing::warn!(%id, ?kind, ?found, "Transition lost a concurrent update: {}", err)
        }
        AppError::StoreUnavailable(_) | AppError::Database(_) | AppError::Internal(_) => {
            tracing::error!(%id, ?kind, "Transition failed: {}", err)
        }
        _ => tracing::debug!(%id, ?kind, "Transition refused: {}", err),
    }
}

/// Active ledger entry of the given kind, with the equipment it references
async fn active_entry(
    tx: &mut dyn StoreTransaction,
    id: Uuid,
    kind: LoanKind,
) -> AppResult<(LoanRecord, EquipmentRecord)> {
    let entry = tx.loan(id).await?;
    if !entry.is_active() {
        return Err(AppError::NotFound(format!("No active {} {}", kind, id)));
    }
    let equipment = tx.equipment(entry.equipment_id).await?;
    if entry.kind != kind {
        return Err(AppError::invalid_state(
            format!("Record {} is a {}, not a {}", id, entry.kind, kind),
            equipment.status,
        ));
    }
    Ok((entry, equipment))
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn TransitionStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    /// Receive an event for every committed transition
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, kind: TransitionKind, before: &EquipmentRecord, after: &EquipmentRecord) {
        tracing::info!(
            equipment_id = %after.id,
            ?kind,
            from = %before.status,
            to = %after.status,
            "Transition committed"
        );
        // No subscriber is not an error
        let _ = self.events.send(TransitionEvent {
            equipment_id: after.id,
            kind,
            from: before.status,
            to: after.status,
            at: after.updated_at,
        });
    }

    /// Check out available equipment to a user
    pub async fn request_loan(&self, equipment_id: Uuid, user_id: Uuid) -> AppResult<LoanTransition> {
        self.open_entry(equipment_id, user_id, LoanKind::Loan, None)
            .await
            .inspect_err(|e| log_failure(TransitionKind::Loan, equipment_id, e))
    }

    /// Reserve available equipment for a future date
    pub async fn request_reservation(
        &self,
        equipment_id: Uuid,
        user_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> AppResult<LoanTransition> {
        self.open_entry(equipment_id, user_id, LoanKind::Reservation, Some(scheduled_at))
            .await
            .inspect_err(|e| log_failure(TransitionKind::Reservation, equipment_id, e))
    }

    async fn open_entry(
        &self,
        equipment_id: Uuid,
        user_id: Uuid,
        kind: LoanKind,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> AppResult<LoanTransition> {
        let transition = opening_transition(kind);
        let mut tx = self.store.begin().await?;
        let current = tx.equipment(equipment_id).await?;
        let next = require_transition(&current, transition)?;

        let equipment = tx
            .compare_and_swap_status(equipment_id, current.status, next)
            .await?;
        let loan = tx
            .open_loan(NewLoan {
                equipment_id,
                user_id,
                kind,
                scheduled_at,
                reservation_id: None,
            })
            .await
            .map_err(|e| e.with_status(current.status))?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(transition, &current, &equipment);
        Ok(LoanTransition {
            equipment,
            loan,
            reservation: None,
        })
    }

    /// Turn an active reservation into a loan for the same user
    pub async fn fulfill_reservation(&self, reservation_id: Uuid) -> AppResult<LoanTransition> {
        self.fulfill(reservation_id)
            .await
            .inspect_err(|e| log_failure(TransitionKind::FulfillReservation, reservation_id, e))
    }

    async fn fulfill(&self, reservation_id: Uuid) -> AppResult<LoanTransition> {
        let kind = TransitionKind::FulfillReservation;
        let mut tx = self.store.begin().await?;
        let (_, current) =
            active_entry(tx.as_mut(), reservation_id, LoanKind::Reservation).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(current.id, current.status, next)
            .await?;
        let now = Utc::now();
        let reservation = tx
            .close_loan(
                reservation_id,
                CloseLoan {
                    status: LoanStatus::Fulfilled,
                    closed_at: now,
                    notes: None,
                },
            )
            .await
            .map_err(|e| e.with_status(current.status))?;
        let loan = tx
            .open_loan(NewLoan {
                equipment_id: current.id,
                user_id: reservation.user_id,
                kind: LoanKind::Loan,
                scheduled_at: None,
                reservation_id: Some(reservation_id),
            })
            .await
            .map_err(|e| e.with_status(current.status))?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(LoanTransition {
            equipment,
            loan,
            reservation: Some(reservation),
        })
    }

    /// Cancel an active reservation, releasing the equipment
    pub async fn cancel_reservation(&self, reservation_id: Uuid) -> AppResult<LoanTransition> {
        self.cancel(reservation_id)
            .await
            .inspect_err(|e| log_failure(TransitionKind::CancelReservation, reservation_id, e))
    }

    async fn cancel(&self, reservation_id: Uuid) -> AppResult<LoanTransition> {
        let kind = TransitionKind::CancelReservation;
        let mut tx = self.store.begin().await?;
        let (_, current) =
            active_entry(tx.as_mut(), reservation_id, LoanKind::Reservation).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(current.id, current.status, next)
            .await?;
        let loan = tx
            .close_loan(
                reservation_id,
                CloseLoan {
                    status: LoanStatus::Cancelled,
                    closed_at: Utc::now(),
                    notes: None,
                },
            )
            .await
            .map_err(|e| e.with_status(current.status))?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(LoanTransition {
            equipment,
            loan,
            reservation: None,
        })
    }

    /// Close an active loan and make the equipment available again
    pub async fn return_equipment(
        &self,
        loan_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<LoanTransition> {
        self.return_loan(loan_id, clean_notes(notes))
            .await
            .inspect_err(|e| log_failure(TransitionKind::Return, loan_id, e))
    }

    async fn return_loan(&self, loan_id: Uuid, notes: Option<String>) -> AppResult<LoanTransition> {
        let kind = TransitionKind::Return;
        let mut tx = self.store.begin().await?;
        let (_, current) = active_entry(tx.as_mut(), loan_id, LoanKind::Loan).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(current.id, current.status, next)
            .await?;
        let loan = tx
            .close_loan(
                loan_id,
                CloseLoan {
                    status: LoanStatus::Returned,
                    closed_at: Utc::now(),
                    notes,
                },
            )
            .await
            .map_err(|e| e.with_status(current.status))?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(LoanTransition {
            equipment,
            loan,
            reservation: None,
        })
    }

    /// Take available equipment out of circulation for service
    pub async fn start_maintenance(
        &self,
        equipment_id: Uuid,
        technician_id: Uuid,
        maintenance_type: MaintenanceType,
    ) -> AppResult<MaintenanceTransition> {
        self.open_maintenance(equipment_id, technician_id, maintenance_type)
            .await
            .inspect_err(|e| log_failure(TransitionKind::StartMaintenance, equipment_id, e))
    }

    async fn open_maintenance(
        &self,
        equipment_id: Uuid,
        technician_id: Uuid,
        maintenance_type: MaintenanceType,
    ) -> AppResult<MaintenanceTransition> {
        let kind = TransitionKind::StartMaintenance;
        let mut tx = self.store.begin().await?;
        let current = tx.equipment(equipment_id).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(equipment_id, current.status, next)
            .await?;
        let maintenance = tx
            .open_maintenance(NewMaintenance {
                equipment_id,
                technician_id,
                maintenance_type,
            })
            .await
            .map_err(|e| e.with_status(current.status))?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(MaintenanceTransition {
            equipment,
            maintenance,
        })
    }

    /// Close an open maintenance record and return the equipment to service
    pub async fn end_maintenance(
        &self,
        maintenance_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<MaintenanceTransition> {
        self.close_maintenance(maintenance_id, clean_notes(notes))
            .await
            .inspect_err(|e| log_failure(TransitionKind::EndMaintenance, maintenance_id, e))
    }

    async fn close_maintenance(
        &self,
        maintenance_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<MaintenanceTransition> {
        let kind = TransitionKind::EndMaintenance;
        let mut tx = self.store.begin().await?;
        let record = tx.maintenance(maintenance_id).await?;
        if !record.is_open() {
            return Err(AppError::AlreadyClosed(format!(
                "Maintenance record {} is already closed",
                maintenance_id
            )));
        }
        let current = tx.equipment(record.equipment_id).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(current.id, current.status, next)
            .await?;
        let maintenance = tx
            .close_maintenance(maintenance_id, Utc::now(), notes)
            .await
            .map_err(|e| e.with_status(current.status))?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(MaintenanceTransition {
            equipment,
            maintenance,
        })
    }

    /// Administrative override: force equipment to `unavailable` from any other
    /// status. Open ledger entries are closed in the same transaction.
    pub async fn mark_unavailable(
        &self,
        equipment_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<OverrideTransition> {
        self.override_unavailable(equipment_id, clean_notes(reason))
            .await
            .inspect_err(|e| log_failure(TransitionKind::MarkUnavailable, equipment_id, e))
    }

    async fn override_unavailable(
        &self,
        equipment_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<OverrideTransition> {
        let kind = TransitionKind::MarkUnavailable;
        let mut tx = self.store.begin().await?;
        let current = tx.equipment(equipment_id).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(equipment_id, current.status, next)
            .await?;
        let now = Utc::now();

        let closed_loan = match tx.active_loan(equipment_id).await? {
            Some(active) => Some(
                tx.close_loan(
                    active.id,
                    CloseLoan {
                        status: LoanStatus::Cancelled,
                        closed_at: now,
                        notes: reason.clone(),
                    },
                )
                .await
                .map_err(|e| e.with_status(current.status))?,
            ),
            None => None,
        };
        let closed_maintenance = match tx.open_maintenance_for(equipment_id).await? {
            Some(open) => Some(
                tx.close_maintenance(open.id, now, reason)
                    .await
                    .map_err(|e| e.with_status(current.status))?,
            ),
            None => None,
        };
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(OverrideTransition {
            equipment,
            closed_loan,
            closed_maintenance,
        })
    }

    /// Administrative restore of unavailable equipment
    pub async fn restore(&self, equipment_id: Uuid) -> AppResult<EquipmentRecord> {
        self.restore_available(equipment_id)
            .await
            .inspect_err(|e| log_failure(TransitionKind::Restore, equipment_id, e))
    }

    async fn restore_available(&self, equipment_id: Uuid) -> AppResult<EquipmentRecord> {
        let kind = TransitionKind::Restore;
        let mut tx = self.store.begin().await?;
        let current = tx.equipment(equipment_id).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(equipment_id, current.status, next)
            .await?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(equipment)
    }

    /// Approve a pending request: open the loan or reservation it asks for and
    /// record the decision in the same transaction
    pub async fn approve_request(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
    ) -> AppResult<ApprovedRequest> {
        self.approve(request_id, admin_id)
            .await
            .inspect_err(|e| log_failure(Decision::ApproveRequest, request_id, e))
    }

    async fn approve(&self, request_id: Uuid, admin_id: Uuid) -> AppResult<ApprovedRequest> {
        let mut tx = self.store.begin().await?;
        let pending = tx.loan_request(request_id).await?;
        if !pending.is_pending() {
            return Err(AppError::AlreadyClosed(format!(
                "Request {} is already {}",
                request_id, pending.status
            )));
        }

        let kind = opening_transition(pending.kind);
        let current = tx.equipment(pending.equipment_id).await?;
        let next = require_transition(&current, kind)?;

        let equipment = tx
            .compare_and_swap_status(current.id, current.status, next)
            .await?;
        let loan = tx
            .open_loan(NewLoan {
                equipment_id: current.id,
                user_id: pending.user_id,
                kind: pending.kind,
                scheduled_at: pending.scheduled_at,
                reservation_id: None,
            })
            .await
            .map_err(|e| e.with_status(current.status))?;
        let request = tx
            .settle_request(
                request_id,
                RequestDecision {
                    status: RequestStatus::Approved,
                    decided_by: admin_id,
                    decided_at: Utc::now(),
                    loan_id: Some(loan.id),
                    notes: None,
                },
            )
            .await
            .map_err(|e| e.with_status(current.status))?;
        tx.commit().await.map_err(|e| e.with_status(current.status))?;

        self.publish(kind, &current, &equipment);
        Ok(ApprovedRequest {
            request,
            equipment,
            loan,
        })
    }

    /// Reject a pending request. The equipment is untouched.
    pub async fn reject_request(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<LoanRequest> {
        self.reject(request_id, admin_id, clean_notes(notes))
            .await
            .inspect_err(|e| log_failure(Decision::RejectRequest, request_id, e))
    }

    async fn reject(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<LoanRequest> {
        let mut tx = self.store.begin().await?;
        let request = tx
            .settle_request(
                request_id,
                RequestDecision {
                    status: RequestStatus::Rejected,
                    decided_by: admin_id,
                    decided_at: Utc::now(),
                    loan_id: None,
                    notes,
                },
            )
            .await?;
        tx.commit().await?;

        tracing::info!(%request_id, %admin_id, "Request rejected");
        Ok(request)
    }
}

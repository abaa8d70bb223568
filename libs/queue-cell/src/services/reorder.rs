// libs/queue-cell/src/services/reorder.rs
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::QueueError;
use crate::models::{
    PromotionOutcome, PromotionPlan, QueueAssignment, Reservation, ReservationId, ReservationUpdate,
};
use crate::store::QueueStore;

pub const DEFAULT_PRIORITY_REASON: &str = "Emergency";

/// Only a checked-in, non-priority reservation can jump the queue.
pub fn ensure_promotable(reservation: &Reservation) -> Result<(), QueueError> {
    if reservation.is_priority {
        return Err(QueueError::AlreadyPriority(reservation.id));
    }
    if !reservation.is_waiting() {
        return Err(QueueError::NotWaiting(reservation.id));
    }
    Ok(())
}

/// Puts `target` at number 1 and renumbers the rest of the waiting list 2..=n
/// in their current order, leaving no gaps or duplicates.
pub fn plan_promotion(
    target: &Reservation,
    waiting: &[Reservation],
    reason: Option<&str>,
) -> Result<PromotionPlan, QueueError> {
    ensure_promotable(target)?;

    let mut others: Vec<&Reservation> = waiting
        .iter()
        .filter(|r| r.id != target.id && r.is_waiting())
        .collect();
    others.sort_by_key(|r| (r.queue_number.is_none(), r.queue_number, r.id));

    let mut assignments = Vec::with_capacity(others.len() + 1);
    assignments.push(QueueAssignment { reservation_id: target.id, queue_number: 1 });
    assignments.extend(others.iter().zip(2..).map(|(r, queue_number)| QueueAssignment {
        reservation_id: r.id,
        queue_number,
    }));

    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_PRIORITY_REASON)
        .to_string();

    Ok(PromotionPlan {
        reservation_id: target.id,
        doctor_id: target.doctor_id,
        date: target.reservation_date,
        reason,
        assignments,
    })
}

pub struct QueueReorderService {
    store: Arc<dyn QueueStore>,
}

impl QueueReorderService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    async fn load(&self, reservation_id: ReservationId) -> Result<Reservation, QueueError> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or(QueueError::ReservationNotFound(reservation_id))
    }

    /// Moves a waiting reservation to the front of its doctor's queue for the day.
    #[instrument(skip(self))]
    pub async fn promote_to_priority(
        &self,
        reservation_id: ReservationId,
        reason: Option<&str>,
    ) -> Result<PromotionOutcome, QueueError> {
        let target = self.load(reservation_id).await?;
        ensure_promotable(&target)?;

        let waiting = self
            .store
            .list_waiting(target.doctor_id, target.reservation_date)
            .await?;
        let plan = plan_promotion(&target, &waiting, reason)?;
        debug!("Promotion plan for {}: {:?}", reservation_id, plan.assignments);

        self.store.apply_promotion(&plan).await?;

        info!(
            "Reservation {} promoted to priority for doctor {} on {} ({} renumbered)",
            reservation_id,
            plan.doctor_id,
            plan.date,
            plan.assignments.len() - 1
        );

        Ok(PromotionOutcome {
            reservation_id,
            new_queue_number: 1,
            reordered: plan.assignments.len() - 1,
        })
    }

    /// Promotion when priority is switched on for a non-priority reservation;
    /// otherwise a plain field update that leaves every queue number alone.
    #[instrument(skip(self))]
    pub async fn update_priority(
        &self,
        reservation_id: ReservationId,
        is_priority: Option<bool>,
        reason: Option<String>,
    ) -> Result<Reservation, QueueError> {
        let reservation = self.load(reservation_id).await?;

        if is_priority == Some(true) && !reservation.is_priority {
            self.promote_to_priority(reservation_id, reason.as_deref()).await?;
            return self.load(reservation_id).await;
        }

        let mut update = ReservationUpdate {
            is_priority,
            ..ReservationUpdate::default()
        };
        if is_priority == Some(false) {
            update.priority_reason = Some(None);
        }
        if let Some(reason) = reason {
            update.priority_reason = Some(Some(reason));
        }

        let updated = self.store.update_reservation(reservation_id, &update).await?;
        debug!("Reservation {} priority fields updated without reordering", reservation_id);
        Ok(updated)
    }
}

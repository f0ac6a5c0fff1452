use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::slots;

/// Lifecycle state of a slot.
///
/// `RESERVED` covers two situations that share the external state name:
/// a pre-payment lease (lease holder and expiry set) and a partially
/// paid booking (lease fields cleared). The lease expiry being absent is
/// what tells them apart.
#[derive(Debug, Deserialize, PartialEq)]
pub enum SlotState {
    AVAILABLE,
    RESERVED,
    BOOKED,
    BLOCKED,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One bookable time unit for one net of a turf on a specific date.
///
/// Identity is unique on (turf, date, start time, net). Rows are created
/// in bulk by schedule generation and only ever mutated through the
/// transitions below, each of which locks the row for the duration of
/// its read-check-write sequence.
#[derive(Debug, Serialize, Queryable, Identifiable, Clone)]
pub struct Slot {
    pub id: i64,
    pub turf_id: i64,
    pub net_no: i16,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: i64,
    pub tariff_label: String,
    pub state: String,
    pub lease_holder: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub block_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[table_name = "slots"]
pub struct NewSlot {
    pub turf_id: i64,
    pub net_no: i16,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: i64,
    pub tariff_label: String,
    pub state: String,
    pub block_reason: Option<String>,
}

impl Slot {
    /// Whether a new lease may be taken on this slot at `now`.
    ///
    /// An expired lease counts as no lease at all (soft expiry, no
    /// background sweep). A `RESERVED` slot without an expiry is a
    /// partially paid booking and is never re-leasable.
    pub fn leasable_at(&self, now: DateTime<Utc>) -> bool {
        if self.state == SlotState::AVAILABLE.to_string() {
            return true;
        }

        if self.state == SlotState::RESERVED.to_string() {
            return match self.lease_expires_at {
                Some(expiry) => expiry < now,
                None => false,
            };
        }

        false
    }

    /// Whether the atomic booking transaction accepts this slot.
    /// Booking a leased slot is allowed: that is the payment-completion
    /// path. A partially paid slot slips through this check but the
    /// unique index on active bookings rejects the insert.
    pub fn bookable(&self) -> bool {
        self.state == SlotState::AVAILABLE.to_string()
            || self.state == SlotState::RESERVED.to_string()
    }

    /// Take a time-bounded hold on a slot pending payment.
    ///
    /// Returns `Ok(false)` when someone else got there first; a conflict
    /// is a business fact, not an error, and is never retried here.
    #[tracing::instrument(skip(conn))]
    pub fn reserve(
        slot_id: i64,
        holder: &str,
        lease: Duration,
        conn: &db::Conn,
    ) -> Result<bool, ServiceError> {
        let now = Utc::now();

        conn.transaction::<bool, ServiceError, _>(|| {
            let slot = Slot::lock_by_id(slot_id, conn)?;

            if !slot.leasable_at(now) {
                return Ok(false);
            }

            diesel::update(&slot)
                .set((
                    slots::state.eq(SlotState::RESERVED.to_string()),
                    slots::lease_holder.eq(Some(holder.to_string())),
                    slots::lease_expires_at.eq(Some(now + lease)),
                    slots::updated_at.eq(Some(now)),
                ))
                .execute(conn)?;

            Ok(true)
        })
    }

    /// Drop any lease and make the slot available again. Idempotent;
    /// releasing an unknown or already free slot is a no-op.
    #[tracing::instrument(skip(conn))]
    pub fn release(slot_id: i64, conn: &db::Conn) -> Result<(), ServiceError> {
        conn.transaction::<(), ServiceError, _>(|| {
            let slot = slots::table
                .filter(slots::id.eq(slot_id))
                .for_update()
                .first::<Slot>(conn)
                .optional()?;

            if let Some(slot) = slot {
                slot.free(conn)?;
            }

            Ok(())
        })
    }

    /// Owner override: take a slot off the grid. Only available slots
    /// can be blocked, a booked or leased slot is a conflict.
    #[tracing::instrument(skip(conn))]
    pub fn block(slot_id: i64, reason: &str, conn: &db::Conn) -> Result<Slot, ServiceError> {
        conn.transaction::<Slot, ServiceError, _>(|| {
            let slot = Slot::lock_by_id(slot_id, conn)?;

            if slot.state != SlotState::AVAILABLE.to_string() {
                conflict!("only available slots can be blocked");
            }

            let slot = diesel::update(&slot)
                .set((
                    slots::state.eq(SlotState::BLOCKED.to_string()),
                    slots::block_reason.eq(Some(reason.to_string())),
                    slots::lease_holder.eq(None::<String>),
                    slots::lease_expires_at.eq(None::<DateTime<Utc>>),
                    slots::updated_at.eq(Some(Utc::now())),
                ))
                .get_result::<Slot>(conn)?;

            Ok(slot)
        })
    }

    #[tracing::instrument(skip(conn))]
    pub fn unblock(slot_id: i64, conn: &db::Conn) -> Result<Slot, ServiceError> {
        conn.transaction::<Slot, ServiceError, _>(|| {
            let slot = Slot::lock_by_id(slot_id, conn)?;

            if slot.state != SlotState::BLOCKED.to_string() {
                conflict!("only blocked slots can be unblocked");
            }

            let slot = diesel::update(&slot)
                .set((
                    slots::state.eq(SlotState::AVAILABLE.to_string()),
                    slots::block_reason.eq(None::<String>),
                    slots::updated_at.eq(Some(Utc::now())),
                ))
                .get_result::<Slot>(conn)?;

            Ok(slot)
        })
    }

    /// The day grid for one turf, every net, ordered for display.
    pub fn find_for_day(
        turf_id: i64,
        date: NaiveDate,
        conn: &db::Conn,
    ) -> Result<Vec<Slot>, ServiceError> {
        let slots = slots::table
            .filter(slots::turf_id.eq(turf_id))
            .filter(slots::date.eq(date))
            .order((slots::net_no, slots::start_time))
            .load::<Slot>(conn)?;

        Ok(slots)
    }

    /// `SELECT ... FOR UPDATE` on a single slot row. Every transition
    /// goes through this; the row lock is what keeps concurrent
    /// reserve/book/cancel calls on the same slot from interleaving.
    /// Has to run inside a transaction.
    pub(crate) fn lock_by_id(slot_id: i64, conn: &db::Conn) -> Result<Slot, ServiceError> {
        let slot = slots::table
            .filter(slots::id.eq(slot_id))
            .for_update()
            .first::<Slot>(conn)
            .optional()?;

        match slot {
            Some(slot) => Ok(slot),
            None => Err(ServiceError::NotFound("slot not found".into())),
        }
    }

    /// Reset to `AVAILABLE`, clearing lease and block metadata. Used by
    /// release and by booking cancellation; assumes the row is locked.
    pub(crate) fn free(&self, conn: &db::Conn) -> Result<(), ServiceError> {
        diesel::update(self)
            .set((
                slots::state.eq(SlotState::AVAILABLE.to_string()),
                slots::lease_holder.eq(None::<String>),
                slots::lease_expires_at.eq(None::<DateTime<Utc>>),
                slots::block_reason.eq(None::<String>),
                slots::updated_at.eq(Some(Utc::now())),
            ))
            .execute(conn)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Add;

    fn slot_in_state(state: SlotState) -> Slot {
        Slot {
            id: 1,
            turf_id: 1,
            net_no: 1,
            date: NaiveDate::from_ymd(2026, 9, 1),
            start_time: NaiveTime::from_hms(18, 0, 0),
            end_time: NaiveTime::from_hms(19, 0, 0),
            price: 80_000,
            tariff_label: String::from("Standard"),
            state: state.to_string(),
            lease_holder: None,
            lease_expires_at: None,
            block_reason: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn available_slot_is_leasable() {
        let slot = slot_in_state(SlotState::AVAILABLE);

        assert!(slot.leasable_at(Utc::now()));
    }

    #[test]
    fn valid_lease_by_someone_else_is_not_leasable() {
        let mut slot = slot_in_state(SlotState::RESERVED);
        slot.lease_holder = Some(String::from("holder-a"));
        slot.lease_expires_at = Some(Utc::now().add(Duration::minutes(10)));

        assert!(!slot.leasable_at(Utc::now()));
    }

    #[test]
    fn expired_lease_is_leasable_again() {
        let mut slot = slot_in_state(SlotState::RESERVED);
        slot.lease_holder = Some(String::from("holder-a"));
        slot.lease_expires_at = Some(Utc::now().add(Duration::minutes(10)));

        // simulate the clock moving past the lease expiry
        let later = Utc::now().add(Duration::minutes(11));

        assert!(slot.leasable_at(later));
    }

    #[test]
    fn partially_paid_slot_is_never_leasable() {
        // RESERVED without an expiry means an advance was paid against
        // an active booking, not that a lease is pending
        let slot = slot_in_state(SlotState::RESERVED);

        assert!(!slot.leasable_at(Utc::now().add(Duration::days(365))));
    }

    #[test]
    fn booked_and_blocked_slots_are_not_leasable() {
        assert!(!slot_in_state(SlotState::BOOKED).leasable_at(Utc::now()));
        assert!(!slot_in_state(SlotState::BLOCKED).leasable_at(Utc::now()));
    }

    #[test]
    fn bookable_states() {
        assert!(slot_in_state(SlotState::AVAILABLE).bookable());
        assert!(slot_in_state(SlotState::RESERVED).bookable());
        assert!(!slot_in_state(SlotState::BOOKED).bookable());
        assert!(!slot_in_state(SlotState::BLOCKED).bookable());
    }
}

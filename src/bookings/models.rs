use chrono::{DateTime, Utc};
use diesel::prelude::*;
use regex::Regex;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::{bookings, slots};
use crate::slots::{Slot, SlotState};
use crate::turfs::Turf;

/// Where a booking came from: the customer app, a phone call taken by
/// the operator, or a walk-in at the venue.
#[derive(Debug, Deserialize)]
pub enum BookingSource {
    APP,
    PHONE,
    WALK_IN,
}

#[derive(Debug, Deserialize)]
pub enum PaymentMode {
    ONLINE,
    OFFLINE,
}

#[derive(Debug, Deserialize, PartialEq)]
pub enum BookingStatus {
    CONFIRMED,
    CANCELLED,
}

impl std::fmt::Display for BookingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A confirmed or historical reservation of exactly one slot.
///
/// Rows are written only by the atomic booking and cancellation
/// transactions below; the slot binding never changes in place. A slot
/// that was cancelled and re-booked accumulates one row per cycle,
/// preserving the audit history. The partial unique index on
/// (slot_id) WHERE status = 'CONFIRMED' keeps the "at most one active
/// booking per slot" invariant enforced even outside this code path.
#[derive(Debug, Serialize, Queryable, Identifiable)]
pub struct Booking {
    pub id: i64,
    pub slot_id: i64,
    pub turf_id: i64,
    pub owner_id: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub user_id: Option<i64>,
    pub source: String,
    pub payment_mode: String,
    pub payment_status: String,
    pub amount: i64,
    pub advance_amount: i64,
    pub status: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[table_name = "bookings"]
struct InsertBooking {
    slot_id: i64,
    turf_id: i64,
    owner_id: i64,
    customer_name: String,
    customer_phone: String,
    user_id: Option<i64>,
    source: String,
    payment_mode: String,
    payment_status: String,
    amount: i64,
    advance_amount: i64,
    status: String,
}

/// What the caller sends to book a slot.
#[derive(Debug, Deserialize)]
pub struct NewBooking {
    pub slot_id: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub user_id: Option<i64>,
    pub source: BookingSource,
    pub payment_mode: PaymentMode,
    pub amount: i64,
    #[serde(default)]
    pub advance_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct BookingFilter {
    pub turf_id: Option<i64>,
    pub status: Option<BookingStatus>,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBooking {
    pub slot_id: i64,
    pub cancelled_by: String,
    pub reason: Option<String>,
}

impl NewBooking {
    /// The atomic booking transaction.
    ///
    /// Locks the targeted slot row, verifies it can still be booked,
    /// settles the slot's final state from the payment posture and
    /// inserts the confirmed booking. All of it commits or none of it
    /// does; a lost race surfaces as a Conflict the caller resolves by
    /// picking another slot, never by automatic retry.
    #[tracing::instrument(skip(self, conn), fields(slot_id = self.slot_id))]
    pub fn save(&self, conn: &db::Conn) -> Result<Booking, ServiceError> {
        self.validate()?;

        conn.transaction::<Booking, ServiceError, _>(|| {
            let slot = Slot::lock_by_id(self.slot_id, conn)?;

            if !slot.bookable() {
                conflict!("slot is no longer available");
            }

            let turf = Turf::find_by_id(slot.turf_id, conn)?;

            diesel::update(&slot)
                .set((
                    slots::state.eq(self.settled_state().to_string()),
                    slots::lease_holder.eq(None::<String>),
                    slots::lease_expires_at.eq(None::<DateTime<Utc>>),
                    slots::updated_at.eq(Some(Utc::now())),
                ))
                .execute(conn)?;

            // a partially paid slot still carries its CONFIRMED booking;
            // the unique index turns this insert into a Conflict
            let booking = diesel::insert_into(bookings::table)
                .values(InsertBooking {
                    slot_id: slot.id,
                    turf_id: turf.id,
                    owner_id: turf.owner_id,
                    customer_name: self.customer_name.trim().to_string(),
                    customer_phone: self.customer_phone.trim().to_string(),
                    user_id: self.user_id,
                    source: self.source.to_string(),
                    payment_mode: self.payment_mode.to_string(),
                    payment_status: self.payment_status().to_string(),
                    amount: self.amount,
                    advance_amount: self.advance_amount,
                    status: BookingStatus::CONFIRMED.to_string(),
                })
                .get_result::<Booking>(conn)?;

            Ok(booking)
        })
    }

    /// The slot state a successful booking leaves behind: a partial
    /// advance keeps the slot `RESERVED` to signal "not fully settled"
    /// to the operator; pay-at-venue and fully settled bookings go
    /// straight to `BOOKED`.
    pub fn settled_state(&self) -> SlotState {
        if self.advance_amount > 0 && self.advance_amount < self.amount {
            SlotState::RESERVED
        } else {
            SlotState::BOOKED
        }
    }

    pub fn payment_status(&self) -> &'static str {
        if self.advance_amount >= self.amount {
            "PAID"
        } else if self.advance_amount > 0 {
            "PARTIAL"
        } else {
            "PENDING"
        }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.customer_name.trim().is_empty() {
            bad_request!("the customer name cannot be empty");
        }

        if self.customer_name.trim().len() > 80 {
            bad_request!("the customer name is too long, maximum 80 characters");
        }

        let pattern: Regex = Regex::new(r"^\+?[0-9][0-9 -]{5,14}$").unwrap();
        if !pattern.is_match(self.customer_phone.trim()) {
            bad_request!("the customer phone number is not valid");
        }

        if self.amount <= 0 {
            bad_request!("the booking amount has to be above 0");
        }

        if self.advance_amount < 0 {
            bad_request!("the advance amount cannot be negative");
        }

        if self.advance_amount > self.amount {
            bad_request!("the advance amount cannot exceed the booking amount");
        }

        Ok(())
    }
}

impl Booking {
    /// The atomic cancellation transaction: mark the booking cancelled
    /// and free its slot, both or neither. Cancellation unconditionally
    /// frees the slot; the only guards are that the booking exists,
    /// references the given slot and was not already cancelled.
    #[tracing::instrument(skip(conn))]
    pub fn cancel(
        booking_id: i64,
        slot_id: i64,
        cancelled_by: &str,
        reason: Option<String>,
        conn: &db::Conn,
    ) -> Result<Booking, ServiceError> {
        conn.transaction::<Booking, ServiceError, _>(|| {
            let booking = bookings::table
                .filter(bookings::id.eq(booking_id))
                .for_update()
                .first::<Booking>(conn)
                .optional()?;

            let booking = match booking {
                Some(booking) => booking,
                None => return Err(ServiceError::NotFound("booking not found".into())),
            };

            if booking.slot_id != slot_id {
                bad_request!("the booking does not reference this slot");
            }

            if booking.status == BookingStatus::CANCELLED.to_string() {
                conflict!("booking is already cancelled");
            }

            let slot = Slot::lock_by_id(booking.slot_id, conn)?;

            let booking = diesel::update(&booking)
                .set((
                    bookings::status.eq(BookingStatus::CANCELLED.to_string()),
                    bookings::cancelled_at.eq(Some(Utc::now())),
                    bookings::cancelled_by.eq(Some(cancelled_by.to_string())),
                    bookings::cancel_reason.eq(reason),
                    bookings::updated_at.eq(Some(Utc::now())),
                ))
                .get_result::<Booking>(conn)?;

            slot.free(conn)?;

            Ok(booking)
        })
    }

    pub fn find_by_id(booking_id: i64, conn: &db::Conn) -> Result<Booking, ServiceError> {
        let booking = bookings::table
            .filter(bookings::id.eq(booking_id))
            .first::<Booking>(conn)
            .optional()?;

        match booking {
            Some(booking) => Ok(booking),
            None => Err(ServiceError::NotFound("booking not found".into())),
        }
    }

    pub fn find_all(
        filter: BookingFilter,
        conn: &db::Conn,
    ) -> Result<Vec<Booking>, ServiceError> {
        let mut query = bookings::table.order(bookings::id.desc()).into_boxed();

        if let Some(turf_id) = filter.turf_id {
            query = query.filter(bookings::turf_id.eq(turf_id));
        }

        if let Some(status) = filter.status {
            query = query.filter(bookings::status.eq(status.to_string()));
        }

        if let Some(phone) = filter.customer_phone {
            query = query.filter(bookings::customer_phone.eq(phone));
        }

        let bookings = query.load::<Booking>(conn)?;
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_booking() -> NewBooking {
        NewBooking {
            slot_id: 1,
            customer_name: String::from("Ravi Kumar"),
            customer_phone: String::from("+91 98765 43210"),
            user_id: None,
            source: BookingSource::WALK_IN,
            payment_mode: PaymentMode::OFFLINE,
            amount: 80_000,
            advance_amount: 0,
        }
    }

    #[test]
    fn pay_at_venue_books_the_slot() {
        let booking = valid_booking();

        assert_eq!(booking.settled_state(), SlotState::BOOKED);
        assert_eq!(booking.payment_status(), "PENDING");
    }

    #[test]
    fn partial_advance_keeps_the_slot_reserved() {
        let mut booking = valid_booking();
        booking.advance_amount = 20_000;

        assert_eq!(booking.settled_state(), SlotState::RESERVED);
        assert_eq!(booking.payment_status(), "PARTIAL");
    }

    #[test]
    fn full_advance_is_settled() {
        let mut booking = valid_booking();
        booking.advance_amount = booking.amount;

        assert_eq!(booking.settled_state(), SlotState::BOOKED);
        assert_eq!(booking.payment_status(), "PAID");
    }

    #[test]
    fn valid_booking_passes_validation() {
        assert!(valid_booking().validate().is_ok());
    }

    #[test]
    fn invalid_phone_numbers() {
        let mut booking = valid_booking();

        booking.customer_phone = String::from("not a number");
        assert!(booking.validate().is_err());

        booking.customer_phone = String::from("123");
        assert!(booking.validate().is_err());
    }

    #[test]
    fn advance_cannot_exceed_amount() {
        let mut booking = valid_booking();
        booking.advance_amount = booking.amount + 1;

        assert!(booking.validate().is_err());
    }

    #[test]
    fn amount_has_to_be_positive() {
        let mut booking = valid_booking();
        booking.amount = 0;

        assert!(booking.validate().is_err());
    }

    #[test]
    fn empty_customer_name() {
        let mut booking = valid_booking();
        booking.customer_name = String::from("   ");

        assert!(booking.validate().is_err());
    }

    fn booking_for(slot_id: i64, customer_name: &str) -> NewBooking {
        NewBooking {
            slot_id,
            customer_name: customer_name.to_string(),
            customer_phone: String::from("+91 98765 43210"),
            user_id: None,
            source: BookingSource::WALK_IN,
            payment_mode: PaymentMode::OFFLINE,
            amount: 80_000,
            advance_amount: 0,
        }
    }

    fn test_pool() -> crate::db::Pool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL is not set");
        crate::db::migrate(&url).expect("unable to run the migrations");
        crate::db::build_connection_pool(&url).expect("unable to build the connection pool")
    }

    #[test]
    #[ignore] // needs a running Postgres, set TEST_DATABASE_URL
    fn concurrent_bookings_take_exactly_one() {
        use crate::slots::schedule;
        use crate::turfs::models::CreateTurf;
        use chrono::{NaiveDate, NaiveTime};

        let pool = test_pool();
        let conn = pool.get().unwrap();

        let turf = Turf::create(
            CreateTurf {
                name: String::from("Race Arena"),
                owner_id: 1,
                open_time: NaiveTime::from_hms(6, 0, 0),
                close_time: NaiveTime::from_hms(23, 0, 0),
                slot_minutes: 60,
                net_count: 1,
                base_price: 80_000,
            },
            &conn,
        )
        .unwrap();

        let date = NaiveDate::from_ymd(2026, 9, 5);
        schedule::generate_for_day(&turf, &[], date, &conn).unwrap();

        let slot_id = Slot::find_for_day(turf.id, date, &conn)
            .unwrap()
            .into_iter()
            .find(|slot| slot.state == SlotState::AVAILABLE.to_string())
            .unwrap()
            .id;

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let conn = pool.get().unwrap();
                    booking_for(slot_id, &format!("Customer {}", i)).save(&conn)
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        // exactly one caller wins the row lock, the other gets a
        // Conflict to surface as "please pick another slot"
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);

        let failures: Vec<_> = results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], ServiceError::Conflict(_)));

        let slot = Slot::find_for_day(turf.id, date, &conn)
            .unwrap()
            .into_iter()
            .find(|slot| slot.id == slot_id)
            .unwrap();
        assert_eq!(slot.state, SlotState::BOOKED.to_string());
    }
}

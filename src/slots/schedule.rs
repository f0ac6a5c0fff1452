use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime, Timelike, Utc};
use diesel::prelude::*;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::slots;
use crate::slots::models::{NewSlot, Slot, SlotState};
use crate::turfs::{Tariff, Turf};

/// Block reason stamped on slots generation itself takes off the grid.
/// Owner-placed blocks carry any other reason and are left alone.
pub const AUTO_BLOCK_REASON: &str = "Closed";

const SECONDS_PER_DAY: u32 = 86_400;

/// One entry of a planned day grid, before it is priced and persisted.
#[derive(Debug, PartialEq)]
pub struct PlannedSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// true when the slot would run past closing time; it still gets a
    /// ledger row so the owner dashboard can render a complete grid
    pub blocked: bool,
}

/// Price and tariff label stamped on a slot at generation time.
#[derive(Debug, PartialEq)]
pub struct Quote {
    pub price: i64,
    pub label: String,
}

/// Cut the operating window into slots of `slot_minutes`, from opening
/// to closing time. The slot starting exactly at closing time is
/// included on purpose: operator policy allows a last booking at the
/// boundary, and slots that would run past closing are planned as
/// blocked rather than omitted.
pub fn plan_day(open: NaiveTime, close: NaiveTime, slot_minutes: i64) -> Vec<PlannedSlot> {
    let mut planned = Vec::new();

    if slot_minutes <= 0 {
        return planned;
    }

    let step = (slot_minutes * 60) as u32;
    let close_secs = close.num_seconds_from_midnight();

    let mut start_secs = open.num_seconds_from_midnight();
    while start_secs <= close_secs {
        let end_secs = start_secs + step;

        planned.push(PlannedSlot {
            start: time_from_secs(start_secs),
            // the trailing slot may end at 24:00, which wraps to 00:00
            end: time_from_secs(end_secs % SECONDS_PER_DAY),
            blocked: end_secs > close_secs,
        });

        start_secs += step;
    }

    planned
}

/// Pure tariff lookup: the first band whose window contains the start
/// time wins, otherwise the turf's base price applies.
pub fn quote(bands: &[Tariff], base_price: i64, start: NaiveTime) -> Quote {
    for band in bands {
        if band.start_time <= start && start < band.end_time {
            return Quote {
                price: band.price,
                label: band.label.clone(),
            };
        }
    }

    Quote {
        price: base_price,
        label: String::from("Standard"),
    }
}

/// (Re)generate the slot ledger for one turf and date.
///
/// Each net is synced in its own transaction, so a failure on one net
/// leaves the others' grids intact. Rows holding real bookings
/// (`BOOKED`/`RESERVED`) are never altered or duplicated; rows still in
/// a removable state get their price, tariff label and auto-block
/// status resynced, and available rows that fell out of the operating
/// window are deleted. Returns the number of rows created.
#[tracing::instrument(skip(turf, bands, conn), fields(turf_id = turf.id))]
pub fn generate_for_day(
    turf: &Turf,
    bands: &[Tariff],
    date: NaiveDate,
    conn: &db::Conn,
) -> Result<usize, ServiceError> {
    let planned = plan_day(turf.open_time, turf.close_time, i64::from(turf.slot_minutes));

    let mut created = 0;
    for net in 1..=turf.net_count {
        created += sync_net(turf, bands, date, net, &planned, conn)?;
        debug!("synced net {} of turf {} for {}", net, turf.id, date);
    }

    Ok(created)
}

fn sync_net(
    turf: &Turf,
    bands: &[Tariff],
    date: NaiveDate,
    net: i16,
    planned: &[PlannedSlot],
    conn: &db::Conn,
) -> Result<usize, ServiceError> {
    conn.transaction::<usize, ServiceError, _>(|| {
        let existing: Vec<Slot> = slots::table
            .filter(slots::turf_id.eq(turf.id))
            .filter(slots::date.eq(date))
            .filter(slots::net_no.eq(net))
            .for_update()
            .load::<Slot>(conn)?;

        let by_start: HashMap<NaiveTime, &Slot> =
            existing.iter().map(|slot| (slot.start_time, slot)).collect();

        let mut created = 0;

        for plan in planned {
            let quote = quote(bands, turf.base_price, plan.start);

            match by_start.get(&plan.start) {
                None => {
                    let (state, reason) = planned_state(plan);

                    diesel::insert_into(slots::table)
                        .values(NewSlot {
                            turf_id: turf.id,
                            net_no: net,
                            date,
                            start_time: plan.start,
                            end_time: plan.end,
                            price: quote.price,
                            tariff_label: quote.label,
                            state,
                            block_reason: reason,
                        })
                        .execute(conn)?;

                    created += 1;
                }
                Some(row) => {
                    if !resyncable(row) {
                        continue;
                    }

                    let (state, reason) = if manually_blocked(row) {
                        (SlotState::BLOCKED.to_string(), row.block_reason.clone())
                    } else {
                        planned_state(plan)
                    };

                    diesel::update(*row)
                        .set((
                            slots::end_time.eq(plan.end),
                            slots::price.eq(quote.price),
                            slots::tariff_label.eq(quote.label),
                            slots::state.eq(state),
                            slots::block_reason.eq(reason),
                            slots::updated_at.eq(Some(Utc::now())),
                        ))
                        .execute(conn)?;
                }
            }
        }

        // rows that fell out of the operating window may only disappear
        // while still available
        for row in &existing {
            let in_plan = planned.iter().any(|plan| plan.start == row.start_time);

            if !in_plan && row.state == SlotState::AVAILABLE.to_string() {
                diesel::delete(row).execute(conn)?;
            }
        }

        Ok(created)
    })
}

fn planned_state(plan: &PlannedSlot) -> (String, Option<String>) {
    if plan.blocked {
        (
            SlotState::BLOCKED.to_string(),
            Some(AUTO_BLOCK_REASON.to_string()),
        )
    } else {
        (SlotState::AVAILABLE.to_string(), None)
    }
}

/// Rows holding a booking or a lease are never touched by generation.
fn resyncable(slot: &Slot) -> bool {
    slot.state == SlotState::AVAILABLE.to_string()
        || slot.state == SlotState::BLOCKED.to_string()
}

/// An owner-placed block carries a reason other than the auto one; its
/// state survives regeneration even when the window would reopen it.
fn manually_blocked(slot: &Slot) -> bool {
    slot.state == SlotState::BLOCKED.to_string()
        && slot.block_reason.as_deref() != Some(AUTO_BLOCK_REASON)
}

fn time_from_secs(secs: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(hours: u32, minutes: u32) -> NaiveTime {
        NaiveTime::from_hms(hours, minutes, 0)
    }

    #[test]
    fn full_day_grid_with_trailing_boundary_slot() {
        // turf open 06:00-23:00, hourly slots: 17 bookable increments
        // plus the one starting exactly at closing time
        let planned = plan_day(hm(6, 0), hm(23, 0), 60);

        assert_eq!(planned.len(), 18);

        let open_count = planned.iter().filter(|plan| !plan.blocked).count();
        assert_eq!(open_count, 17);

        let last = planned.last().unwrap();
        assert_eq!(last.start, hm(23, 0));
        assert!(last.blocked);
        // 24:00 wraps to midnight
        assert_eq!(last.end, hm(0, 0));
    }

    #[test]
    fn slot_ending_exactly_at_close_is_open() {
        let planned = plan_day(hm(6, 0), hm(23, 0), 60);

        let last_open = &planned[planned.len() - 2];
        assert_eq!(last_open.start, hm(22, 0));
        assert_eq!(last_open.end, hm(23, 0));
        assert!(!last_open.blocked);
    }

    #[test]
    fn uneven_duration_blocks_the_overhang() {
        // 90 minute slots against a 06:00-08:00 window:
        // 06:00-07:30 fits, 07:30-09:00 and 08:00-09:30 run past close
        let planned = plan_day(hm(6, 0), hm(8, 0), 90);

        assert_eq!(planned.len(), 2);
        assert!(!planned[0].blocked);
        assert!(planned[1].blocked);
        assert_eq!(planned[1].start, hm(7, 30));
    }

    #[test]
    fn zero_duration_plans_nothing() {
        assert!(plan_day(hm(6, 0), hm(23, 0), 0).is_empty());
    }

    fn band(label: &str, from: NaiveTime, to: NaiveTime, price: i64) -> Tariff {
        Tariff {
            id: 1,
            turf_id: 1,
            label: label.to_string(),
            start_time: from,
            end_time: to,
            price,
            created_at: None,
        }
    }

    #[test]
    fn tariff_band_wins_inside_its_window() {
        let bands = vec![band("Evening Peak", hm(18, 0), hm(23, 0), 120_000)];

        let quoted = quote(&bands, 80_000, hm(19, 0));
        assert_eq!(quoted.price, 120_000);
        assert_eq!(quoted.label, "Evening Peak");
    }

    #[test]
    fn base_price_applies_outside_every_band() {
        let bands = vec![band("Evening Peak", hm(18, 0), hm(23, 0), 120_000)];

        let quoted = quote(&bands, 80_000, hm(9, 0));
        assert_eq!(quoted.price, 80_000);
        assert_eq!(quoted.label, "Standard");
    }

    #[test]
    fn band_window_is_half_open() {
        let bands = vec![band("Morning", hm(6, 0), hm(9, 0), 60_000)];

        assert_eq!(quote(&bands, 80_000, hm(6, 0)).price, 60_000);
        assert_eq!(quote(&bands, 80_000, hm(9, 0)).price, 80_000);
    }
}

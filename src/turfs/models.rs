use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;
use regex::Regex;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::{tariffs, turfs};

/// A turf venue's bookable configuration: operating hours, the slot
/// duration the day is cut into, and the number of playing surfaces.
#[derive(Debug, Serialize, Deserialize, Queryable, Identifiable, AsChangeset)]
pub struct Turf {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_minutes: i16,
    pub net_count: i16,
    pub base_price: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Insertable)]
#[table_name = "turfs"]
pub struct CreateTurf {
    pub name: String,
    pub owner_id: i64,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_minutes: i16,
    pub net_count: i16,
    pub base_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct TurfFilter {
    pub owner_id: Option<i64>,
    pub name: Option<String>,
}

/// A price band for a window of the day. Slots whose start time falls
/// inside the window are stamped with this price and label during
/// schedule generation; outside every band the turf's base price applies.
#[derive(Debug, Serialize, Queryable, Identifiable)]
pub struct Tariff {
    pub id: i64,
    pub turf_id: i64,
    pub label: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Insertable)]
#[table_name = "tariffs"]
pub struct NewTariff {
    #[serde(skip)]
    pub turf_id: i64,
    pub label: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: i64,
}

impl Turf {
    pub fn create(new_turf: CreateTurf, conn: &db::Conn) -> Result<Turf, ServiceError> {
        new_turf.validate()?;

        let turf = diesel::insert_into(turfs::table)
            .values(&new_turf)
            .get_result::<Turf>(conn)?;

        Ok(turf)
    }

    pub fn find_by_id(turf_id: i64, conn: &db::Conn) -> Result<Turf, ServiceError> {
        let turf = turfs::table
            .filter(turfs::id.eq(turf_id))
            .first::<Turf>(conn)
            .optional()?;

        match turf {
            Some(turf) => Ok(turf),
            None => Err(ServiceError::NotFound("turf not found".into())),
        }
    }

    pub fn find_all(filter: TurfFilter, conn: &db::Conn) -> Result<Vec<Turf>, ServiceError> {
        let mut query = turfs::table.order(turfs::name).into_boxed();

        if let Some(id) = filter.owner_id {
            query = query.filter(turfs::owner_id.eq(id));
        }

        if let Some(name) = filter.name {
            query = query.filter(turfs::name.ilike(format!("%{}%", name)));
        }

        let turfs = query.load::<Turf>(conn)?;
        Ok(turfs)
    }

    pub fn update(&self, conn: &db::Conn) -> Result<Turf, ServiceError> {
        self.validate()?;

        let current = Turf::find_by_id(self.id, conn)?;
        if current.owner_id != self.owner_id {
            forbidden!("a turf cannot be transferred to another owner");
        }

        let turf = diesel::update(self)
            .set((self, turfs::updated_at.eq(Some(Utc::now()))))
            .get_result::<Turf>(conn)?;

        Ok(turf)
    }

    /// Updates go through the same bounds as creation; a turf edited to
    /// a zero slot duration or net count would make schedule generation
    /// silently plan nothing.
    fn validate(&self) -> Result<(), ServiceError> {
        validate_config(
            &self.name,
            self.open_time,
            self.close_time,
            self.slot_minutes,
            self.net_count,
            self.base_price,
        )
    }

    pub fn tariffs(&self, conn: &db::Conn) -> Result<Vec<Tariff>, ServiceError> {
        Tariff::for_turf(self.id, conn)
    }
}

impl Tariff {
    pub fn for_turf(turf_id: i64, conn: &db::Conn) -> Result<Vec<Tariff>, ServiceError> {
        let bands = tariffs::table
            .filter(tariffs::turf_id.eq(turf_id))
            .order(tariffs::start_time)
            .load::<Tariff>(conn)?;

        Ok(bands)
    }
}

impl NewTariff {
    pub fn save(&self, conn: &db::Conn) -> Result<Tariff, ServiceError> {
        self.validate()?;

        // the referenced turf has to exist
        Turf::find_by_id(self.turf_id, conn)?;

        let band = diesel::insert_into(tariffs::table)
            .values(self)
            .get_result::<Tariff>(conn)?;

        Ok(band)
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.label.trim().is_empty() {
            bad_request!("the tariff label cannot be empty");
        }

        if self.start_time >= self.end_time {
            bad_request!("the tariff window has to end after it starts");
        }

        if self.price <= 0 {
            bad_request!("the tariff price has to be above 0");
        }

        Ok(())
    }
}

impl CreateTurf {
    fn validate(&self) -> Result<(), ServiceError> {
        validate_config(
            &self.name,
            self.open_time,
            self.close_time,
            self.slot_minutes,
            self.net_count,
            self.base_price,
        )
    }
}

fn validate_config(
    name: &str,
    open_time: NaiveTime,
    close_time: NaiveTime,
    slot_minutes: i16,
    net_count: i16,
    base_price: i64,
) -> Result<(), ServiceError> {
    let pattern: Regex = Regex::new(r"^[a-zA-Z0-9_-]+( [a-zA-Z0-9_-]+)*$").unwrap();

    if name.trim().is_empty() {
        bad_request!("name is too short");
    }

    if name.trim().len() > 60 {
        bad_request!("name is too long, maximum 60 characters");
    }

    if !pattern.is_match(name) {
        bad_request!("name can only contain letters, numbers, spaces, '-' and '_'");
    }

    if open_time >= close_time {
        bad_request!("the turf has to close after it opens");
    }

    if !(15..=240).contains(&slot_minutes) {
        bad_request!("the slot duration should be within [15-240] minutes");
    }

    if !(1..=32).contains(&net_count) {
        bad_request!("the net count should be within [1-32]");
    }

    if base_price <= 0 {
        bad_request!("the base price has to be above 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_turf() -> CreateTurf {
        CreateTurf {
            name: String::from("Green Arena"),
            owner_id: 1,
            open_time: NaiveTime::from_hms(6, 0, 0),
            close_time: NaiveTime::from_hms(23, 0, 0),
            slot_minutes: 60,
            net_count: 2,
            base_price: 80_000,
        }
    }

    #[test]
    fn valid_turf_config() {
        assert!(valid_turf().validate().is_ok());
    }

    #[test]
    fn turf_closing_before_opening() {
        let mut turf = valid_turf();
        turf.open_time = NaiveTime::from_hms(23, 0, 0);
        turf.close_time = NaiveTime::from_hms(6, 0, 0);

        assert!(turf.validate().is_err());
    }

    #[test]
    fn invalid_slot_duration() {
        let mut turf = valid_turf();

        turf.slot_minutes = 10;
        assert!(turf.validate().is_err());

        turf.slot_minutes = 300;
        assert!(turf.validate().is_err());
    }

    #[test]
    fn invalid_turf_names() {
        let mut turf = valid_turf();

        turf.name = String::from("");
        assert!(turf.validate().is_err());

        turf.name = String::from("<html>");
        assert!(turf.validate().is_err());
    }

    fn persisted_turf() -> Turf {
        Turf {
            id: 1,
            name: String::from("Green Arena"),
            owner_id: 1,
            open_time: NaiveTime::from_hms(6, 0, 0),
            close_time: NaiveTime::from_hms(23, 0, 0),
            slot_minutes: 60,
            net_count: 2,
            base_price: 80_000,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn update_reapplies_creation_bounds() {
        assert!(persisted_turf().validate().is_ok());

        let mut turf = persisted_turf();
        turf.slot_minutes = 0;
        assert!(turf.validate().is_err());

        let mut turf = persisted_turf();
        turf.net_count = 0;
        assert!(turf.validate().is_err());

        let mut turf = persisted_turf();
        turf.base_price = 0;
        assert!(turf.validate().is_err());

        let mut turf = persisted_turf();
        turf.name = String::from("<html>");
        assert!(turf.validate().is_err());
    }

    fn test_pool() -> crate::db::Pool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL is not set");
        crate::db::migrate(&url).expect("unable to run the migrations");
        crate::db::build_connection_pool(&url).expect("unable to build the connection pool")
    }

    #[test]
    #[ignore] // needs a running Postgres, set TEST_DATABASE_URL
    fn update_stamps_updated_at() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let mut turf = Turf::create(valid_turf(), &conn).unwrap();
        assert!(turf.updated_at.is_none());

        turf.base_price = 90_000;
        let updated = turf.update(&conn).unwrap();

        assert!(updated.updated_at.is_some());
        assert_eq!(updated.base_price, 90_000);
    }

    #[test]
    fn tariff_window_has_to_be_ordered() {
        let band = NewTariff {
            turf_id: 1,
            label: String::from("Evening Peak"),
            start_time: NaiveTime::from_hms(22, 0, 0),
            end_time: NaiveTime::from_hms(18, 0, 0),
            price: 120_000,
        };

        assert!(band.validate().is_err());
    }
}

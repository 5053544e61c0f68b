//! Store PostgreSQL
//!
//! Cada operación compuesta abre una transacción y bloquea las filas que va
//! a tocar con `SELECT ... FOR UPDATE`, siempre en el orden
//! reserva -> ambulancia -> conductor. El perdedor de una carrera lee el
//! estado ya comprometido por el ganador y recibe un Conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use super::DispatchStore;
use crate::models::{
    Ambulance, AmbulanceStatus, Booking, BookingFilter, BookingStatus, Cancellation, Driver,
    DriverStatus, LocationPing, NewBooking, NewDriver, VehicleType,
};
use crate::utils::errors::{not_found_error, validation_error, AppError, AppResult};

const ACTIVE_STATUSES: [BookingStatus; 2] = [BookingStatus::Accepted, BookingStatus::OnTheWay];

pub struct PgDispatchStore {
    pool: PgPool,
}

impl PgDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .map_or(false, |code| code == "23505")
}

async fn lock_booking(tx: &mut Transaction<'_, Postgres>, id: i64) -> AppResult<Booking> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| not_found_error("Booking", id))
}

async fn lock_ambulance(tx: &mut Transaction<'_, Postgres>, id: i64) -> AppResult<Ambulance> {
    sqlx::query_as::<_, Ambulance>("SELECT * FROM ambulances WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| not_found_error("Ambulance", id))
}

async fn lock_driver(tx: &mut Transaction<'_, Postgres>, id: i64) -> AppResult<Driver> {
    sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| not_found_error("Driver", id))
}

async fn write_booking(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE bookings
        SET status = $2, ambulance_id = $3, driver_id = $4, total_charge = $5,
            accepted_at = $6, start_time = $7, end_time = $8, cancelled_at = $9,
            cancel_reason = $10, cancelled_by = $11, updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(booking.id)
    .bind(booking.status)
    .bind(booking.ambulance_id)
    .bind(booking.driver_id)
    .bind(booking.total_charge)
    .bind(booking.accepted_at)
    .bind(booking.start_time)
    .bind(booking.end_time)
    .bind(booking.cancelled_at)
    .bind(&booking.cancel_reason)
    .bind(booking.cancelled_by)
    .bind(booking.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_ambulance_status(
    tx: &mut Transaction<'_, Postgres>,
    ambulance: &Ambulance,
) -> AppResult<()> {
    sqlx::query("UPDATE ambulances SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(ambulance.id)
        .bind(ambulance.status)
        .bind(ambulance.updated_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn write_driver(tx: &mut Transaction<'_, Postgres>, driver: &Driver) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE drivers
        SET status = $2, current_lat = $3, current_lng = $4, last_location_update = $5,
            location_sequence = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(driver.id)
    .bind(driver.status)
    .bind(driver.current_lat)
    .bind(driver.current_lng)
    .bind(driver.last_location_update)
    .bind(driver.location_sequence)
    .bind(driver.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn active_booking_id(
    tx: &mut Transaction<'_, Postgres>,
    column: &str,
    resource_id: i64,
) -> AppResult<Option<i64>> {
    let sql = format!(
        "SELECT id FROM bookings WHERE {} = $1 AND status IN ($2, $3) LIMIT 1",
        column
    );
    let row: Option<(i64,)> = sqlx::query_as(&sql)
        .bind(resource_id)
        .bind(ACTIVE_STATUSES[0])
        .bind(ACTIVE_STATUSES[1])
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(|r| r.0))
}

/// Libera ambulancia y conductor dentro de la transacción en curso
async fn release_resources(
    tx: &mut Transaction<'_, Postgres>,
    held: Option<(i64, i64)>,
    at: DateTime<Utc>,
) -> AppResult<()> {
    if let Some((ambulance_id, driver_id)) = held {
        let mut ambulance = lock_ambulance(tx, ambulance_id).await?;
        let mut driver = lock_driver(tx, driver_id).await?;
        ambulance.release(at);
        driver.end_trip(at);
        write_ambulance_status(tx, &ambulance).await?;
        write_driver(tx, &driver).await?;
    }
    Ok(())
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn insert_ambulance(
        &self,
        vehicle_number: &str,
        vehicle_type: VehicleType,
    ) -> AppResult<Ambulance> {
        let now = Utc::now();
        sqlx::query_as::<_, Ambulance>(
            r#"
            INSERT INTO ambulances (vehicle_number, vehicle_type, status, created_at, updated_at)
            VALUES ($1, $2, 'AVAILABLE', $3, $3)
            RETURNING *
            "#,
        )
        .bind(vehicle_number)
        .bind(vehicle_type)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                validation_error(
                    "vehicle_number",
                    format!("vehicle number '{}' is already registered", vehicle_number),
                )
            } else {
                AppError::from(e)
            }
        })
    }

    async fn find_ambulance(&self, id: i64) -> AppResult<Option<Ambulance>> {
        let ambulance = sqlx::query_as::<_, Ambulance>("SELECT * FROM ambulances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ambulance)
    }

    async fn list_ambulances(&self, status: Option<AmbulanceStatus>) -> AppResult<Vec<Ambulance>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM ambulances");
        if let Some(status) = status {
            query.push(" WHERE status = ").push_bind(status);
        }
        query.push(" ORDER BY id");
        let ambulances = query
            .build_query_as::<Ambulance>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ambulances)
    }

    async fn update_ambulance_status(
        &self,
        id: i64,
        status: AmbulanceStatus,
    ) -> AppResult<Ambulance> {
        let mut tx = self.pool.begin().await?;
        let mut ambulance = lock_ambulance(&mut tx, id).await?;
        let in_use = active_booking_id(&mut tx, "ambulance_id", id).await?.is_some();
        ambulance.set_manual_status(status, in_use, Utc::now())?;
        write_ambulance_status(&mut tx, &ambulance).await?;
        tx.commit().await?;
        Ok(ambulance)
    }

    async fn insert_driver(&self, new: NewDriver) -> AppResult<Driver> {
        let now = Utc::now();
        sqlx::query_as::<_, Driver>(
            r#"
            INSERT INTO drivers (user_id, name, phone, license_number, status,
                                 location_sequence, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'AVAILABLE', 0, $5, $5)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(&new.name)
        .bind(&new.phone)
        .bind(&new.license_number)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                validation_error(
                    "license_number",
                    "a driver with this user or license is already registered",
                )
            } else {
                AppError::from(e)
            }
        })
    }

    async fn find_driver(&self, id: i64) -> AppResult<Option<Driver>> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(driver)
    }

    async fn find_driver_by_user(&self, user_id: i64) -> AppResult<Option<Driver>> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(driver)
    }

    async fn list_drivers(&self, status: Option<DriverStatus>) -> AppResult<Vec<Driver>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM drivers");
        if let Some(status) = status {
            query.push(" WHERE status = ").push_bind(status);
        }
        query.push(" ORDER BY id");
        let drivers = query.build_query_as::<Driver>().fetch_all(&self.pool).await?;
        Ok(drivers)
    }

    async fn update_driver_status(&self, id: i64, status: DriverStatus) -> AppResult<Driver> {
        let mut tx = self.pool.begin().await?;
        let mut driver = lock_driver(&mut tx, id).await?;
        driver.set_manual_status(status, Utc::now())?;
        write_driver(&mut tx, &driver).await?;
        tx.commit().await?;
        Ok(driver)
    }

    async fn record_location(
        &self,
        driver_id: i64,
        ping: &LocationPing,
        received_at: DateTime<Utc>,
    ) -> AppResult<Driver> {
        let mut tx = self.pool.begin().await?;
        let mut driver = lock_driver(&mut tx, driver_id).await?;
        let active = active_booking_id(&mut tx, "driver_id", driver_id).await?;
        driver.apply_ping(ping, active, received_at)?;
        write_driver(&mut tx, &driver).await?;
        tx.commit().await?;
        debug!("📍 Posición guardada para conductor {}", driver_id);
        Ok(driver)
    }

    async fn active_booking_for_driver(&self, driver_id: i64) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE driver_id = $1 AND status IN ($2, $3) LIMIT 1",
        )
        .bind(driver_id)
        .bind(ACTIVE_STATUSES[0])
        .bind(ACTIVE_STATUSES[1])
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn insert_booking(&self, new: NewBooking) -> AppResult<Booking> {
        let now = Utc::now();
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                patient_id, requested_by, requester_id,
                pickup_location, pickup_lat, pickup_lng,
                destination_location, destination_lat, destination_lng,
                booking_type, status, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'REQUESTED', $11, $12, $12)
            RETURNING *
            "#,
        )
        .bind(new.patient_id)
        .bind(new.requested_by)
        .bind(new.requester_id)
        .bind(&new.pickup_location)
        .bind(new.pickup.map(|p| p.latitude))
        .bind(new.pickup.map(|p| p.longitude))
        .bind(&new.destination_location)
        .bind(new.destination.map(|p| p.latitude))
        .bind(new.destination.map(|p| p.longitude))
        .bind(new.booking_type)
        .bind(&new.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn find_booking(&self, id: i64) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM bookings WHERE TRUE");
        if let Some(patient_id) = filter.patient_id {
            query.push(" AND patient_id = ").push_bind(patient_id);
        }
        if let Some(driver_id) = filter.driver_id {
            query.push(" AND driver_id = ").push_bind(driver_id);
        }
        if let Some(requester_id) = filter.requester_id {
            query.push(" AND requester_id = ").push_bind(requester_id);
        }
        if !filter.statuses.is_empty() {
            query.push(" AND status IN (");
            let mut separated = query.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let bookings = query.build_query_as::<Booking>().fetch_all(&self.pool).await?;
        Ok(bookings)
    }

    async fn assign_booking(
        &self,
        booking_id: i64,
        ambulance_id: i64,
        driver_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let mut ambulance = lock_ambulance(&mut tx, ambulance_id).await?;
        let mut driver = lock_driver(&mut tx, driver_id).await?;

        booking.accept(ambulance_id, driver_id, at)?;
        ambulance.book(at)?;
        driver.begin_trip(at)?;

        write_booking(&mut tx, &booking).await?;
        write_ambulance_status(&mut tx, &ambulance).await?;
        write_driver(&mut tx, &driver).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn start_trip(&self, booking_id: i64, at: DateTime<Utc>) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        booking.start(at)?;
        write_booking(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn complete_trip(
        &self,
        booking_id: i64,
        charge: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let held = booking.held_resources();
        booking.complete(charge, at)?;
        write_booking(&mut tx, &booking).await?;
        release_resources(&mut tx, held, at).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn cancel_booking(
        &self,
        booking_id: i64,
        cancellation: Cancellation,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let held = booking.held_resources();
        booking.cancel(&cancellation)?;
        write_booking(&mut tx, &booking).await?;
        release_resources(&mut tx, held, cancellation.at).await?;
        tx.commit().await?;
        Ok(booking)
    }
}

// libs/appointment-cell/src/services/booking.rs
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::models::{booking_key, parse_booking_key, BookedEntry, Doctor};
use doctor_cell::services::DoctorRepository;
use patient_cell::models::Patient;
use patient_cell::services::{PatientRepository, WalletService};
use shared_models::auth::{Role, User};
use shared_utils::clock::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentGuard, AppointmentPatch, AppointmentStatus,
    BookingConfirmation, CancellationConfirmation, DoctorSnapshot, PatientSnapshot,
    PaymentConfirmation,
};
use crate::services::ledger::{BookingLedger, Reservation};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::NotificationSender;
use crate::services::repository::AppointmentRepository;
use crate::AppointmentCellState;

#[derive(Debug, Clone, Copy)]
enum Notice {
    Booked,
    Cancelled,
    Completed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Booked => write!(f, "booked"),
            Notice::Cancelled => write!(f, "cancelled"),
            Notice::Completed => write!(f, "completed"),
        }
    }
}

/// Books, cancels, pays for and completes appointments. Every change to the
/// doctor's booking records goes through [`BookingLedger`]; every change to an
/// appointment is a conditional update on its flags.
pub struct BookingEngine {
    doctors: Arc<dyn DoctorRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    patients: Arc<dyn PatientRepository>,
    notifier: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
    wallet: WalletService,
    ledger: BookingLedger,
    lifecycle: AppointmentLifecycleService,
    timezone: FixedOffset,
    id_prefix: String,
}

impl BookingEngine {
    pub fn new(state: &AppointmentCellState) -> Self {
        let timezone = state.timezone();
        let scheduling = &state.config.scheduling;

        Self {
            doctors: Arc::clone(&state.doctors),
            appointments: Arc::clone(&state.appointments),
            patients: Arc::clone(&state.patients),
            notifier: Arc::clone(&state.notifier),
            clock: Arc::clone(&state.clock),
            wallet: WalletService::new(Arc::clone(&state.patients)),
            ledger: BookingLedger::new(
                Arc::clone(&state.doctors),
                Arc::clone(&state.slots),
                timezone,
                scheduling.max_reservation_retries,
            ),
            lifecycle: AppointmentLifecycleService::new(),
            timezone,
            id_prefix: scheduling.appointment_id_prefix.clone(),
        }
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn book(
        &self,
        doctor_id: &str,
        slot_date: &str,
        slot_time: &str,
        user_id: Uuid,
    ) -> Result<BookingConfirmation, AppointmentError> {
        info!("Booking {} for user {} with doctor {}", slot_time, user_id, doctor_id);

        let doctor_id = Uuid::parse_str(doctor_id.trim())
            .map_err(|_| AppointmentError::ValidationError(format!("Invalid doctor id: {}", doctor_id)))?;

        let doctor = self.load_doctor(doctor_id).await?;
        if !doctor.available {
            warn!("Doctor {} is not taking bookings", doctor_id);
            return Err(AppointmentError::DoctorUnavailable);
        }
        let fees = doctor.fees.ok_or(AppointmentError::FeesMissing)?;

        let slot_time = self.parse_slot_time(slot_time)?;
        let slot_key = self.check_slot_date(slot_date, &slot_time)?;

        if slot_time.with_timezone(&Utc) < self.clock.now() {
            return Err(AppointmentError::ValidationError(format!(
                "slot_time {} is in the past",
                slot_time.to_rfc3339()
            )));
        }

        let entry = BookedEntry::from_instant(&slot_time, &self.timezone);
        if doctor.slots_booked.contains(&slot_key, &entry) {
            warn!("Doctor {} already has {} {} booked", doctor_id, entry.date, entry.time);
            return Err(AppointmentError::SlotUnavailable);
        }

        let patient = self.load_patient(user_id).await?;
        let doc_data = DoctorSnapshot::capture(&doctor, fees);

        let reservation = self.ledger.reserve(doctor, &slot_key, slot_time).await?;

        let appointment = match self
            .create_appointment(&patient, doc_data, &slot_key, slot_time)
            .await
        {
            Ok(appointment) => appointment,
            Err(e) => {
                error!("Appointment creation failed, releasing reservation: {}", e);
                if let Err(undo) = self.ledger.release(&reservation).await {
                    error!("Could not release reservation for doctor {}: {}", doctor_id, undo);
                }
                return Err(e);
            }
        };

        info!(
            "Appointment {} booked: doctor {} at {}",
            appointment.appointment_id,
            doctor_id,
            slot_time.to_rfc3339()
        );
        self.notify(Notice::Booked, &appointment).await;

        Ok(BookingConfirmation {
            appointment_id: appointment.appointment_id,
            message: "Appointment booked".to_string(),
        })
    }

    fn parse_slot_time(&self, raw: &str) -> Result<DateTime<FixedOffset>, AppointmentError> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|t| t.with_timezone(&self.timezone))
            .map_err(|_| {
                AppointmentError::ValidationError(format!("slot_time must be an RFC 3339 instant, got '{}'", raw))
            })
    }

    /// `slot_date` must name the same calendar day as `slot_time`. Returns the canonical key.
    fn check_slot_date(&self, slot_date: &str, slot_time: &DateTime<FixedOffset>) -> Result<String, AppointmentError> {
        let day = slot_time.date_naive();
        match parse_booking_key(slot_date.trim()) {
            Some(date) if date == day => Ok(booking_key(day)),
            Some(_) => Err(AppointmentError::ValidationError(format!(
                "slot_date {} does not match slot_time day {}",
                slot_date,
                booking_key(day)
            ))),
            None => Err(AppointmentError::ValidationError(format!(
                "slot_date must look like D_M_YYYY, got '{}'",
                slot_date
            ))),
        }
    }

    async fn create_appointment(
        &self,
        patient: &Patient,
        doc_data: DoctorSnapshot,
        slot_key: &str,
        slot_time: DateTime<FixedOffset>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = Appointment {
            appointment_id: self.next_appointment_id().await?,
            user_id: patient.id,
            doc_id: doc_data.id,
            slot_date: slot_key.to_string(),
            slot_time,
            user_data: PatientSnapshot::from(patient),
            amount: doc_data.fees,
            doc_data,
            cancelled: false,
            payment: false,
            is_completed: false,
            wallet_used: 0,
            refund_issued: false,
            slot_released: false,
            created_at: self.clock.now(),
        };

        self.appointments
            .create(&appointment)
            .await
            .map_err(AppointmentError::database)
    }

    /// Prefix, the last six digits of the epoch millis, and one random digit.
    /// Taken candidates move on to the next digit.
    async fn next_appointment_id(&self) -> Result<String, AppointmentError> {
        let millis = self.clock.now().timestamp_millis().rem_euclid(1_000_000);
        let first: i64 = rand::thread_rng().gen_range(0..10);

        for offset in 0..10 {
            let candidate = format!("{}{:06}{}", self.id_prefix, millis, (first + offset) % 10);
            let taken = self
                .appointments
                .find_by_id(&candidate)
                .await
                .map_err(AppointmentError::database)?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
            debug!("Appointment id {} already taken", candidate);
        }

        Err(AppointmentError::Internal(format!(
            "No free appointment id for {}{:06}",
            self.id_prefix, millis
        )))
    }

    // ==========================================================================
    // CANCELLATION
    // ==========================================================================

    /// Cancels the appointment, refunds a paid one and frees its booking
    /// records. Repeating the call on a cancelled appointment finishes whatever
    /// an earlier attempt left undone and reports `already_cancelled`.
    pub async fn cancel(
        &self,
        appointment_id: &str,
        requester: &User,
    ) -> Result<CancellationConfirmation, AppointmentError> {
        info!("Cancelling appointment {} for {} ({})", appointment_id, requester.id, requester.role);

        let appointment = self.load_appointment(appointment_id).await?;
        authorize(requester, &appointment)?;

        let (cancelled, already_cancelled) = match appointment.status() {
            AppointmentStatus::Cancelled => (appointment, true),
            status => {
                self.lifecycle
                    .validate_status_transition(&status, &AppointmentStatus::Cancelled)?;
                self.mark_cancelled(appointment_id).await?
            }
        };

        let refunded = self.settle_refund(&cancelled).await?;
        self.settle_release(&cancelled).await?;

        if already_cancelled {
            debug!("Appointment {} was already cancelled, refunded {}", appointment_id, refunded);
        } else {
            info!("Appointment {} cancelled, refunded {}", appointment_id, refunded);
            self.notify(Notice::Cancelled, &cancelled).await;
        }

        Ok(CancellationConfirmation {
            appointment_id: appointment_id.to_string(),
            message: if already_cancelled {
                "Appointment already cancelled".to_string()
            } else {
                "Appointment cancelled".to_string()
            },
            already_cancelled,
            refunded,
        })
    }

    /// Flips `cancelled`. The flag reports whether another caller got there first.
    async fn mark_cancelled(&self, appointment_id: &str) -> Result<(Appointment, bool), AppointmentError> {
        let patch = AppointmentPatch {
            cancelled: Some(true),
            ..Default::default()
        };
        if let Some(cancelled) = self
            .appointments
            .update(appointment_id, &AppointmentGuard::active(), &patch)
            .await
            .map_err(AppointmentError::database)?
        {
            return Ok((cancelled, false));
        }

        let current = self.load_appointment(appointment_id).await?;
        match current.status() {
            AppointmentStatus::Cancelled => Ok((current, true)),
            status => Err(AppointmentError::InvalidStatusTransition(status)),
        }
    }

    /// Returns `amount` to the wallet of a paid, cancelled appointment exactly
    /// once. The `refund_issued` claim is taken before the wallet moves and is
    /// handed back when the credit fails.
    async fn settle_refund(&self, cancelled: &Appointment) -> Result<i64, AppointmentError> {
        if !cancelled.payment || cancelled.refund_issued {
            return Ok(0);
        }

        let id = &cancelled.appointment_id;
        let claim = AppointmentGuard::cancelled()
            .with_payment(true)
            .with_refund_issued(false);
        let patch = AppointmentPatch {
            refund_issued: Some(true),
            ..Default::default()
        };
        if !self.claim(id, &claim, &patch).await? {
            debug!("Refund for appointment {} already issued", id);
            return Ok(0);
        }

        if let Err(e) = self.wallet.credit(cancelled.user_id, cancelled.amount).await {
            error!("Refund of {} for appointment {} failed: {}", cancelled.amount, id, e);
            let undo = AppointmentPatch {
                refund_issued: Some(false),
                ..Default::default()
            };
            self.hand_back(id, &AppointmentGuard::cancelled().with_refund_issued(true), &undo)
                .await;
            return Err(e.into());
        }
        Ok(cancelled.amount)
    }

    /// Frees the index entry and slot of a cancelled appointment once, so a
    /// repeated cancel never touches a later booking of the same instant.
    async fn settle_release(&self, cancelled: &Appointment) -> Result<(), AppointmentError> {
        if cancelled.slot_released {
            return Ok(());
        }

        let id = &cancelled.appointment_id;
        let patch = AppointmentPatch {
            slot_released: Some(true),
            ..Default::default()
        };
        if !self
            .claim(id, &AppointmentGuard::cancelled().with_slot_released(false), &patch)
            .await?
        {
            debug!("Booking records of appointment {} already released", id);
            return Ok(());
        }

        if let Err(e) = self.ledger.release(&Reservation::of(cancelled, &self.timezone)).await {
            error!("Releasing booking records of appointment {} failed: {}", id, e);
            let undo = AppointmentPatch {
                slot_released: Some(false),
                ..Default::default()
            };
            self.hand_back(id, &AppointmentGuard::cancelled().with_slot_released(true), &undo)
                .await;
            return Err(e);
        }
        Ok(())
    }

    async fn claim(
        &self,
        appointment_id: &str,
        guard: &AppointmentGuard,
        patch: &AppointmentPatch,
    ) -> Result<bool, AppointmentError> {
        Ok(self
            .appointments
            .update(appointment_id, guard, patch)
            .await
            .map_err(AppointmentError::database)?
            .is_some())
    }

    async fn hand_back(&self, appointment_id: &str, guard: &AppointmentGuard, patch: &AppointmentPatch) {
        match self.appointments.update(appointment_id, guard, patch).await {
            Ok(Some(_)) => debug!("Settlement claim on appointment {} handed back", appointment_id),
            Ok(None) => warn!("Settlement claim on appointment {} was already handed back", appointment_id),
            Err(e) => error!("Could not hand back settlement claim on appointment {}: {}", appointment_id, e),
        }
    }

    // ==========================================================================
    // PAYMENT AND COMPLETION
    // ==========================================================================

    pub async fn pay_with_wallet(
        &self,
        appointment_id: &str,
        requester: &User,
    ) -> Result<PaymentConfirmation, AppointmentError> {
        let appointment = self.load_appointment(appointment_id).await?;
        if requester.role != Role::Patient || requester.id != appointment.user_id {
            return Err(AppointmentError::Unauthorized);
        }
        self.lifecycle
            .validate_status_transition(&appointment.status(), &AppointmentStatus::BookedPaid)?;

        self.wallet.debit(appointment.user_id, appointment.amount).await?;

        let patch = AppointmentPatch {
            payment: Some(true),
            wallet_used: Some(appointment.amount),
            ..Default::default()
        };
        let guard = AppointmentGuard::active().with_payment(false);
        match self.appointments.update(appointment_id, &guard, &patch).await {
            Ok(Some(paid)) => {
                info!("Appointment {} paid from wallet ({})", appointment_id, paid.amount);
                Ok(PaymentConfirmation {
                    appointment_id: appointment_id.to_string(),
                    message: "Payment successful".to_string(),
                    wallet_used: paid.wallet_used,
                })
            }
            outcome => {
                warn!("Appointment {} changed during wallet payment, refunding", appointment_id);
                if let Err(e) = self.wallet.credit(appointment.user_id, appointment.amount).await {
                    error!("Could not return {} to wallet of {}: {}", appointment.amount, appointment.user_id, e);
                }
                outcome.map_err(AppointmentError::database)?;
                let current = self.load_appointment(appointment_id).await?;
                Err(AppointmentError::InvalidStatusTransition(current.status()))
            }
        }
    }

    /// Marks the appointment paid once the external gateway has verified the payment.
    pub async fn confirm_gateway_payment(
        &self,
        appointment_id: &str,
        requester: &User,
    ) -> Result<PaymentConfirmation, AppointmentError> {
        let appointment = self.load_appointment(appointment_id).await?;
        if !requester.acts_as(appointment.user_id, Role::Patient) {
            return Err(AppointmentError::Unauthorized);
        }
        self.lifecycle
            .validate_status_transition(&appointment.status(), &AppointmentStatus::BookedPaid)?;

        let patch = AppointmentPatch {
            payment: Some(true),
            ..Default::default()
        };
        let guard = AppointmentGuard::active().with_payment(false);
        let paid = self.guarded_update(appointment_id, &guard, &patch).await?;

        info!("Gateway payment confirmed for appointment {}", appointment_id);
        Ok(PaymentConfirmation {
            appointment_id: appointment_id.to_string(),
            message: "Payment confirmed".to_string(),
            wallet_used: paid.wallet_used,
        })
    }

    pub async fn complete(&self, appointment_id: &str, requester: &User) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_appointment(appointment_id).await?;
        if !requester.acts_as(appointment.doc_id, Role::Doctor) {
            return Err(AppointmentError::Unauthorized);
        }
        self.lifecycle
            .validate_status_transition(&appointment.status(), &AppointmentStatus::Completed)?;

        let patch = AppointmentPatch {
            is_completed: Some(true),
            ..Default::default()
        };
        let guard = AppointmentGuard::active().with_payment(true);
        let completed = self.guarded_update(appointment_id, &guard, &patch).await?;

        info!("Appointment {} completed", appointment_id);
        self.notify(Notice::Completed, &completed).await;
        Ok(completed)
    }

    async fn guarded_update(
        &self,
        appointment_id: &str,
        guard: &AppointmentGuard,
        patch: &AppointmentPatch,
    ) -> Result<Appointment, AppointmentError> {
        match self
            .appointments
            .update(appointment_id, guard, patch)
            .await
            .map_err(AppointmentError::database)?
        {
            Some(updated) => Ok(updated),
            None => {
                let current = self.load_appointment(appointment_id).await?;
                Err(AppointmentError::InvalidStatusTransition(current.status()))
            }
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get(&self, appointment_id: &str, requester: &User) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_appointment(appointment_id).await?;
        authorize(requester, &appointment)?;
        Ok(appointment)
    }

    pub async fn appointments_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments of user {}", user_id);
        self.appointments
            .find_by_user(user_id)
            .await
            .map_err(AppointmentError::database)
    }

    pub async fn appointments_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments of doctor {}", doctor_id);
        self.appointments
            .find_by_doctor(doctor_id)
            .await
            .map_err(AppointmentError::database)
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn load_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        self.doctors
            .find_by_id(doctor_id)
            .await
            .map_err(AppointmentError::database)?
            .ok_or(AppointmentError::DoctorNotFound)
    }

    async fn load_patient(&self, user_id: Uuid) -> Result<Patient, AppointmentError> {
        self.patients
            .find_by_id(user_id)
            .await
            .map_err(AppointmentError::database)?
            .ok_or(AppointmentError::UserNotFound)
    }

    async fn load_appointment(&self, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        self.appointments
            .find_by_id(appointment_id)
            .await
            .map_err(AppointmentError::database)?
            .ok_or(AppointmentError::AppointmentNotFound)
    }

    async fn notify(&self, notice: Notice, appointment: &Appointment) {
        let result = match notice {
            Notice::Booked => self.notifier.send_appointment_booked(appointment).await,
            Notice::Cancelled => self.notifier.send_appointment_cancelled(appointment).await,
            Notice::Completed => self.notifier.send_appointment_completed(appointment).await,
        };

        if let Err(e) = result {
            warn!(
                "Failed to send {} notice for appointment {}: {}",
                notice, appointment.appointment_id, e
            );
        }
    }
}

/// Owner patient, treating doctor, or admin.
fn authorize(requester: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if requester.acts_as(appointment.user_id, Role::Patient) || requester.acts_as(appointment.doc_id, Role::Doctor) {
        Ok(())
    } else {
        warn!(
            "User {} ({}) denied access to appointment {}",
            requester.id, requester.role, appointment.appointment_id
        );
        Err(AppointmentError::Unauthorized)
    }
}

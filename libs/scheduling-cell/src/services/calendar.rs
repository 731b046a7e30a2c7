// libs/scheduling-cell/src/services/calendar.rs
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    CalendarSlot, CalendarView, SchedulingError, SlotSummary, TherapistDaySchedule,
};
use crate::repository::{AppointmentRepository, DirectoryRepository};
use crate::services::timeslot::CANONICAL_SLOTS;
use crate::SchedulingState;

pub struct CalendarService {
    appointments: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn DirectoryRepository>,
}

impl CalendarService {
    pub fn new(state: &SchedulingState) -> Self {
        Self {
            appointments: Arc::clone(&state.appointments),
            directory: Arc::clone(&state.directory),
        }
    }

    /// Project one day onto the fixed 14-slot grid, per therapist.
    ///
    /// Bucketing is by exact start-time label. An appointment whose start time
    /// is off-grid is not displayed here; that is an accepted limitation of
    /// the grid view, not a data error. The first appointment found for a
    /// (therapist, slot) wins; double-booking is prevented at write time, not
    /// here.
    pub async fn day_view(
        &self,
        date: NaiveDate,
        therapist_filter: Option<Uuid>,
    ) -> Result<CalendarView, SchedulingError> {
        let therapists = match therapist_filter {
            Some(id) => {
                let record = self
                    .directory
                    .get_therapist(id)
                    .await?
                    .ok_or_else(|| SchedulingError::NotFound("Therapist".to_string()))?;
                vec![record]
            }
            None => self.directory.list_therapists().await?,
        };

        let appointments = self.appointments.find_on(date).await?;

        let mut schedules = Vec::with_capacity(therapists.len());
        for therapist in therapists {
            let mut slots: Vec<CalendarSlot> = CANONICAL_SLOTS
                .iter()
                .map(|label| CalendarSlot {
                    label: (*label).to_string(),
                    appointment: None,
                })
                .collect();

            for appointment in appointments
                .iter()
                .filter(|a| a.therapist_id == Some(therapist.id) && a.status.is_active())
            {
                let Some(idx) = CANONICAL_SLOTS
                    .iter()
                    .position(|label| *label == appointment.start_time)
                else {
                    continue;
                };

                if slots[idx].appointment.is_none() {
                    slots[idx].appointment = Some(SlotSummary {
                        appointment_id: appointment.id,
                        patient_name: appointment.patient_name.clone(),
                        phone: appointment.phone.clone(),
                        start_time: appointment.start_time.clone(),
                        end_time: appointment.end_time.clone(),
                        status: appointment.status,
                        appointment_type: appointment.appointment_type,
                    });
                }
            }

            schedules.push(TherapistDaySchedule {
                therapist_id: therapist.id,
                therapist_name: therapist.name,
                slots,
            });
        }

        Ok(CalendarView {
            date,
            therapists: schedules,
        })
    }
}

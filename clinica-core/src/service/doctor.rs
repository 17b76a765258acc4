use crate::entity::{Doctor, DoctorPatch};
use crate::error::{ClinicError, Result};
use crate::rules;
use crate::store::{EntityStore, Relation};

/// Doctor lifecycle: create, read, update, delete.
pub struct DoctorService<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> DoctorService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Doctor>> {
        self.store.find_all_doctors(&[Relation::Patients])
    }

    pub fn get(&self, id: &str) -> Result<Doctor> {
        self.store
            .find_doctor(id, &[Relation::Patients])?
            .ok_or_else(|| ClinicError::not_found("doctor"))
    }

    pub fn create(&self, mut doctor: Doctor) -> Result<Doctor> {
        Self::validate_fields(&doctor)?;

        doctor.id = None;
        doctor.patients = None;
        let doctor = self.store.save_doctor(doctor)?;
        tracing::debug!("created doctor {:?}", doctor.id);
        Ok(doctor)
    }

    pub fn update(&self, id: &str, patch: DoctorPatch) -> Result<Doctor> {
        let mut doctor = self
            .store
            .find_doctor(id, &[])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        patch.merge_into(&mut doctor);
        Self::validate_fields(&doctor)?;

        self.store.save_doctor(doctor)
    }

    /// Delete a doctor. The store cascades any patient edges that still
    /// reference it.
    pub fn delete(&self, id: &str) -> Result<()> {
        if self.store.find_doctor(id, &[])?.is_none() {
            return Err(ClinicError::not_found("doctor"));
        }
        self.store.remove_doctor(id)?;
        tracing::debug!("deleted doctor {id}");
        Ok(())
    }

    fn validate_fields(doctor: &Doctor) -> Result<()> {
        if doctor.name.trim().is_empty()
            || doctor.specialty.trim().is_empty()
            || doctor.phone.trim().is_empty()
        {
            return Err(ClinicError::precondition_failed(
                "The name, specialty and phone number are required to create a doctor",
            ));
        }
        rules::validate_phone(&doctor.phone)
    }
}

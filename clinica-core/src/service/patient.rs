use crate::entity::{Patient, PatientPatch};
use crate::error::{ClinicError, Result};
use crate::rules;
use crate::store::{EntityStore, Relation};

/// Patient lifecycle: create, read, update, delete.
pub struct PatientService<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> PatientService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Patient>> {
        self.store
            .find_all_patients(&[Relation::Doctors, Relation::Diagnoses])
    }

    pub fn get(&self, id: &str) -> Result<Patient> {
        self.store
            .find_patient(id, &[Relation::Doctors, Relation::Diagnoses])?
            .ok_or_else(|| ClinicError::not_found("patient"))
    }

    /// Persist a new patient. Association edges are the association
    /// services' job, so any relation fields on the input are discarded.
    pub fn create(&self, mut patient: Patient) -> Result<Patient> {
        rules::validate_name_min_length(&patient.name, rules::MIN_NAME_LEN)?;

        patient.id = None;
        patient.doctors = None;
        patient.diagnoses = None;
        let patient = self.store.save_patient(patient)?;
        tracing::debug!("created patient {:?}", patient.id);
        Ok(patient)
    }

    pub fn update(&self, id: &str, patch: PatientPatch) -> Result<Patient> {
        let mut patient = self
            .store
            .find_patient(id, &[])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        patch.merge_into(&mut patient);
        rules::validate_name_min_length(&patient.name, rules::MIN_NAME_LEN)?;

        self.store.save_patient(patient)
    }

    /// Delete a patient. A patient that still has diagnoses cannot be
    /// deleted.
    pub fn delete(&self, id: &str) -> Result<()> {
        let patient = self
            .store
            .find_patient(id, &[Relation::Diagnoses])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        if !patient.diagnoses.unwrap_or_default().is_empty() {
            return Err(ClinicError::precondition_failed(
                "A patient with associated diagnoses cannot be deleted",
            ));
        }

        self.store.remove_patient(id)?;
        tracing::debug!("deleted patient {id}");
        Ok(())
    }
}

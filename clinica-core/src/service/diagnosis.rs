use crate::entity::{Diagnosis, DiagnosisPatch};
use crate::error::{ClinicError, Result};
use crate::rules;
use crate::store::EntityStore;

/// Diagnosis lifecycle: create, read, update, delete.
///
/// Diagnosis reads are not relation-expanded; the patient view of the join is
/// served by the association service.
pub struct DiagnosisService<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> DiagnosisService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Diagnosis>> {
        self.store.find_all_diagnoses(&[])
    }

    pub fn get(&self, id: &str) -> Result<Diagnosis> {
        self.store
            .find_diagnosis(id, &[])?
            .ok_or_else(|| ClinicError::not_found("diagnosis"))
    }

    pub fn create(&self, mut diagnosis: Diagnosis) -> Result<Diagnosis> {
        Self::validate_fields(&diagnosis)?;

        diagnosis.id = None;
        diagnosis.patients = None;
        let diagnosis = self.store.save_diagnosis(diagnosis)?;
        tracing::debug!("created diagnosis {:?}", diagnosis.id);
        Ok(diagnosis)
    }

    pub fn update(&self, id: &str, patch: DiagnosisPatch) -> Result<Diagnosis> {
        let mut diagnosis = self
            .store
            .find_diagnosis(id, &[])?
            .ok_or_else(|| ClinicError::not_found("diagnosis"))?;

        patch.merge_into(&mut diagnosis);
        Self::validate_fields(&diagnosis)?;

        self.store.save_diagnosis(diagnosis)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        if self.store.find_diagnosis(id, &[])?.is_none() {
            return Err(ClinicError::not_found("diagnosis"));
        }
        self.store.remove_diagnosis(id)?;
        tracing::debug!("deleted diagnosis {id}");
        Ok(())
    }

    fn validate_fields(diagnosis: &Diagnosis) -> Result<()> {
        rules::validate_required(
            &diagnosis.description,
            "The description of the diagnosis is required",
        )?;
        rules::validate_description_length(&diagnosis.description, rules::MAX_DESCRIPTION_LEN)
    }
}

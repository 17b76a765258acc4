//! Patient<->diagnosis association management.
//!
//! Same operation shapes as the patient<->doctor service, anchored at the
//! patient. The diagnosis side of this relation is unbounded; only the
//! doctor relation carries a cardinality cap.

use crate::entity::{Diagnosis, Patient};
use crate::error::{ClinicError, Result};
use crate::store::{EntityStore, Relation};

pub struct PatientDiagnosisService<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> PatientDiagnosisService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn add_diagnosis_to_patient(&self, patient_id: &str, diagnosis_id: &str) -> Result<Patient> {
        let diagnosis = self
            .store
            .find_diagnosis(diagnosis_id, &[])?
            .ok_or_else(|| ClinicError::not_found("diagnosis"))?;

        let mut patient = self
            .store
            .find_patient(patient_id, &[Relation::Diagnoses])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        patient.diagnoses.get_or_insert_default().push(diagnosis);
        self.store.save_patient(patient)
    }

    /// Return the diagnosis iff it is associated to the patient.
    pub fn find_diagnosis_for_patient(
        &self,
        patient_id: &str,
        diagnosis_id: &str,
    ) -> Result<Diagnosis> {
        let diagnosis = self
            .store
            .find_diagnosis(diagnosis_id, &[])?
            .ok_or_else(|| ClinicError::not_found("diagnosis"))?;

        let patient = self
            .store
            .find_patient(patient_id, &[Relation::Diagnoses])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        patient
            .diagnoses
            .unwrap_or_default()
            .into_iter()
            .find(|d| d.id == diagnosis.id)
            .ok_or_else(|| {
                ClinicError::precondition_failed(
                    "The diagnosis with the given id is not associated to the patient",
                )
            })
    }

    pub fn list_diagnoses_for_patient(&self, patient_id: &str) -> Result<Vec<Diagnosis>> {
        let patient = self
            .store
            .find_patient(patient_id, &[Relation::Diagnoses])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;
        Ok(patient.diagnoses.unwrap_or_default())
    }

    pub fn list_patients_for_diagnosis(&self, diagnosis_id: &str) -> Result<Vec<Patient>> {
        let diagnosis = self
            .store
            .find_diagnosis(diagnosis_id, &[Relation::Patients])?
            .ok_or_else(|| ClinicError::not_found("diagnosis"))?;
        Ok(diagnosis.patients.unwrap_or_default())
    }

    /// Overwrite the patient's diagnosis set. All targets are resolved before
    /// anything is written; there is no cap on this relation.
    pub fn replace_diagnoses_of_patient(
        &self,
        patient_id: &str,
        diagnosis_ids: &[String],
    ) -> Result<Patient> {
        let mut patient = self
            .store
            .find_patient(patient_id, &[Relation::Diagnoses])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        let mut diagnoses = Vec::with_capacity(diagnosis_ids.len());
        for diagnosis_id in diagnosis_ids {
            let diagnosis = self
                .store
                .find_diagnosis(diagnosis_id, &[])?
                .ok_or_else(|| ClinicError::not_found("diagnosis"))?;
            diagnoses.push(diagnosis);
        }

        patient.diagnoses = Some(diagnoses);
        self.store.save_patient(patient)
    }

    pub fn remove_diagnosis_from_patient(&self, patient_id: &str, diagnosis_id: &str) -> Result<()> {
        let diagnosis = self
            .store
            .find_diagnosis(diagnosis_id, &[])?
            .ok_or_else(|| ClinicError::not_found("diagnosis"))?;

        let mut patient = self
            .store
            .find_patient(patient_id, &[Relation::Diagnoses])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        let diagnoses = patient.diagnoses.get_or_insert_default();
        if !diagnoses.iter().any(|d| d.id == diagnosis.id) {
            return Err(ClinicError::precondition_failed(
                "The diagnosis with the given id is not associated to the patient",
            ));
        }

        diagnoses.retain(|d| d.id != diagnosis.id);
        self.store.save_patient(patient)?;
        Ok(())
    }
}

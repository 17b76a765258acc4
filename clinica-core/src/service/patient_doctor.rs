//! Patient<->doctor association management.
//!
//! Both sides of this relation are capped at 5 and either side can initiate
//! the link, so every operation exists in both directions.

use crate::entity::{Doctor, Patient};
use crate::error::{ClinicError, Result};
use crate::rules;
use crate::store::{EntityStore, Relation};

pub struct PatientDoctorService<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> PatientDoctorService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Link a doctor to a patient, capped at 5 doctors per patient.
    pub fn add_doctor_to_patient(&self, patient_id: &str, doctor_id: &str) -> Result<Patient> {
        let doctor = self
            .store
            .find_doctor(doctor_id, &[])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        let mut patient = self
            .store
            .find_patient(patient_id, &[Relation::Doctors])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        let doctors = patient.doctors.get_or_insert_default();
        if !rules::can_add_association(doctors.len(), rules::MAX_DOCTORS_PER_PATIENT) {
            return Err(ClinicError::precondition_failed(
                "The patient already has the maximum number of doctors (5)",
            ));
        }

        doctors.push(doctor);
        self.store.save_patient(patient)
    }

    /// Link a patient to a doctor, capped at 5 patients per doctor.
    pub fn add_patient_to_doctor(&self, doctor_id: &str, patient_id: &str) -> Result<Doctor> {
        let patient = self
            .store
            .find_patient(patient_id, &[])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        let mut doctor = self
            .store
            .find_doctor(doctor_id, &[Relation::Patients])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        let patients = doctor.patients.get_or_insert_default();
        if !rules::can_add_association(patients.len(), rules::MAX_PATIENTS_PER_DOCTOR) {
            return Err(ClinicError::precondition_failed(
                "The doctor already has the maximum number of patients (5)",
            ));
        }

        patients.push(patient);
        self.store.save_doctor(doctor)
    }

    /// Return the doctor iff it is associated to the patient.
    pub fn find_doctor_for_patient(&self, patient_id: &str, doctor_id: &str) -> Result<Doctor> {
        let doctor = self
            .store
            .find_doctor(doctor_id, &[])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        let patient = self
            .store
            .find_patient(patient_id, &[Relation::Doctors])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        patient
            .doctors
            .unwrap_or_default()
            .into_iter()
            .find(|d| d.id == doctor.id)
            .ok_or_else(|| {
                ClinicError::precondition_failed(
                    "The doctor with the given id is not associated to the patient",
                )
            })
    }

    /// Return the patient iff it is associated to the doctor.
    pub fn find_patient_for_doctor(&self, doctor_id: &str, patient_id: &str) -> Result<Patient> {
        let patient = self
            .store
            .find_patient(patient_id, &[])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        let doctor = self
            .store
            .find_doctor(doctor_id, &[Relation::Patients])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        doctor
            .patients
            .unwrap_or_default()
            .into_iter()
            .find(|p| p.id == patient.id)
            .ok_or_else(|| {
                ClinicError::precondition_failed(
                    "The patient with the given id is not associated to the doctor",
                )
            })
    }

    pub fn list_doctors_for_patient(&self, patient_id: &str) -> Result<Vec<Doctor>> {
        let patient = self
            .store
            .find_patient(patient_id, &[Relation::Doctors])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;
        Ok(patient.doctors.unwrap_or_default())
    }

    pub fn list_patients_for_doctor(&self, doctor_id: &str) -> Result<Vec<Patient>> {
        let doctor = self
            .store
            .find_doctor(doctor_id, &[Relation::Patients])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;
        Ok(doctor.patients.unwrap_or_default())
    }

    /// Overwrite the patient's doctor set. All targets are resolved before
    /// anything is written, so a missing target leaves the set unchanged.
    pub fn replace_doctors_of_patient(
        &self,
        patient_id: &str,
        doctor_ids: &[String],
    ) -> Result<Patient> {
        let mut patient = self
            .store
            .find_patient(patient_id, &[Relation::Doctors])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        if doctor_ids.len() > rules::MAX_DOCTORS_PER_PATIENT {
            return Err(ClinicError::precondition_failed(
                "A patient cannot have more than 5 doctors",
            ));
        }

        let mut doctors = Vec::with_capacity(doctor_ids.len());
        for doctor_id in doctor_ids {
            let doctor = self
                .store
                .find_doctor(doctor_id, &[])?
                .ok_or_else(|| ClinicError::not_found("doctor"))?;
            doctors.push(doctor);
        }

        patient.doctors = Some(doctors);
        self.store.save_patient(patient)
    }

    /// Overwrite the doctor's patient set, same all-or-nothing contract.
    pub fn replace_patients_of_doctor(
        &self,
        doctor_id: &str,
        patient_ids: &[String],
    ) -> Result<Doctor> {
        let mut doctor = self
            .store
            .find_doctor(doctor_id, &[Relation::Patients])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        if patient_ids.len() > rules::MAX_PATIENTS_PER_DOCTOR {
            return Err(ClinicError::precondition_failed(
                "A doctor cannot have more than 5 patients",
            ));
        }

        let mut patients = Vec::with_capacity(patient_ids.len());
        for patient_id in patient_ids {
            let patient = self
                .store
                .find_patient(patient_id, &[])?
                .ok_or_else(|| ClinicError::not_found("patient"))?;
            patients.push(patient);
        }

        doctor.patients = Some(patients);
        self.store.save_doctor(doctor)
    }

    pub fn remove_doctor_from_patient(&self, patient_id: &str, doctor_id: &str) -> Result<()> {
        let doctor = self
            .store
            .find_doctor(doctor_id, &[])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        let mut patient = self
            .store
            .find_patient(patient_id, &[Relation::Doctors])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        let doctors = patient.doctors.get_or_insert_default();
        if !doctors.iter().any(|d| d.id == doctor.id) {
            return Err(ClinicError::precondition_failed(
                "The doctor with the given id is not associated to the patient",
            ));
        }

        doctors.retain(|d| d.id != doctor.id);
        self.store.save_patient(patient)?;
        Ok(())
    }

    pub fn remove_patient_from_doctor(&self, doctor_id: &str, patient_id: &str) -> Result<()> {
        let patient = self
            .store
            .find_patient(patient_id, &[])?
            .ok_or_else(|| ClinicError::not_found("patient"))?;

        let mut doctor = self
            .store
            .find_doctor(doctor_id, &[Relation::Patients])?
            .ok_or_else(|| ClinicError::not_found("doctor"))?;

        let patients = doctor.patients.get_or_insert_default();
        if !patients.iter().any(|p| p.id == patient.id) {
            return Err(ClinicError::precondition_failed(
                "The patient with the given id is not associated to the doctor",
            ));
        }

        patients.retain(|p| p.id != patient.id);
        self.store.save_doctor(doctor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seed_patient(store: &MemoryStore, name: &str) -> String {
        store
            .save_patient(Patient {
                name: name.to_string(),
                gender: "F".to_string(),
                ..Default::default()
            })
            .unwrap()
            .id
            .unwrap()
    }

    fn seed_doctor(store: &MemoryStore, name: &str) -> String {
        store
            .save_doctor(Doctor {
                name: name.to_string(),
                specialty: "Cardiology".to_string(),
                phone: "3001234567".to_string(),
                ..Default::default()
            })
            .unwrap()
            .id
            .unwrap()
    }

    #[test]
    fn test_add_doctor_to_patient() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let doctor_id = seed_doctor(&store, "Gregorio Casas");

        let patient = service.add_doctor_to_patient(&patient_id, &doctor_id).unwrap();

        let doctors = patient.doctors.unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].id.as_deref(), Some(doctor_id.as_str()));
    }

    #[test]
    fn test_add_doctor_to_patient_missing_doctor() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");

        let err = service.add_doctor_to_patient(&patient_id, "0").unwrap_err();
        assert_eq!(err.to_string(), "The doctor with the given id was not found");
    }

    #[test]
    fn test_add_doctor_to_patient_missing_patient() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let doctor_id = seed_doctor(&store, "Gregorio Casas");

        let err = service.add_doctor_to_patient("0", &doctor_id).unwrap_err();
        assert_eq!(err.to_string(), "The patient with the given id was not found");
    }

    #[test]
    fn test_patient_doctor_cap_is_enforced() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");

        for i in 0..5 {
            let doctor_id = seed_doctor(&store, &format!("Doctor {i}"));
            service.add_doctor_to_patient(&patient_id, &doctor_id).unwrap();
        }

        let sixth = seed_doctor(&store, "Doctor 6");
        let err = service.add_doctor_to_patient(&patient_id, &sixth).unwrap_err();
        assert!(matches!(err, ClinicError::PreconditionFailed(_)));

        // Failed add leaves the set unchanged.
        let doctors = service.list_doctors_for_patient(&patient_id).unwrap();
        assert_eq!(doctors.len(), 5);
    }

    #[test]
    fn test_doctor_patient_cap_grows_then_rejects_sixth() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let doctor_id = seed_doctor(&store, "Gregorio Casas");

        for i in 0..5 {
            let patient_id = seed_patient(&store, &format!("Patient {i}"));
            let doctor = service.add_patient_to_doctor(&doctor_id, &patient_id).unwrap();
            assert_eq!(doctor.patients.unwrap().len(), i + 1);
        }

        let sixth = seed_patient(&store, "Patient 6");
        let err = service.add_patient_to_doctor(&doctor_id, &sixth).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The doctor already has the maximum number of patients (5)"
        );
        assert_eq!(service.list_patients_for_doctor(&doctor_id).unwrap().len(), 5);
    }

    #[test]
    fn test_find_doctor_for_patient() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let doctor_id = seed_doctor(&store, "Gregorio Casas");
        service.add_doctor_to_patient(&patient_id, &doctor_id).unwrap();

        let doctor = service.find_doctor_for_patient(&patient_id, &doctor_id).unwrap();
        assert_eq!(doctor.name, "Gregorio Casas");
    }

    #[test]
    fn test_find_doctor_for_patient_not_associated() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let doctor_id = seed_doctor(&store, "Gregorio Casas");

        let err = service.find_doctor_for_patient(&patient_id, &doctor_id).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The doctor with the given id is not associated to the patient"
        );
    }

    #[test]
    fn test_list_requires_existing_anchor() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);

        assert!(matches!(
            service.list_doctors_for_patient("0").unwrap_err(),
            ClinicError::NotFound(_)
        ));
        assert!(matches!(
            service.list_patients_for_doctor("0").unwrap_err(),
            ClinicError::NotFound(_)
        ));
    }

    #[test]
    fn test_replace_doctors_of_patient() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let old_doctor = seed_doctor(&store, "Gregorio Casas");
        service.add_doctor_to_patient(&patient_id, &old_doctor).unwrap();

        let new_doctors = vec![
            seed_doctor(&store, "Nuevo Uno"),
            seed_doctor(&store, "Nuevo Dos"),
        ];
        service.replace_doctors_of_patient(&patient_id, &new_doctors).unwrap();

        let ids: Vec<String> = service
            .list_doctors_for_patient(&patient_id)
            .unwrap()
            .into_iter()
            .filter_map(|d| d.id)
            .collect();
        assert_eq!(ids, new_doctors);
    }

    #[test]
    fn test_replace_is_all_or_nothing() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let existing = seed_doctor(&store, "Gregorio Casas");
        service.add_doctor_to_patient(&patient_id, &existing).unwrap();

        let targets = vec![seed_doctor(&store, "Nuevo Uno"), "0".to_string()];
        let err = service.replace_doctors_of_patient(&patient_id, &targets).unwrap_err();
        assert!(matches!(err, ClinicError::NotFound(_)));

        // Nothing was written.
        let ids: Vec<String> = service
            .list_doctors_for_patient(&patient_id)
            .unwrap()
            .into_iter()
            .filter_map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![existing]);
    }

    #[test]
    fn test_replace_rejects_more_than_five() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let doctor_id = seed_doctor(&store, "Gregorio Casas");

        let patients: Vec<String> = (0..6)
            .map(|i| seed_patient(&store, &format!("Patient {i}")))
            .collect();
        let err = service.replace_patients_of_doctor(&doctor_id, &patients).unwrap_err();
        assert_eq!(err.to_string(), "A doctor cannot have more than 5 patients");
    }

    #[test]
    fn test_remove_doctor_from_patient() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let keep = seed_doctor(&store, "Se Queda");
        let gone = seed_doctor(&store, "Se Va");
        service.add_doctor_to_patient(&patient_id, &keep).unwrap();
        service.add_doctor_to_patient(&patient_id, &gone).unwrap();

        service.remove_doctor_from_patient(&patient_id, &gone).unwrap();

        let ids: Vec<String> = service
            .list_doctors_for_patient(&patient_id)
            .unwrap()
            .into_iter()
            .filter_map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![keep]);
    }

    #[test]
    fn test_remove_missing_association_fails() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let doctor_id = seed_doctor(&store, "Gregorio Casas");

        let err = service.remove_doctor_from_patient(&patient_id, &doctor_id).unwrap_err();
        assert!(matches!(err, ClinicError::PreconditionFailed(_)));
    }

    #[test]
    fn test_remove_association_visible_from_both_sides() {
        let store = MemoryStore::new();
        let service = PatientDoctorService::new(&store);
        let patient_id = seed_patient(&store, "Ana Maria");
        let doctor_id = seed_doctor(&store, "Gregorio Casas");
        service.add_patient_to_doctor(&doctor_id, &patient_id).unwrap();

        service.remove_patient_from_doctor(&doctor_id, &patient_id).unwrap();

        assert!(service.list_patients_for_doctor(&doctor_id).unwrap().is_empty());
        assert!(service.list_doctors_for_patient(&patient_id).unwrap().is_empty());
    }
}

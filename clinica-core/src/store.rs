//! Entity store contract and in-memory reference implementation.
//!
//! The join tables are the single source of truth for associations: the
//! `doctors` field of a patient and the `patients` field of a doctor are two
//! views of the same patient<->doctor join. Implementations must keep both
//! views consistent on every mutation.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::entity::{Diagnosis, Doctor, Patient};
use crate::error::{ClinicError, Result};

/// Relations that can be expanded on fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Patient -> doctors.
    Doctors,
    /// Patient -> diagnoses.
    Diagnoses,
    /// Doctor -> patients, or diagnosis -> patients.
    Patients,
}

/// Persistence contract consumed by the services.
///
/// Contract, beyond the method signatures:
/// - `save_*` assigns a fresh id when the record has none, and returns the
///   record with its id set.
/// - A `Some` relation field on save replaces the stored edge set for that
///   relation; `None` leaves the stored edges untouched. Every entity in a
///   `Some` relation must already have an id.
/// - Edges are deduplicated and insertion order is preserved for listing.
/// - `remove_*` cascades: every edge referencing the removed entity is
///   deleted in the same logical unit, so dangling references are never
///   persisted. Removing an absent id is a no-op.
/// - Expansion is one level deep: entities inside an expanded relation carry
///   unexpanded (`None`) relations of their own.
pub trait EntityStore {
    fn find_patient(&self, id: &str, expand: &[Relation]) -> Result<Option<Patient>>;
    fn find_all_patients(&self, expand: &[Relation]) -> Result<Vec<Patient>>;
    fn save_patient(&self, patient: Patient) -> Result<Patient>;
    fn remove_patient(&self, id: &str) -> Result<()>;

    fn find_doctor(&self, id: &str, expand: &[Relation]) -> Result<Option<Doctor>>;
    fn find_all_doctors(&self, expand: &[Relation]) -> Result<Vec<Doctor>>;
    fn save_doctor(&self, doctor: Doctor) -> Result<Doctor>;
    fn remove_doctor(&self, id: &str) -> Result<()>;

    fn find_diagnosis(&self, id: &str, expand: &[Relation]) -> Result<Option<Diagnosis>>;
    fn find_all_diagnoses(&self, expand: &[Relation]) -> Result<Vec<Diagnosis>>;
    fn save_diagnosis(&self, diagnosis: Diagnosis) -> Result<Diagnosis>;
    fn remove_diagnosis(&self, id: &str) -> Result<()>;
}

/// In-memory `EntityStore`, the reference implementation of the contract.
///
/// Records are kept in id-ordered maps and edges in insertion-ordered lists.
/// Used throughout the service tests; `clinica-store` provides the durable
/// backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    patients: BTreeMap<String, Patient>,
    doctors: BTreeMap<String, Doctor>,
    diagnoses: BTreeMap<String, Diagnosis>,
    // (patient_id, doctor_id) and (patient_id, diagnosis_id), in insertion
    // order, no duplicates.
    patient_doctor: Vec<(String, String)>,
    patient_diagnosis: Vec<(String, String)>,
}

impl Inner {
    fn doctors_of(&self, patient_id: &str) -> Vec<Doctor> {
        self.patient_doctor
            .iter()
            .filter(|(p, _)| p == patient_id)
            .filter_map(|(_, d)| self.doctors.get(d).cloned())
            .collect()
    }

    fn diagnoses_of(&self, patient_id: &str) -> Vec<Diagnosis> {
        self.patient_diagnosis
            .iter()
            .filter(|(p, _)| p == patient_id)
            .filter_map(|(_, d)| self.diagnoses.get(d).cloned())
            .collect()
    }

    fn patients_of_doctor(&self, doctor_id: &str) -> Vec<Patient> {
        self.patient_doctor
            .iter()
            .filter(|(_, d)| d == doctor_id)
            .filter_map(|(p, _)| self.patients.get(p).cloned())
            .collect()
    }

    fn patients_of_diagnosis(&self, diagnosis_id: &str) -> Vec<Patient> {
        self.patient_diagnosis
            .iter()
            .filter(|(_, d)| d == diagnosis_id)
            .filter_map(|(p, _)| self.patients.get(p).cloned())
            .collect()
    }
}

/// Replace the edges anchored at `anchor` with `(anchor, target)` pairs built
/// by `pair`, preserving the order of `targets` and dropping duplicates.
fn replace_edges(
    edges: &mut Vec<(String, String)>,
    is_anchored: impl Fn(&(String, String)) -> bool,
    pair: impl Fn(&str) -> (String, String),
    targets: &[String],
) {
    edges.retain(|edge| !is_anchored(edge));
    for target in targets {
        let edge = pair(target);
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }
}

fn ids_of<'a, T>(entities: &'a [T], id: impl Fn(&'a T) -> Option<&'a str>, kind: &str) -> Result<Vec<String>> {
    entities
        .iter()
        .map(|entity| {
            id(entity).map(str::to_string).ok_or_else(|| {
                ClinicError::Storage(format!("cannot associate a {kind} that has no id"))
            })
        })
        .collect()
}

fn assigned_id(id: &mut Option<String>) -> String {
    match id {
        Some(id) => id.clone(),
        None => {
            let fresh = uuid::Uuid::new_v4().to_string();
            *id = Some(fresh.clone());
            fresh
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| ClinicError::Storage("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| ClinicError::Storage("store lock poisoned".to_string()))
    }

    fn expand_patient(inner: &Inner, mut patient: Patient, expand: &[Relation]) -> Patient {
        let id = patient.id.clone().unwrap_or_default();
        if expand.contains(&Relation::Doctors) {
            patient.doctors = Some(inner.doctors_of(&id));
        }
        if expand.contains(&Relation::Diagnoses) {
            patient.diagnoses = Some(inner.diagnoses_of(&id));
        }
        patient
    }
}

impl EntityStore for MemoryStore {
    fn find_patient(&self, id: &str, expand: &[Relation]) -> Result<Option<Patient>> {
        let inner = self.read()?;
        Ok(inner
            .patients
            .get(id)
            .cloned()
            .map(|p| Self::expand_patient(&inner, p, expand)))
    }

    fn find_all_patients(&self, expand: &[Relation]) -> Result<Vec<Patient>> {
        let inner = self.read()?;
        Ok(inner
            .patients
            .values()
            .cloned()
            .map(|p| Self::expand_patient(&inner, p, expand))
            .collect())
    }

    fn save_patient(&self, mut patient: Patient) -> Result<Patient> {
        let mut inner = self.write()?;
        let id = assigned_id(&mut patient.id);

        if let Some(doctors) = &patient.doctors {
            let targets = ids_of(doctors, |d| d.id.as_deref(), "doctor")?;
            replace_edges(
                &mut inner.patient_doctor,
                |(p, _)| p == &id,
                |target| (id.clone(), target.to_string()),
                &targets,
            );
        }
        if let Some(diagnoses) = &patient.diagnoses {
            let targets = ids_of(diagnoses, |d| d.id.as_deref(), "diagnosis")?;
            replace_edges(
                &mut inner.patient_diagnosis,
                |(p, _)| p == &id,
                |target| (id.clone(), target.to_string()),
                &targets,
            );
        }

        let mut stored = patient.clone();
        stored.doctors = None;
        stored.diagnoses = None;
        inner.patients.insert(id, stored);
        Ok(patient)
    }

    fn remove_patient(&self, id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.patients.remove(id);
        inner.patient_doctor.retain(|(p, _)| p != id);
        inner.patient_diagnosis.retain(|(p, _)| p != id);
        Ok(())
    }

    fn find_doctor(&self, id: &str, expand: &[Relation]) -> Result<Option<Doctor>> {
        let inner = self.read()?;
        Ok(inner.doctors.get(id).cloned().map(|mut doctor| {
            if expand.contains(&Relation::Patients) {
                doctor.patients = Some(inner.patients_of_doctor(id));
            }
            doctor
        }))
    }

    fn find_all_doctors(&self, expand: &[Relation]) -> Result<Vec<Doctor>> {
        let inner = self.read()?;
        Ok(inner
            .doctors
            .values()
            .cloned()
            .map(|mut doctor| {
                if expand.contains(&Relation::Patients)
                    && let Some(id) = doctor.id.clone()
                {
                    doctor.patients = Some(inner.patients_of_doctor(&id));
                }
                doctor
            })
            .collect())
    }

    fn save_doctor(&self, mut doctor: Doctor) -> Result<Doctor> {
        let mut inner = self.write()?;
        let id = assigned_id(&mut doctor.id);

        if let Some(patients) = &doctor.patients {
            let targets = ids_of(patients, |p| p.id.as_deref(), "patient")?;
            replace_edges(
                &mut inner.patient_doctor,
                |(_, d)| d == &id,
                |target| (target.to_string(), id.clone()),
                &targets,
            );
        }

        let mut stored = doctor.clone();
        stored.patients = None;
        inner.doctors.insert(id, stored);
        Ok(doctor)
    }

    fn remove_doctor(&self, id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.doctors.remove(id);
        inner.patient_doctor.retain(|(_, d)| d != id);
        Ok(())
    }

    fn find_diagnosis(&self, id: &str, expand: &[Relation]) -> Result<Option<Diagnosis>> {
        let inner = self.read()?;
        Ok(inner.diagnoses.get(id).cloned().map(|mut diagnosis| {
            if expand.contains(&Relation::Patients) {
                diagnosis.patients = Some(inner.patients_of_diagnosis(id));
            }
            diagnosis
        }))
    }

    fn find_all_diagnoses(&self, expand: &[Relation]) -> Result<Vec<Diagnosis>> {
        let inner = self.read()?;
        Ok(inner
            .diagnoses
            .values()
            .cloned()
            .map(|mut diagnosis| {
                if expand.contains(&Relation::Patients)
                    && let Some(id) = diagnosis.id.clone()
                {
                    diagnosis.patients = Some(inner.patients_of_diagnosis(&id));
                }
                diagnosis
            })
            .collect())
    }

    fn save_diagnosis(&self, mut diagnosis: Diagnosis) -> Result<Diagnosis> {
        let mut inner = self.write()?;
        let id = assigned_id(&mut diagnosis.id);

        if let Some(patients) = &diagnosis.patients {
            let targets = ids_of(patients, |p| p.id.as_deref(), "patient")?;
            replace_edges(
                &mut inner.patient_diagnosis,
                |(_, d)| d == &id,
                |target| (target.to_string(), id.clone()),
                &targets,
            );
        }

        let mut stored = diagnosis.clone();
        stored.patients = None;
        inner.diagnoses.insert(id, stored);
        Ok(diagnosis)
    }

    fn remove_diagnosis(&self, id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.diagnoses.remove(id);
        inner.patient_diagnosis.retain(|(_, d)| d != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(name: &str) -> Patient {
        Patient {
            name: name.to_string(),
            gender: "F".to_string(),
            ..Default::default()
        }
    }

    fn doctor(name: &str) -> Doctor {
        Doctor {
            name: name.to_string(),
            specialty: "General".to_string(),
            phone: "3001234567".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_assigns_id() {
        let store = MemoryStore::new();
        let saved = store.save_patient(patient("Ana Maria")).unwrap();
        let id = saved.id.expect("id assigned on first save");

        let found = store.find_patient(&id, &[]).unwrap().unwrap();
        assert_eq!(found.name, "Ana Maria");
        assert!(found.doctors.is_none());
    }

    #[test]
    fn test_edges_are_symmetric_views() {
        let store = MemoryStore::new();
        let doc = store.save_doctor(doctor("Gregorio Casas")).unwrap();
        let mut pat = store.save_patient(patient("Ana Maria")).unwrap();

        pat.doctors = Some(vec![doc.clone()]);
        store.save_patient(pat.clone()).unwrap();

        let doc_side = store
            .find_doctor(doc.id.as_deref().unwrap(), &[Relation::Patients])
            .unwrap()
            .unwrap();
        let patients = doc_side.patients.unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].id, pat.id);
    }

    #[test]
    fn test_save_with_none_relation_keeps_edges() {
        let store = MemoryStore::new();
        let doc = store.save_doctor(doctor("Gregorio Casas")).unwrap();
        let mut pat = store.save_patient(patient("Ana Maria")).unwrap();
        pat.doctors = Some(vec![doc]);
        let mut pat = store.save_patient(pat).unwrap();

        // A scalar-only update must not touch the join.
        pat.doctors = None;
        pat.name = "Ana Lucia".to_string();
        let pat = store.save_patient(pat).unwrap();

        let found = store
            .find_patient(pat.id.as_deref().unwrap(), &[Relation::Doctors])
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Ana Lucia");
        assert_eq!(found.doctors.unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_edges_are_collapsed() {
        let store = MemoryStore::new();
        let doc = store.save_doctor(doctor("Gregorio Casas")).unwrap();
        let mut pat = store.save_patient(patient("Ana Maria")).unwrap();

        pat.doctors = Some(vec![doc.clone(), doc.clone()]);
        let pat = store.save_patient(pat).unwrap();

        let found = store
            .find_patient(pat.id.as_deref().unwrap(), &[Relation::Doctors])
            .unwrap()
            .unwrap();
        assert_eq!(found.doctors.unwrap().len(), 1);
    }

    #[test]
    fn test_remove_cascades_edges() {
        let store = MemoryStore::new();
        let doc = store.save_doctor(doctor("Gregorio Casas")).unwrap();
        let mut pat = store.save_patient(patient("Ana Maria")).unwrap();
        pat.doctors = Some(vec![doc.clone()]);
        let pat = store.save_patient(pat).unwrap();

        store.remove_doctor(doc.id.as_deref().unwrap()).unwrap();

        let found = store
            .find_patient(pat.id.as_deref().unwrap(), &[Relation::Doctors])
            .unwrap()
            .unwrap();
        assert!(found.doctors.unwrap().is_empty());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let store = MemoryStore::new();
        let mut pat = store.save_patient(patient("Ana Maria")).unwrap();
        let docs: Vec<Doctor> = ["Uno", "Dos", "Tres"]
            .iter()
            .map(|n| store.save_doctor(doctor(n)).unwrap())
            .collect();

        pat.doctors = Some(docs.clone());
        let pat = store.save_patient(pat).unwrap();

        let found = store
            .find_patient(pat.id.as_deref().unwrap(), &[Relation::Doctors])
            .unwrap()
            .unwrap();
        let names: Vec<String> = found.doctors.unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Uno", "Dos", "Tres"]);
    }

    #[test]
    fn test_unsaved_relation_entry_is_rejected() {
        let store = MemoryStore::new();
        let mut pat = store.save_patient(patient("Ana Maria")).unwrap();
        pat.doctors = Some(vec![doctor("Sin Id")]);

        let err = store.save_patient(pat).unwrap_err();
        assert!(matches!(err, ClinicError::Storage(_)));
    }
}

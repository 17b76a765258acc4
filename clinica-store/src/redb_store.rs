//! Redb-backed entity store.
//!
//! Key format:
//!   - entities table: {kind}/{id} -> serialized record, scalar fields only
//!   - edges table:    {kind}/{id}/{relation} -> JSON array of target ids
//!
//! The edges table holds both directions of each join ("patient/P/doctors"
//! and "doctor/D/patients" are written together in one transaction), so
//! either side reads its view without scanning.

use std::path::Path;

use clinica_core::entity::{Diagnosis, Doctor, Patient};
use clinica_core::store::{EntityStore, Relation};
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;

use crate::error::{Result, StoreError};

const ENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");
const EDGES: TableDefinition<&str, &[u8]> = TableDefinition::new("edges");

/// Durable `EntityStore` on a single redb file.
pub struct RedbStore {
    db: Database,
}

fn load_ids(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> Result<Vec<String>> {
    match table.get(key)? {
        Some(guard) => Ok(serde_json::from_slice(guard.value())?),
        None => Ok(Vec::new()),
    }
}

fn store_ids(
    table: &mut redb::Table<'_, &'static str, &'static [u8]>,
    key: &str,
    ids: &[String],
) -> Result<()> {
    if ids.is_empty() {
        table.remove(key)?;
    } else {
        table.insert(key, serde_json::to_vec(ids)?.as_slice())?;
    }
    Ok(())
}

fn load_record<R: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    kind: &str,
    id: &str,
) -> Result<Option<R>> {
    match table.get(format!("{kind}/{id}").as_str())? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

/// All records of one kind, in key order.
fn scan_kind<R: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    kind: &str,
) -> Result<Vec<R>> {
    let prefix = format!("{kind}/");
    let mut records = Vec::new();
    let range = table.range::<&str>(..)?;
    for entry in range {
        let (key, value) = entry?;
        if key.value().starts_with(&prefix) {
            records.push(serde_json::from_slice(value.value())?);
        }
    }
    Ok(records)
}

/// Resolve the edge targets anchored at `key`, preserving stored order.
fn load_targets<R: DeserializeOwned>(
    entities: &impl ReadableTable<&'static str, &'static [u8]>,
    edges: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
    target_kind: &str,
) -> Result<Vec<R>> {
    let mut targets = Vec::new();
    for target_id in load_ids(edges, key)? {
        if let Some(record) = load_record(entities, target_kind, &target_id)? {
            targets.push(record);
        }
    }
    Ok(targets)
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

/// Overwrite the edge set anchored at `forward_key` with `targets`, keeping
/// the reverse-side id lists consistent.
fn sync_relation(
    edges: &mut redb::Table<'_, &'static str, &'static [u8]>,
    forward_key: &str,
    reverse_key: impl Fn(&str) -> String,
    anchor_id: &str,
    targets: &[String],
) -> Result<()> {
    let new_ids = dedup(targets);
    let old_ids = load_ids(&*edges, forward_key)?;

    for removed in old_ids.iter().filter(|id| !new_ids.contains(id)) {
        let key = reverse_key(removed);
        let mut ids = load_ids(&*edges, &key)?;
        ids.retain(|id| id != anchor_id);
        store_ids(edges, &key, &ids)?;
    }
    for added in new_ids.iter().filter(|id| !old_ids.contains(id)) {
        let key = reverse_key(added);
        let mut ids = load_ids(&*edges, &key)?;
        if !ids.iter().any(|id| id == anchor_id) {
            ids.push(anchor_id.to_string());
        }
        store_ids(edges, &key, &ids)?;
    }

    store_ids(edges, forward_key, &new_ids)
}

/// Cascade: drop every edge referencing `anchor_id` through `forward_key`.
fn unlink_all(
    edges: &mut redb::Table<'_, &'static str, &'static [u8]>,
    forward_key: &str,
    reverse_key: impl Fn(&str) -> String,
    anchor_id: &str,
) -> Result<()> {
    for target in load_ids(&*edges, forward_key)? {
        let key = reverse_key(&target);
        let mut ids = load_ids(&*edges, &key)?;
        ids.retain(|id| id != anchor_id);
        store_ids(edges, &key, &ids)?;
    }
    edges.remove(forward_key)?;
    Ok(())
}

fn edge_targets<'a, T>(
    entries: &'a [T],
    id: impl Fn(&'a T) -> Option<&'a str>,
    kind: &str,
) -> Result<Vec<String>> {
    entries
        .iter()
        .map(|entry| {
            id(entry).map(str::to_string).ok_or_else(|| {
                StoreError::Other(format!("cannot associate a {kind} that has no id"))
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

impl RedbStore {
    /// Open the store (create if not exists).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(ENTITIES)?;
            let _ = txn.open_table(EDGES)?;
        }
        txn.commit()?;

        tracing::debug!("opened entity store");
        Ok(Self { db })
    }

    fn find_patient_inner(&self, id: &str, expand: &[Relation]) -> Result<Option<Patient>> {
        let txn = self.db.begin_read()?;
        let entities = txn.open_table(ENTITIES)?;
        let Some(mut patient) = load_record::<Patient>(&entities, "patient", id)? else {
            return Ok(None);
        };

        let edges = txn.open_table(EDGES)?;
        if expand.contains(&Relation::Doctors) {
            patient.doctors = Some(load_targets(
                &entities,
                &edges,
                &format!("patient/{id}/doctors"),
                "doctor",
            )?);
        }
        if expand.contains(&Relation::Diagnoses) {
            patient.diagnoses = Some(load_targets(
                &entities,
                &edges,
                &format!("patient/{id}/diagnoses"),
                "diagnosis",
            )?);
        }
        Ok(Some(patient))
    }

    fn find_all_patients_inner(&self, expand: &[Relation]) -> Result<Vec<Patient>> {
        let txn = self.db.begin_read()?;
        let entities = txn.open_table(ENTITIES)?;
        let edges = txn.open_table(EDGES)?;

        let mut patients: Vec<Patient> = scan_kind(&entities, "patient")?;
        for patient in &mut patients {
            let id = patient.id.clone().unwrap_or_default();
            if expand.contains(&Relation::Doctors) {
                patient.doctors = Some(load_targets(
                    &entities,
                    &edges,
                    &format!("patient/{id}/doctors"),
                    "doctor",
                )?);
            }
            if expand.contains(&Relation::Diagnoses) {
                patient.diagnoses = Some(load_targets(
                    &entities,
                    &edges,
                    &format!("patient/{id}/diagnoses"),
                    "diagnosis",
                )?);
            }
        }
        Ok(patients)
    }

    fn save_patient_inner(&self, mut patient: Patient) -> Result<Patient> {
        let id = assigned_id(&mut patient.id);

        let txn = self.db.begin_write()?;
        {
            let mut entities = txn.open_table(ENTITIES)?;
            let mut edges = txn.open_table(EDGES)?;

            if let Some(doctors) = &patient.doctors {
                let targets = edge_targets(doctors, |d| d.id.as_deref(), "doctor")?;
                sync_relation(
                    &mut edges,
                    &format!("patient/{id}/doctors"),
                    |d| format!("doctor/{d}/patients"),
                    &id,
                    &targets,
                )?;
            }
            if let Some(diagnoses) = &patient.diagnoses {
                let targets = edge_targets(diagnoses, |d| d.id.as_deref(), "diagnosis")?;
                sync_relation(
                    &mut edges,
                    &format!("patient/{id}/diagnoses"),
                    |d| format!("diagnosis/{d}/patients"),
                    &id,
                    &targets,
                )?;
            }

            let mut stored = patient.clone();
            stored.doctors = None;
            stored.diagnoses = None;
            entities.insert(
                format!("patient/{id}").as_str(),
                serde_json::to_vec(&stored)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(patient)
    }

    fn remove_patient_inner(&self, id: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut entities = txn.open_table(ENTITIES)?;
            entities.remove(format!("patient/{id}").as_str())?;

            let mut edges = txn.open_table(EDGES)?;
            unlink_all(
                &mut edges,
                &format!("patient/{id}/doctors"),
                |d| format!("doctor/{d}/patients"),
                id,
            )?;
            unlink_all(
                &mut edges,
                &format!("patient/{id}/diagnoses"),
                |d| format!("diagnosis/{d}/patients"),
                id,
            )?;
        }
        txn.commit()?;
        Ok(())
    }

    fn find_doctor_inner(&self, id: &str, expand: &[Relation]) -> Result<Option<Doctor>> {
        let txn = self.db.begin_read()?;
        let entities = txn.open_table(ENTITIES)?;
        let Some(mut doctor) = load_record::<Doctor>(&entities, "doctor", id)? else {
            return Ok(None);
        };

        if expand.contains(&Relation::Patients) {
            let edges = txn.open_table(EDGES)?;
            doctor.patients = Some(load_targets(
                &entities,
                &edges,
                &format!("doctor/{id}/patients"),
                "patient",
            )?);
        }
        Ok(Some(doctor))
    }

    fn find_all_doctors_inner(&self, expand: &[Relation]) -> Result<Vec<Doctor>> {
        let txn = self.db.begin_read()?;
        let entities = txn.open_table(ENTITIES)?;
        let edges = txn.open_table(EDGES)?;

        let mut doctors: Vec<Doctor> = scan_kind(&entities, "doctor")?;
        if expand.contains(&Relation::Patients) {
            for doctor in &mut doctors {
                let id = doctor.id.clone().unwrap_or_default();
                doctor.patients = Some(load_targets(
                    &entities,
                    &edges,
                    &format!("doctor/{id}/patients"),
                    "patient",
                )?);
            }
        }
        Ok(doctors)
    }

    fn save_doctor_inner(&self, mut doctor: Doctor) -> Result<Doctor> {
        let id = assigned_id(&mut doctor.id);

        let txn = self.db.begin_write()?;
        {
            let mut entities = txn.open_table(ENTITIES)?;
            let mut edges = txn.open_table(EDGES)?;

            if let Some(patients) = &doctor.patients {
                let targets = edge_targets(patients, |p| p.id.as_deref(), "patient")?;
                sync_relation(
                    &mut edges,
                    &format!("doctor/{id}/patients"),
                    |p| format!("patient/{p}/doctors"),
                    &id,
                    &targets,
                )?;
            }

            let mut stored = doctor.clone();
            stored.patients = None;
            entities.insert(
                format!("doctor/{id}").as_str(),
                serde_json::to_vec(&stored)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(doctor)
    }

    fn remove_doctor_inner(&self, id: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut entities = txn.open_table(ENTITIES)?;
            entities.remove(format!("doctor/{id}").as_str())?;

            let mut edges = txn.open_table(EDGES)?;
            unlink_all(
                &mut edges,
                &format!("doctor/{id}/patients"),
                |p| format!("patient/{p}/doctors"),
                id,
            )?;
        }
        txn.commit()?;
        Ok(())
    }

    fn find_diagnosis_inner(&self, id: &str, expand: &[Relation]) -> Result<Option<Diagnosis>> {
        let txn = self.db.begin_read()?;
        let entities = txn.open_table(ENTITIES)?;
        let Some(mut diagnosis) = load_record::<Diagnosis>(&entities, "diagnosis", id)? else {
            return Ok(None);
        };

        if expand.contains(&Relation::Patients) {
            let edges = txn.open_table(EDGES)?;
            diagnosis.patients = Some(load_targets(
                &entities,
                &edges,
                &format!("diagnosis/{id}/patients"),
                "patient",
            )?);
        }
        Ok(Some(diagnosis))
    }

    fn find_all_diagnoses_inner(&self, expand: &[Relation]) -> Result<Vec<Diagnosis>> {
        let txn = self.db.begin_read()?;
        let entities = txn.open_table(ENTITIES)?;
        let edges = txn.open_table(EDGES)?;

        let mut diagnoses: Vec<Diagnosis> = scan_kind(&entities, "diagnosis")?;
        if expand.contains(&Relation::Patients) {
            for diagnosis in &mut diagnoses {
                let id = diagnosis.id.clone().unwrap_or_default();
                diagnosis.patients = Some(load_targets(
                    &entities,
                    &edges,
                    &format!("diagnosis/{id}/patients"),
                    "patient",
                )?);
            }
        }
        Ok(diagnoses)
    }

    fn save_diagnosis_inner(&self, mut diagnosis: Diagnosis) -> Result<Diagnosis> {
        let id = assigned_id(&mut diagnosis.id);

        let txn = self.db.begin_write()?;
        {
            let mut entities = txn.open_table(ENTITIES)?;
            let mut edges = txn.open_table(EDGES)?;

            if let Some(patients) = &diagnosis.patients {
                let targets = edge_targets(patients, |p| p.id.as_deref(), "patient")?;
                sync_relation(
                    &mut edges,
                    &format!("diagnosis/{id}/patients"),
                    |p| format!("patient/{p}/diagnoses"),
                    &id,
                    &targets,
                )?;
            }

            let mut stored = diagnosis.clone();
            stored.patients = None;
            entities.insert(
                format!("diagnosis/{id}").as_str(),
                serde_json::to_vec(&stored)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(diagnosis)
    }

    fn remove_diagnosis_inner(&self, id: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut entities = txn.open_table(ENTITIES)?;
            entities.remove(format!("diagnosis/{id}").as_str())?;

            let mut edges = txn.open_table(EDGES)?;
            unlink_all(
                &mut edges,
                &format!("diagnosis/{id}/patients"),
                |p| format!("patient/{p}/diagnoses"),
                id,
            )?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl EntityStore for RedbStore {
    fn find_patient(&self, id: &str, expand: &[Relation]) -> clinica_core::Result<Option<Patient>> {
        Ok(self.find_patient_inner(id, expand)?)
    }

    fn find_all_patients(&self, expand: &[Relation]) -> clinica_core::Result<Vec<Patient>> {
        Ok(self.find_all_patients_inner(expand)?)
    }

    fn save_patient(&self, patient: Patient) -> clinica_core::Result<Patient> {
        Ok(self.save_patient_inner(patient)?)
    }

    fn remove_patient(&self, id: &str) -> clinica_core::Result<()> {
        Ok(self.remove_patient_inner(id)?)
    }

    fn find_doctor(&self, id: &str, expand: &[Relation]) -> clinica_core::Result<Option<Doctor>> {
        Ok(self.find_doctor_inner(id, expand)?)
    }

    fn find_all_doctors(&self, expand: &[Relation]) -> clinica_core::Result<Vec<Doctor>> {
        Ok(self.find_all_doctors_inner(expand)?)
    }

    fn save_doctor(&self, doctor: Doctor) -> clinica_core::Result<Doctor> {
        Ok(self.save_doctor_inner(doctor)?)
    }

    fn remove_doctor(&self, id: &str) -> clinica_core::Result<()> {
        Ok(self.remove_doctor_inner(id)?)
    }

    fn find_diagnosis(
        &self,
        id: &str,
        expand: &[Relation],
    ) -> clinica_core::Result<Option<Diagnosis>> {
        Ok(self.find_diagnosis_inner(id, expand)?)
    }

    fn find_all_diagnoses(&self, expand: &[Relation]) -> clinica_core::Result<Vec<Diagnosis>> {
        Ok(self.find_all_diagnoses_inner(expand)?)
    }

    fn save_diagnosis(&self, diagnosis: Diagnosis) -> clinica_core::Result<Diagnosis> {
        Ok(self.save_diagnosis_inner(diagnosis)?)
    }

    fn remove_diagnosis(&self, id: &str) -> clinica_core::Result<()> {
        Ok(self.remove_diagnosis_inner(id)?)
    }
}

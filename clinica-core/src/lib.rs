pub mod entity;
pub mod error;
pub mod rules;
pub mod service;
pub mod store;

pub use entity::{Diagnosis, DiagnosisPatch, Doctor, DoctorPatch, Patient, PatientPatch};
pub use error::{ClinicError, ErrorKind, Result};
pub use service::{
    DiagnosisService, DoctorService, PatientDiagnosisService, PatientDoctorService, PatientService,
};
pub use store::{EntityStore, MemoryStore, Relation};

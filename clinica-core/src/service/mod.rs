//! Lifecycle and association services.
//!
//! Each service borrows an [`EntityStore`](crate::store::EntityStore) and
//! executes one logical unit per call: validate, read, write. All business
//! rules live here and in [`rules`](crate::rules); the store only persists.

pub mod diagnosis;
pub mod doctor;
pub mod patient;
pub mod patient_diagnosis;
pub mod patient_doctor;

pub use diagnosis::DiagnosisService;
pub use doctor::DoctorService;
pub use patient::PatientService;
pub use patient_diagnosis::PatientDiagnosisService;
pub use patient_doctor::PatientDoctorService;

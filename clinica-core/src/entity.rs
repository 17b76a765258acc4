use serde::{Deserialize, Serialize};

/// A patient record.
///
/// Relation fields are `None` when the relation was not expanded on fetch.
/// Saving an entity whose relation field is `Some` replaces the stored edge
/// set for that relation; a `None` relation leaves the stored edges untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    pub gender: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctors: Option<Vec<Doctor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnoses: Option<Vec<Diagnosis>>,
}

/// A doctor record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    pub specialty: String,

    pub phone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patients: Option<Vec<Patient>>,
}

/// A diagnosis record. The display name is optional; the description is
/// required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patients: Option<Vec<Patient>>,
}

fn merge_field(target: &mut String, patch: Option<String>) {
    if let Some(value) = patch
        && !value.is_empty()
    {
        *target = value;
    }
}

/// Partial update for a patient. Absent or empty fields are no-ops; a field
/// cannot be cleared to empty through a patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub gender: Option<String>,
}

impl PatientPatch {
    pub fn merge_into(self, patient: &mut Patient) {
        merge_field(&mut patient.name, self.name);
        merge_field(&mut patient.gender, self.gender);
    }
}

/// Partial update for a doctor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
}

impl DoctorPatch {
    pub fn merge_into(self, doctor: &mut Doctor) {
        merge_field(&mut doctor.name, self.name);
        merge_field(&mut doctor.specialty, self.specialty);
        merge_field(&mut doctor.phone, self.phone);
    }
}

/// Partial update for a diagnosis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagnosisPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DiagnosisPatch {
    pub fn merge_into(self, diagnosis: &mut Diagnosis) {
        if let Some(name) = self.name
            && !name.is_empty()
        {
            diagnosis.name = Some(name);
        }
        merge_field(&mut diagnosis.description, self.description);
    }
}

//! Patient record types for treatment outcome prediction.
//!
//! Column layout follows the mental-health treatment dataset: 9 bounded numeric
//! scales and 5 categorical attributes, in a fixed order shared by training and
//! inference.

use serde::{Deserialize, Serialize};

/// Numeric attributes of a patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericField {
    Age,
    SymptomSeverity,
    MoodScore,
    SleepQuality,
    PhysicalActivity,
    TreatmentDuration,
    StressLevel,
    TreatmentProgress,
    Adherence,
}

impl NumericField {
    /// Dataset column header.
    #[must_use]
    pub fn header(&self) -> &'static str {
        match self {
            Self::Age => "Age",
            Self::SymptomSeverity => "Symptom Severity (1-10)",
            Self::MoodScore => "Mood Score (1-10)",
            Self::SleepQuality => "Sleep Quality (1-10)",
            Self::PhysicalActivity => "Physical Activity (hrs/week)",
            Self::TreatmentDuration => "Treatment Duration (weeks)",
            Self::StressLevel => "Stress Level (1-10)",
            Self::TreatmentProgress => "Treatment Progress (1-10)",
            Self::Adherence => "Adherence to Treatment (%)",
        }
    }

    /// Inclusive admissible range.
    #[must_use]
    pub fn domain(&self) -> (u32, u32) {
        match self {
            Self::Age => (0, 120),
            Self::SymptomSeverity
            | Self::MoodScore
            | Self::SleepQuality
            | Self::StressLevel
            | Self::TreatmentProgress => (1, 10),
            Self::PhysicalActivity => (0, 168),
            Self::TreatmentDuration => (0, 520),
            Self::Adherence => (0, 100),
        }
    }
}

/// Categorical attributes of a patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoricalField {
    Gender,
    Diagnosis,
    Medication,
    TherapyType,
    EmotionalState,
}

impl CategoricalField {
    /// All categorical input fields, in column order.
    pub const ALL: [CategoricalField; 5] = [
        Self::Gender,
        Self::Diagnosis,
        Self::Medication,
        Self::TherapyType,
        Self::EmotionalState,
    ];

    /// Dataset column header. Also the key of the field's vocabulary in an encoder set.
    #[must_use]
    pub fn header(&self) -> &'static str {
        match self {
            Self::Gender => "Gender",
            Self::Diagnosis => "Diagnosis",
            Self::Medication => "Medication",
            Self::TherapyType => "Therapy Type",
            Self::EmotionalState => "AI-Detected Emotional State",
        }
    }

    /// Values accepted at the serving boundary.
    ///
    /// These are independent of the vocabulary fitted at training time; the two can
    /// drift apart and the inference pipeline must detect it.
    #[must_use]
    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            Self::Gender => &["Male", "Female", "Other"],
            Self::Diagnosis => &[
                "Depression",
                "Anxiety",
                "Bipolar",
                "PTSD",
                "Schizophrenia",
                "Other",
            ],
            Self::Medication => &[
                "SSRIs",
                "SNRIs",
                "Benzodiazepines",
                "Antipsychotics",
                "Mood Stabilizers",
                "None",
                "Other",
            ],
            Self::TherapyType => &[
                "CBT",
                "DBT",
                "Psychodynamic",
                "Group Therapy",
                "Family Therapy",
                "None",
                "Other",
            ],
            Self::EmotionalState => &["Stable", "Improving", "Declining", "Fluctuating", "Critical"],
        }
    }
}

/// One column of the record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Numeric(NumericField),
    Categorical(CategoricalField),
}

impl Column {
    /// Dataset column header.
    #[must_use]
    pub fn header(&self) -> &'static str {
        match self {
            Self::Numeric(f) => f.header(),
            Self::Categorical(f) => f.header(),
        }
    }
}

/// Dataset header of the label column.
pub const OUTCOME_HEADER: &str = "Outcome";

/// Number of input columns in a record.
pub const COLUMN_COUNT: usize = 14;

/// Column order of a record, and of every feature vector derived from one.
pub const COLUMN_ORDER: [Column; COLUMN_COUNT] = [
    Column::Numeric(NumericField::Age),
    Column::Categorical(CategoricalField::Gender),
    Column::Categorical(CategoricalField::Diagnosis),
    Column::Numeric(NumericField::SymptomSeverity),
    Column::Numeric(NumericField::MoodScore),
    Column::Numeric(NumericField::SleepQuality),
    Column::Numeric(NumericField::PhysicalActivity),
    Column::Categorical(CategoricalField::Medication),
    Column::Categorical(CategoricalField::TherapyType),
    Column::Numeric(NumericField::TreatmentDuration),
    Column::Numeric(NumericField::StressLevel),
    Column::Numeric(NumericField::TreatmentProgress),
    Column::Categorical(CategoricalField::EmotionalState),
    Column::Numeric(NumericField::Adherence),
];

/// A single patient record with all 14 attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Age in years (0-120)
    pub age: u32,

    pub gender: String,

    pub diagnosis: String,

    /// Symptom severity score (1-10)
    pub symptom_severity: u32,

    /// Mood score (1-10)
    pub mood_score: u32,

    /// Sleep quality score (1-10)
    pub sleep_quality: u32,

    /// Physical activity in hours per week (0-168)
    pub physical_activity: u32,

    pub medication: String,

    pub therapy_type: String,

    /// Treatment duration in weeks (0-520)
    pub treatment_duration: u32,

    /// Stress level (1-10)
    pub stress_level: u32,

    /// Treatment progress (1-10)
    pub treatment_progress: u32,

    /// Emotional state as detected from free-text journaling
    pub emotional_state: String,

    /// Adherence to treatment in percent (0-100)
    pub adherence: u32,
}

impl PatientRecord {
    /// Value of a numeric attribute.
    #[must_use]
    pub fn numeric(&self, field: NumericField) -> u32 {
        match field {
            NumericField::Age => self.age,
            NumericField::SymptomSeverity => self.symptom_severity,
            NumericField::MoodScore => self.mood_score,
            NumericField::SleepQuality => self.sleep_quality,
            NumericField::PhysicalActivity => self.physical_activity,
            NumericField::TreatmentDuration => self.treatment_duration,
            NumericField::StressLevel => self.stress_level,
            NumericField::TreatmentProgress => self.treatment_progress,
            NumericField::Adherence => self.adherence,
        }
    }

    /// Value of a categorical attribute.
    #[must_use]
    pub fn categorical(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::Gender => &self.gender,
            CategoricalField::Diagnosis => &self.diagnosis,
            CategoricalField::Medication => &self.medication,
            CategoricalField::TherapyType => &self.therapy_type,
            CategoricalField::EmotionalState => &self.emotional_state,
        }
    }

    /// Build a record from cells laid out in [`COLUMN_ORDER`].
    ///
    /// Numeric cells must hold integers (`"7"` or `"7.0"`) inside the column's
    /// domain. Categorical cells are taken verbatim after trimming.
    ///
    /// # Errors
    /// Returns a description of the first offending cell.
    pub fn from_cells(cells: &[&str]) -> Result<Self, String> {
        if cells.len() != COLUMN_COUNT {
            return Err(format!(
                "Expected {COLUMN_COUNT} cells, got {}",
                cells.len()
            ));
        }

        let num = |idx: usize, field: NumericField| -> Result<u32, String> {
            let raw = cells[idx].trim();
            let value = parse_integral(raw)
                .ok_or_else(|| format!("{}: '{raw}' is not an integer", field.header()))?;
            let (min, max) = field.domain();
            if !(min..=max).contains(&value) {
                return Err(format!(
                    "{}: {value} out of range [{min}, {max}]",
                    field.header()
                ));
            }
            Ok(value)
        };
        let cat = |idx: usize| cells[idx].trim().to_string();

        Ok(Self {
            age: num(0, NumericField::Age)?,
            gender: cat(1),
            diagnosis: cat(2),
            symptom_severity: num(3, NumericField::SymptomSeverity)?,
            mood_score: num(4, NumericField::MoodScore)?,
            sleep_quality: num(5, NumericField::SleepQuality)?,
            physical_activity: num(6, NumericField::PhysicalActivity)?,
            medication: cat(7),
            therapy_type: cat(8),
            treatment_duration: num(9, NumericField::TreatmentDuration)?,
            stress_level: num(10, NumericField::StressLevel)?,
            treatment_progress: num(11, NumericField::TreatmentProgress)?,
            emotional_state: cat(12),
            adherence: num(13, NumericField::Adherence)?,
        })
    }

    /// Validate the record against the serving boundary's rules.
    ///
    /// Every numeric value must lie inside its declared domain and every
    /// categorical value must belong to the field's enumerated set.
    ///
    /// # Errors
    /// Returns all validation errors found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for column in COLUMN_ORDER {
            match column {
                Column::Numeric(field) => {
                    let value = self.numeric(field);
                    let (min, max) = field.domain();
                    if !(min..=max).contains(&value) {
                        errors.push(format!(
                            "{} {value} out of range [{min}, {max}]",
                            field.header()
                        ));
                    }
                }
                Column::Categorical(field) => {
                    let value = self.categorical(field);
                    if !field.allowed_values().contains(&value) {
                        errors.push(format!(
                            "{} must be one of: {}",
                            field.header(),
                            field.allowed_values().join(", ")
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_integral(raw: &str) -> Option<u32> {
    if let Ok(v) = raw.parse::<u32>() {
        return Some(v);
    }
    // pandas exports integer columns containing NaN as floats ("7.0")
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v >= 0.0 && v <= f64::from(u32::MAX) {
        Some(v as u32)
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> PatientRecord {
    PatientRecord {
        age: 34,
        gender: "Female".into(),
        diagnosis: "Anxiety".into(),
        symptom_severity: 6,
        mood_score: 5,
        sleep_quality: 7,
        physical_activity: 4,
        medication: "SSRIs".into(),
        therapy_type: "CBT".into(),
        treatment_duration: 12,
        stress_level: 6,
        treatment_progress: 7,
        emotional_state: "Improving".into(),
        adherence: 85,
    }
}

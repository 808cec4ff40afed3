//! # Feature Derivation
//!
//! Reproduces, column for column, the engineered features the classifier was
//! trained on. Everything here is a pure function of one [`StudentRecord`]: no I/O,
//! no randomness, and the same input always yields the same [`DerivedFeatures`].
//!
//! Order matters. The fast-track override rewrites both GPA fields before any
//! GPA-based column is computed, because fast-track students have no conventional
//! first-year GPA.

use crate::record::{INTERNATIONAL_RESIDENCY_CODE, StudentRecord, YES_CODE};

// --- Column names, exactly as the training frame spelled them ---

pub const FIRST_TERM_GPA: &str = "FirstTermGPA";
pub const SECOND_TERM_GPA: &str = "SecondTermGPA";
pub const HIGH_SCHOOL_AVERAGE_MARK: &str = "HighSchoolAverageMark";
pub const MATH_SCORE: &str = "MathScore";
pub const FIRST_LANGUAGE: &str = "FirstLanguage";
pub const FUNDING: &str = "Funding";
pub const SCHOOL: &str = "School";
pub const FAST_TRACK: &str = "FastTrack";
pub const COOP: &str = "Coop";
pub const RESIDENCY: &str = "Residency";
pub const GENDER: &str = "Gender";
pub const PREV_EDUCATION: &str = "PrevEducation";
pub const AGE_GROUP: &str = "AgeGroup";
pub const ENGLISH_GRADE: &str = "EnglishGrade";

pub const AVG_FIRST_YEAR_GPA: &str = "AvgFirstYearGPA";
pub const HS_VS_FIRST_TERM_GAP: &str = "HS_vs_FirstTerm_Gap";
pub const GPA_PROGRESSION: &str = "GPA_Progression";
pub const HS_TO_GPA_RATIO: &str = "HS_to_GPA_Ratio";
pub const LOW_HS_MARK_FLAG: &str = "LowHSMark_flag";
pub const LOW_FIRST_TERM_GPA_FLAG: &str = "LowFirstTermGPA_flag";
pub const FAST_TRACK_IS_Y: &str = "FastTrack_isY";
pub const COOP_IS_Y: &str = "Coop_isY";
pub const INTL_ENGLISH_RISK: &str = "Intl_English_Risk";
pub const HS_MARK_BIN: &str = "HSMark_Bin";
pub const FUNDING_SCHOOL: &str = "Funding_School";
pub const AGE_GROUP_RESIDENCY: &str = "AgeGroup_Residency";

/// Joins the two codes of a composite categorical key.
pub const COMPOSITE_SEPARATOR: &str = "_";

/// Lower edges of high-school mark buckets 1 through 4. Bucket 0 is everything
/// below the first edge and bucket 4 is open-ended.
pub const HS_MARK_BIN_EDGES: [f64; 4] = [60.0, 70.0, 80.0, 90.0];

const LOW_HS_MARK_CUTOFF: f64 = 65.0;
const LOW_FIRST_TERM_GPA_CUTOFF: f64 = 2.0;
const LOW_ENGLISH_GRADE_CUTOFF: i64 = 5;

/// Divisor that puts a percentage mark on the 4-point GPA scale.
const MARK_TO_GPA_SCALE: f64 = 25.0;

/// Number of continuous and flag columns returned by [`DerivedFeatures::numeric_columns`].
pub const NUMERIC_COLUMN_COUNT: usize = 13;

/// Number of categorical columns returned by [`DerivedFeatures::categorical_columns`].
pub const CATEGORICAL_COLUMN_COUNT: usize = 13;

/// The per-request feature set, before one-hot encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFeatures {
    /// The input record after the fast-track override.
    pub record: StudentRecord,
    pub avg_first_year_gpa: f64,
    pub hs_vs_first_term_gap: f64,
    pub gpa_progression: f64,
    /// `mark / (first_term_gpa + 1)`. The `+ 1` is a fixed bias rather than a real
    /// zero guard, so a GPA of exactly -1 still yields a non-finite ratio.
    pub hs_to_gpa_ratio: f64,
    pub low_hs_mark_flag: u8,
    pub low_first_term_gpa_flag: u8,
    pub fast_track_is_y: u8,
    pub coop_is_y: u8,
    pub intl_english_risk: u8,
    /// Ordinal bucket of the high-school mark, always in `0..=4`.
    pub hs_mark_bin: u8,
    pub funding_school: String,
    pub age_group_residency: String,
}

/// Derives every engineered column from a student record.
pub fn derive(record: &StudentRecord) -> DerivedFeatures {
    let record = apply_fast_track_override(record.clone());

    let gpa1 = record.first_term_gpa;
    let gpa2 = record.second_term_gpa;
    let mark = record.high_school_average_mark;

    DerivedFeatures {
        avg_first_year_gpa: (gpa1 + gpa2) / 2.0,
        hs_vs_first_term_gap: mark / MARK_TO_GPA_SCALE - gpa1,
        gpa_progression: gpa2 - gpa1,
        hs_to_gpa_ratio: mark / (gpa1 + 1.0),
        low_hs_mark_flag: flag(mark < LOW_HS_MARK_CUTOFF),
        low_first_term_gpa_flag: flag(gpa1 < LOW_FIRST_TERM_GPA_CUTOFF),
        fast_track_is_y: flag(record.fast_track == YES_CODE),
        coop_is_y: flag(record.coop == YES_CODE),
        intl_english_risk: flag(
            record.residency == INTERNATIONAL_RESIDENCY_CODE
                && record.english_grade < LOW_ENGLISH_GRADE_CUTOFF,
        ),
        hs_mark_bin: hs_mark_bin(mark),
        funding_school: composite_key(record.funding, record.school),
        age_group_residency: composite_key(record.age_group, record.residency),
        record,
    }
}

/// Zeroes both term GPAs for fast-track students. Applying it twice is the same as once.
pub fn apply_fast_track_override(mut record: StudentRecord) -> StudentRecord {
    if record.fast_track == YES_CODE {
        record.first_term_gpa = 0.0;
        record.second_term_gpa = 0.0;
    }
    record
}

/// Buckets a high-school mark with inclusive lower and exclusive upper edges.
///
/// Marks below 60 land in bucket 0, marks of 90 or more in bucket 4. A non-finite
/// mark fails every comparison and lands in bucket 0.
pub fn hs_mark_bin(mark: f64) -> u8 {
    HS_MARK_BIN_EDGES
        .iter()
        .take_while(|&&edge| mark >= edge)
        .count() as u8
}

fn composite_key(left: i64, right: i64) -> String {
    format!("{left}{COMPOSITE_SEPARATOR}{right}")
}

fn flag(condition: bool) -> u8 {
    u8::from(condition)
}

impl DerivedFeatures {
    /// Columns that reach the model as plain numbers, under their own names.
    pub fn numeric_columns(&self) -> [(&'static str, f64); NUMERIC_COLUMN_COUNT] {
        let r = &self.record;
        [
            (FIRST_TERM_GPA, r.first_term_gpa),
            (SECOND_TERM_GPA, r.second_term_gpa),
            (HIGH_SCHOOL_AVERAGE_MARK, r.high_school_average_mark),
            (MATH_SCORE, r.math_score),
            (AVG_FIRST_YEAR_GPA, self.avg_first_year_gpa),
            (HS_VS_FIRST_TERM_GAP, self.hs_vs_first_term_gap),
            (GPA_PROGRESSION, self.gpa_progression),
            (HS_TO_GPA_RATIO, self.hs_to_gpa_ratio),
            (LOW_HS_MARK_FLAG, f64::from(self.low_hs_mark_flag)),
            (LOW_FIRST_TERM_GPA_FLAG, f64::from(self.low_first_term_gpa_flag)),
            (FAST_TRACK_IS_Y, f64::from(self.fast_track_is_y)),
            (COOP_IS_Y, f64::from(self.coop_is_y)),
            (INTL_ENGLISH_RISK, f64::from(self.intl_english_risk)),
        ]
    }

    /// Columns that are one-hot encoded, paired with the category token they hold.
    pub fn categorical_columns(&self) -> [(&'static str, String); CATEGORICAL_COLUMN_COUNT] {
        let r = &self.record;
        [
            (FIRST_LANGUAGE, r.first_language.to_string()),
            (FUNDING, r.funding.to_string()),
            (SCHOOL, r.school.to_string()),
            (FAST_TRACK, r.fast_track.to_string()),
            (COOP, r.coop.to_string()),
            (RESIDENCY, r.residency.to_string()),
            (GENDER, r.gender.to_string()),
            (PREV_EDUCATION, r.prev_education.to_string()),
            (AGE_GROUP, r.age_group.to_string()),
            (ENGLISH_GRADE, r.english_grade.to_string()),
            (HS_MARK_BIN, self.hs_mark_bin.to_string()),
            (FUNDING_SCHOOL, self.funding_school.clone()),
            (AGE_GROUP_RESIDENCY, self.age_group_residency.clone()),
        ]
    }
}

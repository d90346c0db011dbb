//! Transform catalog records into local exercise records.
//!
//! Classification is driven by the ordered rule tables below. Each table is
//! evaluated top to bottom against a lower-cased input and the first rule
//! with a matching substring wins.

use chrono::{DateTime, Utc};
use exercise_catalog_client::RemoteExerciseRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_DESCRIPTION: &str = "No description available.";
pub const DEFAULT_EQUIPMENT: &str = "Bodyweight";

/// Number of leading tips stored as common mistakes; the rest are safety tips.
const COMMON_MISTAKE_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MuscleGroup {
    Chest,
    Back,
    Legs,
    Shoulders,
    Arms,
    Core,
    FullBody,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseType {
    Compound,
    Isolation,
}

impl MuscleGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "Chest",
            MuscleGroup::Back => "Back",
            MuscleGroup::Legs => "Legs",
            MuscleGroup::Shoulders => "Shoulders",
            MuscleGroup::Arms => "Arms",
            MuscleGroup::Core => "Core",
            MuscleGroup::FullBody => "FullBody",
        }
    }
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Compound => "Compound",
            ExerciseType::Isolation => "Isolation",
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered substring rule: any pattern matching selects `value`.
pub type Rule<T> = (&'static [&'static str], T);

pub const MUSCLE_GROUP_RULES: &[Rule<MuscleGroup>] = &[
    (&["chest", "pec"], MuscleGroup::Chest),
    (&["back", "lat"], MuscleGroup::Back),
    (&["leg", "quad", "hamstring", "calf"], MuscleGroup::Legs),
    (&["shoulder", "delt"], MuscleGroup::Shoulders),
    (&["arm", "bicep", "tricep", "forearm"], MuscleGroup::Arms),
    (&["core", "ab", "oblique"], MuscleGroup::Core),
];

pub const EQUIPMENT_RULES: &[Rule<&str>] = &[
    (&["barbell"], "Barbell"),
    (&["dumbbell"], "Dumbbell"),
    (&["machine", "cable"], "Machine"),
    (&["kettlebell"], "Kettlebell"),
    (&["band"], "Band"),
    (&["bodyweight", "none"], "Bodyweight"),
];

pub const ADVANCED_NAME_MARKERS: &[&str] = &["olympic", "snatch", "clean", "pistol"];

pub const DIFFICULTY_EQUIPMENT_RULES: &[Rule<Difficulty>] = &[
    (&["barbell", "cable"], Difficulty::Intermediate),
    (&["machine", "bodyweight"], Difficulty::Beginner),
];

/// Equipment that makes an exercise compound regardless of body parts.
pub const COMPOUND_EQUIPMENT: &[&str] = &["barbell", "machine"];

/// Local representation of an exercise, as proposed to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalExerciseRecord {
    /// Store-assigned identity; `0` until inserted.
    pub id: i64,
    pub remote_id: Option<String>,
    pub name: String,
    pub description: String,
    pub muscle_group: MuscleGroup,
    pub target_muscles: String,
    pub secondary_muscles: String,
    pub difficulty: Difficulty,
    pub equipment_needed: String,
    pub exercise_type: ExerciseType,
    pub instructions: String,
    pub common_mistakes: String,
    pub safety_tips: String,
    pub variations_beginner: String,
    pub variations_advanced: String,
    pub image_path: Option<String>,
    pub video_path: Option<String>,
    pub is_custom: bool,
    pub created_at: DateTime<Utc>,
}

/// First rule whose patterns occur in `input` (already lower-cased).
pub fn classify<T: Copy>(input: &str, rules: &[Rule<T>]) -> Option<T> {
    rules
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| input.contains(p)))
        .map(|(_, value)| *value)
}

pub fn muscle_group_for(body_parts: &[String]) -> MuscleGroup {
    body_parts
        .first()
        .and_then(|part| classify(&part.to_lowercase(), MUSCLE_GROUP_RULES))
        .unwrap_or(MuscleGroup::FullBody)
}

pub fn equipment_for(equipments: &[String]) -> String {
    match equipments.first() {
        None => DEFAULT_EQUIPMENT.to_string(),
        Some(raw) => classify(&raw.to_lowercase(), EQUIPMENT_RULES)
            .map(str::to_string)
            .unwrap_or_else(|| raw.clone()),
    }
}

pub fn exercise_type_for(body_parts: &[String], equipments: &[String]) -> ExerciseType {
    let heavy_equipment = equipments.iter().any(|e| {
        let e = e.to_lowercase();
        COMPOUND_EQUIPMENT.iter().any(|marker| e.contains(marker))
    });
    if body_parts.len() > 1 || heavy_equipment {
        ExerciseType::Compound
    } else {
        ExerciseType::Isolation
    }
}

pub fn difficulty_for(name: &str, equipments: &[String]) -> Difficulty {
    let name = name.to_lowercase();
    if ADVANCED_NAME_MARKERS.iter().any(|m| name.contains(m)) {
        return Difficulty::Advanced;
    }
    equipments
        .first()
        .and_then(|e| classify(&e.to_lowercase(), DIFFICULTY_EQUIPMENT_RULES))
        .unwrap_or(Difficulty::Intermediate)
}

/// Ordered-list encoding used for every list column.
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<&str> = items.iter().map(|s| AsRef::<str>::as_ref(s)).collect();
    // Serializing a list of strings cannot fail.
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
}

/// Inverse of [`encode_list`]; malformed input decodes as empty.
pub fn decode_list(encoded: &str) -> Vec<String> {
    serde_json::from_str(encoded).unwrap_or_default()
}

/// Map a catalog record to a local record stamped with `now`. Never fails.
pub fn map_remote(remote: &RemoteExerciseRecord, now: DateTime<Utc>) -> LocalExerciseRecord {
    let description = remote
        .overview
        .as_deref()
        .filter(|o| !o.trim().is_empty())
        .unwrap_or(DEFAULT_DESCRIPTION)
        .to_string();

    let tips = remote.exercise_tips.as_deref().unwrap_or_default();
    let split = tips.len().min(COMMON_MISTAKE_COUNT);
    let (mistakes, safety) = tips.split_at(split);

    let variations = remote.variations.as_deref().unwrap_or_default();
    let beginner: Vec<&String> = variations.first().into_iter().collect();
    let advanced: Vec<&String> = variations.last().into_iter().collect();

    LocalExerciseRecord {
        id: 0,
        remote_id: Some(remote.exercise_id.clone()),
        name: remote.name.clone(),
        description,
        muscle_group: muscle_group_for(&remote.body_parts),
        target_muscles: encode_list(remote.target_muscles.as_slice()),
        secondary_muscles: encode_list(remote.secondary_muscles.as_deref().unwrap_or_default()),
        difficulty: difficulty_for(&remote.name, &remote.equipments),
        equipment_needed: equipment_for(&remote.equipments),
        exercise_type: exercise_type_for(&remote.body_parts, &remote.equipments),
        instructions: encode_list(remote.instructions.as_deref().unwrap_or_default()),
        common_mistakes: encode_list(mistakes),
        safety_tips: encode_list(safety),
        variations_beginner: encode_list(beginner.as_slice()),
        variations_advanced: encode_list(advanced.as_slice()),
        image_path: remote.image_url.clone(),
        video_path: remote.video_url.clone(),
        is_custom: false,
        created_at: now,
    }
}

pub fn map_remote_now(remote: &RemoteExerciseRecord) -> LocalExerciseRecord {
    map_remote(remote, Utc::now())
}

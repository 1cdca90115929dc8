//! Typed artifact payloads for the seven production roles.
//!
//! Structural validation is typed deserialization plus explicit range
//! checks; the uniqueness and ordering invariants each type owns live in
//! its `validate()` method. Referential checks (fields that must name
//! another role's current artifact) are the validator's job, not the
//! payload's.

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::role::Role;

/// One narrative beat on the script timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Beat {
    pub beat_id: String,
    pub start_s: f64,
    pub end_s: f64,
    pub science_claim: String,
    pub dance_metaphor: String,
    pub visual_motif: String,
    pub emotion_intention: String,
    #[serde(default)]
    pub spoken_line: Option<String>,
    #[serde(default)]
    pub status: BeatStatus,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BeatStatus {
    #[default]
    Ok,
    CriticalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptLine {
    pub line_id: String,
    pub beat_id: String,
    pub speaker: String,
    pub text: String,
}

/// Showrunner output: the beat bible plus spoken lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    pub concept_thesis: String,
    pub beats: Vec<Beat>,
    #[serde(default)]
    pub lines: Vec<ScriptLine>,
}

/// Direction output: the creative direction pack for one iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectionPack {
    pub iteration_goal: String,
    pub style_references: Vec<String>,
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DanceMappingItem {
    pub beat_id: String,
    pub motion_description: String,
    pub symbolism: String,
    pub motif_tag: String,
    pub contrast_pattern: String,
}

/// Dance-mapping output. `direction_pack_id` must name the current
/// direction artifact (declared in the role registry).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DanceMapping {
    pub direction_pack_id: String,
    pub mappings: Vec<DanceMappingItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    Wide,
    Medium,
    Close,
    ExtremeClose,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterSpec {
    pub name: String,
    pub identity_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShotDesign {
    pub shot_id: String,
    pub beat_id: String,
    pub character: String,
    pub identity_token: String,
    pub background: String,
    pub pose_action: String,
    pub camera: String,
    pub framing: Framing,
    pub lighting: String,
    pub duration_s: f64,
    pub location: String,
    #[serde(default)]
    pub continuity_reset: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShotPrompt {
    pub shot_id: String,
    pub prompt: String,
}

/// Cinematography output: character bank, shot designs, and one
/// generated prompt per selected shot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CinematographyPackage {
    pub dance_mapping_id: String,
    pub characters: Vec<CharacterSpec>,
    pub shots: Vec<ShotDesign>,
    pub shot_prompts: Vec<ShotPrompt>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceLine {
    pub line_id: String,
    pub timestamp_s: f64,
    pub speaker: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CueType {
    Music,
    Voiceover,
    Silence,
    Fx,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioCue {
    pub cue_id: String,
    pub timestamp_s: f64,
    pub duration_s: f64,
    pub cue_type: CueType,
    pub description: String,
}

/// Audio output: motifs, voice lines, cues, and sync markers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioPlan {
    pub cinematography_id: String,
    #[serde(default)]
    pub motifs: Vec<String>,
    #[serde(default)]
    pub voice_lines: Vec<VoiceLine>,
    #[serde(default)]
    pub cues: Vec<AudioCue>,
    #[serde(default)]
    pub sync_markers: Vec<f64>,
}

/// Quality metrics from the cheap dry-run renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DryRunMetrics {
    pub videoscore2: f64,
    pub vbench2_physics: f64,
    pub identity_drift: f64,
    pub blocking_issues: u32,
}

/// Quality metrics from the final render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalMetrics {
    pub videoscore2: f64,
    pub vbench2_physics: f64,
    pub identity_drift: f64,
    pub audiosync_score: f64,
    pub consistency_score: f64,
}

/// A parsed artifact payload, tagged by role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ArtifactPayload {
    Script(Script),
    Direction(DirectionPack),
    DanceMapping(DanceMapping),
    Cinematography(CinematographyPackage),
    Audio(AudioPlan),
    DryrunMetrics(DryRunMetrics),
    FinalMetrics(FinalMetrics),
}

fn structural(field: &str, constraint: impl Into<String>) -> ValidationError {
    ValidationError::Structural {
        field: field.to_string(),
        constraint: constraint.into(),
    }
}

fn require_nonnegative(field: &str, value: f64) -> Result<(), ValidationError> {
    if value < 0.0 {
        return Err(structural(field, format!("must be >= 0, got {value}")));
    }
    Ok(())
}

fn require_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value <= 0.0 {
        return Err(structural(field, format!("must be positive, got {value}")));
    }
    Ok(())
}

fn require_percentage(field: &str, value: f64) -> Result<(), ValidationError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(structural(field, format!("must be in [0, 100], got {value}")));
    }
    Ok(())
}

fn check_unique<'a, I>(field: &str, ids: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::Uniqueness {
                field: field.to_string(),
                value: id.to_string(),
            });
        }
    }
    Ok(())
}

impl ArtifactPayload {
    /// Structural parse of a raw JSON document for a role.
    pub fn parse(role: Role, raw: &serde_json::Value) -> Result<Self, ValidationError> {
        let parse_err = |e: serde_json::Error| ValidationError::from_parse(role, &e);
        let payload = match role {
            Role::Showrunner => {
                ArtifactPayload::Script(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            Role::Direction => {
                ArtifactPayload::Direction(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            Role::DanceMapping => ArtifactPayload::DanceMapping(
                serde_json::from_value(raw.clone()).map_err(parse_err)?,
            ),
            Role::Cinematography => ArtifactPayload::Cinematography(
                serde_json::from_value(raw.clone()).map_err(parse_err)?,
            ),
            Role::Audio => {
                ArtifactPayload::Audio(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            Role::DryrunMetrics => ArtifactPayload::DryrunMetrics(
                serde_json::from_value(raw.clone()).map_err(parse_err)?,
            ),
            Role::FinalMetrics => ArtifactPayload::FinalMetrics(
                serde_json::from_value(raw.clone()).map_err(parse_err)?,
            ),
        };
        Ok(payload)
    }

    pub fn role(&self) -> Role {
        match self {
            ArtifactPayload::Script(_) => Role::Showrunner,
            ArtifactPayload::Direction(_) => Role::Direction,
            ArtifactPayload::DanceMapping(_) => Role::DanceMapping,
            ArtifactPayload::Cinematography(_) => Role::Cinematography,
            ArtifactPayload::Audio(_) => Role::Audio,
            ArtifactPayload::DryrunMetrics(_) => Role::DryrunMetrics,
            ArtifactPayload::FinalMetrics(_) => Role::FinalMetrics,
        }
    }

    /// Range, uniqueness, and ordering invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ArtifactPayload::Script(script) => script.validate(),
            ArtifactPayload::Direction(pack) => pack.validate(),
            ArtifactPayload::DanceMapping(mapping) => mapping.validate(),
            ArtifactPayload::Cinematography(package) => package.validate(),
            ArtifactPayload::Audio(plan) => plan.validate(),
            ArtifactPayload::DryrunMetrics(metrics) => metrics.validate(),
            ArtifactPayload::FinalMetrics(metrics) => metrics.validate(),
        }
    }
}

impl Script {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.beats.is_empty() {
            return Err(structural("beats", "must contain at least one beat"));
        }
        for beat in &self.beats {
            require_nonnegative("start_s", beat.start_s)?;
            if beat.end_s <= beat.start_s {
                return Err(structural(
                    "end_s",
                    format!(
                        "must be greater than start_s for beat {} ({} <= {})",
                        beat.beat_id, beat.end_s, beat.start_s
                    ),
                ));
            }
        }
        check_unique("beat_id", self.beats.iter().map(|b| b.beat_id.as_str()))?;
        check_unique("line_id", self.lines.iter().map(|l| l.line_id.as_str()))?;

        // Beats form the narrative timeline: strictly ordered, no overlap.
        for pair in self.beats.windows(2) {
            if pair[1].start_s < pair[0].end_s {
                return Err(ValidationError::Ordering {
                    field: "beats".to_string(),
                    detail: format!(
                        "beat {} starts at {}s before beat {} ends at {}s",
                        pair[1].beat_id, pair[1].start_s, pair[0].beat_id, pair[0].end_s
                    ),
                });
            }
        }
        Ok(())
    }

    /// Total scripted duration in seconds.
    pub fn total_duration_s(&self) -> f64 {
        self.beats.iter().map(|b| b.end_s - b.start_s).sum()
    }
}

impl DirectionPack {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.style_references.is_empty() {
            return Err(structural(
                "style_references",
                "must contain at least one reference",
            ));
        }
        Ok(())
    }
}

impl DanceMapping {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.mappings.is_empty() {
            return Err(structural("mappings", "must contain at least one mapping"));
        }
        check_unique("beat_id", self.mappings.iter().map(|m| m.beat_id.as_str()))
    }
}

impl CinematographyPackage {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.characters.is_empty() {
            return Err(structural("characters", "must contain at least one character"));
        }
        if self.shots.is_empty() {
            return Err(structural("shots", "must contain at least one shot"));
        }
        for shot in &self.shots {
            require_positive("duration_s", shot.duration_s)?;
        }
        check_unique("shot_id", self.shots.iter().map(|s| s.shot_id.as_str()))?;

        // Every selected shot gets exactly one generated prompt.
        check_unique(
            "shot_id",
            self.shot_prompts.iter().map(|p| p.shot_id.as_str()),
        )?;
        let known: std::collections::BTreeSet<&str> =
            self.shots.iter().map(|s| s.shot_id.as_str()).collect();
        for prompt in &self.shot_prompts {
            if !known.contains(prompt.shot_id.as_str()) {
                return Err(structural(
                    "shot_prompts",
                    format!("prompt references unknown shot_id {}", prompt.shot_id),
                ));
            }
        }
        Ok(())
    }
}

impl AudioPlan {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for line in &self.voice_lines {
            require_nonnegative("timestamp_s", line.timestamp_s)?;
        }
        for cue in &self.cues {
            require_nonnegative("timestamp_s", cue.timestamp_s)?;
            require_nonnegative("duration_s", cue.duration_s)?;
        }
        check_unique("line_id", self.voice_lines.iter().map(|l| l.line_id.as_str()))?;
        check_unique("cue_id", self.cues.iter().map(|c| c.cue_id.as_str()))?;

        for pair in self.sync_markers.windows(2) {
            if pair[1] < pair[0] {
                return Err(ValidationError::Ordering {
                    field: "sync_markers".to_string(),
                    detail: format!("marker {} follows {} out of order", pair[1], pair[0]),
                });
            }
        }
        Ok(())
    }
}

impl DryRunMetrics {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_nonnegative("videoscore2", self.videoscore2)?;
        require_nonnegative("vbench2_physics", self.vbench2_physics)?;
        require_nonnegative("identity_drift", self.identity_drift)
    }
}

impl FinalMetrics {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_nonnegative("videoscore2", self.videoscore2)?;
        require_nonnegative("vbench2_physics", self.vbench2_physics)?;
        require_nonnegative("identity_drift", self.identity_drift)?;
        require_percentage("audiosync_score", self.audiosync_score)?;
        require_percentage("consistency_score", self.consistency_score)
    }
}

//! Pure scoring functions for the final scorecard.
//!
//! Every function here is deterministic over its inputs and returns a
//! score on the 0-100 scale. Nothing in this module reads run state.

use crate::artifacts::{AudioPlan, CinematographyPackage, DanceMapping, DirectionPack, FinalMetrics, Script};

pub fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// How clearly the script lands its concepts: concept coverage minus a
/// steep penalty per critical claim error.
pub fn narrative_clarity(script: &Script, concept_coverage_pct: f64, critical_errors: u32) -> f64 {
    if script.beats.is_empty() {
        return 0.0;
    }
    let mut base = concept_coverage_pct;
    if critical_errors > 0 {
        base -= (f64::from(critical_errors) * 25.0).min(80.0);
    }
    clamp_score(base)
}

/// Beat coverage of the mapping blended with alignment to the direction
/// pack's must-include and avoid lists.
pub fn mapping_alignment(
    script: &Script,
    mapping: &DanceMapping,
    direction: &DirectionPack,
) -> f64 {
    let beat_ids: std::collections::BTreeSet<&str> =
        script.beats.iter().map(|b| b.beat_id.as_str()).collect();
    let mapped_ids: std::collections::BTreeSet<&str> =
        mapping.mappings.iter().map(|m| m.beat_id.as_str()).collect();
    let covered = beat_ids.intersection(&mapped_ids).count();
    let coverage_score = (covered as f64 / beat_ids.len().max(1) as f64) * 100.0;

    let combined_text = mapping
        .mappings
        .iter()
        .map(|m| {
            format!(
                "{} {} {} {}",
                m.motion_description, m.symbolism, m.motif_tag, m.contrast_pattern
            )
            .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join(" ");

    let must_score = if direction.must_include.is_empty() {
        100.0
    } else {
        let hits = direction
            .must_include
            .iter()
            .filter(|token| combined_text.contains(&token.to_lowercase()))
            .count();
        (hits as f64 / direction.must_include.len() as f64) * 100.0
    };

    let avoid_penalty = if direction.avoid.is_empty() {
        0.0
    } else {
        let hits = direction
            .avoid
            .iter()
            .filter(|token| combined_text.contains(&token.to_lowercase()))
            .count();
        (hits as f64 / direction.avoid.len() as f64) * 100.0
    };

    let alignment_score = clamp_score(must_score - avoid_penalty);
    clamp_score(0.6 * coverage_score + 0.4 * alignment_score)
}

/// Continuity cleanliness blended with framing variety.
pub fn cinematic_quality(
    package: &CinematographyPackage,
    continuity_violations: u32,
    variety_score: f64,
) -> f64 {
    let shot_count = package.shots.len().max(1);
    let continuity_component =
        clamp_score(100.0 - (f64::from(continuity_violations) / shot_count as f64) * 100.0);
    clamp_score(0.5 * continuity_component + 0.5 * variety_score)
}

/// Physics plausibility blended with identity stability.
pub fn consistency(metrics: &FinalMetrics) -> f64 {
    let physics_component = clamp_score(metrics.vbench2_physics * 100.0);
    let identity_component = clamp_score(100.0 - metrics.identity_drift * 100.0);
    clamp_score(0.6 * physics_component + 0.4 * identity_component)
}

/// Measured audio sync blended with a rule-based check of the plan's
/// sync markers against its voice-line and cue windows.
pub fn audio_sync(plan: &AudioPlan, metrics: &FinalMetrics) -> f64 {
    if plan.cues.is_empty() && plan.voice_lines.is_empty() {
        return clamp_score(metrics.audiosync_score);
    }

    let mut event_points: Vec<f64> = plan.voice_lines.iter().map(|l| l.timestamp_s).collect();
    for cue in &plan.cues {
        event_points.push(cue.timestamp_s);
        event_points.push(cue.timestamp_s + cue.duration_s);
    }
    let min_t = event_points.iter().copied().fold(f64::INFINITY, f64::min);
    let max_t = event_points
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let markers = &plan.sync_markers;
    let is_sorted = markers.windows(2).all(|pair| pair[0] <= pair[1]);
    let order_score = if is_sorted { 100.0 } else { 40.0 };
    let marker_presence_score = if markers.is_empty() { 35.0 } else { 100.0 };
    let marker_coverage_score = if markers.is_empty() {
        35.0
    } else {
        let in_window = markers
            .iter()
            .filter(|m| (min_t..=max_t).contains(*m))
            .count();
        (in_window as f64 / markers.len() as f64) * 100.0
    };
    let duration_score = if max_t > min_t { 100.0 } else { 30.0 };

    let rule_based = 0.30 * order_score
        + 0.30 * marker_coverage_score
        + 0.20 * marker_presence_score
        + 0.20 * duration_score;
    clamp_score(0.65 * metrics.audiosync_score + 0.35 * rule_based)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{AudioCue, Beat, BeatStatus, CueType, DanceMappingItem, VoiceLine};

    fn beat(id: &str, start: f64, end: f64, claim: &str) -> Beat {
        Beat {
            beat_id: id.to_string(),
            start_s: start,
            end_s: end,
            science_claim: claim.to_string(),
            dance_metaphor: "ensemble".to_string(),
            visual_motif: "particles".to_string(),
            emotion_intention: "wonder".to_string(),
            spoken_line: None,
            status: BeatStatus::Ok,
        }
    }

    fn script() -> Script {
        Script {
            concept_thesis: "entropy".to_string(),
            beats: vec![beat("b1", 0.0, 45.0, "entropy"), beat("b2", 45.0, 95.0, "diffusion")],
            lines: vec![],
        }
    }

    fn mapping_item(beat_id: &str, motif: &str) -> DanceMappingItem {
        DanceMappingItem {
            beat_id: beat_id.to_string(),
            motion_description: "scatter".to_string(),
            symbolism: "entropy".to_string(),
            motif_tag: motif.to_string(),
            contrast_pattern: "still to burst".to_string(),
        }
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp_score(-5.0), 0.0);
        assert_eq!(clamp_score(150.0), 100.0);
        assert_eq!(clamp_score(42.0), 42.0);
    }

    #[test]
    fn test_narrative_clarity_penalizes_critical_errors() {
        let s = script();
        assert_eq!(narrative_clarity(&s, 100.0, 0), 100.0);
        assert_eq!(narrative_clarity(&s, 100.0, 1), 75.0);
        // Penalty caps at 80 points.
        assert_eq!(narrative_clarity(&s, 100.0, 10), 20.0);
    }

    #[test]
    fn test_mapping_alignment_full_coverage_no_lists() {
        let s = script();
        let m = DanceMapping {
            direction_pack_id: "d".to_string(),
            mappings: vec![mapping_item("b1", "particles"), mapping_item("b2", "ink")],
        };
        let d = DirectionPack {
            iteration_goal: "goal".to_string(),
            style_references: vec!["ref".to_string()],
            must_include: vec![],
            avoid: vec![],
            notes: String::new(),
        };
        // 0.6 * 100 coverage + 0.4 * 100 alignment
        assert!((mapping_alignment(&s, &m, &d) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_mapping_alignment_avoid_hits_penalize() {
        let s = script();
        let m = DanceMapping {
            direction_pack_id: "d".to_string(),
            mappings: vec![mapping_item("b1", "strobe"), mapping_item("b2", "ink")],
        };
        let d = DirectionPack {
            iteration_goal: "goal".to_string(),
            style_references: vec!["ref".to_string()],
            must_include: vec![],
            avoid: vec!["strobe".to_string()],
            notes: String::new(),
        };
        // alignment = 100 - 100 = 0, coverage = 100
        assert!((mapping_alignment(&s, &m, &d) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_consistency_blend() {
        let metrics = FinalMetrics {
            videoscore2: 0.7,
            vbench2_physics: 0.8,
            identity_drift: 0.1,
            audiosync_score: 80.0,
            consistency_score: 80.0,
        };
        // 0.6 * 80 + 0.4 * 90
        assert!((consistency(&metrics) - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_audio_sync_without_events_uses_measured_score() {
        let plan = AudioPlan {
            cinematography_id: "c".to_string(),
            motifs: vec![],
            voice_lines: vec![],
            cues: vec![],
            sync_markers: vec![],
        };
        let metrics = FinalMetrics {
            videoscore2: 0.7,
            vbench2_physics: 0.7,
            identity_drift: 0.1,
            audiosync_score: 77.0,
            consistency_score: 80.0,
        };
        assert_eq!(audio_sync(&plan, &metrics), 77.0);
    }

    #[test]
    fn test_audio_sync_rewards_markers_in_window() {
        let plan = AudioPlan {
            cinematography_id: "c".to_string(),
            motifs: vec![],
            voice_lines: vec![VoiceLine {
                line_id: "l1".to_string(),
                timestamp_s: 2.0,
                speaker: "narrator".to_string(),
                text: "look".to_string(),
            }],
            cues: vec![AudioCue {
                cue_id: "c1".to_string(),
                timestamp_s: 0.0,
                duration_s: 10.0,
                cue_type: CueType::Music,
                description: "bed".to_string(),
            }],
            sync_markers: vec![1.0, 5.0, 9.0],
        };
        let metrics = FinalMetrics {
            videoscore2: 0.7,
            vbench2_physics: 0.7,
            identity_drift: 0.1,
            audiosync_score: 100.0,
            consistency_score: 80.0,
        };
        // All rule components at 100, measured at 100.
        assert!((audio_sync(&plan, &metrics) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_scores_are_deterministic() {
        let s = script();
        let a = narrative_clarity(&s, 85.0, 1);
        let b = narrative_clarity(&s, 85.0, 1);
        assert_eq!(a, b);
    }
}

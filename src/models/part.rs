use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EdgeId, Grain, SourceMethod};

/// Thickness applied when none is given or the given one is implausible.
pub const DEFAULT_THICKNESS_MM: f64 = 18.0;

/// Plausible thickness band for acceptance (validation).
pub const THICKNESS_ACCEPT_RANGE_MM: (f64, f64) = (1.0, 100.0);

/// Canonical cut-panel record shared by every extractor.
///
/// Field names are a compatibility contract with the optimizer job schema
/// (`part_id`, `size.L/W`, `qty`, `material_id`, `ops.edging.edges`,
/// `ops.grooves[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub part_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub qty: u32,
    pub size: PartSize,
    pub thickness_mm: f64,
    #[serde(default)]
    pub material_id: String,
    #[serde(default)]
    pub grain: Grain,
    pub allow_rotation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops: Option<PartOps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub audit: Audit,
    /// Original input text, for review display only.
    #[serde(skip)]
    pub raw_text: Option<String>,
    /// Extractor-level notes, for review display only.
    #[serde(skip)]
    pub parse_warnings: Vec<String>,
}

/// Panel size in millimetres. `L` is the grain-reference edge, not
/// necessarily the longer one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartSize {
    #[serde(rename = "L")]
    pub l: f64,
    #[serde(rename = "W")]
    pub w: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartOps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edging: Option<Edging>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grooves: Vec<Groove>,
}

/// Edge codes are kept as strings so a malformed upstream code survives
/// until validation can flag it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Edging {
    pub edges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Groove {
    pub side: String,
    pub depth_mm: f64,
    pub width_mm: f64,
    pub offset_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub source_method: SourceMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub confidence: f32,
    #[serde(default)]
    pub human_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Part {
    /// New part with a fresh id, qty 1, default thickness and rotation allowed.
    pub fn new(l: f64, w: f64, source_method: SourceMethod) -> Self {
        let now = Utc::now();
        Self {
            part_id: Uuid::new_v4(),
            label: None,
            qty: 1,
            size: PartSize { l, w },
            thickness_mm: DEFAULT_THICKNESS_MM,
            material_id: String::new(),
            grain: Grain::None,
            allow_rotation: true,
            ops: None,
            group_id: None,
            audit: Audit {
                source_method,
                source_ref: None,
                confidence: 0.0,
                human_verified: false,
                created_at: now,
                updated_at: now,
            },
            raw_text: None,
            parse_warnings: Vec::new(),
        }
    }

    /// Both dimensions present and positive.
    pub fn is_parseable(&self) -> bool {
        self.size.l > 0.0 && self.size.w > 0.0 && self.size.l.is_finite() && self.size.w.is_finite()
    }

    /// Apply the grain/rotation forcing rule: explicit grain or explicit
    /// "no rotate" pins rotation off; otherwise `default_rotation` applies.
    pub fn set_orientation(&mut self, grain: Grain, no_rotate: bool, default_rotation: bool) {
        self.grain = grain;
        self.allow_rotation = if grain.is_explicit() || no_rotate {
            false
        } else {
            default_rotation
        };
    }

    /// Store the confidence, clamped to [0, 1]. NaN maps to 0.
    pub fn set_confidence(&mut self, confidence: f32) {
        self.audit.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
    }

    /// Replace the edge list, keeping canonical order. An empty list clears edging.
    pub fn set_edges(&mut self, edges: &[EdgeId]) {
        if edges.is_empty() {
            return;
        }
        let codes = EdgeId::ALL
            .iter()
            .filter(|e| edges.contains(e))
            .map(|e| e.as_str().to_string())
            .collect();
        self.ops.get_or_insert_with(PartOps::default).edging = Some(Edging { edges: codes });
    }

    pub fn add_groove(&mut self, groove: Groove) {
        self.ops.get_or_insert_with(PartOps::default).grooves.push(groove);
    }

    pub fn edge_codes(&self) -> &[String] {
        self.ops
            .as_ref()
            .and_then(|o| o.edging.as_ref())
            .map(|e| e.edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn grooves(&self) -> &[Groove] {
        self.ops.as_ref().map(|o| o.grooves.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_part_defaults() {
        let part = Part::new(720.0, 560.0, SourceMethod::Manual);
        assert_eq!(part.qty, 1);
        assert_eq!(part.thickness_mm, DEFAULT_THICKNESS_MM);
        assert!(part.allow_rotation);
        assert!(part.is_parseable());
        assert_eq!(part.audit.created_at, part.audit.updated_at);
    }

    #[test]
    fn ids_are_unique() {
        let a = Part::new(1.0, 1.0, SourceMethod::Manual);
        let b = Part::new(1.0, 1.0, SourceMethod::Manual);
        assert_ne!(a.part_id, b.part_id);
    }

    #[test]
    fn zero_dimension_is_not_parseable() {
        assert!(!Part::new(0.0, 560.0, SourceMethod::Manual).is_parseable());
        assert!(!Part::new(720.0, -1.0, SourceMethod::Manual).is_parseable());
        assert!(!Part::new(f64::NAN, 560.0, SourceMethod::Manual).is_parseable());
    }

    #[test]
    fn explicit_grain_forces_rotation_off() {
        let mut part = Part::new(720.0, 560.0, SourceMethod::Manual);
        part.set_orientation(Grain::AlongLength, false, true);
        assert!(!part.allow_rotation);

        part.set_orientation(Grain::None, true, true);
        assert!(!part.allow_rotation);

        part.set_orientation(Grain::None, false, true);
        assert!(part.allow_rotation);
    }

    #[test]
    fn confidence_is_clamped() {
        let mut part = Part::new(720.0, 560.0, SourceMethod::Manual);
        part.set_confidence(1.7);
        assert_eq!(part.audit.confidence, 1.0);
        part.set_confidence(-0.2);
        assert_eq!(part.audit.confidence, 0.0);
        part.set_confidence(f32::NAN);
        assert_eq!(part.audit.confidence, 0.0);
    }

    #[test]
    fn edges_are_canonical_and_deduplicated() {
        let mut part = Part::new(720.0, 560.0, SourceMethod::Manual);
        part.set_edges(&[EdgeId::W2, EdgeId::L1, EdgeId::L1]);
        assert_eq!(part.edge_codes(), ["L1", "W2"]);
    }

    #[test]
    fn serializes_contract_field_names() {
        let mut part = Part::new(720.0, 560.0, SourceMethod::PastedText);
        part.set_edges(&[EdgeId::L1]);
        part.add_groove(Groove {
            side: "L2".into(),
            depth_mm: 8.0,
            width_mm: 4.0,
            offset_mm: 10.0,
        });
        part.raw_text = Some("should not be serialized".into());
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["size"]["L"], 720.0);
        assert_eq!(json["size"]["W"], 560.0);
        assert_eq!(json["ops"]["edging"]["edges"][0], "L1");
        assert_eq!(json["ops"]["grooves"][0]["depth_mm"], 8.0);
        assert_eq!(json["audit"]["source_method"], "pasted_text");
        assert!(json.get("raw_text").is_none());
    }
}

//! Optimizer job payload. Field names here are fixed by the optimizer's
//! schema and must not be renamed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Grain, Part, PartOps, PartSize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub parts: Vec<JobPart>,
}

/// A part as the optimizer sees it: no audit trail, no review-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPart {
    pub part_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub size: PartSize,
    pub qty: u32,
    pub thickness_mm: f64,
    pub material_id: String,
    pub grain: Grain,
    pub allow_rotation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops: Option<PartOps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl From<&Part> for JobPart {
    fn from(part: &Part) -> Self {
        Self {
            part_id: part.part_id,
            label: part.label.clone(),
            size: part.size,
            qty: part.qty,
            thickness_mm: part.thickness_mm,
            material_id: part.material_id.clone(),
            grain: part.grain,
            allow_rotation: part.allow_rotation,
            ops: part.ops.clone(),
            group_id: part.group_id.clone(),
        }
    }
}

/// Build a job from accepted parts. Parts without positive dimensions are
/// left out.
pub fn build_job_payload(parts: &[Part]) -> JobPayload {
    let job_parts: Vec<JobPart> = parts
        .iter()
        .filter(|p| p.is_parseable())
        .map(JobPart::from)
        .collect();
    if job_parts.len() < parts.len() {
        tracing::warn!(
            dropped = parts.len() - job_parts.len(),
            "Unparseable parts left out of job payload"
        );
    }
    JobPayload {
        job_id: Uuid::new_v4(),
        created_at: Utc::now(),
        parts: job_parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeId, Groove, SourceMethod};

    #[test]
    fn keeps_only_parseable_parts() {
        let parts = vec![
            Part::new(720.0, 560.0, SourceMethod::PastedText),
            Part::new(0.0, 560.0, SourceMethod::PastedText),
        ];
        let job = build_job_payload(&parts);
        assert_eq!(job.parts.len(), 1);
        assert_eq!(job.parts[0].part_id, parts[0].part_id);
    }

    #[test]
    fn uses_optimizer_field_names() {
        let mut part = Part::new(720.0, 560.0, SourceMethod::Voice);
        part.qty = 2;
        part.material_id = "MDF".into();
        part.set_edges(&[EdgeId::L1, EdgeId::W2]);
        part.add_groove(Groove {
            side: "L1".into(),
            depth_mm: 8.0,
            width_mm: 4.0,
            offset_mm: 10.0,
        });
        let json = serde_json::to_value(build_job_payload(&[part])).unwrap();
        let p = &json["parts"][0];
        assert!(p["part_id"].is_string());
        assert_eq!(p["size"]["L"], 720.0);
        assert_eq!(p["size"]["W"], 560.0);
        assert_eq!(p["qty"], 2);
        assert_eq!(p["material_id"], "MDF");
        assert_eq!(p["ops"]["edging"]["edges"], serde_json::json!(["L1", "W2"]));
        let groove = &p["ops"]["grooves"][0];
        assert_eq!(groove["side"], "L1");
        assert_eq!(groove["depth_mm"], 8.0);
        assert_eq!(groove["width_mm"], 4.0);
        assert_eq!(groove["offset_mm"], 10.0);
        assert!(p.get("audit").is_none());
    }
}

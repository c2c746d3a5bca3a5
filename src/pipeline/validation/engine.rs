use serde::{Deserialize, Serialize};

use crate::models::{EdgeId, Grain, Part, DEFAULT_THICKNESS_MM, THICKNESS_ACCEPT_RANGE_MM};
use crate::pipeline::patterns::MATERIAL_KEYWORDS;

/// Damping factors applied to a field's confidence per warning. No single
/// warning zeroes a field.
pub mod thresholds {
    /// Dimension above the policy maximum.
    pub const EXCEEDS_MAX: f32 = 0.7;

    /// Part that fits no standard stock sheet in either orientation.
    pub const EXCEEDS_ALL_SHEETS: f32 = 0.85;

    /// Dimension below the policy minimum.
    pub const BELOW_MIN: f32 = 0.8;

    /// Dimension on an exact multiple of 1000 (often a unit slip).
    pub const ROUND_THOUSAND: f32 = 0.95;

    /// Quantity missing and defaulted to 1.
    pub const QUANTITY_DEFAULTED: f32 = 0.7;

    /// Quantity above the hard ceiling.
    pub const QUANTITY_ABOVE_CEILING: f32 = 0.6;

    /// Quantity above the "unusually high" mark.
    pub const QUANTITY_UNUSUAL: f32 = 0.9;

    /// Material code not in the known list.
    pub const UNKNOWN_MATERIAL: f32 = 0.85;

    /// Fixed material confidence when none was given.
    pub const EMPTY_MATERIAL: f32 = 0.5;

    pub const BAD_EDGE_CODE: f32 = 0.8;

    pub const IMPLAUSIBLE_GROOVE: f32 = 0.8;

    /// At or above this overall confidence a valid part needs no review.
    pub const REVIEW: f32 = 0.85;
}

/// Stock sheet size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetSize {
    pub l: f64,
    pub w: f64,
}

impl SheetSize {
    /// Whether an `l` x `w` part fits on this sheet in either orientation.
    pub fn fits(&self, l: f64, w: f64) -> bool {
        (l <= self.l && w <= self.w) || (l <= self.w && w <= self.l)
    }
}

/// Validation limits and normalization switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Swap length and width when `L < W`. Off by default: `L` carries grain.
    pub auto_swap: bool,
    /// Filled into parts with no material.
    pub default_material_id: Option<String>,
    /// Recognized material codes. Empty disables the check.
    pub known_materials: Vec<String>,
    pub max_dimension_mm: f64,
    pub min_dimension_mm: f64,
    pub standard_sheets: Vec<SheetSize>,
    pub quantity_ceiling: u32,
    pub quantity_unusual: u32,
    pub groove_width_range_mm: (f64, f64),
    pub review_threshold: f32,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        let mut known_materials: Vec<String> = Vec::new();
        for (_, id) in MATERIAL_KEYWORDS {
            if !known_materials.iter().any(|k| k == id) {
                known_materials.push((*id).to_string());
            }
        }
        Self {
            auto_swap: false,
            default_material_id: None,
            known_materials,
            max_dimension_mm: 3000.0,
            min_dimension_mm: 10.0,
            standard_sheets: vec![
                SheetSize { l: 2440.0, w: 1220.0 },
                SheetSize { l: 2800.0, w: 2070.0 },
                SheetSize { l: 3050.0, w: 1530.0 },
                SheetSize { l: 3660.0, w: 1830.0 },
            ],
            quantity_ceiling: 1000,
            quantity_unusual: 100,
            groove_width_range_mm: (1.0, 20.0),
            review_threshold: thresholds::REVIEW,
        }
    }
}

/// Per-field confidence after validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub length: f32,
    pub width: f32,
    pub quantity: f32,
    pub material: f32,
    pub thickness: f32,
    pub operations: f32,
    /// What the extractor reported (1.0 once a human verified the part).
    pub extraction: f32,
}

impl Default for FieldConfidence {
    fn default() -> Self {
        Self {
            length: 1.0,
            width: 1.0,
            quantity: 1.0,
            material: 1.0,
            thickness: 1.0,
            operations: 1.0,
            extraction: 1.0,
        }
    }
}

impl FieldConfidence {
    fn values(&self) -> [f32; 7] {
        [
            self.length,
            self.width,
            self.quantity,
            self.material,
            self.thickness,
            self.operations,
            self.extraction,
        ]
    }

    /// Weakest field caps the part.
    pub fn overall(&self) -> f32 {
        self.values().into_iter().fold(1.0, f32::min)
    }

    pub fn mean(&self) -> f32 {
        let values = self.values();
        values.iter().sum::<f32>() / values.len() as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub field_confidence: FieldConfidence,
    pub normalized_part: Part,
}

impl ValidationReport {
    pub fn confidence(&self) -> f32 {
        self.normalized_part.audit.confidence
    }

    pub fn needs_review(&self, threshold: f32) -> bool {
        !self.is_valid || self.confidence() < threshold
    }
}

fn damp(confidence: &mut f32, factor: f32) {
    *confidence = (*confidence * factor).clamp(0.0, 1.0);
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Validate and normalize one part.
///
/// Total over any input: malformed values are normalized or flagged, never
/// rejected with a panic. Running it again on `normalized_part` yields the
/// same part and confidence.
pub fn validate(part: &Part, policy: &ValidationPolicy) -> ValidationReport {
    let mut normalized = part.clone();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut confidence = FieldConfidence {
        extraction: if part.audit.human_verified {
            1.0
        } else {
            clamp_unit(part.audit.confidence)
        },
        ..FieldConfidence::default()
    };

    check_dimensions(&mut normalized, policy, &mut confidence, &mut errors, &mut warnings);
    check_quantity(&mut normalized, policy, &mut confidence, &mut warnings);
    check_material(&mut normalized, policy, &mut confidence, &mut warnings);
    normalize_thickness(&mut normalized);
    check_operations(&mut normalized, policy, &mut confidence, &mut warnings);

    normalized.audit.confidence = confidence.overall();

    if !errors.is_empty() || !warnings.is_empty() {
        tracing::debug!(
            part_id = %part.part_id,
            errors = errors.len(),
            warnings = warnings.len(),
            confidence = normalized.audit.confidence,
            "Part validation findings"
        );
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        field_confidence: confidence,
        normalized_part: normalized,
    }
}

// ──────────────────────────────────────────────
// Dimensions
// ──────────────────────────────────────────────

fn check_dimensions(
    part: &mut Part,
    policy: &ValidationPolicy,
    confidence: &mut FieldConfidence,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(part.size.l) || !valid(part.size.w) {
        if !valid(part.size.l) {
            errors.push("Length is missing or not positive".to_string());
        }
        if !valid(part.size.w) {
            errors.push("Width is missing or not positive".to_string());
        }
        confidence.length = 0.0;
        confidence.width = 0.0;
        return;
    }

    if policy.auto_swap && part.size.l < part.size.w {
        swap_axes(part);
    }

    for (name, value, field) in [
        ("Length", part.size.l, &mut confidence.length),
        ("Width", part.size.w, &mut confidence.width),
    ] {
        if value > policy.max_dimension_mm {
            warnings.push(format!(
                "{name} {value}mm exceeds typical max {}mm",
                policy.max_dimension_mm
            ));
            damp(field, thresholds::EXCEEDS_MAX);
        }
        if value < policy.min_dimension_mm {
            warnings.push(format!(
                "{name} {value}mm is below typical min {}mm",
                policy.min_dimension_mm
            ));
            damp(field, thresholds::BELOW_MIN);
        }
        if value >= 1000.0 && value % 1000.0 == 0.0 {
            warnings.push(format!("{name} {value}mm is a round multiple of 1000, check units"));
            damp(field, thresholds::ROUND_THOUSAND);
        }
    }

    let (l, w) = (part.size.l, part.size.w);
    if !policy.standard_sheets.is_empty() && !policy.standard_sheets.iter().any(|s| s.fits(l, w)) {
        warnings.push(format!("Part {l}x{w}mm fits no standard sheet"));
        let field = if l >= w {
            &mut confidence.length
        } else {
            &mut confidence.width
        };
        damp(field, thresholds::EXCEEDS_ALL_SHEETS);
    }
}

/// Exchange the axes along with everything referenced to them.
fn swap_axes(part: &mut Part) {
    std::mem::swap(&mut part.size.l, &mut part.size.w);
    part.grain = match part.grain {
        Grain::AlongLength => Grain::AlongWidth,
        Grain::AlongWidth => Grain::AlongLength,
        Grain::None => Grain::None,
    };
    let flip = |code: &str| match code {
        "L1" => "W1".to_string(),
        "L2" => "W2".to_string(),
        "W1" => "L1".to_string(),
        "W2" => "L2".to_string(),
        other => other.to_string(),
    };
    if let Some(ops) = part.ops.as_mut() {
        if let Some(edging) = ops.edging.as_mut() {
            edging.edges = edging.edges.iter().map(|c| flip(c)).collect();
        }
        for groove in &mut ops.grooves {
            groove.side = flip(&groove.side);
        }
    }
    tracing::debug!(part_id = %part.part_id, "Swapped length and width");
}

// ──────────────────────────────────────────────
// Quantity, material, thickness
// ──────────────────────────────────────────────

fn check_quantity(
    part: &mut Part,
    policy: &ValidationPolicy,
    confidence: &mut FieldConfidence,
    warnings: &mut Vec<String>,
) {
    if part.qty == 0 {
        warnings.push("Quantity missing, defaulted to 1".to_string());
        part.qty = 1;
        damp(&mut confidence.quantity, thresholds::QUANTITY_DEFAULTED);
    } else if part.qty > policy.quantity_ceiling {
        warnings.push(format!(
            "Quantity {} exceeds maximum {}",
            part.qty, policy.quantity_ceiling
        ));
        damp(&mut confidence.quantity, thresholds::QUANTITY_ABOVE_CEILING);
    } else if part.qty > policy.quantity_unusual {
        warnings.push(format!("Quantity {} is unusually high", part.qty));
        damp(&mut confidence.quantity, thresholds::QUANTITY_UNUSUAL);
    }
}

fn check_material(
    part: &mut Part,
    policy: &ValidationPolicy,
    confidence: &mut FieldConfidence,
    warnings: &mut Vec<String>,
) {
    let material = part.material_id.trim();
    if material.is_empty() {
        confidence.material = thresholds::EMPTY_MATERIAL;
        part.material_id = policy.default_material_id.clone().unwrap_or_default();
        return;
    }

    if material.len() != part.material_id.len() {
        part.material_id = material.to_string();
    }
    let known = policy.known_materials.is_empty()
        || policy
            .known_materials
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&part.material_id));
    if !known {
        warnings.push(format!("Unknown material code '{}'", part.material_id));
        damp(&mut confidence.material, thresholds::UNKNOWN_MATERIAL);
    }
}

/// Out-of-band thickness falls back to the default without a finding.
fn normalize_thickness(part: &mut Part) {
    let (min, max) = THICKNESS_ACCEPT_RANGE_MM;
    if !(min..=max).contains(&part.thickness_mm) {
        part.thickness_mm = DEFAULT_THICKNESS_MM;
    }
}

// ──────────────────────────────────────────────
// Edging and grooves
// ──────────────────────────────────────────────

fn check_operations(
    part: &mut Part,
    policy: &ValidationPolicy,
    confidence: &mut FieldConfidence,
    warnings: &mut Vec<String>,
) {
    let thickness = part.thickness_mm;
    let Some(ops) = part.ops.as_mut() else {
        return;
    };

    if let Some(edging) = ops.edging.as_mut() {
        edging.edges = canonical_edge_codes(&edging.edges);
        for code in &edging.edges {
            if code.parse::<EdgeId>().is_err() {
                warnings.push(format!("Unknown edge code '{code}'"));
                damp(&mut confidence.operations, thresholds::BAD_EDGE_CODE);
            }
        }
    }

    let (min_width, max_width) = policy.groove_width_range_mm;
    for groove in &ops.grooves {
        if groove.side.parse::<EdgeId>().is_err() {
            warnings.push(format!("Groove on unknown edge '{}'", groove.side));
            damp(&mut confidence.operations, thresholds::BAD_EDGE_CODE);
        }
        if !(min_width..=max_width).contains(&groove.width_mm) {
            warnings.push(format!(
                "Groove on {} width {}mm outside {min_width}-{max_width}mm",
                groove.side, groove.width_mm
            ));
            damp(&mut confidence.operations, thresholds::IMPLAUSIBLE_GROOVE);
        }
        if !(groove.depth_mm > 0.0 && groove.depth_mm <= thickness) {
            warnings.push(format!(
                "Groove on {} depth {}mm not within part thickness {thickness}mm",
                groove.side, groove.depth_mm
            ));
            damp(&mut confidence.operations, thresholds::IMPLAUSIBLE_GROOVE);
        }
    }
}

/// Trimmed, upper-cased, de-duplicated; known codes in canonical order
/// first, unknown ones after in their original order.
fn canonical_edge_codes(codes: &[String]) -> Vec<String> {
    let cleaned: Vec<String> = codes.iter().map(|c| c.trim().to_uppercase()).collect();
    let mut out: Vec<String> = EdgeId::ALL
        .iter()
        .map(|e| e.as_str())
        .filter(|e| cleaned.iter().any(|c| c == e))
        .map(str::to_string)
        .collect();
    for code in cleaned {
        if code.parse::<EdgeId>().is_err() && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

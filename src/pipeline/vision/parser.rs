use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{EdgeId, Edging, Part, SourceMethod, DEFAULT_THICKNESS_MM, THICKNESS_ACCEPT_RANGE_MM};
use crate::pipeline::patterns::{MATERIAL_KEYWORDS, MAX_LABEL_LEN};
use crate::pipeline::primitives::{find_material_match, parse_dimension_value, parse_edges, tidy, truncate_label};
use crate::pipeline::remote::ExtractionClient;
use crate::pipeline::tabular::{coerce_number, parse_grain_value, parse_yes_no};
use crate::pipeline::text::{parse_text, TextParseOptions};
use crate::pipeline::types::ParseOutcome;

/// Options for the extraction-service adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionOptions {
    /// Confidence stamped on every mapped item. The service's own scores
    /// are not calibrated, so a fixed moderate value is used instead.
    pub confidence: f32,
    pub source_method: SourceMethod,
    pub default_thickness_mm: f64,
    pub default_material_id: Option<String>,
    pub allow_rotation_default: bool,
}

impl Default for VisionOptions {
    fn default() -> Self {
        Self {
            confidence: 0.75,
            source_method: SourceMethod::GenericOcr,
            default_thickness_mm: DEFAULT_THICKNESS_MM,
            default_material_id: None,
            allow_rotation_default: true,
        }
    }
}

/// Result of pulling JSON out of a noisy model response.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtraction {
    Parsed(Vec<Value>),
    Failed(String),
}

/// Find the JSON payload in a response that may be fenced (```json ... ```)
/// or wrapped in commentary. Accepts an array, a single object, or an
/// object carrying a `parts`/`items` array.
///
/// Every `[` or `{` is tried as a start in order; the first value that
/// holds items wins, so bracketed commentary ahead of the payload is
/// skipped. The first parse error is reported when nothing matches.
pub fn extract_json_items(response: &str) -> JsonExtraction {
    let body = strip_code_fence(response);

    let mut first_error: Option<String> = None;
    for (start, _) in body.match_indices(|c: char| c == '[' || c == '{') {
        let mut stream = serde_json::Deserializer::from_str(&body[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                if let Some(items) = into_items(value) {
                    return JsonExtraction::Parsed(items);
                }
            }
            Some(Err(e)) => {
                first_error.get_or_insert_with(|| format!("Invalid JSON: {e}"));
            }
            None => {}
        }
    }
    JsonExtraction::Failed(first_error.unwrap_or_else(|| "No JSON found in response".into()))
}

fn strip_code_fence(response: &str) -> &str {
    let Some(open) = response.find("```") else {
        return response;
    };
    let after_open = &response[open + 3..];
    // Skip the language tag line ("json", "JSON", ...).
    let content_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_open[content_start..];
    match content.find("```") {
        Some(close) => &content[..close],
        None => content,
    }
}

/// Arrays count only when empty or holding at least one object; `[1]` in
/// prose is a citation, not a part list.
fn into_items(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if items.is_empty() || items.iter().any(Value::is_object) => Some(items),
        Value::Object(mut map) => {
            for key in ["parts", "items"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Some(items);
                }
            }
            Some(vec![Value::Object(map)])
        }
        _ => None,
    }
}

/// First present, non-null value among `keys`.
fn lookup<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find(|v| !v.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Millimetres from a number or a string such as "720", "72cm" or "720 mm".
fn as_dimension(value: &Value) -> Option<f64> {
    let mm = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_dimension_value(s).or_else(|| coerce_number(s)),
        _ => None,
    };
    mm.filter(|v| v.is_finite())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => coerce_number(s),
        _ => None,
    }
}

/// Map one extracted item to a part. Items without positive length and
/// width are discarded.
fn map_item(value: &Value, options: &VisionOptions) -> Result<Part, String> {
    let item = value
        .as_object()
        .ok_or_else(|| "Item is not an object".to_string())?;

    let l = lookup(item, &["L", "l", "length", "Length", "length_mm"]).and_then(as_dimension);
    let w = lookup(item, &["W", "w", "width", "Width", "width_mm"]).and_then(as_dimension);
    let (l, w) = match (l, w) {
        (Some(l), Some(w)) if l > 0.0 && w > 0.0 => (l, w),
        _ => return Err("Item has no positive length and width".into()),
    };

    let mut part = Part::new(l, w, options.source_method);

    part.qty = lookup(item, &["qty", "quantity", "count", "Qty"])
        .and_then(as_number)
        .map(|q| q.round().clamp(1.0, f64::from(u32::MAX)) as u32)
        .unwrap_or(1);

    let (t_min, t_max) = THICKNESS_ACCEPT_RANGE_MM;
    part.thickness_mm = lookup(item, &["thickness", "thickness_mm", "t"])
        .and_then(as_number)
        .filter(|t| (t_min..=t_max).contains(t))
        .unwrap_or(options.default_thickness_mm);

    part.material_id = lookup(item, &["material", "material_id", "Material"])
        .and_then(as_text)
        .map(|m| {
            find_material_match(&m, MATERIAL_KEYWORDS)
                .map(|hit| hit.material_id.to_string())
                .unwrap_or(m)
        })
        .or_else(|| options.default_material_id.clone())
        .unwrap_or_default();

    part.label = lookup(item, &["label", "name", "description", "Label"])
        .and_then(as_text)
        .map(|s| truncate_label(&tidy(&s), MAX_LABEL_LEN));
    part.group_id = lookup(item, &["group", "group_id", "cabinet"]).and_then(as_text);

    let grain = lookup(item, &["grain", "Grain"])
        .and_then(as_text)
        .map(|g| parse_grain_value(&g))
        .unwrap_or_default();
    let rotation = match lookup(item, &["allow_rotation", "rotate"]) {
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => as_text(other).and_then(|s| parse_yes_no(&s)),
        None => None,
    };
    part.set_orientation(
        grain,
        rotation == Some(false),
        rotation.unwrap_or(options.allow_rotation_default),
    );

    if let Some(edges) = lookup(item, &["edges", "edging", "edge_banding"]) {
        apply_edges(&mut part, edges);
    }

    part.raw_text = Some(value.to_string());
    part.set_confidence(options.confidence);
    Ok(part)
}

/// Edge field as a list of codes or a phrase. Codes outside the four known
/// edges are kept verbatim so validation can flag them.
fn apply_edges(part: &mut Part, value: &Value) {
    match value {
        Value::Array(codes) => {
            let codes: Vec<String> = codes
                .iter()
                .filter_map(as_text)
                .map(|c| c.to_uppercase())
                .collect();
            let known: Vec<EdgeId> = codes.iter().filter_map(|c| c.parse().ok()).collect();
            if known.len() == codes.len() {
                part.set_edges(&known);
            } else if !codes.is_empty() {
                part.ops.get_or_insert_with(Default::default).edging = Some(Edging { edges: codes });
            }
        }
        Value::String(phrase) => {
            let lower = phrase.to_lowercase();
            if lower.trim() == "all" {
                part.set_edges(&EdgeId::ALL);
            } else {
                part.set_edges(&parse_edges(&lower.replace([',', ';', '/'], " ")));
            }
        }
        Value::Bool(true) => part.set_edges(&EdgeId::ALL),
        _ => {}
    }
}

/// Map an extraction-service response. JSON failures degrade to an empty
/// outcome carrying the error message.
pub fn parse_vision_response(response: &str, options: &VisionOptions) -> ParseOutcome {
    let items = match extract_json_items(response) {
        JsonExtraction::Parsed(items) => items,
        JsonExtraction::Failed(message) => {
            tracing::warn!(reason = %message, response_len = response.len(), "Extraction response not parseable");
            return ParseOutcome::rejected(message);
        }
    };

    let mut outcome = ParseOutcome::default();
    for (idx, item) in items.iter().enumerate() {
        match map_item(item, options) {
            Ok(mut part) => {
                part.audit.source_ref = Some(format!("item:{}", idx + 1));
                outcome.push_part(part);
            }
            Err(message) => outcome.push_failure(idx + 1, &item.to_string(), message),
        }
    }
    tracing::info!(
        items = items.len(),
        parsed = outcome.stats.parsed_lines,
        discarded = outcome.stats.failed_lines,
        "Extraction response mapped"
    );
    outcome
}

/// Call the extraction service and map its response. Never fails: service
/// errors become a rejected outcome for the caller to retry.
pub fn extract_from_image(
    client: &dyn ExtractionClient,
    image: &[u8],
    mime_type: &str,
    options: &VisionOptions,
) -> ParseOutcome {
    match client.extract_parts(image, mime_type) {
        Ok(response) => parse_vision_response(&response, options),
        Err(e) => {
            tracing::warn!(error = %e, "Extraction service call failed");
            ParseOutcome::rejected(format!("Extraction service failed: {e}"))
        }
    }
}

/// OCR text from a scanned sheet goes through the line parser, stamped with
/// the adapter's provenance.
pub fn parse_ocr_text(text: &str, options: &VisionOptions, text_options: &TextParseOptions) -> ParseOutcome {
    let text_options = TextParseOptions {
        source_method: options.source_method,
        ..text_options.clone()
    };
    parse_text(text, &text_options)
}

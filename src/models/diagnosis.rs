//! AI diagnosis results: status, lesion boxes, severity and confidence.
//!
//! DESIGN
//! ======
//! Endpoints disagree on shape: upload/list responses use camelCase
//! (`imageUrl`, `uploadedAt`), detail responses snake_case; confidence is a
//! 0–1 fraction on some and a 0–100 percentage on others. Everything is
//! normalized here. [`Confidence`] always holds a fraction and only
//! [`Confidence::percent`] produces the percentage for display.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::{DiagnosisId, PatientId, UserId, blank_to_none, first_text};

// =============================================================================
// STATUS
// =============================================================================

/// Analysis job state. Moves forward only: pending → processing → completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisStatus {
    Pending,
    Processing,
    Completed,
    /// The backend gave up on the analysis.
    Failed,
}

impl DiagnosisStatus {
    /// No further change is expected once terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the forward-only progression.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DiagnosisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiagnosisStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "uploaded" => Ok(Self::Pending),
            "processing" | "in_progress" | "running" | "analyzing" => Ok(Self::Processing),
            "completed" | "complete" | "done" | "analyzed" => Ok(Self::Completed),
            "failed" | "error" => Ok(Self::Failed),
            other => Err(format!("unknown diagnosis status {other:?}")),
        }
    }
}

impl<'de> Deserialize<'de> for DiagnosisStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// CONFIDENCE
// =============================================================================

/// Model confidence as a fraction in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    /// Accept either unit from the wire. Values up to 1 are fractions,
    /// values in `(1, 100]` are percentages.
    ///
    /// # Errors
    ///
    /// Returns an error for NaN, negative values, or values above 100.
    pub fn from_wire(value: f64) -> Result<Self, String> {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("confidence {value} out of range"));
        }
        if value <= 1.0 {
            Ok(Self(value))
        } else if value <= 100.0 {
            Ok(Self(value / 100.0))
        } else {
            Err(format!("confidence {value} exceeds 100%"))
        }
    }

    /// # Errors
    ///
    /// Returns an error when `value` is outside `[0, 1]`.
    pub fn from_fraction(value: f64) -> Result<Self, String> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("confidence fraction {value} outside [0, 1]"))
        }
    }

    #[must_use]
    pub fn fraction(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn percent(self) -> f64 {
        self.0 * 100.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.percent())
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::from_wire(f64::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// SEVERITY
// =============================================================================

/// Caries severity grade.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    None,
    Initial,
    Moderate,
    Advanced,
    /// A grade this client does not know, kept verbatim.
    Other(String),
}

impl Severity {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "healthy" | "sound" | "no caries" => Self::None,
            "initial" | "mild" | "low" | "early" => Self::Initial,
            "moderate" | "medium" => Self::Moderate,
            "advanced" | "severe" | "high" => Self::Advanced,
            _ => Self::Other(raw.trim().to_owned()),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Initial => "Initial",
            Self::Moderate => "Moderate",
            Self::Advanced => "Advanced",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// =============================================================================
// LESION BOX
// =============================================================================

/// One detected lesion in natural image pixels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LesionBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: Option<Confidence>,
    pub label: Option<String>,
}

impl LesionBox {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height, confidence: None, label: None }
    }

    /// Badge text such as `Caries (94%)`.
    #[must_use]
    pub fn caption(&self) -> String {
        let label = self.label.as_deref().unwrap_or("Caries");
        match self.confidence {
            Some(c) => format!("{label} ({c})"),
            None => label.to_owned(),
        }
    }

    fn from_value(value: &Value) -> Result<Self, String> {
        let lesion = match value {
            Value::Array(items) => {
                let nums: Vec<f64> = items
                    .iter()
                    .map(|v| v.as_f64().ok_or_else(|| format!("lesion box entry {v} is not a number")))
                    .collect::<Result<_, _>>()?;
                if !(4..=5).contains(&nums.len()) {
                    return Err(format!("lesion box array needs 4 or 5 numbers, got {}", nums.len()));
                }
                Self {
                    x: nums[0],
                    y: nums[1],
                    width: nums[2],
                    height: nums[3],
                    confidence: nums.get(4).copied().map(Confidence::from_wire).transpose()?,
                    label: None,
                }
            }
            Value::Object(map) => {
                let num = |keys: &[&str]| -> Result<Option<f64>, String> {
                    for key in keys {
                        if let Some(v) = map.get(*key).filter(|v| !v.is_null()) {
                            return v.as_f64().map(Some).ok_or_else(|| format!("lesion box {key} is not a number"));
                        }
                    }
                    Ok(None)
                };
                let required = |keys: &[&str]| num(keys)?.ok_or_else(|| format!("lesion box missing {}", keys[0]));
                Self {
                    x: required(&["x"])?,
                    y: required(&["y"])?,
                    width: required(&["width", "w"])?,
                    height: required(&["height", "h"])?,
                    confidence: num(&["confidence", "score"])?.map(Confidence::from_wire).transpose()?,
                    label: ["label", "class", "name"]
                        .iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_str))
                        .map(str::to_owned),
                }
            }
            other => return Err(format!("lesion box must be an object or array, got {other}")),
        };

        if ![lesion.x, lesion.y, lesion.width, lesion.height].iter().all(|v| v.is_finite()) {
            return Err("lesion box coordinates must be finite".to_owned());
        }
        if lesion.width < 0.0 || lesion.height < 0.0 {
            return Err("lesion box size must not be negative".to_owned());
        }
        Ok(lesion)
    }
}

/// `lesion_boxes` arrives as an array, null, or a JSON-encoded string.
fn parse_lesions(value: Option<Value>) -> Result<Vec<LesionBox>, String> {
    let value = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(raw)) => {
            serde_json::from_str::<Value>(&raw).map_err(|e| format!("lesion_boxes string is not JSON: {e}"))?
        }
        Some(other) => other,
    };
    match value {
        Value::Array(items) => items.iter().map(LesionBox::from_value).collect(),
        Value::Object(ref map) if map.contains_key("boxes") => parse_lesions(map.get("boxes").cloned()),
        other => Err(format!("lesion_boxes must be an array, got {other}")),
    }
}

// =============================================================================
// DIAGNOSIS
// =============================================================================

/// Result of one uploaded radiograph analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DiagnosisWire")]
pub struct Diagnosis {
    pub id: DiagnosisId,
    pub patient: Option<PatientId>,
    pub patient_name: Option<String>,
    pub user: Option<UserId>,
    pub image_url: String,
    pub uploaded_at: Option<String>,
    pub status: DiagnosisStatus,
    pub has_caries: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub confidence: Option<Confidence>,
    #[serde(rename = "lesion_boxes")]
    lesions: Vec<LesionBox>,
    pub explanation_url: Option<String>,
    /// Natural image size when the backend reports it.
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
}

impl Diagnosis {
    /// Lesion boxes, empty until the analysis has completed.
    #[must_use]
    pub fn visible_lesions(&self) -> &[LesionBox] {
        if self.status == DiagnosisStatus::Completed { &self.lesions } else { &[] }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Upload, list and detail endpoints name the same field differently and
/// some send several names at once, so every spelling gets its own slot.
#[derive(Deserialize)]
struct DiagnosisWire {
    id: DiagnosisId,
    #[serde(default)]
    patient: Option<PatientId>,
    #[serde(default)]
    patient_id: Option<PatientId>,
    #[serde(default, rename = "patientId")]
    patient_id_camel: Option<PatientId>,
    #[serde(default)]
    patient_name: Option<String>,
    #[serde(default, rename = "patientName")]
    patient_name_camel: Option<String>,
    #[serde(default)]
    user: Option<UserId>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, rename = "imageUrl")]
    image_url_camel: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    uploaded_at: Option<String>,
    #[serde(default, rename = "uploadedAt")]
    uploaded_at_camel: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    has_caries: Option<bool>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    confidence_score: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    lesion_boxes: Option<Value>,
    #[serde(default)]
    lesions: Option<Value>,
    #[serde(default)]
    detections: Option<Value>,
    #[serde(default)]
    explanation_image: Option<String>,
    #[serde(default)]
    explanation_url: Option<String>,
    #[serde(default, rename = "explanationUrl")]
    explanation_url_camel: Option<String>,
    #[serde(default)]
    explainability_url: Option<String>,
    #[serde(default)]
    heatmap_url: Option<String>,
    #[serde(default)]
    image_width: Option<u32>,
    #[serde(default)]
    image_height: Option<u32>,
}

impl TryFrom<DiagnosisWire> for Diagnosis {
    type Error = String;

    fn try_from(wire: DiagnosisWire) -> Result<Self, Self::Error> {
        // Older list payloads omit status; a graded result is a finished one.
        let status = match blank_to_none(wire.status) {
            Some(raw) => raw.parse()?,
            None if wire.has_caries.is_some() => DiagnosisStatus::Completed,
            None => DiagnosisStatus::Pending,
        };
        let lesions = wire.lesion_boxes.or(wire.lesions).or(wire.detections);
        Ok(Self {
            id: wire.id,
            patient: wire.patient.or(wire.patient_id).or(wire.patient_id_camel),
            patient_name: first_text([wire.patient_name, wire.patient_name_camel]),
            user: wire.user,
            image_url: first_text([wire.image_url, wire.image_url_camel, wire.image]).unwrap_or_default(),
            uploaded_at: first_text([wire.uploaded_at, wire.uploaded_at_camel, wire.created_at]),
            status,
            has_caries: wire.has_caries,
            severity: blank_to_none(wire.severity).map(|s| Severity::parse(&s)),
            confidence: wire.confidence_score.or(wire.confidence).map(Confidence::from_wire).transpose()?,
            lesions: parse_lesions(lesions)?,
            explanation_url: first_text([
                wire.explanation_image,
                wire.explanation_url,
                wire.explanation_url_camel,
                wire.explainability_url,
                wire.heatmap_url,
            ]),
            image_width: wire.image_width.filter(|w| *w > 0),
            image_height: wire.image_height.filter(|h| *h > 0),
        })
    }
}

// =============================================================================
// EXPLANATION
// =============================================================================

/// Explainability overlay for a diagnosis (`GET /ai/explain/{id}/`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExplanationWire")]
pub struct Explanation {
    pub diagnosis: Option<DiagnosisId>,
    pub image_url: String,
    pub method: Option<String>,
    pub summary: Option<String>,
}

#[derive(Deserialize)]
struct ExplanationWire {
    #[serde(default)]
    diagnosis: Option<DiagnosisId>,
    #[serde(default)]
    diagnosis_id: Option<DiagnosisId>,
    #[serde(default)]
    id: Option<DiagnosisId>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    explanation_url: Option<String>,
    #[serde(default)]
    explanation_image: Option<String>,
    #[serde(default)]
    heatmap_url: Option<String>,
    #[serde(default)]
    overlay_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl TryFrom<ExplanationWire> for Explanation {
    type Error = String;

    fn try_from(wire: ExplanationWire) -> Result<Self, Self::Error> {
        let image_url = first_text([
            wire.image_url,
            wire.explanation_url,
            wire.explanation_image,
            wire.heatmap_url,
            wire.overlay_url,
            wire.url,
        ]);
        Ok(Self {
            diagnosis: wire.diagnosis.or(wire.diagnosis_id).or(wire.id),
            image_url: image_url.ok_or("explanation has no image url")?,
            method: blank_to_none(wire.method),
            summary: first_text([wire.summary, wire.explanation, wire.notes]),
        })
    }
}

#[cfg(test)]
#[path = "diagnosis_test.rs"]
mod tests;

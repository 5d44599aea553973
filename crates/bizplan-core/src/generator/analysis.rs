//! Parsing of the structured plan analysis.
//!
//! Expected shape (optionally wrapped in a Markdown code fence):
//!
//! ```json
//! {"overall_score": 85,
//!  "sections_analysis": [{"section_name": "...", "score": 90, "suggestions": ["..."]}]}
//! ```

use serde::Deserialize;
use serde_json::Value;

/// Name recorded for a section the analysis did not name.
pub const UNKNOWN_SECTION: &str = "Unknown section";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionAnalysis {
    pub section_name: String,
    pub score: Option<i32>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanAnalysis {
    pub overall_score: Option<i32>,
    pub sections: Vec<SectionAnalysis>,
}

/// Result of the analysis step. A failed analysis is stored as an error
/// marker with no sections; it does not fail the generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Parsed(PlanAnalysis),
    Failed { error: String },
}

impl AnalysisOutcome {
    pub fn overall_score(&self) -> Option<i32> {
        match self {
            Self::Parsed(analysis) => analysis.overall_score,
            Self::Failed { .. } => None,
        }
    }

    pub fn sections(&self) -> &[SectionAnalysis] {
        match self {
            Self::Parsed(analysis) => &analysis.sections,
            Self::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Parsed(_) => None,
            Self::Failed { error } => Some(error),
        }
    }
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    overall_score: Option<Value>,
    #[serde(default)]
    sections_analysis: Vec<RawSection>,
}

#[derive(Deserialize)]
struct RawSection {
    #[serde(default)]
    section_name: Option<String>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    suggestions: Option<Value>,
}

/// Parse raw collaborator output into an [`AnalysisOutcome`].
pub fn parse_analysis(raw: &str) -> AnalysisOutcome {
    let body = strip_code_fence(raw);
    let parsed: RawAnalysis = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return AnalysisOutcome::Failed {
                error: format!("analysis is not valid JSON: {e}"),
            };
        }
    };

    let sections = parsed
        .sections_analysis
        .into_iter()
        .map(|s| SectionAnalysis {
            section_name: s
                .section_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SECTION.to_string()),
            score: s.score.as_ref().and_then(score_value),
            suggestions: suggestion_list(s.suggestions),
        })
        .collect();

    AnalysisOutcome::Parsed(PlanAnalysis {
        overall_score: parsed.overall_score.as_ref().and_then(score_value),
        sections,
    })
}

/// Accept integer, float, or numeric-string scores, clamped to 0..=100.
fn score_value(value: &Value) -> Option<i32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as i32)
}

/// Keep the string entries of a suggestions array; anything else is dropped.
fn suggestion_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

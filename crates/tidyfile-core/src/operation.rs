//! Operation intents.
//!
//! Planners hand over loosely typed JSON. It is parsed into
//! [`OperationIntent`] and converted into an [`Operation`] through
//! `TryFrom`, which is the only place validation happens. Unknown type
//! tags fail at deserialization.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlanError;

/// The kind of mutation an operation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Move,
    Rename,
    CreateFolder,
    Delete,
}

impl OperationKind {
    /// Stable lower-case name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Rename => "rename",
            Self::CreateFolder => "create_folder",
            Self::Delete => "delete",
        }
    }

    /// Check whether this kind reads an existing source path.
    pub fn needs_source(&self) -> bool {
        !matches!(self, Self::CreateFolder)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed file mutation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OperationIntent")]
pub struct Operation {
    id: String,
    #[serde(rename = "type")]
    kind: OperationKind,
    source: PathBuf,
    target: PathBuf,
    reason: String,
    confidence: f64,
    timestamp: DateTime<Utc>,
}

impl Operation {
    fn build(kind: OperationKind, source: PathBuf, target: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            source,
            target,
            reason: String::new(),
            confidence: 1.0,
            timestamp: Utc::now(),
        }
    }

    /// Move `source` to the full path `target`.
    pub fn move_to(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::build(OperationKind::Move, source.into(), target.into())
    }

    /// Rename `source`. `target` is either a bare new name or a full path.
    pub fn rename(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::build(OperationKind::Rename, source.into(), target.into())
    }

    /// Create the folder `path` (and any missing parents).
    pub fn create_folder(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::build(OperationKind::CreateFolder, path.clone(), path)
    }

    /// Delete `path`. Accepted as an intent, never executed.
    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::build(OperationKind::Delete, path.into(), PathBuf::new())
    }

    /// Attach a reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Attach a confidence score, clamped to [0, 1].
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Copy of this operation pointing at a different target.
    ///
    /// Used to report the path actually written after conflict resolution.
    /// The id is kept so the applied operation can be traced to its intent.
    pub fn with_resolved_target(&self, target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The folder a CreateFolder operation creates.
    pub fn folder(&self) -> &Path {
        &self.target
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            OperationKind::CreateFolder | OperationKind::Delete => {
                write!(f, "{} {}", self.kind, self.folder_or_source().display())
            }
            _ => write!(
                f,
                "{} {} -> {}",
                self.kind,
                self.source.display(),
                self.target.display()
            ),
        }
    }
}

impl Operation {
    fn folder_or_source(&self) -> &Path {
        match self.kind {
            OperationKind::CreateFolder => &self.target,
            _ => &self.source,
        }
    }
}

/// Raw operation as emitted by a planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationIntent {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub target: Option<PathBuf>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

impl TryFrom<OperationIntent> for Operation {
    type Error = String;

    fn try_from(intent: OperationIntent) -> Result<Self, Self::Error> {
        let confidence = intent.confidence.unwrap_or(1.0);
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(format!("confidence {confidence} is outside [0, 1]"));
        }

        let source = non_empty(intent.source);
        let target = non_empty(intent.target);

        let (source, target) = match intent.kind {
            OperationKind::Move | OperationKind::Rename => match (source, target) {
                (Some(s), Some(t)) => (s, t),
                (None, _) => return Err(format!("{} requires a source", intent.kind)),
                (_, None) => return Err(format!("{} requires a target", intent.kind)),
            },
            OperationKind::CreateFolder => match target.or(source) {
                Some(folder) => (folder.clone(), folder),
                None => return Err("create_folder requires a target folder".to_string()),
            },
            OperationKind::Delete => match source {
                Some(s) => (s, target.unwrap_or_default()),
                None => return Err("delete requires a source".to_string()),
            },
        };

        Ok(Self {
            id: intent
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: intent.kind,
            source,
            target,
            reason: intent.reason,
            confidence,
            timestamp: intent.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanPayload {
    List(Vec<serde_json::Value>),
    Wrapped { operations: Vec<serde_json::Value> },
}

/// Parse a planner payload into validated operations.
///
/// Accepts a JSON array of intents or an object with an `operations` array.
/// The first malformed intent rejects the whole plan.
pub fn parse_plan(json: &str) -> Result<Vec<Operation>, PlanError> {
    let values = match serde_json::from_str::<PlanPayload>(json)? {
        PlanPayload::List(values) | PlanPayload::Wrapped { operations: values } => values,
    };

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let intent: OperationIntent =
                serde_json::from_value(value).map_err(|e| PlanError::InvalidIntent {
                    index,
                    message: e.to_string(),
                })?;
            Operation::try_from(intent).map_err(|message| PlanError::InvalidIntent { index, message })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_array() {
        let ops = parse_plan(
            r#"[
                {"type": "move", "source": "/d/a.txt", "target": "/d/docs/a.txt", "reason": "docs", "confidence": 0.9},
                {"type": "create_folder", "target": "/d/docs"}
            ]"#,
        )
        .unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].kind(), OperationKind::Move);
        assert_eq!(ops[0].reason(), "docs");
        assert_eq!(ops[1].kind(), OperationKind::CreateFolder);
        assert_eq!(ops[1].folder(), Path::new("/d/docs"));
        assert_ne!(ops[0].id(), ops[1].id());
    }

    #[test]
    fn test_parse_plan_wrapped() {
        let ops = parse_plan(r#"{"operations": [{"type": "rename", "source": "/d/a", "target": "b"}]}"#)
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].target(), Path::new("b"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = parse_plan(r#"[{"type": "copy", "source": "/a", "target": "/b"}]"#).unwrap_err();
        assert!(matches!(err, PlanError::InvalidIntent { index: 0, .. }));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let err = parse_plan(r#"[{"type": "move", "source": "/a", "target": "/b", "confidence": 1.5}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("confidence"));
    }

    #[test]
    fn test_move_without_target_rejected() {
        let err = parse_plan(r#"[{"type": "move", "source": "/a"}]"#).unwrap_err();
        assert!(err.to_string().contains("requires a target"));
    }

    #[test]
    fn test_create_folder_falls_back_to_source() {
        let ops = parse_plan(r#"[{"type": "create_folder", "source": "/d/new"}]"#).unwrap();
        assert_eq!(ops[0].folder(), Path::new("/d/new"));
    }

    #[test]
    fn test_serde_round_trip_keeps_identity() {
        let op = Operation::move_to("/a.txt", "/b/a.txt").with_reason("tidy");
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""type":"move""#));

        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_resolved_target_keeps_id() {
        let op = Operation::move_to("/a.txt", "/b/a.txt");
        let applied = op.with_resolved_target("/b/a_1.txt");
        assert_eq!(applied.id(), op.id());
        assert_eq!(applied.target(), Path::new("/b/a_1.txt"));
    }

    #[test]
    fn test_with_confidence_clamps() {
        assert_eq!(Operation::delete("/x").with_confidence(3.0).confidence(), 1.0);
        assert_eq!(Operation::delete("/x").with_confidence(f64::NAN).confidence(), 0.0);
    }
}

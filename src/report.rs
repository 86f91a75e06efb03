//! Batch reporting.
//!
//! Flattens the unit list into serializable rows plus per-status totals.
//! This is the payload behind the CLI's `--json` output and the data the
//! end-of-run summary is formatted from; artifact bytes never appear here.

use crate::unit::{FileUnit, UnitId, UnitKind, UnitStatus};
use serde::Serialize;

/// One unit, flattened for reporting. Artifacts are reduced to their names.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub id: UnitId,
    pub name: String,
    pub kind: UnitKind,
    pub status: UnitStatus,
    pub progress: u8,
    pub original_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_name: Option<String>,
}

impl UnitReport {
    pub fn from_unit(unit: &FileUnit) -> Self {
        Self {
            id: unit.id,
            name: unit.original_name.clone(),
            kind: unit.kind,
            status: unit.status,
            progress: unit.progress,
            original_size: unit.original_size,
            error: unit.error.clone(),
            result_name: unit.result.as_ref().map(|a| a.name.clone()),
            video_name: unit.video.as_ref().map(|a| a.name.clone()),
        }
    }
}

/// Unit counts by status.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchTotals {
    pub units: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Snapshot of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub totals: BatchTotals,
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    pub fn from_units(units: &[FileUnit]) -> Self {
        let mut totals = BatchTotals {
            units: units.len(),
            ..BatchTotals::default()
        };
        for unit in units {
            match unit.status {
                UnitStatus::Pending => totals.pending += 1,
                UnitStatus::Processing => totals.processing += 1,
                UnitStatus::Completed => totals.completed += 1,
                UnitStatus::Error => totals.failed += 1,
            }
        }
        Self {
            totals,
            units: units.iter().map(UnitReport::from_unit).collect(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.totals.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Artifact;
    use std::sync::Arc;

    fn completed_unit(name: &str) -> FileUnit {
        let mut unit = FileUnit::pending(name.to_string(), 10, UnitKind::Image);
        unit.begin_processing();
        unit.complete(
            Artifact::new(format!("{name}.out"), vec![1, 2, 3]),
            Some(Artifact::new("clip.mov", vec![4])),
        );
        unit
    }

    fn failed_unit(name: &str) -> FileUnit {
        let mut unit = FileUnit::pending(name.to_string(), 10, UnitKind::Image);
        unit.begin_processing();
        unit.fail("boom");
        unit
    }

    #[test]
    fn totals_count_each_status() {
        let units = vec![
            FileUnit::pending("a.heic".to_string(), 1, UnitKind::Image),
            completed_unit("b.heic"),
            failed_unit("c.heic"),
            failed_unit("d.heic"),
        ];
        let report = BatchReport::from_units(&units);

        assert_eq!(report.totals.units, 4);
        assert_eq!(report.totals.pending, 1);
        assert_eq!(report.totals.processing, 0);
        assert_eq!(report.totals.completed, 1);
        assert_eq!(report.totals.failed, 2);
        assert!(report.has_failures());
    }

    #[test]
    fn rows_carry_artifact_names_not_bytes() {
        let report = BatchReport::from_units(&[completed_unit("a")]);
        let row = &report.units[0];
        assert_eq!(row.result_name.as_deref(), Some("a.out"));
        assert_eq!(row.video_name.as_deref(), Some("clip.mov"));
        assert!(row.error.is_none());
    }

    #[test]
    fn json_omits_absent_optionals() {
        let units = vec![FileUnit::pending("a.heic".to_string(), 1, UnitKind::Image)];
        let value = serde_json::to_value(BatchReport::from_units(&units)).unwrap();

        let row = &value["units"][0];
        assert_eq!(row["name"], "a.heic");
        assert_eq!(row["status"], "pending");
        assert_eq!(row["kind"], "image");
        assert_eq!(row["progress"], 0);
        assert!(row.get("error").is_none());
        assert!(row.get("result_name").is_none());
    }

    #[test]
    fn json_includes_error_for_failed_units() {
        let value = serde_json::to_value(BatchReport::from_units(&[failed_unit("x")])).unwrap();
        assert_eq!(value["units"][0]["error"], "boom");
        assert_eq!(value["totals"]["failed"], 1);
    }

    #[test]
    fn video_only_unit_reports_its_artifact() {
        let unit = FileUnit::completed_video(Artifact::new("v.mov", vec![7, 7]));
        let report = BatchReport::from_units(&[unit]);
        let row = &report.units[0];
        assert_eq!(row.kind, UnitKind::Video);
        assert_eq!(row.status, UnitStatus::Completed);
        assert!(row.result_name.is_none());
        assert_eq!(row.video_name.as_deref(), Some("v.mov"));
    }

    #[test]
    fn report_is_bytes_free() {
        // The serialized form must not leak artifact buffers.
        let mut unit = FileUnit::pending("big.heic".to_string(), 3, UnitKind::Image);
        unit.begin_processing();
        let big: Arc<[u8]> = vec![0u8; 4096].into();
        unit.complete(Artifact::new("big.jpg", big), None);

        let json = serde_json::to_string(&BatchReport::from_units(&[unit])).unwrap();
        assert!(json.len() < 1024);
    }
}

// Report Sink Port
// Outbound per-waypoint diagnostics; the sequencer never reads them back

use crate::domain::WaypointReport;
use tracing::info;

pub trait ReportSink: Send + Sync {
    fn publish(&self, report: &WaypointReport);
}

/// Writes each report as a structured log event
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn publish(&self, report: &WaypointReport) {
        info!(
            side = %report.side,
            index = ?report.index,
            position_error = report.position_error,
            orientation_error = report.orientation_error,
            "Waypoint reached"
        );
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every published report
    #[derive(Default)]
    pub struct CollectingReportSink {
        reports: Mutex<Vec<WaypointReport>>,
    }

    impl CollectingReportSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reports(&self) -> Vec<WaypointReport> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl ReportSink for CollectingReportSink {
        fn publish(&self, report: &WaypointReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }
}

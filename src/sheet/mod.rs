//! Spreadsheet exporter (spec.md §6, interface-level): the pipeline's
//! final stage posts the per-company aggregate view somewhere a human
//! reviewer can read it. `SheetExporter` is the seam; `google` is the
//! one concrete implementation, matching the teacher's own pattern of
//! a small trait plus a single production impl (`store::Store` /
//! `store::SqliteStore`).

pub mod google;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::store::models::CompanyExportRow;

#[async_trait]
pub trait SheetExporter: Send + Sync {
    /// Replace the exported view with the given rows. Implementations
    /// are expected to be idempotent: exporting the same rows twice
    /// produces the same sheet state.
    async fn export(&self, rows: &[CompanyExportRow]) -> Result<(), PipelineError>;
}

/// No-op exporter used when no credentials are configured, so the
/// orchestrator's export stage is never conditionally skipped in
/// code — it always runs a `SheetExporter`, just sometimes a null one.
pub struct NullExporter;

#[async_trait]
impl SheetExporter for NullExporter {
    async fn export(&self, _rows: &[CompanyExportRow]) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_exporter_always_succeeds() {
        let exporter = NullExporter;
        assert!(exporter.export(&[]).await.is_ok());
    }
}

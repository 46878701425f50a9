use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Required input columns are absent. Checked once per run, before any play is touched.
    #[error("tracking table is missing required columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
}

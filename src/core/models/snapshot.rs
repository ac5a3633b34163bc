use serde::Serialize;

/// One restorable point in a repository, as reported by its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Source the snapshot belongs to.
    pub source: String,
    /// Backend-specific identifier (bup save name, archive name).
    pub id: String,
    /// Creation time as printed by the backend, when it prints one.
    pub time: Option<String>,
}

use crate::Document;

/// Optional per-block-type hook for validation beyond the schema, or
/// post-load enrichment.
///
/// Most block types do NOT need one; schema validation covers field
/// presence and types. Implement this for checks such as URL shape or
/// cross-field constraints.
pub trait BlockHandler: Send + Sync {
    /// Validate a document before it is persisted.
    /// Return `Err(message)` to reject the write.
    fn validate(&self, document: &Document) -> Result<(), String> {
        let _ = document;
        Ok(())
    }

    /// Called after loading a document from storage, before returning it.
    fn on_after_load(&self, document: &mut Document) {
        let _ = document;
    }
}

use thiserror::Error;

/// Wire-level failures. Per spec.md §7 taxonomy items 3/4: any short or
/// malformed transfer rejects the whole STF, never surfaces a partial tree.
#[derive(Debug, Error)]
pub enum StfCodecError {
    #[error("transport error while receiving {what}: {source}")]
    Transport {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("header/payload count mismatch: {header_count} headers, {payload_count} payloads")]
    CountMismatch {
        header_count: u64,
        payload_count: u64,
    },

    #[error("equipment count {eq_count} exceeds sane bound {max}")]
    EquipmentCountOutOfBounds { eq_count: u32, max: u32 },
}

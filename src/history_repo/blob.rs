// BLOB version prefix helpers. [version: u8][payload].
// fields: version 1 = wincode Vec<f64>.

pub(super) const BLOB_VERSION_FIELDS: u8 = 1;

pub(super) fn with_version_prefix(version: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(version);
    out.extend_from_slice(&payload);
    out
}

/// Payload after the version byte, or `None` for an empty blob or an unknown version.
pub(super) fn versioned_payload(bytes: &[u8], expected_version: u8) -> Option<&[u8]> {
    match bytes.split_first() {
        Some((v, rest)) if *v == expected_version => Some(rest),
        _ => None,
    }
}

pub(super) fn encode_fields(fields: &[f64]) -> anyhow::Result<Vec<u8>> {
    let payload = wincode::serialize(&fields.to_vec())
        .map_err(|e| anyhow::anyhow!("wincode fields: {}", e))?;
    Ok(with_version_prefix(BLOB_VERSION_FIELDS, payload))
}

pub(super) fn decode_fields(bytes: &[u8]) -> Option<Vec<f64>> {
    let payload = versioned_payload(bytes, BLOB_VERSION_FIELDS)?;
    wincode::deserialize::<Vec<f64>>(payload)
        .map_err(|e| tracing::debug!(error = %e, "wincode deserialize fields (corrupt), skipping"))
        .ok()
}

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::FormatError;
use crate::geojson::FeatureCollection;

/// Returns `true` when `file_name` names a gzip-compressed payload.
pub fn is_gzip_name(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".gz")
}

/// Decodes a dataset file body into features.
///
/// `.gz` files are inflated first; an empty `.gz` body is an empty
/// collection rather than an error.
pub fn decode_payload(file_name: &str, bytes: &[u8]) -> Result<FeatureCollection, FormatError> {
    if !is_gzip_name(file_name) {
        return FeatureCollection::from_geojson_slice(bytes);
    }
    if bytes.is_empty() {
        return Ok(FeatureCollection::default());
    }

    let mut inflated = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut inflated)
        .map_err(FormatError::Gzip)?;
    FeatureCollection::from_geojson_slice(&inflated)
}

#[derive(Debug)]
pub enum FormatError {
    Json(serde_json::Error),
    NotAnObject,
    UnsupportedType(String),
    Gzip(std::io::Error),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Json(e) => write!(f, "JSON parse error: {e}"),
            FormatError::NotAnObject => write!(f, "expected a GeoJSON object"),
            FormatError::UnsupportedType(ty) => {
                write!(f, "expected FeatureCollection or Feature, got {ty:?}")
            }
            FormatError::Gzip(e) => write!(f, "gzip decode error: {e}"),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Json(e) => Some(e),
            FormatError::Gzip(e) => Some(e),
            _ => None,
        }
    }
}

use crate::residency::FileFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    UnknownLayer(String),
    DuplicateLayer(String),
    /// The layer's data has not been loaded; activate or load it first.
    NotLoaded(String),
    /// Every file of the watershed base layer failed. Nothing can be
    /// filtered without it.
    BaseLayerUnavailable {
        layer: String,
        failures: Vec<FileFailure>,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnknownLayer(key) => write!(f, "unknown layer: {key}"),
            RegistryError::DuplicateLayer(key) => write!(f, "layer registered twice: {key}"),
            RegistryError::NotLoaded(key) => write!(f, "layer not loaded: {key}"),
            RegistryError::BaseLayerUnavailable { layer, failures } => {
                write!(f, "base layer {layer} could not be loaded")?;
                for failure in failures {
                    write!(f, "; {}: {}", failure.file, failure.error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RegistryError {}

use causa_value::Value;

/// Where a [`RawConfiguration`] layer came from. Open-ended, but with
/// three reserved values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceType(String);

impl SourceType {
    /// A layer loaded from an on-disk `causa.yaml`/`causa.*.yaml` file.
    pub const FILE: &'static str = "file";
    /// A layer appended from `environments.<id>.configuration`.
    pub const ENVIRONMENT: &'static str = "environment";
    /// A layer merged back from a processor's return value.
    pub const PROCESSOR: &'static str = "processor";

    /// Wraps any source-type string, reserved or not.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The wrapped string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceType {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single layer of configuration.
#[derive(Debug, Clone)]
pub struct RawConfiguration {
    /// The kind of source this layer came from.
    pub source_type: SourceType,
    /// A human-readable identifier for the source (a file path, an
    /// environment id, a processor name), or `None`.
    pub source: Option<String>,
    /// The layer's configuration tree, expected to be a map.
    pub configuration: Value,
}

impl RawConfiguration {
    /// Builds a layer sourced from a configuration file.
    pub fn from_file(path: impl Into<String>, configuration: Value) -> Self {
        Self {
            source_type: SourceType::new(SourceType::FILE),
            source: Some(path.into()),
            configuration,
        }
    }

    /// Builds a layer sourced from an environment overlay.
    pub fn from_environment(id: impl Into<String>, configuration: Value) -> Self {
        Self {
            source_type: SourceType::new(SourceType::ENVIRONMENT),
            source: Some(id.into()),
            configuration,
        }
    }

    /// Builds a layer sourced from a processor's returned partial
    /// configuration.
    pub fn from_processor(name: impl Into<String>, configuration: Value) -> Self {
        Self {
            source_type: SourceType::new(SourceType::PROCESSOR),
            source: Some(name.into()),
            configuration,
        }
    }
}

use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    BadDuration(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::BadDuration(e) => write!(f, "Duration formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures raised by a `LogStore` backend while talking to the datastore.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    ConnectionFailed(String),
    RequestFailed { status: u16, body: String },
    MalformedResponse(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionFailed(e) => write!(f, "Store connection failed: {}", e),
            StoreError::RequestFailed { status, body } => {
                write!(f, "Store request failed with status {}: {}", status, body)
            }
            StoreError::MalformedResponse(e) => write!(f, "Malformed store response: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Failures of a paginated retrieval as a whole.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    Store(StoreError),
    /// The store handed back the cursor it was just given.
    StalledCursor(&'static str),
    /// A non-empty page came back without a way to resume after it.
    MissingCursor(&'static str),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Store(e) => write!(f, "{}", e),
            QueryError::StalledCursor(op) => write!(f, "Cursor did not advance during {}", op),
            QueryError::MissingCursor(op) => write!(f, "Page without resume cursor during {}", op),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        QueryError::Store(err)
    }
}

/// Invalid user-supplied filter, column or paging values.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    BadTime(String),
    BadPort(String),
    BadValue(String),
    EmptyRange(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::BadTime(e) => write!(f, "Invalid time: {}", e),
            FilterError::BadPort(e) => write!(f, "Invalid port: {}", e),
            FilterError::BadValue(e) => write!(f, "Invalid value: {}", e),
            FilterError::EmptyRange(e) => write!(f, "Empty range: {}", e),
        }
    }
}

impl std::error::Error for FilterError {}

#[derive(Debug)]
pub enum ExportError {
    IoError(std::io::Error),
    SerializationFailed(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::IoError(e) => write!(f, "Export IO error: {}", e),
            ExportError::SerializationFailed(e) => write!(f, "Export serialization failed: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::IoError(err)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::SerializationFailed(err.to_string())
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

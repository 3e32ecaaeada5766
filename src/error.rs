//! # Error Types Module
//!
//! Centralized error handling for the gesture logger.
//! Each concern gets its own error type so callers can match on what went
//! wrong without string inspection.
//!
//! ## Error Types
//! - `SchedulerError`: Invalid frame listener cadence
//! - `CodecError`: Malformed binary or text pose data
//! - `TransportError`: HTTP failures and unexpected server responses
//! - `CaptureError`: A capture session whose upload failed
//! - `ConfigError`: Configuration file I/O and parsing errors
//! - `LaunchError`: Invalid launch parameters (shown to the participant)
//! - `TrialError`: A trial step whose server call failed
//!
//! ## Usage Examples
//! ```rust,ignore
//! // Codec uses CodecError
//! pub fn decode_records(bytes: &[u8]) -> Result<Vec<PoseRecord>, CodecError> { ... }
//!
//! // Transports use TransportError
//! async fn append_batch(&self, target: &TransferTarget, data: Vec<u8>) -> Result<(), TransportError>;
//! ```

use std::fmt;

/// Errors raised when registering frame listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Period must be at least one frame and the phase offset below it
    InvalidCadence { name: String, period: u64, phase: u64 },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::InvalidCadence { name, period, phase } => {
                write!(
                    f,
                    "Invalid cadence for listener '{}': period {} with phase offset {}",
                    name, period, phase
                )
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Errors that can occur while decoding pose data
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Byte buffer is not a whole number of 32-bit floats
    UnalignedBuffer { len: usize },
    /// Value count is not a whole number of records
    PartialRecord { values: usize, record_length: usize },
    /// Legacy text payload contained something that is not a float
    InvalidNumber { line: usize, token: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnalignedBuffer { len } => {
                write!(f, "Pose buffer of {} bytes is not a multiple of 4", len)
            }
            CodecError::PartialRecord {
                values,
                record_length,
            } => {
                write!(
                    f,
                    "Pose data holds {} values, not a multiple of the record length {}",
                    values, record_length
                )
            }
            CodecError::InvalidNumber { line, token } => {
                write!(f, "Invalid number '{}' on line {}", token, line)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Errors that can occur while talking to the collection server
#[derive(Debug)]
pub enum TransportError {
    /// The request could not be sent or the response body not read
    Request(reqwest::Error),
    /// Server answered with a status the endpoint does not accept
    UnexpectedStatus { endpoint: String, status: u16, body: String },
    /// Server payload could not be decoded
    Decode(CodecError),
    /// Local archive could not be written
    Archive(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "Request failed: {}", e),
            TransportError::UnexpectedStatus {
                endpoint,
                status,
                body,
            } => {
                write!(f, "{} returned status {}: {}", endpoint, status, body)
            }
            TransportError::Decode(e) => write!(f, "Failed to decode server payload: {}", e),
            TransportError::Archive(e) => write!(f, "Failed to write capture archive: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Request(e) => Some(e),
            TransportError::UnexpectedStatus { .. } => None,
            TransportError::Decode(e) => Some(e),
            TransportError::Archive(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Request(e)
    }
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        TransportError::Decode(e)
    }
}

/// Errors that end a capture session early
#[derive(Debug)]
pub enum CaptureError {
    /// Capture listener could not be registered
    Scheduler(SchedulerError),
    /// Start-transfer call failed; no batch was sent
    StartTransfer(TransportError),
    /// A batch upload failed; later batches were withheld to keep server order
    AppendBatch { batch: u64, source: TransportError },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Scheduler(e) => write!(f, "Could not start capture: {}", e),
            CaptureError::StartTransfer(e) => write!(f, "Could not start transfer: {}", e),
            CaptureError::AppendBatch { batch, source } => {
                write!(f, "Failed to send batch {}: {}", batch, source)
            }
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Scheduler(e) => Some(e),
            CaptureError::StartTransfer(e) => Some(e),
            CaptureError::AppendBatch { source, .. } => Some(source),
        }
    }
}

impl From<SchedulerError> for CaptureError {
    fn from(e: SchedulerError) -> Self {
        CaptureError::Scheduler(e)
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
    /// A setting has a value the app cannot run with
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
            ConfigError::Invalid { field, reason } => {
                write!(f, "Invalid config value for {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
            ConfigError::Invalid { .. } => None,
        }
    }
}

/// Invalid launch parameters.
///
/// The display text is what the participant sees in place of the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// Launch URL could not be parsed at all
    MalformedUrl(String),
    /// Neither a trial, a demonstration recording nor a viewer was requested
    MissingParameters,
    /// Demonstration recording needs a short code and a duration
    InvalidDemonstration,
    /// Backend override is not a usable URL
    InvalidBackendUrl(String),
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::MalformedUrl(url) => write!(f, "Could not read launch address {}", url),
            LaunchError::MissingParameters => write!(f, "Project and participant are not set"),
            LaunchError::InvalidDemonstration => write!(
                f,
                "Both code and durationMs (between 0 and 30900) must be provided"
            ),
            LaunchError::InvalidBackendUrl(url) => write!(f, "Invalid server address {}", url),
        }
    }
}

impl std::error::Error for LaunchError {}

/// Errors that abort a trial or demonstration session
#[derive(Debug)]
pub enum TrialError {
    /// A server call made by a trial step failed
    Transport(TransportError),
    /// Recording a gesture failed
    Capture { gesture_index: usize, source: CaptureError },
    /// A UI interaction could not be created
    Scheduler(SchedulerError),
    /// Demonstration short code is not known to the server
    UnknownShortCode(String),
}

impl fmt::Display for TrialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialError::Transport(e) => write!(f, "Server call failed: {}", e),
            TrialError::Capture {
                gesture_index,
                source,
            } => write!(f, "Recording gesture {} failed: {}", gesture_index, source),
            TrialError::Scheduler(e) => write!(f, "Could not schedule interaction: {}", e),
            TrialError::UnknownShortCode(code) => write!(f, "Invalid code {}", code),
        }
    }
}

impl std::error::Error for TrialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrialError::Transport(e) => Some(e),
            TrialError::Capture { source, .. } => Some(source),
            TrialError::Scheduler(e) => Some(e),
            TrialError::UnknownShortCode(_) => None,
        }
    }
}

impl From<TransportError> for TrialError {
    fn from(e: TransportError) -> Self {
        TrialError::Transport(e)
    }
}

impl From<SchedulerError> for TrialError {
    fn from(e: SchedulerError) -> Self {
        TrialError::Scheduler(e)
    }
}

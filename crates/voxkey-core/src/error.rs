use thiserror::Error;

/// Top-level error type for the Voxkey system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates return
/// `VoxkeyError` directly so that the `?` operator works across crate
/// boundaries without per-crate error hierarchies.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoxkeyError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested (or default) input device could not be opened.
    /// Recoverable: the session controller reverts to idle.
    #[error("Audio device unavailable: {device}")]
    DeviceUnavailable { device: String },

    #[error("Audio error: {0}")]
    Audio(String),

    /// The device disappeared mid-recording. Treated like a silence
    /// timeout: whatever was captured is finalized and transcribed.
    #[error("Audio stream interrupted: {0}")]
    Stream(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for VoxkeyError {
    fn from(err: toml::de::Error) -> Self {
        VoxkeyError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VoxkeyError {
    fn from(err: toml::ser::Error) -> Self {
        VoxkeyError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VoxkeyError {
    fn from(err: serde_json::Error) -> Self {
        VoxkeyError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Voxkey operations.
pub type Result<T> = std::result::Result<T, VoxkeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VoxkeyError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_device_unavailable_display() {
        let err = VoxkeyError::DeviceUnavailable {
            device: "USB Microphone".to_string(),
        };
        assert_eq!(err.to_string(), "Audio device unavailable: USB Microphone");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VoxkeyError = io_err.into();
        assert!(matches!(err, VoxkeyError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let parsed: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(parsed.is_err());
        let err: VoxkeyError = parsed.unwrap_err().into();
        assert!(matches!(err, VoxkeyError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(parsed.is_err());
        let err: VoxkeyError = parsed.unwrap_err().into();
        assert!(matches!(err, VoxkeyError::Serialization(_)));
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(VoxkeyError, &str)> = vec![
            (
                VoxkeyError::Audio("no device".to_string()),
                "Audio error: no device",
            ),
            (
                VoxkeyError::Stream("device lost".to_string()),
                "Audio stream interrupted: device lost",
            ),
            (
                VoxkeyError::Transcription("model error".to_string()),
                "Transcription error: model error",
            ),
            (
                VoxkeyError::Session("bad transition".to_string()),
                "Session error: bad transition",
            ),
            (
                VoxkeyError::Output("send input failed".to_string()),
                "Output error: send input failed",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }

    #[test]
    fn test_error_debug_impl() {
        let err = VoxkeyError::Stream("callback error".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Stream"));
        assert!(debug_str.contains("callback error"));
    }
}

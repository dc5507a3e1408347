//! Process-level error type.
//!
//! Every failure surfaces as an `AppError` carrying the exit code the binary
//! should terminate with:
//!
//! - `2`: usage, configuration, or local file errors
//! - `3`: empty dataset (no trades to aggregate, nothing to plot)
//! - `4`: upstream fetch failures (unreachable endpoint, malformed response)
//! - `5`: reference-data coverage errors (a trade has no matching mid-price)

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

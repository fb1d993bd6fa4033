use std::error::Error;
use std::fmt::{Display, Formatter};

pub type BenchResult<T> = Result<T, BenchError>;

/// Fatal error classes, each owning one process exit code. Exit 1 is kept
/// for a completed run with failing cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchErrorCategory {
    InputValidationError,
    IoSystemError,
    InternalError,
}

impl BenchErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::InternalError => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::InternalError => "InternalError",
        }
    }
}

/// Fatal harness error. Extraction misses and failed comparisons are not
/// errors; they surface in the case reports instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchError {
    category: BenchErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl BenchError {
    fn new(category: BenchErrorCategory, placeholder: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BenchErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BenchErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BenchErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> BenchErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// `ERROR: [PLACEHOLDER] message`, the first stderr line of a fatal exit.
    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for BenchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.name(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for BenchError {}

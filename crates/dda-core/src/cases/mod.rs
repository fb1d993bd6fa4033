mod model;
mod parser;

pub use model::{CaseCommand, CommandCase, FeatureFlags, TolerancePolicy};
pub use parser::{CaseParseError, parse_command_cases, read_command_cases};

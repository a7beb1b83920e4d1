use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The cache state a benchmark iteration runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestType {
    /// Empty client caches, nothing restored yet.
    Cold,
    /// Caches primed by a previous restore.
    Warm,
    /// Restore forced even though the outputs are current.
    Force,
    /// Nothing to do; measures the no-op path.
    NoOp,
}

impl FromStr for TestType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cold" => Ok(TestType::Cold),
            "warm" => Ok(TestType::Warm),
            "force" => Ok(TestType::Force),
            "noop" | "no-op" => Ok(TestType::NoOp),
            _ => Err(Error::ConfigurationError(format!("unknown test type '{}' (expected cold, warm, force or noop)", s))),
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestType::Cold => "cold",
            TestType::Warm => "warm",
            TestType::Force => "force",
            TestType::NoOp => "noop",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        assert_eq!("Cold".parse::<TestType>().unwrap(), TestType::Cold);
        assert_eq!("no-op".parse::<TestType>().unwrap(), TestType::NoOp);
        assert_eq!(TestType::NoOp.to_string(), "noop");
        assert!(matches!("arctic".parse::<TestType>(), Err(Error::ConfigurationError(_))));
    }
}

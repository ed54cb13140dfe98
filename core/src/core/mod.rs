pub mod engine;
pub mod executor;
pub mod notifier;
pub mod result_aggregator;
pub mod session;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The vulnerability class a session probes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Lfi,
    Sqli,
    Xss,
    OpenRedirect,
    Crlf,
}

impl ScanType {
    pub const ALL: [ScanType; 5] = [
        ScanType::Lfi,
        ScanType::Sqli,
        ScanType::Xss,
        ScanType::OpenRedirect,
        ScanType::Crlf,
    ];

    /// Short name used on the command line.
    pub fn short_name(&self) -> &'static str {
        match self {
            ScanType::Lfi => "lfi",
            ScanType::Sqli => "sqli",
            ScanType::Xss => "xss",
            ScanType::OpenRedirect => "or",
            ScanType::Crlf => "crlf",
        }
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanType::Lfi => write!(f, "LFI"),
            ScanType::Sqli => write!(f, "SQLi"),
            ScanType::Xss => write!(f, "XSS"),
            ScanType::OpenRedirect => write!(f, "Open Redirect"),
            ScanType::Crlf => write!(f, "CRLF"),
        }
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lfi" => Ok(ScanType::Lfi),
            "sqli" | "sql" => Ok(ScanType::Sqli),
            "xss" => Ok(ScanType::Xss),
            "or" | "redirect" | "open-redirect" | "open_redirect" => Ok(ScanType::OpenRedirect),
            "crlf" => Ok(ScanType::Crlf),
            other => Err(format!("unknown scan type '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_round_trip() {
        for kind in ScanType::ALL {
            assert_eq!(kind.short_name().parse::<ScanType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_aliases_and_unknown() {
        assert_eq!("Open-Redirect".parse::<ScanType>().unwrap(), ScanType::OpenRedirect);
        assert_eq!(" SQL ".parse::<ScanType>().unwrap(), ScanType::Sqli);
        assert!("rce".parse::<ScanType>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ScanType::OpenRedirect.to_string(), "Open Redirect");
        assert_eq!(ScanType::Sqli.to_string(), "SQLi");
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The identity of one recorded network call, independent of when it was observed.
///
/// Two operations are equal iff `kind` and `address` match exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Operation {
    kind: String,
    address: String,
}

impl Operation {
    pub fn new(kind: impl Into<String>, address: impl Into<String>) -> Self {
        Operation { kind: kind.into(), address: address.into() }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Classifies the kind for dependency inference. `None` for kinds the heuristic does not know.
    pub fn category(&self) -> Option<OperationCategory> {
        self.kind.parse().ok()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.address)
    }
}

/// Call categories understood by the dependency heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCategory {
    ServiceIndex,
    RegistrationIndex,
    RegistrationPage,
    PackageVersions,
    PackageContent,
}

impl OperationCategory {
    /// Categories whose most recent occurrence for the same package satisfies this category.
    /// An empty slice means the category only waits for the service index.
    pub fn package_prerequisites(&self) -> &'static [OperationCategory] {
        match self {
            OperationCategory::ServiceIndex => &[],
            OperationCategory::RegistrationIndex | OperationCategory::PackageVersions => &[],
            OperationCategory::RegistrationPage => &[OperationCategory::RegistrationIndex],
            OperationCategory::PackageContent => &[
                OperationCategory::RegistrationIndex,
                OperationCategory::RegistrationPage,
                OperationCategory::PackageVersions,
            ],
        }
    }

    pub fn depends_on_service_index(&self) -> bool {
        !matches!(self, OperationCategory::ServiceIndex)
    }
}

impl FromStr for OperationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "service-index" | "serviceindex" => Ok(OperationCategory::ServiceIndex),
            "registration" | "registration-index" => Ok(OperationCategory::RegistrationIndex),
            "registration-page" => Ok(OperationCategory::RegistrationPage),
            "package-versions" | "versions" => Ok(OperationCategory::PackageVersions),
            "download" | "package-content" | "nupkg" => Ok(OperationCategory::PackageContent),
            _ => Err(s.to_string()),
        }
    }
}

/// Derives the (lowercased) package identifier an address refers to.
///
/// - `.../{id}/index.json` (registration index, version listing)
/// - `.../{id}/page/{lower}/{upper}.json` (registration page)
/// - `.../{id}/{version}/{id}.{version}.nupkg` (flat container)
/// - `.../{id}/{file}.nupkg`
pub fn package_id_from_address(category: OperationCategory, address: &str) -> Option<String> {
    let path = match reqwest::Url::parse(address) {
        Ok(url) => url.path().to_string(),
        Err(_) => address.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let len = segments.len();

    let id = match category {
        OperationCategory::ServiceIndex => None,
        OperationCategory::RegistrationPage => {
            let page = segments.iter().rposition(|s| s.eq_ignore_ascii_case("page"))?;
            page.checked_sub(1).map(|i| segments[i])
        }
        OperationCategory::RegistrationIndex | OperationCategory::PackageVersions => {
            if len >= 2 && segments[len - 1].eq_ignore_ascii_case("index.json") { Some(segments[len - 2]) } else { None }
        }
        OperationCategory::PackageContent => {
            if len >= 3 && segments[len - 1].to_ascii_lowercase().starts_with(&format!("{}.", segments[len - 3].to_ascii_lowercase())) {
                Some(segments[len - 3])
            } else if len >= 2 {
                Some(segments[len - 2])
            } else {
                None
            }
        }
    };

    id.map(|s| s.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_equality_is_by_kind_and_address() {
        assert_eq!(Operation::new("registration", "/a/index.json"), Operation::new("registration", "/a/index.json"));
        assert_ne!(Operation::new("registration", "/a/index.json"), Operation::new("download", "/a/index.json"));
        assert_ne!(Operation::new("registration", "/a/index.json"), Operation::new("registration", "/A/index.json"));
    }

    #[test]
    fn category_parsing_accepts_aliases() {
        assert_eq!("Registration".parse(), Ok(OperationCategory::RegistrationIndex));
        assert_eq!("registration_page".parse(), Ok(OperationCategory::RegistrationPage));
        assert_eq!("download".parse(), Ok(OperationCategory::PackageContent));
        assert_eq!("nupkg".parse(), Ok(OperationCategory::PackageContent));
        assert_eq!("versions".parse(), Ok(OperationCategory::PackageVersions));
        assert_eq!("service-index".parse(), Ok(OperationCategory::ServiceIndex));
        assert!("telemetry".parse::<OperationCategory>().is_err());
    }

    #[test]
    fn package_id_extraction() {
        use OperationCategory::*;
        assert_eq!(package_id_from_address(RegistrationIndex, "/a/index.json").as_deref(), Some("a"));
        assert_eq!(package_id_from_address(PackageContent, "/a/1.0.0.nupkg").as_deref(), Some("a"));
        assert_eq!(
            package_id_from_address(PackageContent, "/v3-flatcontainer/Newtonsoft.Json/13.0.1/newtonsoft.json.13.0.1.nupkg").as_deref(),
            Some("newtonsoft.json")
        );
        assert_eq!(
            package_id_from_address(RegistrationPage, "https://api.nuget.org/v3/registration5/serilog/page/1.0.0/2.0.0.json").as_deref(),
            Some("serilog")
        );
        assert_eq!(package_id_from_address(PackageVersions, "/v3-flatcontainer/xunit/index.json?x=1").as_deref(), Some("xunit"));
        assert_eq!(package_id_from_address(ServiceIndex, "/v3/index.json"), None);
        assert_eq!(package_id_from_address(RegistrationIndex, "/a/other.json"), None);
    }
}

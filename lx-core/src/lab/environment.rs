use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::EnvironmentSection;

use super::error::{LabError, LabResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Rol,
    Factory,
    China,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Rol, Environment::Factory, Environment::China];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Rol => "rol",
            Environment::Factory => "factory",
            Environment::China => "china",
        }
    }

    pub fn base_url<'a>(&self, section: &'a EnvironmentSection) -> LabResult<&'a str> {
        let value = match self {
            Environment::Rol => section.rol.as_deref(),
            Environment::Factory => section.factory.as_deref(),
            Environment::China => section.china.as_deref(),
        };
        value
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| LabError::MissingBaseUrl(self.to_string()))
    }

    /// `<base><course>/pages/<section>`
    pub fn course_url(
        &self,
        section: &EnvironmentSection,
        course_id: &str,
        chapter_section: Option<&str>,
    ) -> LabResult<String> {
        let base = self.base_url(section)?;
        let base = if base.ends_with('/') {
            Url::parse(base)
        } else {
            Url::parse(&format!("{base}/"))
        }
        .map_err(|err| LabError::Configuration(format!("invalid base url {base}: {err}")))?;
        let relative = match chapter_section {
            Some(chapter) => format!("{course_id}/pages/{chapter}"),
            None => course_id.to_string(),
        };
        base.join(&relative)
            .map(String::from)
            .map_err(|err| {
                LabError::Configuration(format!("invalid course path {relative}: {err}"))
            })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = LabError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "rol" => Ok(Environment::Rol),
            "factory" | "rol-stage" | "stage" => Ok(Environment::Factory),
            "china" => Ok(Environment::China),
            other => Err(LabError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> EnvironmentSection {
        EnvironmentSection {
            default: "rol".into(),
            rol: Some("https://rol.example.com/rol/app/courses/".into()),
            factory: Some("https://factory.example.com/courses".into()),
            china: None,
        }
    }

    #[test]
    fn stage_aliases_map_to_factory() {
        assert_eq!("rol-stage".parse::<Environment>().unwrap(), Environment::Factory);
        assert_eq!("STAGE".parse::<Environment>().unwrap(), Environment::Factory);
        assert!("moon".parse::<Environment>().is_err());
    }

    #[test]
    fn course_url_joins_pages_path() {
        let url = Environment::Rol
            .course_url(&section(), "do280-4.18", Some("pr01"))
            .unwrap();
        assert_eq!(url, "https://rol.example.com/rol/app/courses/do280-4.18/pages/pr01");
    }

    #[test]
    fn base_without_trailing_slash_keeps_last_segment() {
        let url = Environment::Factory
            .course_url(&section(), "rh124-9.3", None)
            .unwrap();
        assert_eq!(url, "https://factory.example.com/courses/rh124-9.3");
    }

    #[test]
    fn unconfigured_environment_is_an_error() {
        let err = Environment::China.base_url(&section()).unwrap_err();
        assert!(matches!(err, LabError::MissingBaseUrl(env) if env == "china"));
    }
}

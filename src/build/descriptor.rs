// ABOUTME: The schema-versioned build descriptor found at the root of a build context.
// ABOUTME: Resolves to build-file text from inline lines or a named template.

use serde::{Deserialize, Serialize};

use super::error::BuildError;
use super::templates;

/// File name of the descriptor inside a build context.
pub const DESCRIPTOR_FILE: &str = "build-definition";

/// File name the resolved build file is written to.
pub const BUILD_FILE: &str = "Dockerfile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    pub schema_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_lines: Option<Vec<String>>,
}

impl BuildDescriptor {
    pub fn parse(content: &str) -> Result<Self, BuildError> {
        serde_json::from_str(content).map_err(|e| BuildError::InvalidDescriptor(e.to_string()))
    }

    /// Descriptor for deploying a prebuilt image as is.
    pub fn from_image(image: &str) -> Self {
        Self {
            schema_version: 1,
            template_id: None,
            dockerfile_lines: Some(vec![format!("FROM {}", image)]),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Text of the build file this descriptor stands for.
    pub fn build_file(&self) -> Result<String, BuildError> {
        if self.schema_version != 1 {
            return Err(BuildError::UnsupportedSchema(self.schema_version));
        }

        let template = self
            .template_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let lines = self.dockerfile_lines.as_ref().filter(|l| !l.is_empty());

        match (template, lines) {
            (Some(template), None) => templates::resolve(template),
            (None, Some(lines)) => Ok(format!("{}\n", lines.join("\n"))),
            _ => Err(BuildError::AmbiguousDescriptor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_lines_become_build_file() {
        let descriptor =
            BuildDescriptor::parse(r#"{"schemaVersion":1,"dockerfileLines":["FROM nginx","EXPOSE 80"]}"#)
                .unwrap();
        assert_eq!(descriptor.build_file().unwrap(), "FROM nginx\nEXPOSE 80\n");
    }

    #[test]
    fn both_sources_rejected() {
        let descriptor = BuildDescriptor::parse(
            r#"{"schemaVersion":1,"templateId":"node/18","dockerfileLines":["FROM nginx"]}"#,
        )
        .unwrap();
        assert!(matches!(
            descriptor.build_file(),
            Err(BuildError::AmbiguousDescriptor)
        ));
    }

    #[test]
    fn neither_source_rejected() {
        let descriptor = BuildDescriptor::parse(r#"{"schemaVersion":1}"#).unwrap();
        assert!(matches!(
            descriptor.build_file(),
            Err(BuildError::AmbiguousDescriptor)
        ));
    }

    #[test]
    fn other_schema_versions_rejected() {
        let descriptor =
            BuildDescriptor::parse(r#"{"schemaVersion":2,"dockerfileLines":["FROM nginx"]}"#)
                .unwrap();
        assert!(matches!(
            descriptor.build_file(),
            Err(BuildError::UnsupportedSchema(2))
        ));
    }

    #[test]
    fn image_descriptor_round_trips_through_json() {
        let descriptor = BuildDescriptor::from_image("nginx:alpine");
        let parsed = BuildDescriptor::parse(&descriptor.to_json()).unwrap();
        assert_eq!(parsed.build_file().unwrap(), "FROM nginx:alpine\n");
    }
}

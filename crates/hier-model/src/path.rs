//! Breadcrumb paths
//!
//! Renders the current selections as `P1 / C1 / S1 / PL1`.

use crate::entity::Node;
use serde::{Deserialize, Serialize};

/// Text shown when nothing is selected
pub const DEFAULT_PLACEHOLDER: &str = "Select Project";

/// Separator between breadcrumb segments
pub const DEFAULT_SEPARATOR: &str = " / ";

/// How a breadcrumb is rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathStyle {
    pub separator: String,
    pub placeholder: String,
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl PathStyle {
    /// Build a breadcrumb from selections given root first
    ///
    /// Unset levels are skipped; empty codes are skipped too. Returns the
    /// placeholder when no segment remains.
    #[must_use]
    pub fn render<'a, I>(&self, selections: I) -> String
    where
        I: IntoIterator<Item = Option<&'a Node>>,
    {
        let segments: Vec<&str> = selections
            .into_iter()
            .flatten()
            .map(|node| node.code.as_str())
            .filter(|code| !code.is_empty())
            .collect();

        if segments.is_empty() {
            self.placeholder.clone()
        } else {
            segments.join(&self.separator)
        }
    }
}

/// Render with the default style
#[inline]
#[must_use]
pub fn build_path<'a, I>(selections: I) -> String
where
    I: IntoIterator<Item = Option<&'a Node>>,
{
    PathStyle::default().render(selections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Client, Plant, Project, Site};
    use pretty_assertions::assert_eq;

    #[test]
    fn project_and_client_only() {
        let project = Node::from(Project::new(1, "P1", "Project One"));
        let client = Node::from(Client::new(10, 1, "C1", "Client One"));

        let path = build_path([Some(&project), Some(&client), None, None]);
        assert_eq!(path, "P1 / C1");
    }

    #[test]
    fn all_levels() {
        let project = Node::from(Project::new(1, "P1", "Project One"));
        let client = Node::from(Client::new(10, 1, "C1", "Client One"));
        let site = Node::from(Site::new(100, 10, "S1", "Site One"));
        let plant = Node::from(Plant::new(1000, 100, "PL1", "Plant One"));

        let path = build_path([Some(&project), Some(&client), Some(&site), Some(&plant)]);
        assert_eq!(path, "P1 / C1 / S1 / PL1");
    }

    #[test]
    fn nothing_selected_yields_placeholder() {
        assert_eq!(build_path([None, None, None, None]), "Select Project");
    }

    #[test]
    fn custom_style() {
        let project = Node::from(Project::new(1, "P1", "Project One"));
        let style = PathStyle {
            separator: "/".to_string(),
            placeholder: "-".to_string(),
        };

        assert_eq!(style.render([Some(&project), None]), "P1");
        assert_eq!(style.render([None, None]), "-");
    }
}

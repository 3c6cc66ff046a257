//! Element paths such as `Root/System/Felder/Feld[0]/Laenge`.

use serde::{Deserialize, Serialize};

use super::tree::Element;

/// One path step: a tag name and which same-named sibling to take
#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: &'static str,
    index: usize,
}

/// Path from the document root element down to a nested element.
///
/// ```rust
/// use opening_core::template::ElementPath;
///
/// let path = ElementPath::root("Root").child("System").nth("Feld", 1);
/// assert_eq!(path.to_string(), "Root/System/Feld[1]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    steps: Vec<Step>,
}

/// A path segment that does not exist in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMissing {
    /// The full path that was looked up
    pub path: String,
    /// The prefix of the path up to and including the first missing step
    pub missing: String,
}

impl std::fmt::Display for PathMissing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' not found while resolving '{}'", self.missing, self.path)
    }
}

impl ElementPath {
    /// Path starting at the document element
    pub fn root(name: &'static str) -> Self {
        ElementPath {
            steps: vec![Step { name, index: 0 }],
        }
    }

    /// Descend into the first child named `name`
    pub fn child(self, name: &'static str) -> Self {
        self.nth(name, 0)
    }

    /// Descend into the `index`-th child named `name`
    pub fn nth(mut self, name: &'static str, index: usize) -> Self {
        self.steps.push(Step { name, index });
        self
    }

    fn prefix(&self, len: usize) -> String {
        self.steps[..len]
            .iter()
            .map(|step| {
                if step.index == 0 {
                    step.name.to_string()
                } else {
                    format!("{}[{}]", step.name, step.index)
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn missing_at(&self, step: usize) -> PathMissing {
        PathMissing {
            path: self.to_string(),
            missing: self.prefix(step + 1),
        }
    }

    /// Resolve against the document element
    pub fn resolve<'a>(&self, root: Option<&'a Element>) -> Result<&'a Element, PathMissing> {
        let mut current = match root {
            Some(el) if el.name() == self.steps[0].name => el,
            _ => return Err(self.missing_at(0)),
        };
        for (i, step) in self.steps.iter().enumerate().skip(1) {
            current = current
                .nth_element(step.name, step.index)
                .ok_or_else(|| self.missing_at(i))?;
        }
        Ok(current)
    }

    /// Mutable variant of [`ElementPath::resolve`]
    pub fn resolve_mut<'a>(&self, root: Option<&'a mut Element>) -> Result<&'a mut Element, PathMissing> {
        let mut current = match root {
            Some(el) if el.name() == self.steps[0].name => el,
            _ => return Err(self.missing_at(0)),
        };
        for (i, step) in self.steps.iter().enumerate().skip(1) {
            current = current
                .nth_element_mut(step.name, step.index)
                .ok_or_else(|| self.missing_at(i))?;
        }
        Ok(current)
    }
}

impl std::fmt::Display for ElementPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix(self.steps.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::tree::{parse, Node};

    fn document_element(nodes: &[Node]) -> Option<&Element> {
        nodes.iter().find_map(|n| match n {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    #[test]
    fn test_display_uses_index_only_when_needed() {
        let path = ElementPath::root("Root").child("System").nth("Feld", 0).child("Laenge");
        assert_eq!(path.to_string(), "Root/System/Feld/Laenge");
    }

    #[test]
    fn test_resolve_nth_sibling() {
        let nodes = parse("<Root><F>a</F><F>b</F></Root>").unwrap();
        let path = ElementPath::root("Root").nth("F", 1);
        assert_eq!(path.resolve(document_element(&nodes)).unwrap().text(), "b");
    }

    #[test]
    fn test_missing_segment_is_reported() {
        let nodes = parse("<Root><System/></Root>").unwrap();
        let path = ElementPath::root("Root").child("System").child("Felder").child("Feld");
        let missing = path.resolve(document_element(&nodes)).unwrap_err();
        assert_eq!(missing.missing, "Root/System/Felder");
        assert_eq!(missing.path, "Root/System/Felder/Feld");

        let wrong_root = ElementPath::root("Frilo").resolve(document_element(&nodes)).unwrap_err();
        assert_eq!(wrong_root.missing, "Frilo");
    }
}

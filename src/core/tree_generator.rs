//! Generates an ASCII representation of a directory tree.

/// One line of the rendered tree and the nodes nested below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderNode {
    pub label: String,
    pub is_directory: bool,
    /// Short annotations printed after the label, e.g. `UTF-8`.
    pub badges: Vec<String>,
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn file(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn folder(label: impl Into<String>, children: Vec<RenderNode>) -> Self {
        Self {
            label: label.into(),
            is_directory: true,
            badges: Vec::new(),
            children,
        }
    }

    pub fn with_badges(mut self, badges: Vec<String>) -> Self {
        self.badges = badges;
        self
    }
}

/// A utility struct for generating an ASCII directory tree.
///
/// This struct is stateless and provides methods as associated functions.
/// Nodes are rendered in the order given; callers sort them beforehand.
pub struct TreeGenerator;

impl TreeGenerator {
    /// Renders `roots` and everything below them, one node per line.
    pub fn generate_tree(roots: &[RenderNode]) -> String {
        let mut result = String::new();
        Self::render_children(roots, &mut result, "");
        result
    }

    fn render_children(children: &[RenderNode], result: &mut String, prefix: &str) {
        for (i, node) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;

            let connector = if is_last { "└── " } else { "├── " };
            let icon = if node.is_directory { "📁 " } else { "📄 " };

            result.push_str(&format!("{prefix}{connector}{icon}{}", node.label));
            for badge in &node.badges {
                result.push_str(&format!(" [{badge}]"));
            }
            result.push('\n');

            if !node.children.is_empty() {
                let new_prefix = if is_last {
                    format!("{prefix}    ")
                } else {
                    format!("{prefix}│   ")
                };
                Self::render_children(&node.children, result, &new_prefix);
            }
        }
    }
}

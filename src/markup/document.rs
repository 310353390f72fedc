use serde::Serialize;

/// A node produced by a markup filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Node {
    Text(String),
    Link { text: String, href: String },
    Image { src: String, alt: Option<String> },
}

/// Flat document tree of text, links and images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(super) fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.nodes.last_mut() {
            last.push_str(text);
        } else {
            self.nodes.push(Node::Text(text.to_string()));
        }
    }

    pub(super) fn push(&mut self, node: Node) {
        match node {
            Node::Text(text) => self.push_text(&text),
            other => self.nodes.push(other),
        }
    }

    /// `(text, href)` of every link, in document order.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Link { text, href } => Some((text.as_str(), href.as_str())),
            _ => None,
        })
    }

    /// `src` of every image, in document order.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Image { src, .. } => Some(src.as_str()),
            _ => None,
        })
    }

    pub fn to_html(&self) -> String {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Text(text) => escape(text),
                Node::Link { text, href } => {
                    format!(r#"<a href="{}" class="gfm">{}</a>"#, escape(href), escape(text))
                }
                Node::Image { src, alt } => match alt {
                    Some(alt) => format!(
                        r#"<img src="{}" alt="{}" class="gfm">"#,
                        escape(src),
                        escape(alt)
                    ),
                    None => format!(r#"<img src="{}" class="gfm">"#, escape(src)),
                },
            })
            .collect()
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

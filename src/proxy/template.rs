// ABOUTME: Minimal template language for proxy config blocks.
// ABOUTME: `{{var}}` substitution and `{{#if var}}...{{else}}...{{/if}}` sections.

use std::collections::BTreeMap;

/// Values available to a template. A flag is true when its value is
/// non-empty and not `false`.
#[derive(Debug, Clone, Default)]
pub struct Vars(BTreeMap<String, String>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn flag(mut self, key: &str, on: bool) -> Self {
        self.0
            .insert(key.to_string(), if on { "true" } else { "" }.to_string());
        self
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty() && v != "false")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Var(String),
    If {
        name: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag<'a> {
    Var(&'a str),
    If(&'a str),
    Else,
    EndIf,
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut rest = source;
        let (nodes, end) = parse_nodes(&mut rest)?;
        match end {
            None => Ok(Self { nodes }),
            Some(Tag::Else) => Err("{{else}} outside of {{#if}}".to_string()),
            Some(_) => Err("{{/if}} without matching {{#if}}".to_string()),
        }
    }

    /// Render with `vars`. Unknown variables are errors so typos surface.
    pub fn render(&self, vars: &Vars) -> Result<String, String> {
        let mut out = String::new();
        render_nodes(&self.nodes, vars, &mut out)?;
        Ok(out)
    }
}

/// Parse until the end of input or a closing tag, which is returned.
fn parse_nodes<'a>(rest: &mut &'a str) -> Result<(Vec<Node>, Option<Tag<'a>>), String> {
    let mut nodes = Vec::new();
    loop {
        let Some(start) = rest.find("{{") else {
            if !rest.is_empty() {
                nodes.push(Node::Text(rest.to_string()));
            }
            *rest = "";
            return Ok((nodes, None));
        };
        if start > 0 {
            nodes.push(Node::Text(rest[..start].to_string()));
        }

        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| "unterminated {{ tag".to_string())?;
        let tag = parse_tag(after[..end].trim())?;
        *rest = &after[end + 2..];

        match tag {
            Tag::Var(name) => nodes.push(Node::Var(name.to_string())),
            Tag::If(name) => {
                let (then, closing) = parse_nodes(rest)?;
                let otherwise = match closing {
                    Some(Tag::EndIf) => Vec::new(),
                    Some(Tag::Else) => match parse_nodes(rest)? {
                        (otherwise, Some(Tag::EndIf)) => otherwise,
                        _ => return Err(format!("missing {{{{/if}}}} for {}", name)),
                    },
                    _ => return Err(format!("missing {{{{/if}}}} for {}", name)),
                };
                nodes.push(Node::If {
                    name: name.to_string(),
                    then,
                    otherwise,
                });
            }
            closing @ (Tag::Else | Tag::EndIf) => return Ok((nodes, Some(closing))),
        }
    }
}

fn parse_tag(inner: &str) -> Result<Tag<'_>, String> {
    let valid = |name: &str| {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    };

    if let Some(name) = inner.strip_prefix("#if") {
        let name = name.trim();
        return if valid(name) {
            Ok(Tag::If(name))
        } else {
            Err(format!("invalid condition: {}", inner))
        };
    }
    match inner {
        "else" => Ok(Tag::Else),
        "/if" => Ok(Tag::EndIf),
        name if valid(name) => Ok(Tag::Var(name)),
        _ => Err(format!("invalid tag: {{{{{}}}}}", inner)),
    }
}

fn render_nodes(nodes: &[Node], vars: &Vars, out: &mut String) -> Result<(), String> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(name) => {
                let value = vars
                    .get(name)
                    .ok_or_else(|| format!("unknown variable: {}", name))?;
                out.push_str(value);
            }
            Node::If {
                name,
                then,
                otherwise,
            } => {
                let branch = if vars.truthy(name) { then } else { otherwise };
                render_nodes(branch, vars, out)?;
            }
        }
    }
    Ok(())
}

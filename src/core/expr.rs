//! GI-003: Deferred references.
//!
//! An `Expr` is a value Terraform resolves at apply time: a variable, an
//! attribute of another declaration, a function call over those, or a
//! concatenation with literals. There is no evaluator here; an
//! `Expr` can only be rendered to Terraform interpolation syntax or asked
//! which declarations and variables it reads.

use super::schema::Address;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Plain string, escaped on render.
    Lit(String),
    /// `var.<name>`
    Var(String),
    /// `<address>.<path>`, e.g. `data.google_cloud_run_service.x.status[0].url`
    Attr { address: Address, path: String },
    /// `<function>(<args>)`
    Call {
        function: &'static str,
        args: Vec<Expr>,
    },
    /// String template joining the parts.
    Concat(Vec<Expr>),
}

impl Expr {
    pub fn lit(s: impl Into<String>) -> Self {
        Self::Lit(s.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn attr(address: &Address, path: impl Into<String>) -> Self {
        Self::Attr {
            address: address.clone(),
            path: path.into(),
        }
    }

    pub fn call(function: &'static str, args: Vec<Expr>) -> Self {
        Self::Call { function, args }
    }

    /// Concatenate, merging adjacent literals.
    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        let mut merged: Vec<Expr> = Vec::new();
        for part in parts {
            let part = match part {
                Self::Concat(inner) => {
                    for p in inner {
                        push_merged(&mut merged, p);
                    }
                    continue;
                }
                other => other,
            };
            push_merged(&mut merged, part);
        }
        match merged.len() {
            0 => Self::Lit(String::new()),
            1 if matches!(merged[0], Self::Lit(_)) => merged.remove(0),
            _ => Self::Concat(merged),
        }
    }

    /// True when the value is fully known at declaration time.
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Lit(_))
    }

    /// Render as a Terraform JSON string value.
    pub fn to_terraform(&self) -> String {
        match self {
            Self::Lit(s) => escape_template(s),
            Self::Concat(parts) => parts
                .iter()
                .map(|p| match p {
                    Self::Lit(s) => escape_template(s),
                    other => format!("${{{}}}", other.hcl()),
                })
                .collect(),
            other => format!("${{{}}}", other.hcl()),
        }
    }

    /// Render as a bare HCL expression (no surrounding `${}`).
    fn hcl(&self) -> String {
        match self {
            Self::Lit(s) => format!("\"{}\"", escape_quoted(s)),
            Self::Var(name) => format!("var.{}", name),
            Self::Attr { address, path } => format!("{}.{}", address, path),
            Self::Call { function, args } => format!(
                "{}({})",
                function,
                args.iter().map(Expr::hcl).collect::<Vec<_>>().join(", ")
            ),
            Self::Concat(parts) => {
                let body: String = parts
                    .iter()
                    .map(|p| match p {
                        Self::Lit(s) => escape_quoted(s),
                        other => format!("${{{}}}", other.hcl()),
                    })
                    .collect();
                format!("\"{}\"", body)
            }
        }
    }

    /// Declarations whose attributes this expression reads.
    pub fn references(&self) -> Vec<Address> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Self::Attr { address, .. } = e {
                if !out.contains(address) {
                    out.push(address.clone());
                }
            }
        });
        out
    }

    /// Variables this expression reads.
    pub fn variables(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        self.walk(&mut |e| {
            if let Self::Var(name) = e {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        });
        out
    }

    fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Self::Call { args: children, .. } | Self::Concat(children) => {
                for child in children {
                    child.walk(f);
                }
            }
            _ => {}
        }
    }
}

fn push_merged(merged: &mut Vec<Expr>, part: Expr) {
    if let Expr::Lit(s) = &part {
        if s.is_empty() {
            return;
        }
        if let Some(Expr::Lit(prev)) = merged.last_mut() {
            prev.push_str(s);
            return;
        }
    }
    merged.push(part);
}

/// Escape template sequences so literals are never interpolated.
fn escape_template(s: &str) -> String {
    s.replace("${", "$${").replace("%{", "%%{")
}

fn escape_quoted(s: &str) -> String {
    escape_template(
        &s.replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n"),
    )
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::Lit(s.to_string())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Self::Lit(s)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_terraform())
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_terraform())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ResourceKind;

    fn data_addr() -> Address {
        Address::new(ResourceKind::CloudRunServiceData, "peer")
    }

    #[test]
    fn test_gi003_literal_renders_plain() {
        assert_eq!(Expr::lit("europe-west1").to_terraform(), "europe-west1");
    }

    #[test]
    fn test_gi003_literal_escapes_interpolation() {
        assert_eq!(Expr::lit("a${b}").to_terraform(), "a$${b}");
        assert_eq!(Expr::lit("%{if}").to_terraform(), "%%{if}");
    }

    #[test]
    fn test_gi003_var_renders_interpolation() {
        assert_eq!(Expr::var("git-hash").to_terraform(), "${var.git-hash}");
    }

    #[test]
    fn test_gi003_call_renders_nested() {
        let e = Expr::call("base64decode", vec![Expr::var("creds")]);
        assert_eq!(e.to_terraform(), "${base64decode(var.creds)}");
    }

    #[test]
    fn test_gi003_call_with_literal_arg_is_quoted() {
        let e = Expr::call(
            "regex",
            vec![Expr::lit("^a\"b"), Expr::attr(&data_addr(), "status[0].url")],
        );
        assert_eq!(
            e.to_terraform(),
            r#"${regex("^a\"b", data.google_cloud_run_service.peer.status[0].url)}"#
        );
    }

    #[test]
    fn test_gi003_concat_mixes_literals_and_refs() {
        let e = Expr::concat([
            Expr::lit("europe-west1-docker.pkg.dev/"),
            Expr::var("google-project"),
            Expr::lit("/go-services/app:"),
            Expr::var("git-hash"),
        ]);
        assert_eq!(
            e.to_terraform(),
            "europe-west1-docker.pkg.dev/${var.google-project}/go-services/app:${var.git-hash}"
        );
    }

    #[test]
    fn test_gi003_concat_merges_literals() {
        let e = Expr::concat([Expr::lit("a"), Expr::lit(""), Expr::lit("b")]);
        assert_eq!(e, Expr::lit("ab"));
        assert!(e.is_literal());

        let nested = Expr::concat([
            Expr::concat([Expr::lit("x/"), Expr::var("v")]),
            Expr::lit("/y"),
        ]);
        assert_eq!(
            nested,
            Expr::Concat(vec![Expr::lit("x/"), Expr::var("v"), Expr::lit("/y")])
        );
    }

    #[test]
    fn test_gi003_concat_inside_call_is_quoted_template() {
        let e = Expr::call(
            "tostring",
            vec![Expr::concat([Expr::lit("p-"), Expr::var("v")])],
        );
        assert_eq!(e.to_terraform(), r#"${tostring("p-${var.v}")}"#);
    }

    #[test]
    fn test_gi003_references_and_variables() {
        let e = Expr::call(
            "one",
            vec![Expr::call(
                "regex",
                vec![
                    Expr::lit("x"),
                    Expr::attr(&data_addr(), "status[0].url"),
                    Expr::var("a"),
                    Expr::var("a"),
                ],
            )],
        );
        assert_eq!(e.references(), vec![data_addr()]);
        assert_eq!(e.variables(), vec!["a".to_string()]);
        assert!(Expr::lit("x").references().is_empty());
        assert!(!e.is_literal());
    }

    #[test]
    fn test_gi003_serialize_as_string() {
        let json = serde_json::to_string(&Expr::var("x")).unwrap();
        assert_eq!(json, r#""${var.x}""#);
    }
}

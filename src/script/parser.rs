//! Action script syntax: one `target = expression` statement per line.

use crate::error::{ConfigError, ScriptError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    /// `"text"`
    StringLiteral(String),
    /// `42`
    IntLiteral(i64),
    /// `user.address.city`, `lines.0.qty`
    PropertyRef(String),
    /// `new User`
    NewInstance(String),
    /// `new User[3]`
    NewArray { type_name: String, size: usize },
    /// `user.find(id)`, `user.list()`
    MethodCall {
        model: String,
        method: String,
        arg: Option<String>,
    },
}

impl Expression {
    pub fn parse(text: &str) -> Result<Expression, ScriptError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ScriptError::Syntax("empty expression".into()));
        }
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return Ok(Expression::StringLiteral(text[1..text.len() - 1].to_string()));
        }
        if text.bytes().all(|b| b.is_ascii_digit()) {
            return text
                .parse()
                .map(Expression::IntLiteral)
                .map_err(|_| ScriptError::Syntax(text.to_string()));
        }
        if text.contains('(') && text.ends_with(')') {
            return parse_call(text);
        }
        if let Some(rest) = text.strip_prefix("new ") {
            return parse_new(rest.trim(), text);
        }
        Ok(Expression::PropertyRef(text.to_string()))
    }
}

fn parse_call(text: &str) -> Result<Expression, ScriptError> {
    let open = text.find('(').ok_or_else(|| ScriptError::Syntax(text.to_string()))?;
    let head = &text[..open];
    let Some((model, method)) = head.split_once('.') else {
        return Err(ScriptError::Syntax(text.to_string()));
    };
    let (model, method) = (model.trim(), method.trim());
    if model.is_empty() || method.is_empty() {
        return Err(ScriptError::Syntax(text.to_string()));
    }
    let arg = text[open + 1..text.len() - 1].trim();
    Ok(Expression::MethodCall {
        model: model.to_string(),
        method: method.to_string(),
        arg: (!arg.is_empty()).then(|| arg.to_string()),
    })
}

fn parse_new(rest: &str, text: &str) -> Result<Expression, ScriptError> {
    if rest.is_empty() {
        return Err(ScriptError::Syntax(text.to_string()));
    }
    match (rest.find('['), rest.strip_suffix(']')) {
        (Some(open), Some(inner)) => {
            let size = inner[open + 1..]
                .trim()
                .parse()
                .map_err(|_| ScriptError::Syntax(text.to_string()))?;
            Ok(Expression::NewArray {
                type_name: rest[..open].trim().to_string(),
                size,
            })
        }
        _ => Ok(Expression::NewInstance(rest.to_string())),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    pub target: String,
    pub expression: Expression,
    /// 1-based source line.
    pub line: usize,
}

/// Parsed statements for one (route, verb) pair, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionScript {
    pub key: String,
    pub statements: Vec<Statement>,
}

/// Byte offsets of `=` characters outside double-quoted text.
fn assignment_positions(line: &str) -> Vec<usize> {
    let mut quoted = false;
    line.char_indices()
        .filter_map(|(i, c)| match c {
            '"' => {
                quoted = !quoted;
                None
            }
            '=' if !quoted => Some(i),
            _ => None,
        })
        .collect()
}

impl ActionScript {
    /// Parse script source. Every line must hold exactly one assignment; anything else,
    /// blank lines included, is rejected with its line number.
    pub fn parse(key: &str, source: &str) -> Result<ActionScript, ScriptError> {
        let malformed = |line: usize, reason: &str| ConfigError::Malformed {
            file: key.to_string(),
            line,
            reason: reason.to_string(),
        };
        let mut statements = Vec::new();
        for (i, raw) in source.lines().enumerate() {
            let line = i + 1;
            let positions = assignment_positions(raw);
            let &[eq] = positions.as_slice() else {
                return Err(malformed(line, "expected exactly one '=' outside quotes").into());
            };
            let target = raw[..eq].trim();
            if target.is_empty() {
                return Err(malformed(line, "missing assignment target").into());
            }
            let expression = Expression::parse(&raw[eq + 1..])?;
            statements.push(Statement {
                target: target.to_string(),
                expression,
                line,
            });
        }
        Ok(ActionScript {
            key: key.to_string(),
            statements,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

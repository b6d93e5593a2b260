use core::fmt;
use std::collections::HashMap;

use crate::eval::template::Template;
use crate::eval::value::Value;

/// Entry state every flow must declare.
pub const ENTRY_STATE: &str = "start";
/// State used when a fallthrough finds no better target.
pub const FALLBACK_STATE: &str = "fallback";
/// Conventional terminal state.
pub const TERMINAL_STATE: &str = "end";

// Root AST Definition
/// A parsed flow. Immutable once built; states are addressed by index so cyclic
/// `goto` graphs need no pointers.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDocument {
    pub name: String,
    pub states: Vec<State>,
    index: HashMap<String, usize>,
    goto_targets: Vec<String>,
}

impl FlowDocument {
    pub fn new(name: impl Into<String>, states: Vec<State>) -> Self {
        let index = states
            .iter()
            .enumerate()
            .map(|(i, state)| (state.name.clone(), i))
            .collect();

        let mut goto_targets = Vec::new();
        for state in &states {
            collect_goto_targets(&state.statements, &mut goto_targets);
        }
        goto_targets.sort();
        goto_targets.dedup();

        Self {
            name: name.into(),
            states,
            index,
            goto_targets,
        }
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names used as a `goto` target anywhere in the document, sorted.
    pub fn goto_targets(&self) -> &[String] {
        &self.goto_targets
    }
}

fn collect_goto_targets(statements: &[Statement], out: &mut Vec<String>) {
    for statement in statements {
        match statement {
            Statement::Goto(target) => out.push(target.clone()),
            Statement::If {
                then_block,
                elifs,
                else_block,
                ..
            } => {
                collect_goto_targets(then_block, out);
                for elif in elifs {
                    collect_goto_targets(&elif.block, out);
                }
                if let Some(block) = else_block {
                    collect_goto_targets(block, out);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: String,
    pub statements: Vec<Statement>,
}

impl State {
    /// A state is terminal when it is the conventional `end` state or when it can
    /// neither jump nor wait for input.
    pub fn is_terminal(&self) -> bool {
        self.name == TERMINAL_STATE || !continues(&self.statements)
    }
}

fn continues(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Goto(_) | Statement::Ask { .. } => true,
        Statement::If {
            then_block,
            elifs,
            else_block,
            ..
        } => {
            continues(then_block)
                || elifs.iter().any(|elif| continues(&elif.block))
                || else_block.as_deref().is_some_and(continues)
        }
        _ => false,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Load {
        path: String,
        var: String,
    },
    Save {
        var: String,
        path: String,
    },
    Reply(Template),
    Ask {
        var: String,
        prompt: Template,
    },
    Set {
        var: String,
        value: Expression,
    },
    If {
        condition: Expression,
        then_block: Vec<Statement>,
        elifs: Vec<ConditionalBlock>,
        else_block: Option<Vec<Statement>>,
    },
    Goto(String),
    Comment(String),
}

impl Statement {
    /// Branch `k` of a conditional: 0 is `then`, `1..=elifs.len()` the elifs, and
    /// `elifs.len() + 1` the else block.
    pub fn branch(&self, k: usize) -> Option<&[Statement]> {
        match self {
            Statement::If {
                then_block,
                elifs,
                else_block,
                ..
            } => {
                if k == 0 {
                    Some(then_block.as_slice())
                } else if k <= elifs.len() {
                    Some(elifs[k - 1].block.as_slice())
                } else if k == elifs.len() + 1 {
                    else_block.as_deref()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Load { .. } => "load",
            Statement::Save { .. } => "save",
            Statement::Reply(_) => "reply",
            Statement::Ask { .. } => "ask",
            Statement::Set { .. } => "set",
            Statement::If { .. } => "if",
            Statement::Goto(_) => "goto",
            Statement::Comment(_) => "comment",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBlock {
    pub condition: Expression,
    pub block: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Variable(String),
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        function: String,
        arguments: Vec<Expression>,
    },
    Pipe {
        expr: Box<Expression>,
        filters: Vec<Filter>,
    },
}

/// One pipe stage: `| name` or `| name:arg,arg`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    And,
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Not => write!(f, "not"),
            UnaryOperator::Minus => write!(f, "-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goto(target: &str) -> Statement {
        Statement::Goto(target.to_string())
    }

    #[test]
    fn test_document_index_and_targets() {
        let doc = FlowDocument::new(
            "demo",
            vec![
                State {
                    name: "start".to_string(),
                    statements: vec![Statement::If {
                        condition: Expression::Literal(Value::Bool(true)),
                        then_block: vec![goto("menu")],
                        elifs: vec![],
                        else_block: Some(vec![goto("end")]),
                    }],
                },
                State {
                    name: "menu".to_string(),
                    statements: vec![goto("end"), goto("menu")],
                },
                State {
                    name: "end".to_string(),
                    statements: vec![],
                },
            ],
        );

        assert_eq!(doc.state_index("menu"), Some(1));
        assert!(doc.has_state("end"));
        assert!(doc.state("missing").is_none());
        assert_eq!(doc.goto_targets(), &["end".to_string(), "menu".to_string()]);
    }

    #[test]
    fn test_terminal_states() {
        let reply_only = State {
            name: "bye".to_string(),
            statements: vec![Statement::Comment("done".to_string())],
        };
        assert!(reply_only.is_terminal());

        let nested_goto = State {
            name: "route".to_string(),
            statements: vec![Statement::If {
                condition: Expression::Variable("x".to_string()),
                then_block: vec![],
                elifs: vec![ConditionalBlock {
                    condition: Expression::Variable("y".to_string()),
                    block: vec![goto("route")],
                }],
                else_block: None,
            }],
        };
        assert!(!nested_goto.is_terminal());

        let end = State {
            name: "end".to_string(),
            statements: vec![goto("start")],
        };
        assert!(end.is_terminal());
    }

    #[test]
    fn test_branch_selection() {
        let statement = Statement::If {
            condition: Expression::Literal(Value::Null),
            then_block: vec![goto("a")],
            elifs: vec![ConditionalBlock {
                condition: Expression::Literal(Value::Null),
                block: vec![goto("b")],
            }],
            else_block: None,
        };
        assert_eq!(statement.branch(1), Some(&[goto("b")][..]));
        assert_eq!(statement.branch(2), None);
        assert_eq!(goto("a").branch(0), None);
    }
}

//! Predicate and value expressions carried through the bridge.
//!
//! Filters attached to match steps are stored here verbatim so that they can be
//! restored onto the produced operators. Join conditions and the path
//! reassembly projection reference row fields through [`Variable`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Literal values appearing in predicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer value.
    Int(i64),
    /// 64-bit floating point value.
    Float(f64),
    /// String value.
    String(String),
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// Binary comparison operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Reference to a field of an operator's output row.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Variable {
    /// Alias bound to the field.
    pub alias: String,
    /// Position of the field within the row the expression is evaluated on.
    pub index: usize,
}

impl Variable {
    /// Creates a field reference.
    pub fn new(alias: impl Into<String>, index: usize) -> Self {
        Self {
            alias: alias.into(),
            index,
        }
    }

    /// Returns the same field shifted right by `offset` positions.
    pub fn shifted(&self, offset: usize) -> Self {
        Self {
            alias: self.alias.clone(),
            index: self.index + offset,
        }
    }
}

/// Expression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Constant value.
    Literal {
        /// The literal.
        value: Literal,
    },
    /// Property of a bound graph element, e.g. `a.age`.
    Property {
        /// Alias of the element.
        var: String,
        /// Property name.
        key: String,
    },
    /// Whole field of the input row.
    Field {
        /// Field reference.
        var: Variable,
    },
    /// Binary comparison.
    Compare {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Membership in a literal list.
    In {
        /// Tested operand.
        expr: Box<Expr>,
        /// Candidate values.
        values: Vec<Literal>,
    },
    /// Null test.
    IsNull {
        /// Tested operand.
        expr: Box<Expr>,
    },
    /// Conjunction.
    And {
        /// Conjuncts.
        children: Vec<Expr>,
    },
    /// Disjunction.
    Or {
        /// Disjuncts.
        children: Vec<Expr>,
    },
    /// Negation.
    Not {
        /// Negated operand.
        expr: Box<Expr>,
    },
    /// Concatenation of path values, in order.
    PathConcat {
        /// Path segments.
        parts: Vec<Expr>,
    },
}

impl Expr {
    /// Literal expression.
    pub fn lit(value: impl Into<Literal>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    /// Property access on an alias.
    pub fn prop(var: impl Into<String>, key: impl Into<String>) -> Self {
        Expr::Property {
            var: var.into(),
            key: key.into(),
        }
    }

    /// Field reference.
    pub fn field(var: Variable) -> Self {
        Expr::Field { var }
    }

    /// Binary comparison.
    pub fn compare(op: CmpOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Equality between two row fields.
    pub fn fields_equal(left: Variable, right: Variable) -> Self {
        Expr::compare(CmpOp::Eq, Expr::field(left), Expr::field(right))
    }

    /// Path concatenation of two or more segments.
    pub fn path_concat(parts: Vec<Expr>) -> Self {
        Expr::PathConcat { parts }
    }

    /// Whether the expression is the literal `true`.
    pub fn is_always_true(&self) -> bool {
        matches!(
            self,
            Expr::Literal {
                value: Literal::Bool(true)
            }
        )
    }

    /// Splits nested conjunctions into their leaves. `true` contributes nothing.
    pub fn conjunctions(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        collect_conjunctions(self, &mut out);
        out
    }

    /// Composes a conjunction, flattening nested `AND`s and dropping duplicate
    /// conjuncts. Returns `None` when nothing remains.
    pub fn and_all<I>(exprs: I) -> Option<Expr>
    where
        I: IntoIterator<Item = Expr>,
    {
        let mut flat: Vec<Expr> = Vec::new();
        for expr in exprs {
            for conjunct in expr.conjunctions() {
                if !flat.contains(conjunct) {
                    flat.push(conjunct.clone());
                }
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::And { children: flat }),
        }
    }

    /// Whether every conjunct of `other` is also a conjunct of `self`.
    pub fn implies(&self, other: &Expr) -> bool {
        let mine = self.conjunctions();
        other
            .conjunctions()
            .into_iter()
            .all(|conjunct| mine.contains(&conjunct))
    }

    /// Aliases of all row fields referenced by the expression.
    pub fn referenced_fields(&self) -> Vec<&Variable> {
        let mut out = Vec::new();
        self.visit(&mut |expr| {
            if let Expr::Field { var } = expr {
                out.push(var);
            }
        });
        out
    }

    fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Literal { .. } | Expr::Property { .. } | Expr::Field { .. } => {}
            Expr::Compare { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::In { expr, .. } | Expr::IsNull { expr } | Expr::Not { expr } => expr.visit(f),
            Expr::And { children } | Expr::Or { children } => {
                for child in children {
                    child.visit(f);
                }
            }
            Expr::PathConcat { parts } => {
                for part in parts {
                    part.visit(f);
                }
            }
        }
    }
}

fn collect_conjunctions<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::And { children } => {
            for child in children {
                collect_conjunctions(child, out);
            }
        }
        other if other.is_always_true() => {}
        other => out.push(other),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => write!(f, "{value}"),
            Expr::Property { var, key } => write!(f, "{var}.{key}"),
            Expr::Field { var } => write!(f, "{}#{}", var.alias, var.index),
            Expr::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Expr::In { expr, values } => {
                let values = values
                    .iter()
                    .map(Literal::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{expr} IN [{values}]")
            }
            Expr::IsNull { expr } => write!(f, "{expr} IS NULL"),
            Expr::And { children } => write_joined(f, children, " AND "),
            Expr::Or { children } => write_joined(f, children, " OR "),
            Expr::Not { expr } => write!(f, "NOT ({expr})"),
            Expr::PathConcat { parts } => {
                write!(f, "concat(")?;
                for (idx, part) in parts.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Expr], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

use crate::core::Value;
use std::fmt;

/// Native predicate expression understood by the storage backend.
///
/// `Display` renders MySQL syntax with `?` for parameters, so a rendered
/// expression is a valid parameterized `WHERE` fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference
    Column(String),

    /// Literal value
    Literal(Value),

    /// Positional parameter, zero-based, bound in rendering order
    Parameter(usize),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    Not {
        expr: Box<Expr>,
    },

    /// LIKE pattern matching
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// IS [NOT] NULL check
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    /// Function call, name upper-cased
    Function {
        name: String,
        args: Vec<Expr>,
    },

    /// `CAST(expr AS JSON)`
    CastJson {
        expr: Box<Expr>,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Literal(Value::Text(value.into()))
    }

    pub fn null() -> Self {
        Self::Literal(Value::Null)
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Self {
        Self::Function {
            name: name.to_uppercase(),
            args,
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Self::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::And, other)
    }

    /// Highest parameter index referenced, plus one.
    pub fn parameter_count(&self) -> usize {
        match self {
            Expr::Parameter(idx) => idx + 1,
            Expr::Column(_) | Expr::Literal(_) => 0,
            Expr::BinaryOp { left, right, .. } => {
                left.parameter_count().max(right.parameter_count())
            }
            Expr::Not { expr } | Expr::IsNull { expr, .. } | Expr::CastJson { expr } => {
                expr.parameter_count()
            }
            Expr::Like { expr, pattern, .. } => {
                expr.parameter_count().max(pattern.parameter_count())
            }
            Expr::Function { args, .. } => {
                args.iter().map(Expr::parameter_count).max().unwrap_or(0)
            }
        }
    }

    /// Names every function the expression calls, nested calls included.
    pub fn functions(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_functions(&mut names);
        names
    }

    fn collect_functions<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Function { name, args } => {
                names.push(name);
                for arg in args {
                    arg.collect_functions(names);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_functions(names);
                right.collect_functions(names);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.collect_functions(names);
                pattern.collect_functions(names);
            }
            Expr::Not { expr } | Expr::IsNull { expr, .. } | Expr::CastJson { expr } => {
                expr.collect_functions(names)
            }
            Expr::Column(_) | Expr::Literal(_) | Expr::Parameter(_) => {}
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "`{}`", name.replace('`', "``")),
            Expr::Literal(Value::Text(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::Literal(Value::Json(j)) => write!(f, "'{}'", j.to_string().replace('\'', "''")),
            Expr::Literal(val) => write!(f, "{}", val),
            Expr::Parameter(_) => write!(f, "?"),
            Expr::BinaryOp { left, op, right } if op.is_logical() => {
                write_operand(f, left, *op)?;
                write!(f, " {} ", op)?;
                write_operand(f, right, *op)
            }
            Expr::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Not { expr } => write!(f, "NOT ({})", expr),
            Expr::Like { expr, pattern, negated } => {
                write!(f, "{} {}LIKE {}", expr, if *negated { "NOT " } else { "" }, pattern)
            }
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Function { name, args } => {
                let args_str: Vec<String> = args.iter().map(|e| e.to_string()).collect();
                write!(f, "{}({})", name, args_str.join(", "))
            }
            Expr::CastJson { expr } => write!(f, "CAST({} AS JSON)", expr),
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr, parent: BinaryOp) -> fmt::Result {
    match operand {
        Expr::BinaryOp { op, .. } if op.is_logical() && *op != parent => write!(f, "({})", operand),
        _ => write!(f, "{}", operand),
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Eq => write!(f, "="),
            BinaryOp::NotEq => write!(f, "<>"),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::LtEq => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::GtEq => write!(f, ">="),
            BinaryOp::And => write!(f, "AND"),
            BinaryOp::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_mysql_json_calls() {
        let expr = Expr::function(
            "json_contains",
            vec![
                Expr::column("FoodAdditives"),
                Expr::function("JSON_QUOTE", vec![Expr::Parameter(0)]),
                Expr::text("$"),
            ],
        );
        assert_eq!(
            expr.to_string(),
            "JSON_CONTAINS(`FoodAdditives`, JSON_QUOTE(?), '$')"
        );
        assert_eq!(expr.parameter_count(), 1);
        assert_eq!(expr.functions(), vec!["JSON_CONTAINS", "JSON_QUOTE"]);
    }

    #[test]
    fn mixed_logical_operators_are_parenthesized() {
        let a = Expr::binary(Expr::column("a"), BinaryOp::Eq, Expr::Parameter(0));
        let b = Expr::binary(Expr::column("b"), BinaryOp::Eq, Expr::Parameter(1));
        let c = Expr::binary(Expr::column("c"), BinaryOp::Eq, Expr::Parameter(2));
        let expr = Expr::binary(a, BinaryOp::Or, b).and(c);
        assert_eq!(expr.to_string(), "(`a` = ? OR `b` = ?) AND `c` = ?");
        assert_eq!(expr.parameter_count(), 3);
    }

    #[test]
    fn text_literals_are_escaped() {
        assert_eq!(Expr::text("it's").to_string(), "'it''s'");
        assert_eq!(Expr::null().to_string(), "NULL");
    }
}

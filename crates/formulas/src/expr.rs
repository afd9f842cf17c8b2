//! Expression tree interpreted by the evaluation engine.

use crate::functions::Function;
use recalc_primitives::{sanitize_sheet_name, CellValue};
use std::fmt;

/// Which sheet a column access reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SheetScope {
    /// The sheet owning the formula.
    Current,
    /// Another sheet, named explicitly in the formula.
    Named(String),
}

/// Access to one whole column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub scope: SheetScope,
    pub index: usize,
    pub name: String,
}

/// Access to a contiguous block of whole columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRef {
    pub scope: SheetScope,
    pub columns: Vec<usize>,
    pub names: Vec<String>,
}

/// Formula expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    Literal(CellValue),
    Column(ColumnRef),
    Range(RangeRef),
    Unary {
        op: UnaryOperator,
        expr: Box<FormulaExpr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    Call {
        function: Function,
        args: Vec<FormulaExpr>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Concat,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Power => "^",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Concat => "&",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}

impl FormulaExpr {
    /// Visit every node, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a FormulaExpr)) {
        visit(self);
        match self {
            Self::Literal(_) | Self::Column(_) | Self::Range(_) => {}
            Self::Unary { expr, .. } => expr.walk(visit),
            Self::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }

    /// Functions called anywhere in the tree, in first-seen order.
    pub fn functions(&self) -> Vec<Function> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let Self::Call { function, .. } = node {
                if !found.contains(function) {
                    found.push(*function);
                }
            }
        });
        found
    }

    /// True when row `i` of the result only reads row `i` of the owning
    /// sheet: no ranges, no other sheets, no whole-column functions.
    pub fn is_row_wise(&self) -> bool {
        let mut row_wise = true;
        self.walk(&mut |node| match node {
            Self::Range(_) => row_wise = false,
            Self::Column(column) if column.scope != SheetScope::Current => row_wise = false,
            Self::Call { function, .. } if !function.is_row_wise() => row_wise = false,
            _ => {}
        });
        row_wise
    }
}

fn write_scope(f: &mut fmt::Formatter<'_>, scope: &SheetScope) -> fmt::Result {
    match scope {
        SheetScope::Current => Ok(()),
        SheetScope::Named(sheet) => write!(f, "{}!", sanitize_sheet_name(sheet)),
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(CellValue::Text(s)) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Self::Literal(value) => write!(f, "{}", value),
            Self::Column(column) => {
                write_scope(f, &column.scope)?;
                write!(f, "[{}]", column.name)
            }
            Self::Range(range) => {
                write_scope(f, &range.scope)?;
                write!(f, "[{}]", range.names.join(":"))
            }
            Self::Unary {
                op: UnaryOperator::Negate,
                expr,
            } => write!(f, "-{}", expr),
            Self::Unary {
                op: UnaryOperator::Percent,
                expr,
            } => write!(f, "{}%", expr),
            Self::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Self::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

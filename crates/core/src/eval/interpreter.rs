use super::context::EvalContext;
use super::functions;
use super::value::{map_cells, Value};
use super::EvalError;
use recalc_formulas::{BinaryOperator, FormulaExpr, UnaryOperator};
use recalc_primitives::{CellValue, ErrorValue};
use std::cmp::Ordering;

/// Evaluate an expression tree over whole columns.
pub fn evaluate(expr: &FormulaExpr, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
    match expr {
        FormulaExpr::Literal(value) => Ok(Value::Scalar(value.clone())),
        FormulaExpr::Column(column) => ctx.column(column),
        FormulaExpr::Range(range) => ctx.range(range),
        FormulaExpr::Unary { op, expr } => {
            let value = evaluate(expr, ctx)?;
            Ok(map_cells(&[&value], |cells| eval_unary(*op, cells[0])))
        }
        FormulaExpr::Binary { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            Ok(map_cells(&[&left, &right], |cells| {
                eval_binary(*op, cells[0], cells[1])
            }))
        }
        FormulaExpr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(functions::call(*function, &args))
        }
    }
}

fn eval_unary(op: UnaryOperator, value: &CellValue) -> CellValue {
    let number = match value.as_number() {
        Ok(n) => n,
        Err(e) => return CellValue::Error(e),
    };
    match op {
        UnaryOperator::Negate => CellValue::number(-number),
        UnaryOperator::Percent => CellValue::number(number / 100.0),
    }
}

fn eval_binary(op: BinaryOperator, left: &CellValue, right: &CellValue) -> CellValue {
    if let CellValue::Error(e) = left {
        return CellValue::Error(*e);
    }
    if let CellValue::Error(e) = right {
        return CellValue::Error(*e);
    }

    match op {
        BinaryOperator::Add => numeric_op(left, right, |l, r| l + r),
        BinaryOperator::Subtract => numeric_op(left, right, |l, r| l - r),
        BinaryOperator::Multiply => numeric_op(left, right, |l, r| l * r),
        BinaryOperator::Divide => match numbers(left, right) {
            Ok((_, r)) if r == 0.0 => CellValue::Error(ErrorValue::Div0),
            Ok((l, r)) => CellValue::number(l / r),
            Err(e) => CellValue::Error(e),
        },
        BinaryOperator::Power => numeric_op(left, right, f64::powf),
        BinaryOperator::Concat => match (left.as_text(), right.as_text()) {
            (Ok(l), Ok(r)) => CellValue::Text(l + &r),
            (Err(e), _) | (_, Err(e)) => CellValue::Error(e),
        },
        BinaryOperator::Equal => compare(left, right, Ordering::is_eq),
        BinaryOperator::NotEqual => compare(left, right, Ordering::is_ne),
        BinaryOperator::LessThan => compare(left, right, Ordering::is_lt),
        BinaryOperator::LessThanOrEqual => compare(left, right, Ordering::is_le),
        BinaryOperator::GreaterThan => compare(left, right, Ordering::is_gt),
        BinaryOperator::GreaterThanOrEqual => compare(left, right, Ordering::is_ge),
    }
}

fn numbers(left: &CellValue, right: &CellValue) -> Result<(f64, f64), ErrorValue> {
    Ok((left.as_number()?, right.as_number()?))
}

fn numeric_op(left: &CellValue, right: &CellValue, op: fn(f64, f64) -> f64) -> CellValue {
    match numbers(left, right) {
        Ok((l, r)) => CellValue::number(op(l, r)),
        Err(e) => CellValue::Error(e),
    }
}

fn compare(left: &CellValue, right: &CellValue, test: fn(Ordering) -> bool) -> CellValue {
    left.compare(right)
        .map_or(CellValue::Error(ErrorValue::Value), |ordering| {
            CellValue::Bool(test(ordering))
        })
}

use recalc_primitives::CellValue;

static BLANK: CellValue = CellValue::Null;

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(CellValue),
    /// One value per row.
    Column(Vec<CellValue>),
    /// Whole columns read from a range, column-major.
    Table(Vec<Vec<CellValue>>),
    /// Computed two-dimensional array, row-major.
    Matrix(Vec<Vec<CellValue>>),
}

impl Value {
    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Scalar(_) => (1, 1),
            Self::Column(values) => (values.len(), 1),
            Self::Table(columns) => (columns.first().map_or(0, Vec::len), columns.len()),
            Self::Matrix(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
        }
    }

    pub fn is_two_dimensional(&self) -> bool {
        matches!(self, Self::Table(_) | Self::Matrix(_))
    }

    /// Cell at `(row, col)` without broadcasting.
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        match self {
            Self::Scalar(value) => (row == 0 && col == 0).then_some(value),
            Self::Column(values) => (col == 0).then(|| values.get(row)).flatten(),
            Self::Table(columns) => columns.get(col).and_then(|column| column.get(row)),
            Self::Matrix(rows) => rows.get(row).and_then(|cells| cells.get(col)),
        }
    }

    /// Cell at `(row, col)`, repeating along any axis of length one.
    /// Positions past the data read as blank.
    pub fn broadcast_cell(&self, row: usize, col: usize) -> &CellValue {
        let (rows, cols) = self.shape();
        let row = if rows == 1 { 0 } else { row };
        let col = if cols == 1 { 0 } else { col };
        self.cell(row, col).unwrap_or(&BLANK)
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> Vec<&CellValue> {
        let (rows, cols) = self.shape();
        match self {
            Self::Scalar(value) => vec![value],
            Self::Column(values) => values.iter().collect(),
            Self::Matrix(data) => data.iter().flatten().collect(),
            Self::Table(_) => (0..rows)
                .flat_map(|row| (0..cols).map(move |col| (row, col)))
                .filter_map(|(row, col)| self.cell(row, col))
                .collect(),
        }
    }

    /// One-dimensional view: a single column or a single row.
    pub fn vector(&self) -> Option<Vec<&CellValue>> {
        let (rows, cols) = self.shape();
        if cols == 1 {
            Some((0..rows).filter_map(|row| self.cell(row, 0)).collect())
        } else if rows == 1 {
            Some((0..cols).filter_map(|col| self.cell(0, col)).collect())
        } else {
            None
        }
    }

    /// Collapse each row of a two-dimensional value with `reduce`;
    /// scalars and columns are returned unchanged.
    #[must_use]
    pub fn reduce_rows(&self, reduce: impl Fn(&[&CellValue]) -> CellValue) -> Self {
        if !self.is_two_dimensional() {
            return self.clone();
        }
        let (rows, cols) = self.shape();
        Self::Column(
            (0..rows)
                .map(|row| {
                    let cells: Vec<&CellValue> =
                        (0..cols).filter_map(|col| self.cell(row, col)).collect();
                    reduce(&cells)
                })
                .collect(),
        )
    }
}

fn combine(dims: impl Iterator<Item = usize>) -> usize {
    dims.fold(1, |acc, dim| {
        if dim == 1 {
            acc
        } else if acc == 1 {
            dim
        } else {
            acc.max(dim)
        }
    })
}

/// Apply `f` elementwise across `args` with broadcasting.
///
/// All scalars give a scalar; any table or matrix operand gives a matrix;
/// otherwise the result is a column as long as the longest operand.
pub fn map_cells<F>(args: &[&Value], f: F) -> Value
where
    F: Fn(&[&CellValue]) -> CellValue,
{
    if args.iter().all(|arg| matches!(arg, Value::Scalar(_))) {
        let cells: Vec<&CellValue> = args.iter().map(|arg| arg.broadcast_cell(0, 0)).collect();
        return Value::Scalar(f(&cells));
    }

    let rows = combine(args.iter().map(|arg| arg.shape().0));
    let cols = combine(args.iter().map(|arg| arg.shape().1));
    let at = |row: usize, col: usize| {
        let cells: Vec<&CellValue> = args.iter().map(|arg| arg.broadcast_cell(row, col)).collect();
        f(&cells)
    };

    if args.iter().any(|arg| arg.is_two_dimensional()) {
        Value::Matrix(
            (0..rows)
                .map(|row| (0..cols).map(|col| at(row, col)).collect())
                .collect(),
        )
    } else {
        Value::Column((0..rows).map(|row| at(row, 0)).collect())
    }
}

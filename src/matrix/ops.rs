//! Matrix operations for multi-value calculations
//!
//! All operations take rectangular `f64` matrices and return owned
//! results. Operands must be non-empty; shape mismatches between
//! non-empty operands are resolved by the padding and repetition rules
//! of each operation rather than by errors. NaN is the sentinel for
//! undefined numeric results, so evaluation of a calculation batch
//! never aborts halfway.

use ndarray::Array2;
use std::collections::BTreeMap;

use crate::error::{CalcError, Result};

/// Reject zero-extent operands.
fn check_operand(m: &Array2<f64>, what: &str) -> Result<()> {
    if m.nrows() == 0 || m.ncols() == 0 {
        return Err(CalcError::InvalidArgument(format!(
            "{} operand must not be empty, got {}x{}",
            what,
            m.nrows(),
            m.ncols()
        )));
    }
    Ok(())
}

/// Fetch a cell, extending the matrix beyond its edge by repeating the
/// last row/column or by the operation's identity element.
fn padded_get(
    m: &Array2<f64>,
    row: usize,
    col: usize,
    repeat_rows: bool,
    repeat_cols: bool,
    identity: f64,
) -> f64 {
    let row = if row < m.nrows() {
        row
    } else if repeat_rows {
        m.nrows() - 1
    } else {
        return identity;
    };
    let col = if col < m.ncols() {
        col
    } else if repeat_cols {
        m.ncols() - 1
    } else {
        return identity;
    };
    m[[row, col]]
}

fn combine_padded(
    a: &Array2<f64>,
    b: &Array2<f64>,
    repeat_rows: bool,
    repeat_cols: bool,
    identity: f64,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Array2<f64>> {
    check_operand(a, "left")?;
    check_operand(b, "right")?;

    let rows = a.nrows().max(b.nrows());
    let cols = a.ncols().max(b.ncols());

    Ok(Array2::from_shape_fn((rows, cols), |(r, c)| {
        f(
            padded_get(a, r, c, repeat_rows, repeat_cols, identity),
            padded_get(b, r, c, repeat_rows, repeat_cols, identity),
        )
    }))
}

/// Element-wise sum over the union of both shapes.
///
/// The output is `max(rows) x max(cols)`. Cells one operand does not
/// cover are taken from its repeated last row/column when the
/// corresponding flag is set, and read as zero otherwise.
pub fn sum(
    a: &Array2<f64>,
    b: &Array2<f64>,
    repeat_rows: bool,
    repeat_cols: bool,
) -> Result<Array2<f64>> {
    combine_padded(a, b, repeat_rows, repeat_cols, 0.0, |x, y| x + y)
}

/// Element-wise product over the union of both shapes.
///
/// Same extension rules as [`sum`], with one as the identity for
/// cells outside an operand.
pub fn product(
    a: &Array2<f64>,
    b: &Array2<f64>,
    repeat_rows: bool,
    repeat_cols: bool,
) -> Result<Array2<f64>> {
    combine_padded(a, b, repeat_rows, repeat_cols, 1.0, |x, y| x * y)
}

/// Padded sum, no repetition: missing cells read as zero.
pub fn sum_padded(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    sum(a, b, false, false)
}

/// Padded sum repeating the last row of a shorter operand.
pub fn sum_repeat_rows(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    sum(a, b, true, false)
}

/// Padded sum repeating both the last row and the last column.
pub fn sum_repeat_all(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    sum(a, b, true, true)
}

/// Padded product, no repetition: missing cells read as one.
pub fn product_padded(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    product(a, b, false, false)
}

/// Padded product repeating the last row of a shorter operand.
pub fn product_repeat_rows(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    product(a, b, true, false)
}

/// Padded product repeating both the last row and the last column.
pub fn product_repeat_all(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    product(a, b, true, true)
}

/// Inner product of the first columns, as a 1x1 matrix.
///
/// The shorter column repeats its last value until both reach
/// `max(rows)`.
pub fn inner_product(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(a, "left")?;
    check_operand(b, "right")?;

    let len = a.nrows().max(b.nrows());
    let mut acc = 0.0;
    for i in 0..len {
        let x = a[[i.min(a.nrows() - 1), 0]];
        let y = b[[i.min(b.nrows() - 1), 0]];
        acc += x * y;
    }
    Ok(Array2::from_elem((1, 1), acc))
}

/// Outer product grid of the first columns: `out[i][j] = a_i * b_j`.
pub fn outer_product(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(a, "left")?;
    check_operand(b, "right")?;

    let m = a.nrows();
    let n = b.nrows();
    Ok(Array2::from_shape_fn((m, n), |(i, j)| {
        a[[i, 0]] * b[[j, 0]]
    }))
}

/// Outer product grid flattened column-major into a single column:
/// `out[j * m + i] = a_i * b_j`.
pub fn outer_product_flat(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(a, "left")?;
    check_operand(b, "right")?;

    let m = a.nrows();
    let n = b.nrows();
    let mut out = Array2::zeros((m * n, 1));
    for j in 0..n {
        for i in 0..m {
            out[[j * m + i, 0]] = a[[i, 0]] * b[[j, 0]];
        }
    }
    Ok(out)
}

/// Standard matrix multiplication.
///
/// An inner dimension mismatch yields a 1x1 NaN matrix instead of an
/// error, so a mis-shaped calculation degrades to the NaN sentinel.
pub fn mat_mul(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(a, "left")?;
    check_operand(b, "right")?;

    if a.ncols() != b.nrows() {
        return Ok(Array2::from_elem((1, 1), f64::NAN));
    }
    Ok(a.dot(b))
}

/// One-based column indices from the first column of an index operand.
///
/// Fractional indices truncate toward zero.
fn column_indices(idx: &Array2<f64>) -> Vec<i64> {
    (0..idx.nrows()).map(|i| idx[[i, 0]].trunc() as i64).collect()
}

/// Resolve a one-based index against a column count.
fn resolve_index(one_based: i64, ncols: usize) -> Option<usize> {
    if one_based >= 1 && (one_based as usize) <= ncols {
        Some(one_based as usize - 1)
    } else {
        None
    }
}

/// Gather columns of `data` named by the first column of `idx`,
/// placed side by side in selection order.
///
/// Indices are one-based; an out-of-range index fills that output
/// column with NaN.
pub fn select_columns(data: &Array2<f64>, idx: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(data, "data")?;
    check_operand(idx, "index")?;

    let indices = column_indices(idx);
    let m = data.nrows();
    Ok(Array2::from_shape_fn((m, indices.len()), |(r, j)| {
        match resolve_index(indices[j], data.ncols()) {
            Some(c) => data[[r, c]],
            None => f64::NAN,
        }
    }))
}

/// Gather columns of `data` stacked into one column, selection order
/// top to bottom.
///
/// An out-of-range index fills its segment of the output with NaN.
pub fn select_columns_stacked(data: &Array2<f64>, idx: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(data, "data")?;
    check_operand(idx, "index")?;

    let indices = column_indices(idx);
    let m = data.nrows();
    let mut out = Array2::zeros((m * indices.len(), 1));
    for (j, &index) in indices.iter().enumerate() {
        let col = resolve_index(index, data.ncols());
        for r in 0..m {
            out[[j * m + r, 0]] = match col {
                Some(c) => data[[r, c]],
                None => f64::NAN,
            };
        }
    }
    Ok(out)
}

/// Gather columns of `data` into a block-diagonal layout: selection
/// `j` occupies rows `j*m..(j+1)*m` of output column `j`, zeros
/// elsewhere.
pub fn select_columns_diagonal(data: &Array2<f64>, idx: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(data, "data")?;
    check_operand(idx, "index")?;

    let indices = column_indices(idx);
    let m = data.nrows();
    let k = indices.len();
    let mut out = Array2::zeros((m * k, k));
    for (j, &index) in indices.iter().enumerate() {
        let col = resolve_index(index, data.ncols());
        for r in 0..m {
            out[[j * m + r, j]] = match col {
                Some(c) => data[[r, c]],
                None => f64::NAN,
            };
        }
    }
    Ok(out)
}

/// Row groups keyed by truncated category value, ascending.
///
/// The category of data row `i` comes from the first column of
/// `cats`; a shorter category column repeats its last value.
fn group_rows(data: &Array2<f64>, cats: &Array2<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for row in 0..data.nrows() {
        let cat_row = row.min(cats.nrows() - 1);
        let cat = cats[[cat_row, 0]].trunc() as i64;
        groups.entry(cat).or_default().push(row);
    }
    groups
}

fn group_by(
    data: &Array2<f64>,
    cats: &Array2<f64>,
    aggregate: impl Fn(&[f64]) -> f64,
) -> Result<Array2<f64>> {
    check_operand(data, "data")?;
    check_operand(cats, "categories")?;

    let groups = group_rows(data, cats);
    let mut out = Array2::zeros((groups.len(), data.ncols()));
    for (g, rows) in groups.values().enumerate() {
        for c in 0..data.ncols() {
            let members: Vec<f64> = rows.iter().map(|&r| data[[r, c]]).collect();
            out[[g, c]] = aggregate(&members);
        }
    }
    Ok(out)
}

/// Per-category column sums, one output row per distinct category in
/// ascending category order.
pub fn group_by_sum(data: &Array2<f64>, cats: &Array2<f64>) -> Result<Array2<f64>> {
    group_by(data, cats, |members| members.iter().sum())
}

/// Per-category column averages.
pub fn group_by_average(data: &Array2<f64>, cats: &Array2<f64>) -> Result<Array2<f64>> {
    group_by(data, cats, |members| {
        members.iter().sum::<f64>() / members.len() as f64
    })
}

/// Per-category column minima. A NaN member makes the group NaN.
pub fn group_by_min(data: &Array2<f64>, cats: &Array2<f64>) -> Result<Array2<f64>> {
    group_by(data, cats, |members| {
        members.iter().fold(f64::INFINITY, |acc, &v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                acc.min(v)
            }
        })
    })
}

/// Per-category column maxima. A NaN member makes the group NaN.
pub fn group_by_max(data: &Array2<f64>, cats: &Array2<f64>) -> Result<Array2<f64>> {
    group_by(data, cats, |members| {
        members.iter().fold(f64::NEG_INFINITY, |acc, &v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                acc.max(v)
            }
        })
    })
}

/// Split an extremes call into its data operand and requested count.
///
/// The 1x1 operand carries the count regardless of which side it is
/// on; when both are 1x1, the right operand is the count.
fn extremes_operands<'a>(
    a: &'a Array2<f64>,
    b: &'a Array2<f64>,
) -> (&'a Array2<f64>, f64) {
    if b.nrows() == 1 && b.ncols() == 1 {
        (a, b[[0, 0]])
    } else if a.nrows() == 1 && a.ncols() == 1 {
        (b, a[[0, 0]])
    } else {
        (a, b[[0, 0]])
    }
}

fn extremes(
    a: &Array2<f64>,
    b: &Array2<f64>,
    compare: impl Fn(&(f64, usize, usize), &(f64, usize, usize)) -> std::cmp::Ordering,
) -> Result<Array2<f64>> {
    check_operand(a, "left")?;
    check_operand(b, "right")?;

    let (data, count) = extremes_operands(a, b);
    let n = (count.trunc() as i64).max(0) as usize;

    let mut cells: Vec<(f64, usize, usize)> = Vec::with_capacity(data.len());
    for r in 0..data.nrows() {
        for c in 0..data.ncols() {
            cells.push((data[[r, c]], r, c));
        }
    }
    cells.sort_by(compare);

    let mut out = Array2::from_elem((n, 3), f64::NAN);
    for (slot, &(value, r, c)) in cells.iter().take(n).enumerate() {
        out[[slot, 0]] = value;
        out[[slot, 1]] = (r + 1) as f64;
        out[[slot, 2]] = (c + 1) as f64;
    }
    Ok(out)
}

/// The `n` smallest cells of the data operand as `(value, row, col)`
/// triples, one-based positions, ties broken by row then column.
///
/// Asking for more cells than exist fills the remaining rows with
/// NaN triples.
pub fn extremes_min(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    extremes(a, b, |x, y| {
        x.0.total_cmp(&y.0)
            .then(x.1.cmp(&y.1))
            .then(x.2.cmp(&y.2))
    })
}

/// The `n` largest cells of the data operand, same layout as
/// [`extremes_min`].
pub fn extremes_max(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    extremes(a, b, |x, y| {
        y.0.total_cmp(&x.0)
            .then(x.1.cmp(&y.1))
            .then(x.2.cmp(&y.2))
    })
}

/// Matrix transpose.
pub fn transpose(a: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(a, "operand")?;
    Ok(a.t().to_owned())
}

/// Element-wise negation.
pub fn negate(a: &Array2<f64>) -> Result<Array2<f64>> {
    check_operand(a, "operand")?;
    Ok(a.mapv(|v| -v))
}

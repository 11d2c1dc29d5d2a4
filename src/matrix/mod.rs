//! Matrix algebra for multi-value calculations.

pub mod ops;

// Re-export the full operation catalog
pub use ops::{
    extremes_max, extremes_min, group_by_average, group_by_max, group_by_min, group_by_sum,
    inner_product, mat_mul, negate, outer_product, outer_product_flat, product, product_padded,
    product_repeat_all, product_repeat_rows, select_columns, select_columns_diagonal,
    select_columns_stacked, sum, sum_padded, sum_repeat_all, sum_repeat_rows, transpose,
};

//! Built-in sample dataset used when no file is uploaded and for PNG export.

use polars::prelude::*;

pub const SAMPLE_NAME: &str = "sample.csv";

/// Five categories, three numeric series.
pub fn sample_dataframe() -> PolarsResult<DataFrame> {
    df!(
        "Category" => ["A", "B", "C", "D", "E"],
        "Sales" => [120.0f64, 95.0, 143.0, 78.0, 110.0],
        "Profit" => [30.0f64, 18.0, 41.0, 9.0, 27.0],
        "Units" => [60i64, 48, 71, 35, 52],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataLoader;

    #[test]
    fn sample_has_category_then_numeric_series() {
        let df = sample_dataframe().unwrap();
        assert_eq!(
            DataLoader::get_columns(&df),
            vec!["Category", "Sales", "Profit", "Units"]
        );
        assert_eq!(DataLoader::get_numeric_columns(&df).len(), 3);
        assert_eq!(df.height(), 5);
    }
}

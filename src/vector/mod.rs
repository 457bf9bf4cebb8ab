pub mod knn;
pub mod metric;

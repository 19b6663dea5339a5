mod decode;
mod result_set;
mod row;

pub use decode::{build_result_set, presto_extract_value};
pub use result_set::ResultSet;
pub use row::CustomDbRow;

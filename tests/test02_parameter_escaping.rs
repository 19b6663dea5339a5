use chrono::NaiveDate;
use presto_adapter::prelude::*;

#[test]
fn escapes_scalar_values() {
    assert_eq!(escape(&RowValues::Text("O'Brien".into())).unwrap(), "'O''Brien'");
    assert_eq!(escape(&RowValues::Null).unwrap(), "NULL");
    assert_eq!(
        escape(&RowValues::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())).unwrap(),
        "DATE '2024-01-05'"
    );
    assert_eq!(escape(&RowValues::Int(-42)).unwrap(), "-42");
    assert_eq!(escape(&RowValues::Float(2.5)).unwrap(), "2.5");
}

#[test]
fn timestamps_are_truncated_to_millis() {
    let ts = NaiveDate::from_ymd_opt(2024, 1, 5)
        .unwrap()
        .and_hms_micro_opt(10, 11, 12, 345_678)
        .unwrap();
    assert_eq!(
        escape(&RowValues::Timestamp(ts)).unwrap(),
        "TIMESTAMP '2024-01-05 10:11:12.345'"
    );
}

#[test]
fn unescapable_values_are_rejected() {
    for value in [
        RowValues::Bool(true),
        RowValues::Blob(vec![1, 2]),
        RowValues::JSON(serde_json::json!({"a": 1})),
    ] {
        let err = escape(&value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameterType);
    }
}

#[test]
fn converter_renders_in_order() {
    let params = [
        RowValues::from("it's"),
        RowValues::from(7),
        RowValues::from(None::<i64>),
    ];
    let literals = convert_sql_params::<LiteralParams>(&params).unwrap();
    assert_eq!(literals.as_slice(), ["'it''s'", "7", "NULL"]);
}

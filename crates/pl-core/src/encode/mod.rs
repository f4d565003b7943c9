//! Row encoding for the build pipe.
//!
//! Each row becomes one `,`-separated, `\n`-terminated line. Per column:
//!
//! | value / category   | rendering                                        |
//! |--------------------|--------------------------------------------------|
//! | absent, no default | empty field                                      |
//! | absent, default    | default literal, verbatim                        |
//! | `String`           | `"..."` with `"` doubled                         |
//! | `Decimal`          | plain decimal text                               |
//! | `ArrayOfString`    | array literal, then quoted like a string         |
//! | `ArrayOfOther`     | array literal in `"` without escaping            |
//! | `Other`            | the value's text                                 |

pub mod literal;

use literal::{push_array_literal, push_quoted, QUOTE};
use pl_common::{ColumnLayout, ColumnType, Row, Value, FIELD_DELIMITER, LINE_END};
use std::fmt::Write as _;
use std::io::{self, BufWriter, Write};
use thiserror::Error;
use tracing::info;

/// Errors while encoding a partition.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("row {index}: {source}")]
    Row {
        index: u64,
        #[source]
        source: pl_common::Error,
    },

    #[error("failed writing rows after {rows} rows: {source}")]
    Io {
        rows: u64,
        #[source]
        source: io::Error,
    },
}

/// Encodes rows of one partition.
#[derive(Debug, Clone)]
pub struct RowEncoder {
    layout: ColumnLayout,
}

impl RowEncoder {
    pub fn new(layout: ColumnLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Append the encoded line for `row`, including the terminator.
    pub fn encode_into(&self, row: &Row, line: &mut String) -> pl_common::Result<()> {
        self.layout.check_row(row)?;
        let columns = self.layout.types().iter().zip(self.layout.defaults());
        for (i, (value, (ty, default))) in row.iter().zip(columns).enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER);
            }
            push_field(line, value, *ty, default.as_deref()).map_err(|found| {
                pl_common::Error::TypeMismatch {
                    column: self.layout.names()[i].clone(),
                    expected: *ty,
                    found,
                }
            })?;
        }
        line.push(LINE_END);
        Ok(())
    }

    pub fn encode_line(&self, row: &Row) -> pl_common::Result<String> {
        let mut line = String::with_capacity(256);
        self.encode_into(row, &mut line)?;
        Ok(line)
    }

    /// Encode every row into `out`, returning the number of rows written.
    ///
    /// `out` is flushed and dropped before this returns, on success and on
    /// failure alike. The row count is logged either way.
    pub fn write_rows<I, W>(&self, rows: I, out: W) -> Result<u64, EncodeError>
    where
        I: IntoIterator<Item = Row>,
        W: Write,
    {
        let mut writer = BufWriter::new(out);
        let mut counter: u64 = 0;
        let result = self.write_all(rows, &mut writer, &mut counter);
        info!(rows = counter, "{} rows built", counter);

        let flushed = writer.flush();
        drop(writer);
        result?;
        flushed.map_err(|source| EncodeError::Io {
            rows: counter,
            source,
        })?;
        Ok(counter)
    }

    fn write_all<I, W>(&self, rows: I, writer: &mut W, counter: &mut u64) -> Result<(), EncodeError>
    where
        I: IntoIterator<Item = Row>,
        W: Write,
    {
        let mut line = String::with_capacity(256);
        for row in rows {
            line.clear();
            self.encode_into(&row, &mut line)
                .map_err(|source| EncodeError::Row {
                    index: *counter,
                    source,
                })?;
            writer
                .write_all(line.as_bytes())
                .map_err(|source| EncodeError::Io {
                    rows: *counter,
                    source,
                })?;
            *counter += 1;
        }
        Ok(())
    }
}

/// Append one field. On a value that does not fit the column category,
/// returns the name of the offending value type.
fn push_field(
    line: &mut String,
    value: &Value,
    ty: ColumnType,
    default: Option<&str>,
) -> Result<(), &'static str> {
    if value.is_null() {
        if let Some(default) = default {
            line.push_str(default);
        }
        return Ok(());
    }
    match (ty, value) {
        (ColumnType::String, _) => push_quoted(line, &value.to_string()),
        (ColumnType::ArrayOfString, Value::Array(items)) => {
            let mut literal = String::new();
            push_array_literal(&mut literal, items);
            push_quoted(line, &literal);
        }
        (ColumnType::ArrayOfOther, Value::Array(items)) => {
            line.push(QUOTE);
            push_array_literal(line, items);
            line.push(QUOTE);
        }
        (ColumnType::ArrayOfString | ColumnType::ArrayOfOther, other) => {
            return Err(other.type_name());
        }
        (ColumnType::Decimal, Value::Decimal(_) | Value::Int(_) | Value::UInt(_)) => {
            let _ = write!(line, "{}", value);
        }
        (ColumnType::Decimal, other) => return Err(other.type_name()),
        (ColumnType::Other, _) => {
            let _ = write!(line, "{}", value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl_common::Decimal;

    fn layout(types: Vec<ColumnType>, defaults: Vec<Option<&str>>) -> ColumnLayout {
        let names = (0..types.len()).map(|i| format!("c{}", i)).collect();
        ColumnLayout::new(
            names,
            types,
            defaults.into_iter().map(|d| d.map(str::to_string)).collect(),
        )
        .unwrap()
    }

    fn dec(s: &str) -> Value {
        Value::Decimal(Decimal::parse(s).unwrap())
    }

    #[test]
    fn three_row_scenario() {
        let encoder = RowEncoder::new(layout(
            vec![ColumnType::Other, ColumnType::String, ColumnType::Decimal],
            vec![None, Some(r#""unknown""#), None],
        ));
        let rows = vec![
            vec![Value::Int(1), Value::from("Alice"), dec("10.50")],
            vec![Value::Int(2), Value::Null, dec("20.00")],
            vec![Value::Int(3), Value::from("Carol"), dec("30.25")],
        ];
        let mut out = Vec::new();
        let written = encoder.write_rows(rows, &mut out).unwrap();
        assert_eq!(written, 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1,\"Alice\",10.50\n2,\"unknown\",20.00\n3,\"Carol\",30.25\n"
        );
    }

    #[test]
    fn absent_without_default_is_empty_field() {
        let encoder = RowEncoder::new(layout(
            vec![ColumnType::Other, ColumnType::String, ColumnType::Other],
            vec![None, None, None],
        ));
        let line = encoder
            .encode_line(&vec![Value::Null, Value::Null, Value::Int(5)])
            .unwrap();
        assert_eq!(line, ",,5\n");
    }

    #[test]
    fn default_is_emitted_unquoted_for_any_type() {
        let encoder = RowEncoder::new(layout(
            vec![ColumnType::String, ColumnType::ArrayOfString],
            vec![Some("n/a"), Some("[]")],
        ));
        let line = encoder.encode_line(&vec![Value::Null, Value::Null]).unwrap();
        assert_eq!(line, "n/a,[]\n");
    }

    #[test]
    fn strings_are_always_quoted() {
        let encoder = RowEncoder::new(layout(vec![ColumnType::String], vec![None]));
        assert_eq!(encoder.encode_line(&vec![Value::from("x")]).unwrap(), "\"x\"\n");
        assert_eq!(
            encoder.encode_line(&vec![Value::from("a\"b")]).unwrap(),
            "\"a\"\"b\"\n"
        );
    }

    #[test]
    fn string_column_quotes_non_string_values() {
        let encoder = RowEncoder::new(layout(vec![ColumnType::String], vec![None]));
        assert_eq!(encoder.encode_line(&vec![Value::Int(42)]).unwrap(), "\"42\"\n");
    }

    #[test]
    fn array_of_string_is_literal_then_quoted() {
        let encoder = RowEncoder::new(layout(vec![ColumnType::ArrayOfString], vec![None]));
        let line = encoder
            .encode_line(&vec![Value::Array(vec![Value::from("a"), Value::from("b\"c")])])
            .unwrap();
        assert_eq!(line, "\"['a','b\"\"c']\"\n");
    }

    #[test]
    fn array_of_other_is_quoted_without_escaping() {
        let encoder = RowEncoder::new(layout(vec![ColumnType::ArrayOfOther], vec![None]));
        let line = encoder
            .encode_line(&vec![Value::Array(vec![Value::Int(1), Value::Int(2)])])
            .unwrap();
        assert_eq!(line, "\"[1,2]\"\n");
    }

    #[test]
    fn decimal_never_uses_exponent() {
        let encoder = RowEncoder::new(layout(vec![ColumnType::Decimal], vec![None]));
        let line = encoder.encode_line(&vec![dec("1.5E+3")]).unwrap();
        assert_eq!(line, "1500\n");
    }

    #[test]
    fn row_width_mismatch_is_an_error() {
        let encoder = RowEncoder::new(layout(vec![ColumnType::Other], vec![None]));
        let err = encoder
            .write_rows(vec![vec![Value::Int(1)], vec![]], Vec::new())
            .unwrap_err();
        match err {
            EncodeError::Row { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn scalar_in_array_column_is_rejected() {
        let encoder = RowEncoder::new(layout(
            vec![ColumnType::Other, ColumnType::ArrayOfString, ColumnType::Other],
            vec![None, None, None],
        ));
        let mut out = Vec::new();
        let err = encoder
            .write_rows(
                vec![vec![Value::Int(1), Value::from("a,b"), Value::Int(2)]],
                &mut out,
            )
            .unwrap_err();
        match err {
            EncodeError::Row { index, source } => {
                assert_eq!(index, 0);
                assert!(matches!(
                    source,
                    pl_common::Error::TypeMismatch {
                        ref column,
                        expected: ColumnType::ArrayOfString,
                        found: "string",
                    } if column == "c1"
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(out.is_empty());

        let encoder = RowEncoder::new(layout(vec![ColumnType::ArrayOfOther], vec![None]));
        assert!(encoder.encode_line(&vec![Value::Int(3)]).is_err());
    }

    #[test]
    fn decimal_column_takes_decimals_and_integers_only() {
        let encoder = RowEncoder::new(layout(vec![ColumnType::Decimal], vec![None]));
        assert_eq!(encoder.encode_line(&vec![Value::Int(-7)]).unwrap(), "-7\n");
        assert_eq!(encoder.encode_line(&vec![Value::UInt(7)]).unwrap(), "7\n");

        let err = encoder.encode_line(&vec![Value::from("1,5")]).unwrap_err();
        assert!(matches!(
            err,
            pl_common::Error::TypeMismatch {
                expected: ColumnType::Decimal,
                ..
            }
        ));
        assert!(encoder.encode_line(&vec![Value::Float(1e30)]).is_err());
    }

    struct FailingWriter {
        budget: usize,
        flushed: std::rc::Rc<std::cell::Cell<bool>>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader gone"));
            }
            self.budget -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed.set(true);
            Ok(())
        }
    }

    #[test]
    fn output_is_flushed_even_when_encoding_fails() {
        let flushed = std::rc::Rc::new(std::cell::Cell::new(false));
        let writer = FailingWriter {
            budget: 1024,
            flushed: flushed.clone(),
        };
        let encoder = RowEncoder::new(layout(vec![ColumnType::Other], vec![None]));
        let result = encoder.write_rows(vec![vec![Value::Int(1)], vec![]], writer);
        assert!(result.is_err());
        assert!(flushed.get());
    }

    #[test]
    fn io_failure_reports_rows_written() {
        let writer = FailingWriter {
            budget: 0,
            flushed: Default::default(),
        };
        let encoder = RowEncoder::new(layout(vec![ColumnType::Other], vec![None]));
        let rows = (0..10_000).map(|i| vec![Value::Int(i)]);
        let err = encoder.write_rows(rows, writer).unwrap_err();
        assert!(matches!(err, EncodeError::Io { .. }));
    }
}

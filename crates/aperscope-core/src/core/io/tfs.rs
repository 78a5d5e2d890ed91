use super::table::{Cell, ColumnTable};
use super::traits::TableFile;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TfsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: TfsParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(&'static str),
}

#[derive(Debug, Error)]
pub enum TfsParseErrorKind {
    #[error("Header line needs a name, a type and a value")]
    MalformedHeader,
    #[error("Unterminated quoted string")]
    UnterminatedString,
    #[error("Expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("Invalid number '{value}' in column '{column}'")]
    InvalidNumber { column: String, value: String },
    #[error("Column type line has {types} entries for {columns} columns")]
    TypeCount { types: usize, columns: usize },
    #[error("Data row before the column name line")]
    DataBeforeColumns,
}

/// Splits a TFS line into fields, keeping quoted strings together.
fn tokenize(line: &str) -> Result<Vec<String>, TfsParseErrorKind> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut token = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => token.push(ch),
                    None => return Err(TfsParseErrorKind::UnterminatedString),
                }
            }
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
            tokens.push(token);
        }
    }
    Ok(tokens)
}

fn is_text_type(ty: &str) -> bool {
    ty.ends_with('s')
}

fn parse_value(ty: &str, raw: String, column: &str) -> Result<Cell, TfsParseErrorKind> {
    if is_text_type(ty) {
        return Ok(Cell::Text(raw));
    }
    raw.parse::<f64>()
        .map(Cell::Number)
        .map_err(|_| TfsParseErrorKind::InvalidNumber {
            column: column.to_string(),
            value: raw,
        })
}

/// Reader for the TFS (Table File System) format written by optics codes.
pub struct TfsFile;

impl TableFile for TfsFile {
    type Table = ColumnTable;
    type Error = TfsError;

    fn read_from(reader: &mut impl BufRead) -> Result<ColumnTable, TfsError> {
        let mut table: Option<ColumnTable> = None;
        let mut types: Option<Vec<String>> = None;
        let mut pending_headers = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parse_err = |kind| TfsError::Parse {
                line: line_num,
                kind,
            };

            if let Some(rest) = trimmed.strip_prefix('@') {
                let mut tokens = tokenize(rest).map_err(parse_err)?;
                if tokens.len() < 3 {
                    return Err(parse_err(TfsParseErrorKind::MalformedHeader));
                }
                let value = tokens.split_off(2).join(" ");
                let name = tokens[0].clone();
                let value = parse_value(&tokens[1], value, &name).map_err(parse_err)?;
                pending_headers.push((name, value));
            } else if let Some(rest) = trimmed.strip_prefix('*') {
                let columns = tokenize(rest).map_err(parse_err)?;
                table = Some(ColumnTable::new(columns));
            } else if let Some(rest) = trimmed.strip_prefix('$') {
                let column_types = tokenize(rest).map_err(parse_err)?;
                let columns = table
                    .as_ref()
                    .map(|t| t.columns().len())
                    .ok_or(TfsError::MissingRecord("column names (*)"))?;
                if column_types.len() != columns {
                    return Err(parse_err(TfsParseErrorKind::TypeCount {
                        types: column_types.len(),
                        columns,
                    }));
                }
                types = Some(column_types);
            } else {
                let table = table
                    .as_mut()
                    .ok_or_else(|| parse_err(TfsParseErrorKind::DataBeforeColumns))?;
                let types = types.as_ref().ok_or(TfsError::MissingRecord("column types ($)"))?;
                let fields = tokenize(trimmed).map_err(parse_err)?;
                if fields.len() != types.len() {
                    return Err(parse_err(TfsParseErrorKind::FieldCount {
                        expected: types.len(),
                        found: fields.len(),
                    }));
                }
                let row = fields
                    .into_iter()
                    .zip(types.iter().zip(table.columns().iter()))
                    .map(|(raw, (ty, column))| parse_value(ty, raw, column))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(parse_err)?;
                table.push_row(row);
            }
        }

        let mut table = table.ok_or(TfsError::MissingRecord("column names (*)"))?;
        table.headers.extend(pending_headers);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = r#"@ NAME             %05s "APERTURE"
@ GAMMA            %le 479.6050161552533
* NAME              S       APER_1   APER_2   KEYWORD
$ %s                %le     %le      %le      %s
 "IP1"              0.0     0.0      0.0      "MARKER"
 "MQXA.1R1"         26.15   0.024    0.024    "QUADRUPOLE"
 "TCP.C6L7.B1"      100.2   1e-2     2.0E-2   "COLLIMATOR"
"#;

    #[test]
    fn reads_headers_columns_and_rows() {
        let table = TfsFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns().len(), 5);
        assert_eq!(
            table.header("gamma").and_then(Cell::as_f64),
            Some(479.6050161552533)
        );
        assert_eq!(
            table.text_column("NAME").unwrap(),
            vec!["IP1", "MQXA.1R1", "TCP.C6L7.B1"]
        );
        assert_eq!(table.number_column("APER_2").unwrap()[2], 0.02);
    }

    #[test]
    fn quoted_strings_may_contain_spaces() {
        let tokens = tokenize(r#" "a b" 1.0 "c""#).unwrap();
        assert_eq!(tokens, vec!["a b", "1.0", "c"]);
        assert!(matches!(
            tokenize(r#""open"#),
            Err(TfsParseErrorKind::UnterminatedString)
        ));
    }

    #[test]
    fn wrong_field_count_reports_the_line() {
        let text = "* NAME S\n$ %s %le\n\"A\" 1.0 2.0\n";
        let err = TfsFile::read_from(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(
            err,
            TfsError::Parse {
                line: 3,
                kind: TfsParseErrorKind::FieldCount {
                    expected: 2,
                    found: 3
                }
            }
        ));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let text = "* NAME S\n$ %s %le\n\"A\" abc\n";
        let err = TfsFile::read_from(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(
            err,
            TfsError::Parse {
                kind: TfsParseErrorKind::InvalidNumber { .. },
                ..
            }
        ));
    }

    #[test]
    fn missing_column_line_is_an_error() {
        let err = TfsFile::read_from(&mut Cursor::new("@ A %le 1.0\n")).unwrap_err();
        assert!(matches!(err, TfsError::MissingRecord(_)));
    }
}

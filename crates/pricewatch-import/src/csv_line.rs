//! Single-line CSV field splitting.
//!
//! Export rows never span lines, so a row is one line. Fields may be
//! wrapped in double quotes; inside quotes a comma is literal and `""` is
//! an escaped quote. Surrounding whitespace is kept.

/// Split one CSV line into fields.
///
/// Returns `None` when a quoted field is not closed before the end of the
/// line.
pub fn split_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields() {
        assert_eq!(split_line("1,2,,x").unwrap(), vec!["1", "2", "", "x"]);
    }

    #[test]
    fn quoted_fields_keep_commas() {
        assert_eq!(
            split_line(r#""12","a, b","c""#).unwrap(),
            vec!["12", "a, b", "c"]
        );
    }

    #[test]
    fn doubled_quote_is_escaped() {
        assert_eq!(
            split_line(r#""say ""hi""",2"#).unwrap(),
            vec![r#"say "hi""#, "2"]
        );
    }

    #[test]
    fn empty_line_is_one_empty_field() {
        assert_eq!(split_line("").unwrap(), vec![""]);
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(split_line(r#"1,"open"#).is_none());
    }
}

use super::sniffer::Delimiter;

pub struct CsvParser;

impl CsvParser {
    /// Splits a single line into trimmed fields.
    /// Quoted sections keep delimiters literal and `""` stands for one quote.
    /// An unterminated quote simply runs to the end of the line.
    pub fn parse_line(line: &str, delimiter: Delimiter) -> Vec<String> {
        let delim = delimiter.as_char();
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        current.push('"');
                    }
                    '"' => in_quotes = false,
                    _ => current.push(c),
                }
            } else if c == '"' {
                in_quotes = true;
            } else if c == delim {
                fields.push(current.trim().to_string());
                current.clear();
            } else {
                current.push(c);
            }
        }
        fields.push(current.trim().to_string());
        fields
    }

    /// Quotes a value so that `parse_line` gives it back unchanged.
    pub fn quote_field(value: &str, delimiter: Delimiter) -> String {
        let needs_quotes = value.contains(delimiter.as_char())
            || value.contains(['"', '\r', '\n']);

        if needs_quotes {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sniffer::sniff;

    fn unquoted_delimiters(line: &str, delimiter: Delimiter) -> usize {
        let mut count = 0;
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if in_quotes && chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            } else if !in_quotes && c == delimiter.as_char() {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn test_parse_simple() {
        let fields = CsvParser::parse_line("a,b,c", Delimiter::Comma);
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_quotes() {
        let fields = CsvParser::parse_line("a,\"b,c\",d", Delimiter::Comma);
        assert_eq!(fields, vec!["a", "b,c", "d"]);
    }

    #[test]
    fn test_escaped_quote_stays_in_field() {
        let fields = CsvParser::parse_line("\"say \"\"hi\"\"\";x", Delimiter::Semicolon);
        assert_eq!(fields, vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn test_trims_and_keeps_empties() {
        let fields = CsvParser::parse_line(" Name |  | Ticket ", Delimiter::Pipe);
        assert_eq!(fields, vec!["Name", "", "Ticket"]);
    }

    #[test]
    fn test_empty_line_is_one_empty_field() {
        assert_eq!(CsvParser::parse_line("", Delimiter::Comma), vec![""]);
    }

    #[test]
    fn test_unterminated_quote_is_tolerated() {
        let fields = CsvParser::parse_line("a,\"b,c", Delimiter::Comma);
        assert_eq!(fields, vec!["a", "b,c"]);
    }

    #[test]
    fn test_field_count_matches_unquoted_delimiters() {
        let lines = [
            "a,b,c",
            "a\tb\t\"c\td\"",
            "\"x;y\";z;;",
            "one|\"two\"\"|three\"|four",
            "",
            "no delimiters here",
            "\"unterminated,quote",
        ];
        for line in lines {
            let delimiter = sniff(line);
            let fields = CsvParser::parse_line(line, delimiter);
            assert_eq!(
                fields.len(),
                unquoted_delimiters(line, delimiter) + 1,
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_quote_field_round_trip() {
        let values = ["plain", "has,comma", "has \"quote\"", "\"", "pipe|semi;", "tab\there"];
        for delimiter in Delimiter::all() {
            for value in values {
                let quoted = CsvParser::quote_field(value, *delimiter);
                assert_eq!(
                    CsvParser::parse_line(&quoted, *delimiter),
                    vec![value.to_string()],
                    "value {:?} with {:?}",
                    value,
                    delimiter
                );
            }
        }
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let line = "\"First, Name\";Last;Ticket #";
        let first = CsvParser::parse_line(line, sniff(line));
        let second = CsvParser::parse_line(line, sniff(line));
        assert_eq!(first, second);
        assert_eq!(first, vec!["First, Name", "Last", "Ticket #"]);
    }
}

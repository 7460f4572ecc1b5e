use std::iter::Peekable;
use std::str::Chars;

/// Splits an extended XYZ comment line into `(key, value)` pairs, in order.
///
/// Accepted syntax:
/// - `key=value`, `key="quoted value"` and `key='quoted value'`
/// - whitespace around `=` and commas between pairs, as in the comment lines
///   CP2K writes (`i =        0, time =        0.000, E =     -1.0`)
/// - bare `flag` words, reported with the value `"T"`
pub struct ExtendedXyzParser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> ExtendedXyzParser<'a> {
    pub fn new(line: &'a str) -> Self {
        ExtendedXyzParser {
            chars: line.trim().chars().peekable(),
        }
    }

    pub fn parse(mut self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        loop {
            self.skip(|c| c.is_whitespace() || c == ',');
            if self.chars.peek().is_none() {
                break;
            }

            let key = self.next_substring();
            self.skip(char::is_whitespace);
            if self.chars.peek() == Some(&'=') {
                self.chars.next();
                self.skip(char::is_whitespace);
                let value = self.next_substring();
                pairs.push((key, value));
            } else if !key.is_empty() {
                pairs.push((key, "T".to_string()));
            }
        }
        pairs
    }

    fn skip(&mut self, predicate: impl Fn(char) -> bool) {
        while self.chars.next_if(|&c| predicate(c)).is_some() {}
    }

    /// Grabs either a quoted substring (allowing spaces) or an unquoted
    /// one (stopping at `=`, `,` or whitespace). Doesn't include the quotes.
    fn next_substring(&mut self) -> String {
        match self.chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                self.chars.next();
                let mut value = String::new();
                for c in self.chars.by_ref() {
                    if c == quote {
                        break;
                    }
                    value.push(c);
                }
                value
            }
            _ => {
                let mut value = String::new();
                while let Some(c) = self
                    .chars
                    .next_if(|&c| !(c.is_whitespace() || c == '=' || c == ','))
                {
                    value.push(c);
                }
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Vec<(String, String)> {
        ExtendedXyzParser::new(line).parse()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn simple_flags_and_values() {
        let pairs =
            parse(r#"Properties=species:S:1:pos:R:3 name='test file' debug Lattice="1 0 0 0 1 0 0 0 1""#);
        assert_eq!(
            pairs,
            vec![
                pair("Properties", "species:S:1:pos:R:3"),
                pair("name", "test file"),
                pair("debug", "T"),
                pair("Lattice", "1 0 0 0 1 0 0 0 1"),
            ]
        );
    }

    #[test]
    fn cp2k_comment_line() {
        let pairs = parse(" i =        0, time =        0.000, E =     -1099.2349578434");
        assert_eq!(
            pairs,
            vec![
                pair("i", "0"),
                pair("time", "0.000"),
                pair("E", "-1099.2349578434"),
            ]
        );
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let pairs = parse(r#"name="abc def"#);
        assert_eq!(pairs, vec![pair("name", "abc def")]);
    }

    #[test]
    fn empty_line() {
        assert!(parse("   ").is_empty());
    }
}

//! Minimal S-expression reader for server messages.
//!
//! Server messages are a single parenthesised list of atoms and nested
//! lists, e.g. `(see 12 ((b) 10.5 -3) ((f c) 20 0))`. Double-quoted atoms
//! (team names) are returned without their quotes. Trailing NUL bytes and
//! whitespace after the closing parenthesis are ignored.

/// Errors raised while reading an S-expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SexpError {
    /// The input ended inside a list or string.
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// A closing parenthesis without a matching opening one.
    #[error("unbalanced ')' at byte {offset}")]
    Unbalanced {
        /// Byte offset of the stray parenthesis.
        offset: usize,
    },

    /// Content after the top-level expression.
    #[error("trailing content at byte {offset}")]
    Trailing {
        /// Byte offset where the trailing content starts.
        offset: usize,
    },

    /// Nothing to read.
    #[error("empty message")]
    Empty,
}

/// A parsed S-expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    /// A bare or quoted word.
    Atom(String),
    /// A parenthesised sequence.
    List(Vec<Sexp>),
}

impl Sexp {
    /// The atom text, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(text) => Some(text),
            Self::List(_) => None,
        }
    }

    /// The items, if this is a list.
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::Atom(_) => None,
            Self::List(items) => Some(items),
        }
    }

    /// The atom parsed as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_atom().and_then(|text| text.parse().ok())
    }

    /// The first item of a list, if it is an atom.
    pub fn head(&self) -> Option<&str> {
        self.as_list()
            .and_then(<[Self]>::first)
            .and_then(Self::as_atom)
    }
}

/// Read exactly one S-expression from `input`.
pub fn parse(input: &str) -> Result<Sexp, SexpError> {
    let trimmed = input.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    let mut reader = Reader {
        bytes: trimmed.as_bytes(),
        pos: 0,
    };
    reader.skip_whitespace();
    if reader.at_end() {
        return Err(SexpError::Empty);
    }
    let expr = reader.expr()?;
    reader.skip_whitespace();
    if reader.at_end() {
        Ok(expr)
    } else {
        Err(SexpError::Trailing { offset: reader.pos })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos = self.pos.saturating_add(1);
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace() || b == 0) {
            self.bump();
        }
    }

    fn expr(&mut self) -> Result<Sexp, SexpError> {
        match self.peek() {
            None => Err(SexpError::UnexpectedEnd),
            Some(b'(') => {
                self.bump();
                self.list()
            }
            Some(b')') => Err(SexpError::Unbalanced { offset: self.pos }),
            Some(b'"') => {
                self.bump();
                self.quoted()
            }
            Some(_) => Ok(self.bare()),
        }
    }

    fn list(&mut self) -> Result<Sexp, SexpError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(SexpError::UnexpectedEnd),
                Some(b')') => {
                    self.bump();
                    return Ok(Sexp::List(items));
                }
                Some(_) => items.push(self.expr()?),
            }
        }
    }

    fn quoted(&mut self) -> Result<Sexp, SexpError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'"' {
                let text = self.text(start, self.pos);
                self.bump();
                return Ok(Sexp::Atom(text));
            }
            self.bump();
        }
        Err(SexpError::UnexpectedEnd)
    }

    fn bare(&mut self) -> Sexp {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && b != b'(' && b != b')' && b != 0)
        {
            self.bump();
        }
        Sexp::Atom(self.text(start, self.pos))
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.bytes
            .get(start..end)
            .map(|slice| String::from_utf8_lossy(slice).into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn atom(text: &str) -> Sexp {
        Sexp::Atom(text.to_owned())
    }

    #[test]
    fn nested_lists_and_quotes() {
        let expr = parse("(see 3 ((p \"Keng\" 7) 4.5 -10))\0").unwrap();
        assert_eq!(expr.head(), Some("see"));
        let items = expr.as_list().unwrap();
        assert_eq!(items.get(1), Some(&atom("3")));
        let player = items.get(2).unwrap().as_list().unwrap();
        assert_eq!(
            player.first(),
            Some(&Sexp::List(vec![atom("p"), atom("Keng"), atom("7")]))
        );
        assert_eq!(player.get(2).and_then(Sexp::as_f64), Some(-10.0));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(parse(""), Err(SexpError::Empty));
        assert_eq!(parse("\0\0"), Err(SexpError::Empty));
        assert_eq!(parse("(init l 3"), Err(SexpError::UnexpectedEnd));
        assert_eq!(parse(")"), Err(SexpError::Unbalanced { offset: 0 }));
        assert_eq!(parse("(a) b"), Err(SexpError::Trailing { offset: 4 }));
        assert_eq!(parse("(a \"open)"), Err(SexpError::UnexpectedEnd));
    }

    #[test]
    fn bare_atoms_parse_as_numbers() {
        let expr = parse("(sense_body 42 (head_angle -15.5))").unwrap();
        let items = expr.as_list().unwrap();
        assert_eq!(items.get(1).and_then(Sexp::as_f64), Some(42.0));
        assert_eq!(items.get(2).and_then(Sexp::head), Some("head_angle"));
    }
}

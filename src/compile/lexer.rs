use std::fmt;

/// Tokens of the accepted Java subset
#[derive(Clone, PartialEq, Debug)]
pub enum Token {
    /// Identifiers and keywords
    Ident(String),

    /// Integer literal without its sign (range is checked once the sign is known)
    Int(u64),

    /// Long literal (with an `L` suffix) without its sign
    Long(u64),

    Str(String),

    /// Punctuation and operators
    Punct(char),

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(ident) => write!(f, "{}", ident),
            Token::Int(value) => write!(f, "{}", value),
            Token::Long(value) => write!(f, "{}L", value),
            Token::Str(string) => write!(f, "{:?}", string),
            Token::Punct(c) => write!(f, "'{}'", c),
            Token::Eof => write!(f, "<EOF>"),
        }
    }
}

/// Token along with the 1-based line it starts on
#[derive(Clone, PartialEq, Debug)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Lexing failure, reported as a diagnostic on `line`
#[derive(Debug, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

const PUNCTUATION: &str = "(){}[];,.=+-*/%";

/// Split source text into tokens, ending with [`Token::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexError> {
    let mut tokens = vec![];
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        let start_line = line;
        let token = match c {
            '\n' => {
                line += 1;
                continue;
            }
            c if c.is_whitespace() => continue,

            // Comments
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
                continue;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                    }
                    if previous == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    previous = c;
                }
                if !closed {
                    return Err(LexError {
                        line: start_line,
                        message: String::from("unclosed comment"),
                    });
                }
                continue;
            }

            c if c.is_ascii_digit() => {
                let mut digits = String::from(c);
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '_' {
                        if c != '_' {
                            digits.push(c);
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }
                let is_long = matches!(chars.peek(), Some('l' | 'L'));
                if is_long {
                    chars.next();
                }
                if matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '.') {
                    return Err(LexError {
                        line,
                        message: String::from("unsupported numeric literal"),
                    });
                }
                let value: u64 = digits.parse().map_err(|_| LexError {
                    line,
                    message: format!("integer number too large: {}", digits),
                })?;
                if is_long {
                    Token::Long(value)
                } else {
                    Token::Int(value)
                }
            }

            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::from(c);
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '$' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }

            '"' => {
                let mut string = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => string.push(escape(chars.next(), line)?),
                        Some('\n') | None => {
                            return Err(LexError {
                                line,
                                message: String::from("unclosed string literal"),
                            })
                        }
                        Some(c) => string.push(c),
                    }
                }
                Token::Str(string)
            }

            c if PUNCTUATION.contains(c) => Token::Punct(c),

            other => {
                return Err(LexError {
                    line,
                    message: format!("illegal character: '{}'", other),
                })
            }
        };
        tokens.push(Spanned {
            token,
            line: start_line,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

fn escape(c: Option<char>, line: usize) -> Result<char, LexError> {
    Ok(match c {
        Some('n') => '\n',
        Some('t') => '\t',
        Some('r') => '\r',
        Some('b') => '\u{0008}',
        Some('f') => '\u{000C}',
        Some('0') => '\0',
        Some('"') => '"',
        Some('\'') => '\'',
        Some('\\') => '\\',
        _ => {
            return Err(LexError {
                line,
                message: String::from("illegal escape character in string literal"),
            })
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn literals_and_punctuation() {
        assert_eq!(
            tokens("return 1_000 + 2L * \"a\\n\";"),
            vec![
                Token::Ident(String::from("return")),
                Token::Int(1000),
                Token::Punct('+'),
                Token::Long(2),
                Token::Punct('*'),
                Token::Str(String::from("a\n")),
                Token::Punct(';'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_lines() {
        let spanned = tokenize("// one\n/* two\n */ x\ny").unwrap();
        assert_eq!(spanned[0].token, Token::Ident(String::from("x")));
        assert_eq!(spanned[0].line, 3);
        assert_eq!(spanned[1].line, 4);
        assert_eq!(spanned[2].token, Token::Eof);
    }

    #[test]
    fn errors() {
        assert_eq!(
            tokenize("a\n\"open").unwrap_err(),
            LexError {
                line: 2,
                message: String::from("unclosed string literal")
            }
        );
        assert_eq!(tokenize("x # y").unwrap_err().message, "illegal character: '#'");
        assert!(tokenize("/* never").is_err());
        assert!(tokenize("1.5").is_err());
    }
}

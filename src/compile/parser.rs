use super::ast::*;
use super::lexer::{tokenize, Spanned, Token};

/// Syntax error, reported as a diagnostic on `line`
#[derive(Debug, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

const KEYWORDS: &[&str] = &[
    "abstract", "boolean", "byte", "char", "class", "double", "else", "extends", "false", "final",
    "float", "for", "if", "implements", "import", "int", "interface", "long", "new", "null",
    "package", "private", "protected", "public", "return", "short", "static", "super", "this",
    "throw", "true", "void", "while",
];

const PRIMITIVES: &[&str] = &["boolean", "byte", "char", "double", "float", "int", "long", "short"];

/// Deepest nesting of unary operators and parenthesized expressions
const MAX_NESTING: usize = 128;

/// Parse a whole source file
pub fn parse(source: &str) -> Result<CompilationUnit, ParseError> {
    let tokens = tokenize(source).map_err(|err| ParseError {
        line: err.line,
        message: err.message,
    })?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .compilation_unit()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,

    /// Expressions currently being parsed inside one another
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn line(&self) -> usize {
        let idx = self.pos.min(self.tokens.len() - 1);
        self.tokens[idx].line
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        let message = if *self.peek() == Token::Eof {
            String::from("reached end of file while parsing")
        } else {
            message.into()
        };
        Err(ParseError {
            line: self.line(),
            message,
        })
    }

    fn is_punct(&self, c: char) -> bool {
        *self.peek() == Token::Punct(c)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(ident) if ident == keyword)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        let found = self.is_punct(c);
        if found {
            self.advance();
        }
        found
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.is_keyword(keyword);
        if found {
            self.advance();
        }
        found
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            self.error(format!("'{}' expected", c))
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Token::Ident(ident) if !KEYWORDS.contains(&ident.as_str()) => {
                let ident = ident.clone();
                self.advance();
                Ok(ident)
            }
            _ => self.error("<identifier> expected"),
        }
    }

    /// Dotted name (`a.b.C`)
    fn qualified_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.identifier()?;
        while self.is_punct('.') && matches!(self.peek_at(1), Token::Ident(_)) {
            self.advance();
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn compilation_unit(&mut self) -> Result<CompilationUnit, ParseError> {
        let package = if self.eat_keyword("package") {
            let name = self.qualified_name()?;
            self.expect_punct(';')?;
            Some(name)
        } else {
            None
        };

        let mut imports = vec![];
        while self.is_keyword("import") {
            let line = self.line();
            self.advance();
            let path = self.qualified_name()?;
            let on_demand = self.eat_punct('.');
            if on_demand {
                self.expect_punct('*')?;
            }
            self.expect_punct(';')?;
            imports.push(Import {
                path,
                on_demand,
                line,
            });
        }

        let mut classes = vec![];
        while *self.peek() != Token::Eof {
            if self.eat_punct(';') {
                continue;
            }
            let modifiers = self.modifiers();
            if !self.is_keyword("class") {
                return Err(ParseError {
                    line: self.line(),
                    message: String::from("class, interface, enum, or record expected"),
                });
            }
            classes.push(self.class_decl(modifiers)?);
        }

        Ok(CompilationUnit {
            package,
            imports,
            classes,
        })
    }

    fn modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        loop {
            let flag = match self.peek() {
                Token::Ident(ident) => match ident.as_str() {
                    "public" => &mut modifiers.is_public,
                    "protected" => &mut modifiers.is_protected,
                    "private" => &mut modifiers.is_private,
                    "static" => &mut modifiers.is_static,
                    "final" => &mut modifiers.is_final,
                    "abstract" => &mut modifiers.is_abstract,
                    _ => break,
                },
                _ => break,
            };
            *flag = true;
            self.advance();
        }
        modifiers
    }

    fn class_decl(&mut self, modifiers: Modifiers) -> Result<ClassDecl, ParseError> {
        let line = self.line();
        if !self.eat_keyword("class") {
            return self.error("class expected");
        }
        let name = self.identifier()?;
        if self.is_keyword("extends") || self.is_keyword("implements") {
            return self.error("'{' expected");
        }
        self.expect_punct('{')?;

        let mut methods = vec![];
        let mut classes = vec![];
        while !self.eat_punct('}') {
            if *self.peek() == Token::Eof {
                return self.error("reached end of file while parsing");
            }
            if self.eat_punct(';') {
                continue;
            }
            let modifiers = self.modifiers();
            if self.is_keyword("class") {
                classes.push(self.class_decl(modifiers)?);
            } else {
                methods.push(self.method_decl(modifiers)?);
            }
        }

        Ok(ClassDecl {
            name,
            modifiers,
            methods,
            classes,
            line,
        })
    }

    fn method_decl(&mut self, modifiers: Modifiers) -> Result<MethodDecl, ParseError> {
        let line = self.line();
        let return_type = if self.eat_keyword("void") {
            None
        } else {
            Some(self.type_name()?)
        };
        let name = self.identifier()?;
        if !self.is_punct('(') {
            return self.error("'(' expected");
        }
        self.advance();

        let mut parameters = vec![];
        if !self.eat_punct(')') {
            loop {
                self.eat_keyword("final");
                let line = self.line();
                let type_name = self.type_name()?;
                let name = self.identifier()?;
                parameters.push(Parameter {
                    type_name,
                    name,
                    line,
                });
                if self.eat_punct(')') {
                    break;
                }
                self.expect_punct(',')?;
            }
        }

        self.expect_punct('{')?;
        let mut body = vec![];
        while !self.eat_punct('}') {
            if *self.peek() == Token::Eof {
                return self.error("reached end of file while parsing");
            }
            body.push(self.statement()?);
        }

        Ok(MethodDecl {
            name,
            modifiers,
            return_type,
            parameters,
            body,
            line,
        })
    }

    /// Primitive or class type, followed by any number of `[]`
    fn type_name(&mut self) -> Result<TypeName, ParseError> {
        let line = self.line();
        let name = match self.peek() {
            Token::Ident(ident) if PRIMITIVES.contains(&ident.as_str()) => {
                let ident = ident.clone();
                self.advance();
                ident
            }
            _ => self.qualified_name()?,
        };
        let mut dimensions = 0;
        while self.is_punct('[') && *self.peek_at(1) == Token::Punct(']') {
            self.advance();
            self.advance();
            dimensions += 1;
        }
        Ok(TypeName {
            name,
            dimensions,
            line,
        })
    }

    /// Whether the upcoming tokens are `Type name`, which starts a local variable declaration
    fn at_local_declaration(&mut self) -> bool {
        let start = self.pos;
        let is_declaration = self.type_name().is_ok() && self.identifier().is_ok();
        self.pos = start;
        is_declaration
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();

        if self.eat_keyword("return") {
            let value = if self.is_punct(';') {
                None
            } else {
                Some(self.expression()?)
            };
            self.expect_punct(';')?;
            return Ok(Stmt::Return(value, line));
        }

        if self.eat_keyword("throw") {
            let value = self.expression()?;
            self.expect_punct(';')?;
            return Ok(Stmt::Throw(value, line));
        }

        let is_final = self.eat_keyword("final");
        if is_final || self.at_local_declaration() {
            let type_name = self.type_name()?;
            let name = self.identifier()?;
            let init = if self.eat_punct('=') {
                Some(self.expression()?)
            } else {
                None
            };
            self.expect_punct(';')?;
            return Ok(Stmt::Local {
                type_name,
                name,
                is_final,
                init,
                line,
            });
        }

        if let (Token::Ident(name), Token::Punct('=')) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            self.advance();
            self.advance();
            let value = self.expression()?;
            self.expect_punct(';')?;
            return Ok(Stmt::Assign { name, value, line });
        }

        let expr = self.expression()?;
        if !matches!(expr.kind, ExprKind::Call { .. } | ExprKind::New { .. }) {
            return Err(ParseError {
                line: expr.line,
                message: String::from("not a statement"),
            });
        }
        self.expect_punct(';')?;
        Ok(Stmt::Expr(expr))
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Punct('+') => BinOp::Add,
                Token::Punct('-') => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let line = self.line();
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = Expr {
                kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
                line,
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Punct('*') => BinOp::Mul,
                Token::Punct('/') => BinOp::Div,
                Token::Punct('%') => BinOp::Rem,
                _ => return Ok(lhs),
            };
            let line = self.line();
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr {
                kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
                line,
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.depth >= MAX_NESTING {
            return self.error("expression is nested too deeply");
        }
        self.depth += 1;
        let expr = self.nested_unary();
        self.depth -= 1;
        expr
    }

    fn nested_unary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        if self.eat_punct('+') {
            return self.unary();
        }
        if self.eat_punct('-') {
            // Negative literals are folded so that `-2147483648` is in range
            let literal = match self.peek() {
                Token::Int(value) => Some(ExprKind::Int(-(*value as i128))),
                Token::Long(value) => Some(ExprKind::Long(-(*value as i128))),
                _ => None,
            };
            return match literal {
                Some(kind) => {
                    self.advance();
                    self.postfix(Expr { kind, line })
                }
                None => Ok(Expr {
                    kind: ExprKind::Neg(Box::new(self.unary()?)),
                    line,
                }),
            };
        }
        let primary = self.primary()?;
        self.postfix(primary)
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        while self.eat_punct('.') {
            let line = self.line();
            let name = self.identifier()?;
            expr = if self.is_punct('(') {
                let args = self.arguments()?;
                Expr {
                    kind: ExprKind::Call {
                        receiver: Some(Box::new(expr)),
                        name,
                        args,
                    },
                    line,
                }
            } else {
                Expr {
                    kind: ExprKind::Select(Box::new(expr), name),
                    line,
                }
            };
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_punct('(')?;
        let mut args = vec![];
        if self.eat_punct(')') {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat_punct(')') {
                return Ok(args);
            }
            if !self.is_punct(',') {
                return self.error("')' expected");
            }
            self.advance();
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let kind = match self.peek().clone() {
            Token::Int(value) => {
                self.advance();
                ExprKind::Int(value as i128)
            }
            Token::Long(value) => {
                self.advance();
                ExprKind::Long(value as i128)
            }
            Token::Str(string) => {
                self.advance();
                ExprKind::Str(string)
            }
            Token::Punct('(') => {
                self.advance();
                let inner = self.expression()?;
                self.expect_punct(')')?;
                return Ok(inner);
            }
            Token::Ident(ident) => match ident.as_str() {
                "true" | "false" => {
                    self.advance();
                    ExprKind::Bool(ident == "true")
                }
                "null" => {
                    self.advance();
                    ExprKind::Null
                }
                "new" => {
                    self.advance();
                    let type_name = self.type_name()?;
                    if type_name.dimensions > 0 {
                        return self.error("'(' expected");
                    }
                    let args = self.arguments()?;
                    ExprKind::New { type_name, args }
                }
                _ if KEYWORDS.contains(&ident.as_str()) => {
                    return self.error("illegal start of expression")
                }
                _ => {
                    self.advance();
                    if self.is_punct('(') {
                        let args = self.arguments()?;
                        ExprKind::Call {
                            receiver: None,
                            name: ident,
                            args,
                        }
                    } else {
                        ExprKind::Name(ident)
                    }
                }
            },
            _ => return self.error("illegal start of expression"),
        };
        Ok(Expr { kind, line })
    }
}

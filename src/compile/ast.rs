//! Syntax tree of the accepted Java subset

/// One source file
#[derive(Debug, PartialEq)]
pub struct CompilationUnit {
    /// Dotted package name
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub classes: Vec<ClassDecl>,
}

#[derive(Debug, PartialEq)]
pub struct Import {
    /// Dotted name, without the trailing `.*` for on-demand imports
    pub path: String,
    pub on_demand: bool,
    pub line: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    pub is_public: bool,
    pub is_protected: bool,
    pub is_private: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
}

#[derive(Debug, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub methods: Vec<MethodDecl>,
    pub classes: Vec<ClassDecl>,
    pub line: usize,
}

#[derive(Debug, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub modifiers: Modifiers,

    /// `None` for `void`
    pub return_type: Option<TypeName>,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, PartialEq)]
pub struct Parameter {
    pub type_name: TypeName,
    pub name: String,
    pub line: usize,
}

/// Type as spelled in source: a primitive keyword or a (possibly qualified) class name, with
/// array dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    pub dimensions: usize,
    pub line: usize,
}

#[derive(Debug, PartialEq)]
pub enum Stmt {
    Local {
        type_name: TypeName,
        name: String,
        is_final: bool,
        init: Option<Expr>,
        line: usize,
    },
    Assign {
        name: String,
        value: Expr,
        line: usize,
    },
    Return(Option<Expr>, usize),
    Throw(Expr, usize),
    Expr(Expr),
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Local { line, .. } | Stmt::Assign { line, .. } => *line,
            Stmt::Return(_, line) | Stmt::Throw(_, line) => *line,
            Stmt::Expr(expr) => expr.line,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
            BinOp::Rem => '%',
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    /// Integer literal, with any leading minus already applied
    Int(i128),
    Long(i128),
    Str(String),
    Bool(bool),
    Null,

    /// Simple name (local variable, or the start of a qualified name)
    Name(String),

    /// `expr.name` where `name` is not followed by arguments
    Select(Box<Expr>, String),

    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),

    /// `name(args)` or `receiver.name(args)`
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },

    New {
        type_name: TypeName,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Dotted path for expressions made only of names and selections (`java.lang.Math`)
    pub fn as_path(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ExprKind::Name(name) => Some(vec![name.as_str()]),
            ExprKind::Select(qualifier, name) => {
                let mut path = qualifier.as_path()?;
                path.push(name);
                Some(path)
            }
            _ => None,
        }
    }
}

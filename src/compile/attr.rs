//! Name resolution and type checking
//!
//! Attribution turns the syntax tree into a typed tree in which every name is resolved, every
//! overload is picked, and every implicit conversion is explicit. Code generation then only has
//! to walk the typed tree.

use super::ast::{BinOp, CompilationUnit, Expr, ExprKind, MethodDecl, Modifiers, Stmt, TypeName};
use super::classpath::{
    is_java_assignable, primitive, visible_methods, widens_to, ClassData, ClassPath, MethodData,
};
use crate::jvm::code::InvokeType;
use crate::jvm::{
    BaseType, BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, Name, RefType,
    UnqualifiedName,
};
use std::collections::HashMap;
use std::fmt;

/// Line and message of a problem in the source
pub type Problem = (usize, String);

/// Static type of an expression
#[derive(Clone, PartialEq, Debug)]
pub enum Type {
    Void,
    Null,
    Value(FieldType<BinaryName>),
}

impl Type {
    fn is_string(&self) -> bool {
        matches!(self, Type::Value(FieldType::Ref(RefType::Object(name))) if *name == BinaryName::STRING)
    }

    fn base(&self) -> Option<BaseType> {
        match self {
            Type::Value(FieldType::Base(base)) => Some(*base),
            _ => None,
        }
    }
}

/// Types are printed the way javac prints them (simple class names)
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Null => f.write_str("<null>"),
            Type::Value(field_type) => f.write_str(&display_field_type(field_type)),
        }
    }
}

fn simple_name(name: &BinaryName) -> String {
    name.class_segment().replace('$', ".")
}

pub fn display_field_type(field_type: &FieldType<BinaryName>) -> String {
    match field_type {
        FieldType::Base(base) => base.java_name().to_owned(),
        FieldType::Ref(RefType::Object(name)) => simple_name(name),
        FieldType::Ref(RefType::ObjectArray(arr)) => {
            simple_name(&arr.element_type) + &"[]".repeat(arr.additional_dimensions + 1)
        }
        FieldType::Ref(RefType::PrimitiveArray(arr)) => {
            arr.element_type.java_name().to_owned() + &"[]".repeat(arr.additional_dimensions + 1)
        }
    }
}

/// `name(int,String)`
fn display_signature(name: &str, parameters: &[FieldType<BinaryName>]) -> String {
    let parameters: Vec<String> = parameters.iter().map(display_field_type).collect();
    format!("{}({})", name, parameters.join(","))
}

fn display_arguments(args: &[Typed]) -> String {
    let args: Vec<String> = args.iter().map(|arg| arg.ty.to_string()).collect();
    args.join(",")
}

/// Index of a local variable in [`TypedMethod::locals`]
pub type LocalId = usize;

#[derive(Debug)]
pub struct Typed {
    pub kind: TypedKind,
    pub ty: Type,
}

#[derive(Debug)]
pub enum TypedKind {
    Int(i32),
    Long(i64),
    Str(String),
    Bool(bool),
    Null,
    Local(LocalId),
    Neg(Box<Typed>),

    /// Both operands have the (integral) result type
    Arith(BinOp, Box<Typed>, Box<Typed>),

    /// `int` to `long`
    Widen(Box<Typed>),

    /// String concatenation of the parts, in order
    Concat(Vec<Typed>),

    /// Method call; a static method called through an expression still evaluates (and discards)
    /// that expression
    Invoke {
        kind: InvokeType,
        class: BinaryName,
        name: String,
        descriptor: MethodDescriptor<BinaryName>,
        receiver: Option<Box<Typed>>,
        args: Vec<Typed>,
    },

    New {
        class: BinaryName,
        descriptor: MethodDescriptor<BinaryName>,
        args: Vec<Typed>,
    },
}

#[derive(Debug)]
pub enum TypedStmt {
    Declare {
        local: LocalId,
        init: Option<Typed>,
    },
    Store {
        local: LocalId,
        value: Typed,
    },
    Return(Option<Typed>),
    Throw(Typed),
    Expr(Typed),
}

/// Method signature, resolved before any body is attributed
#[derive(Clone, Debug)]
pub struct Signature {
    pub name: String,
    pub access_flags: MethodAccessFlags,
    pub parameters: Vec<(String, FieldType<BinaryName>)>,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub line: usize,
}

impl Signature {
    pub fn display(&self) -> String {
        display_signature(&self.name, &self.descriptor.parameters)
    }
}

#[derive(Debug)]
pub struct TypedMethod {
    pub signature: Signature,

    /// Types of the locals, by [`LocalId`] (parameters come first)
    pub locals: Vec<FieldType<BinaryName>>,
    pub body: Vec<TypedStmt>,

    /// Whether control reaches the end of the body (only possible for `void` methods)
    pub falls_through: bool,
}

pub fn method_access_flags(modifiers: &Modifiers) -> MethodAccessFlags {
    let mut flags = MethodAccessFlags::empty();
    flags.set(MethodAccessFlags::PUBLIC, modifiers.is_public);
    flags.set(MethodAccessFlags::PROTECTED, modifiers.is_protected);
    flags.set(MethodAccessFlags::PRIVATE, modifiers.is_private);
    flags.set(MethodAccessFlags::STATIC, modifiers.is_static);
    flags.set(MethodAccessFlags::FINAL, modifiers.is_final);
    flags
}

/// Resolves type names in the context of one compilation unit
pub struct Resolver<'a> {
    class_path: &'a dyn ClassPath,

    /// Package in internal form (`a/b`)
    package: Option<String>,
    unit_classes: Vec<BinaryName>,
    single_imports: HashMap<String, BinaryName>,
    on_demand_imports: Vec<String>,
}

impl<'a> Resolver<'a> {
    /// Set up resolution for a unit, checking its imports
    pub fn new(
        class_path: &'a dyn ClassPath,
        unit: &CompilationUnit,
        problems: &mut Vec<Problem>,
    ) -> Resolver<'a> {
        let package = unit.package.as_ref().map(|package| package.replace('.', "/"));
        let mut resolver = Resolver {
            class_path,
            unit_classes: vec![],
            single_imports: HashMap::new(),
            on_demand_imports: vec![],
            package,
        };
        resolver.unit_classes = unit
            .classes
            .iter()
            .filter_map(|class| resolver.top_level_name(&class.name).ok())
            .collect();

        for import in &unit.imports {
            if import.on_demand {
                resolver.on_demand_imports.push(import.path.replace('.', "/"));
                continue;
            }
            let segments: Vec<&str> = import.path.split('.').collect();
            match resolver.resolve_qualified(&segments) {
                Ok(class) => {
                    let simple = segments[segments.len() - 1].to_owned();
                    resolver.single_imports.insert(simple, class);
                }
                Err(message) => problems.push((import.line, message)),
            }
        }
        resolver
    }

    pub fn class_path(&self) -> &'a dyn ClassPath {
        self.class_path
    }

    fn exists(&self, name: &BinaryName) -> bool {
        self.class_path.find_class(name).is_some()
    }

    /// Binary name of a top-level class declared in this unit
    pub fn top_level_name(&self, simple: &str) -> Result<BinaryName, String> {
        match &self.package {
            Some(package) => BinaryName::from_string(format!("{}/{}", package, simple)),
            None => BinaryName::from_string(simple.to_owned()),
        }
    }

    fn nested(&self, outer: &BinaryName, simple: &str) -> Option<BinaryName> {
        let inner = UnqualifiedName::from_string(simple.to_owned()).ok()?;
        let nested = outer.nested(&inner);
        if self.exists(&nested) {
            Some(nested)
        } else {
            None
        }
    }

    fn in_package(&self, package: &str, simple: &str) -> Option<BinaryName> {
        let name = if package.is_empty() {
            BinaryName::from_string(simple.to_owned()).ok()?
        } else {
            BinaryName::from_string(format!("{}/{}", package, simple)).ok()?
        };
        if self.exists(&name) {
            Some(name)
        } else {
            None
        }
    }

    /// Simple type name, searched in the order Java scopes them
    fn resolve_simple(&self, simple: &str, enclosing: &[BinaryName]) -> Option<BinaryName> {
        for class in enclosing.iter().rev() {
            if class.class_segment().rsplit('$').next() == Some(simple) {
                return Some(class.clone());
            }
            if let Some(nested) = self.nested(class, simple) {
                return Some(nested);
            }
        }
        if let Some(class) = self
            .unit_classes
            .iter()
            .find(|class| class.class_segment() == simple)
        {
            return Some(class.clone());
        }
        if let Some(class) = self.single_imports.get(simple) {
            return Some(class.clone());
        }
        if let Some(class) = self.in_package(self.package.as_deref().unwrap_or(""), simple) {
            return Some(class);
        }
        if let Some(class) = self.in_package("java/lang", simple) {
            return Some(class);
        }
        self.on_demand_imports
            .iter()
            .find_map(|package| self.in_package(package, simple))
    }

    /// Fully qualified name, possibly naming a nested class (`a.b.Outer.Inner`)
    fn resolve_qualified(&self, segments: &[&str]) -> Result<BinaryName, String> {
        for split in 1..segments.len() {
            let package = segments[..split].join("/");
            if let Some(mut class) = self.in_package(&package, segments[split]) {
                for simple in &segments[split + 1..] {
                    class = self
                        .nested(&class, simple)
                        .ok_or_else(|| format!("cannot find symbol: class {}", simple))?;
                }
                return Ok(class);
            }
        }
        if segments.len() == 1 {
            Err(format!("cannot find symbol: class {}", segments[0]))
        } else {
            Err(format!(
                "package {} does not exist",
                segments[..segments.len() - 1].join(".")
            ))
        }
    }

    /// Resolve a (possibly qualified) class name as written in source
    pub fn resolve_class(&self, dotted: &str, enclosing: &[BinaryName]) -> Result<BinaryName, String> {
        let segments: Vec<&str> = dotted.split('.').collect();
        match self.resolve_simple(segments[0], enclosing) {
            Some(mut class) => {
                for simple in &segments[1..] {
                    class = self
                        .nested(&class, simple)
                        .ok_or_else(|| format!("cannot find symbol: class {}", simple))?;
                }
                Ok(class)
            }
            None if segments.len() == 1 => {
                Err(format!("cannot find symbol: class {}", segments[0]))
            }
            None => self.resolve_qualified(&segments),
        }
    }

    pub fn resolve_type(
        &self,
        type_name: &TypeName,
        enclosing: &[BinaryName],
    ) -> Result<FieldType<BinaryName>, String> {
        let mut field_type = match primitive(&type_name.name) {
            Some(FieldType::Base(BaseType::Float | BaseType::Double)) => {
                return Err(String::from("floating point types are not supported"))
            }
            Some(field_type) => field_type,
            None => FieldType::object(self.resolve_class(&type_name.name, enclosing)?),
        };
        for _ in 0..type_name.dimensions {
            field_type = FieldType::array(field_type);
        }
        Ok(field_type)
    }

    /// Resolve the parameter and return types of a declared method
    pub fn resolve_signature(
        &self,
        method: &MethodDecl,
        enclosing: &[BinaryName],
    ) -> Result<Signature, Problem> {
        let mut parameters = vec![];
        for parameter in &method.parameters {
            let field_type = self
                .resolve_type(&parameter.type_name, enclosing)
                .map_err(|message| (parameter.line, message))?;
            parameters.push((parameter.name.clone(), field_type));
        }
        let return_type = match &method.return_type {
            None => None,
            Some(type_name) => Some(
                self.resolve_type(type_name, enclosing)
                    .map_err(|message| (type_name.line, message))?,
            ),
        };
        Ok(Signature {
            name: method.name.clone(),
            access_flags: method_access_flags(&method.modifiers),
            descriptor: MethodDescriptor {
                parameters: parameters.iter().map(|(_, ty)| ty.clone()).collect(),
                return_type,
            },
            parameters,
            line: method.line,
        })
    }
}

/// Whether a value of type `from` can be passed where `to` is expected without an explicit cast
pub fn is_assignable(class_path: &dyn ClassPath, from: &Type, to: &FieldType<BinaryName>) -> bool {
    match (from, to) {
        (Type::Value(FieldType::Base(from)), FieldType::Base(to)) => widens_to(*from, *to),
        (Type::Null, FieldType::Ref(_)) => true,
        (Type::Value(FieldType::Ref(from)), FieldType::Ref(to)) => {
            is_java_assignable(class_path, from, to)
        }
        _ => false,
    }
}

struct LocalState {
    field_type: FieldType<BinaryName>,
    initialized: bool,
    is_final: bool,
}

/// Attribution of one method body
pub struct BodyAttr<'r, 'a> {
    resolver: &'r Resolver<'a>,

    /// Enclosing classes, outermost first (the last one declares the method)
    enclosing: &'r [BinaryName],
    signature: &'r Signature,
    locals: Vec<LocalState>,
    scope: HashMap<String, LocalId>,
}

impl<'r, 'a> BodyAttr<'r, 'a> {
    pub fn new(
        resolver: &'r Resolver<'a>,
        enclosing: &'r [BinaryName],
        signature: &'r Signature,
    ) -> BodyAttr<'r, 'a> {
        let mut attr = BodyAttr {
            resolver,
            enclosing,
            signature,
            locals: vec![],
            scope: HashMap::new(),
        };
        for (name, field_type) in &signature.parameters {
            let local = attr.locals.len();
            attr.locals.push(LocalState {
                field_type: field_type.clone(),
                initialized: true,
                is_final: false,
            });
            attr.scope.insert(name.clone(), local);
        }
        attr
    }

    fn class_path(&self) -> &'a dyn ClassPath {
        self.resolver.class_path()
    }

    /// Attribute the whole body, collecting every problem found
    pub fn attribute(mut self, body: &[Stmt], problems: &mut Vec<Problem>) -> TypedMethod {
        let mut typed = vec![];
        let mut reachable = true;

        for stmt in body {
            if !reachable {
                problems.push((stmt.line(), String::from("unreachable statement")));
                break;
            }
            match self.statement(stmt) {
                Ok(stmt) => {
                    reachable = !matches!(stmt, TypedStmt::Return(_) | TypedStmt::Throw(_));
                    typed.push(stmt);
                }
                Err(problem) => {
                    reachable = !matches!(stmt, Stmt::Return(..) | Stmt::Throw(..));
                    problems.push(problem);
                }
            }
        }

        if reachable && self.signature.descriptor.return_type.is_some() {
            problems.push((self.signature.line, String::from("missing return statement")));
        }

        TypedMethod {
            signature: self.signature.clone(),
            locals: self.locals.into_iter().map(|local| local.field_type).collect(),
            body: typed,
            falls_through: reachable,
        }
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<TypedStmt, Problem> {
        match stmt {
            Stmt::Local {
                type_name,
                name,
                is_final,
                init,
                line,
            } => {
                if self.scope.contains_key(name) {
                    return Err((
                        *line,
                        format!(
                            "variable {} is already defined in method {}",
                            name,
                            self.signature.display()
                        ),
                    ));
                }
                let field_type = self
                    .resolver
                    .resolve_type(type_name, self.enclosing)
                    .map_err(|message| (type_name.line, message))?;

                // Declare even if the initializer is wrong, so later uses don't cascade
                let local = self.locals.len();
                self.locals.push(LocalState {
                    field_type: field_type.clone(),
                    initialized: false,
                    is_final: false,
                });
                self.scope.insert(name.clone(), local);

                let init = match init {
                    Some(init) => {
                        let value = self
                            .value(init)
                            .and_then(|value| self.convert(value, &field_type, init.line));
                        self.locals[local].initialized = true;
                        Some(value?)
                    }
                    None => None,
                };
                self.locals[local].initialized = init.is_some();
                self.locals[local].is_final = *is_final;
                Ok(TypedStmt::Declare { local, init })
            }

            Stmt::Assign { name, value, line } => {
                let local = *self
                    .scope
                    .get(name)
                    .ok_or_else(|| (*line, format!("cannot find symbol: variable {}", name)))?;
                let state = &self.locals[local];
                if state.is_final && state.initialized {
                    return Err((
                        *line,
                        format!("cannot assign a value to final variable {}", name),
                    ));
                }
                let field_type = state.field_type.clone();
                let typed = self.value(value)?;
                let value = self.convert(typed, &field_type, value.line)?;
                self.locals[local].initialized = true;
                Ok(TypedStmt::Store { local, value })
            }

            Stmt::Return(value, line) => {
                match (value, self.signature.descriptor.return_type.clone()) {
                    (None, None) => Ok(TypedStmt::Return(None)),
                    (Some(_), None) => Err((
                        *line,
                        String::from("incompatible types: unexpected return value"),
                    )),
                    (None, Some(_)) => Err((
                        *line,
                        String::from("incompatible types: missing return value"),
                    )),
                    (Some(value), Some(return_type)) => {
                        let typed = self.value(value)?;
                        let typed = self.convert(typed, &return_type, value.line)?;
                        Ok(TypedStmt::Return(Some(typed)))
                    }
                }
            }

            Stmt::Throw(value, _) => {
                let typed = self.value(value)?;
                let throwable = FieldType::object(BinaryName::THROWABLE);
                if !is_assignable(self.class_path(), &typed.ty, &throwable) {
                    return Err((
                        value.line,
                        format!(
                            "incompatible types: {} cannot be converted to Throwable",
                            typed.ty
                        ),
                    ));
                }
                Ok(TypedStmt::Throw(typed))
            }

            Stmt::Expr(expr) => self.expression(expr).map(TypedStmt::Expr),
        }
    }

    /// Apply assignment conversion (JLS 5.2) to a value
    fn convert(
        &self,
        value: Typed,
        to: &FieldType<BinaryName>,
        line: usize,
    ) -> Result<Typed, Problem> {
        // Constant narrowing (`byte b = 1;`)
        if let (TypedKind::Int(constant), FieldType::Base(base)) = (&value.kind, to) {
            let fits = match base {
                BaseType::Byte => i8::try_from(*constant).is_ok(),
                BaseType::Short => i16::try_from(*constant).is_ok(),
                BaseType::Char => u16::try_from(*constant).is_ok(),
                _ => false,
            };
            if fits {
                return Ok(value);
            }
        }
        self.invocation_convert(value, to).map_err(|value| {
            let message = match (value.ty.base(), to) {
                (Some(from), FieldType::Base(to)) if from != BaseType::Boolean && *to != BaseType::Boolean => {
                    format!(
                        "incompatible types: possible lossy conversion from {} to {}",
                        from.java_name(),
                        to.java_name()
                    )
                }
                _ => format!(
                    "incompatible types: {} cannot be converted to {}",
                    value.ty,
                    display_field_type(to)
                ),
            };
            (line, message)
        })
    }

    /// Method invocation conversion: widening only, no boxing
    fn invocation_convert(&self, value: Typed, to: &FieldType<BinaryName>) -> Result<Typed, Typed> {
        if !is_assignable(self.class_path(), &value.ty, to) {
            return Err(value);
        }
        match (value.ty.base(), to) {
            (Some(from), FieldType::Base(BaseType::Long)) if from != BaseType::Long => Ok(Typed {
                kind: TypedKind::Widen(Box::new(value)),
                ty: Type::Value(FieldType::long()),
            }),
            _ => Ok(value),
        }
    }

    /// An expression whose value is used (so it can't be `void`)
    fn value(&mut self, expr: &Expr) -> Result<Typed, Problem> {
        let typed = self.expression(expr)?;
        if typed.ty == Type::Void {
            return Err((expr.line, String::from("'void' type not allowed here")));
        }
        Ok(typed)
    }

    fn expression(&mut self, expr: &Expr) -> Result<Typed, Problem> {
        let line = expr.line;
        let (kind, ty) = match &expr.kind {
            ExprKind::Int(value) => {
                let value = i32::try_from(*value).map_err(|_| {
                    (line, format!("integer number too large: {}", value.unsigned_abs()))
                })?;
                (TypedKind::Int(value), Type::Value(FieldType::int()))
            }
            ExprKind::Long(value) => {
                let value = i64::try_from(*value).map_err(|_| {
                    (line, format!("integer number too large: {}", value.unsigned_abs()))
                })?;
                (TypedKind::Long(value), Type::Value(FieldType::long()))
            }
            ExprKind::Str(string) => (
                TypedKind::Str(string.clone()),
                Type::Value(FieldType::object(BinaryName::STRING)),
            ),
            ExprKind::Bool(value) => (TypedKind::Bool(*value), Type::Value(FieldType::boolean())),
            ExprKind::Null => (TypedKind::Null, Type::Null),

            ExprKind::Name(name) => {
                let local = *self
                    .scope
                    .get(name)
                    .ok_or_else(|| (line, format!("cannot find symbol: variable {}", name)))?;
                let state = &self.locals[local];
                if !state.initialized {
                    return Err((
                        line,
                        format!("variable {} might not have been initialized", name),
                    ));
                }
                (TypedKind::Local(local), Type::Value(state.field_type.clone()))
            }

            ExprKind::Select(qualifier, name) => {
                let missing = match expr.as_path() {
                    Some(path) if !self.scope.contains_key(path[0]) => {
                        match self.resolver.resolve_class(&path[..path.len() - 1].join("."), self.enclosing) {
                            Ok(_) => name.as_str(),
                            Err(_) => path[0],
                        }
                    }
                    _ => {
                        self.value(qualifier)?;
                        name.as_str()
                    }
                };
                return Err((line, format!("cannot find symbol: variable {}", missing)));
            }

            ExprKind::Neg(operand) => {
                let operand = self.value(operand)?;
                let ty = match operand.ty.base() {
                    Some(BaseType::Long) => Type::Value(FieldType::long()),
                    Some(BaseType::Int | BaseType::Short | BaseType::Byte | BaseType::Char) => {
                        Type::Value(FieldType::int())
                    }
                    _ => {
                        return Err((
                            line,
                            format!("bad operand type {} for unary operator '-'", operand.ty),
                        ))
                    }
                };
                (TypedKind::Neg(Box::new(operand)), ty)
            }

            ExprKind::Binary(op, lhs, rhs) => {
                let lhs = self.value(lhs)?;
                let rhs = self.value(rhs)?;
                return self.binary(*op, lhs, rhs, line);
            }

            ExprKind::Call {
                receiver,
                name,
                args,
            } => return self.call(receiver.as_deref(), name, args, line),

            ExprKind::New { type_name, args } => {
                let class = self
                    .resolver
                    .resolve_class(&type_name.name, self.enclosing)
                    .map_err(|message| (line, message))?;
                let args = self.arguments(args)?;
                let is_interface = self
                    .class_path()
                    .find_class(&class)
                    .map_or(false, |data| data.is_interface);
                if is_interface {
                    return Err((
                        line,
                        format!("{} is abstract; cannot be instantiated", simple_name(&class)),
                    ));
                }
                let candidates = visible_methods(self.class_path(), &class, "<init>");
                let constructor = self.select(&candidates, &class, "<init>", &args, line)?;
                let args = self.convert_arguments(args, &constructor.descriptor);
                let ty = Type::Value(FieldType::object(class.clone()));
                (
                    TypedKind::New {
                        class,
                        descriptor: constructor.descriptor,
                        args,
                    },
                    ty,
                )
            }
        };
        Ok(Typed { kind, ty })
    }

    fn binary(&mut self, op: BinOp, lhs: Typed, rhs: Typed, line: usize) -> Result<Typed, Problem> {
        if op == BinOp::Add && (lhs.ty.is_string() || rhs.ty.is_string()) {
            let mut parts = match lhs.kind {
                TypedKind::Concat(parts) => parts,
                kind => vec![Typed { kind, ty: lhs.ty }],
            };
            parts.push(rhs);
            return Ok(Typed {
                kind: TypedKind::Concat(parts),
                ty: Type::Value(FieldType::object(BinaryName::STRING)),
            });
        }

        let integral = |base: Option<BaseType>| {
            matches!(
                base,
                Some(BaseType::Byte | BaseType::Short | BaseType::Char | BaseType::Int | BaseType::Long)
            )
        };
        if !integral(lhs.ty.base()) || !integral(rhs.ty.base()) {
            return Err((
                line,
                format!(
                    "bad operand types for binary operator '{}' (first type: {}, second type: {})",
                    op.symbol(),
                    lhs.ty,
                    rhs.ty
                ),
            ));
        }

        // Binary numeric promotion
        let is_long = lhs.ty.base() == Some(BaseType::Long) || rhs.ty.base() == Some(BaseType::Long);
        let result = if is_long {
            FieldType::long()
        } else {
            FieldType::int()
        };
        let promote = |operand: Typed| -> Typed {
            if is_long && operand.ty.base() != Some(BaseType::Long) {
                Typed {
                    kind: TypedKind::Widen(Box::new(operand)),
                    ty: Type::Value(FieldType::long()),
                }
            } else {
                operand
            }
        };
        Ok(Typed {
            kind: TypedKind::Arith(op, Box::new(promote(lhs)), Box::new(promote(rhs))),
            ty: Type::Value(result),
        })
    }

    fn arguments(&mut self, args: &[Expr]) -> Result<Vec<Typed>, Problem> {
        args.iter().map(|arg| self.value(arg)).collect()
    }

    fn convert_arguments(
        &self,
        args: Vec<Typed>,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Vec<Typed> {
        args.into_iter()
            .zip(&descriptor.parameters)
            .map(|(arg, parameter)| match self.invocation_convert(arg, parameter) {
                Ok(arg) | Err(arg) => arg,
            })
            .collect()
    }

    /// If the receiver of a call names a class, resolve it
    fn static_qualifier(&self, receiver: &Expr) -> Result<Option<BinaryName>, Problem> {
        let path = match receiver.as_path() {
            Some(path) if !self.scope.contains_key(path[0]) => path,
            _ => return Ok(None),
        };
        match self.resolver.resolve_class(&path.join("."), self.enclosing) {
            Ok(class) => Ok(Some(class)),
            Err(_) if path.len() == 1 => Err((
                receiver.line,
                format!("cannot find symbol: variable {}", path[0]),
            )),
            Err(message) => Err((receiver.line, message)),
        }
    }

    fn call(
        &mut self,
        receiver: Option<&Expr>,
        name: &str,
        args: &[Expr],
        line: usize,
    ) -> Result<Typed, Problem> {
        let static_class = match receiver {
            None => None,
            Some(receiver) => self.static_qualifier(receiver)?,
        };
        let args = self.arguments(args)?;
        let non_static = |method: &MethodData| {
            (
                line,
                format!(
                    "non-static method {} cannot be referenced from a static context",
                    display_signature(name, &method.descriptor.parameters)
                ),
            )
        };

        let (kind, class, method, receiver) = match (receiver, static_class) {
            // Unqualified: innermost enclosing class with a method of that name
            (None, _) => {
                let class = self
                    .enclosing
                    .iter()
                    .rev()
                    .find(|class| !visible_methods(self.class_path(), class, name).is_empty())
                    .cloned()
                    .ok_or_else(|| {
                        (
                            line,
                            format!(
                                "cannot find symbol: method {}({})",
                                name,
                                display_arguments(&args)
                            ),
                        )
                    })?;
                let candidates = visible_methods(self.class_path(), &class, name);
                let method = self.select(&candidates, &class, name, &args, line)?;
                if !method.is_static {
                    return Err(non_static(&method));
                }
                (InvokeType::Static, class, method, None)
            }

            (Some(_), Some(class)) => {
                let candidates = visible_methods(self.class_path(), &class, name);
                let method = self.select(&candidates, &class, name, &args, line)?;
                if !method.is_static {
                    return Err(non_static(&method));
                }
                (InvokeType::Static, class, method, None)
            }

            (Some(receiver), None) => {
                let receiver = self.value(receiver)?;
                let class = match &receiver.ty {
                    Type::Value(FieldType::Ref(RefType::Object(class))) => class.clone(),
                    Type::Value(FieldType::Ref(_)) => BinaryName::OBJECT,
                    other => {
                        return Err((line, format!("{} cannot be dereferenced", other)));
                    }
                };
                let candidates = visible_methods(self.class_path(), &class, name);
                let method = self.select(&candidates, &class, name, &args, line)?;
                let is_interface = self
                    .class_path()
                    .find_class(&class)
                    .map_or(false, |data| data.is_interface);
                let kind = if method.is_static {
                    InvokeType::Static
                } else if is_interface {
                    InvokeType::Interface
                } else {
                    InvokeType::Virtual
                };
                (kind, class, method, Some(Box::new(receiver)))
            }
        };

        let args = self.convert_arguments(args, &method.descriptor);
        let ty = match &method.descriptor.return_type {
            None => Type::Void,
            Some(return_type) => Type::Value(return_type.clone()),
        };
        Ok(Typed {
            kind: TypedKind::Invoke {
                kind,
                class,
                name: method.name,
                descriptor: method.descriptor,
                receiver,
                args,
            },
            ty,
        })
    }

    /// Overload resolution: exact matches first, then matches through widening, picking the most
    /// specific method in each phase
    fn select(
        &self,
        candidates: &[(&ClassData, &MethodData)],
        class: &BinaryName,
        name: &str,
        args: &[Typed],
        line: usize,
    ) -> Result<MethodData, Problem> {
        let class_path = self.class_path();
        let arity = |method: &MethodData| method.descriptor.parameters.len() == args.len();

        let exact: Vec<&MethodData> = candidates
            .iter()
            .map(|(_, method)| *method)
            .filter(|method| {
                arity(method)
                    && args
                        .iter()
                        .zip(&method.descriptor.parameters)
                        .all(|(arg, parameter)| arg.ty == Type::Value(parameter.clone()))
            })
            .collect();
        let applicable: Vec<&MethodData> = if !exact.is_empty() {
            exact
        } else {
            candidates
                .iter()
                .map(|(_, method)| *method)
                .filter(|method| {
                    arity(method)
                        && args
                            .iter()
                            .zip(&method.descriptor.parameters)
                            .all(|(arg, parameter)| is_assignable(class_path, &arg.ty, parameter))
                })
                .collect()
        };

        let more_specific = |m1: &MethodData, m2: &MethodData| {
            m1.descriptor
                .parameters
                .iter()
                .zip(&m2.descriptor.parameters)
                .all(|(p1, p2)| is_assignable(class_path, &Type::Value(p1.clone()), p2))
        };
        let most_specific: Vec<&MethodData> = applicable
            .iter()
            .filter(|m1| applicable.iter().all(|m2| more_specific(m1, m2)))
            .cloned()
            .collect();

        let is_constructor = name == "<init>";
        let display_name = if is_constructor {
            simple_name(class)
        } else {
            name.to_owned()
        };
        match (most_specific.first(), applicable.is_empty()) {
            (Some(method), _) => Ok((*method).clone()),
            (None, false) => Err((line, format!("reference to {} is ambiguous", display_name))),
            (None, true) if candidates.is_empty() => Err((
                line,
                format!(
                    "cannot find symbol: {} {}({})",
                    if is_constructor { "constructor" } else { "method" },
                    display_name,
                    display_arguments(args)
                ),
            )),
            (None, true) if candidates.len() == 1 => Err((
                line,
                format!(
                    "{} {} in class {} cannot be applied to given types",
                    if is_constructor { "constructor" } else { "method" },
                    display_name,
                    simple_name(&candidates[0].0.name)
                ),
            )),
            (None, true) => Err((
                line,
                format!(
                    "no suitable {} found for {}({})",
                    if is_constructor { "constructor" } else { "method" },
                    display_name,
                    display_arguments(args)
                ),
            )),
        }
    }
}

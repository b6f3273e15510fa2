//! In-memory compilation of generated wrapper source into class files
//!
//! The accepted language is the subset of Java that wrapper code for debugger expressions needs:
//! classes (and `static` nested classes) holding static methods made of straight-line statements.
//! Nothing touches the filesystem: classes already compiled elsewhere are made visible through a
//! [`ClassPath`].

mod ast;
mod attr;
mod classpath;
mod codegen;
mod errors;
pub(crate) mod lexer;
mod parser;

pub use classpath::{ClassData, ClassFileClassPath, ClassPath, ClassPathChain, MethodData, PlatformClassPath};
pub use errors::{CompileError, Diagnostic};

use crate::jvm::{BinaryName, Name, MethodDescriptor, UnqualifiedName, Version};
use ast::ClassDecl;
use attr::{BodyAttr, Problem, Resolver, Signature};
use codegen::TypedClass;
use log::debug;
use std::collections::HashMap;

/// Source of one compilation unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceUnit {
    /// Dotted name of the unit's main class (`pkg.GeneratedEvaluationClass`)
    pub qualified_name: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(qualified_name: impl Into<String>, text: impl Into<String>) -> SourceUnit {
        SourceUnit {
            qualified_name: qualified_name.into(),
            text: text.into(),
        }
    }

    /// Name of the file the unit would have on disk (used for the `SourceFile` attribute)
    fn file_name(&self) -> String {
        let simple = self.qualified_name.rsplit('.').next().unwrap_or_default();
        format!("{}.java", simple)
    }
}

/// One emitted class
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Binary name in dotted form (`pkg.Outer$Inner`), as `ClassLoader.defineClass` expects it
    pub qualified_name: String,
    pub bytes: Vec<u8>,
}

impl CompiledUnit {
    /// Whether this class belongs to the generated evaluation code
    pub fn is_generated(&self, marker: &str) -> bool {
        self.qualified_name.contains(marker)
    }
}

/// Turns source units into class files
pub trait Compiler {
    fn compile(&self, units: &[SourceUnit], target: Version) -> Result<Vec<CompiledUnit>, CompileError>;
}

impl<C: Compiler + ?Sized> Compiler for &C {
    fn compile(&self, units: &[SourceUnit], target: Version) -> Result<Vec<CompiledUnit>, CompileError> {
        (**self).compile(units, target)
    }
}

/// Compiler for the wrapper subset of Java
pub struct JavaCompiler<P> {
    class_path: P,
}

impl JavaCompiler<PlatformClassPath> {
    /// Compiler that only sees the platform classes
    pub fn new() -> JavaCompiler<PlatformClassPath> {
        JavaCompiler::with_class_path(PlatformClassPath::new())
    }
}

impl Default for JavaCompiler<PlatformClassPath> {
    fn default() -> Self {
        JavaCompiler::new()
    }
}

impl<P: ClassPath> JavaCompiler<P> {
    pub fn with_class_path(class_path: P) -> JavaCompiler<P> {
        JavaCompiler { class_path }
    }

    pub fn class_path(&self) -> &P {
        &self.class_path
    }
}

/// Classes being compiled, in front of the external class path
struct SourceClassPath<'a> {
    source: &'a HashMap<BinaryName, ClassData>,
    external: &'a dyn ClassPath,
}

impl<'a> ClassPath for SourceClassPath<'a> {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.source
            .get(name)
            .or_else(|| self.external.find_class(name))
    }
}

/// Class declaration found in a unit, with where it sits
struct Declared<'u> {
    unit: usize,
    decl: &'u ClassDecl,

    /// Enclosing classes, outermost first, ending with the class itself
    scope: Vec<BinaryName>,
}

impl<'u> Declared<'u> {
    fn name(&self) -> &BinaryName {
        &self.scope[self.scope.len() - 1]
    }

    fn outer(&self) -> Option<&BinaryName> {
        self.scope.len().checked_sub(2).map(|idx| &self.scope[idx])
    }
}

fn declare<'u>(
    unit: usize,
    decl: &'u ClassDecl,
    mut scope: Vec<BinaryName>,
    name: BinaryName,
    declared: &mut Vec<Declared<'u>>,
    problems: &mut Vec<Problem>,
) {
    if scope.is_empty() && decl.modifiers.is_static {
        problems.push((decl.line, String::from("modifier static not allowed here")));
    } else if !scope.is_empty() && !decl.modifiers.is_static {
        problems.push((
            decl.line,
            format!("inner classes are not supported: declare {} static", decl.name),
        ));
    }

    scope.push(name);
    let index = declared.len();
    declared.push(Declared {
        unit,
        decl,
        scope: scope.clone(),
    });
    for nested in &decl.classes {
        match UnqualifiedName::from_string(nested.name.clone()) {
            Ok(simple) => {
                let nested_name = declared[index].name().nested(&simple);
                declare(unit, nested, scope.clone(), nested_name, declared, problems);
            }
            Err(message) => problems.push((nested.line, message)),
        }
    }
}

impl<P: ClassPath> Compiler for JavaCompiler<P> {
    fn compile(&self, units: &[SourceUnit], target: Version) -> Result<Vec<CompiledUnit>, CompileError> {
        let mut problems: Vec<Vec<Problem>> = units.iter().map(|_| vec![]).collect();

        // Parse everything, so that syntax errors in several units are all reported
        let mut parsed = vec![];
        for (idx, unit) in units.iter().enumerate() {
            match parser::parse(&unit.text) {
                Ok(compilation_unit) => parsed.push(Some(compilation_unit)),
                Err(err) => {
                    problems[idx].push((err.line, err.message));
                    parsed.push(None);
                }
            }
        }

        // Declare class names
        let mut declared: Vec<Declared> = vec![];
        let mut source: HashMap<BinaryName, ClassData> = HashMap::new();
        for (idx, compilation_unit) in parsed.iter().enumerate() {
            let compilation_unit = match compilation_unit {
                Some(compilation_unit) => compilation_unit,
                None => continue,
            };
            let package = compilation_unit.package.as_ref().map(|p| p.replace('.', "/"));
            for decl in &compilation_unit.classes {
                let name = match &package {
                    Some(package) => BinaryName::from_string(format!("{}/{}", package, decl.name)),
                    None => BinaryName::from_string(decl.name.clone()),
                };
                match name {
                    Ok(name) => declare(idx, decl, vec![], name, &mut declared, &mut problems[idx]),
                    Err(message) => problems[idx].push((decl.line, message)),
                }
            }
        }
        let mut unique = vec![];
        for class in &declared {
            let name = class.name().clone();
            if source.contains_key(&name) {
                problems[class.unit].push((
                    class.decl.line,
                    format!("duplicate class: {}", name.to_java_name().replace('$', ".")),
                ));
                continue;
            }
            source.insert(
                name.clone(),
                ClassData {
                    name: name.clone(),
                    superclass: Some(BinaryName::OBJECT),
                    interfaces: vec![],
                    is_interface: false,
                    methods: vec![MethodData {
                        name: String::from("<init>"),
                        descriptor: MethodDescriptor {
                            parameters: vec![],
                            return_type: None,
                        },
                        is_static: false,
                    }],
                },
            );
            unique.push(class);
        }

        // Resolve method signatures
        let mut signatures: Vec<Vec<(usize, Signature)>> = vec![];
        {
            let class_path = SourceClassPath {
                source: &source,
                external: &self.class_path,
            };
            let resolvers: Vec<Option<Resolver>> = parsed
                .iter()
                .zip(problems.iter_mut())
                .map(|(unit, problems)| {
                    unit.as_ref()
                        .map(|unit| Resolver::new(&class_path, unit, problems))
                })
                .collect();

            for class in &unique {
                let resolver = match &resolvers[class.unit] {
                    Some(resolver) => resolver,
                    None => continue,
                };
                let mut resolved: Vec<(usize, Signature)> = vec![];
                for (method_idx, method) in class.decl.methods.iter().enumerate() {
                    if !method.modifiers.is_static {
                        problems[class.unit].push((
                            method.line,
                            format!("instance methods are not supported: declare {} static", method.name),
                        ));
                        continue;
                    }
                    match resolver.resolve_signature(method, &class.scope) {
                        Ok(signature) => {
                            let duplicate = resolved.iter().any(|(_, other)| {
                                other.name == signature.name
                                    && other.descriptor.parameters == signature.descriptor.parameters
                            });
                            if duplicate {
                                problems[class.unit].push((
                                    method.line,
                                    format!(
                                        "method {} is already defined in class {}",
                                        signature.display(),
                                        class.decl.name
                                    ),
                                ));
                            } else {
                                resolved.push((method_idx, signature));
                            }
                        }
                        Err(problem) => problems[class.unit].push(problem),
                    }
                }
                signatures.push(resolved);
            }
        }
        for (class, resolved) in unique.iter().zip(&signatures) {
            if let Some(data) = source.get_mut(class.name()) {
                data.methods.extend(resolved.iter().map(|(_, signature)| MethodData {
                    name: signature.name.clone(),
                    descriptor: signature.descriptor.clone(),
                    is_static: true,
                }));
            }
        }

        // Attribute method bodies
        let mut typed_classes = vec![];
        {
            let class_path = SourceClassPath {
                source: &source,
                external: &self.class_path,
            };
            let mut ignored = vec![];
            let resolvers: Vec<Option<Resolver>> = parsed
                .iter()
                .map(|unit| {
                    unit.as_ref()
                        .map(|unit| Resolver::new(&class_path, unit, &mut ignored))
                })
                .collect();

            for (class, resolved) in unique.iter().zip(&signatures) {
                let resolver = match &resolvers[class.unit] {
                    Some(resolver) => resolver,
                    None => continue,
                };
                let mut methods = vec![];
                for (method_idx, signature) in resolved {
                    let body = &class.decl.methods[*method_idx].body;
                    let attr = BodyAttr::new(resolver, &class.scope, signature);
                    methods.push(attr.attribute(body, &mut problems[class.unit]));
                }
                let members = unique
                    .iter()
                    .filter(|member| member.outer() == Some(class.name()))
                    .map(|member| (member.name().clone(), member.decl.modifiers))
                    .collect();
                typed_classes.push(TypedClass {
                    name: class.name().clone(),
                    modifiers: class.decl.modifiers,
                    outer: class.outer().cloned(),
                    members,
                    methods,
                    source_file: units[class.unit].file_name(),
                });
            }
        }

        let diagnostics: Vec<Diagnostic> = units
            .iter()
            .zip(problems)
            .flat_map(|(unit, problems)| {
                problems.into_iter().map(move |(line, message)| Diagnostic {
                    unit: unit.qualified_name.clone(),
                    line,
                    message,
                })
            })
            .collect();
        if !diagnostics.is_empty() {
            debug!("compilation failed with {} diagnostic(s)", diagnostics.len());
            return Err(CompileError::Diagnostics(diagnostics));
        }

        let mut compiled = vec![];
        for class in &typed_classes {
            compiled.push(CompiledUnit {
                qualified_name: class.name.to_java_name(),
                bytes: codegen::generate(class, target)?,
            });
        }
        debug!(
            "compiled {} unit(s) into {} class(es) targeting Java {}",
            units.len(),
            compiled.len(),
            target.feature_release()
        );
        Ok(compiled)
    }
}

//! Running the call that kicks off the generated code

use crate::compile::lexer::{tokenize, Token};
use crate::jvm::class_file::ClassFile;
use crate::jvm::{
    BinaryName, FieldType, MethodDescriptor, ParseDescriptor, RefType,
};
use crate::remote::{
    InvokeTarget, PrimitiveValue, RemoteClass, RemoteError, RemoteRuntime, RemoteValue,
    SuspendContext,
};
use log::debug;

/// Call ready to be executed in the target
pub trait CallEvaluator {
    fn evaluate<R: RemoteRuntime>(
        &self,
        context: &mut SuspendContext<R>,
    ) -> Result<RemoteValue, RemoteError>;
}

/// Turns call text into a [`CallEvaluator`] once the generated class is defined
pub trait CallEvaluatorFactory {
    type Evaluator: CallEvaluator;

    /// Build the call (errors describe what is wrong with the call text)
    fn build(
        &self,
        call_text: &str,
        generated: &RemoteClass,
        class_file: &ClassFile,
    ) -> Result<Self::Evaluator, String>;
}

/// Argument literal in call text
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Boolean(bool),
    Str(String),
    Null,
}

impl Literal {
    /// Cost of passing the literal as `parameter` (`0` for an exact match), if possible at all
    fn conversion_cost(&self, parameter: &FieldType<BinaryName>) -> Option<u32> {
        let widened_string = [
            BinaryName::OBJECT,
            BinaryName::CHARSEQUENCE,
            BinaryName::COMPARABLE,
            BinaryName::SERIALIZABLE,
        ];
        match (self, parameter) {
            (Literal::Int(_), parameter) if *parameter == FieldType::int() => Some(0),
            (Literal::Int(_), parameter) if *parameter == FieldType::long() => Some(1),
            (Literal::Long(_), parameter) if *parameter == FieldType::long() => Some(0),
            (Literal::Boolean(_), parameter) if *parameter == FieldType::boolean() => Some(0),
            (Literal::Str(_), FieldType::Ref(RefType::Object(class))) => {
                if *class == BinaryName::STRING {
                    Some(0)
                } else if widened_string.contains(class) {
                    Some(1)
                } else {
                    None
                }
            }
            (Literal::Null, FieldType::Ref(_)) => Some(0),
            _ => None,
        }
    }
}

/// Call of a static method of the generated class with literal arguments
#[derive(Clone, Debug, PartialEq)]
pub struct StaticCall {
    pub class: RemoteClass,
    pub method: String,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub args: Vec<Literal>,
}

impl CallEvaluator for StaticCall {
    fn evaluate<R: RemoteRuntime>(
        &self,
        context: &mut SuspendContext<R>,
    ) -> Result<RemoteValue, RemoteError> {
        let mut args = Vec::with_capacity(self.args.len());
        for (literal, parameter) in self.args.iter().zip(&self.descriptor.parameters) {
            let primitive = match literal {
                Literal::Int(value) if *parameter == FieldType::long() => {
                    PrimitiveValue::Long(i64::from(*value))
                }
                Literal::Int(value) => PrimitiveValue::Int(*value),
                Literal::Long(value) => PrimitiveValue::Long(*value),
                Literal::Boolean(value) => PrimitiveValue::Boolean(*value),
                Literal::Str(value) => {
                    args.push(RemoteValue::Object(context.mirror_string(value)?));
                    continue;
                }
                Literal::Null => {
                    args.push(RemoteValue::Null);
                    continue;
                }
            };
            args.push(context.runtime().mirror_primitive(primitive));
        }
        debug!("calling {}.{}", self.class.name, self.method);
        context.invoke_method(
            &InvokeTarget::Static(self.class.clone()),
            &self.method,
            &self.descriptor,
            &args,
        )
    }
}

/// Understands call text of the form `[Qualifier.]method(literal, ...)`
///
/// The qualifier, if present, must name the generated class (possibly abbreviated to its last
/// segments, as in `Outer.GeneratedEvaluationClass`).
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticCallFactory;

impl CallEvaluatorFactory for StaticCallFactory {
    type Evaluator = StaticCall;

    fn build(
        &self,
        call_text: &str,
        generated: &RemoteClass,
        class_file: &ClassFile,
    ) -> Result<StaticCall, String> {
        let parsed = parse_call(call_text)?;
        if let Some(qualifier) = &parsed.qualifier {
            let class_name = generated.name.replace('$', ".");
            if class_name != *qualifier && !class_name.ends_with(&format!(".{}", qualifier)) {
                return Err(format!(
                    "{} does not name the generated class {}",
                    qualifier, generated.name
                ));
            }
        }

        let mut best: Vec<(u32, MethodDescriptor<BinaryName>)> = vec![];
        for method in &class_file.methods {
            if !method.access_flags.is_static()
                || class_file.utf8(method.name_index) != Some(parsed.method.as_str())
            {
                continue;
            }
            let descriptor = match class_file
                .utf8(method.descriptor_index)
                .map(MethodDescriptor::<BinaryName>::parse)
            {
                Some(Ok(descriptor)) => descriptor,
                _ => continue,
            };
            if descriptor.parameters.len() != parsed.args.len() {
                continue;
            }
            let cost: Option<u32> = parsed
                .args
                .iter()
                .zip(&descriptor.parameters)
                .map(|(arg, parameter)| arg.conversion_cost(parameter))
                .sum();
            match (cost, best.first()) {
                (Some(cost), Some((best_cost, _))) if cost < *best_cost => {
                    best = vec![(cost, descriptor)]
                }
                (Some(cost), Some((best_cost, _))) if cost == *best_cost => {
                    best.push((cost, descriptor))
                }
                (Some(cost), None) => best.push((cost, descriptor)),
                _ => (),
            }
        }

        match best.len() {
            0 => Err(format!(
                "no static method {} in {} accepts {} argument(s) like these",
                parsed.method,
                generated.name,
                parsed.args.len()
            )),
            1 => {
                let (_, descriptor) = best.remove(0);
                Ok(StaticCall {
                    class: generated.clone(),
                    method: parsed.method,
                    descriptor,
                    args: parsed.args,
                })
            }
            _ => Err(format!("reference to {} is ambiguous", parsed.method)),
        }
    }
}

#[derive(Debug, PartialEq)]
struct ParsedCall {
    qualifier: Option<String>,
    method: String,
    args: Vec<Literal>,
}

fn parse_call(call_text: &str) -> Result<ParsedCall, String> {
    let tokens = tokenize(call_text).map_err(|err| err.message)?;
    let mut tokens = tokens.into_iter().map(|spanned| spanned.token).peekable();
    let unexpected = |token: Option<Token>| match token {
        Some(token) => format!("unexpected {} in call", token),
        None => String::from("call ended unexpectedly"),
    };

    let mut path = vec![];
    loop {
        match tokens.next() {
            Some(Token::Ident(ident)) => path.push(ident),
            other => return Err(unexpected(other)),
        }
        match tokens.next() {
            Some(Token::Punct('.')) => continue,
            Some(Token::Punct('(')) => break,
            other => return Err(unexpected(other)),
        }
    }
    let method = path.pop().ok_or_else(|| unexpected(None))?;
    let qualifier = if path.is_empty() {
        None
    } else {
        Some(path.join("."))
    };

    let mut args = vec![];
    if tokens.peek() == Some(&Token::Punct(')')) {
        tokens.next();
    } else {
        loop {
            let negative = tokens.peek() == Some(&Token::Punct('-'));
            if negative {
                tokens.next();
            }
            let literal = match (tokens.next(), negative) {
                (Some(Token::Int(value)), _) => {
                    let value = if negative { -(value as i128) } else { value as i128 };
                    i32::try_from(value)
                        .map(Literal::Int)
                        .map_err(|_| format!("integer number too large: {}", value))?
                }
                (Some(Token::Long(value)), _) => {
                    let value = if negative { -(value as i128) } else { value as i128 };
                    i64::try_from(value)
                        .map(Literal::Long)
                        .map_err(|_| format!("long number too large: {}", value))?
                }
                (Some(Token::Str(value)), false) => Literal::Str(value),
                (Some(Token::Ident(ident)), false) if ident == "true" => Literal::Boolean(true),
                (Some(Token::Ident(ident)), false) if ident == "false" => Literal::Boolean(false),
                (Some(Token::Ident(ident)), false) if ident == "null" => Literal::Null,
                (other, _) => return Err(unexpected(other)),
            };
            args.push(literal);
            match tokens.next() {
                Some(Token::Punct(',')) => continue,
                Some(Token::Punct(')')) => break,
                other => return Err(unexpected(other)),
            }
        }
    }

    if tokens.peek() == Some(&Token::Punct(';')) {
        tokens.next();
    }
    match tokens.next() {
        Some(Token::Eof) | None => Ok(ParsedCall {
            qualifier,
            method,
            args,
        }),
        other => Err(unexpected(other)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn call_text() {
        assert_eq!(
            parse_call("Outer.GeneratedEvaluationClass.invoke(1, -2147483648, 3L, \"s\", true, null);")
                .unwrap(),
            ParsedCall {
                qualifier: Some(String::from("Outer.GeneratedEvaluationClass")),
                method: String::from("invoke"),
                args: vec![
                    Literal::Int(1),
                    Literal::Int(i32::MIN),
                    Literal::Long(3),
                    Literal::Str(String::from("s")),
                    Literal::Boolean(true),
                    Literal::Null,
                ],
            }
        );
        assert_eq!(parse_call("invoke()").unwrap().qualifier, None);
        assert!(parse_call("invoke(2147483648)").is_err());
        assert!(parse_call("invoke(x)").is_err());
        assert!(parse_call("invoke(1").is_err());
        assert!(parse_call("a.invoke() b").is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(Literal::Int(1).conversion_cost(&FieldType::int()), Some(0));
        assert_eq!(Literal::Int(1).conversion_cost(&FieldType::long()), Some(1));
        assert_eq!(Literal::Long(1).conversion_cost(&FieldType::int()), None);
        let string = Literal::Str(String::from("s"));
        assert_eq!(string.conversion_cost(&FieldType::object(BinaryName::STRING)), Some(0));
        assert_eq!(string.conversion_cost(&FieldType::object(BinaryName::OBJECT)), Some(1));
        assert_eq!(string.conversion_cost(&FieldType::object(BinaryName::INTEGER)), None);
        assert_eq!(
            Literal::Null.conversion_cost(&FieldType::array(FieldType::byte())),
            Some(0)
        );
    }
}

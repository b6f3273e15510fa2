mod support;

use jeval::compile::{
    ClassFileClassPath, ClassPathChain, Compiler, JavaCompiler, PlatformClassPath, SourceUnit,
};
use jeval::evaluate::{
    CompilingEvaluator, EvaluateError, EvaluationRequest, EvaluationState, Settings,
    StaticCallFactory,
};
use jeval::jvm::Version;
use jeval::remote::{
    Cancellation, ObjectKind, ObjectRef, PrimitiveValue, RemoteValue, SuspendContext,
};
use support::{Call, FakeVm};

const MAGIC_ACCESSOR: &str = "sun/reflect/MagicAccessorImpl";

fn request(class: &str, source: &str, call: &str) -> EvaluationRequest {
    EvaluationRequest {
        call_text: call.to_owned(),
        generated_class_name: class.to_owned(),
        source_units: vec![SourceUnit::new(class, source)],
    }
}

/// Single static method `invoke` in `GeneratedEvaluationClass`
fn snippet(signature: &str, body: &str) -> EvaluationRequest {
    request(
        "GeneratedEvaluationClass",
        &format!(
            "public class GeneratedEvaluationClass {{\n    public static {} {{\n        {}\n    }}\n}}\n",
            signature, body
        ),
        "GeneratedEvaluationClass.invoke()",
    )
}

#[test]
fn one_plus_one() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let evaluation = CompilingEvaluator::new()
        .evaluate_traced(&snippet("int invoke()", "return 1 + 1;"), &mut context);

    assert_eq!(
        evaluation.result.unwrap(),
        RemoteValue::Primitive(PrimitiveValue::Int(2))
    );
    assert_eq!(
        evaluation.states,
        vec![
            EvaluationState::Idle,
            EvaluationState::ClassLoaderReady,
            EvaluationState::ClassesDefined,
            EvaluationState::CallResolved,
            EvaluationState::Completed,
        ]
    );
    context.resume().unwrap();

    assert!(vm.resumed);
    assert_eq!(vm.loaders.len(), 1);
    assert_eq!(vm.defined.len(), 1);
    assert_eq!(vm.defined[0].name, "GeneratedEvaluationClass");
    assert_eq!(vm.defined[0].superclass.as_deref(), Some(MAGIC_ACCESSOR));
    assert_eq!(vm.defined[0].loader, vm.loaders[0]);
    assert_eq!(vm.defined[0].version, Version::JAVA8);
    assert!(vm.pinned.is_empty());
}

#[test]
fn string_arguments_and_result() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let request = request(
        "GeneratedEvaluationClass",
        "class GeneratedEvaluationClass {
            static String invoke(String name, long count, boolean loud) {
                String greeting = \"hello \" + name;
                return greeting + \" x\" + count + \" \" + loud;
            }
        }",
        "GeneratedEvaluationClass.invoke(\"world\", 3, true)",
    );
    let value = CompilingEvaluator::new()
        .evaluate(&request, &mut context)
        .unwrap();

    let result = value.as_object().unwrap();
    assert!(context.pins().contains(&result));
    assert_eq!(context.runtime().string(result), Some("hello world x3 true"));
    context.resume().unwrap();

    assert!(vm.calls.contains(&Call::MirrorString(String::from("world"))));
    assert!(vm.pinned.is_empty());
}

#[test]
fn created_objects_are_pinned_before_the_next_call() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    CompilingEvaluator::new()
        .evaluate(&snippet("String invoke()", "return \"a\" + 1;"), &mut context)
        .unwrap();

    // URL[], loader, then the name, bytes, and `Class` of the generated class, and the result
    assert_eq!(context.pins().len(), 6);
    let loader = context.runtime().loaders[0];
    assert!(context.pins().contains(&loader));
    context.resume().unwrap();

    assert_eq!(vm.pin_log.len(), 6);
    assert_eq!(vm.returned(), vm.pin_log);
    assert!(vm.pinned_right_away());
    assert!(vm.pinned.is_empty());
}

#[test]
fn target_version_picks_the_class_file_version() {
    let mut vm = FakeVm::new();
    vm.version = String::from("17.0.2");
    let mut context = SuspendContext::new(&mut vm);
    CompilingEvaluator::new()
        .evaluate(&snippet("long invoke()", "return 5L * 7;"), &mut context)
        .unwrap();
    drop(context);
    assert_eq!(vm.defined[0].version, Version::JAVA17);

    let mut vm = FakeVm::new();
    vm.version = String::from("OpenJDK");
    let mut context = SuspendContext::new(&mut vm);
    let value = CompilingEvaluator::new()
        .evaluate(&snippet("long invoke()", "return 5L * 7;"), &mut context)
        .unwrap();
    assert_eq!(value, RemoteValue::Primitive(PrimitiveValue::Long(35)));
    drop(context);
    assert_eq!(vm.defined[0].version, Version::JAVA8);
}

#[test]
fn syntax_errors_define_nothing() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let evaluation = CompilingEvaluator::new()
        .evaluate_traced(&snippet("int invoke()", "return 1 +;"), &mut context);

    match &evaluation.result {
        Err(EvaluateError::Compilation(diagnostics)) => {
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].line, 3);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        evaluation.states,
        vec![
            EvaluationState::Idle,
            EvaluationState::ClassLoaderReady,
            EvaluationState::Failed,
        ]
    );
    drop(context);
    assert!(vm.defined.is_empty());
    assert!(!vm.invoked().contains(&"defineClass"));
    assert!(vm.pinned.is_empty());
}

#[test]
fn unknown_variable_is_reported_with_its_line() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let err = CompilingEvaluator::new()
        .evaluate(&snippet("int invoke()", "return unknownVar;"), &mut context)
        .unwrap_err();

    assert!(err.is_user_facing());
    assert_eq!(
        err.user_message(),
        "GeneratedEvaluationClass:3: error: cannot find symbol: variable unknownVar"
    );
}

#[test]
fn exceptions_become_evaluation_errors() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let evaluator = CompilingEvaluator::new();

    let evaluation = evaluator.evaluate_traced(
        &snippet("int invoke()", "throw new RuntimeException(\"x\");"),
        &mut context,
    );
    match &evaluation.result {
        Err(EvaluateError::Evaluation(message)) => assert_eq!(message, "x"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        evaluation.states.last(),
        Some(&EvaluationState::Failed)
    );
    assert_eq!(evaluation.states.len(), 5);

    // No message: the class name stands in
    match evaluator.evaluate(
        &snippet("void invoke()", "throw new IllegalStateException();"),
        &mut context,
    ) {
        Err(EvaluateError::Evaluation(message)) => {
            assert_eq!(message, "java.lang.IllegalStateException")
        }
        other => panic!("unexpected {:?}", other),
    }

    match evaluator.evaluate(
        &snippet("int invoke()", "int zero = 0;\n        return 1 / zero;"),
        &mut context,
    ) {
        Err(err) => assert_eq!(err.user_message(), "/ by zero"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn every_evaluation_gets_its_own_loader() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let evaluator = CompilingEvaluator::new();
    let first = evaluator
        .evaluate(&snippet("int invoke()", "return 1;"), &mut context)
        .unwrap();
    let second = evaluator
        .evaluate(&snippet("int invoke()", "return 2;"), &mut context)
        .unwrap();
    assert_eq!(first, RemoteValue::Primitive(PrimitiveValue::Int(1)));
    assert_eq!(second, RemoteValue::Primitive(PrimitiveValue::Int(2)));
    context.resume().unwrap();

    assert_eq!(vm.loaders.len(), 2);
    assert_ne!(vm.loaders[0], vm.loaders[1]);
    let loaders: Vec<_> = vm.defined.iter().map(|defined| defined.loader).collect();
    assert_eq!(loaders, vm.loaders);
}

#[test]
fn only_generated_classes_are_defined() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let request = EvaluationRequest {
        call_text: String::from("Outer.GeneratedEvaluationClass.invoke(21)"),
        generated_class_name: String::from("a.b.Outer$GeneratedEvaluationClass"),
        source_units: vec![SourceUnit::new(
            "a.b.Outer",
            "package a.b;
            public class Outer {
                static class GeneratedEvaluationClass {
                    public static long invoke(long x) { return x * 2; }
                }
                static class Helper {
                    static int answer() { return 42; }
                }
            }",
        )],
    };
    let value = CompilingEvaluator::new()
        .evaluate(&request, &mut context)
        .unwrap();
    assert_eq!(value, RemoteValue::Primitive(PrimitiveValue::Long(42)));
    drop(context);

    let defined: Vec<&str> = vm.defined.iter().map(|defined| defined.name.as_str()).collect();
    assert_eq!(defined, vec!["a.b.Outer$GeneratedEvaluationClass"]);
    assert_eq!(vm.defined[0].superclass.as_deref(), Some(MAGIC_ACCESSOR));
}

#[test]
fn generated_code_sees_the_debuggee() {
    let library = JavaCompiler::new()
        .compile(
            &[SourceUnit::new(
                "app.Util",
                "package app; public class Util { public static int answer() { return 42; } }",
            )],
            Version::JAVA8,
        )
        .unwrap();
    let mut application = ClassFileClassPath::new();
    application.add_class_file(&library[0].bytes).unwrap();
    let compiler = JavaCompiler::with_class_path(
        ClassPathChain::new()
            .with(PlatformClassPath::new())
            .with(application),
    );

    let mut vm = FakeVm::new();
    vm.preload(&library[0].bytes);
    let mut context = SuspendContext::new(&mut vm);
    let evaluator =
        CompilingEvaluator::with_compiler(compiler, StaticCallFactory, Settings::default());
    let value = evaluator
        .evaluate(
            &request(
                "GeneratedEvaluationClass",
                "import app.Util;
                class GeneratedEvaluationClass {
                    static int invoke() { return Util.answer() + Math.max(1, 2); }
                }",
                "invoke()",
            ),
            &mut context,
        )
        .unwrap();
    assert_eq!(value, RemoteValue::Primitive(PrimitiveValue::Int(44)));
    drop(context);

    // The library class comes from the debuggee, not from the evaluation
    assert_eq!(vm.defined.len(), 1);
}

#[test]
fn cancelled_before_starting() {
    let mut vm = FakeVm::new();
    let cancellation = Cancellation::new();
    let mut context = SuspendContext::with_cancellation(&mut vm, cancellation.clone());
    cancellation.cancel();

    let evaluation = CompilingEvaluator::new()
        .evaluate_traced(&snippet("int invoke()", "return 1;"), &mut context);
    assert!(matches!(evaluation.result, Err(EvaluateError::Cancelled)));
    assert_eq!(
        evaluation.states,
        vec![EvaluationState::Idle, EvaluationState::Failed]
    );
    drop(context);
    assert!(vm.calls.is_empty());
}

#[test]
fn cancelled_while_defining() {
    let mut vm = FakeVm::new();
    let cancellation = Cancellation::new();
    vm.cancel_on_define = Some(cancellation.clone());
    let mut context = SuspendContext::with_cancellation(&mut vm, cancellation);

    let evaluation = CompilingEvaluator::new()
        .evaluate_traced(&snippet("int invoke()", "return 1;"), &mut context);
    assert!(matches!(evaluation.result, Err(EvaluateError::Cancelled)));
    assert_eq!(
        evaluation.states,
        vec![
            EvaluationState::Idle,
            EvaluationState::ClassLoaderReady,
            EvaluationState::Failed,
        ]
    );
    drop(context);
    assert_eq!(vm.invoked(), vec!["defineClass"]);

    // The defined `Class` is never pinned, and nothing else is sent
    let class = *vm.returned().last().unwrap();
    assert_eq!(
        vm.calls[vm.calls.len() - 2..],
        [Call::Invoke(String::from("defineClass")), Call::Returned(class)]
    );
    assert!(!vm.pin_log.contains(&class));
    assert!(vm.pinned.is_empty());
}

#[test]
fn cancelled_while_invoking() {
    let mut vm = FakeVm::new();
    let cancellation = Cancellation::new();
    vm.cancel_on_invoke = Some((String::from("invoke"), cancellation.clone()));
    let mut context = SuspendContext::with_cancellation(&mut vm, cancellation);

    let evaluation = CompilingEvaluator::new()
        .evaluate_traced(&snippet("String invoke()", "return \"a\" + 1;"), &mut context);
    assert!(matches!(evaluation.result, Err(EvaluateError::Cancelled)));
    assert_eq!(
        evaluation.states,
        vec![
            EvaluationState::Idle,
            EvaluationState::ClassLoaderReady,
            EvaluationState::ClassesDefined,
            EvaluationState::CallResolved,
            EvaluationState::Failed,
        ]
    );
    assert_eq!(context.pins().len(), 5);
    drop(context);

    let result = *vm.returned().last().unwrap();
    assert_eq!(vm.string(ObjectRef::new(result, ObjectKind::String)), Some("a1"));
    assert_eq!(
        vm.calls[vm.calls.len() - 2..],
        [Call::Invoke(String::from("invoke")), Call::Returned(result)]
    );
    assert!(!vm.pin_log.contains(&result));
    assert!(vm.pinned.is_empty());
}

#[test]
fn bad_call_text() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let evaluator = CompilingEvaluator::new();
    let source = "class GeneratedEvaluationClass {
        static int invoke(long x) { return 1; }
        static int invoke(Object x) { return 2; }
        static int pick(long x, String s) { return 3; }
        static int pick(int x, Object o) { return 4; }
    }";

    let value = evaluator
        .evaluate(
            &request("GeneratedEvaluationClass", source, "invoke(\"s\")"),
            &mut context,
        )
        .unwrap();
    assert_eq!(value, RemoteValue::Primitive(PrimitiveValue::Int(2)));

    let evaluation = evaluator.evaluate_traced(
        &request("GeneratedEvaluationClass", source, "pick(1, \"s\")"),
        &mut context,
    );
    match &evaluation.result {
        Err(EvaluateError::CodeGeneration(message)) => {
            assert_eq!(message, "reference to pick is ambiguous")
        }
        other => panic!("unexpected {:?}", other),
    }
    if let Err(err) = &evaluation.result {
        assert_eq!(err.user_message(), "evaluation failed");
    }
    assert_eq!(
        evaluation.states,
        vec![
            EvaluationState::Idle,
            EvaluationState::ClassLoaderReady,
            EvaluationState::ClassesDefined,
            EvaluationState::Failed,
        ]
    );

    assert!(matches!(
        evaluator.evaluate(
            &request("GeneratedEvaluationClass", source, "Elsewhere.invoke(1)"),
            &mut context,
        ),
        Err(EvaluateError::CodeGeneration(_))
    ));
}

#[test]
fn generated_class_must_be_defined() {
    let mut vm = FakeVm::new();
    let mut context = SuspendContext::new(&mut vm);
    let mut request = snippet("int invoke()", "return 1;");
    request.generated_class_name = String::from("pkg.GeneratedEvaluationClass");
    match CompilingEvaluator::new().evaluate(&request, &mut context) {
        Err(EvaluateError::ClassResolution(name)) => {
            assert_eq!(name, "pkg.GeneratedEvaluationClass")
        }
        other => panic!("unexpected {:?}", other),
    }
}

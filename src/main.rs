use jeval::compile::{ClassFileClassPath, ClassPathChain, Compiler, JavaCompiler, PlatformClassPath, SourceUnit};
use jeval::evaluate::{CompilingEvaluator, EvaluationRequest, Settings, StaticCallFactory};
use jeval::jdwp::{
    event_kind, suspend_policy, Connection, Event, EventModifier, EventRequest, JdwpRuntime,
};
use jeval::jvm::transform::rewrite_superclass;
use jeval::jvm::{BinaryName, Name, Version};
use jeval::remote::SuspendContext;

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::borrow::Cow;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

type CliResult = Result<(), Box<dyn Error>>;

fn main() {
    env_logger::init();

    let sources = Arg::new("SOURCES")
        .help("Java source files")
        .required(true)
        .num_args(1..)
        .value_parser(clap::value_parser!(PathBuf));
    let class_path = Arg::new("classpath")
        .long("classpath")
        .value_name("DIR")
        .action(ArgAction::Append)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Directory of compiled application classes the sources may use");
    let connect = Arg::new("connect")
        .long("connect")
        .value_name("HOST:PORT")
        .required(true)
        .help("Address of a VM started with -agentlib:jdwp=transport=dt_socket,server=y");
    let timeout = Arg::new("timeout")
        .long("timeout")
        .value_name("SECONDS")
        .default_value("30")
        .value_parser(clap::value_parser!(u64))
        .help("Give up on a target that does not answer for this long");

    let matches = Command::new("jeval")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Compile Java snippets and evaluate them inside a suspended JVM")
        .subcommand_required(true)
        .subcommand(
            Command::new("compile")
                .about("Compile sources in memory and write out the class files")
                .arg(
                    Arg::new("release")
                        .long("release")
                        .value_name("VERSION")
                        .default_value("8")
                        .help("Java release to target (eg. `8`, `17`)"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("DIR")
                        .default_value(".")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(class_path.clone())
                .arg(sources.clone()),
        )
        .subcommand(
            Command::new("patch")
                .about("Re-point the super class of class files (in place)")
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_name("CLASS_NAME")
                        .default_value("java/lang/Object"),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_name("CLASS_NAME")
                        .default_value("sun/reflect/MagicAccessorImpl"),
                )
                .arg(
                    Arg::new("CLASSES")
                        .help("Class files to rewrite")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("threads")
                .about("List the threads of a target VM")
                .arg(connect.clone())
                .arg(timeout.clone()),
        )
        .subcommand(
            Command::new("eval")
                .about("Wait for a thread to enter a method, then evaluate a call in it")
                .arg(connect)
                .arg(timeout)
                .arg(
                    Arg::new("break-in")
                        .long("break-in")
                        .value_name("CLASS_PATTERN")
                        .required(true)
                        .help("Suspend the first thread entering a method of a matching class (eg. `com.example.*`)"),
                )
                .arg(
                    Arg::new("class")
                        .long("class")
                        .value_name("CLASS_NAME")
                        .required(true)
                        .help("Generated class the call targets (eg. `pkg.GeneratedEvaluationClass`)"),
                )
                .arg(
                    Arg::new("call")
                        .long("call")
                        .value_name("CALL")
                        .required(true)
                        .help("Call to run (eg. `GeneratedEvaluationClass.invoke()`)"),
                )
                .arg(
                    Arg::new("marker")
                        .long("marker")
                        .value_name("NAME")
                        .default_value(Settings::DEFAULT_MARKER)
                        .help("Only classes whose name contains this are defined in the target"),
                )
                .arg(class_path)
                .arg(sources),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("compile", matches)) => compile(matches),
        Some(("patch", matches)) => patch(matches),
        Some(("threads", matches)) => threads(matches),
        Some(("eval", matches)) => eval(matches),
        _ => unreachable!("a subcommand is required"),
    };
    if let Err(err) = result {
        log::error!("{}", err);
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

/// Read sources, naming each unit after its file
fn read_sources(matches: &ArgMatches) -> Result<Vec<SourceUnit>, Box<dyn Error>> {
    let mut units = vec![];
    for path in matches.get_many::<PathBuf>("SOURCES").into_iter().flatten() {
        log::info!("Reading '{}'", path.display());
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Unit");
        units.push(SourceUnit::new(name, text));
    }
    Ok(units)
}

/// Platform classes, followed by every class file under the `--classpath` directories
fn class_path(matches: &ArgMatches) -> Result<ClassPathChain, Box<dyn Error>> {
    fn add_dir(class_path: &mut ClassFileClassPath, dir: &Path) -> Result<(), Box<dyn Error>> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                add_dir(class_path, &path)?;
            } else if path.extension().map_or(false, |ext| ext == "class") {
                let name = class_path.add_class_file(&fs::read(&path)?)?;
                log::debug!("Loaded {} from '{}'", name, path.display());
            }
        }
        Ok(())
    }

    let mut application = ClassFileClassPath::new();
    for dir in matches.get_many::<PathBuf>("classpath").into_iter().flatten() {
        add_dir(&mut application, dir)?;
    }
    Ok(ClassPathChain::new()
        .with(PlatformClassPath::new())
        .with(application))
}

fn compile(matches: &ArgMatches) -> CliResult {
    let release = required(matches, "release");
    let target = Version::from_platform_version(release)
        .ok_or_else(|| format!("unknown release {:?}", release))?;
    let out = matches
        .get_one::<PathBuf>("out")
        .cloned()
        .unwrap_or_default();

    let units = read_sources(matches)?;
    let compiler = JavaCompiler::with_class_path(class_path(matches)?);
    for class in compiler.compile(&units, target)? {
        let binary_name = BinaryName::from_java_name(&class.qualified_name)?;
        let path = out.join(format!("{}.class", binary_name.as_str()));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        log::info!("Writing '{}'", path.display());
        fs::write(&path, &class.bytes)?;
    }
    Ok(())
}

fn patch(matches: &ArgMatches) -> CliResult {
    let from = BinaryName::from_string(required(matches, "from").to_owned())?;
    let to = BinaryName::from_string(required(matches, "to").to_owned())?;
    for path in matches.get_many::<PathBuf>("CLASSES").into_iter().flatten() {
        let bytes = fs::read(path)?;
        match rewrite_superclass(&bytes, &from, &to)? {
            Cow::Borrowed(_) => log::info!("'{}' left unchanged", path.display()),
            Cow::Owned(rewritten) => {
                log::info!("Rewriting '{}'", path.display());
                fs::write(path, rewritten)?;
            }
        }
    }
    Ok(())
}

fn open_connection(matches: &ArgMatches) -> Result<Connection<std::net::TcpStream>, Box<dyn Error>> {
    let address = required(matches, "connect");
    let timeout = matches.get_one::<u64>("timeout").copied().unwrap_or(30);
    log::info!("Connecting to {}", address);
    let mut connection = Connection::connect(address, Some(Duration::from_secs(timeout)))?;
    let version = connection.version()?;
    log::info!("Target is {} {}", version.vm_name, version.vm_version);
    Ok(connection)
}

fn threads(matches: &ArgMatches) -> CliResult {
    let mut connection = open_connection(matches)?;
    for thread in connection.all_threads()? {
        println!("{:>8} {}", thread, connection.thread_name(thread)?);
    }
    Ok(())
}

fn eval(matches: &ArgMatches) -> CliResult {
    let settings = Settings::new(required(matches, "marker"))?;
    let request = EvaluationRequest {
        call_text: required(matches, "call").to_owned(),
        generated_class_name: required(matches, "class").to_owned(),
        source_units: read_sources(matches)?,
    };
    let compiler = JavaCompiler::with_class_path(class_path(matches)?);
    let mut connection = open_connection(matches)?;

    // Suspend the first thread entering a matching method
    let request_id = connection.set_event_request(&EventRequest {
        event_kind: event_kind::METHOD_ENTRY,
        suspend_policy: suspend_policy::EVENT_THREAD,
        modifiers: vec![
            EventModifier::ClassMatch(required(matches, "break-in").to_owned()),
            EventModifier::Count(1),
        ],
    })?;
    connection.resume_vm()?;
    log::info!("Waiting for a thread to enter {}", required(matches, "break-in"));
    let (events, thread, location) = loop {
        let events = connection.next_event()?;
        let hit = events.events.iter().find_map(|event| match event {
            Event::Located {
                request_id: id,
                thread,
                location,
                ..
            } if *id == request_id => Some((*thread, *location)),
            _ => None,
        });
        if let Some((thread, location)) = hit {
            break (events, thread, location);
        }
        if events
            .events
            .iter()
            .any(|event| matches!(event, Event::VmDeath { .. }))
        {
            return Err("target VM exited before reaching the class".into());
        }
    };
    connection.clear_event_request(event_kind::METHOD_ENTRY, request_id)?;
    log::info!("Thread {} suspended", connection.thread_name(thread)?);

    let runtime = JdwpRuntime::new(connection, thread, events.suspend_policy).at(location);
    let mut context = SuspendContext::new(runtime);
    let evaluator = CompilingEvaluator::with_compiler(compiler, StaticCallFactory, settings);
    let outcome: CliResult = match evaluator.evaluate(&request, &mut context) {
        Ok(value) => match context.runtime().render(&value) {
            Ok(rendered) => {
                println!("{}", rendered);
                Ok(())
            }
            Err(err) => Err(err.into()),
        },
        Err(err) => Err(err.user_message().into()),
    };
    context.resume()?;
    outcome
}

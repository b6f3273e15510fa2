//! Evaluating generated code inside a suspended target
//!
//! An evaluation compiles the generated source, swaps the super class of the generated classes
//! for a privileged one, defines them through a brand new class loader in the target, and finally
//! runs the call text against the generated class:
//!
//! ```text
//! Idle -> ClassLoaderReady -> ClassesDefined -> CallResolved -> Completed
//!   \__________________\_________________\______________\_____> Failed
//! ```

mod call;
mod errors;
mod loader;
mod settings;

pub use call::*;
pub use errors::*;
pub use loader::*;
pub use settings::*;

use crate::compile::{CompiledUnit, Compiler, JavaCompiler, PlatformClassPath, SourceUnit};
use crate::jvm::class_file::ClassFile;
use crate::jvm::transform::rewrite_superclass;
use crate::jvm::{Name, Version};
use crate::remote::{RemoteRuntime, RemoteValue, SuspendContext};
use log::{debug, info, warn};

/// What to evaluate
#[derive(Clone, Debug)]
pub struct EvaluationRequest {
    /// Call executed once the classes are defined (eg. `GeneratedEvaluationClass.invoke()`)
    pub call_text: String,

    /// Binary name (dotted, `pkg.Outer$GeneratedEvaluationClass`) of the class the call targets
    pub generated_class_name: String,

    pub source_units: Vec<SourceUnit>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluationState {
    Idle,
    ClassLoaderReady,
    ClassesDefined,
    CallResolved,
    Completed,
    Failed,
}

/// Outcome of an evaluation along with the states it went through
#[derive(Debug)]
pub struct Evaluation {
    pub result: Result<RemoteValue, EvaluateError>,
    pub states: Vec<EvaluationState>,
}

/// Progress of one evaluation
struct Run {
    states: Vec<EvaluationState>,
}

impl Run {
    fn state(&self) -> EvaluationState {
        self.states
            .last()
            .copied()
            .unwrap_or(EvaluationState::Idle)
    }

    /// Move to the next state, unless the evaluation has been cancelled
    fn advance<R: RemoteRuntime>(
        &mut self,
        next: EvaluationState,
        context: &SuspendContext<R>,
    ) -> Result<(), EvaluateError> {
        check_cancelled(context)?;
        info!("evaluation: {:?} -> {:?}", self.state(), next);
        self.states.push(next);
        Ok(())
    }

    fn fail(&mut self, err: &EvaluateError) {
        info!("evaluation: {:?} -> Failed ({})", self.state(), err);
        self.states.push(EvaluationState::Failed);
    }
}

fn check_cancelled<R: RemoteRuntime>(context: &SuspendContext<R>) -> Result<(), EvaluateError> {
    if context.is_cancelled() {
        Err(EvaluateError::Cancelled)
    } else {
        Ok(())
    }
}

/// Evaluator that compiles source in memory and defines the result in the target
///
/// The suspend context is borrowed exclusively for the duration of an evaluation. Every object
/// created in the target (including the result) is pinned in that context, so it stays alive
/// until the context is resumed or dropped.
pub struct CompilingEvaluator<C, F = StaticCallFactory> {
    compiler: C,
    factory: F,
    settings: Settings,
}

impl CompilingEvaluator<JavaCompiler<PlatformClassPath>, StaticCallFactory> {
    pub fn new() -> Self {
        CompilingEvaluator::with_compiler(JavaCompiler::new(), StaticCallFactory, Settings::default())
    }
}

impl Default for CompilingEvaluator<JavaCompiler<PlatformClassPath>, StaticCallFactory> {
    fn default() -> Self {
        CompilingEvaluator::new()
    }
}

impl<C: Compiler, F: CallEvaluatorFactory> CompilingEvaluator<C, F> {
    pub fn with_compiler(compiler: C, factory: F, settings: Settings) -> Self {
        CompilingEvaluator {
            compiler,
            factory,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn evaluate<R: RemoteRuntime>(
        &self,
        request: &EvaluationRequest,
        context: &mut SuspendContext<R>,
    ) -> Result<RemoteValue, EvaluateError> {
        self.evaluate_traced(request, context).result
    }

    pub fn evaluate_traced<R: RemoteRuntime>(
        &self,
        request: &EvaluationRequest,
        context: &mut SuspendContext<R>,
    ) -> Evaluation {
        let mut run = Run {
            states: vec![EvaluationState::Idle],
        };
        let result = self.run(request, context, &mut run);
        match &result {
            Ok(_) => (),
            Err(err) => {
                if err.is_user_facing() {
                    debug!("evaluation failed: {}", err);
                } else {
                    warn!("evaluation failed: {}", err);
                }
                run.fail(err);
            }
        }
        Evaluation {
            result,
            states: run.states,
        }
    }

    fn run<R: RemoteRuntime>(
        &self,
        request: &EvaluationRequest,
        context: &mut SuspendContext<R>,
        run: &mut Run,
    ) -> Result<RemoteValue, EvaluateError> {
        check_cancelled(context)?;
        let loader =
            provision_loader(context, &self.settings).map_err(EvaluateError::from_environment)?;
        run.advance(EvaluationState::ClassLoaderReady, context)?;

        let target = self.target_version(context);
        let compiled = self.compiler.compile(&request.source_units, target)?;
        let generated = self.generated_classes(compiled)?;
        check_cancelled(context)?;
        let class = define_classes(context, loader, &generated, &request.generated_class_name)?;
        run.advance(EvaluationState::ClassesDefined, context)?;

        let class_file = generated
            .iter()
            .find(|unit| unit.qualified_name == request.generated_class_name)
            .ok_or_else(|| EvaluateError::ClassResolution(request.generated_class_name.clone()))?;
        let class_file = ClassFile::parse(&class_file.bytes)
            .map_err(|err| EvaluateError::CodeGeneration(err.to_string()))?;
        let call = self
            .factory
            .build(&request.call_text, &class, &class_file)
            .map_err(EvaluateError::CodeGeneration)?;
        run.advance(EvaluationState::CallResolved, context)?;

        let value = call.evaluate(context).map_err(EvaluateError::from_call)?;
        run.advance(EvaluationState::Completed, context)?;
        Ok(value)
    }

    /// Class file version matching the target, or the configured default
    fn target_version<R: RemoteRuntime>(&self, context: &mut SuspendContext<R>) -> Version {
        match context.runtime().platform_version() {
            Ok(version) => match Version::from_platform_version(&version) {
                Some(target) => {
                    debug!("target runs {}, compiling for {:?}", version, target);
                    target
                }
                None => {
                    warn!("unrecognized target version {:?}", version);
                    self.settings.default_version
                }
            },
            Err(err) => {
                warn!("could not get the target version: {}", err);
                self.settings.default_version
            }
        }
    }

    /// Keep only generated classes, re-parented onto the privileged super class
    fn generated_classes(
        &self,
        compiled: Vec<CompiledUnit>,
    ) -> Result<Vec<CompiledUnit>, EvaluateError> {
        compiled
            .into_iter()
            .filter(|unit| unit.is_generated(self.settings.generated_marker.as_str()))
            .map(|unit| {
                let bytes = rewrite_superclass(
                    &unit.bytes,
                    &self.settings.base_superclass,
                    &self.settings.privileged_superclass,
                )
                .map_err(|err| {
                    EvaluateError::CodeGeneration(format!("{}: {}", unit.qualified_name, err))
                })?
                .into_owned();
                Ok(CompiledUnit {
                    qualified_name: unit.qualified_name,
                    bytes,
                })
            })
            .collect()
    }
}

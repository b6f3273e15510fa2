use crate::jvm::{BinaryName, Name, UnqualifiedName, Version};

#[derive(Clone, Debug)]
pub struct Settings {
    /// Token identifying generated classes: only compiled classes whose name contains it are
    /// defined in the target
    pub generated_marker: UnqualifiedName,

    /// Class file version used when the target's version can't be determined
    pub default_version: Version,

    /// Super class that generated classes are compiled with
    pub base_superclass: BinaryName,

    /// Super class swapped in before definition
    ///
    /// The JVM skips access checks for subclasses of this class, which lets evaluated code reach
    /// private members of the debuggee.
    pub privileged_superclass: BinaryName,

    /// Class loader created for each evaluation (must have a `(URL[], ClassLoader)` constructor)
    pub class_loader_class: BinaryName,

    /// Element type of the class loader's search path
    pub url_class: BinaryName,
}

impl Settings {
    pub const DEFAULT_MARKER: &'static str = "GeneratedEvaluationClass";

    pub fn new(generated_marker: impl Into<String>) -> Result<Settings, String> {
        fn make_name<N: Name>(name: impl Into<String>) -> Result<N, String> {
            N::from_string(name.into())
        }

        Ok(Settings {
            generated_marker: make_name(generated_marker)?,
            default_version: Version::JAVA8,
            base_superclass: BinaryName::OBJECT,
            privileged_superclass: BinaryName::MAGICACCESSORIMPL,
            class_loader_class: BinaryName::URLCLASSLOADER,
            url_class: BinaryName::URL,
        })
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            generated_marker: UnqualifiedName::GENERATEDEVALUATIONCLASS,
            default_version: Version::JAVA8,
            base_superclass: BinaryName::OBJECT,
            privileged_superclass: BinaryName::MAGICACCESSORIMPL,
            class_loader_class: BinaryName::URLCLASSLOADER,
            url_class: BinaryName::URL,
        }
    }
}

//! Nodekit native binding declarations
//!
//! Interfaces crossing the native boundary are declared once, at compile
//! time, with [`native_interface!`]. Signatures and exported symbol names
//! are derived from those declarations instead of being discovered at
//! runtime.
//!
//! ```ignore
//! native_interface! {
//!     pub static GREETER = "com/example/Greeter" {
//!         fn greet(STRING, JniType::Int) -> STRING;
//!     }
//! }
//!
//! assert_eq!(GREETER.methods[0].signature(), "(Ljava/lang/String;I)Ljava/lang/String;");
//! ```

pub mod interfaces;
mod jni_type;

pub use jni_type::{JniType, INTEGER, OBJECT, STRING};

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindgenError {
    #[error("class not found: {0}")]
    UnknownClass(String),

    #[error("{class}.{method}: `void` is only valid as a return type")]
    VoidParameter { class: String, method: String },
}

/// A method as seen from native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeMethod {
    pub name: &'static str,
    pub params: &'static [JniType],
    pub ret: JniType,
}

impl NativeMethod {
    /// JNI method descriptor, e.g. `([Ljava/lang/String;)I`.
    pub fn signature(&self) -> String {
        let mut out = String::from("(");
        for param in self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        self.ret.write_descriptor(&mut out);
        out
    }

    /// Exported symbol for a native implementation of this method.
    pub fn symbol(&self, class: &str) -> String {
        format!("Java_{}_{}", mangle(class), mangle(self.name))
    }

    /// Symbol including the argument descriptors, for overloaded natives.
    pub fn overloaded_symbol(&self, class: &str) -> String {
        let signature = self.signature();
        let args = signature
            .strip_prefix('(')
            .and_then(|rest| rest.split(')').next())
            .unwrap_or_default();
        format!("{}__{}", self.symbol(class), mangle(args))
    }
}

/// A class whose methods are called across the native boundary.
#[derive(Debug)]
pub struct NativeInterface {
    /// Internal class name, `/`-separated, `$` for nested classes.
    pub class: &'static str,
    pub methods: &'static [NativeMethod],
}

impl NativeInterface {
    /// Dotted class name, as a Java developer would write it.
    pub fn java_name(&self) -> String {
        self.class.replace('/', ".")
    }

    pub fn method(&self, name: &str) -> Option<&NativeMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn validate(&self) -> Result<(), BindgenError> {
        for method in self.methods {
            if method.params.iter().any(JniType::contains_void) || method.ret.is_void_array() {
                return Err(BindgenError::VoidParameter {
                    class: self.java_name(),
                    method: method.name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// One `name - signature` line per method, in declaration order.
    pub fn dump(&self, with_symbols: bool) -> Vec<String> {
        let overloaded = |name: &str| self.methods.iter().filter(|m| m.name == name).count() > 1;

        self.methods
            .iter()
            .map(|method| {
                let mut line = format!("{} - {}", method.name, method.signature());
                if with_symbols {
                    let symbol = if overloaded(method.name) {
                        method.overloaded_symbol(self.class)
                    } else {
                        method.symbol(self.class)
                    };
                    let _ = write!(line, " ({symbol})");
                }
                line
            })
            .collect()
    }
}

/// Declare a [`NativeInterface`] as a static.
#[macro_export]
macro_rules! native_interface {
    ($(
        $(#[$meta:meta])*
        $vis:vis static $name:ident = $class:literal {
            $( fn $method:ident ( $($param:expr),* $(,)? ) -> $ret:expr ; )*
        }
    )*) => {
        $(
            $(#[$meta])*
            $vis static $name: $crate::NativeInterface = $crate::NativeInterface {
                class: $class,
                methods: &[
                    $(
                        $crate::NativeMethod {
                            name: stringify!($method),
                            params: &[$($param),*],
                            ret: $ret,
                        },
                    )*
                ],
            };
        )*
    };
}

static REGISTRY: Lazy<BTreeMap<&'static str, &'static NativeInterface>> = Lazy::new(|| {
    interfaces::ALL
        .iter()
        .map(|interface| (interface.class, *interface))
        .collect()
});

/// Every declared interface, ordered by class name.
pub fn registered() -> impl Iterator<Item = &'static NativeInterface> {
    REGISTRY.values().copied()
}

/// Find a declared interface by dotted or `/`-separated class name.
pub fn lookup(class: &str) -> Result<&'static NativeInterface, BindgenError> {
    let internal = class.replace('.', "/");
    REGISTRY.get(internal.as_str()).copied().ok_or_else(|| {
        tracing::debug!(class, "No interface declared");
        BindgenError::UnknownClass(class.to_string())
    })
}

/// JNI short-name mangling.
fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '/' => out.push('_'),
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "_0{unit:04x}");
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    native_interface! {
        static SAMPLE = "com/example/Sample$Inner" {
            fn run_it(JniType::Array(&STRING), JniType::Long) -> JniType::Boolean;
            fn run_it(JniType::Int) -> JniType::Void;
            fn bad(JniType::Void) -> JniType::Void;
        }
    }

    #[test]
    fn test_signature_descriptors() {
        assert_eq!(SAMPLE.methods[0].signature(), "([Ljava/lang/String;J)Z");
        assert_eq!(SAMPLE.methods[1].signature(), "(I)V");
    }

    #[test]
    fn test_symbol_mangling() {
        assert_eq!(
            SAMPLE.methods[1].symbol(SAMPLE.class),
            "Java_com_example_Sample_00024Inner_run_1it"
        );
        assert_eq!(
            SAMPLE.methods[0].overloaded_symbol(SAMPLE.class),
            "Java_com_example_Sample_00024Inner_run_1it___3Ljava_lang_String_2J"
        );
    }

    #[test]
    fn test_dump_marks_overloads() {
        let lines = SAMPLE.dump(true);
        assert_eq!(
            lines[1],
            "run_it - (I)V (Java_com_example_Sample_00024Inner_run_1it__I)"
        );
    }

    #[test]
    fn test_void_parameter_is_rejected() {
        assert_eq!(
            SAMPLE.validate(),
            Err(BindgenError::VoidParameter {
                class: "com.example.Sample$Inner".to_string(),
                method: "bad".to_string(),
            })
        );
    }

    #[test]
    fn test_lookup_accepts_both_spellings() {
        let dotted = lookup("com.node.sample.MainActivity").unwrap();
        let internal = lookup("com/node/sample/MainActivity").unwrap();
        assert!(std::ptr::eq(dotted, internal));
        assert_eq!(
            lookup("com.node.Missing").unwrap_err(),
            BindgenError::UnknownClass("com.node.Missing".to_string())
        );
    }

    #[test]
    fn test_every_registered_interface_is_valid() {
        let count = registered()
            .inspect(|interface| interface.validate().unwrap())
            .count();
        assert_eq!(count, interfaces::ALL.len());
    }
}

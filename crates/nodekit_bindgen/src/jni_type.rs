use std::fmt;

pub const STRING: JniType = JniType::Object("java/lang/String");
pub const OBJECT: JniType = JniType::Object("java/lang/Object");
pub const INTEGER: JniType = JniType::Object("java/lang/Integer");

/// Java types as they appear in JNI descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JniType {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Internal class name, e.g. `java/lang/String`.
    Object(&'static str),
    Array(&'static JniType),
}

impl JniType {
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    pub(crate) fn write_descriptor(&self, out: &mut String) {
        match self {
            JniType::Void => out.push('V'),
            JniType::Boolean => out.push('Z'),
            JniType::Byte => out.push('B'),
            JniType::Char => out.push('C'),
            JniType::Short => out.push('S'),
            JniType::Int => out.push('I'),
            JniType::Long => out.push('J'),
            JniType::Float => out.push('F'),
            JniType::Double => out.push('D'),
            JniType::Object(class) => {
                out.push('L');
                out.push_str(class);
                out.push(';');
            }
            JniType::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }

    pub(crate) fn contains_void(&self) -> bool {
        match self {
            JniType::Void => true,
            JniType::Array(element) => element.contains_void(),
            _ => false,
        }
    }

    pub(crate) fn is_void_array(&self) -> bool {
        matches!(self, JniType::Array(element) if element.contains_void())
    }
}

impl fmt::Display for JniType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

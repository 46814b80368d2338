//! Interfaces shared with the host application.
//!
//! `Observable` and the V8 wrappers are called back from native code, so
//! their signatures are what a native implementation looks up.

use crate::{native_interface, JniType, NativeInterface, INTEGER, OBJECT, STRING};

const OBSERVABLE: JniType = JniType::Object("com/node/sample/Observable");
const V8_CONTEXT_TYPE: JniType = JniType::Object("com/node/v8/V8Context");
const V8_RESULT_TYPE: JniType = JniType::Object("com/node/v8/V8Context$V8Result");

native_interface! {
    /// Natives backing the main screen.
    pub static MAIN_ACTIVITY = "com/node/sample/MainActivity" {
        fn startNodeWithArguments(JniType::Array(&STRING)) -> JniType::Int;
        fn initVM(OBSERVABLE) -> JniType::Void;
        fn releaseVM() -> JniType::Void;
        fn asyncComputation(OBSERVABLE) -> JniType::Void;
        fn getUtf8String() -> STRING;
    }

    pub static OBSERVABLE_CALLBACKS = "com/node/sample/Observable" {
        fn subscribe(STRING) -> JniType::Void;
        fn subscribe(JniType::Int) -> JniType::Void;
        fn subscribe(OBJECT) -> JniType::Void;
    }

    /// Standalone script context.
    pub static V8_CONTEXT = "com/node/v8/V8Context" {
        fn init() -> JniType::Void;
        fn create() -> V8_CONTEXT_TYPE;
        fn set(STRING, JniType::Array(&JniType::Int)) -> JniType::Void;
        fn eval(STRING) -> V8_RESULT_TYPE;
        fn callFn(JniType::Long, JniType::Boolean, JniType::Long) -> JniType::Void;
    }

    pub static V8_RESULT = "com/node/v8/V8Context$V8Result" {
        fn toIntegerArray() -> JniType::Array(&INTEGER);
        fn toInteger() -> INTEGER;
        fn toJavaString() -> STRING;
    }

    pub static V8_PROMISE = "com/node/v8/V8Promise" {
        fn then(OBSERVABLE) -> JniType::Void;
    }

    /// Reflection helpers used when wiring native lookups by hand.
    pub static JNI_UTILS = "com/node/util/JNIUtils" {
        fn getClassMethodList(STRING) -> JniType::Array(&STRING);
        fn getClass(STRING) -> JniType::Object("java/lang/Class");
        fn getJNIMethodSignature(JniType::Object("java/lang/reflect/Method")) -> STRING;
    }
}

pub static ALL: &[&NativeInterface] = &[
    &MAIN_ACTIVITY,
    &OBSERVABLE_CALLBACKS,
    &V8_CONTEXT,
    &V8_RESULT,
    &V8_PROMISE,
    &JNI_UTILS,
];

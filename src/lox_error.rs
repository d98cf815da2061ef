use crate::interpreter::LoxRuntimeError;

/// Error reporting seam between the pipeline phases and whatever is driving
/// them. Phases only hand diagnostics to the reporter; presentation and the
/// had-error bookkeeping live behind it.
pub trait LoxError {
    fn error(&mut self, line: i32, message: &str);

    fn report(&mut self, line: i32, wh: &str, message: &str);

    fn runtime_error(&mut self, error: &LoxRuntimeError);

    fn has_error(&self) -> bool;

    fn has_runtime_error(&self) -> bool;
}

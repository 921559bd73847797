use super::{CommandOutput, CommandRunner, Invocation};
use std::io;
use std::path::Path;
use std::sync::Mutex;

/// Answers every call from a closure instead of spawning anything, and keeps
/// a log of what it was asked to run. Used for dry runs and tests.
pub struct ScriptedRunner<F> {
    respond: F,
    calls: Mutex<Vec<Invocation>>,
}

impl<F> ScriptedRunner<F>
where
    F: Fn(&Invocation) -> io::Result<CommandOutput>,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl ScriptedRunner<fn(&Invocation) -> io::Result<CommandOutput>> {
    /// Succeeds on every call with empty output.
    pub fn recording() -> Self {
        fn succeed(_: &Invocation) -> io::Result<CommandOutput> {
            Ok(CommandOutput::ok(""))
        }
        Self::new(succeed)
    }
}

impl<F> CommandRunner for ScriptedRunner<F>
where
    F: Fn(&Invocation) -> io::Result<CommandOutput>,
{
    async fn run(
        &self,
        argv: &[String],
        cwd: Option<&Path>,
        env: &[(String, String)],
    ) -> io::Result<CommandOutput> {
        let invocation = Invocation::new(argv, cwd, env);
        let result = (self.respond)(&invocation);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation);
        }
        result
    }
}

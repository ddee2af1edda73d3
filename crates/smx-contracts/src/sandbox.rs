//! Sandbox Runtime: state machine `Empty -> Compiled -> Live <-> Executing
//! -> Live`, running contract code under a wall-clock timeout and a memory
//! ceiling (spec §4.5).

use crate::dsl::{self, ContractState, Program};
use crate::memory::current_rss_bytes;
use crate::safety;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Empty,
    Compiled,
    Live,
    Executing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    UnsafeCode(String),
    CompilationFailed(String),
    NotCompiled,
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::UnsafeCode(r) => write!(f, "UnsafeCode: {r}"),
            SandboxError::CompilationFailed(r) => write!(f, "CompilationFailed: {r}"),
            SandboxError::NotCompiled => write!(f, "sandbox has no compiled program loaded"),
        }
    }
}
impl std::error::Error for SandboxError {}

/// Default wall-clock execution budget (spec §4.5: "default 30 s").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// How often the supervising thread polls for completion/memory breach
/// while a contract call is in flight.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Sandbox {
    state: SandboxState,
    program: Option<Program>,
    current_state: Option<String>,
    timeout: Duration,
    memory_ceiling_bytes: Option<u64>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Sandbox::new(DEFAULT_TIMEOUT, None)
    }
}

impl Sandbox {
    pub fn new(timeout: Duration, memory_ceiling_bytes: Option<u64>) -> Self {
        Sandbox {
            state: SandboxState::Empty,
            program: None,
            current_state: None,
            timeout,
            memory_ceiling_bytes,
        }
    }

    pub fn state(&self) -> SandboxState {
        self.state
    }

    /// The program compiled by the last successful [`Sandbox::compile`], if
    /// any — lets callers (e.g. the gas estimator) reuse it instead of
    /// re-parsing the source.
    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Resets to `Empty`, discarding any compiled program and loaded state.
    pub fn reset(&mut self) {
        self.program = None;
        self.current_state = None;
        self.state = SandboxState::Empty;
    }

    /// Runs the Safety Analyzer then compiles `source` (spec §4.5
    /// `compile`). A failed attempt leaves any previously compiled program
    /// and loaded state untouched.
    pub fn compile(&mut self, source: &str) -> Result<(), SandboxError> {
        safety::check_source(source).map_err(|e| SandboxError::UnsafeCode(e.to_string()))?;
        let program =
            dsl::compile(source).map_err(|e| SandboxError::CompilationFailed(e.to_string()))?;
        self.program = Some(program);
        self.state = SandboxState::Compiled;
        Ok(())
    }

    /// Sets the current serialized state blob, opaque to the runtime (spec
    /// §4.5 `loadState`).
    pub fn load_state(&mut self, state: String) -> Result<(), SandboxError> {
        if self.program.is_none() {
            return Err(SandboxError::NotCompiled);
        }
        self.current_state = Some(state);
        self.state = SandboxState::Live;
        Ok(())
    }

    pub fn snapshot_state(&self) -> Option<String> {
        self.current_state.clone()
    }

    /// Runs the entry point against `inputs` and `state`, returning
    /// `(result, newState)` (spec §4.5 `execute`). On any sandbox failure
    /// (unsafe input, timeout, memory ceiling, thrown error), `newState`
    /// equals the input `state` unchanged (spec §7, §8 invariant 5).
    pub fn execute(&mut self, inputs: Vec<String>, state: &str) -> (String, String) {
        let Some(program) = self.program.clone() else {
            return ("Execution failed: sandbox not compiled".to_string(), state.to_string());
        };
        for input in &inputs {
            if let Err(e) = safety::check_input(input) {
                return (format!("Execution failed: {e}"), state.to_string());
            }
        }
        let contract_state: ContractState = match smx_codec::decode(state) {
            Ok(s) => s,
            Err(e) => return (format!("Execution failed: {e}"), state.to_string()),
        };

        self.state = SandboxState::Executing;
        let (result, outcome) = self.run_worker(program, inputs, contract_state);
        self.state = SandboxState::Live;

        match outcome {
            WorkerOutcome::Completed(new_state) => {
                let encoded = smx_codec::encode(&new_state);
                self.current_state = Some(encoded.clone());
                (result, encoded)
            }
            WorkerOutcome::Unchanged => (result, state.to_string()),
        }
    }

    fn run_worker(
        &self,
        program: Program,
        inputs: Vec<String>,
        contract_state: ContractState,
    ) -> (String, WorkerOutcome) {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut interp = dsl::Interpreter::new(&program, contract_state);
            let outcome = interp.run_execute(inputs).map(|v| v.to_string());
            let _ = tx.send(outcome.map(|result| (result, interp.state)).map_err(|e| e.to_string()));
        });

        let deadline = Instant::now() + self.timeout;
        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok((result, new_state))) => {
                    return (result, WorkerOutcome::Completed(new_state));
                }
                Ok(Err(message)) => {
                    return (format!("Execution failed: {message}"), WorkerOutcome::Unchanged);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if Instant::now() >= deadline {
                        // The worker thread is detached: we stop waiting on
                        // it, but Rust gives no safe way to kill a running
                        // thread, so a pathological contract's thread keeps
                        // running in the background (spec §5: "the worker
                        // is detached").
                        return ("Execution timeout".to_string(), WorkerOutcome::Unchanged);
                    }
                    if let Some(ceiling) = self.memory_ceiling_bytes {
                        if current_rss_bytes().map(|rss| rss > ceiling).unwrap_or(false) {
                            return (
                                "Execution failed: memory limit".to_string(),
                                WorkerOutcome::Unchanged,
                            );
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return (
                        "Execution failed: worker thread terminated unexpectedly".to_string(),
                        WorkerOutcome::Unchanged,
                    );
                }
            }
        }
    }
}

enum WorkerOutcome {
    Completed(ContractState),
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_with_timeout(ms: u64) -> Sandbox {
        Sandbox::new(Duration::from_millis(ms), None)
    }

    fn empty_state() -> String {
        smx_codec::encode(&ContractState::default())
    }

    #[test]
    fn compile_rejects_unsafe_source() {
        let mut sandbox = Sandbox::default();
        let err = sandbox.compile("File.ReadAllText(\"x\");\nfn execute(inputs, state) { return 1; }").unwrap_err();
        assert!(matches!(err, SandboxError::UnsafeCode(_)));
        assert_eq!(sandbox.state(), SandboxState::Empty);
    }

    #[test]
    fn compile_then_execute_round_trips_a_result() {
        let mut sandbox = Sandbox::default();
        sandbox
            .compile(
                r#"fn execute(inputs, state) {
                    state.set("hits", state.get("hits") + 1);
                    return state.get("hits");
                }"#,
            )
            .unwrap();
        let (result, new_state) = sandbox.execute(vec![], &empty_state());
        assert_eq!(result, "1");
        let (result2, _) = sandbox.execute(vec![], &new_state);
        assert_eq!(result2, "1"); // fresh state each call; `hits` starts at Unit -> 0 + 1
    }

    #[test]
    fn execute_on_uncompiled_sandbox_leaves_state_unchanged() {
        let mut sandbox = Sandbox::default();
        let state = empty_state();
        let (result, new_state) = sandbox.execute(vec![], &state);
        assert!(result.starts_with("Execution failed"));
        assert_eq!(new_state, state);
    }

    #[test]
    fn timeout_leaves_state_unchanged() {
        let mut sandbox = sandbox_with_timeout(50);
        sandbox.compile("fn execute(inputs, state) { while (true) {} }").unwrap();
        let state = empty_state();
        let (result, new_state) = sandbox.execute(vec![], &state);
        assert_eq!(result, "Execution timeout");
        assert_eq!(new_state, state);
    }

    #[test]
    fn unsafe_input_statement_is_rejected_before_execution() {
        let mut sandbox = Sandbox::default();
        sandbox.compile("fn execute(inputs, state) { return 1; }").unwrap();
        let state = empty_state();
        let (result, new_state) = sandbox.execute(vec!["Process.Start(\"x\")".to_string()], &state);
        assert!(result.starts_with("Execution failed"));
        assert_eq!(new_state, state);
    }

    #[test]
    fn two_identical_executions_are_deterministic() {
        let mut sandbox = Sandbox::default();
        sandbox
            .compile(
                r#"fn execute(inputs, state) {
                    state.credit(inputs[0], 10);
                    return state.balance_of(inputs[0]);
                }"#,
            )
            .unwrap();
        let state = empty_state();
        let inputs = vec!["smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string()];
        let (r1, s1) = sandbox.execute(inputs.clone(), &state);
        let (r2, s2) = sandbox.execute(inputs, &state);
        assert_eq!(r1, r2);
        assert_eq!(s1, s2);
    }
}

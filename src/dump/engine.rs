use statig::blocking::IntoStateMachineExt as _;

use super::machine::{DispatchContext, DumpHsm};
use super::{names::dump_name, DumpAbort, DumpAction, DumpEvent, DumpName, DumpOutcome, DumpProtocol};

pub struct DumpEngine {
    machine: statig::blocking::StateMachine<DumpHsm>,
}

impl DumpEngine {
    pub fn new(protocol: DumpProtocol) -> Self {
        Self {
            machine: DumpHsm::new(protocol).state_machine(),
        }
    }

    /// Starts an attempt and returns the first action (the invite prompt).
    pub fn begin(&mut self) -> DumpAction {
        self.handle(DumpEvent::Begin)
    }

    /// Feeds the result of the previous action and returns the next one.
    pub fn handle(&mut self, event: DumpEvent) -> DumpAction {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        context
            .action
            .unwrap_or(DumpAction::Finish(DumpOutcome::Aborted(DumpAbort::Stalled)))
    }

    pub fn name(&self) -> Option<DumpName> {
        self.machine.inner().suffix.map(dump_name)
    }

    pub fn lines_written(&self) -> u16 {
        self.machine.inner().lines_written
    }

    pub fn errors(&self) -> u16 {
        self.machine.inner().errors
    }

    /// Line slots consumed so far, written or skipped.
    pub fn lines_done(&self) -> u16 {
        self.machine.inner().lines_done
    }
}

impl Default for DumpEngine {
    fn default() -> Self {
        Self::new(DumpProtocol::default())
    }
}

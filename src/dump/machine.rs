use statig::prelude::*;

use super::{DumpAbort, DumpOutcome, DumpProtocol};

/// Inputs to the handshake machine: either the start signal or the result of
/// the action it asked for last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpEvent {
    Begin,
    Reply(Option<u8>),
    NameSelected(Option<u8>),
    FileCreated(bool),
    FileOpened(bool),
    LineRead(usize),
    LineWritten(bool),
}

/// I/O the driver performs on the machine's behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpAction {
    Prompt(u8),
    ScanNames,
    CreateFile(u8),
    OpenFile,
    ReadLine,
    WriteLine,
    Finish(DumpOutcome),
}

#[derive(Clone, Copy, Debug, Default)]
pub(super) struct DispatchContext {
    pub(super) action: Option<DumpAction>,
}

pub(super) struct DumpHsm {
    protocol: DumpProtocol,
    selected: Option<u8>,
    /// Suffix of the file this attempt created.
    pub(super) suffix: Option<u8>,
    pub(super) lines_done: u16,
    pub(super) lines_written: u16,
    pub(super) errors: u16,
}

impl DumpHsm {
    pub(super) fn new(protocol: DumpProtocol) -> Self {
        Self {
            protocol,
            selected: None,
            suffix: None,
            lines_done: 0,
            lines_written: 0,
            errors: 0,
        }
    }

    fn abort(&self, context: &mut DispatchContext, reason: DumpAbort) -> Outcome<State> {
        context.action = Some(DumpAction::Finish(DumpOutcome::Aborted(reason)));
        Transition(State::idle())
    }

    /// Counts one finished line slot and picks the next step.
    fn advance_line(&mut self, context: &mut DispatchContext) -> Outcome<State> {
        self.lines_done += 1;
        if self.lines_done >= self.protocol.line_count {
            context.action = Some(DumpAction::Finish(DumpOutcome::Success));
            return Transition(State::idle());
        }
        context.action = Some(DumpAction::ReadLine);
        Handled
    }
}

#[state_machine(initial = "State::idle()")]
impl DumpHsm {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::Begin => {
                self.selected = None;
                self.suffix = None;
                self.lines_done = 0;
                self.lines_written = 0;
                self.errors = 0;
                context.action = Some(DumpAction::Prompt(self.protocol.invite));
                Transition(State::await_start())
            }
            _ => Handled,
        }
    }

    #[state]
    fn await_start(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::Reply(Some(byte)) if *byte == self.protocol.start => {
                context.action = Some(DumpAction::ScanNames);
                Transition(State::name_select())
            }
            DumpEvent::Reply(reply) => self.abort(context, DumpAbort::NoStart(*reply)),
            _ => Handled,
        }
    }

    #[state]
    fn name_select(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::NameSelected(Some(suffix)) => {
                self.selected = Some(*suffix);
                context.action = Some(DumpAction::CreateFile(*suffix));
                Transition(State::file_create())
            }
            DumpEvent::NameSelected(None) => self.abort(context, DumpAbort::NamesExhausted),
            _ => Handled,
        }
    }

    #[state]
    fn file_create(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::FileCreated(true) => {
                self.suffix = self.selected;
                context.action = Some(DumpAction::Prompt(self.protocol.ready));
                Transition(State::await_ready())
            }
            DumpEvent::FileCreated(false) => self.abort(context, DumpAbort::CreateFailed),
            _ => Handled,
        }
    }

    #[state]
    fn await_ready(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::Reply(Some(byte)) if *byte == self.protocol.ack => {
                context.action = Some(DumpAction::OpenFile);
                Transition(State::file_open())
            }
            DumpEvent::Reply(reply) => self.abort(context, DumpAbort::NotReady(*reply)),
            _ => Handled,
        }
    }

    #[state]
    fn file_open(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::FileOpened(true) => {
                context.action = Some(DumpAction::Prompt(self.protocol.open));
                Transition(State::await_open())
            }
            DumpEvent::FileOpened(false) => self.abort(context, DumpAbort::OpenFailed),
            _ => Handled,
        }
    }

    #[state]
    fn await_open(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::Reply(Some(byte)) if *byte == self.protocol.ack => {
                if self.protocol.line_count == 0 {
                    context.action = Some(DumpAction::Finish(DumpOutcome::Success));
                    return Transition(State::idle());
                }
                context.action = Some(DumpAction::ReadLine);
                Transition(State::transfer())
            }
            DumpEvent::Reply(reply) => self.abort(context, DumpAbort::NotOpened(*reply)),
            _ => Handled,
        }
    }

    #[state]
    fn transfer(&mut self, context: &mut DispatchContext, event: &DumpEvent) -> Outcome<State> {
        match event {
            DumpEvent::LineRead(0) => {
                self.errors += 1;
                self.advance_line(context)
            }
            DumpEvent::LineRead(_) => {
                context.action = Some(DumpAction::WriteLine);
                Handled
            }
            DumpEvent::LineWritten(true) => {
                self.lines_written += 1;
                self.advance_line(context)
            }
            DumpEvent::LineWritten(false) => self.abort(
                context,
                DumpAbort::ShortWrite {
                    line: self.lines_done,
                },
            ),
            _ => Handled,
        }
    }
}

use super::{
    names::{dump_name, select_suffix},
    DumpAction, DumpEngine, DumpEvent, DumpOutcome, DumpProtocol, DumpReport,
};
use crate::{
    clock::Clock,
    config::{DUMP_LINE_MAX, DUMP_RECORD_MAX},
    serial::{SerialLink, SerialTx},
    storage::{find_entry, FileSystem},
};

/// Runs one dump attempt to completion against `dir`.
///
/// The peer sees only the protocol prompts; nothing is written to the operator
/// channel here. Whatever the outcome, the capture file is closed before this
/// returns.
pub fn run_dump_attempt<F, T, C, const N: usize>(
    fs: &mut F,
    dir: &mut F::Dir,
    link: &mut SerialLink<'_, T, C, N>,
    protocol: DumpProtocol,
) -> DumpReport
where
    F: FileSystem,
    T: SerialTx,
    C: Clock,
{
    let mut engine = DumpEngine::new(protocol);
    let mut file: Option<F::File> = None;
    let mut record = [0u8; DUMP_RECORD_MAX];
    let mut len = 0usize;

    let mut action = engine.begin();
    let outcome = loop {
        let event = match action {
            DumpAction::Prompt(byte) => DumpEvent::Reply(link.prompt(byte)),
            DumpAction::ScanNames => DumpEvent::NameSelected(select_suffix(fs, dir)),
            DumpAction::CreateFile(suffix) => {
                let name = dump_name(suffix);
                match fs.create_file(dir, &name) {
                    Ok(_) => DumpEvent::FileCreated(true),
                    Err(err) => {
                        log::warn!("dump: create_failed name={} err={}", name, err);
                        DumpEvent::FileCreated(false)
                    }
                }
            }
            DumpAction::OpenFile => {
                let opened = engine
                    .name()
                    .and_then(|name| find_entry(fs, dir, &name))
                    .map(|entry| fs.open_file(&entry));
                match opened {
                    Some(Ok(handle)) => {
                        file = Some(handle);
                        DumpEvent::FileOpened(true)
                    }
                    Some(Err(err)) => {
                        log::warn!("dump: open_failed err={}", err);
                        DumpEvent::FileOpened(false)
                    }
                    None => DumpEvent::FileOpened(false),
                }
            }
            DumpAction::ReadLine => {
                len = link.reader.read_line(&mut record[..DUMP_LINE_MAX]);
                DumpEvent::LineRead(len)
            }
            DumpAction::WriteLine => {
                record[len] = b'\r';
                record[len + 1] = b'\n';
                let wanted = len + 2;
                let written = match file.as_mut() {
                    Some(handle) => fs.write_file(handle, &record[..wanted]),
                    None => Ok(0),
                };
                DumpEvent::LineWritten(matches!(written, Ok(count) if count == wanted))
            }
            DumpAction::Finish(outcome) => break outcome,
        };
        action = engine.handle(event);
    };

    if let Some(handle) = file.take() {
        fs.close_file(handle);
    }

    let report = DumpReport {
        outcome,
        name: engine.name(),
        lines_written: engine.lines_written(),
        errors: engine.errors(),
    };
    match report.outcome {
        DumpOutcome::Success => log::info!(
            "dump: attempt_done name={} lines={} errors={} outcome={}",
            report.name.as_deref().unwrap_or("-"),
            report.lines_written,
            report.errors,
            report.outcome
        ),
        DumpOutcome::Aborted(_) => log::warn!(
            "dump: attempt_done name={} lines={} errors={} outcome={}",
            report.name.as_deref().unwrap_or("-"),
            report.lines_written,
            report.errors,
            report.outcome
        ),
    }
    report
}

use glob::glob;

const PATTERNS: &[&str] = &[
    "/dev/cu.usbserial*",
    "/dev/cu.usbmodem*",
    "/dev/tty.usbserial*",
    "/dev/tty.usbmodem*",
    "/dev/ttyUSB*",
    "/dev/ttyACM*",
    "/dev/ttyS[0-9]*",
];

/// Device-name prefixes, most specific first. The first group holding
/// exactly one candidate wins.
const PREFERENCE: &[&[&str]] = &[
    &["/dev/cu."],
    &["/dev/ttyUSB", "/dev/ttyACM"],
    &["/dev/tty."],
];

fn collect_candidates() -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let globbed = PATTERNS
        .iter()
        .filter_map(|pattern| glob(pattern).ok())
        .flat_map(|paths| paths.flatten())
        .map(|path| path.display().to_string());
    let enumerated = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|port| port.port_name);

    for path in globbed.chain(enumerated) {
        if !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

fn pick(candidates: Vec<String>) -> Option<String> {
    for prefixes in PREFERENCE {
        let mut group = candidates
            .iter()
            .filter(|c| prefixes.iter().any(|p| c.starts_with(p)));
        if let (Some(only), None) = (group.next(), group.next()) {
            return Some(only.clone());
        }
    }
    if candidates.len() == 1 {
        return candidates.into_iter().next();
    }
    None
}

/// Single unambiguous port, narrowed by `DUMPHOST_PORT_HINT` when set.
pub fn detect_port() -> Option<String> {
    let mut candidates = collect_candidates();
    if let Some(hint) = std::env::var("DUMPHOST_PORT_HINT")
        .ok()
        .filter(|s| !s.trim().is_empty())
    {
        candidates.retain(|c| c.contains(&hint));
    }
    pick(candidates)
}

pub fn list_candidates() -> Vec<String> {
    collect_candidates()
}

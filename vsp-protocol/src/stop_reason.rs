//! `StopReason` and the grammar used to parse the `state_word` field of a
//! `status` response.
//!
//! `<tag>` is one of `user`, `step_complete`, `breakpoint:<id>`,
//! `rwatchpoint:<id>:<addr>:<size>`, or
//! `wwatchpoint:<id>:<addr>:<hex>-<hex>-...`. Unknown tags never error —
//! they map to [`StopReason::Unknown`].

/// The tagged cause of the last transition to `stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    User,
    StepComplete,
    Breakpoint { id: u64 },
    RWatchpoint { id: u64, addr: u64, size: u64 },
    WWatchpoint { id: u64, addr: u64, data: Vec<u8> },
    Unknown,
}

/// The parsed form of the `status` command's state word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped(StopReason),
}

fn parse_u64_dec(s: &str) -> Option<u64> {
    s.parse().ok()
}

fn parse_u64_hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s, 16).ok()
}

fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() {
        return Some(Vec::new());
    }
    s.split('-').map(|b| u8::from_str_radix(b, 16).ok()).collect()
}

/// Parses a `status` response's second field (`"running"` or
/// `"stopped:<tag>"`) into a [`RunState`]. Never fails: an unrecognized
/// `stopped:` payload yields `StopReason::Unknown` rather than an error.
pub fn parse_state_word(word: &str) -> RunState {
    if word == "running" {
        return RunState::Running;
    }

    let Some(tag) = word.strip_prefix("stopped:") else {
        return RunState::Stopped(StopReason::Unknown);
    };

    let parts: Vec<&str> = tag.split(':').collect();
    let reason = match parts.as_slice() {
        ["user"] => StopReason::User,
        ["step_complete"] => StopReason::StepComplete,
        ["breakpoint", id] => match parse_u64_dec(id) {
            Some(id) => StopReason::Breakpoint { id },
            None => StopReason::Unknown,
        },
        ["rwatchpoint", id, addr, size] => {
            match (parse_u64_dec(id), parse_u64_hex(addr), parse_u64_dec(size)) {
                (Some(id), Some(addr), Some(size)) => StopReason::RWatchpoint { id, addr, size },
                _ => StopReason::Unknown,
            }
        }
        ["wwatchpoint", id, addr, data] => {
            match (parse_u64_dec(id), parse_u64_hex(addr), parse_hex_bytes(data)) {
                (Some(id), Some(addr), Some(data)) if data.len() <= 16 => {
                    StopReason::WWatchpoint { id, addr, data }
                }
                _ => StopReason::Unknown,
            }
        }
        _ => StopReason::Unknown,
    };

    RunState::Stopped(reason)
}

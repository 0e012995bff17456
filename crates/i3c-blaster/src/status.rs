//! Status tags reported by the adapter firmware
//!
//! Every reply starts with a tag of the form `NAME(n)`. Only [`OK`] means success;
//! which of the others are anticipated depends on the operation.

/// Success
pub const OK: &str = "OK(0)";

/// Arbitration lost to an in-band interrupt or hot-join request. The requested
/// transfer was not executed; call `i3c_poll` to fetch the event.
pub const IBI_ARBITRATION: &str = "ERR_IBI_ARBITRATION(1)";

/// NAK on the arbitration header
pub const NAKED_DURING_ARBHDR: &str = "ERR_NAKED_DURING_ARBHDR(2)";

/// NAK during the SDR addressing phase (ENTDAA: no device left to assign)
pub const NAKED: &str = "ERR_NAKED(3)";

/// Parameter outside the range accepted by the firmware
pub const INVALID_PARAMETER: &str = "ERR_INVALID_PARAMETER(4)";

/// `i3c_poll` found no pending in-band interrupt
pub const NO_IBI: &str = "WARN_NO_IBI(5)";

/// Numeric class `n` of a `NAME(n)` tag
pub fn class(tag: &str) -> Option<u32> {
    let open = tag.find('(')?;
    let inner = tag[open + 1..].strip_suffix(')')?;
    inner.trim().parse().ok()
}

/// Name part of a `NAME(n)` tag
pub fn name(tag: &str) -> &str {
    match tag.find('(') {
        Some(open) => &tag[..open],
        None => tag,
    }
}

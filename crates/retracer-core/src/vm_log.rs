//! Execution-log introspection.
//!
//! Exit code 9 is a generic load failure: it covers ordinary cell underflow
//! as well as the one condition this pipeline can recover from, a library
//! cell whose content was never provided and whose absence only surfaced when
//! the running code tried to open it. The two are distinguished by the exact
//! tail of the instruction-level log. A recoverable failure ends like:
//!
//! ```text
//! stack: [ 1000000000 C{02aa..ff} ]
//! execute CTOS
//! handling exception code 9: failed to load library cell
//! default exception handler, terminating vm with exit code 9
//! ```
//!
//! i.e. a stack dump immediately before the cell-to-slice instruction, the
//! exception entry naming the library load, and the terminating handler
//! entry. Anything else with exit code 9 is surfaced as-is, never retried.

use retracer_types::Cell;

/// Exit code of the generic load failure the diagnosis applies to.
pub const MISSING_LIBRARY_EXIT_CODE: i32 = 9;

const HANDLER_ENTRY: &str = "default exception handler";
const EXCEPTION_ENTRY: &str = "failed to load library cell";
const CTOS_ENTRY: &str = "execute CTOS";
const STACK_ENTRY: &str = "stack: [";

/// Check the log tail for the missing-library signature and recover the
/// top-of-stack cell from the stack dump.
///
/// Returns `None` when the tail does not match exactly; the caller then
/// treats the failure as terminal. Classifying the returned cell as a
/// library reference is the caller's job.
pub fn missing_library_cell(vm_log: &str) -> Option<Cell> {
    let lines: Vec<&str> = vm_log
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 4 {
        return None;
    }

    let handler = lines[lines.len() - 1];
    let exception = lines[lines.len() - 2];
    let instruction = lines[lines.len() - 3];
    let stack_dump = lines[lines.len() - 4];

    if !handler.starts_with(HANDLER_ENTRY) {
        return None;
    }
    if !(exception.starts_with("handling exception") && exception.contains(EXCEPTION_ENTRY)) {
        return None;
    }
    if instruction != CTOS_ENTRY {
        return None;
    }
    if !stack_dump.starts_with(STACK_ENTRY) {
        return None;
    }

    let top = top_of_stack(stack_dump)?;
    let hex = top.strip_prefix("C{")?.strip_suffix('}')?;
    Cell::from_raw_hex(hex).ok()
}

/// The last (topmost) entry of a `stack: [ .. ]` dump line.
fn top_of_stack(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("stack: [")?.strip_suffix(']')?;
    inner.split_whitespace().last()
}

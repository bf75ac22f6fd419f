//! Printing statements to stderr for diagnostics.

use std::sync::atomic::{AtomicBool, Ordering};

/// When true, `trace!` statements are printed.
pub static WEBI_TRACE: AtomicBool = AtomicBool::new(false);

pub fn set_trace(on: bool) {
    WEBI_TRACE.store(on, Ordering::Relaxed);
}

pub fn trace_enabled() -> bool {
    WEBI_TRACE.load(Ordering::Relaxed)
}

#[macro_export]
macro_rules! warn {
    ($formatstr:expr $(,$arg:expr)*) => { {
        use std::io::Write;
        let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
        let _ = write!(&mut outp, "W: ");
        let _ = write!(&mut outp, $formatstr $(,$arg)*);
        let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
        let _ = outp.flush();
    } }
}

#[macro_export]
macro_rules! nowarn {
    ($formatstr:expr $(,$arg:expr)*) => {
    }
}

/// Like `warn!`, but only prints if `WEBI_TRACE` is set. The
/// arguments are not evaluated otherwise.
#[macro_export]
macro_rules! trace {
    ($formatstr:expr $(,$arg:expr)*) => { {
        if $crate::warn::trace_enabled() {
            use std::io::Write;
            let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
            let _ = write!(&mut outp, "T: ");
            let _ = write!(&mut outp, $formatstr $(,$arg)*);
            let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
            let _ = outp.flush();
        }
    } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_trace_toggle() {
        set_trace(true);
        assert!(trace_enabled());
        // Must not evaluate to anything or panic when printing.
        trace!("tracing {} {:?}", 1, "two");
        set_trace(false);
        assert!(!trace_enabled());
        let mut evaluated = false;
        trace!("{}", { evaluated = true; 3 });
        assert!(!evaluated);
    }
}

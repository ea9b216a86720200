//! Error types and the process-wide error hook.
//!
//! Every public operation in this crate reports failures through two
//! channels at once: it invokes the installed [`ErrorHandler`] with the
//! message, source location, and status code, and it returns an [`Error`]
//! carrying the same information. The default handler prints the report to
//! stderr and aborts the process; long-running callers should install a
//! pass-through handler with [`set_error_handler_off`] and inspect the
//! returned [`Status`] codes instead.

use std::sync::RwLock;

use thiserror::Error;

/// Result type for restart-file operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Status codes attached to every [`Error`].
///
/// `Success` is guaranteed to be zero; the remaining discriminants follow
/// the GSL-style numbering used by scientific I/O stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Operation completed.
    Success = 0,
    /// Invalid pointer or missing object.
    EFault = 3,
    /// Invalid argument or wrong handle state.
    EInval = 4,
    /// The container or message-passing substrate rejected the request.
    EFailed = 5,
    /// A contract between the engine and a substrate has been broken.
    ESanity = 7,
    /// Allocation failure in auxiliary buffers.
    ENoMem = 8,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "SUCCESS"),
            Status::EFault => write!(f, "EFAULT"),
            Status::EInval => write!(f, "EINVAL"),
            Status::EFailed => write!(f, "EFAILED"),
            Status::ESanity => write!(f, "ESANITY"),
            Status::ENoMem => write!(f, "ENOMEM"),
        }
    }
}

/// Error type for restart-file operations.
///
/// Each variant corresponds to one member of the closed [`Status`]
/// enumeration and carries the message and source location that were
/// reported to the error hook when the error was raised.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid pointer or missing object (`EFAULT`).
    #[error("{message} ({file}:{line}, EFAULT)")]
    Fault {
        /// Human-readable description of the failure.
        message: String,
        /// Source file that raised the error.
        file: &'static str,
        /// Source line that raised the error.
        line: u32,
    },

    /// Invalid argument or wrong handle state (`EINVAL`).
    #[error("{message} ({file}:{line}, EINVAL)")]
    Invalid {
        /// Human-readable description of the failure.
        message: String,
        /// Source file that raised the error.
        file: &'static str,
        /// Source line that raised the error.
        line: u32,
    },

    /// A substrate rejected the request (`EFAILED`).
    #[error("{message} ({file}:{line}, EFAILED)")]
    Failed {
        /// Human-readable description of the failure.
        message: String,
        /// Source file that raised the error.
        file: &'static str,
        /// Source line that raised the error.
        line: u32,
    },

    /// Engine/substrate contract breach; indicates a bug (`ESANITY`).
    #[error("{message} ({file}:{line}, ESANITY)")]
    Sanity {
        /// Human-readable description of the failure.
        message: String,
        /// Source file that raised the error.
        file: &'static str,
        /// Source line that raised the error.
        line: u32,
    },

    /// Allocation failure (`ENOMEM`).
    #[error("{message} ({file}:{line}, ENOMEM)")]
    NoMem {
        /// Human-readable description of the failure.
        message: String,
        /// Source file that raised the error.
        file: &'static str,
        /// Source line that raised the error.
        line: u32,
    },
}

impl Error {
    /// The status code for this error.
    pub fn status(&self) -> Status {
        match self {
            Error::Fault { .. } => Status::EFault,
            Error::Invalid { .. } => Status::EInval,
            Error::Failed { .. } => Status::EFailed,
            Error::Sanity { .. } => Status::ESanity,
            Error::NoMem { .. } => Status::ENoMem,
        }
    }

    /// The numeric exit code for this error (never zero).
    pub fn code(&self) -> i32 {
        self.status() as i32
    }
}

/// Report passed to the installed [`ErrorHandler`] for every raised error.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReport<'a> {
    /// Human-readable description of the failure.
    pub message: &'a str,
    /// Source file that raised the error.
    pub file: &'static str,
    /// Source line that raised the error.
    pub line: u32,
    /// Status code of the failure.
    pub status: Status,
}

/// Signature of the process-wide error hook.
pub type ErrorHandler = fn(&ErrorReport<'_>);

fn default_handler(report: &ErrorReport<'_>) {
    eprintln!(
        "restartio: {} ({}:{}, {})",
        report.message, report.file, report.line, report.status
    );
    std::process::abort();
}

fn silent_handler(_report: &ErrorReport<'_>) {}

/// Unit tests exercise failure paths constantly; they start from the
/// pass-through hook instead of the aborting default.
const fn initial_handler() -> ErrorHandler {
    if cfg!(test) {
        silent_handler
    } else {
        default_handler
    }
}

static HANDLER: RwLock<ErrorHandler> = RwLock::new(initial_handler());

/// Install `handler` as the process-wide error hook, returning the
/// previous one.
///
/// The hook is shared by every [`Handle`](crate::Handle) in the process.
/// Swap it only while no collective operation is in flight.
pub fn set_error_handler(handler: ErrorHandler) -> ErrorHandler {
    let mut guard = HANDLER.write().unwrap_or_else(|e| e.into_inner());
    std::mem::replace(&mut *guard, handler)
}

/// Install a pass-through hook that ignores reports, returning the
/// previous one. Callers then see failures only as returned [`Error`]s.
pub fn set_error_handler_off() -> ErrorHandler {
    set_error_handler(silent_handler)
}

/// Reinstall the default print-and-abort hook, returning the previous one.
pub fn restore_default_error_handler() -> ErrorHandler {
    set_error_handler(default_handler)
}

/// Build an error, invoking the installed hook exactly once.
///
/// This is the single funnel every raised error passes through; the
/// metadata probe bypasses it entirely so that existence checks stay
/// silent.
pub(crate) fn report(status: Status, message: String, file: &'static str, line: u32) -> Error {
    {
        let handler = *HANDLER.read().unwrap_or_else(|e| e.into_inner());
        handler(&ErrorReport {
            message: &message,
            file,
            line,
            status,
        });
    }
    match status {
        Status::EFault => Error::Fault {
            message,
            file,
            line,
        },
        Status::EInval => Error::Invalid {
            message,
            file,
            line,
        },
        Status::EFailed => Error::Failed {
            message,
            file,
            line,
        },
        Status::ESanity => Error::Sanity {
            message,
            file,
            line,
        },
        Status::ENoMem | Status::Success => Error::NoMem {
            message,
            file,
            line,
        },
    }
}

/// Raise an error: report it through the hook and return it from the
/// enclosing function.
macro_rules! raise {
    ($status:expr, $($arg:tt)*) => {
        return Err($crate::error::report(
            $status,
            format!($($arg)*),
            file!(),
            line!(),
        ))
    };
}

pub(crate) use raise;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero() {
        assert_eq!(Status::Success as i32, 0);
    }

    #[test]
    fn codes_are_nonzero_and_distinct() {
        let codes = [
            Status::EFault as i32,
            Status::EInval as i32,
            Status::EFailed as i32,
            Status::ESanity as i32,
            Status::ENoMem as i32,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, 0);
            for b in &codes[i + 1..] {
                assert_ne!(*a, *b);
            }
        }
    }

    #[test]
    fn error_carries_status_and_location() {
        let err = report(Status::EInval, "nc mismatch".into(), file!(), 42);
        assert_eq!(err.status(), Status::EInval);
        assert_eq!(err.code(), Status::EInval as i32);
        let msg = format!("{err}");
        assert!(msg.contains("nc mismatch"), "got: {msg}");
        assert!(msg.contains("EINVAL"), "got: {msg}");
        assert!(msg.contains(":42"), "got: {msg}");
    }

    #[test]
    fn installed_handler_observes_reports() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SEEN: AtomicUsize = AtomicUsize::new(0);
        fn observer(report: &ErrorReport<'_>) {
            if report.status == Status::EFailed {
                SEEN.fetch_add(1, Ordering::SeqCst);
            }
        }
        let prev = set_error_handler(observer);
        let _ = report(
            Status::EFailed,
            "substrate refused".into(),
            file!(),
            line!(),
        );
        let again = set_error_handler(prev);
        assert_eq!(again as usize, observer as usize);
        assert_eq!(SEEN.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_display_formats() {
        assert_eq!(format!("{}", Status::Success), "SUCCESS");
        assert_eq!(format!("{}", Status::EFault), "EFAULT");
        assert_eq!(format!("{}", Status::EInval), "EINVAL");
        assert_eq!(format!("{}", Status::EFailed), "EFAILED");
        assert_eq!(format!("{}", Status::ESanity), "ESANITY");
        assert_eq!(format!("{}", Status::ENoMem), "ENOMEM");
    }
}

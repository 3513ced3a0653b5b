use crate::util::{write_log, LogLevel};

#[derive(Debug)]
pub enum HookError {
    /// A hook target or symbolic address could not be found.
    ResolutionFailure(String),
    /// Code at a hook target could not be patched.
    PatchFailure(String),
    /// A native accessor on a live host object reported an error.
    DeviceQueryFailure(String),
    /// Creation of one of our own gpu objects failed.
    ResourceCreationFailure(String),
    /// A call that must succeed once setup has gotten this far did not.
    CriticalApiFailure(String),
    ProtectFailed,
    LoadLibFailed(String),
    GetProcAddressFailed(String),
    NulError(std::ffi::NulError),
    BadStateError(String),
    GlobalLockError,
    ConfReadFailed(String),
    SerdeError(String),
    SetupFailed(String),
    WinApiError(String),
    IOError(std::io::Error),
    CStrConvertFailed(std::str::Utf8Error),
}

impl HookError {
    /// True for failures local to one frame or one initialization attempt.  The next
    /// presentation call starts over when one of these is returned.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HookError::DeviceQueryFailure(_) | HookError::ResourceCreationFailure(_)
        )
    }
}

impl std::convert::From<std::ffi::NulError> for HookError {
    fn from(error: std::ffi::NulError) -> Self {
        HookError::NulError(error)
    }
}

impl std::convert::From<std::io::Error> for HookError {
    fn from(error: std::io::Error) -> Self {
        HookError::IOError(error)
    }
}

impl std::convert::From<std::str::Utf8Error> for HookError {
    fn from(error: std::str::Utf8Error) -> Self {
        HookError::CStrConvertFailed(error)
    }
}

pub type Result<T> = std::result::Result<T, HookError>;

/// Log and terminate.  Used where continuing would leave hook or gpu state inconsistent
/// with what the host expects.
pub fn critical_failure(context: &str) -> ! {
    write_log(
        LogLevel::Error,
        &format!("{:?}; terminating", HookError::CriticalApiFailure(context.to_owned())),
    );
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(HookError::DeviceQueryFailure("GetDesc".to_owned()).is_retryable());
        assert!(HookError::ResourceCreationFailure("heap".to_owned()).is_retryable());
        assert!(!HookError::PatchFailure("present".to_owned()).is_retryable());
        assert!(!HookError::ResolutionFailure("signal".to_owned()).is_retryable());
        assert!(!HookError::GlobalLockError.is_retryable());
    }

    #[test]
    fn test_from_conversions() {
        let e: HookError = std::io::Error::new(std::io::ErrorKind::NotFound, "nope").into();
        assert!(matches!(e, HookError::IOError(_)));
        let e: HookError = std::ffi::CString::new("a\0b").unwrap_err().into();
        assert!(matches!(e, HookError::NulError(_)));
    }
}

//!
//! # Conversion Error Helpers
//!
//! Tree-walking converters (board export, session import) carry a stack of
//! [crate::ErrorContext]s describing where in the design they are.
//! Implementing [ErrorHelper] lets each converter attach that stack to every failure,
//! and [Unwrapper] applies it post-fix to [Option]s and [Result]s.
//!
//! ```rust
//! use dsn21utils::error::{ErrorHelper, Unwrapper};
//!
//! struct PadWalker {
//!     footprint: String,
//! }
//! impl ErrorHelper for PadWalker {
//!     type Error = String;
//!     fn err(&self, msg: impl Into<String>) -> Self::Error {
//!         format!("{} (in footprint {})", msg.into(), self.footprint)
//!     }
//! }
//! let walker = PadWalker { footprint: "U1".into() };
//! let number: Option<&str> = None;
//! let e = number.unwrapper(&walker, "Unnamed pad").unwrap_err();
//! assert_eq!(e, "Unnamed pad (in footprint U1)");
//! ```
//!

///
/// # ErrorHelper
///
/// Implementers provide `err`, which turns a message into their error type,
/// generally decorated with whatever internal state locates the failure.
/// The remaining methods are provided.
///
pub trait ErrorHelper {
    type Error;

    /// Create a [Self::Error] from message `msg`
    fn err(&self, msg: impl Into<String>) -> Self::Error;
    /// Return failure
    fn fail<T>(&self, msg: impl Into<String>) -> Result<T, Self::Error> {
        Err(self.err(msg))
    }
    /// Unwrap `opt`, failing with `msg` if it is [None]
    fn unwrap<T>(&self, opt: Option<T>, msg: impl Into<String>) -> Result<T, Self::Error> {
        match opt {
            Some(val) => Ok(val),
            None => self.fail(msg),
        }
    }
    /// Fail with `msg` unless `b` holds
    fn assert(&self, b: bool, msg: impl Into<String>) -> Result<(), Self::Error> {
        if b {
            Ok(())
        } else {
            self.fail(msg)
        }
    }
}

///
/// # Unwrapper
///
/// Post-fix [ErrorHelper] handling for [Option]s and [Result]s.
/// Failures are routed through the helper's `fail` instead of panicking.
/// For [Result]s the inner error's text is appended to the message.
///
/// ```rust
/// use dsn21utils::error::{ErrorHelper, Unwrapper};
///
/// fn layer_index(h: &impl ErrorHelper<Error = String>, txt: &str) -> Result<usize, String> {
///     txt.parse::<usize>().unwrapper(h, "Invalid layer index")
/// }
/// ```
///
pub trait Unwrapper {
    type Ok;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper;
}

impl<T> Unwrapper for Option<T> {
    type Ok = T;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        helper.unwrap(self, msg)
    }
}

impl<T, E: std::fmt::Display> Unwrapper for Result<T, E> {
    type Ok = T;
    fn unwrapper<H>(
        self,
        helper: &H,
        msg: impl Into<String>,
    ) -> Result<<Self as Unwrapper>::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        match self {
            Ok(t) => Ok(t),
            Err(e) => helper.fail(format!("{}: {}", msg.into(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx(&'static str);
    impl ErrorHelper for Ctx {
        type Error = String;
        fn err(&self, msg: impl Into<String>) -> String {
            format!("[{}] {}", self.0, msg.into())
        }
    }

    #[test]
    fn it_unwraps_results() {
        let h = Ctx("net GND");
        let r: Result<i32, std::num::ParseIntError> = "x1".parse();
        let e = r.unwrapper(&h, "Bad number").unwrap_err();
        assert!(e.starts_with("[net GND] Bad number: "));
        assert_eq!("5".parse::<i32>().unwrapper(&h, "Bad number"), Ok(5));
    }
    #[test]
    fn it_asserts() {
        let h = Ctx("via");
        assert!(h.assert(true, "never").is_ok());
        assert_eq!(h.assert(false, "drill > diameter"), Err("[via] drill > diameter".to_string()));
    }
}

/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The crate-wide error type.
//!
//! Component errors (such as [`SelfLoop`](crate::graph::SelfLoop) or
//! [`OrderViolation`](crate::neighbor::OrderViolation)) are defined next
//! to the code that raises them and converted into [`HnswError`] at the
//! public boundary. The aggregate keeps a [`HnswErrorKind`] discriminant
//! for dispatch and an `anyhow::Error` backing store for the source
//! chain, context, and downcasting.

use std::fmt::{Debug, Display};

/// Convenience alias for a `Result<T, HnswError>`.
pub type HnswResult<T> = Result<T, HnswError>;

/// Common error type shared through the crate.
///
/// The runtime origin of an error is disambiguated by [`HnswError::kind`].
/// Similarity providers surface their failures (for example, a vector
/// read from disk) with [`HnswErrorKind::Similarity`]; the concrete
/// provider error remains retrievable through [`HnswError::downcast_ref`].
///
/// # Properties
///
/// * `std::mem::size_of::<HnswError>() == 16`: the struct fits in two
///   registers, so `Result`s carrying it are returned in registers rather
///   than on the stack.
#[derive(Debug)]
pub struct HnswError {
    kind: HnswErrorKind,
    error: anyhow::Error,
}

impl HnswError {
    /// Construct a new `HnswError` encapsulating `err`.
    ///
    /// Errors constructed this way can be retrieved using downcasting.
    ///
    /// # Attributes
    ///
    /// - `track_caller`: the file and line of the caller are recorded and
    ///   rendered in the formatted error.
    ///
    /// - `inline(never)`: error construction is outlined to keep the
    ///   happy-path cost minimal.
    #[track_caller]
    #[inline(never)]
    pub fn new<E>(kind: HnswErrorKind, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            error: anyhow::Error::new(Located::new(err)),
        }
    }

    /// Construct a new `HnswError` from a bare message.
    ///
    /// Errors constructed this way are not necessarily recoverable
    /// through the downcasting API.
    #[track_caller]
    #[inline(never)]
    pub fn message<D>(kind: HnswErrorKind, display: D) -> Self
    where
        D: Display + Debug + Send + Sync + 'static,
    {
        Self {
            kind,
            error: anyhow::Error::msg(Located::new(display)),
        }
    }

    /// Attach context to `self` and return the new error.
    ///
    /// The context becomes the outermost entry of the rendered source
    /// chain.
    #[track_caller]
    #[inline(never)]
    pub fn context<C>(self, context: C) -> Self
    where
        C: Display + Debug + Send + Sync + 'static,
    {
        Self {
            kind: self.kind,
            error: self.error.context(Located::new(context)),
        }
    }

    /// Return the kind of the originally constructed error.
    pub fn kind(&self) -> HnswErrorKind {
        self.kind
    }

    /// Attempt to downcast the error object to a concrete type.
    pub fn downcast<E>(self) -> Result<E, Self>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self.error.downcast::<E>() {
            Ok(value) => Ok(value),
            Err(error) => match error.downcast::<Located<E>>() {
                Ok(value) => Ok(value.err),
                Err(error) => Err(Self {
                    kind: self.kind,
                    error,
                }),
            },
        }
    }

    /// Attempt to downcast the error object by reference.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self.error.downcast_ref::<E>() {
            Some(err) => Some(err),
            None => self.error.downcast_ref::<Located<E>>().map(|e| &e.err),
        }
    }
}

impl Display for HnswError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        // Use the debug format `{:?}` for `anyhow::Error` to render the
        // full source chain.
        write!(formatter, "HnswError: {:?}\n\n{:?}", self.kind, self.error)
    }
}

impl std::error::Error for HnswError {
    // Don't implement `source` because the whole source chain is printed
    // by the `Display` implementation.
}

impl From<std::convert::Infallible> for HnswError {
    #[track_caller]
    fn from(_: std::convert::Infallible) -> Self {
        unreachable!("Infallible is an unconstructible type");
    }
}

/// An internal wrapper that records the file and line where an error was
/// constructed or where context was attached.
#[derive(Debug)]
struct Located<T>
where
    T: Debug,
{
    err: T,
    location: &'static std::panic::Location<'static>,
}

impl<T> Located<T>
where
    T: Debug,
{
    #[track_caller]
    fn new(err: T) -> Self {
        Self {
            err,
            location: std::panic::Location::caller(),
        }
    }
}

impl<T> Display for Located<T>
where
    T: Display + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "{} -- ({}:{})",
            self.err,
            self.location.file(),
            self.location.line()
        )
    }
}

impl<T> std::error::Error for Located<T>
where
    T: std::error::Error + Debug,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.err.source()
    }
}

//////////////////
// ErrorContext //
//////////////////

/// Add context to a returned error that will be included in the source
/// chain.
/// ```rust
/// use hnsw_neighbors::{HnswError, HnswErrorKind, ErrorContext};
///
/// fn fn_a() -> Result<(), HnswError> {
///     Err(HnswError::message(HnswErrorKind::Opaque, "thrown by function A"))
/// }
///
/// fn fn_b() -> Result<(), HnswError> {
///     fn_a().context("propagated by function B")
/// }
///
/// let message = fn_b().unwrap_err().to_string();
/// assert!(message.contains("thrown by function A"));
/// assert!(message.contains("propagated by function B"));
/// ```
pub trait ErrorContext<T> {
    /// Attach the provided context to the error part of the result.
    fn context<C>(self, context: C) -> Result<T, HnswError>
    where
        C: Display + Debug + Send + Sync + 'static;

    /// Attach the provided context to the error part of the result.
    ///
    /// The function `f` will only be evaluated if `self` is an `Err`.
    fn with_context<F, C>(self, f: F) -> Result<T, HnswError>
    where
        C: Display + Debug + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    HnswError: From<E>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T, HnswError>
    where
        C: Display + Debug + Send + Sync + 'static,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(HnswError::from(error).context(context)),
        }
    }

    #[track_caller]
    fn with_context<F, C>(self, f: F) -> Result<T, HnswError>
    where
        C: Display + Debug + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(HnswError::from(error).context(f())),
        }
    }
}

///////////////////
// HnswErrorKind //
///////////////////

/// Discriminant tagging the runtime origin of an [`HnswError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HnswErrorKind {
    /// A node was offered as its own neighbor. This is assertion-level:
    /// it indicates a bug in the calling graph builder.
    SelfLoop,

    /// An ordered append would break the array's configured score order.
    /// Assertion-level, as above.
    OrderViolation,

    /// The similarity provider failed, for example while reading a vector
    /// from storage. Propagated unchanged to the caller of the triggering
    /// operation; the set's published snapshot is not modified.
    Similarity,

    /// A foreign error with no specific tag.
    Opaque,
}

#[cfg(test)]
mod hnsw_error_test {
    use super::*;

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_and_sync<T: Send + Sync>() {}
        assert_send_and_sync::<HnswError>();
    }

    // Keep the error type within 16 bytes and eligible for niche
    // optimization so `Result`s carrying it are returned in registers.
    #[test]
    fn check_struct_size() {
        assert_eq!(std::mem::size_of::<HnswError>(), 16);
        assert_eq!(std::mem::size_of::<Option<HnswError>>(), 16);
        assert_eq!(std::mem::size_of::<Result<f32, HnswError>>(), 16);
    }

    #[derive(Debug, Clone)]
    struct SampleError {
        value: usize,
    }

    impl Display for SampleError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
            write!(f, "SampleError {{ {} }}", self.value)
        }
    }

    impl std::error::Error for SampleError {}

    #[test]
    fn check_downcasting() {
        let err = HnswError::new(HnswErrorKind::Similarity, SampleError { value: 10 });
        assert_eq!(err.kind(), HnswErrorKind::Similarity);
        assert!(err.to_string().contains("SampleError { 10 }"));

        let r = err.downcast_ref::<SampleError>().unwrap();
        assert_eq!(r.value, 10);

        // Downcasting survives attached contexts.
        let err = err.context("some context here").context("more context");
        let formatted = err.to_string();
        assert!(formatted.contains("some context here"));
        assert!(formatted.contains("more context"));
        assert_eq!(err.downcast_ref::<SampleError>().unwrap().value, 10);

        // Consume by downcasting.
        let r = err.downcast::<SampleError>().unwrap();
        assert_eq!(r.value, 10);
    }

    #[test]
    fn downcast_failure_returns_original() {
        let err = HnswError::message(HnswErrorKind::Opaque, "a plain message");
        let formatted = err.to_string();

        let err = err.downcast::<SampleError>().unwrap_err();
        assert_eq!(err.to_string(), formatted);
        assert!(err.downcast_ref::<SampleError>().is_none());
    }

    #[test]
    fn context_chaining() {
        fn err() -> Result<usize, HnswError> {
            Err(HnswError::new(
                HnswErrorKind::Similarity,
                SampleError { value: 5 },
            ))
        }

        let chained = err().context("with context").unwrap_err();
        let message = chained.to_string();
        assert!(message.contains("with context"), "got: {}", message);
        assert!(message.contains("SampleError { 5 }"), "got: {}", message);
        assert_eq!(chained.kind(), HnswErrorKind::Similarity);

        // `with_context` is lazy: not evaluated on the `Ok` path.
        let fine: Result<usize, HnswError> = Ok(77);
        let fine = fine.with_context(|| -> &'static str { panic!("should not be called") });
        assert_eq!(fine.unwrap(), 77);
    }

    #[test]
    fn formatting_records_location() {
        let file = file!();
        let line = line!() + 1;
        let err = HnswError::message(HnswErrorKind::Opaque, "located");
        let rendered = err.to_string();
        assert!(
            rendered.contains(&format!("({}:{})", file, line)),
            "got: {}",
            rendered
        );
    }
}

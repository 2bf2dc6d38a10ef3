/// Defines the behavior of undefined values in the engine.
///
/// A value is undefined when a path does not resolve: the first segment is
/// not bound in any scope, or a later segment hits a missing key or a value
/// that is not a mapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum UndefinedBehavior {
    /// The default, lenient undefined behavior.
    ///
    /// * **printing:** allowed (returns empty string)
    /// * **iteration:** allowed (runs the body zero times, also for scalars)
    /// * **if checks:** allowed (undefined is falsy)
    #[default]
    Lenient,
    /// Complains very quickly about undefined values.
    ///
    /// * **printing:** fails with [`UndefinedError`](crate::ErrorKind::UndefinedError)
    /// * **iteration:** fails with [`UndefinedError`](crate::ErrorKind::UndefinedError),
    ///   iterating over a scalar fails with
    ///   [`InvalidOperation`](crate::ErrorKind::InvalidOperation)
    /// * **if checks:** fails with [`UndefinedError`](crate::ErrorKind::UndefinedError)
    Strict,
}

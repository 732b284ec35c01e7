//! Error Taxonomy
//!
//! Failures in the runtime fall into a small number of classes, and almost
//! all of them are contained rather than propagated: a failing subscriber
//! must never take down the tree that triggered it. The scheduler and the
//! binding engine log these errors through `tracing` and keep going.
//!
//! The only places where an `Error` crosses a public API boundary are the
//! fallible effect/derivation closures, which hand their failure back to
//! the scheduler for logging.

use thiserror::Error;

/// Errors raised inside the reactive runtime and the template engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A reactive computation (effect or derivation) failed.
    ///
    /// Contained at the notification site: the error is logged and the
    /// remaining subscribers still run.
    #[error("effect failed: {0}")]
    Effect(String),

    /// A non-primitive value (plain data object) was interpolated into a
    /// markup or stylesheet template. Rendered as an empty segment.
    #[error("invalid template value: non-primitive values are not supported")]
    InvalidValue,

    /// The setter cycle guard tripped. The update chain is aborted and
    /// state is left at the last successfully applied value.
    #[error("signal update round limit exceeded; possible infinite loop")]
    CycleOverflow,

    /// A binding expected one node shape but the signal produced an
    /// incompatible one (e.g. a list item with multiple top-level
    /// elements). Rendering continues in a degraded form.
    #[error("binding shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An internal placeholder token had no entry in the render context
    /// tables. This indicates a bug in the runtime itself.
    #[error("unresolved internal placeholder {0}; please file a bug report against filament")]
    MissingBinding(u64),
}

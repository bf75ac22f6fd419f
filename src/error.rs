//! Error kinds of the template engine. All of them are programmer
//! errors, nothing in here is retried.

use kstring::KString;

use webi_util::def_boxed_thiserror;

def_boxed_thiserror!(WebiError, pub enum WebiErrorKind {
    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),

    #[error("malformed node path: segment {segment:?} in path {path:?} \
             does not match `tag[index]`")]
    MalformedNodePath {
        path: String,
        segment: String,
    },

    #[error("node not found: {reason} at index {index} in path {path:?} ({segment}); \
             the generated markup and the recorded bindings diverged")]
    NodeNotFound {
        path: String,
        segment: String,
        index: usize,
        reason: &'static str,
    },

    #[error("directive {0:?} is scoped but has no bind hook")]
    UnimplementedDirective(KString),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot assign path {path:?}: {reason}")]
    InvalidPath {
        path: String,
        reason: String,
    },
});

/// Wraps `kind` so that it can be downcast to `WebiError` later.
pub fn webi_error(kind: WebiErrorKind) -> anyhow::Error {
    anyhow::Error::new(WebiError::from(kind))
}

/// The kind of a `WebiError` wrapped in `err`, if any.
pub fn webi_error_kind(err: &anyhow::Error) -> Option<&WebiErrorKind> {
    err.downcast_ref::<WebiError>().map(|e| e.kind())
}

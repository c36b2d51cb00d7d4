use thiserror::Error;

/// Errors reported when a [`Cursor`][crate::Cursor] is used in a way the storage cannot honor.
///
/// Every operation that returns this error leaves the storage untouched.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum CursorError {
    /// The cursor is not bound to any position, e.g. it was created via
    /// [`Cursor::default()`][crate::Cursor::default].
    #[error("the cursor is not bound to any position in a storage")]
    UninitializedCursor,

    /// The cursor is already at the end position and cannot move forward.
    #[error("cannot advance a cursor that is already at the end of the storage")]
    PastEnd,

    /// The cursor is already at the first element (or at the end of an empty storage) and
    /// cannot move backward.
    #[error("cannot move a cursor back past the first element of the storage")]
    BeforeBegin,

    /// The cursor does not refer to a live element of this storage. Either it is the end
    /// cursor, it was issued by another storage, or it predates a `clear()` or
    /// `shrink_to_fit()` of this storage.
    #[error("the cursor does not refer to a live element of this storage")]
    InvalidCursor,
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(CursorError: Send, Sync, Debug, Copy, StdError);

    #[test]
    fn messages_describe_the_problem() {
        assert_eq!(
            CursorError::PastEnd.to_string(),
            "cannot advance a cursor that is already at the end of the storage"
        );
        assert_eq!(
            CursorError::BeforeBegin.to_string(),
            "cannot move a cursor back past the first element of the storage"
        );
        assert!(
            CursorError::UninitializedCursor
                .to_string()
                .contains("not bound")
        );
        assert!(
            CursorError::InvalidCursor
                .to_string()
                .contains("live element")
        );
    }

    #[test]
    fn usable_with_question_mark() {
        fn fails() -> Result<(), CursorError> {
            Err(CursorError::InvalidCursor)?;
            Ok(())
        }

        assert_eq!(fails(), Err(CursorError::InvalidCursor));
    }
}

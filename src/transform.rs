//! The pairwise transformation functions.
//!
//! Given an operation `op` and an operation `applied` that were both
//! generated against the same document, [`transform()`] returns an operation
//! with the same intention as `op` which can be applied *after* `applied`.
//! The functions satisfy the convergence property
//!
//! ```text
//! apply(apply(doc, a), transform(b, a))
//!     == apply(apply(doc, b), transform(a, b))
//! ```
//!
//! as long as exactly one of the two calls is told that its operation wins
//! same-position ties.

use crate::text::split_at_delta;
use crate::{Operation, OperationError, TextDelta, TextPosition, TextRun};

/// Transforms `op` so that it can be applied after `applied`.
///
/// `op_first` decides the order of two insertions at the same position: if
/// it's `true` the text inserted by `op` ends up before the text inserted by
/// `applied`. The caller of the symmetric transformation must pass the
/// opposite value.
pub fn transform(
    op: &Operation,
    applied: &Operation,
    op_first: bool,
) -> Result<Operation, OperationError> {
    match (op, applied) {
        (Operation::NoOp, _) => Ok(Operation::NoOp),

        (_, Operation::NoOp) => Ok(op.clone()),

        (_, Operation::Split(first, second)) => {
            let op = transform(op, first, op_first)?;
            transform(&op, second, op_first)
        },

        (Operation::Split(first, second), _) => {
            let first_t = transform(first, applied, op_first)?;
            let applied_t = transform(applied, first, !op_first)?;
            let second_t = transform(second, &applied_t, op_first)?;
            Ok(Operation::split(first_t, second_t))
        },

        (Operation::Insert(op), Operation::Insert(applied)) => {
            Ok(insert_after_insert(op, applied, op_first))
        },

        (Operation::Insert(op), Operation::Delete(applied)) => {
            insert_after_delete(op, applied)
        },

        (Operation::Delete(op), Operation::Insert(applied)) => {
            delete_after_insert(op, applied)
        },

        (Operation::Delete(op), Operation::Delete(applied)) => {
            delete_after_delete(op, applied)
        },
    }
}

/// Maps a position at or after the start of an insertion to where it is
/// once the insertion has been applied.
#[inline]
fn shift_by_insert(
    position: TextPosition,
    insertion: &TextRun,
) -> Result<TextPosition, OperationError> {
    let rel = position
        .delta_from(insertion.position())
        .ok_or(OperationError::OutOfBounds { at: position })?;

    Ok(insertion.end().advance(rel))
}

/// Maps a position at or after the end of a deletion to where it is once the
/// deletion has been applied.
#[inline]
fn shift_by_delete(
    position: TextPosition,
    deletion: &TextRun,
) -> Result<TextPosition, OperationError> {
    let rel = position
        .delta_from(deletion.end())
        .ok_or(OperationError::OutOfBounds { at: position })?;

    Ok(deletion.position().advance(rel))
}

/// Returns the text of `run` between the absolute positions `start` and
/// `end`, both of which have to fall within the run.
#[inline]
fn slice_between(
    run: &TextRun,
    start: TextPosition,
    end: TextPosition,
) -> Result<&str, OperationError> {
    let (_, rest) = split_run(run, start)?;

    let len = end.delta_from(start).ok_or(OperationError::NegativeLength {
        start,
        end,
    })?;

    split_at_delta(rest, len)
        .map(|(slice, _)| slice)
        .ok_or(OperationError::OutOfBounds { at: end })
}

/// Splits the text of `run` at the absolute position `at`.
#[inline]
fn split_run(
    run: &TextRun,
    at: TextPosition,
) -> Result<(&str, &str), OperationError> {
    let rel = at
        .delta_from(run.position())
        .ok_or(OperationError::OutOfBounds { at })?;

    split_at_delta(run.text(), rel).ok_or(OperationError::OutOfBounds { at })
}

#[inline]
fn insert_after_insert(
    op: &TextRun,
    applied: &TextRun,
    op_first: bool,
) -> Operation {
    let goes_before = op.position() < applied.position()
        || (op.position() == applied.position() && op_first);

    if goes_before {
        Operation::Insert(op.clone())
    } else {
        // `op.position() >= applied.position()`, so this can't fail.
        let rel = op.position().delta_from(applied.position());
        let position = applied.end().advance(rel.unwrap_or(TextDelta::ZERO));
        Operation::Insert(op.with_position(position))
    }
}

#[inline]
fn insert_after_delete(
    op: &TextRun,
    applied: &TextRun,
) -> Result<Operation, OperationError> {
    let position = if op.position() <= applied.position() {
        op.position()
    } else if op.position() >= applied.end() {
        shift_by_delete(op.position(), applied)?
    } else {
        // The insertion point was deleted: keep the text where the deleted
        // range used to start.
        applied.position()
    };

    Ok(Operation::Insert(op.with_position(position)))
}

#[inline]
fn delete_after_insert(
    op: &TextRun,
    applied: &TextRun,
) -> Result<Operation, OperationError> {
    if applied.position() <= op.position() {
        let position = shift_by_insert(op.position(), applied)?;
        return Ok(Operation::Delete(op.with_position(position)));
    }

    if applied.position() >= op.end() {
        return Ok(Operation::Delete(op.clone()));
    }

    // The insertion landed strictly inside the deleted range: delete around
    // it instead of deleting it.
    let (before, after) = split_run(op, applied.position())?;

    let first = Operation::delete(op.position(), before);

    let resume = op.position().advance(applied.delta());
    let second = Operation::delete(resume, after);

    Ok(Operation::split(first, second))
}

#[inline]
fn delete_after_delete(
    op: &TextRun,
    applied: &TextRun,
) -> Result<Operation, OperationError> {
    if op.end() <= applied.position() {
        return Ok(Operation::Delete(op.clone()));
    }

    if op.position() >= applied.end() {
        let position = shift_by_delete(op.position(), applied)?;
        return Ok(Operation::Delete(op.with_position(position)));
    }

    let overlap_start = op.position().max(applied.position());
    let overlap_end = op.end().min(applied.end());

    if slice_between(op, overlap_start, overlap_end)?
        != slice_between(applied, overlap_start, overlap_end)?
    {
        return Err(OperationError::TextMismatch { at: overlap_start });
    }

    let prefix = if op.position() < applied.position() {
        split_run(op, applied.position())?.0
    } else {
        ""
    };

    let suffix = if op.end() > applied.end() {
        split_run(op, applied.end())?.1
    } else {
        ""
    };

    let position = op.position().min(applied.position());

    Ok(Operation::delete(position, [prefix, suffix].concat()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(offset: u32) -> TextPosition {
        TextPosition::new(0, offset)
    }

    fn converges(base: &str, a: Operation, b: Operation) -> String {
        let mut left = base.to_owned();
        a.apply_to(&mut left).unwrap();
        transform(&b, &a, false).unwrap().apply_to(&mut left).unwrap();

        let mut right = base.to_owned();
        b.apply_to(&mut right).unwrap();
        transform(&a, &b, true).unwrap().apply_to(&mut right).unwrap();

        assert_eq!(left, right);
        left
    }

    #[test]
    fn insert_insert_different_positions() {
        let a = Operation::insert(pos(1), "X");
        let b = Operation::insert(pos(3), "Y");
        assert_eq!(converges("abcd", a, b), "aXbcYd");
    }

    #[test]
    fn insert_insert_tie() {
        let a = Operation::insert(pos(2), "X");
        let b = Operation::insert(pos(2), "Y");
        assert_eq!(converges("abcd", a, b), "abXYcd");
    }

    #[test]
    fn insert_inside_deleted_range_survives() {
        let del = Operation::delete(pos(1), "bcd");
        let ins = Operation::insert(pos(2), "X");

        assert_eq!(
            transform(&ins, &del, false).unwrap(),
            Operation::insert(pos(1), "X")
        );

        assert_eq!(
            transform(&del, &ins, false).unwrap(),
            Operation::split(
                Operation::delete(pos(1), "b"),
                Operation::delete(pos(2), "cd"),
            )
        );

        assert_eq!(converges("abcdef", del, ins), "aXef");
    }

    #[test]
    fn insert_at_deletion_edges() {
        let del = Operation::delete(pos(1), "b");
        assert_eq!(
            converges("abc", del.clone(), Operation::insert(pos(1), "X")),
            "aXc"
        );
        assert_eq!(
            converges("abc", del, Operation::insert(pos(2), "X")),
            "aXc"
        );
    }

    #[test]
    fn overlapping_deletions_are_intersected() {
        let a = Operation::delete(pos(2), "cdef");
        let b = Operation::delete(pos(1), "bcd");

        assert_eq!(
            transform(&b, &a, false).unwrap(),
            Operation::delete(pos(1), "b")
        );
        assert_eq!(
            transform(&a, &b, true).unwrap(),
            Operation::delete(pos(1), "ef")
        );
        assert_eq!(converges("abcdefg", a, b), "ag");
    }

    #[test]
    fn identical_deletions_become_no_ops() {
        let a = Operation::delete(pos(1), "bc");
        assert_eq!(transform(&a, &a, false).unwrap(), Operation::NoOp);
    }

    #[test]
    fn mismatched_overlap_is_an_error() {
        let a = Operation::delete(pos(1), "bc");
        let b = Operation::delete(pos(2), "xd");
        assert_eq!(
            transform(&b, &a, false),
            Err(OperationError::TextMismatch { at: pos(2) })
        );
    }

    #[test]
    fn no_op_is_neutral() {
        let a = Operation::insert(pos(1), "X");
        assert_eq!(
            transform(&Operation::NoOp, &a, true).unwrap(),
            Operation::NoOp
        );
        assert_eq!(transform(&a, &Operation::NoOp, true).unwrap(), a);
    }

    #[test]
    fn multiline_deletion_shifts_following_lines() {
        let del = Operation::delete(TextPosition::new(0, 2), "c\nde\nf");
        let ins = Operation::insert(TextPosition::new(2, 3), "X");

        assert_eq!(
            transform(&ins, &del, false).unwrap(),
            Operation::insert(TextPosition::new(0, 4), "X")
        );

        assert_eq!(converges("abc\nde\nfghi", del, ins), "abghXi");
    }

    #[test]
    fn split_against_split() {
        let a = Operation::replace(pos(0), "ab", "xyz");
        let b = Operation::replace(pos(3), "de", "0");
        assert_eq!(converges("abcdef", a, b), "xyzc0f");
    }
}

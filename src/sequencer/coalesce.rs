use crate::{Activity, EditActivity};

/// Compacts a run of local activities before they're sent.
///
/// Three reductions are applied until none of them matches anymore:
///
/// - two consecutive edits of the same document by the same participant are
///   [composed](crate::Operation::compose) into one;
///
/// - a selection (or viewport) immediately followed by another selection
///   (resp. viewport) of the same document by the same participant is
///   dropped, keeping only the most recent one;
///
/// - a selection immediately followed by an edit of the same document by the
///   same participant is dropped, since the edit moves the cursor anyway.
///
/// Activities are never reordered, and every other kind of activity acts as
/// a barrier that nothing is merged across. Edits that do nothing, or that
/// compose to nothing, are dropped.
///
/// The result is a fixed point: coalescing it again returns it unchanged.
pub fn coalesce<I>(activities: I) -> Vec<Activity>
where
    I: IntoIterator<Item = Activity>,
{
    // Invariant: no two adjacent activities of the stack can be reduced.
    let mut stack: Vec<Activity> = Vec::new();

    for activity in activities.into_iter().filter(|a| !is_empty_edit(a)) {
        let mut pending = Some(activity);

        while let Some(next) = pending.take() {
            let Some(prev) = stack.pop() else {
                stack.push(next);
                break;
            };

            match reduce(prev, next) {
                Reduced::Merged(merged) => pending = merged,

                Reduced::Kept(prev, next) => {
                    stack.push(prev);
                    stack.push(next);
                },
            }
        }
    }

    stack
}

enum Reduced {
    /// The two activities were reduced to at most one, which may in turn be
    /// reducible with the one before.
    Merged(Option<Activity>),

    /// The two activities can't be reduced.
    Kept(Activity, Activity),
}

#[inline]
fn is_empty_edit(activity: &Activity) -> bool {
    matches!(activity, Activity::Edit(edit) if edit.operation().is_no_op())
}

#[inline]
fn reduce(prev: Activity, next: Activity) -> Reduced {
    if prev.source() != next.source() || prev.path() != next.path() {
        return Reduced::Kept(prev, next);
    }

    match (prev, next) {
        (Activity::Edit(prev), Activity::Edit(next)) => {
            let source = prev.source();
            let path = prev.path().clone();
            let operation =
                prev.into_operation().compose(next.into_operation());

            let merged = (!operation.is_no_op())
                .then(|| EditActivity::new(source, path, operation).into());

            Reduced::Merged(merged)
        },

        (Activity::TextSelection(_), next @ Activity::TextSelection(_))
        | (Activity::Viewport(_), next @ Activity::Viewport(_))
        | (Activity::TextSelection(_), next @ Activity::Edit(_)) => {
            Reduced::Merged(Some(next))
        },

        (prev, next) => Reduced::Kept(prev, next),
    }
}

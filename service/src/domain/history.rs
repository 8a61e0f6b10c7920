//! Append-only [`History`] of status entries.

use std::{slice, vec};

use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};

/// Entry of a [`History`].
///
/// Once recorded, an [`Entry`] is never changed nor removed.
pub trait Entry {
    /// ID of this [`Entry`], assigned monotonically by the storage.
    type Id: Copy + Ord;

    /// Moment this [`Entry`] was recorded at.
    type RecordedAt: Copy + Ord;

    /// Returns the ID of this [`Entry`].
    fn id(&self) -> Self::Id;

    /// Returns the moment this [`Entry`] was recorded at.
    fn recorded_at(&self) -> Self::RecordedAt;
}

/// Append-only sequence of [`Entry`]s, ordered ascending by their
/// [`Entry::recorded_at()`] moment, and then by their [`Entry::id()`].
///
/// The last [`Entry`] of this order is the [`History::current()`] one, so
/// entries recorded at the same moment are resolved in favor of the larger
/// ID.
#[derive(Clone, Debug)]
pub struct History<E> {
    /// [`Entry`]s of this [`History`] in their order.
    entries: Vec<E>,
}

impl<E> Default for History<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: Entry> History<E> {
    /// Creates a new empty [`History`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the provided [`Entry`] to this [`History`].
    ///
    /// It's placed according to its [`Entry::recorded_at()`] moment, so an
    /// [`Entry`] recorded in the past doesn't become the current one.
    pub fn append(&mut self, entry: E) {
        let key = (entry.recorded_at(), entry.id());
        let at = self
            .entries
            .partition_point(|e| (e.recorded_at(), e.id()) <= key);
        self.entries.insert(at, entry);
    }

    /// Returns the current [`Entry`] of this [`History`], if any.
    #[must_use]
    pub fn current(&self) -> Option<&E> {
        self.entries.last()
    }

    /// Returns an [`Iterator`] over all the [`Entry`]s of this [`History`] in
    /// their order.
    pub fn iter(&self) -> slice::Iter<'_, E> {
        self.entries.iter()
    }

    /// Returns the number of [`Entry`]s in this [`History`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indicates whether this [`History`] has no [`Entry`]s at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Entry> FromIterator<E> for History<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut entries = iter.into_iter().collect::<Vec<_>>();
        entries.sort_by_key(|e| (e.recorded_at(), e.id()));
        Self { entries }
    }
}

impl<E> IntoIterator for History<E> {
    type Item = E;
    type IntoIter = vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'h, E: Entry> IntoIterator for &'h History<E> {
    type Item = &'h E;
    type IntoIter = slice::Iter<'h, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Free-form comment attached to an [`Entry`].
#[derive(AsRef, Clone, Debug, Default, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Comment(String);

impl Comment {
    /// Maximum length of a [`Comment`] in bytes.
    pub const MAX_LEN: usize = 2048;

    /// Creates a new [`Comment`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `comment` is not longer than
    /// [`Comment::MAX_LEN`].
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(comment: impl Into<String>) -> Self {
        Self(comment.into())
    }

    /// Creates a new [`Comment`] if the given `comment` is valid.
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Option<Self> {
        let comment = comment.into();
        (comment.len() <= Self::MAX_LEN).then_some(Self(comment))
    }
}

#[cfg(test)]
mod spec {
    use super::{Entry, History};

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    struct Record {
        id: u32,
        at: u32,
        label: char,
    }

    impl Entry for Record {
        type Id = u32;
        type RecordedAt = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn recorded_at(&self) -> u32 {
            self.at
        }
    }

    fn record(id: u32, at: u32, label: char) -> Record {
        Record { id, at, label }
    }

    fn labels(history: &History<Record>) -> String {
        history.iter().map(|r| r.label).collect()
    }

    #[test]
    fn orders_by_recording_moment() {
        let history =
            [record(1, 30, 'c'), record(2, 10, 'a'), record(3, 20, 'b')]
                .into_iter()
                .collect::<History<_>>();

        assert_eq!(labels(&history), "abc");
        assert_eq!(history.current().map(|r| r.label), Some('c'));
    }

    #[test]
    fn resolves_ties_by_larger_id() {
        let history = [record(7, 10, 'x'), record(3, 10, 'y')]
            .into_iter()
            .collect::<History<_>>();

        assert_eq!(labels(&history), "yx");
        assert_eq!(history.current().map(|r| r.id), Some(7));

        let mut history = History::new();
        history.append(record(9, 10, 'n'));
        history.append(record(4, 10, 'o'));

        assert_eq!(history.current().map(|r| r.id), Some(9));
    }

    #[test]
    fn appends_in_the_past_without_becoming_current() {
        let mut history = History::new();
        history.append(record(1, 20, 'b'));
        history.append(record(2, 10, 'a'));

        assert_eq!(labels(&history), "ab");
        assert_eq!(history.current().map(|r| r.label), Some('b'));
    }

    #[test]
    fn only_grows() {
        let mut history = History::new();
        assert!(history.is_empty());
        assert_eq!(history.current(), None);

        let mut seen = Vec::new();
        for (id, at) in [(1, 5), (2, 5), (3, 1), (4, 9)] {
            history.append(record(id, at, 'r'));
            seen.push(record(id, at, 'r'));

            assert_eq!(history.len(), seen.len());
            for r in &seen {
                assert!(history.iter().any(|e| e == r));
            }
        }
    }
}

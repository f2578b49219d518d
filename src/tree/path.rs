use std::fmt;

use super::Value;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// An ordered key path into a flag tree.
///
/// There is no delimiter syntax: `["limits", "uploads"]` and `["items", 1]`
/// are built from their segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Segment>);

impl Path {
    /// The empty path, which addresses the root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

/// Resolves `path` against `root`.
///
/// Returns `None` as soon as a segment is missing or the current value cannot
/// be indexed, so an absent flag reads the same as a false-y one. The empty
/// path returns `root`.
///
/// A key segment indexes a list when it parses as a number, and an index
/// segment looks up its decimal form in a table.
pub fn get<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |current, segment| step(current, segment))
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Table(table), Segment::Key(key)) => table.get(key.as_str()),
        (Value::Table(table), Segment::Index(i)) => table.get(i.to_string().as_str()),
        (Value::List(items), Segment::Index(i)) => items.get(*i),
        (Value::List(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => f.write_str(key)?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<&String> for Segment {
    fn from(key: &String) -> Self {
        Segment::Key(key.clone())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl From<Segment> for Path {
    fn from(segment: Segment) -> Self {
        Self(vec![segment])
    }
}

impl From<&str> for Path {
    fn from(key: &str) -> Self {
        Self(vec![key.into()])
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl<S: Into<Segment>, const N: usize> From<[S; N]> for Path {
    fn from(segments: [S; N]) -> Self {
        segments.into_iter().collect()
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl<S: Into<Segment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Table;

    fn sample() -> Value {
        let b = Value::from(vec![Value::Int(10), Value::Int(20)]);
        let a: Value = [("b", b)].into_iter().collect();
        [("a", a)].into_iter().collect()
    }

    #[test]
    fn test_get_mixed_segments() {
        let root = sample();
        let path = Path::from(vec![Segment::from("a"), "b".into(), 1.into()]);
        assert_eq!(get(&root, &path), Some(&Value::Int(20)));
    }

    #[test]
    fn test_get_missing_path_is_none() {
        let root: Value = [("a", Value::from(Table::new()))].into_iter().collect();
        assert_eq!(get(&root, &Path::from(["a", "b", "c"])), None);
    }

    #[test]
    fn test_get_through_scalar_is_none() {
        let root = sample();
        let through_int = Path::from(vec![Segment::from("a"), "b".into(), 0.into(), "x".into()]);
        assert_eq!(get(&root, &through_int), None);
        assert_eq!(get(&Value::Null, &Path::from("anything")), None);
    }

    #[test]
    fn test_get_empty_path_returns_root() {
        let root = sample();
        let found = get(&root, &Path::root()).unwrap();
        assert!(found.same(&root));
    }

    #[test]
    fn test_numeric_key_indexes_list() {
        let root = sample();
        assert_eq!(get(&root, &Path::from(["a", "b", "0"])), Some(&Value::Int(10)));
        assert_eq!(get(&root, &Path::from(["a", "b", "7"])), None);
    }

    #[test]
    fn test_index_looks_up_decimal_table_key() {
        let root: Value = [("3", "three")].into_iter().collect();
        assert_eq!(get(&root, &Path::from([3usize])), Some(&Value::from("three")));
    }

    #[test]
    fn test_display() {
        let path = Path::from(vec![Segment::from("a"), "b".into(), 1.into()]);
        assert_eq!(path.to_string(), "a.b[1]");
        assert_eq!(Path::root().to_string(), "<root>");
    }
}

#![forbid(unsafe_code)]

use serde_json::Value;

/// Location inside a row document: `title`, `items[2].name`, `tags[*]`.
///
/// The empty path addresses the document root. `[*]` only appears in paths
/// derived from a schema (it stands for "every array element").
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DataPath {
    segments: Vec<PathSegment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    EmptySegment { at: usize },
    UnclosedBracket { at: usize },
    InvalidIndex { at: usize },
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySegment { at } => write!(f, "empty path segment at {at}"),
            Self::UnclosedBracket { at } => write!(f, "unclosed '[' at {at}"),
            Self::InvalidIndex { at } => write!(f, "invalid array index at {at}"),
        }
    }
}

impl std::error::Error for PathError {}

impl DataPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Key(key.into()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(index));
        next
    }

    pub fn wildcard(&self) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Wildcard);
        next
    }

    pub fn parent(&self) -> Option<(DataPath, &PathSegment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            DataPath {
                segments: rest.to_vec(),
            },
            last,
        ))
    }

    /// Splits into the first `depth` segments and the rest.
    pub fn split_at(&self, depth: usize) -> (DataPath, DataPath) {
        let depth = depth.min(self.segments.len());
        let (head, tail) = self.segments.split_at(depth);
        (
            DataPath {
                segments: head.to_vec(),
            },
            DataPath {
                segments: tail.to_vec(),
            },
        )
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, PathSegment::Wildcard))
    }

    pub fn parse(value: &str) -> Result<Self, PathError> {
        let value = value.trim();
        let mut segments = Vec::new();
        if value.is_empty() {
            return Ok(Self { segments });
        }

        let bytes = value.as_bytes();
        let mut pos = 0usize;
        let mut expect_key = true;
        while pos < bytes.len() {
            match bytes[pos] {
                b'[' => {
                    let Some(close) = value[pos..].find(']') else {
                        return Err(PathError::UnclosedBracket { at: pos });
                    };
                    let inner = &value[pos + 1..pos + close];
                    if inner == "*" {
                        segments.push(PathSegment::Wildcard);
                    } else {
                        let index = inner
                            .parse::<usize>()
                            .map_err(|_| PathError::InvalidIndex { at: pos })?;
                        segments.push(PathSegment::Index(index));
                    }
                    pos += close + 1;
                    expect_key = false;
                }
                b'.' => {
                    if expect_key {
                        return Err(PathError::EmptySegment { at: pos });
                    }
                    pos += 1;
                    expect_key = true;
                    if pos >= bytes.len() {
                        return Err(PathError::EmptySegment { at: pos });
                    }
                }
                _ => {
                    if !expect_key {
                        return Err(PathError::EmptySegment { at: pos });
                    }
                    let end = value[pos..]
                        .find(['.', '['])
                        .map(|offset| pos + offset)
                        .unwrap_or(bytes.len());
                    segments.push(PathSegment::Key(value[pos..end].to_string()));
                    pos = end;
                    expect_key = false;
                }
            }
        }

        Ok(Self { segments })
    }

    /// Every concrete value matching this path, expanding `[*]`.
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match (segment, value) {
                    (PathSegment::Key(key), Value::Object(map)) => {
                        if let Some(child) = map.get(key) {
                            next.push(child);
                        }
                    }
                    (PathSegment::Index(index), Value::Array(items)) => {
                        if let Some(child) = items.get(*index) {
                            next.push(child);
                        }
                    }
                    (PathSegment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                    _ => {}
                }
            }
            current = next;
        }
        current
    }

    /// Mutable counterpart of [`DataPath::select`].
    pub fn select_mut<'a>(&self, root: &'a mut Value) -> Vec<&'a mut Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match (segment, value) {
                    (PathSegment::Key(key), Value::Object(map)) => {
                        if let Some(child) = map.get_mut(key) {
                            next.push(child);
                        }
                    }
                    (PathSegment::Index(index), Value::Array(items)) => {
                        if let Some(child) = items.get_mut(*index) {
                            next.push(child);
                        }
                    }
                    (PathSegment::Wildcard, Value::Array(items)) => next.extend(items.iter_mut()),
                    _ => {}
                }
            }
            current = next;
        }
        current
    }

    /// SQLite JSON path (`$."a"[0]."b"`). Wildcards are not representable.
    pub fn to_sqlite_json_path(&self) -> Option<String> {
        let mut out = String::from("$");
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => {
                    out.push_str(".\"");
                    out.push_str(&key.replace('"', "\\\""));
                    out.push('"');
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
                PathSegment::Wildcard => return None,
            }
        }
        Some(out)
    }
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Wildcard => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for DataPath {
    type Err = PathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

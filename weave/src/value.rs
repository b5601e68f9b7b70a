//! Module defining the tagged [`Value`] union and the [`Registry`] variable store.

use crate::error::WeaveError;
use std::collections::HashMap;
use std::fmt;

/// The discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Double,
    Bool,
    String,
    List,
    Object,
    Pointer,
    Unit,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int => "Int",
            Self::Double => "Double",
            Self::Bool => "Bool",
            Self::String => "String",
            Self::List => "List",
            Self::Object => "Object",
            Self::Pointer => "Pointer",
            Self::Unit => "Unit",
        };
        f.write_str(s)
    }
}

/// A range into the registry's secondary, numerically-indexed child store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: usize,
    pub length: usize,
}

/// A tagged value. The payload read must always correspond to the discriminant;
/// a getter for the wrong kind reports absence rather than silently coercing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    /// Header for a compound list; `range` indexes the registry's child store.
    List(Range),
    /// Header for a compound object; `range` indexes the registry's child store.
    Object(Range),
    /// A single-hop reference to another registry key.
    Pointer(String),
    Unit,
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Double(_) => ValueKind::Double,
            Self::Bool(_) => ValueKind::Bool,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Object(_) => ValueKind::Object,
            Self::Pointer(_) => ValueKind::Pointer,
            Self::Unit => ValueKind::Unit,
        }
    }

    /// True for the scalar kinds that are representable as a number for
    /// expression evaluation: `Int`, `Double`, and `Bool` (as `0`/`1`).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Double(_) | Self::Bool(_))
    }

    /// Canonical decimal rendering used when substituting a variable into an
    /// expression string (invariant-culture: `.` as the decimal separator, no
    /// grouping).
    #[must_use]
    pub fn as_expression_text(&self) -> Option<String> {
        match self {
            Self::Int(n) => Some(n.to_string()),
            Self::Double(n) => Some(format!("{}", n)),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Double(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Coerce this value to a boolean the way the expression evaluator does
    /// when the trimmed expression text is a single registry key (§4.6 step 2).
    #[must_use]
    pub fn as_bool_coerced(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            Self::Double(n) => Some(*n != 0.0),
            Self::String(s) => Some(!s.is_empty()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Double(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "{}", s),
            Self::List(r) => write!(f, "[list:{}..{}]", r.start, r.start + r.length),
            Self::Object(r) => write!(f, "{{object:{}..{}}}", r.start, r.start + r.length),
            Self::Pointer(key) => write!(f, "->{}", key),
            Self::Unit => f.write_str("()"),
        }
    }
}

/// A registry record: the named header plus an optional field-name `attribute`
/// used when the value is a child of an `Object`.
#[derive(Debug, Clone, PartialEq)]
struct Entry {
    value: Value,
    attribute: Option<String>,
}

const MAX_POINTER_DEPTH: usize = 8;

/// The typed variable store. Lookups used by expression substitution are
/// case-insensitive; the keys themselves are stored case-preserving.
#[derive(Debug, Default)]
pub struct Registry {
    /// Case-preserving key -> entry. Case-insensitive lookup is done via `canonical`.
    entries: HashMap<String, Entry>,
    /// Secondary, numerically-indexed store backing `List`/`Object` children.
    /// `Object` children carry a field-naming `attribute`; `List` children leave it `None`.
    children: Vec<(Option<String>, Value)>,
}

fn canonical(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn find_key<'a>(&'a self, key: &str) -> Option<&'a str> {
        let target = canonical(key);
        self.entries
            .keys()
            .find(|k| canonical(k) == target)
            .map(|s| s.as_str())
    }

    /// Store `value` under `key`, replacing any existing entry. Setting a new
    /// key is O(1) amortised.
    pub fn set(&mut self, key: &str, value: Value) {
        self.set_with_attribute(key, value, None);
    }

    pub fn set_with_attribute(&mut self, key: &str, value: Value, attribute: Option<String>) {
        if let Some(existing) = self.find_key(key).map(str::to_string) {
            self.remove(&existing);
        }
        self.entries.insert(key.to_string(), Entry { value, attribute });
    }

    /// Fetch the raw value and its kind, regardless of kind. Internal helper
    /// for the typed getters below, including the compound ones.
    fn get_raw(&self, key: &str) -> Option<(&Value, ValueKind)> {
        let canon = self.find_key(key)?;
        let entry = self.entries.get(canon)?;
        Some((&entry.value, entry.value.kind()))
    }

    /// Fetch the value and its kind. Per §4.1, compound kinds (`List`/
    /// `Object`) are absent through this accessor; read them with
    /// `get_list`/`get_object` instead.
    #[must_use]
    pub fn get_typed(&self, key: &str) -> Option<(&Value, ValueKind)> {
        match self.get_raw(key)? {
            (_, ValueKind::List | ValueKind::Object) => None,
            found => Some(found),
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get_typed(key)? {
            (Value::Int(n), _) => Some(*n),
            _ => None,
        }
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.get_typed(key)? {
            (Value::Double(n), _) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_typed(key)? {
            (Value::Bool(b), _) => Some(*b),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get_typed(key)? {
            (Value::String(s), _) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<Vec<&Value>> {
        match self.get_raw(key)? {
            (Value::List(range), _) => self
                .children
                .get(range.start..range.start + range.length)
                .map(|slice| slice.iter().map(|(_, v)| v).collect()),
            _ => None,
        }
    }

    /// Returns each field as `(attribute, value)`; elements with no attribute
    /// (e.g. if the list/object boundary was misused) are paired with `""`.
    #[must_use]
    pub fn get_object(&self, key: &str) -> Option<Vec<(&str, &Value)>> {
        match self.get_raw(key)? {
            (Value::Object(range), _) => self
                .children
                .get(range.start..range.start + range.length)
                .map(|slice| slice.iter().map(|(a, v)| (a.as_deref().unwrap_or(""), v)).collect()),
            _ => None,
        }
    }

    /// Push plain (unnamed) children for a new `List` and return the header range.
    pub fn push_list_children(&mut self, values: Vec<Value>) -> Range {
        let start = self.children.len();
        let length = values.len();
        self.children.extend(values.into_iter().map(|v| (None, v)));
        Range { start, length }
    }

    /// Push named children for a new `Object` and return the header range.
    pub fn push_object_children(&mut self, fields: Vec<(String, Value)>) -> Range {
        let start = self.children.len();
        let length = fields.len();
        self.children
            .extend(fields.into_iter().map(|(a, v)| (Some(a), v)));
        Range { start, length }
    }

    /// Follow a `Pointer` one hop per the invariant; a cycle or dangling target
    /// yields `None` rather than looping, capped at [`MAX_POINTER_DEPTH`] hops
    /// when pointers chain.
    #[must_use]
    pub fn get_pointer(&self, key: &str) -> Option<(&Value, ValueKind)> {
        let mut current = key.to_string();
        for _ in 0..MAX_POINTER_DEPTH {
            match self.get_typed(&current)? {
                (Value::Pointer(target), _) => current = target.clone(),
                (value, kind) => return Some((value, kind)),
            }
        }
        None
    }

    /// Remove `key` and, if it headers a compound value, all of its children.
    /// Removing an unknown key returns `false`.
    pub fn remove(&mut self, key: &str) -> bool {
        let canon = match self.find_key(key) {
            Some(k) => k.to_string(),
            None => return false,
        };
        // Children are left in the secondary store (append-only log); only the
        // header is removed, matching the "header removal also removes access
        // to its children" invariant without requiring a compacting pass.
        self.entries.remove(&canon);
        true
    }

    /// Empty both stores atomically.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.children.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_numeric(&self, key: &str) -> bool {
        self.get_typed(key).is_some_and(|(v, _)| v.is_numeric())
    }

    /// Debug pretty-print of every entry, sorted by key for determinism.
    #[must_use]
    pub fn dump(&self) -> String {
        if self.entries.is_empty() {
            return "(empty)".to_string();
        }
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| format!("{} = {}", k, self.entries[k].value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Substitute every registry variable referenced in `expr` with its
    /// canonical text form (§4.1, §4.6 step 3). Matches whole identifier
    /// tokens only, case-insensitively.
    #[must_use]
    pub fn replace_variables(&self, expr: &str) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut chars = expr.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c.is_ascii_alphabetic() || c == '_' {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &expr[start..end];
                match word {
                    "true" | "false" => out.push_str(word),
                    _ => {
                        if let Some((value, _)) = self.get_typed(word) {
                            if let Some(text) = value.as_expression_text() {
                                out.push_str(&text);
                            } else {
                                out.push_str(word);
                            }
                        } else {
                            out.push_str(word);
                        }
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Parse a built-in command's `type` argument (`Wstring`/`Wint`/`Wdouble`/`Wbool`)
/// and the corresponding raw text into a [`Value`]. Returns
/// [`WeaveError::ErrorTypeMismatch`] when the text does not parse as that type.
pub fn parse_typed_value(raw: &str, type_name: &str) -> Result<Value, WeaveError> {
    match type_name {
        "Wstring" => Ok(Value::String(raw.to_string())),
        "Wint" => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| WeaveError::ErrorTypeMismatch(raw.to_string(), "Wint".to_string())),
        "Wdouble" => raw
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| WeaveError::ErrorTypeMismatch(raw.to_string(), "Wdouble".to_string())),
        "Wbool" => raw
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| WeaveError::ErrorTypeMismatch(raw.to_string(), "Wbool".to_string())),
        other => Err(WeaveError::ErrorTypeMismatch(other.to_string(), "known type".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars() {
        let mut reg = Registry::new();
        reg.set("score", Value::Int(100));
        assert_eq!(reg.get_int("score"), Some(100));
        assert!(reg.remove("score"));
        assert_eq!(reg.get_typed("score"), None);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut reg = Registry::new();
        reg.set("Score", Value::Int(7));
        assert_eq!(reg.get_int("score"), Some(7));
        assert_eq!(reg.get_int("SCORE"), Some(7));
    }

    #[test]
    fn remove_unknown_key_returns_false() {
        let mut reg = Registry::new();
        assert!(!reg.remove("nope"));
    }

    #[test]
    fn replace_variables_substitutes_whole_tokens() {
        let mut reg = Registry::new();
        reg.set("x", Value::Int(10));
        reg.set("y", Value::Double(2.5));
        assert_eq!(reg.replace_variables("x + y * 2"), "10 + 2.5 * 2");
    }

    #[test]
    fn get_typed_is_absent_for_compound_kinds() {
        let mut reg = Registry::new();
        let range = reg.push_list_children(vec![Value::Int(1), Value::Int(2)]);
        reg.set("list", Value::List(range));
        assert_eq!(reg.get_typed("list"), None);
        assert_eq!(reg.get_int("list"), None);
        assert_eq!(reg.get_list("list").map(|l| l.len()), Some(2));
    }

    #[test]
    fn pointer_dereferences_one_hop() {
        let mut reg = Registry::new();
        reg.set("a", Value::Int(5));
        reg.set("b", Value::Pointer("a".into()));
        assert_eq!(reg.get_pointer("b").map(|(v, _)| v.clone()), Some(Value::Int(5)));
    }
}

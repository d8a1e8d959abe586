use std::cell::RefCell;
use std::rc::Rc;

use crate::world::{FileId, FolderId};

/// Shared mutable list storage. Copying the value copies the handle.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// A variable slot. Scopes bind names to slots; parameter passing can
/// alias a caller's slot, which is what gives Aud its reference
/// semantics for simple types.
pub type Slot = Rc<RefCell<Value>>;

/// Runtime value. Simple kinds hold their data directly and are copied
/// on assignment; composite kinds are handles into shared storage (the
/// list store or the domain world).
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    List(ListRef),
    Folder(FolderId),
    File(FileId),
    Audio(FileId),
}

impl Value {
    pub fn new_list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn new_slot(value: Value) -> Slot {
        Rc::new(RefCell::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The file entity behind a `File` or `Audio` handle.
    pub fn file_id(&self) -> Option<FileId> {
        match self {
            Value::File(id) | Value::Audio(id) => Some(*id),
            _ => None,
        }
    }
}

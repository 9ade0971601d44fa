//! Script object representation.

use super::function::Function;
use super::value::Value;
use rustc_hash::FxHashMap;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// A script object.
#[derive(Debug)]
pub struct Object {
    /// The prototype of this object
    pub prototype: Option<ObjectRef>,
    /// What sort of object this is
    pub kind: ObjectKind,
    /// The named properties
    properties: FxHashMap<String, Property>,
    /// Property names in insertion order
    order: Vec<String>,
}

/// The internal shape of an object.
#[derive(Debug)]
pub enum ObjectKind {
    /// A plain object
    Ordinary,
    /// An array with dense element storage
    Array(Vec<Value>),
    /// A callable object
    Function(Function),
}

/// A property slot.
#[derive(Debug, Clone)]
pub struct Property {
    /// The property value
    pub value: Value,
    /// Whether the property shows up in `Object.keys` and `for...in`
    pub enumerable: bool,
}

impl Object {
    /// Creates a new empty object of the given kind.
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            prototype,
            kind,
            properties: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, key: String, value: Value, enumerable: bool) {
        if let Some(prop) = self.properties.get_mut(&key) {
            prop.value = value;
            return;
        }
        self.order.push(key.clone());
        self.properties.insert(key, Property { value, enumerable });
    }
}

/// A shared, interior-mutable handle to an [`Object`].
///
/// Borrows are never held across calls back into the interpreter, so
/// native callbacks may freely read and write the objects they receive.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    /// Wraps a new object.
    pub fn new(object: Object) -> Self {
        Self(Rc::new(RefCell::new(object)))
    }

    /// Returns true if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Immutably borrows the object.
    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Mutably borrows the object.
    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    /// Returns true if this object can be called.
    pub fn is_function(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    /// Returns true if this object is an array.
    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    /// Returns a copy of the elements if this object is an array.
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match &self.borrow().kind {
            ObjectKind::Array(elements) => Some(elements.clone()),
            _ => None,
        }
    }

    /// Returns the prototype of this object.
    pub fn prototype(&self) -> Option<ObjectRef> {
        self.borrow().prototype.clone()
    }

    /// Replaces the prototype of this object.
    pub fn set_prototype(&self, prototype: Option<ObjectRef>) {
        self.borrow_mut().prototype = prototype;
    }

    /// Gets an own property.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        let object = self.borrow();
        if let ObjectKind::Array(elements) = &object.kind {
            if key == "length" {
                return Some(Value::Number(elements.len() as f64));
            }
            if let Some(index) = array_index(key) {
                return elements.get(index).cloned();
            }
        }
        object.properties.get(key).map(|p| p.value.clone())
    }

    /// Gets a property, walking the prototype chain.
    pub fn get(&self, key: &str) -> Value {
        let mut current = self.clone();
        loop {
            if let Some(value) = current.get_own(key) {
                return value;
            }
            match current.prototype() {
                Some(prototype) => current = prototype,
                None => return Value::Undefined,
            }
        }
    }

    /// Sets an own enumerable property.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let mut object = self.borrow_mut();
        if let ObjectKind::Array(elements) = &mut object.kind {
            if key == "length" {
                let len = value.to_number();
                if len >= 0.0 && len.fract() == 0.0 {
                    elements.resize(len as usize, Value::Undefined);
                }
                return;
            }
            if let Some(index) = array_index(&key) {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return;
            }
        }
        object.insert(key, value, true);
    }

    /// Sets an own property that is skipped by key enumeration.
    pub fn define_hidden(&self, key: impl Into<String>, value: Value) {
        self.borrow_mut().insert(key.into(), value, false);
    }

    /// Checks if an own property exists.
    pub fn has_own(&self, key: &str) -> bool {
        let object = self.borrow();
        if let ObjectKind::Array(elements) = &object.kind {
            if key == "length" {
                return true;
            }
            if let Some(index) = array_index(key) {
                return index < elements.len();
            }
        }
        object.properties.contains_key(key)
    }

    /// Checks if a property exists on this object or its prototype chain.
    pub fn has(&self, key: &str) -> bool {
        let mut current = self.clone();
        loop {
            if current.has_own(key) {
                return true;
            }
            match current.prototype() {
                Some(prototype) => current = prototype,
                None => return false,
            }
        }
    }

    /// Deletes an own property.
    pub fn delete(&self, key: &str) -> bool {
        let mut object = self.borrow_mut();
        if let ObjectKind::Array(elements) = &mut object.kind {
            if let Some(index) = array_index(key) {
                if let Some(slot) = elements.get_mut(index) {
                    *slot = Value::Undefined;
                }
                return true;
            }
        }
        if object.properties.remove(key).is_some() {
            object.order.retain(|k| k != key);
        }
        true
    }

    /// Returns the enumerable own property names in order: array indices
    /// first, then named properties in insertion order.
    pub fn keys(&self) -> Vec<String> {
        let object = self.borrow();
        let mut keys = Vec::new();
        if let ObjectKind::Array(elements) = &object.kind {
            keys.extend((0..elements.len()).map(|i| i.to_string()));
        }
        keys.extend(
            object
                .order
                .iter()
                .filter(|k| object.properties.get(*k).is_some_and(|p| p.enumerable))
                .cloned(),
        );
        keys
    }

    /// Returns the function name if this object is callable.
    pub fn function_name(&self) -> Option<Rc<str>> {
        match &self.borrow().kind {
            ObjectKind::Function(function) => Some(function.name.clone()),
            _ => None,
        }
    }

    fn fmt_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let elements = match &self.borrow().kind {
            ObjectKind::Ordinary => return write!(f, "[object Object]"),
            ObjectKind::Function(function) => {
                return write!(f, "function {}() {{ [native code] }}", function.name);
            }
            ObjectKind::Array(elements) => elements.clone(),
        };
        if depth > 8 {
            return Ok(());
        }
        for (i, element) in elements.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match element {
                Value::Undefined | Value::Null => {}
                Value::Object(object) => object.fmt_depth(f, depth + 1)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_depth(f, 0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Objects may be cyclic, so only the shape is printed
        match self.0.try_borrow() {
            Ok(object) => match &object.kind {
                ObjectKind::Ordinary => write!(f, "Object({} properties)", object.order.len()),
                ObjectKind::Array(elements) => write!(f, "Array({})", elements.len()),
                ObjectKind::Function(function) => write!(f, "Function({})", function.name),
            },
            Err(_) => write!(f, "Object(<borrowed>)"),
        }
    }
}

/// Parses a canonical array index ("0", "17", but not "01" or "-1").
fn array_index(key: &str) -> Option<usize> {
    let first = key.as_bytes().first()?;
    if !first.is_ascii_digit() || (key.len() > 1 && *first == b'0') {
        return None;
    }
    key.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> ObjectRef {
        ObjectRef::new(Object::new(ObjectKind::Ordinary, None))
    }

    #[test]
    fn test_property_order_is_insertion_order() {
        let obj = plain();
        obj.set("b", Value::Number(1.0));
        obj.set("a", Value::Number(2.0));
        obj.set("b", Value::Number(3.0));
        assert_eq!(obj.keys(), vec!["b", "a"]);
        assert_eq!(obj.get("b"), Value::Number(3.0));
    }

    #[test]
    fn test_hidden_properties_are_not_enumerated() {
        let obj = plain();
        obj.define_hidden("constructor", Value::Null);
        obj.set("visible", Value::Null);
        assert_eq!(obj.keys(), vec!["visible"]);
        assert!(obj.has_own("constructor"));
    }

    #[test]
    fn test_prototype_chain_lookup() {
        let proto = plain();
        proto.set("greet", Value::from("hi"));
        let obj = ObjectRef::new(Object::new(ObjectKind::Ordinary, Some(proto)));
        assert_eq!(obj.get("greet"), Value::from("hi"));
        assert!(obj.has("greet"));
        assert!(!obj.has_own("greet"));
        assert_eq!(obj.get("missing"), Value::Undefined);
    }

    #[test]
    fn test_delete() {
        let obj = plain();
        obj.set("x", Value::Number(1.0));
        assert!(obj.delete("x"));
        assert!(!obj.has_own("x"));
        assert!(obj.keys().is_empty());
    }

    #[test]
    fn test_array_index_and_length() {
        let arr = ObjectRef::new(Object::new(ObjectKind::Array(Vec::new()), None));
        arr.set("2", Value::from("c"));
        assert_eq!(arr.get("length"), Value::Number(3.0));
        assert_eq!(arr.get("0"), Value::Undefined);
        arr.set("length", Value::Number(1.0));
        assert_eq!(arr.array_elements().map(|e| e.len()), Some(1));
        assert_eq!(arr.keys(), vec!["0"]);
        assert!(!arr.has_own("01"));
    }

    #[test]
    fn test_array_display_joins_elements() {
        let arr = ObjectRef::new(Object::new(
            ObjectKind::Array(vec![Value::Number(1.0), Value::Null, Value::from("x")]),
            None,
        ));
        assert_eq!(arr.to_string(), "1,,x");
    }
}

//! Lexically-nested environment frames.
//!
//! Frames are reference-counted so function values can capture their defining
//! scope; reads walk the parent chain, writes hit the current frame, and
//! `update` rewrites the binding in every frame that can see it so inner
//! assignments reach the defining frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Default)]
pub struct Scope {
    store: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new() -> Rc<Scope> {
        Rc::new(Scope::default())
    }

    pub fn from(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            store: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn read(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.store.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.read(name))
    }

    pub fn write(&self, name: &str, value: Value) {
        self.store.borrow_mut().insert(name.to_string(), value);
    }

    /// Overwrite the binding in this frame and every ancestor that can see
    /// it, so the defining frame observes the new value.
    pub fn update(&self, name: &str, value: Value) {
        if self.read(name).is_some() {
            self.write(name, value.clone());
        }
        if let Some(parent) = &self.parent {
            parent.update(name, value);
        }
    }

    /// Copy bindings from `other` that are not already present locally.
    pub fn merge(&self, other: &Scope) {
        let mut store = self.store.borrow_mut();
        for (name, value) in other.store.borrow().iter() {
            store
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_walks_parents() {
        let root = Scope::new();
        root.write("a", Value::Integer(1));
        let child = Scope::from(&root);
        assert_eq!(child.read("a").map(|v| v.check()), Some("1".into()));
        assert!(child.read("missing").is_none());
    }

    #[test]
    fn write_shadows_locally() {
        let root = Scope::new();
        root.write("a", Value::Integer(1));
        let child = Scope::from(&root);
        child.write("a", Value::Integer(2));
        assert_eq!(child.read("a").map(|v| v.check()), Some("2".into()));
        assert_eq!(root.read("a").map(|v| v.check()), Some("1".into()));
    }

    #[test]
    fn update_reaches_the_defining_frame() {
        let root = Scope::new();
        root.write("counter", Value::Integer(0));
        let middle = Scope::from(&root);
        let inner = Scope::from(&middle);
        inner.update("counter", Value::Integer(5));
        assert_eq!(root.read("counter").map(|v| v.check()), Some("5".into()));
    }

    #[test]
    fn update_ignores_unknown_names() {
        let root = Scope::new();
        let child = Scope::from(&root);
        child.update("ghost", Value::Integer(1));
        assert!(root.read("ghost").is_none());
        assert!(child.read("ghost").is_none());
    }

    #[test]
    fn merge_keeps_local_bindings() {
        let ours = Scope::new();
        ours.write("a", Value::Integer(1));
        let theirs = Scope::new();
        theirs.write("a", Value::Integer(9));
        theirs.write("b", Value::Integer(2));
        ours.merge(&theirs);
        assert_eq!(ours.read("a").map(|v| v.check()), Some("1".into()));
        assert_eq!(ours.read("b").map(|v| v.check()), Some("2".into()));
    }
}

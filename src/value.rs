use crate::ast::FunctionDecl;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Lists are shared by reference: every alias observes in-place mutation.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

type ListPtr = *const RefCell<Vec<Value>>;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Function(Rc<FunctionDecl>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Function(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Function(_) => "function",
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Truncating conversion used for list indices.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(n) if n.is_finite() => Some(n.trunc() as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Ordering for `< > <= >=`; `None` when the operands are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
            (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            (l, r) => match (l.as_float(), r.as_float()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => None,
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.eq_tracking(other, &mut Vec::new())
    }
}

impl Value {
    /// `active` holds the list pairs currently being compared; meeting one
    /// again means the comparison has cycled and the pair counts as equal.
    fn eq_tracking(&self, other: &Value, active: &mut Vec<(ListPtr, ListPtr)>) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::Int(l), Value::Float(r)) => (*l as f64) == *r,
            (Value::Float(l), Value::Int(r)) => *l == (*r as f64),
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::List(l), Value::List(r)) => {
                if Rc::ptr_eq(l, r) {
                    return true;
                }
                let pair = (Rc::as_ptr(l), Rc::as_ptr(r));
                if active.contains(&pair) {
                    return true;
                }

                let (left, right) = (l.borrow(), r.borrow());
                if left.len() != right.len() {
                    return false;
                }

                active.push(pair);
                let equal = left
                    .iter()
                    .zip(right.iter())
                    .all(|(a, b)| a.eq_tracking(b, active));
                active.pop();
                equal
            }
            (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }

    /// Lists already on `open` are being rendered further up and print as `[...]`.
    fn fmt_tracking(&self, f: &mut fmt::Formatter, open: &mut Vec<ListPtr>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                // Always show at least one decimal place for floats
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::List(l) => {
                let ptr = Rc::as_ptr(l);
                if open.contains(&ptr) {
                    return write!(f, "[...]");
                }

                open.push(ptr);
                write!(f, "[")?;
                for (i, item) in l.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_tracking(f, open)?;
                }
                open.pop();
                write!(f, "]")
            }
            Value::Function(decl) => write!(f, "<fun {}>", decl.name),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_tracking(f, &mut Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_forms() {
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Nil.to_string(), "nil");
        let nested = Value::list(vec![
            Value::Int(1),
            Value::from("a"),
            Value::list(vec![Value::Bool(true)]),
        ]);
        assert_eq!(nested.to_string(), "[1, a, [true]]");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(Value::list(vec![Value::Nil]).is_truthy());
    }

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::from("1"));
        assert_eq!(
            Value::list(vec![Value::Int(1)]),
            Value::list(vec![Value::Float(1.0)])
        );
    }

    #[test]
    fn comparison_requires_compatible_kinds() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(1).compare(&Value::from("a")), None);
    }

    #[test]
    fn lists_alias() {
        let a = Value::list(vec![]);
        let b = a.clone();
        if let Value::List(items) = &a {
            items.borrow_mut().push(Value::Int(7));
        }
        assert_eq!(b.to_string(), "[7]");
    }

    #[test]
    fn self_containing_list_displays_and_compares() {
        let xs = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &xs {
            items.borrow_mut().push(xs.clone());
        }
        assert_eq!(xs.to_string(), "[1, [...]]");
        assert_eq!(xs, xs.clone());

        let ys = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &ys {
            items.borrow_mut().push(ys.clone());
        }
        assert!(xs == ys);
        assert!(xs != Value::list(vec![Value::Int(1), Value::Int(2)]));

        // Break the cycles so the test does not leak.
        for value in [&xs, &ys] {
            if let Value::List(items) = value {
                items.borrow_mut().clear();
            }
        }
    }

    #[test]
    fn index_coercion_truncates() {
        assert_eq!(Value::Float(1.9).as_index(), Some(1));
        assert_eq!(Value::Bool(true).as_index(), Some(1));
        assert_eq!(Value::from("1").as_index(), None);
        assert_eq!(Value::Float(f64::NAN).as_index(), None);
    }
}

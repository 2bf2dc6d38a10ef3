use std::collections::BTreeMap;
use std::fmt;

use crate::value::{Value, ValueMap};

type Locals<'template> = BTreeMap<&'template str, Value>;

/// Position of the innermost loop, exposed to templates as `loop`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopState {
    pub(crate) idx: usize,
    pub(crate) len: usize,
}

impl LoopState {
    fn to_value(self) -> Value {
        let LoopState { idx, len } = self;
        let mut rv = ValueMap::with_capacity(7);
        rv.insert("index".into(), Value::from(idx + 1));
        rv.insert("index0".into(), Value::from(idx));
        rv.insert("revindex".into(), Value::from(len.saturating_sub(idx)));
        rv.insert(
            "revindex0".into(),
            Value::from(len.saturating_sub(idx).saturating_sub(1)),
        );
        rv.insert("first".into(), Value::from(idx == 0));
        rv.insert("last".into(), Value::from(len == 0 || idx == len - 1));
        rv.insert("length".into(), Value::from(len));
        Value::from(rv)
    }
}

#[derive(Default)]
pub(crate) struct Frame<'template> {
    pub(crate) locals: Locals<'template>,
    pub(crate) current_loop: Option<LoopState>,
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        m.entries(self.locals.iter());
        if let Some(state) = self.current_loop {
            m.entry(&"loop", &state);
        }
        m.finish()
    }
}

/// The scope stack of a render.
///
/// The root context sits at the bottom; every loop pushes a frame on top of
/// it.  Lookups walk from the innermost frame outwards and end at the root.
pub(crate) struct Context<'template> {
    root: Value,
    stack: Vec<Frame<'template>>,
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.root)
            .field("stack", &self.stack)
            .finish()
    }
}

impl<'template> Context<'template> {
    /// Creates a context
    pub fn new(root: Value) -> Context<'template> {
        Context {
            root,
            stack: Vec::new(),
        }
    }

    /// Stores a variable in the innermost frame.
    ///
    /// Without a frame the value is dropped; the root context is never
    /// written to.
    pub fn store(&mut self, key: &'template str, value: Value) {
        if let Some(frame) = self.stack.last_mut() {
            frame.locals.insert(key, value);
        }
    }

    /// Updates the loop state of the innermost frame.
    pub fn set_loop_state(&mut self, state: LoopState) {
        if let Some(frame) = self.stack.last_mut() {
            frame.current_loop = Some(state);
        }
    }

    /// Looks up a variable in the context.
    pub fn load(&self, key: &str) -> Option<Value> {
        for frame in self.stack.iter().rev() {
            if let Some(value) = frame.locals.get(key) {
                return Some(value.clone());
            }
            if let Some(state) = frame.current_loop {
                if key == "loop" {
                    return Some(state.to_value());
                }
            }
        }
        self.root.get_attr(key).cloned()
    }

    /// Pushes a new frame.
    pub fn push_frame(&mut self, frame: Frame<'template>) {
        self.stack.push(frame);
    }

    /// Pops the innermost frame, restoring the bindings below it.
    pub fn pop_frame(&mut self) -> Option<Frame<'template>> {
        self.stack.pop()
    }

    /// Returns the number of pushed frames.
    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    use crate::context;

    #[test]
    fn test_shadowing() {
        let mut ctx = Context::new(context!(x => "root", y => "only root"));
        assert_eq!(ctx.load("x"), Some(Value::from("root")));

        ctx.push_frame(Frame::default());
        ctx.store("x", Value::from("outer"));
        ctx.push_frame(Frame::default());
        ctx.store("x", Value::from("inner"));
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.load("x"), Some(Value::from("inner")));
        assert_eq!(ctx.load("y"), Some(Value::from("only root")));

        ctx.pop_frame();
        assert_eq!(ctx.load("x"), Some(Value::from("outer")));
        ctx.pop_frame();
        assert_eq!(ctx.load("x"), Some(Value::from("root")));
        assert_eq!(ctx.load("missing"), None);
    }

    #[test]
    fn test_loop_state() {
        let mut ctx = Context::new(context!());
        assert_eq!(ctx.load("loop"), None);
        ctx.push_frame(Frame::default());
        ctx.set_loop_state(LoopState { idx: 1, len: 3 });
        let state = ctx.load("loop").unwrap();
        assert_eq!(
            state.to_string(),
            r#"{"index": 2, "index0": 1, "revindex": 2, "revindex0": 1, "first": false, "last": false, "length": 3}"#
        );
    }
}

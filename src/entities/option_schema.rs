//! Declarative option schemas: how each editable attribute is presented,
//! coerced, bounded and committed.
//!
//! A schema maps attribute keys to [`OptionDef`]s. Anything that may depend
//! on other attributes (bounds, visibility) is a tagged variant: a constant,
//! or a function evaluated against the *current* attribute set on every
//! read. Nothing here is cached.
//!
//! `O` is the owning object handed to visibility predicates and transforms
//! (a [`Layer`](super::Layer) for layer editors, any settings struct
//! elsewhere).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::attrs::{AttrValue, Attrs};

/// Input kind; drives coercion of raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionKind {
    #[default]
    Number,
    Text,
    Multiline,
}

/// Numeric bound: fixed, or derived from the full attribute set.
#[derive(Clone)]
pub enum Bound {
    Constant(f64),
    Derived(Arc<dyn Fn(&Attrs) -> f64 + Send + Sync>),
}

impl Bound {
    /// Evaluate against `attrs`. NaN means "no bound".
    pub fn eval(&self, attrs: &Attrs) -> Option<f64> {
        let value = match self {
            Bound::Constant(v) => *v,
            Bound::Derived(f) => f(attrs),
        };
        (!value.is_nan()).then_some(value)
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Bound::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Visibility predicate over (owner, attrs).
pub enum Visibility<O: ?Sized> {
    Constant(bool),
    Derived(Arc<dyn Fn(&O, &Attrs) -> bool + Send + Sync>),
}

impl<O: ?Sized> Visibility<O> {
    pub fn eval(&self, owner: &O, attrs: &Attrs) -> bool {
        match self {
            Visibility::Constant(v) => *v,
            Visibility::Derived(f) => f(owner, attrs),
        }
    }
}

impl<O: ?Sized> Clone for Visibility<O> {
    fn clone(&self) -> Self {
        match self {
            Visibility::Constant(v) => Visibility::Constant(*v),
            Visibility::Derived(f) => Visibility::Derived(Arc::clone(f)),
        }
    }
}

impl<O: ?Sized> fmt::Debug for Visibility<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Visibility::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// `(owner, proposed patch, current attrs) -> actual patch`
pub type Transform<O> = Arc<dyn Fn(&O, Attrs, &Attrs) -> Attrs + Send + Sync>;

/// Schema entry for one editable attribute.
pub struct OptionDef<O: ?Sized> {
    pub kind: OptionKind,
    /// Display label, opaque to this crate
    pub title: String,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    pub step: f64,
    /// Layout hint, opaque
    pub inline: bool,
    /// Rendering hint, opaque
    pub plain_text: bool,
    pub visible: Visibility<O>,
    pub on_change: Option<Transform<O>>,
    /// Receives a debounced copy of each committed value
    pub secondary_key: Option<String>,
}

impl<O: ?Sized> Clone for OptionDef<O> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            title: self.title.clone(),
            min: self.min.clone(),
            max: self.max.clone(),
            step: self.step,
            inline: self.inline,
            plain_text: self.plain_text,
            visible: self.visible.clone(),
            on_change: self.on_change.clone(),
            secondary_key: self.secondary_key.clone(),
        }
    }
}

impl<O: ?Sized> fmt::Debug for OptionDef<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionDef")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("step", &self.step)
            .field("inline", &self.inline)
            .field("plain_text", &self.plain_text)
            .field("visible", &self.visible)
            .field("on_change", &self.on_change.as_ref().map(|_| ".."))
            .field("secondary_key", &self.secondary_key)
            .finish()
    }
}

impl<O: ?Sized> OptionDef<O> {
    pub fn new(kind: OptionKind) -> Self {
        Self {
            kind,
            title: String::new(),
            min: None,
            max: None,
            step: 1.0,
            inline: false,
            plain_text: false,
            visible: Visibility::Constant(true),
            on_change: None,
            secondary_key: None,
        }
    }

    pub fn number() -> Self {
        Self::new(OptionKind::Number)
    }

    pub fn text() -> Self {
        Self::new(OptionKind::Text)
    }

    pub fn multiline() -> Self {
        Self::new(OptionKind::Multiline)
    }

    // ========== Builder ==========

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(Bound::Constant(min));
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(Bound::Constant(max));
        self
    }

    pub fn min_fn(mut self, f: impl Fn(&Attrs) -> f64 + Send + Sync + 'static) -> Self {
        self.min = Some(Bound::Derived(Arc::new(f)));
        self
    }

    pub fn max_fn(mut self, f: impl Fn(&Attrs) -> f64 + Send + Sync + 'static) -> Self {
        self.max = Some(Bound::Derived(Arc::new(f)));
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn plain_text(mut self) -> Self {
        self.plain_text = true;
        self
    }

    pub fn visible_when(mut self, f: impl Fn(&O, &Attrs) -> bool + Send + Sync + 'static) -> Self {
        self.visible = Visibility::Derived(Arc::new(f));
        self
    }

    pub fn on_change(mut self, f: impl Fn(&O, Attrs, &Attrs) -> Attrs + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub fn secondary_key(mut self, key: impl Into<String>) -> Self {
        self.secondary_key = Some(key.into());
        self
    }

    // ========== Evaluation ==========

    pub fn min_value(&self, attrs: &Attrs) -> Option<f64> {
        self.min.as_ref().and_then(|b| b.eval(attrs))
    }

    pub fn max_value(&self, attrs: &Attrs) -> Option<f64> {
        self.max.as_ref().and_then(|b| b.eval(attrs))
    }

    pub fn is_visible(&self, owner: &O, attrs: &Attrs) -> bool {
        self.visible.eval(owner, attrs)
    }

    /// Clamp to whichever bounds are currently defined.
    pub fn clamp(&self, value: f64, attrs: &Attrs) -> f64 {
        let mut value = value;
        if let Some(min) = self.min_value(attrs) {
            value = value.max(min);
        }
        if let Some(max) = self.max_value(attrs) {
            value = value.min(max);
        }
        value
    }

    /// Coerce raw input per `kind`.
    ///
    /// Numeric input keeps `""` as the empty string so a field can be
    /// cleared; otherwise the leading number is taken. `None` means the
    /// input holds no number at all.
    pub fn coerce(&self, raw: &str) -> Option<AttrValue> {
        match self.kind {
            OptionKind::Number if raw.is_empty() => Some(AttrValue::empty()),
            OptionKind::Number => parse_leading_float(raw).map(AttrValue::Number),
            OptionKind::Text | OptionKind::Multiline => Some(AttrValue::Str(raw.to_string())),
        }
    }

    /// Apply the custom transform, if any, to a proposed patch.
    pub fn transform(&self, owner: &O, patch: Attrs, attrs: &Attrs) -> Attrs {
        match &self.on_change {
            Some(f) => f(owner, patch, attrs),
            None => patch,
        }
    }
}

/// Longest numeric prefix after leading whitespace: `"3.5px"` -> 3.5.
/// Overflow to infinity counts as no number.
fn parse_leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    // Exponent only counts when followed by at least one digit
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Ordered mapping from attribute key to its option definition.
pub struct OptionSchema<O: ?Sized> {
    defs: IndexMap<String, OptionDef<O>>,
}

impl<O: ?Sized> Default for OptionSchema<O> {
    fn default() -> Self {
        Self {
            defs: IndexMap::new(),
        }
    }
}

impl<O: ?Sized> Clone for OptionSchema<O> {
    fn clone(&self) -> Self {
        Self {
            defs: self.defs.clone(),
        }
    }
}

impl<O: ?Sized> fmt::Debug for OptionSchema<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.defs.iter()).finish()
    }
}

impl<O: ?Sized> OptionSchema<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, def: OptionDef<O>) -> Self {
        self.insert(key, def);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, def: OptionDef<O>) {
        self.defs.insert(key.into(), def);
    }

    pub fn get(&self, key: &str) -> Option<&OptionDef<O>> {
        self.defs.get(key)
    }

    /// Keys in declaration order (the form's field order).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionDef<O>)> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Keys currently visible for `owner`, in declaration order.
    pub fn visible_keys<'a>(&'a self, owner: &'a O, attrs: &'a Attrs) -> impl Iterator<Item = &'a str> + 'a {
        self.defs
            .iter()
            .filter(move |(_, def)| def.is_visible(owner, attrs))
            .map(|(key, _)| key.as_str())
    }
}

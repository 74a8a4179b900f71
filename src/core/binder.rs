//! Option binder: per-field controller between raw user input and the
//! attribute set it edits.
//!
//! One binder exists per mounted field. On each input it:
//! 1. coerces the raw text per the option kind
//! 2. echoes the coerced value into the draft (synchronously)
//! 3. builds `{key: value}` and runs the option's transform over it
//! 4. commits the resulting patch immediately
//! 5. if the option has a secondary key, (re)schedules a debounced
//!    `{secondary_key: value}` commit
//!
//! The binder never talks to a store directly: every patch goes through the
//! `commit` callback supplied by the host. Dropping the binder (unmount)
//! cancels any pending secondary commit.
//!
//! External changes (e.g. the host switched to another attribute set) are
//! pushed in with `on_attrs_changed`, which overwrites the draft.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::debounce::Debouncer;
use crate::config::Settings;
use crate::entities::{AttrValue, Attrs, OptionDef, OptionKind, OptionSchema};
use crate::error::{Result, StoreError};

/// Sink for committed patches.
pub type CommitFn = Box<dyn FnMut(Attrs)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderState {
    /// Draft mirrors the stored value
    Idle,
    /// Draft holds user input (possibly with a secondary commit pending)
    Editing,
}

/// Everything a view needs to draw one field, evaluated at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub key: String,
    pub title: String,
    pub kind: OptionKind,
    pub draft: AttrValue,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: f64,
    pub visible: bool,
    pub inline: bool,
    pub plain_text: bool,
}

pub struct OptionBinder<O: ?Sized> {
    key: String,
    def: OptionDef<O>,
    draft: AttrValue,
    state: BinderState,
    secondary: Debouncer<Attrs>,
    commit: CommitFn,
}

impl<O: ?Sized> fmt::Debug for OptionBinder<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionBinder")
            .field("key", &self.key)
            .field("draft", &self.draft)
            .field("state", &self.state)
            .field("secondary", &self.secondary)
            .finish_non_exhaustive()
    }
}

impl<O: ?Sized> OptionBinder<O> {
    /// Bind `key` of `schema`, seeding the draft from `attrs`.
    pub fn new(
        schema: &OptionSchema<O>,
        key: &str,
        attrs: &Attrs,
        delay_ms: u64,
        commit: impl FnMut(Attrs) + 'static,
    ) -> Result<Self> {
        let def = schema
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownOption(key.to_string()))?;
        Ok(Self {
            key: key.to_string(),
            def,
            draft: stored_value(attrs, key),
            state: BinderState::Idle,
            secondary: Debouncer::new(delay_ms),
            commit: Box::new(commit),
        })
    }

    /// Bind with the quiet period taken from `settings.debounce_ms`.
    pub fn with_settings(
        schema: &OptionSchema<O>,
        key: &str,
        attrs: &Attrs,
        settings: &Settings,
        commit: impl FnMut(Attrs) + 'static,
    ) -> Result<Self> {
        Self::new(schema, key, attrs, settings.debounce_ms, commit)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Quiet period before the secondary commit fires.
    pub fn delay(&self) -> Duration {
        self.secondary.delay()
    }

    pub fn def(&self) -> &OptionDef<O> {
        &self.def
    }

    /// Value currently shown in the control.
    pub fn draft(&self) -> &AttrValue {
        &self.draft
    }

    pub fn state(&self) -> BinderState {
        self.state
    }

    /// Whether a secondary commit is waiting for quiet.
    pub fn is_pending(&self) -> bool {
        self.secondary.is_pending()
    }

    /// Resync the draft to the stored value, discarding any local edit.
    pub fn on_attrs_changed(&mut self, attrs: &Attrs) {
        self.draft = stored_value(attrs, &self.key);
        self.state = BinderState::Idle;
        trace!("Binder {}: resynced draft to {:?}", self.key, self.draft);
    }

    /// Handle raw input from the control.
    pub fn on_input(&mut self, raw: &str, owner: &O, attrs: &Attrs) {
        self.on_input_at(raw, owner, attrs, Instant::now());
    }

    pub fn on_input_at(&mut self, raw: &str, owner: &O, attrs: &Attrs, now: Instant) {
        self.state = BinderState::Editing;
        let Some(value) = self.def.coerce(raw) else {
            // No number in the input: echo it, commit nothing
            debug!("Binder {}: non-numeric input {:?} not committed", self.key, raw);
            self.draft = AttrValue::Str(raw.to_string());
            return;
        };
        self.draft = value.clone();

        let patch = self
            .def
            .transform(owner, Attrs::single(self.key.clone(), value.clone()), attrs);
        (self.commit)(patch);

        if let Some(secondary_key) = &self.def.secondary_key {
            self.secondary
                .schedule_at(Attrs::single(secondary_key.clone(), value), now);
        }
    }

    /// Fire the secondary commit if it is due. Returns true if it fired.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        match self.secondary.tick_at(now) {
            Some(patch) => self.fire(patch),
            None => false,
        }
    }

    /// Fire the pending secondary commit now.
    pub fn flush(&mut self) -> bool {
        match self.secondary.flush() {
            Some(patch) => self.fire(patch),
            None => false,
        }
    }

    fn fire(&mut self, patch: Attrs) -> bool {
        trace!("Binder {}: secondary commit {:?}", self.key, patch);
        (self.commit)(patch);
        self.state = BinderState::Idle;
        true
    }

    /// Drop the pending secondary commit without firing it.
    pub fn cancel(&mut self) {
        self.secondary.cancel();
    }

    /// Tear the field down. Pending secondary commits never fire.
    pub fn unmount(self) {
        drop(self);
    }

    // ========== Derived presentation ==========

    pub fn min(&self, attrs: &Attrs) -> Option<f64> {
        self.def.min_value(attrs)
    }

    pub fn max(&self, attrs: &Attrs) -> Option<f64> {
        self.def.max_value(attrs)
    }

    pub fn step(&self) -> f64 {
        self.def.step
    }

    /// Visibility only; hiding a field never touches its draft.
    pub fn is_visible(&self, owner: &O, attrs: &Attrs) -> bool {
        self.def.is_visible(owner, attrs)
    }

    pub fn field(&self, owner: &O, attrs: &Attrs) -> FieldView {
        FieldView {
            key: self.key.clone(),
            title: self.def.title.clone(),
            kind: self.def.kind,
            draft: self.draft.clone(),
            min: self.min(attrs),
            max: self.max(attrs),
            step: self.step(),
            visible: self.is_visible(owner, attrs),
            inline: self.def.inline,
            plain_text: self.def.plain_text,
        }
    }
}

impl<O: ?Sized> Drop for OptionBinder<O> {
    fn drop(&mut self) {
        if self.secondary.cancel().is_some() {
            trace!("Binder {}: unmounted with pending secondary commit, dropped", self.key);
        }
    }
}

fn stored_value(attrs: &Attrs, key: &str) -> AttrValue {
    attrs.get(key).cloned().unwrap_or_else(AttrValue::empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const DELAY: u64 = 1500;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Binder plus a log of every committed patch.
    fn bind(schema: &OptionSchema<()>, key: &str, attrs: &Attrs) -> (OptionBinder<()>, Rc<RefCell<Vec<Attrs>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let binder = OptionBinder::new(schema, key, attrs, DELAY, move |patch| sink.borrow_mut().push(patch))
            .unwrap();
        (binder, log)
    }

    fn speed_schema() -> OptionSchema<()> {
        OptionSchema::new().with(
            "speed",
            OptionDef::number().title("Speed").secondary_key("device_speed"),
        )
    }

    #[test]
    fn test_unknown_key() {
        let schema = speed_schema();
        let err = OptionBinder::new(&schema, "nope", &Attrs::new(), DELAY, |_| {}).unwrap_err();
        assert_eq!(err, StoreError::UnknownOption("nope".into()));
    }

    #[test]
    fn test_delay_from_settings() {
        let settings = Settings {
            debounce_ms: 250,
            ..Settings::default()
        };
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let mut binder = OptionBinder::with_settings(&speed_schema(), "speed", &Attrs::new(), &settings, move |patch| {
            sink.borrow_mut().push(patch)
        })
        .unwrap();
        assert_eq!(binder.delay(), ms(250));

        let t0 = Instant::now();
        binder.on_input_at("2", &(), &Attrs::new(), t0);
        assert!(!binder.tick_at(t0 + ms(249)));
        assert!(binder.tick_at(t0 + ms(250)));
        assert_eq!(log.borrow().last(), Some(&Attrs::single("device_speed", 2.0)));
    }

    #[test]
    fn test_draft_seeded_from_attrs() {
        let (binder, _) = bind(&speed_schema(), "speed", &Attrs::single("speed", 4.0));
        assert_eq!(binder.draft(), &AttrValue::Number(4.0));
        assert_eq!(binder.state(), BinderState::Idle);

        let (binder, _) = bind(&speed_schema(), "speed", &Attrs::new());
        assert_eq!(binder.draft(), &AttrValue::empty());
    }

    #[test]
    fn test_input_commits_immediately() {
        let (mut binder, log) = bind(&speed_schema(), "speed", &Attrs::new());
        binder.on_input("3.5", &(), &Attrs::new());

        assert_eq!(binder.draft(), &AttrValue::Number(3.5));
        assert_eq!(binder.state(), BinderState::Editing);
        assert_eq!(*log.borrow(), vec![Attrs::single("speed", 3.5)]);
        assert!(binder.is_pending());
    }

    #[test]
    fn test_empty_numeric_input_kept_empty() {
        let (mut binder, log) = bind(&speed_schema(), "speed", &Attrs::single("speed", 4.0));
        binder.on_input("", &(), &Attrs::new());

        assert_eq!(binder.draft(), &AttrValue::empty());
        assert_eq!(*log.borrow(), vec![Attrs::single("speed", "")]);
    }

    #[test]
    fn test_non_numeric_input_echoed_not_committed() {
        let (mut binder, log) = bind(&speed_schema(), "speed", &Attrs::new());
        binder.on_input("abc", &(), &Attrs::new());

        assert_eq!(binder.draft(), &AttrValue::from("abc"));
        assert!(log.borrow().is_empty());
        assert!(!binder.is_pending());
    }

    #[test]
    fn test_debounce_coalesces_to_last_value() {
        let (mut binder, log) = bind(&speed_schema(), "speed", &Attrs::new());
        let t0 = Instant::now();

        for (i, raw) in ["1", "2", "3", "4", "5"].iter().enumerate() {
            binder.on_input_at(raw, &(), &Attrs::new(), t0 + ms(i as u64 * 200));
            assert!(!binder.tick_at(t0 + ms(i as u64 * 200 + 100)));
        }
        // 5 primary commits, no secondary yet
        assert_eq!(log.borrow().len(), 5);
        assert!(!binder.tick_at(t0 + ms(800 + DELAY - 1)));

        assert!(binder.tick_at(t0 + ms(800 + DELAY)));
        let secondary: Vec<Attrs> = log
            .borrow()
            .iter()
            .filter(|patch| patch.contains("device_speed"))
            .cloned()
            .collect();
        assert_eq!(secondary, vec![Attrs::single("device_speed", 5.0)]);
        assert_eq!(binder.state(), BinderState::Idle);

        // Nothing left to fire
        assert!(!binder.tick_at(t0 + ms(10_000)));
    }

    #[test]
    fn test_transform_rewrites_primary_but_not_secondary() {
        let schema = OptionSchema::<()>::new().with(
            "width",
            OptionDef::number()
                .secondary_key("device_width")
                .on_change(|_, patch, attrs| {
                    let width = patch.get_f64_or("width", 0.0);
                    patch.with("height", width * attrs.get_f64_or("ratio", 1.0))
                }),
        );
        let attrs = Attrs::single("ratio", 2.0);
        let (mut binder, log) = bind(&schema, "width", &attrs);
        binder.on_input("10", &(), &attrs);
        assert!(binder.flush());

        assert_eq!(
            *log.borrow(),
            vec![
                Attrs::new().with("width", 10.0).with("height", 20.0),
                Attrs::single("device_width", 10.0),
            ]
        );
    }

    #[test]
    fn test_no_secondary_key_schedules_nothing() {
        let schema = OptionSchema::<()>::new().with("name", OptionDef::text());
        let (mut binder, log) = bind(&schema, "name", &Attrs::new());
        binder.on_input("Star", &(), &Attrs::new());

        assert!(!binder.is_pending());
        assert_eq!(*log.borrow(), vec![Attrs::single("name", "Star")]);
    }

    #[test]
    fn test_unmount_cancels_pending_commit() {
        let (mut binder, log) = bind(&speed_schema(), "speed", &Attrs::new());
        binder.on_input("7", &(), &Attrs::new());
        binder.unmount();

        assert_eq!(*log.borrow(), vec![Attrs::single("speed", 7.0)]);
    }

    #[test]
    fn test_resync_overrides_local_edit() {
        let (mut binder, _) = bind(&speed_schema(), "speed", &Attrs::single("speed", 1.0));
        binder.on_input("9", &(), &Attrs::new());
        binder.on_attrs_changed(&Attrs::single("speed", 2.0));

        assert_eq!(binder.draft(), &AttrValue::Number(2.0));
        assert_eq!(binder.state(), BinderState::Idle);
    }

    #[test]
    fn test_visibility_does_not_reset_draft() {
        let schema = OptionSchema::<()>::new().with(
            "radius",
            OptionDef::number().visible_when(|_, attrs| attrs.get_bool_or("show", true)),
        );
        let (mut binder, _) = bind(&schema, "radius", &Attrs::single("radius", 1.0));
        binder.on_input("4.5", &(), &Attrs::new());

        assert!(!binder.is_visible(&(), &Attrs::single("show", false)));
        assert!(binder.is_visible(&(), &Attrs::single("show", true)));
        assert_eq!(binder.draft(), &AttrValue::Number(4.5));
    }

    #[test]
    fn test_field_view_recomputes_bounds() {
        let schema = OptionSchema::<()>::new().with(
            "inner",
            OptionDef::number()
                .title("Inner radius")
                .min(0.0)
                .max_fn(|attrs| attrs.get_f64_or("outer", f64::NAN))
                .step(0.5)
                .inline(),
        );
        let (binder, _) = bind(&schema, "inner", &Attrs::new());

        let view = binder.field(&(), &Attrs::single("outer", 10.0));
        assert_eq!(view.title, "Inner radius");
        assert_eq!(view.min, Some(0.0));
        assert_eq!(view.max, Some(10.0));
        assert_eq!(view.step, 0.5);
        assert!(view.inline && view.visible && !view.plain_text);

        assert_eq!(binder.field(&(), &Attrs::single("outer", 3.0)).max, Some(3.0));
        assert_eq!(binder.field(&(), &Attrs::new()).max, None);
    }
}

//! Note lifecycle for the magnetic resonator piano.
//!
//! Every note-on schedules its own note-off. A second note-on for the same
//! key before that note-off fires sends the old note-off immediately and
//! cancels the pending one, so per key the receiver always sees on/off pairs.

mod registry;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use registry::{ActiveNotes, NoteKey, PendingNoteOff};
use registry::remove_if_owned;

use crate::config::{HandlerConfig, NoteSettings};
use crate::error::{PatternError, Result, TransportError};
use crate::pattern::{
    CyclicReducer, Param, Pattern, PatternMap, PatternReducer, ReduceControls, Value,
};
use crate::timing::{ScopedTask, Timeline};
use crate::transport::{MessageSender, Number, OscClient, Transport};

/// Arguments of a note pattern invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NotePattern {
    pub note: Pattern,
    pub duration: Pattern,
}

impl Default for NotePattern {
    fn default() -> Self {
        Self {
            note: Pattern::from(60),
            duration: Pattern::from(1),
        }
    }
}

impl NotePattern {
    pub fn new(note: impl Into<Pattern>, duration: impl Into<Pattern>) -> Self {
        Self {
            note: note.into(),
            duration: duration.into(),
        }
    }
}

/// Arguments of a quality (timbre control) pattern invocation.
///
/// Sent as `<quality_prefix><quality> [channel, note, value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityPattern {
    pub quality: Pattern,
    pub note: Pattern,
    pub value: Pattern,
    /// Falls back to the configured note channel.
    pub channel: Option<Pattern>,
}

impl QualityPattern {
    pub fn new(
        quality: impl Into<Pattern>,
        note: impl Into<Pattern>,
        value: impl Into<Pattern>,
    ) -> Self {
        Self {
            quality: quality.into(),
            note: note.into(),
            value: value.into(),
            channel: None,
        }
    }

    pub fn on_channel(mut self, channel: impl Into<Pattern>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

pub struct MrpHandler {
    name: String,
    sender: MessageSender,
    timeline: Arc<dyn Timeline>,
    reducer: Box<dyn PatternReducer>,
    notes: NoteSettings,
    time_unit: f64,
    active_notes: ActiveNotes,
    next_task: AtomicU64,
}

impl MrpHandler {
    pub fn new(
        config: &HandlerConfig,
        transport: Arc<dyn Transport>,
        timeline: Arc<dyn Timeline>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            sender: MessageSender::new(transport, config.look_ahead()),
            timeline,
            reducer: Box::new(CyclicReducer),
            notes: config.notes.clone(),
            time_unit: config.time_unit,
            active_notes: ActiveNotes::new(),
            next_task: AtomicU64::new(0),
        }
    }

    /// Validates `config` and opens a UDP client to the configured receiver.
    pub fn connect(config: &HandlerConfig, timeline: Arc<dyn Timeline>) -> Result<Self> {
        config.validate()?;
        let client = OscClient::open(&config.ip, config.port, &config.name)?;
        Ok(Self::new(config, Arc::new(client), timeline))
    }

    pub fn with_reducer(mut self, reducer: impl PatternReducer + 'static) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn note_settings(&self) -> &NoteSettings {
        &self.notes
    }

    pub fn active_notes(&self) -> &ActiveNotes {
        &self.active_notes
    }

    /// Notes with a pending note-off.
    pub fn active_note_count(&self) -> usize {
        self.active_notes.len()
    }

    pub fn is_active(&self, note: i32) -> bool {
        self.active_notes
            .contains(&NoteKey::new(note, self.notes.channel))
    }

    /// Raw send primitive: one timed message, no lifecycle tracking.
    pub fn send(
        &self,
        address: &str,
        payload: Vec<Number>,
    ) -> std::result::Result<(), TransportError> {
        self.sender.send(address, payload)
    }

    fn note_on(&self, note: i32) -> std::result::Result<(), TransportError> {
        self.send(
            &self.notes.address,
            vec![
                Number::Int(self.notes.note_on_status()),
                Number::Int(note),
                Number::Int(self.notes.velocity as i32),
            ],
        )
    }

    fn off_delay(&self, duration: f64) -> Duration {
        let units = (duration - self.notes.safety_margin).max(0.0);
        Duration::try_from_secs_f64(units * self.time_unit).unwrap_or(Duration::MAX)
    }

    /// Sends a note-on now and schedules its note-off `duration` time units
    /// later (minus the safety margin).
    pub fn trigger_note(&self, note: i32, duration: f64) -> Result<()> {
        let address = self.notes.address.clone();
        self.trigger_note_to(&address, note, duration)
    }

    /// Like [`trigger_note`](Self::trigger_note), tagged with the address of
    /// the invoking pattern. Note-on and note-off always go to the
    /// configured note address.
    pub fn trigger_note_to(&self, address: &str, note: i32, duration: f64) -> Result<()> {
        let key = NoteKey::new(note, self.notes.channel);
        let mut active = self.active_notes.lock();

        if let Some(previous) = active.get(&key).cloned() {
            if !previous.task.is_resolved() {
                send_note_off(&self.sender, &self.notes, note)?;
                previous.task.cancel();
                tracing::debug!(note, task = previous.task.id(), "replaced sounding note");
            }
            active.remove(&key);
        }

        self.note_on(note)?;

        let task = ScopedTask::new(self.next_task.fetch_add(1, Ordering::Relaxed));
        let delay = self.off_delay(duration);
        active.insert(key, PendingNoteOff { task: task.clone() });

        let body = {
            let registry = self.active_notes.clone();
            let sender = self.sender.clone();
            let notes = self.notes.clone();
            let task = task.clone();
            move || {
                let mut active = registry.lock();
                if !task.try_start() {
                    return;
                }
                if let Err(err) = send_note_off(&sender, &notes, note) {
                    tracing::error!(note, %err, "scheduled note-off failed");
                }
                remove_if_owned(&mut active, &key, &task);
                task.complete();
            }
        };
        tracing::debug!(note, source = address, ?delay, task = task.id(), "note-off scheduled");
        self.timeline.defer(delay, task, Box::new(body));
        Ok(())
    }

    /// Reduces `pattern` and triggers one note per concrete set. Rests are
    /// skipped. Returns the number of notes triggered.
    pub fn send_note_pattern(&self, pattern: &NotePattern, controls: ReduceControls) -> Result<usize> {
        if pattern.note.is_rest() {
            return Ok(0);
        }

        let map = PatternMap::from([
            (Param::Note, pattern.note.clone()),
            (Param::Duration, pattern.duration.clone()),
        ]);

        let mut triggered = 0;
        for args in self.reducer.reduce(&map, controls)? {
            if args.is_rest(&Param::Note) {
                continue;
            }
            let note = to_i32(&Param::Note, args.require(&Param::Note)?.to_int(&Param::Note)?)?;
            let duration = args.require(&Param::Duration)?.to_int(&Param::Duration)?;
            self.trigger_note(note, duration as f64)?;
            triggered += 1;
        }
        Ok(triggered)
    }

    /// Sends one message per concrete set to `/<address>`, payload taken from
    /// the remaining parameters in name order. Returns the number sent.
    pub fn send_control_pattern(
        &self,
        address: impl Into<Pattern>,
        mut params: PatternMap,
        controls: ReduceControls,
    ) -> Result<usize> {
        let address = address.into();
        if address.is_rest() {
            return Ok(0);
        }
        params.insert(Param::Address, address);

        let mut sent = 0;
        for mut args in self.reducer.reduce(&params, controls)? {
            if args.is_rest(&Param::Address) {
                continue;
            }
            let address = match args.remove(&Param::Address) {
                Some(value) => address_text(&value),
                None => continue,
            };
            let payload = args.to_numbers()?;
            self.send(&format!("/{}", address.trim_start_matches('/')), payload)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Sends `[channel, note, value]` to the quality address for each
    /// concrete set. Returns the number sent.
    pub fn send_quality_pattern(
        &self,
        pattern: &QualityPattern,
        controls: ReduceControls,
    ) -> Result<usize> {
        if pattern.quality.is_rest() || pattern.note.is_rest() {
            return Ok(0);
        }

        let channel = pattern
            .channel
            .clone()
            .unwrap_or_else(|| Pattern::from(self.notes.channel as i64));
        let map = PatternMap::from([
            (Param::Quality, pattern.quality.clone()),
            (Param::Note, pattern.note.clone()),
            (Param::Value, pattern.value.clone()),
            (Param::Channel, channel),
        ]);

        let mut sent = 0;
        for args in self.reducer.reduce(&map, controls)? {
            if args.is_rest(&Param::Quality) || args.is_rest(&Param::Note) {
                continue;
            }
            let quality = address_text(args.require(&Param::Quality)?);
            let channel = to_i32(
                &Param::Channel,
                args.require(&Param::Channel)?.to_int(&Param::Channel)?,
            )?;
            let note = to_i32(&Param::Note, args.require(&Param::Note)?.to_int(&Param::Note)?)?;
            let value = args.require(&Param::Value)?.to_float(&Param::Value)?;

            let address = format!("{}{}", self.notes.quality_prefix, quality);
            self.send(
                &address,
                vec![
                    Number::Int(channel),
                    Number::Int(note),
                    Number::Float(value as f32),
                ],
            )?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Releases every sounding note, then sends the receiver's all-notes-off
    /// message. Returns how many pending notes were released.
    ///
    /// A failed note-off is logged and the sweep continues; the registry is
    /// always cleared and the all-notes-off message always attempted. The
    /// first failure is returned afterwards.
    pub fn all_notes_off(&self) -> Result<usize> {
        let mut active = self.active_notes.lock();
        let mut keys: Vec<NoteKey> = active.keys().copied().collect();
        keys.sort();

        let mut released = 0;
        let mut first_err = None;
        for key in keys {
            let Some(pending) = active.remove(&key) else {
                continue;
            };
            if pending.task.is_resolved() {
                continue;
            }
            pending.task.cancel();
            released += 1;
            if let Err(err) = send_note_off(&self.sender, &self.notes, key.note) {
                tracing::error!(note = key.note, %err, "note-off failed during all notes off");
                first_err = first_err.or(Some(err));
            }
        }
        drop(active);

        let sent = self.send(&self.notes.all_notes_off_address, Vec::new());
        tracing::info!(released, "all notes off");
        match first_err {
            Some(err) => Err(err.into()),
            None => sent.map(|()| released).map_err(Into::into),
        }
    }
}

impl fmt::Debug for MrpHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MrpHandler")
            .field("name", &self.name)
            .field("look_ahead", &self.sender.look_ahead())
            .field("active_notes", &self.active_notes.len())
            .finish()
    }
}

fn send_note_off(
    sender: &MessageSender,
    notes: &NoteSettings,
    note: i32,
) -> std::result::Result<(), TransportError> {
    sender.send(
        &notes.address,
        vec![
            Number::Int(notes.note_off_status()),
            Number::Int(note),
            Number::Int(0),
        ],
    )
}

fn to_i32(param: &Param, value: i64) -> std::result::Result<i32, PatternError> {
    i32::try_from(value).map_err(|_| PatternError::OutOfRange {
        param: param.clone(),
        value: value.to_string(),
    })
}

fn address_text(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        other => other.to_string(),
    }
}

//! The blink controller module.

use gatehouse_core::constants::{DEFAULT_BLINK_DURATION_MS, DEFAULT_BLINK_HALF_PERIOD_MS};
use gatehouse_module::channel::{CommandClient, Frames};
use gatehouse_module::command::{Command, error_reply, reply, verb};
use gatehouse_module::module::DeviceModule;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Configuration for a [`LedBuzzer`].
///
/// # Examples
///
/// ```
/// use gatehouse_ledbuzzer::LedBuzzerConfig;
///
/// let config: LedBuzzerConfig = serde_json::from_str(
///     r#"{ "name": "reader-led", "target": "gpio14" }"#,
/// ).unwrap();
/// assert_eq!(config.default_half_period_ms, 100);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedBuzzerConfig {
    /// Name this module is addressed by.
    pub name: String,

    /// Delegate module the output line is reached through.
    pub target: String,

    /// BLINK duration when the command omits it, in milliseconds.
    pub default_duration_ms: u64,

    /// BLINK half-period when the command omits it, in milliseconds.
    pub default_half_period_ms: u64,
}

impl Default for LedBuzzerConfig {
    fn default() -> Self {
        Self {
            name: "led".to_string(),
            target: "gpio".to_string(),
            default_duration_ms: DEFAULT_BLINK_DURATION_MS,
            default_half_period_ms: DEFAULT_BLINK_HALF_PERIOD_MS,
        }
    }
}

/// An in-progress blink sequence.
///
/// `remaining` strictly decreases, one toggle per step; the sequence is
/// complete when it reaches zero.
#[derive(Debug)]
struct BlinkSequence {
    remaining: u64,
    duration_ms: u64,
    half_period_ms: u64,
    next_wake: Instant,
}

/// LED/buzzer blink controller.
///
/// ON, OFF and TOGGLE are forwarded verbatim to the delegate and the
/// delegate's reply is relayed unchanged; the output level is tracked
/// locally from acknowledged commands so STATE never has to consult the
/// delegate. BLINK starts a timed toggle sequence driven by the host
/// scheduler through [`next_wake`](DeviceModule::next_wake) and
/// [`update`](DeviceModule::update).
pub struct LedBuzzer {
    config: LedBuzzerConfig,
    delegate: CommandClient,
    level: bool,
    blink: Option<BlinkSequence>,
}

impl LedBuzzer {
    /// Create a blink controller reaching its output line through
    /// `delegate`. The delegate must be served by a different host
    /// thread.
    pub fn new(config: LedBuzzerConfig, delegate: CommandClient) -> Self {
        Self {
            config,
            delegate,
            level: false,
            blink: None,
        }
    }

    /// Whether a blink sequence is in progress.
    pub fn is_sequencing(&self) -> bool {
        self.blink.is_some()
    }

    fn state_reply(&self) -> Frames {
        let level = if self.level { reply::ON } else { reply::OFF };
        match &self.blink {
            Some(seq) => vec![
                reply::BLINKING.to_string(),
                seq.duration_ms.to_string(),
                seq.half_period_ms.to_string(),
                level.to_string(),
            ],
            None => vec![level.to_string()],
        }
    }

    /// Forward a level command verbatim; the reply is relayed unchanged
    /// and an acknowledged command updates the tracked level.
    fn forward(&mut self, command: Command, frames: &[String]) -> Frames {
        match self.delegate.request(&self.config.target, frames.to_vec()) {
            Ok(relayed) => {
                if relayed.first().map(String::as_str) == Some(reply::OK) {
                    self.level = match command {
                        Command::On => true,
                        Command::Off => false,
                        _ => !self.level,
                    };
                }
                relayed
            }
            Err(e) => {
                error!(
                    module = %self.config.name,
                    target = %self.config.target,
                    error = %e,
                    "delegate unreachable"
                );
                error_reply(e.to_string())
            }
        }
    }

    fn start_blink(&mut self, duration_ms: Option<u64>, half_period_ms: Option<u64>) -> Frames {
        let duration_ms = duration_ms.unwrap_or(self.config.default_duration_ms);
        let half_period_ms = half_period_ms.unwrap_or(self.config.default_half_period_ms);
        if half_period_ms == 0 || half_period_ms > duration_ms {
            warn!(
                module = %self.config.name,
                duration_ms,
                half_period_ms,
                "rejecting blink with invalid timing"
            );
            return vec![reply::KO.to_string()];
        }

        // A new sequence replaces any in-progress one.
        let mut remaining = duration_ms / half_period_ms;
        debug!(
            module = %self.config.name,
            duration_ms,
            half_period_ms,
            toggles = remaining,
            "starting blink sequence"
        );

        // The first toggle happens right away.
        self.toggle_output();
        remaining -= 1;
        self.blink = (remaining > 0).then(|| BlinkSequence {
            remaining,
            duration_ms,
            half_period_ms,
            next_wake: Instant::now() + Duration::from_millis(half_period_ms),
        });
        vec![reply::OK.to_string()]
    }

    fn toggle_output(&mut self) {
        let toggle = vec![verb::TOGGLE.to_string()];
        match self.delegate.request(&self.config.target, toggle) {
            Ok(relayed) if relayed.first().map(String::as_str) == Some(reply::OK) => {
                self.level = !self.level;
            }
            Ok(relayed) => {
                warn!(
                    module = %self.config.name,
                    reply = ?relayed.first(),
                    "delegate refused blink toggle"
                );
            }
            Err(e) => {
                error!(
                    module = %self.config.name,
                    target = %self.config.target,
                    error = %e,
                    "delegate unreachable during blink"
                );
            }
        }
    }
}

impl DeviceModule for LedBuzzer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn handle(&mut self, frames: &[String]) -> Frames {
        match Command::parse(frames) {
            Ok(Command::State) => self.state_reply(),
            Ok(command @ (Command::On | Command::Off | Command::Toggle)) => {
                self.forward(command, frames)
            }
            Ok(Command::Blink {
                duration_ms,
                half_period_ms,
            }) => self.start_blink(duration_ms, half_period_ms),
            Err(e) => {
                warn!(module = %self.config.name, error = %e, "rejecting command");
                error_reply(e.to_string())
            }
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        self.blink.as_ref().map(|seq| seq.next_wake)
    }

    fn update(&mut self) {
        if self.blink.is_none() {
            return;
        }
        self.toggle_output();
        if let Some(seq) = self.blink.as_mut() {
            seq.remaining -= 1;
            if seq.remaining == 0 {
                debug!(module = %self.config.name, "blink sequence complete");
                self.blink = None;
            } else {
                seq.next_wake += Duration::from_millis(seq.half_period_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_module::channel::command_channel;
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;

    /// Acknowledges everything with OK and records what it was asked.
    fn spawn_delegate() -> (CommandClient, Arc<Mutex<Vec<Frames>>>, JoinHandle<()>) {
        let (client, server) = command_channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        let handle = std::thread::spawn(move || {
            while let Ok(routed) = server.recv() {
                seen.lock().unwrap().push(routed.request.frames().to_vec());
                let _ = routed.request.reply(vec![reply::OK.to_string()]);
            }
        });
        (client, log, handle)
    }

    fn module() -> (LedBuzzer, Arc<Mutex<Vec<Frames>>>, JoinHandle<()>) {
        let (client, log, handle) = spawn_delegate();
        (
            LedBuzzer::new(LedBuzzerConfig::default(), client),
            log,
            handle,
        )
    }

    fn frames(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    /// Run the sequence to completion the way the host would, counting
    /// update steps.
    fn drain(module: &mut LedBuzzer) -> u64 {
        let mut steps = 0;
        while module.next_wake().is_some() {
            module.update();
            steps += 1;
        }
        steps
    }

    #[test]
    fn test_blink_budget_arithmetic() {
        let (mut led, log, handle) = module();
        let reply = led.handle(&frames(&["BLINK", "1000", "100"]));
        assert_eq!(reply, frames(&["OK"]));

        // One toggle fires inside the handler, the other nine under the
        // scheduler.
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(led.is_sequencing());
        assert_eq!(drain(&mut led), 9);
        assert_eq!(log.lock().unwrap().len(), 10);

        // Even toggle count, so the level is back where it started.
        assert_eq!(led.state_reply(), frames(&["OFF"]));
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_blink_budget_of_five() {
        let (mut led, log, handle) = module();
        led.handle(&frames(&["BLINK", "100", "20"]));
        // First toggle in the handler, four more under the scheduler.
        assert_eq!(drain(&mut led), 4);
        assert_eq!(log.lock().unwrap().len(), 5);
        assert!(!led.is_sequencing());
        assert_eq!(led.next_wake(), None);
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_state_parity_mid_sequence() {
        let (mut led, _log, handle) = module();
        led.handle(&frames(&["BLINK", "100", "20"]));
        led.update();
        led.update();
        // Three toggles so far; odd parity flips the original OFF level.
        assert_eq!(
            led.handle(&frames(&["STATE"])),
            frames(&["BLINKING", "100", "20", "ON"])
        );
        drain(&mut led);
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_invalid_blink_during_sequence_leaves_it_running() {
        let (mut led, log, handle) = module();
        led.handle(&frames(&["BLINK", "1000", "100"]));
        assert_eq!(led.handle(&frames(&["BLINK", "50", "200"])), frames(&["KO"]));
        assert!(led.is_sequencing());
        assert_eq!(drain(&mut led), 9);
        assert_eq!(log.lock().unwrap().len(), 10);
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_forwarding_relays_reply_unchanged_and_keeps_sequencing_state() {
        let (client, server) = command_channel();
        let responder = std::thread::spawn(move || {
            while let Ok(routed) = server.recv() {
                let reply = if routed.request.frames() == ["ON"] {
                    frames(&["GRANTED", "by-policy"])
                } else {
                    frames(&["OK"])
                };
                let _ = routed.request.reply(reply);
            }
        });
        let mut led = LedBuzzer::new(LedBuzzerConfig::default(), client);

        led.handle(&frames(&["BLINK", "400", "100"]));
        assert!(led.is_sequencing());

        // Non-OK delegate reply is relayed verbatim and does not touch
        // the tracked level or the sequence.
        assert_eq!(led.handle(&frames(&["ON"])), frames(&["GRANTED", "by-policy"]));
        assert!(led.is_sequencing());
        assert_eq!(
            led.handle(&frames(&["STATE"])),
            frames(&["BLINKING", "400", "100", "ON"])
        );
        drain(&mut led);
        drop(led);
        responder.join().unwrap();
    }

    #[test]
    fn test_blink_budget_of_one_completes_immediately() {
        let (mut led, log, handle) = module();
        let reply = led.handle(&frames(&["BLINK", "100", "100"]));
        assert_eq!(reply, frames(&["OK"]));
        assert!(!led.is_sequencing());
        assert_eq!(led.next_wake(), None);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(led.state_reply(), frames(&["ON"]));
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_blink_with_invalid_timing_is_ko_and_mutates_nothing() {
        let (mut led, log, handle) = module();
        assert_eq!(led.handle(&frames(&["BLINK", "100", "200"])), frames(&["KO"]));
        assert_eq!(led.handle(&frames(&["BLINK", "100", "0"])), frames(&["KO"]));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(led.next_wake(), None);
        assert_eq!(led.state_reply(), frames(&["OFF"]));
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_blink_defaults_come_from_config() {
        let (client, log, handle) = spawn_delegate();
        let mut led = LedBuzzer::new(
            LedBuzzerConfig {
                default_duration_ms: 300,
                default_half_period_ms: 100,
                ..Default::default()
            },
            client,
        );

        assert_eq!(led.handle(&frames(&["BLINK"])), frames(&["OK"]));
        assert_eq!(drain(&mut led) + 1, 3);
        assert_eq!(log.lock().unwrap().len(), 3);
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_level_commands_forward_verbatim_and_track_level() {
        let (mut led, log, handle) = module();
        assert_eq!(led.handle(&frames(&["ON"])), frames(&["OK"]));
        assert_eq!(led.state_reply(), frames(&["ON"]));

        assert_eq!(led.handle(&frames(&["TOGGLE"])), frames(&["OK"]));
        assert_eq!(led.state_reply(), frames(&["OFF"]));

        assert_eq!(led.handle(&frames(&["OFF"])), frames(&["OK"]));
        assert_eq!(led.state_reply(), frames(&["OFF"]));

        let seen = log.lock().unwrap();
        assert_eq!(*seen, vec![frames(&["ON"]), frames(&["TOGGLE"]), frames(&["OFF"])]);
        drop(seen);
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_state_during_blink_reports_timing_and_level() {
        let (mut led, _log, handle) = module();
        led.handle(&frames(&["BLINK", "400", "100"]));
        assert_eq!(
            led.handle(&frames(&["STATE"])),
            frames(&["BLINKING", "400", "100", "ON"])
        );
        drain(&mut led);
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_unknown_verb_gets_error_reply_and_module_keeps_serving() {
        let (mut led, _log, handle) = module();
        let reply = led.handle(&frames(&["EXPLODE"]));
        assert_eq!(reply[0], "ERROR");
        assert!(reply[1].contains("EXPLODE"));

        assert_eq!(led.handle(&frames(&["STATE"])), frames(&["OFF"]));
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_new_blink_replaces_in_progress_sequence() {
        let (mut led, log, handle) = module();
        led.handle(&frames(&["BLINK", "1000", "100"]));
        assert!(led.is_sequencing());

        led.handle(&frames(&["BLINK", "200", "100"]));
        // Two handler toggles so far; one scheduler step finishes the
        // replacement sequence.
        assert_eq!(drain(&mut led), 1);
        assert_eq!(log.lock().unwrap().len(), 3);
        drop(led);
        handle.join().unwrap();
    }

    #[test]
    fn test_unreachable_delegate_surfaces_as_error_reply() {
        let (client, server) = command_channel();
        drop(server);
        let mut led = LedBuzzer::new(LedBuzzerConfig::default(), client);
        let reply = led.handle(&frames(&["ON"]));
        assert_eq!(reply[0], "ERROR");
        // Local state stays untouched.
        assert_eq!(led.state_reply(), frames(&["OFF"]));
    }
}

//! Adapters that let the transport thread and the audio callback share state.

use std::sync::Arc;

use hb_engine::{LoadError, Mixer, PatternLoader, Performer};
use hb_ir::Pattern;
use parking_lot::Mutex;

/// The mixer behind the single lock shared with the audio callback.
///
/// Each trigger takes the lock for just that call and logs after releasing
/// it, so the transport never holds it across a pattern load or a log write.
#[derive(Clone)]
pub struct SharedMixer(pub Arc<Mutex<Mixer>>);

impl SharedMixer {
    pub fn new(mixer: Mixer) -> Self {
        Self(Arc::new(Mutex::new(mixer)))
    }

    /// Render one device buffer. Waits out a trigger in progress, which
    /// holds the lock only for a few slot writes.
    pub fn render(&self, output: &mut [f32], channels: usize) {
        self.0.lock().render(output, channels);
    }
}

impl Performer for SharedMixer {
    fn trigger(&mut self, voice: usize, pitch: f32) {
        let outcome = self.0.lock().trigger(voice, pitch);
        outcome.log(voice);
    }

    fn tempo_changed(&mut self, bpm: f32, step_duration: f64) {
        self.0.lock().tempo_changed(bpm, step_duration);
    }
}

/// One pattern loader used by both live and offline transports.
#[derive(Clone)]
pub struct SharedLoader(pub Arc<Mutex<Box<dyn PatternLoader + Send>>>);

impl SharedLoader {
    pub fn new(loader: impl PatternLoader + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(loader))))
    }
}

impl PatternLoader for SharedLoader {
    fn load(&mut self, id: &str) -> Result<Pattern, LoadError> {
        self.0.lock().load(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_engine::EngineConfig;
    use hb_ir::{Sample, SampleBank};

    #[test]
    fn triggers_reach_the_shared_mixer() {
        let mut bank = SampleBank::new();
        bank.load_row(0, Sample::from_frames("hat", vec![0.3; 1000], 48000));
        let mut shared = SharedMixer::new(Mixer::new(&EngineConfig::default(), bank, 48000));
        let other = shared.clone();
        shared.trigger(0, 0.0);
        assert_eq!(other.0.lock().pool().active_count(), 1);
    }

    #[test]
    fn render_waits_for_a_trigger_in_progress() {
        let mut bank = SampleBank::new();
        bank.load_row(0, Sample::from_frames("kick", vec![0.5; 1000], 48000));
        let shared = SharedMixer::new(Mixer::new(&EngineConfig::default(), bank, 48000));

        let (locked_tx, locked_rx) = crossbeam_channel::bounded(0);
        let transport_side = shared.clone();
        let handle = std::thread::spawn(move || {
            let mut mixer = transport_side.0.lock();
            locked_tx.send(()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(20));
            mixer.trigger(0, 0.0);
        });

        locked_rx.recv().unwrap();
        let mut buf = [0.0f32; 16];
        shared.render(&mut buf, 2);
        handle.join().unwrap();
        // the buffer was rendered after the trigger, not dropped
        assert!(buf.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn loader_is_shared() {
        struct Counting(usize);
        impl PatternLoader for Counting {
            fn load(&mut self, _id: &str) -> Result<Pattern, LoadError> {
                self.0 += 1;
                Ok(Pattern::new(1, self.0))
            }
        }
        let mut a = SharedLoader::new(Counting(0));
        let mut b = a.clone();
        assert_eq!(a.load("x").unwrap().steps(), 1);
        assert_eq!(b.load("x").unwrap().steps(), 2);
    }
}

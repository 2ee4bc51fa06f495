//! Owned cache of loaded sound clips.
//!
//! Clips are keyed by URL and live exactly as long as the cache. Capacity is
//! bounded; the least recently played clip is evicted first.

use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use tracing::{debug, warn};

pub trait AudioSink: Send {
    type Clip: Send;

    fn load(&mut self, url: &str) -> Result<Self::Clip>;
    /// Plays `clip` from the beginning, restarting it if already playing.
    fn play(&mut self, clip: &mut Self::Clip, volume: f32) -> Result<()>;
    fn stop(&mut self, clip: &mut Self::Clip);
}

pub struct AudioCache<S: AudioSink> {
    sink: S,
    clips: HashMap<String, S::Clip>,
    recency: VecDeque<String>,
    capacity: usize,
}

impl<S: AudioSink> AudioCache<S> {
    pub fn new(sink: S, capacity: usize) -> Self {
        Self {
            sink,
            clips: HashMap::new(),
            recency: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.clips.contains_key(url)
    }

    pub fn preload<'a>(&mut self, urls: impl IntoIterator<Item = &'a str>) {
        for url in urls {
            self.ensure_loaded(url);
        }
    }

    /// Returns whether playback was started. Failures are logged.
    pub fn play(&mut self, url: &str, volume: f32) -> bool {
        if !self.ensure_loaded(url) {
            return false;
        }
        self.touch(url);
        let Some(clip) = self.clips.get_mut(url) else {
            return false;
        };
        match self.sink.play(clip, volume.clamp(0.0, 1.0)) {
            Ok(()) => true,
            Err(err) => {
                warn!(?err, url, "audio playback was prevented");
                false
            }
        }
    }

    pub fn stop_all(&mut self) {
        for clip in self.clips.values_mut() {
            self.sink.stop(clip);
        }
    }

    pub fn clear(&mut self) {
        self.stop_all();
        self.clips.clear();
        self.recency.clear();
    }

    fn ensure_loaded(&mut self, url: &str) -> bool {
        if self.clips.contains_key(url) {
            return true;
        }
        let clip = match self.sink.load(url) {
            Ok(clip) => clip,
            Err(err) => {
                warn!(?err, url, "could not load audio clip");
                return false;
            }
        };
        while self.clips.len() >= self.capacity {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            if let Some(mut evicted) = self.clips.remove(&oldest) {
                debug!(url = %oldest, "evicting audio clip");
                self.sink.stop(&mut evicted);
            }
        }
        self.clips.insert(url.to_string(), clip);
        self.recency.push_back(url.to_string());
        true
    }

    fn touch(&mut self, url: &str) {
        if let Some(position) = self.recency.iter().position(|entry| entry == url) {
            if let Some(entry) = self.recency.remove(position) {
                self.recency.push_back(entry);
            }
        }
    }
}

impl<S: AudioSink> Drop for AudioCache<S> {
    fn drop(&mut self) {
        self.stop_all();
    }
}

//! Advisory background frame buffering
//!
//! A worker thread precomputes frames ahead of the scrub cursor so playback
//! never stalls on the interactive path. The work is purely advisory
//! precomputation: cancelling it never loses a frame record, it only leaves
//! the watermark where the next request picks up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use log::{debug, info};
use parking_lot::{Condvar, Mutex};

use crate::sandbox::Sandbox;

struct Request {
    /// Highest frame the worker should have valid
    target: usize,
    /// Bumped on every new request so the worker can tell edits apart
    generation: u64,
    shutdown: bool,
}

struct Shared {
    request: Mutex<Request>,
    wake: Condvar,
    /// Cooperative cancellation; checked between frames, never mid-record
    cancel: AtomicBool,
}

/// Handle to the background buffering worker
pub struct PlaybackBuffer {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackBuffer {
    /// Spawn the worker against a shared sandbox
    pub fn spawn(sandbox: Arc<Sandbox>) -> Self {
        let shared = Arc::new(Shared {
            request: Mutex::new(Request {
                target: 0,
                generation: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            cancel: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("sledline-playback".into())
            .spawn(move || worker_loop(&sandbox, &worker_shared))
            .expect("spawning the playback worker");
        info!("playback buffer started");
        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Ask the worker to have everything through `frame` valid. Interrupts
    /// any batch already in flight; batches are coalesced, not queued.
    pub fn buffer_to(&self, frame: usize) {
        let mut request = self.shared.request.lock();
        request.target = frame;
        request.generation += 1;
        self.shared.cancel.store(true, Ordering::Relaxed);
        self.shared.wake.notify_one();
    }

    /// Stop the worker and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        {
            let mut request = self.shared.request.lock();
            request.shutdown = true;
        }
        self.shared.cancel.store(true, Ordering::Relaxed);
        self.shared.wake.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            info!("playback buffer stopped");
        }
    }
}

impl Drop for PlaybackBuffer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(sandbox: &Sandbox, shared: &Shared) {
    let mut done_generation = 0;
    loop {
        let (target, generation) = {
            let mut request = shared.request.lock();
            while !request.shutdown && request.generation == done_generation {
                shared.wake.wait(&mut request);
            }
            if request.shutdown {
                return;
            }
            (request.target, request.generation)
        };

        shared.cancel.store(false, Ordering::Relaxed);
        loop {
            if !sandbox.recompute_through(target, &shared.cancel) {
                // Cancelled: a newer request or shutdown is pending
                break;
            }
            // An edit may have rewound the watermark while the batch ran;
            // re-check before declaring this request done
            if sandbox.watermark() > target {
                let request = shared.request.lock();
                if request.generation == generation {
                    debug!("buffer filled through frame {target}");
                    done_generation = generation;
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridVersion;
    use crate::sim::{Line, LineKind};
    use glam::DVec2;
    use std::time::Duration;

    fn landing_sandbox() -> Arc<Sandbox> {
        let sandbox = Sandbox::new(GridVersion::V62, DVec2::ZERO);
        sandbox.add_line(Line::new(
            1,
            DVec2::new(-50.0, 20.0),
            DVec2::new(50.0, 20.0),
            LineKind::Standard,
        ));
        Arc::new(sandbox)
    }

    fn wait_for_watermark(sandbox: &Sandbox, frame: usize) {
        for _ in 0..500 {
            if sandbox.watermark() > frame {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("worker never buffered past frame {frame}");
    }

    #[test]
    fn worker_fills_the_buffer_ahead_of_playback() {
        let sandbox = landing_sandbox();
        let buffer = PlaybackBuffer::spawn(Arc::clone(&sandbox));
        buffer.buffer_to(500);
        wait_for_watermark(&sandbox, 500);
        // Foreground reads are now pure cache hits
        assert!(sandbox.frame_if_cached(500).is_some());
        buffer.stop();
    }

    #[test]
    fn background_frames_match_a_foreground_run() {
        let sandbox = landing_sandbox();
        let buffer = PlaybackBuffer::spawn(Arc::clone(&sandbox));
        buffer.buffer_to(300);
        wait_for_watermark(&sandbox, 300);
        buffer.stop();

        let scratch = landing_sandbox();
        for frame in [0, 1, 13, 150, 300] {
            assert_eq!(sandbox.frame(frame), scratch.frame(frame));
        }
    }

    #[test]
    fn edits_interrupt_and_retarget_the_worker() {
        let sandbox = landing_sandbox();
        let buffer = PlaybackBuffer::spawn(Arc::clone(&sandbox));
        buffer.buffer_to(2000);
        // Edit mid-buffering: the removal rewinds the watermark and the
        // renewed request coalesces over the stale one
        sandbox.remove_line(1);
        buffer.buffer_to(200);
        wait_for_watermark(&sandbox, 200);
        buffer.stop();

        let empty = Sandbox::new(GridVersion::V62, DVec2::ZERO);
        assert_eq!(sandbox.frame(200), empty.frame(200));
    }

    #[test]
    fn dropping_the_handle_stops_the_worker() {
        let sandbox = landing_sandbox();
        {
            let _buffer = PlaybackBuffer::spawn(Arc::clone(&sandbox));
        }
        // Worker has exited; the sandbox is still usable
        assert!(!sandbox.frame(10).rider.crashed);
    }
}
